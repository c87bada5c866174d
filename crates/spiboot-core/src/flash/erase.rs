//! Eraser - covers a byte range with the fewest erase commands

use super::{DeviceHandle, NoProgress, Progress, ERASED_VALUE};
use crate::error::{Error, Result};
use crate::memory::{CommandProfile, MemoryParams, Operation};
use crate::protocol;
use crate::transport::Transport;

/// How one step of an erase plan is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseKind {
    /// Sector erase command
    Sector,
    /// Block erase command
    Block,
    /// Chip erase command
    Chip,
    /// Program 0xFF over the range (parts without erase commands)
    Fill,
}

/// One erase command (or fill) in a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseStep {
    /// How the range is erased
    pub kind: EraseKind,
    /// First byte erased
    pub addr: u32,
    /// Number of bytes erased
    pub len: u32,
}

impl EraseStep {
    /// One past the last byte erased
    pub fn end(&self) -> u32 {
        self.addr + self.len
    }
}

/// Iterator over the steps erasing a sector-aligned range
#[derive(Debug, Clone)]
pub struct ErasePlan {
    start: u32,
    end: u32,
    cursor: u32,
    sector_size: u32,
    block_size: u32,
    has_sector: bool,
    has_block: bool,
    whole_chip: bool,
}

impl ErasePlan {
    /// Sector-aligned start of the erased region
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Sector-aligned end of the erased region
    pub fn end(&self) -> u32 {
        self.end
    }
}

/// Plan the erase of `[addr, addr + len)`
///
/// The range is widened to sector boundaries. A range covering the whole
/// device becomes a single chip erase when the profile has one; otherwise
/// aligned full blocks use block erase and the rest sector erase.
pub fn plan_erase(
    params: &MemoryParams,
    profile: CommandProfile,
    addr: u32,
    len: u32,
) -> Result<ErasePlan> {
    if !params.is_valid_range(addr, len as usize) {
        return Err(Error::AddressOutOfBounds);
    }

    let (start, end) = if len == 0 {
        (addr, addr)
    } else {
        (params.sector_floor(addr), params.sector_ceil(addr + len))
    };

    Ok(ErasePlan {
        start,
        end,
        cursor: start,
        sector_size: params.sector_size,
        block_size: params.block_size,
        has_sector: profile.supports(Operation::EraseSector),
        has_block: profile.supports(Operation::EraseBlock),
        whole_chip: len > 0
            && start == 0
            && end == params.capacity
            && profile.supports(Operation::EraseChip),
    })
}

impl Iterator for ErasePlan {
    type Item = EraseStep;

    fn next(&mut self) -> Option<EraseStep> {
        if self.cursor >= self.end {
            return None;
        }

        let remaining = self.end - self.cursor;
        let (kind, len) = if self.whole_chip {
            (EraseKind::Chip, remaining)
        } else if self.has_block
            && self.cursor % self.block_size == 0
            && remaining >= self.block_size
        {
            (EraseKind::Block, self.block_size)
        } else if self.has_sector {
            (EraseKind::Sector, self.sector_size)
        } else {
            (EraseKind::Fill, remaining)
        };

        let step = EraseStep {
            kind,
            addr: self.cursor,
            len,
        };
        self.cursor += len;
        Some(step)
    }
}

impl<T: Transport> DeviceHandle<T> {
    /// Erase at least `[addr, addr + len)`
    ///
    /// The erased region is widened to sector boundaries, so bytes around
    /// the requested range may be erased too.
    pub fn erase_range(&mut self, addr: u32, len: u32) -> Result<()> {
        self.erase_range_with(addr, len, &mut NoProgress)
    }

    /// Erase at least `[addr, addr + len)`, reporting progress per command
    pub fn erase_range_with(
        &mut self,
        addr: u32,
        len: u32,
        progress: &mut dyn Progress,
    ) -> Result<()> {
        let plan = plan_erase(&self.params, self.profile, addr, len)?;
        if plan.start() == plan.end() {
            return Ok(());
        }

        log::debug!(
            "Erasing 0x{:06X}..0x{:06X} (requested 0x{:06X}+{})",
            plan.start(),
            plan.end(),
            addr,
            len
        );
        let start = plan.start();
        progress.erasing((plan.end() - start) as usize);

        for step in plan {
            self.erase_step(&step)?;
            progress.erase_progress((step.end() - start) as usize);
        }

        Ok(())
    }

    /// Erase the whole device
    pub fn erase_all(&mut self) -> Result<()> {
        self.erase_range(0, self.params.capacity)
    }

    fn erase_step(&mut self, step: &EraseStep) -> Result<()> {
        log::trace!("{:?} erase 0x{:06X} len {}", step.kind, step.addr, step.len);
        let width = self.params.address_width;
        match step.kind {
            EraseKind::Sector => protocol::erase(
                &mut self.bus,
                self.profile,
                width,
                Operation::EraseSector,
                step.addr,
                self.timeouts.sector_erase,
            ),
            EraseKind::Block => protocol::erase(
                &mut self.bus,
                self.profile,
                width,
                Operation::EraseBlock,
                step.addr,
                self.timeouts.block_erase,
            ),
            EraseKind::Chip => {
                protocol::chip_erase(&mut self.bus, self.profile, self.timeouts.chip_erase)
            }
            EraseKind::Fill => self.fill_erased(step.addr, step.len),
        }
    }

    fn fill_erased(&mut self, addr: u32, len: u32) -> Result<()> {
        const FILL: [u8; 256] = [ERASED_VALUE; 256];
        let mut offset = 0;
        while offset < len {
            let chunk = core::cmp::min(FILL.len() as u32, len - offset);
            self.write_range(addr + offset, &FILL[..chunk as usize])?;
            offset += chunk;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::DeviceClass;
    use crate::spi::AddressWidth;

    const KIB: u32 = 1024;

    fn nor_1m() -> MemoryParams {
        MemoryParams {
            capacity: 1024 * KIB,
            ..MemoryParams::NOR_DEFAULT
        }
    }

    fn count(plan: ErasePlan, kind: EraseKind) -> usize {
        plan.filter(|s| s.kind == kind).count()
    }

    #[test]
    fn test_plan_aligns_to_sectors() {
        let plan = plan_erase(&nor_1m(), CommandProfile::NorFlash, 100, 10).unwrap();
        assert_eq!(plan.start(), 0);
        assert_eq!(plan.end(), 4 * KIB);
        let steps: [Option<EraseStep>; 2] = {
            let mut it = plan;
            [it.next(), it.next()]
        };
        assert_eq!(
            steps[0],
            Some(EraseStep {
                kind: EraseKind::Sector,
                addr: 0,
                len: 4 * KIB
            })
        );
        assert_eq!(steps[1], None);
    }

    #[test]
    fn test_plan_uses_blocks_for_aligned_middle() {
        // 60 KiB..200 KiB: one sector, two blocks, two sectors
        let plan = plan_erase(&nor_1m(), CommandProfile::NorFlash, 60 * KIB, 140 * KIB).unwrap();
        assert_eq!(count(plan.clone(), EraseKind::Sector), 1 + 2);
        assert_eq!(count(plan.clone(), EraseKind::Block), 2);
        assert_eq!(plan.clone().count(), 5);

        let mut cursor = plan.start();
        for step in plan {
            assert_eq!(step.addr, cursor);
            if step.kind == EraseKind::Block {
                assert_eq!(step.addr % (64 * KIB), 0);
            }
            cursor = step.end();
        }
        assert_eq!(cursor, 200 * KIB);
    }

    #[test]
    fn test_plan_never_narrows() {
        let params = nor_1m();
        for (addr, len) in [(1u32, 1u32), (4095, 2), (65535, 65538), (0, 1), (1000, 300_000)] {
            let plan = plan_erase(&params, CommandProfile::NorFlash, addr, len).unwrap();
            assert!(plan.start() <= addr);
            assert!(plan.end() >= addr + len);
            assert_eq!(plan.start() % params.sector_size, 0);
            assert_eq!(plan.end() % params.sector_size, 0);
        }
    }

    #[test]
    fn test_whole_device_uses_chip_erase() {
        let params = nor_1m();
        let mut plan = plan_erase(&params, CommandProfile::NorFlash, 0, params.capacity).unwrap();
        assert_eq!(
            plan.next(),
            Some(EraseStep {
                kind: EraseKind::Chip,
                addr: 0,
                len: params.capacity
            })
        );
        assert_eq!(plan.next(), None);
    }

    #[test]
    fn test_atmel_has_no_block_erase() {
        let params = MemoryParams::default_for(DeviceClass::AtmelFlash);
        let plan = plan_erase(&params, CommandProfile::AtmelFlash, 0, 32 * KIB).unwrap();
        assert_eq!(count(plan, EraseKind::Sector), 1);

        // Whole device still goes through chip erase
        let plan = plan_erase(&params, CommandProfile::AtmelFlash, 0, params.capacity).unwrap();
        assert_eq!(count(plan, EraseKind::Chip), 1);
    }

    #[test]
    fn test_eeprom_fills() {
        let params = MemoryParams {
            address_width: AddressWidth::TwoByte,
            ..MemoryParams::EEPROM_DEFAULT
        };
        let mut plan = plan_erase(&params, CommandProfile::Eeprom, 10, 100).unwrap();
        assert_eq!(
            plan.next(),
            Some(EraseStep {
                kind: EraseKind::Fill,
                addr: 0,
                len: 128
            })
        );
        assert_eq!(plan.next(), None);
    }

    #[test]
    fn test_plan_bounds() {
        let params = nor_1m();
        assert!(matches!(
            plan_erase(&params, CommandProfile::NorFlash, params.capacity, 1),
            Err(Error::AddressOutOfBounds)
        ));
        let plan = plan_erase(&params, CommandProfile::NorFlash, 4096, 0).unwrap();
        assert_eq!(plan.count(), 0);
    }
}

//! spiboot-dummy - In-memory SPI memory emulator for testing
//!
//! This crate provides a transport that emulates a 25-series EEPROM, NOR
//! flash or Atmel AT25F part behind a byte-level SPI interface. Bytes are
//! decoded the way the real part decodes them: opcode, address, optional
//! dummy byte, then data, with program and erase committed when
//! device-select is released. It is useful for testing and development
//! without real hardware.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use spiboot_core::error::{Error, Result};
use spiboot_core::memory::{CommandProfile, DeviceClass, MemoryParams, Operation, KNOWN_PARTS};
use spiboot_core::spi::opcodes;
use spiboot_core::transport::{Transport, TransportConfig};

/// Number of SPI controllers the emulator pretends to have
pub const PERIPHERAL_COUNT: u8 = 5;

/// Status register bits the host may write
const SR_WRITABLE: u8 = opcodes::SR_BP_MASK | opcodes::SR_SRWD;

/// Configuration for the emulated part
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Geometry; the class selects the command profile
    pub params: MemoryParams,
    /// Bytes returned by the class's read-id command
    pub id: Vec<u8>,
    /// Status reads that report busy after each program or erase
    pub busy_polls: u32,
    /// Status register contents at power-up
    pub initial_status: u8,
}

impl DummyConfig {
    fn from_part(name: &str) -> Self {
        let part = KNOWN_PARTS.iter().find(|p| p.name == name);
        match part {
            Some(part) => Self {
                params: part.params,
                id: part.id.to_vec(),
                busy_polls: 1,
                initial_status: 0,
            },
            None => Self::eeprom(),
        }
    }

    /// Winbond W25X40 NOR flash (512 KiB)
    pub fn nor_flash() -> Self {
        Self::from_part("W25X40")
    }

    /// Atmel AT25F512 (64 KiB, 128 byte pages)
    pub fn atmel_flash() -> Self {
        Self::from_part("AT25F512")
    }

    /// 16-bit addressed EEPROM (32 KiB, 64 byte pages)
    pub fn eeprom() -> Self {
        Self {
            params: MemoryParams::EEPROM_DEFAULT,
            id: Vec::new(),
            busy_polls: 1,
            initial_status: 0,
        }
    }

    /// Preset for a device class
    pub fn for_class(class: DeviceClass) -> Self {
        match class {
            DeviceClass::Eeprom => Self::eeprom(),
            DeviceClass::NorFlash => Self::nor_flash(),
            DeviceClass::AtmelFlash => Self::atmel_flash(),
        }
    }
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self::nor_flash()
    }
}

/// Injected misbehaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// WIP never clears after a program or erase
    StuckBusy,
    /// Program commands are accepted but do not change the array
    DropProgram,
    /// Transfers fail once this many bytes have been clocked in total
    TransferError {
        /// Bytes that succeed before the failure
        after_bytes: usize,
    },
    /// Nothing drives MISO; every byte reads as 0xFF
    Floating,
}

/// A completed transaction, recorded when device-select is released
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// First byte clocked
    pub opcode: u8,
    /// Decoded address, if the operation has one and it was complete
    pub address: Option<u32>,
    /// Bytes clocked after the header
    pub data_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for the opcode
    Opcode,
    /// Collecting address bytes
    Address { got: u8 },
    /// Skipping dummy bytes
    Dummy { left: u8 },
    /// Data phase; `count` bytes so far
    Data { count: usize },
    /// Command not decoded; everything is ignored
    Ignore,
}

#[derive(Debug)]
struct Command {
    opcode: u8,
    op: Option<Operation>,
    address: u32,
    phase: Phase,
    /// Bytes clocked in during a program command
    program: Vec<u8>,
    /// First data byte of a write-status command
    status: Option<u8>,
}

/// Emulated SPI memory
pub struct DummyMemory {
    config: DummyConfig,
    profile: CommandProfile,
    data: Vec<u8>,
    status: u8,
    write_enabled: bool,
    busy_left: u32,
    stuck: bool,
    selected: bool,
    command: Option<Command>,
    fault: Option<Fault>,
    bytes_clocked: usize,
    delay_total_us: u64,
    log: Vec<Transaction>,
    backing: Option<PathBuf>,
}

impl DummyMemory {
    /// Create an erased part with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.params.capacity as usize];
        Self {
            profile: CommandProfile::for_class(config.params.class),
            status: config.initial_status & SR_WRITABLE,
            config,
            data,
            write_enabled: false,
            busy_left: 0,
            stuck: false,
            selected: false,
            command: None,
            fault: None,
            bytes_clocked: 0,
            delay_total_us: 0,
            log: Vec::new(),
            backing: None,
        }
    }

    /// Create an emulated NOR flash (W25X40)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a part with pre-filled contents
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut memory = Self::new(config);
        let len = initial_data.len().min(memory.data.len());
        memory.data[..len].copy_from_slice(&initial_data[..len]);
        memory
    }

    /// Open a channel on an emulated controller
    pub fn open(peripheral: u8, transport: &TransportConfig, config: DummyConfig) -> Result<Self> {
        transport.check(peripheral, PERIPHERAL_COUNT)?;
        log::debug!(
            "dummy: SPI{} mode {} prescaler {}",
            peripheral,
            transport.spi.mode(),
            transport.spi.prescaler
        );
        Ok(Self::new(config))
    }

    /// Back the array with a file
    ///
    /// Existing contents are loaded (shorter files are padded with 0xFF);
    /// the array is written back by [`DummyMemory::save`] and on drop.
    pub fn with_file(config: DummyConfig, path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let mut memory = match fs::read(path) {
            Ok(contents) => {
                if contents.len() > config.params.capacity as usize {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "{} is larger than the emulated part ({} bytes)",
                            path.display(),
                            config.params.capacity
                        ),
                    ));
                }
                Self::with_data(config, &contents)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::new(config),
            Err(e) => return Err(e),
        };
        memory.backing = Some(path.to_path_buf());
        Ok(memory)
    }

    /// Write the array to its backing file, if any
    pub fn save(&self) -> io::Result<()> {
        match &self.backing {
            Some(path) => fs::write(path, &self.data),
            None => Ok(()),
        }
    }

    /// Inject a fault
    pub fn set_fault(&mut self, fault: Option<Fault>) {
        self.fault = fault;
        self.stuck = false;
        self.bytes_clocked = 0;
    }

    /// The memory array
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the memory array
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// The configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Completed transactions, oldest first
    pub fn transactions(&self) -> &[Transaction] {
        &self.log
    }

    /// Forget recorded transactions
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Number of recorded transactions with `opcode`
    pub fn count(&self, opcode: u8) -> usize {
        self.log.iter().filter(|t| t.opcode == opcode).count()
    }

    /// Returns true while device-select is asserted
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Total time requested through `delay_us`
    pub fn delay_total_us(&self) -> u64 {
        self.delay_total_us
    }

    /// Current status register value as the host would read it
    pub fn status(&self) -> u8 {
        let mut status = self.status;
        if self.write_enabled {
            status |= opcodes::SR_WEL;
        }
        if self.is_busy() {
            status |= opcodes::SR_WIP;
        }
        status
    }

    fn is_busy(&self) -> bool {
        self.busy_left > 0 || self.stuck
    }

    fn address_bytes(&self) -> u8 {
        self.config.params.address_width.bytes()
    }

    fn wrap(&self, addr: u32) -> usize {
        addr as usize % self.data.len()
    }

    fn clock(&mut self, out: u8) -> u8 {
        let address_bytes = self.address_bytes();
        let Some(cmd) = self.command.as_mut() else {
            return 0xFF;
        };

        match cmd.phase {
            Phase::Opcode => {
                cmd.opcode = out;
                cmd.op = self.profile.decode(out);
                cmd.phase = match cmd.op {
                    Some(op) if op.is_addressed() => Phase::Address { got: 0 },
                    Some(_) => Phase::Data { count: 0 },
                    None => Phase::Ignore,
                };
                0xFF
            }
            Phase::Address { got } => {
                cmd.address = (cmd.address << 8) | out as u32;
                let got = got + 1;
                cmd.phase = if got < address_bytes {
                    Phase::Address { got }
                } else if cmd.op == Some(Operation::FastRead) {
                    Phase::Dummy { left: 1 }
                } else {
                    Phase::Data { count: 0 }
                };
                0xFF
            }
            Phase::Dummy { left } => {
                cmd.phase = if left > 1 {
                    Phase::Dummy { left: left - 1 }
                } else {
                    Phase::Data { count: 0 }
                };
                0xFF
            }
            Phase::Data { count } => {
                cmd.phase = Phase::Data { count: count + 1 };
                let op = cmd.op;
                let address = cmd.address;
                match op {
                    Some(Operation::Read | Operation::FastRead) => {
                        self.data[self.wrap(address.wrapping_add(count as u32))]
                    }
                    Some(Operation::Program) => {
                        cmd.program.push(out);
                        0xFF
                    }
                    Some(Operation::WriteStatus) => {
                        cmd.status.get_or_insert(out);
                        0xFF
                    }
                    Some(Operation::ReadStatus) => {
                        let status = self.status();
                        if self.busy_left > 0 {
                            self.busy_left -= 1;
                        }
                        status
                    }
                    Some(Operation::ReadId) => self.config.id.get(count).copied().unwrap_or(0xFF),
                    _ => 0xFF,
                }
            }
            Phase::Ignore => 0xFF,
        }
    }

    fn finish(&mut self, cmd: Command) {
        let header_done = !matches!(cmd.phase, Phase::Opcode | Phase::Address { .. });
        let data_len = match cmd.phase {
            Phase::Data { count } => count,
            _ => 0,
        };
        let op = cmd.op;
        self.log.push(Transaction {
            opcode: cmd.opcode,
            address: (header_done && op.is_some_and(|op| op.is_addressed())).then_some(cmd.address),
            data_len,
        });

        let Some(op) = op else {
            return;
        };
        if !header_done {
            return;
        }

        match op {
            Operation::WriteEnable if !self.is_busy() => self.write_enabled = true,
            Operation::WriteDisable => self.write_enabled = false,
            op if op.needs_latch() => self.commit(op, &cmd),
            _ => {}
        }
    }

    fn commit(&mut self, op: Operation, cmd: &Command) {
        if self.is_busy() {
            log::debug!("dummy: {:?} ignored, device busy", op);
            return;
        }
        if !self.write_enabled {
            log::debug!("dummy: {:?} ignored, write enable latch clear", op);
            return;
        }
        self.write_enabled = false;

        let protected = self.status & opcodes::SR_BP_MASK != 0;
        if protected && op != Operation::WriteStatus {
            log::debug!("dummy: {:?} ignored, block protection set", op);
            return;
        }

        let params = self.config.params;
        match op {
            Operation::Program => {
                if self.fault != Some(Fault::DropProgram) {
                    self.program_page(cmd.address, &cmd.program);
                }
            }
            Operation::EraseSector => self.erase_aligned(cmd.address, params.sector_size),
            Operation::EraseBlock => self.erase_aligned(cmd.address, params.block_size),
            Operation::EraseChip => self.data.fill(0xFF),
            Operation::WriteStatus => {
                if let Some(value) = cmd.status {
                    self.status = value & SR_WRITABLE;
                }
            }
            _ => {}
        }
        self.busy_left = self.config.busy_polls;
        self.stuck = self.fault == Some(Fault::StuckBusy);
    }

    /// Program bytes wrapping within the page, as real parts do
    fn program_page(&mut self, addr: u32, bytes: &[u8]) {
        // Only the last page_size bytes clocked in are kept
        let page_size = self.config.params.page_size as usize;
        let skip = bytes.len().saturating_sub(page_size);
        let page_base = self.wrap(addr) / page_size * page_size;
        let mut column = self.wrap(addr) % page_size + skip;
        let is_eeprom = self.config.params.class == DeviceClass::Eeprom;

        for &byte in &bytes[skip..] {
            let index = page_base + column % page_size;
            if is_eeprom {
                self.data[index] = byte;
            } else {
                // Flash programming: can only change 1 -> 0
                self.data[index] &= byte;
            }
            column += 1;
        }
    }

    fn erase_aligned(&mut self, addr: u32, size: u32) {
        let start = self.wrap(addr) / size as usize * size as usize;
        let end = (start + size as usize).min(self.data.len());
        self.data[start..end].fill(0xFF);
    }
}

impl Transport for DummyMemory {
    fn assert_select(&mut self) -> Result<()> {
        if self.selected {
            return Err(Error::TransferFailed);
        }
        self.selected = true;
        self.command = Some(Command {
            opcode: 0,
            op: None,
            address: 0,
            phase: Phase::Opcode,
            program: Vec::new(),
            status: None,
        });
        Ok(())
    }

    fn release_select(&mut self) {
        self.selected = false;
        if let Some(cmd) = self.command.take() {
            if cmd.phase != Phase::Opcode {
                self.finish(cmd);
            }
        }
    }

    fn transfer_bytes(&mut self, data: &[u8]) -> Result<usize> {
        for &byte in data {
            self.transfer_byte(byte)?;
        }
        Ok(data.len())
    }

    fn transfer_byte(&mut self, out: u8) -> Result<u8> {
        if !self.selected {
            return Err(Error::TransferFailed);
        }
        if let Some(Fault::TransferError { after_bytes }) = self.fault {
            if self.bytes_clocked >= after_bytes {
                return Err(Error::TransferFailed);
            }
        }
        self.bytes_clocked += 1;

        let input = self.clock(out);
        if self.fault == Some(Fault::Floating) {
            return Ok(0xFF);
        }
        Ok(input)
    }

    fn delay_us(&mut self, us: u32) {
        // No delay needed for in-memory operations
        self.delay_total_us += us as u64;
    }
}

impl Drop for DummyMemory {
    fn drop(&mut self) {
        if let Err(e) = self.save() {
            log::warn!("dummy: failed to save backing file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spiboot_core::protocol::{self, PollBudget};
    use spiboot_core::spi::{AddressWidth, SpiCommand};

    const BUDGET: PollBudget = PollBudget::new(1, 100);

    fn program(memory: &mut DummyMemory, addr: u32, data: &[u8]) {
        protocol::program(
            memory,
            CommandProfile::NorFlash,
            AddressWidth::ThreeByte,
            addr,
            data,
            BUDGET,
        )
        .unwrap();
    }

    fn read(memory: &mut DummyMemory, addr: u32, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        protocol::read(
            memory,
            CommandProfile::NorFlash,
            AddressWidth::ThreeByte,
            addr,
            &mut buf,
            false,
        )
        .unwrap();
        buf
    }

    #[test]
    fn test_read_jedec_id() {
        let mut memory = DummyMemory::new_default();
        let mut id = [0u8; 3];
        protocol::read_id(&mut memory, CommandProfile::NorFlash, &mut id).unwrap();
        assert_eq!(id, [0xEF, 0x30, 0x13]);
    }

    #[test]
    fn test_read_write() {
        let mut memory = DummyMemory::new_default();
        let data = [0x12, 0x34, 0x56, 0x78];
        program(&mut memory, 0x1000, &data);
        assert_eq!(read(&mut memory, 0x1000, 4), data);
        assert!(!memory.is_selected());
    }

    #[test]
    fn test_program_requires_write_enable() {
        let mut memory = DummyMemory::new_default();
        let mut cmd = SpiCommand::write(opcodes::PP, AddressWidth::ThreeByte, 0, &[0x00]);
        protocol::execute_raw(&mut memory, &mut cmd).unwrap();
        assert_eq!(memory.data()[0], 0xFF);
    }

    #[test]
    fn test_flash_program_only_clears_bits() {
        let mut memory = DummyMemory::new_default();
        program(&mut memory, 0, &[0xF0]);
        program(&mut memory, 0, &[0x0F]);
        assert_eq!(memory.data()[0], 0x00);
    }

    #[test]
    fn test_program_wraps_within_page() {
        let mut memory = DummyMemory::new_default();
        let mut cmd = SpiCommand::write(opcodes::PP, AddressWidth::ThreeByte, 254, &[1, 2, 3, 4]);
        protocol::write_enable(&mut memory, CommandProfile::NorFlash).unwrap();
        protocol::execute_raw(&mut memory, &mut cmd).unwrap();
        assert_eq!(&memory.data()[254..256], &[1, 2]);
        assert_eq!(&memory.data()[0..2], &[3, 4]);
        assert_eq!(memory.data()[256], 0xFF);
    }

    #[test]
    fn test_erase_sector() {
        let mut memory = DummyMemory::new_default();
        program(&mut memory, 0x1100, &[0x00; 16]);
        protocol::erase(
            &mut memory,
            CommandProfile::NorFlash,
            AddressWidth::ThreeByte,
            Operation::EraseSector,
            0x1FFF,
            BUDGET,
        )
        .unwrap();
        assert!(memory.data()[0x1000..0x2000].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_busy_then_ready() {
        let mut config = DummyConfig::nor_flash();
        config.busy_polls = 3;
        let mut memory = DummyMemory::new(config);
        program(&mut memory, 0, &[0xAA]);
        // One WREN, one PP and three busy polls plus the ready one
        assert_eq!(memory.count(opcodes::RDSR), 4);
    }

    #[test]
    fn test_eeprom_overwrites_bytes() {
        let mut memory = DummyMemory::new(DummyConfig::eeprom());
        for value in [0x0F, 0xF0] {
            protocol::program(
                &mut memory,
                CommandProfile::Eeprom,
                AddressWidth::TwoByte,
                0x10,
                &[value],
                BUDGET,
            )
            .unwrap();
        }
        assert_eq!(memory.data()[0x10], 0xF0);
    }

    #[test]
    fn test_write_status_keeps_writable_bits() {
        let mut memory = DummyMemory::new_default();
        protocol::write_status(&mut memory, CommandProfile::NorFlash, 0xFF, BUDGET).unwrap();
        assert_eq!(memory.status(), SR_WRITABLE);
    }

    #[test]
    fn test_protected_part_ignores_program() {
        let mut config = DummyConfig::nor_flash();
        config.initial_status = opcodes::SR_BP_MASK;
        let mut memory = DummyMemory::new(config);
        program(&mut memory, 0, &[0x00]);
        assert_eq!(memory.data()[0], 0xFF);
    }

    #[test]
    fn test_open_checks_transport() {
        let config = TransportConfig::default();
        assert!(DummyMemory::open(0, &config, DummyConfig::default()).is_ok());
        assert!(DummyMemory::open(PERIPHERAL_COUNT, &config, DummyConfig::default()).is_err());
    }
}

//! Command protocol engine
//!
//! Every transaction goes through [`execute_raw`], which frames it with the
//! device-select line through a [`SelectGuard`]. The helpers below compose
//! the standard sequences (write-enable, command, completion poll) on top of
//! [`execute`], which maps a logical [`Operation`] to the profile's opcode.

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::memory::{CommandProfile, Operation};
use crate::spi::{opcodes, AddressWidth, SpiCommand, MAX_HEADER_LEN};
use crate::transport::{SelectGuard, Transport};

bitflags! {
    /// Status register bits common to 25-series parts
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u8 {
        /// Write In Progress
        const WIP  = opcodes::SR_WIP;
        /// Write Enable Latch
        const WEL  = opcodes::SR_WEL;
        /// Block Protect 0
        const BP0  = 1 << 2;
        /// Block Protect 1
        const BP1  = 1 << 3;
        /// Block Protect 2
        const BP2  = 1 << 4;
        /// Status Register Write Disable
        const SRWD = opcodes::SR_SRWD;

        /// All block protect bits
        const BP = opcodes::SR_BP_MASK;
    }
}

impl Status {
    /// Returns true while a program or erase is still running
    pub const fn is_busy(&self) -> bool {
        self.contains(Self::WIP)
    }

    /// Returns true if any block protect bit is set
    pub const fn is_protected(&self) -> bool {
        self.intersects(Self::BP)
    }
}

/// Bounded status-poll budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    /// Delay between two status reads in microseconds
    pub poll_delay_us: u32,
    /// Total time to wait before giving up
    pub timeout_us: u32,
}

impl PollBudget {
    /// Create a poll budget
    pub const fn new(poll_delay_us: u32, timeout_us: u32) -> Self {
        Self {
            poll_delay_us,
            timeout_us,
        }
    }

    /// Number of status reads allowed, never less than one
    pub const fn max_polls(&self) -> u32 {
        let polls = if self.poll_delay_us > 0 {
            self.timeout_us / self.poll_delay_us
        } else {
            // Fall back to polling once per microsecond
            self.timeout_us
        };
        if polls == 0 {
            1
        } else {
            polls
        }
    }
}

/// Poll budgets per operation class
///
/// Typical poll delays:
/// * Page program: 10us
/// * 4KB sector erase: 10,000us (10ms)
/// * 32KB/64KB block erase: 100,000us (100ms)
/// * Chip erase: 1,000,000us (1s)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Page program
    pub program: PollBudget,
    /// Sector erase
    pub sector_erase: PollBudget,
    /// Block erase
    pub block_erase: PollBudget,
    /// Chip erase
    pub chip_erase: PollBudget,
    /// Status register write
    pub write_status: PollBudget,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            program: PollBudget::new(10, 10_000),
            sector_erase: PollBudget::new(10_000, 1_000_000),
            block_erase: PollBudget::new(100_000, 4_000_000),
            chip_erase: PollBudget::new(1_000_000, 200_000_000),
            write_status: PollBudget::new(10_000, 500_000),
        }
    }
}

impl Timeouts {
    /// Budget for a write-class operation, `None` for operations that do not poll
    pub const fn for_operation(&self, op: Operation) -> Option<PollBudget> {
        match op {
            Operation::Program => Some(self.program),
            Operation::EraseSector => Some(self.sector_erase),
            Operation::EraseBlock => Some(self.block_erase),
            Operation::EraseChip => Some(self.chip_erase),
            Operation::WriteStatus => Some(self.write_status),
            _ => None,
        }
    }
}

/// Data phase of a command
pub enum Payload<'a> {
    /// Opcode (and address) only
    None,
    /// Bytes clocked out after the header
    Write(&'a [u8]),
    /// Buffer filled with bytes clocked in after the header
    Read(&'a mut [u8]),
}

/// Run one command as a single device-select framed transaction
///
/// Device-select is released on every exit path, including transfer errors.
pub fn execute_raw<T: Transport + ?Sized>(bus: &mut T, cmd: &mut SpiCommand<'_>) -> Result<()> {
    cmd.check()?;

    let mut header = [0u8; MAX_HEADER_LEN];
    let header_len = cmd.encode_header(&mut header);

    let mut bus = SelectGuard::new(bus)?;
    if bus.transfer_bytes(&header[..header_len])? != header_len {
        return Err(Error::TransferFailed);
    }
    if cmd.has_write() && bus.transfer_bytes(cmd.write_data)? != cmd.write_data.len() {
        return Err(Error::TransferFailed);
    }
    if cmd.has_read() {
        bus.read_bytes(cmd.read_buf)?;
    }
    Ok(())
}

/// Issue `op` with the profile's opcode
///
/// `address` must be present exactly when the operation is addressed and
/// must fit in `width`. Unsupported operations fail before the bus is
/// touched.
pub fn execute<T: Transport + ?Sized>(
    bus: &mut T,
    profile: CommandProfile,
    width: AddressWidth,
    op: Operation,
    address: Option<u32>,
    payload: Payload<'_>,
) -> Result<()> {
    let opcode = profile.opcode(op).ok_or(Error::OperationNotSupported)?;

    let (write_data, read_buf): (&[u8], &mut [u8]) = match payload {
        Payload::None => (&[], &mut []),
        Payload::Write(data) => (data, &mut []),
        Payload::Read(buf) => (&[], buf),
    };

    let address_width = match (op.is_addressed(), address) {
        (true, Some(_)) => width,
        (false, None) => AddressWidth::None,
        _ => return Err(Error::InvalidCommand),
    };

    let mut cmd = SpiCommand {
        opcode,
        address,
        address_width,
        dummy_bytes: profile.dummy_bytes(op),
        write_data,
        read_buf,
    };
    log::trace!(
        "{:?} opcode 0x{:02X} addr {:?} len {}",
        op,
        opcode,
        address,
        cmd.write_data.len() + cmd.read_buf.len()
    );
    execute_raw(bus, &mut cmd)
}

/// Read the status register
pub fn read_status<T: Transport + ?Sized>(bus: &mut T, profile: CommandProfile) -> Result<Status> {
    let mut buf = [0u8; 1];
    execute(
        bus,
        profile,
        AddressWidth::None,
        Operation::ReadStatus,
        None,
        Payload::Read(&mut buf),
    )?;
    Ok(Status::from_bits_retain(buf[0]))
}

/// Send the Write Enable command
pub fn write_enable<T: Transport + ?Sized>(bus: &mut T, profile: CommandProfile) -> Result<()> {
    execute(
        bus,
        profile,
        AddressWidth::None,
        Operation::WriteEnable,
        None,
        Payload::None,
    )
}

/// Send the Write Disable command
pub fn write_disable<T: Transport + ?Sized>(bus: &mut T, profile: CommandProfile) -> Result<()> {
    execute(
        bus,
        profile,
        AddressWidth::None,
        Operation::WriteDisable,
        None,
        Payload::None,
    )
}

/// Wait for the WIP (Write In Progress) bit to clear
///
/// Reads the status register at most `budget.max_polls()` times, sleeping
/// `budget.poll_delay_us` between reads, and fails with [`Error::Timeout`]
/// if the device is still busy afterwards.
pub fn wait_ready<T: Transport + ?Sized>(
    bus: &mut T,
    profile: CommandProfile,
    budget: PollBudget,
) -> Result<()> {
    for _ in 0..budget.max_polls() {
        let status = read_status(bus, profile)?;
        if !status.is_busy() {
            return Ok(());
        }
        if budget.poll_delay_us > 0 {
            bus.delay_us(budget.poll_delay_us);
        }
    }

    log::debug!("Device still busy after {} us", budget.timeout_us);
    Err(Error::Timeout)
}

/// Write the status register
///
/// Automatically sends WREN before writing.
pub fn write_status<T: Transport + ?Sized>(
    bus: &mut T,
    profile: CommandProfile,
    value: u8,
    budget: PollBudget,
) -> Result<()> {
    write_enable(bus, profile)?;
    execute(
        bus,
        profile,
        AddressWidth::None,
        Operation::WriteStatus,
        None,
        Payload::Write(&[value]),
    )?;
    wait_ready(bus, profile, budget)
}

/// Read data starting at `addr`
///
/// Uses fast read when requested and the profile has it.
pub fn read<T: Transport + ?Sized>(
    bus: &mut T,
    profile: CommandProfile,
    width: AddressWidth,
    addr: u32,
    buf: &mut [u8],
    fast: bool,
) -> Result<()> {
    let op = if fast && profile.supports(Operation::FastRead) {
        Operation::FastRead
    } else {
        Operation::Read
    };
    execute(bus, profile, width, op, Some(addr), Payload::Read(buf))
}

/// Program up to one page
///
/// Sends WREN, the program command, then waits for completion. The caller
/// is responsible for not crossing a page boundary.
pub fn program<T: Transport + ?Sized>(
    bus: &mut T,
    profile: CommandProfile,
    width: AddressWidth,
    addr: u32,
    data: &[u8],
    budget: PollBudget,
) -> Result<()> {
    write_enable(bus, profile)?;
    execute(
        bus,
        profile,
        width,
        Operation::Program,
        Some(addr),
        Payload::Write(data),
    )?;
    wait_ready(bus, profile, budget)
}

/// Erase the sector or block containing `addr`
pub fn erase<T: Transport + ?Sized>(
    bus: &mut T,
    profile: CommandProfile,
    width: AddressWidth,
    op: Operation,
    addr: u32,
    budget: PollBudget,
) -> Result<()> {
    if !matches!(op, Operation::EraseSector | Operation::EraseBlock) {
        return Err(Error::InvalidCommand);
    }
    if !profile.supports(op) {
        return Err(Error::OperationNotSupported);
    }
    write_enable(bus, profile)?;
    execute(bus, profile, width, op, Some(addr), Payload::None)?;
    wait_ready(bus, profile, budget)
}

/// Erase the whole device
pub fn chip_erase<T: Transport + ?Sized>(
    bus: &mut T,
    profile: CommandProfile,
    budget: PollBudget,
) -> Result<()> {
    if !profile.supports(Operation::EraseChip) {
        return Err(Error::OperationNotSupported);
    }
    write_enable(bus, profile)?;
    execute(
        bus,
        profile,
        AddressWidth::None,
        Operation::EraseChip,
        None,
        Payload::None,
    )?;
    wait_ready(bus, profile, budget)
}

/// Read identification bytes into `buf`
pub fn read_id<T: Transport + ?Sized>(
    bus: &mut T,
    profile: CommandProfile,
    buf: &mut [u8],
) -> Result<()> {
    execute(
        bus,
        profile,
        AddressWidth::None,
        Operation::ReadId,
        None,
        Payload::Read(buf),
    )
}

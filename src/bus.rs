//! Two-wire bus master.
//!
//! Sequences START, address, data, ACK and STOP phases through a small
//! register-level peripheral interface and retries whole transactions on
//! NACK. Every byte phase is one write to the control register followed by
//! a wait until the peripheral drops BUSY.

use embedded_hal::i2c::{self, ErrorKind, NoAcknowledgeSource, Operation, SevenBitAddress};

/// Attempts made for one transaction before giving up
pub const MAX_ATTEMPTS: u8 = 5;

/// Status polls allowed while waiting for a single byte phase
pub const BUSY_POLL_LIMIT: u32 = 10_000;

/// Low and high SCL periods, in timer ticks, of the standard-mode profile
const SCL_LP: u32 = 6;
const SCL_HP: u32 = 4;

bitfield::bitfield! {
    /// MCS, write side
    ///
    /// Every byte phase on the bus is started by writing one of these
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct MasterControl(u8);
    impl Debug;
    u8;
    /// Enable the master to transmit or receive one byte
    pub run, set_run: 0;
    /// Generate START or repeated START before the byte
    pub start, set_start: 1;
    /// Generate STOP after the byte
    pub stop, set_stop: 2;
    /// Acknowledge the received byte
    pub ack, set_ack: 3;
}

impl MasterControl {
    fn frame(start: bool, stop: bool, ack: bool) -> Self {
        let mut control = Self(0);
        control.set_run(true);
        control.set_start(start);
        control.set_stop(stop);
        control.set_ack(ack);
        control
    }

    /// STOP without RUN: releases the bus after a failed phase
    fn release() -> Self {
        let mut control = Self(0);
        control.set_stop(true);
        control
    }
}

bitfield::bitfield! {
    /// MCS, read side
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct MasterStatus(u8);
    impl Debug;
    u8;
    /// Controller busy with the current phase
    pub busy, set_busy: 0;
    /// The last phase failed
    pub error, set_error: 1;
    /// The address was not acknowledged
    pub adrack, set_adrack: 2;
    /// The data byte was not acknowledged
    pub datack, set_datack: 3;
    /// Arbitration lost to another master
    pub arblst, set_arblst: 4;
    /// Controller idle
    pub idle, set_idle: 5;
    /// Bus busy (START seen, STOP not yet)
    pub busbsy, set_busbsy: 6;
    /// Clock low timeout
    pub clkto, set_clkto: 7;
}

impl From<u8> for MasterControl {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

impl From<MasterControl> for u8 {
    fn from(control: MasterControl) -> u8 {
        control.0
    }
}

impl From<u8> for MasterStatus {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

impl From<MasterStatus> for u8 {
    fn from(status: MasterStatus) -> u8 {
        status.0
    }
}

/// Transfer direction, carried in bit 0 of the address byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Master transmits
    Write,
    /// Master receives
    Read,
}

/// Register-level access to a two-wire master peripheral.
///
/// Clock tree, pin multiplexing and the timer period are configured by the
/// board before the first transaction; this trait only covers what a
/// transaction touches.
pub trait MasterRegisters {
    /// Load the target address register (MSA)
    fn set_target(&mut self, address: SevenBitAddress, direction: Direction);

    /// Load the data register (MDR) with the next byte to transmit
    fn write_data(&mut self, byte: u8);

    /// Take the last received byte from the data register
    fn read_data(&mut self) -> u8;

    /// Write the control register, starting a byte phase
    fn write_control(&mut self, control: MasterControl);

    /// Read the status register
    fn read_status(&mut self) -> MasterStatus;
}

/// Retry and polling bounds for a [`BusMaster`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    /// Attempts per transaction, including the first
    pub max_attempts: u8,
    /// Status reads per byte phase before reporting a timeout
    pub busy_poll_limit: u32,
}

impl BusConfig {
    /// Five attempts, generous busy polling
    pub const DEFAULT: Self = Self {
        max_attempts: MAX_ATTEMPTS,
        busy_poll_limit: BUSY_POLL_LIMIT,
    };

    /// Timer period register value for the given system clock and SCL rate
    ///
    /// `SCL period = 2 * (1 + TPR) * (SCL_LP + SCL_HP) * clock period`, so
    /// 120 MHz at 100 kHz gives 59. Returns `None` when the rate cannot be
    /// reached with the 7-bit period field.
    #[must_use]
    pub const fn timer_period(sys_clk_hz: u32, scl_hz: u32) -> Option<u8> {
        let Some(divisor) = scl_hz.checked_mul(2 * (SCL_LP + SCL_HP)) else {
            return None;
        };
        if divisor == 0 {
            return None;
        }
        let ticks = sys_clk_hz / divisor;
        if ticks == 0 || ticks - 1 > 0x7F {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        Some((ticks - 1) as u8)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Transaction failure after the retry bound was exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// No device acknowledged its address
    AddressNack {
        /// Attempts made
        attempts: u8,
    },
    /// The device refused a data byte
    DataNack {
        /// Attempts made
        attempts: u8,
    },
    /// Another master won arbitration
    ArbitrationLost {
        /// Attempts made
        attempts: u8,
    },
    /// The peripheral never left BUSY
    Timeout {
        /// Attempts made
        attempts: u8,
    },
    /// The address does not fit in 7 bits; nothing was sent
    InvalidAddress(u8),
}

impl BusError {
    /// Number of attempts made before the error surfaced
    #[must_use]
    pub const fn attempts(&self) -> u8 {
        match *self {
            Self::AddressNack { attempts }
            | Self::DataNack { attempts }
            | Self::ArbitrationLost { attempts }
            | Self::Timeout { attempts } => attempts,
            Self::InvalidAddress(_) => 0,
        }
    }
}

impl core::fmt::Display for BusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AddressNack { attempts } => write!(f, "address NACK after {attempts} attempts"),
            Self::DataNack { attempts } => write!(f, "data NACK after {attempts} attempts"),
            Self::ArbitrationLost { attempts } => {
                write!(f, "arbitration lost after {attempts} attempts")
            }
            Self::Timeout { attempts } => write!(f, "bus timeout after {attempts} attempts"),
            Self::InvalidAddress(address) => write!(f, "invalid 7-bit address 0x{address:02X}"),
        }
    }
}

impl i2c::Error for BusError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::AddressNack { .. } => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            Self::DataNack { .. } => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            Self::ArbitrationLost { .. } => ErrorKind::ArbitrationLoss,
            Self::Timeout { .. } | Self::InvalidAddress(_) => ErrorKind::Other,
        }
    }
}

/// Failure of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Failure {
    AddressNack,
    DataNack,
    ArbitrationLost,
    Timeout,
}

impl Failure {
    fn into_error(self, attempts: u8) -> BusError {
        match self {
            Self::AddressNack => BusError::AddressNack { attempts },
            Self::DataNack => BusError::DataNack { attempts },
            Self::ArbitrationLost => BusError::ArbitrationLost { attempts },
            Self::Timeout => BusError::Timeout { attempts },
        }
    }
}

fn direction_of(operation: &Operation<'_>) -> Direction {
    match operation {
        Operation::Write(_) => Direction::Write,
        Operation::Read(_) => Direction::Read,
    }
}

fn is_empty(operation: &Operation<'_>) -> bool {
    match operation {
        Operation::Write(bytes) => bytes.is_empty(),
        Operation::Read(buffer) => buffer.is_empty(),
    }
}

/// Single-owner master for one two-wire bus
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusMaster<R> {
    regs: R,
    config: BusConfig,
}

impl<R> BusMaster<R>
where
    R: MasterRegisters,
{
    /// Create a bus master with [`BusConfig::DEFAULT`]
    pub fn new(regs: R) -> Self {
        Self::with_config(regs, BusConfig::DEFAULT)
    }

    /// Create a bus master with explicit retry and polling bounds
    pub fn with_config(regs: R, config: BusConfig) -> Self {
        Self { regs, config }
    }

    /// Release the peripheral, consuming the master
    pub fn release(self) -> R {
        self.regs
    }

    /// Active configuration
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Run one addressed transaction, retrying it whole on failure.
    ///
    /// Adjacent operations in the same direction share one START; a change
    /// of direction issues a repeated START and the last operation ends in
    /// STOP. Empty operations are skipped.
    ///
    /// # Errors
    ///
    /// Returns the failure of the final attempt once
    /// [`BusConfig::max_attempts`] attempts have failed, or
    /// [`BusError::InvalidAddress`] without touching the bus.
    pub fn transact(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), BusError> {
        if address > 0x7F {
            return Err(BusError::InvalidAddress(address));
        }

        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(address, operations) {
                Ok(()) => return Ok(()),
                Err(failure) if attempt >= max_attempts => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!(
                        "Transaction to 0x{:02X} failed after {} attempts: {}",
                        address,
                        attempt,
                        failure
                    );
                    return Err(failure.into_error(attempt));
                }
                Err(_failure) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!(
                        "Transaction to 0x{:02X} attempt {} failed: {}, retrying",
                        address,
                        attempt,
                        _failure
                    );
                    attempt += 1;
                }
            }
        }
    }

    fn attempt(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Failure> {
        let Some(last) = operations.iter().rposition(|op| !is_empty(op)) else {
            return Ok(());
        };

        let mut previous: Option<Direction> = None;
        for index in 0..=last {
            let next = operations[index + 1..=last]
                .iter()
                .find(|op| !is_empty(op))
                .map(direction_of);
            let final_operation = index == last;

            match &mut operations[index] {
                Operation::Write(bytes) => {
                    if bytes.is_empty() {
                        continue;
                    }
                    let start = previous != Some(Direction::Write);
                    if start {
                        self.regs.set_target(address, Direction::Write);
                    }
                    let count = bytes.len();
                    for (i, &byte) in bytes.iter().enumerate() {
                        self.regs.write_data(byte);
                        let stop = final_operation && i + 1 == count;
                        self.execute(MasterControl::frame(start && i == 0, stop, false))?;
                    }
                    previous = Some(Direction::Write);
                }
                Operation::Read(buffer) => {
                    if buffer.is_empty() {
                        continue;
                    }
                    let start = previous != Some(Direction::Read);
                    if start {
                        self.regs.set_target(address, Direction::Read);
                    }
                    let count = buffer.len();
                    // the last byte of a read run is NACKed so the target
                    // releases SDA before the repeated START or STOP
                    let run_ends = next != Some(Direction::Read);
                    for (i, slot) in buffer.iter_mut().enumerate() {
                        let last_byte = i + 1 == count;
                        let stop = final_operation && last_byte;
                        let ack = !(run_ends && last_byte);
                        self.execute(MasterControl::frame(start && i == 0, stop, ack))?;
                        *slot = self.regs.read_data();
                    }
                    previous = Some(Direction::Read);
                }
            }
        }

        Ok(())
    }

    fn execute(&mut self, control: MasterControl) -> Result<(), Failure> {
        #[cfg(feature = "defmt")]
        defmt::trace!("MCS <- 0x{:02X}", control.0);

        self.regs.write_control(control);
        let status = self.wait_until_idle()?;
        if !status.error() {
            return Ok(());
        }

        let failure = if status.arblst() {
            Failure::ArbitrationLost
        } else if status.adrack() {
            Failure::AddressNack
        } else {
            Failure::DataNack
        };

        if !status.arblst() && !control.stop() {
            self.regs.write_control(MasterControl::release());
            // the NACK is what gets reported, even if STOP never completes
            if self.wait_until_idle().is_err() {
                #[cfg(feature = "defmt")]
                defmt::warn!("STOP after {} did not complete", failure);
            }
        }

        Err(failure)
    }

    fn wait_until_idle(&mut self) -> Result<MasterStatus, Failure> {
        for _ in 0..self.config.busy_poll_limit.max(1) {
            let status = self.regs.read_status();
            if !status.busy() {
                return Ok(status);
            }
        }
        Err(Failure::Timeout)
    }
}

impl<R> i2c::ErrorType for BusMaster<R>
where
    R: MasterRegisters,
{
    type Error = BusError;
}

impl<R> i2c::I2c for BusMaster<R>
where
    R: MasterRegisters,
{
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.transact(address, operations)
    }
}

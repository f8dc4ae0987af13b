//! Register-level driver for the VL53L1X time-of-flight sensor

use embedded_hal::{
    delay::DelayNs,
    digital::OutputPin,
    i2c::{I2c, SevenBitAddress},
};

use crate::{
    error::Error,
    register::{
        DEFAULT_CONFIGURATION, GpioHvMuxCtrl, GpioTioHvStatus, MODE_START_RANGING,
        MODE_STOP_RANGING, RESULT_BLOCK_LEN, Register, ResultRangeStatus,
    },
    status::RangeStatus,
    utils,
};

/// Default 7-bit bus address (0x52 as an 8-bit write address)
pub const DEFAULT_ADDRESS: SevenBitAddress = 0x29;

/// Data-ready polls allowed for the VHV measurement inside [`Vl53l1x::initialize`]
pub const INIT_POLL_LIMIT: u32 = 1_000;

/// How long [`power_cycle`] holds XSHUT low
const XSHUT_LOW_MS: u32 = 10;

/// One consistent snapshot of the result registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// Range status
    pub status: RangeStatus,
    /// Distance in millimeters
    pub distance_mm: u16,
    /// Peak signal rate in kcps
    pub signal_rate_kcps: u16,
    /// Ambient rate in kcps
    pub ambient_rate_kcps: u16,
    /// Number of enabled SPADs
    pub spad_count: u16,
}

/// VL53L1X driver instance
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Vl53l1x<I2C> {
    i2c: I2C,
    address: SevenBitAddress,
    init_poll_limit: u32,
}

impl<I2C, E> Vl53l1x<I2C>
where
    I2C: I2c<Error = E>,
{
    /// Create a driver for a sensor at [`DEFAULT_ADDRESS`]
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, DEFAULT_ADDRESS)
    }

    /// Create a driver for a sensor at a non-default address
    pub fn with_address(i2c: I2C, address: SevenBitAddress) -> Self {
        Self {
            i2c,
            address,
            init_poll_limit: INIT_POLL_LIMIT,
        }
    }

    /// Bound the data-ready polling done during [`Self::initialize`]
    #[must_use]
    pub fn with_init_poll_limit(mut self, polls: u32) -> Self {
        self.init_poll_limit = polls.max(1);
        self
    }

    /// Release the bus, consuming the driver
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Bus address this driver talks to
    pub fn address(&self) -> SevenBitAddress {
        self.address
    }

    /// Whether the sensor firmware has finished booting
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the bus transaction fails
    pub fn boot_state(&mut self) -> Result<bool, Error<E>> {
        let status = self.read_byte(Register::FirmwareSystemStatus)?;
        Ok(status != 0)
    }

    /// Model id, `0xEACC` for a VL53L1X
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the bus transaction fails
    pub fn sensor_id(&mut self) -> Result<u16, Error<E>> {
        self.read_word(Register::IdentificationModelId)
    }

    /// Load the default configuration and run the VHV calibration.
    ///
    /// Writes the configuration block in one transaction, takes one
    /// measurement to settle VHV, then leaves the sensor stopped with the
    /// interrupt cleared.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if any transaction fails, or
    /// [`Error::InitTimeout`] if the calibration measurement never completes
    pub fn initialize(&mut self) -> Result<(), Error<E>> {
        #[cfg(feature = "defmt")]
        defmt::info!("Loading default configuration");

        let mut frame = [0u8; 2 + DEFAULT_CONFIGURATION.len()];
        frame[..2].copy_from_slice(&u16::from(Register::ConfigurationStart).to_be_bytes());
        frame[2..].copy_from_slice(&DEFAULT_CONFIGURATION);
        self.i2c.write(self.address, &frame).map_err(Error::Bus)?;

        self.start_ranging()?;

        let mut polls = 0;
        while !self.is_data_ready()? {
            polls += 1;
            if polls >= self.init_poll_limit {
                #[cfg(feature = "defmt")]
                defmt::warn!("VHV measurement did not complete after {} polls", polls);
                return Err(Error::InitTimeout);
            }
        }

        self.clear_interrupt()?;
        self.stop_ranging()?;
        self.write_byte(Register::VhvConfigTimeoutMacropLoopBound, 0x09)?;
        self.write_byte(Register::VhvConfigInit, 0x00)?;

        #[cfg(feature = "defmt")]
        defmt::info!("Sensor initialized");

        Ok(())
    }

    /// Start continuous ranging
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the bus transaction fails
    pub fn start_ranging(&mut self) -> Result<(), Error<E>> {
        self.write_byte(Register::SystemModeStart, MODE_START_RANGING)
    }

    /// Stop ranging
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the bus transaction fails
    pub fn stop_ranging(&mut self) -> Result<(), Error<E>> {
        self.write_byte(Register::SystemModeStart, MODE_STOP_RANGING)
    }

    /// Whether a completed measurement is waiting to be read
    ///
    /// Compares the interrupt line against the configured polarity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if a bus transaction fails
    pub fn is_data_ready(&mut self) -> Result<bool, Error<E>> {
        let mux = GpioHvMuxCtrl(self.read_byte(Register::GpioHvMuxCtrl)?);
        let status = GpioTioHvStatus(self.read_byte(Register::GpioTioHvStatus)?);
        Ok(status.interrupt() == mux.ready_level())
    }

    /// Re-arm the interrupt; the sensor reports no new data until this is done
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the bus transaction fails
    pub fn clear_interrupt(&mut self) -> Result<(), Error<E>> {
        self.write_byte(Register::SystemInterruptClear, 0x01)
    }

    /// Read status, distance, rates and SPAD count in one transaction
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the bus transaction fails
    pub fn read_result(&mut self) -> Result<Measurement, Error<E>> {
        let mut block = [0u8; RESULT_BLOCK_LEN];
        self.read_block(Register::ResultRangeStatus, &mut block)?;

        let measurement = Measurement {
            status: RangeStatus::from_device(ResultRangeStatus(block[0]).range_status()),
            spad_count: u16::from(block[3]),
            ambient_rate_kcps: utils::be_u16(&block, 7).saturating_mul(8),
            distance_mm: utils::be_u16(&block, 13),
            signal_rate_kcps: utils::be_u16(&block, 15).saturating_mul(8),
        };

        #[cfg(feature = "defmt")]
        defmt::trace!("Result block: {}", measurement);

        Ok(measurement)
    }

    /// Range status and distance in millimeters
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the bus transaction fails
    pub fn read_status_and_distance(&mut self) -> Result<(RangeStatus, u16), Error<E>> {
        let measurement = self.read_result()?;
        Ok((measurement.status, measurement.distance_mm))
    }

    /// Peak signal rate in kcps
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the bus transaction fails
    pub fn read_signal_rate(&mut self) -> Result<u16, Error<E>> {
        let rate = self.read_word(Register::ResultPeakSignalCountRateCrosstalkCorrectedMcpsSd0)?;
        Ok(rate.saturating_mul(8))
    }

    /// Ambient rate in kcps
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the bus transaction fails
    pub fn read_ambient_rate(&mut self) -> Result<u16, Error<E>> {
        let rate = self.read_word(Register::ResultAmbientCountRateMcpsSd)?;
        Ok(rate.saturating_mul(8))
    }

    /// Number of enabled SPADs
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the bus transaction fails
    pub fn read_spad_count(&mut self) -> Result<u16, Error<E>> {
        let spads = self.read_word(Register::ResultDssActualEffectiveSpadsSd0)?;
        Ok(spads >> 8)
    }

    /// Read one register byte
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the bus transaction fails
    pub fn read_byte<R>(&mut self, register: R) -> Result<u8, Error<E>>
    where
        R: Into<u16>,
    {
        let mut buffer = [0u8; 1];
        self.read_block(register, &mut buffer)?;
        Ok(buffer[0])
    }

    /// Read one big-endian register word
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the bus transaction fails
    pub fn read_word<R>(&mut self, register: R) -> Result<u16, Error<E>>
    where
        R: Into<u16>,
    {
        let mut buffer = [0u8; 2];
        self.read_block(register, &mut buffer)?;
        Ok(u16::from_be_bytes(buffer))
    }

    /// Read consecutive registers starting at `register`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the bus transaction fails
    pub fn read_block<R>(&mut self, register: R, buffer: &mut [u8]) -> Result<(), Error<E>>
    where
        R: Into<u16>,
    {
        let index: u16 = register.into();

        #[cfg(feature = "defmt")]
        defmt::trace!("Reading {} bytes from 0x{:04X}", buffer.len(), index);

        self.i2c
            .write_read(self.address, &index.to_be_bytes(), buffer)
            .map_err(Error::Bus)
    }

    /// Write one register byte
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the bus transaction fails
    pub fn write_byte<R>(&mut self, register: R, value: u8) -> Result<(), Error<E>>
    where
        R: Into<u16>,
    {
        let index: u16 = register.into();
        let [hi, lo] = index.to_be_bytes();

        #[cfg(feature = "defmt")]
        defmt::trace!("Writing 0x{:02X} to 0x{:02X}{:02X}", value, hi, lo);

        self.i2c
            .write(self.address, &[hi, lo, value])
            .map_err(Error::Bus)
    }

    /// Write one big-endian register word
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the bus transaction fails
    pub fn write_word<R>(&mut self, register: R, value: u16) -> Result<(), Error<E>>
    where
        R: Into<u16>,
    {
        let index: u16 = register.into();
        let [hi, lo] = index.to_be_bytes();
        let [msb, lsb] = value.to_be_bytes();
        self.i2c
            .write(self.address, &[hi, lo, msb, lsb])
            .map_err(Error::Bus)
    }
}

/// Power-cycle the sensor through its active-low XSHUT line
///
/// Holds XSHUT low for 10 ms and releases it. The sensor reboots and must
/// be waited on with [`Vl53l1x::boot_state`] again.
///
/// # Errors
///
/// Returns the pin error if XSHUT cannot be driven
pub fn power_cycle<X, D>(xshut: &mut X, delay: &mut D) -> Result<(), X::Error>
where
    X: OutputPin,
    D: DelayNs,
{
    xshut.set_low()?;
    delay.delay_ms(XSHUT_LOW_MS);
    xshut.set_high()
}

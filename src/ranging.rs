//! Ranging state machine.
//!
//! Drives a [`Vl53l1x`] through boot, initialization and continuous ranging,
//! then produces samples one poll/read/clear cycle at a time. A sample is
//! only handed out after its interrupt has been cleared, so the next
//! readiness poll always sees a re-armed sensor.

use embedded_hal::{delay::DelayNs, i2c::I2c};

use crate::{
    driver::{Measurement, Vl53l1x},
    error::Error,
    status::RangeStatus,
};

/// Where the ranging state machine currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RangingState {
    /// Nothing sent to the sensor yet
    Unbooted,
    /// Polling the boot flag
    Booting,
    /// Sensor booted, configuration not loaded
    Booted,
    /// Configuration loaded, ranging not started
    Initialized,
    /// Ranging, ready for the next sample
    Ranging,
    /// Polling the data-ready flag
    WaitingReady,
    /// Reading the result block
    Reading,
    /// Re-arming the interrupt
    ClearingInterrupt,
    /// Ranging stopped; no further transactions
    Stopped,
    /// A transaction failed; no further transactions
    Faulted,
}

/// Poll intervals and bounds for the blocking waits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollTiming {
    /// Delay between boot-flag polls
    pub boot_interval_ms: u32,
    /// Boot-flag polls before giving up
    pub boot_attempts: u32,
    /// Delay between data-ready polls
    pub ready_interval_ms: u32,
    /// Data-ready polls before giving up
    pub ready_attempts: u32,
}

impl PollTiming {
    /// 10 ms boot polling for up to one second, 5 ms data-ready polling for
    /// up to one second
    pub const DEFAULT: Self = Self {
        boot_interval_ms: 10,
        boot_attempts: 100,
        ready_interval_ms: 5,
        ready_attempts: 200,
    };
}

impl Default for PollTiming {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One distance sample taken at a scan position
///
/// Only [`Ranger::sample`] produces these, after a successful data-ready
/// poll and the interrupt clear that follows the read.
///
/// ```compile_fail
/// use vl53l1x_scanner::{Measurement, RangeSample, RangeStatus};
///
/// let measurement = Measurement {
///     status: RangeStatus::Valid,
///     distance_mm: 9999,
///     signal_rate_kcps: 0,
///     ambient_rate_kcps: 0,
///     spad_count: 0,
/// };
/// let _ = RangeSample::new(7, measurement);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RangeSample {
    index: u16,
    measurement: Measurement,
}

impl RangeSample {
    /// Wrap a measurement with its sequence index
    pub(crate) const fn new(index: u16, measurement: Measurement) -> Self {
        Self { index, measurement }
    }

    /// Sequence index, counting from 0
    #[must_use]
    pub const fn index(&self) -> u16 {
        self.index
    }

    /// Distance in millimeters
    #[must_use]
    pub const fn distance_mm(&self) -> u16 {
        self.measurement.distance_mm
    }

    /// Range status
    #[must_use]
    pub const fn status(&self) -> RangeStatus {
        self.measurement.status
    }

    /// Peak signal rate in kcps
    #[must_use]
    pub const fn signal_rate_kcps(&self) -> u16 {
        self.measurement.signal_rate_kcps
    }

    /// Ambient rate in kcps
    #[must_use]
    pub const fn ambient_rate_kcps(&self) -> u16 {
        self.measurement.ambient_rate_kcps
    }

    /// Number of enabled SPADs
    #[must_use]
    pub const fn spad_count(&self) -> u16 {
        self.measurement.spad_count
    }

    /// The underlying result snapshot
    #[must_use]
    pub const fn measurement(&self) -> &Measurement {
        &self.measurement
    }
}

/// Ranging state machine owning the sensor handle
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ranger<I2C> {
    sensor: Vl53l1x<I2C>,
    timing: PollTiming,
    state: RangingState,
    next_index: u16,
}

impl<I2C, E> Ranger<I2C>
where
    I2C: I2c<Error = E>,
{
    /// Create an unbooted state machine with [`PollTiming::DEFAULT`]
    pub fn new(sensor: Vl53l1x<I2C>) -> Self {
        Self::with_timing(sensor, PollTiming::DEFAULT)
    }

    /// Create an unbooted state machine with explicit poll timing
    pub fn with_timing(sensor: Vl53l1x<I2C>, timing: PollTiming) -> Self {
        Self {
            sensor,
            timing,
            state: RangingState::Unbooted,
            next_index: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> RangingState {
        self.state
    }

    /// Samples produced so far
    pub fn samples_taken(&self) -> u16 {
        self.next_index
    }

    /// Release the sensor handle, consuming the state machine
    pub fn release(self) -> Vl53l1x<I2C> {
        self.sensor
    }

    /// Wait for boot, load the configuration and start continuous ranging
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the machine is unbooted.
    /// Any other error leaves the machine [`RangingState::Faulted`].
    pub fn start<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<E>> {
        self.require(RangingState::Unbooted)?;
        let result = self.bring_up(delay);
        self.settle(result)
    }

    /// Take exactly one sample: wait for data, read it, clear the interrupt
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the machine is ranging.
    /// Any other error leaves the machine [`RangingState::Faulted`] and the
    /// partially read sample is dropped.
    pub fn sample<D: DelayNs>(&mut self, delay: &mut D) -> Result<RangeSample, Error<E>> {
        self.require(RangingState::Ranging)?;
        let result = self.cycle(delay);
        self.settle(result)
    }

    /// Stop ranging; the machine issues no transactions afterwards
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the machine is ranging, or
    /// [`Error::Bus`] if the stop transaction fails
    pub fn stop(&mut self) -> Result<(), Error<E>> {
        self.require(RangingState::Ranging)?;
        let result = self.sensor.stop_ranging();
        if result.is_ok() {
            self.state = RangingState::Stopped;

            #[cfg(feature = "defmt")]
            defmt::info!("Ranging stopped after {} samples", self.next_index);
        } else {
            self.state = RangingState::Faulted;
        }

        result
    }

    fn require(&self, state: RangingState) -> Result<(), Error<E>> {
        if self.state == state {
            Ok(())
        } else {
            #[cfg(feature = "defmt")]
            defmt::warn!("Expected {} but in {}", state, self.state);
            Err(Error::InvalidState(self.state))
        }
    }

    fn settle<T>(&mut self, result: Result<T, Error<E>>) -> Result<T, Error<E>> {
        if result.is_err() {
            self.state = RangingState::Faulted;
        }
        result
    }

    fn bring_up<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<E>> {
        self.state = RangingState::Booting;
        self.wait_for_boot(delay)?;

        #[cfg(feature = "defmt")]
        defmt::info!("Sensor booted");

        self.state = RangingState::Booted;
        self.sensor.initialize()?;
        self.state = RangingState::Initialized;
        self.sensor.start_ranging()?;
        self.state = RangingState::Ranging;
        Ok(())
    }

    fn cycle<D: DelayNs>(&mut self, delay: &mut D) -> Result<RangeSample, Error<E>> {
        self.state = RangingState::WaitingReady;
        self.wait_for_data(delay)?;

        self.state = RangingState::Reading;
        let measurement = self.sensor.read_result()?;

        self.state = RangingState::ClearingInterrupt;
        self.sensor.clear_interrupt()?;

        let sample = RangeSample::new(self.next_index, measurement);
        self.next_index = self.next_index.wrapping_add(1);
        self.state = RangingState::Ranging;

        #[cfg(feature = "defmt")]
        defmt::debug!("Sample {}: {}", sample.index(), sample);

        Ok(sample)
    }

    fn wait_for_boot<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<E>> {
        let attempts = self.timing.boot_attempts.max(1);
        for attempt in 1..=attempts {
            if self.sensor.boot_state()? {
                return Ok(());
            }
            if attempt < attempts {
                delay.delay_ms(self.timing.boot_interval_ms);
            }
        }
        Err(Error::BootTimeout)
    }

    fn wait_for_data<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<E>> {
        let attempts = self.timing.ready_attempts.max(1);
        for attempt in 1..=attempts {
            if self.sensor.is_data_ready()? {
                return Ok(());
            }
            if attempt < attempts {
                delay.delay_ms(self.timing.ready_interval_ms);
            }
        }
        Err(Error::DataReadyTimeout)
    }
}

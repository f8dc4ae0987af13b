//! Scan orchestration: one stepper advance, then one sample, per position.

use core::num::NonZeroU32;

use embedded_hal::{delay::DelayNs, i2c::I2c};

use crate::{
    error::ScanError,
    ranging::{Ranger, RangingState},
    report::{Indicator, Report},
    stepper::{Coils, Stepper},
};

/// 64 full coil cycles of 4 phases: 1/8 revolution of a 2048-step rotor
const DEFAULT_STEPS_PER_POSITION: NonZeroU32 = match NonZeroU32::new(64 * 4) {
    Some(steps) => steps,
    None => unreachable!(),
};

/// Fixed shape of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanPlan {
    /// Scan positions, one sample each
    pub positions: u16,
    /// Phase steps between positions
    pub steps_per_position: NonZeroU32,
    /// Hold time of each phase
    pub phase_delay_us: u32,
}

impl ScanPlan {
    /// Eight positions over one revolution
    pub const DEFAULT: Self = Self::new(8, DEFAULT_STEPS_PER_POSITION, 4_167);

    /// Plan with explicit values
    #[must_use]
    pub const fn new(positions: u16, steps_per_position: NonZeroU32, phase_delay_us: u32) -> Self {
        Self {
            positions,
            steps_per_position,
            phase_delay_us,
        }
    }
}

impl Default for ScanPlan {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Interleaves stepper motion with ranging and forwards every sample
#[derive(Debug)]
pub struct Scanner<I2C, C, R, L = ()> {
    ranger: Ranger<I2C>,
    stepper: Stepper<C>,
    reporter: R,
    indicator: L,
    plan: ScanPlan,
}

impl<I2C, C, R> Scanner<I2C, C, R> {
    /// Create a scanner without a status indicator
    pub fn new(ranger: Ranger<I2C>, stepper: Stepper<C>, reporter: R, plan: ScanPlan) -> Self {
        Self {
            ranger,
            stepper,
            reporter,
            indicator: (),
            plan,
        }
    }
}

impl<I2C, C, R, L> Scanner<I2C, C, R, L> {
    /// Attach a status indicator
    pub fn with_indicator<N>(self, indicator: N) -> Scanner<I2C, C, R, N> {
        Scanner {
            ranger: self.ranger,
            stepper: self.stepper,
            reporter: self.reporter,
            indicator,
            plan: self.plan,
        }
    }

    /// The plan this scanner follows
    pub fn plan(&self) -> &ScanPlan {
        &self.plan
    }

    /// Ranging state machine, for inspection
    pub fn ranger(&self) -> &Ranger<I2C> {
        &self.ranger
    }

    /// Release all parts
    pub fn release(self) -> (Ranger<I2C>, Stepper<C>, R, L) {
        (self.ranger, self.stepper, self.reporter, self.indicator)
    }
}

impl<I2C, E, C, R, L> Scanner<I2C, C, R, L>
where
    I2C: I2c<Error = E>,
    C: Coils,
    R: Report,
    L: Indicator,
{
    /// Run the whole scan.
    ///
    /// Starts ranging, then for every position advances the stepper, takes
    /// one sample and reports it. Ranging is stopped exactly once at the end
    /// and the coils are released.
    ///
    /// # Errors
    ///
    /// Any failure halts the scan. Ranging is stopped if the sensor is still
    /// measuring, the coils are released, the fault is passed to the
    /// reporter and the error is returned.
    pub fn run<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), ScanError<E, C::Error>> {
        let result = self.scan(delay);
        if let Err(error) = &result {
            if self.ranger.state() == RangingState::Ranging && self.ranger.stop().is_err() {
                #[cfg(feature = "defmt")]
                defmt::warn!("Could not stop ranging after fault");
            }
            if self.stepper.idle().is_err() {
                #[cfg(feature = "defmt")]
                defmt::warn!("Could not release coils after fault");
            }
            self.reporter.fault(error.fault());
        }
        result
    }

    fn scan<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), ScanError<E, C::Error>> {
        self.ranger.start(delay)?;
        self.indicator.booted();

        #[cfg(feature = "defmt")]
        defmt::info!("Scanning {} positions", self.plan.positions);

        for _ in 0..self.plan.positions {
            self.stepper
                .advance(
                    self.plan.steps_per_position.get(),
                    self.plan.phase_delay_us,
                    delay,
                )
                .map_err(ScanError::Coils)?;

            let sample = self.ranger.sample(delay)?;
            self.reporter.sample(&sample);
            self.indicator.sampled(sample.index());
        }

        self.ranger.stop()?;
        self.stepper.idle().map_err(ScanError::Coils)?;
        Ok(())
    }
}

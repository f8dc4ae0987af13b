//! Open-loop 4-phase stepper sequencing.

use embedded_hal::{delay::DelayNs, digital::OutputPin};

/// Output pattern with every coil released
pub const IDLE_PATTERN: u8 = 0b0000;

/// Coil-energization phase of a 4-phase full-step cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Coils 0 and 3
    A,
    /// Coils 2 and 3
    B,
    /// Coils 1 and 2
    C,
    /// Coils 0 and 1
    D,
}

impl Phase {
    /// Phases in forward order
    pub const CYCLE: [Phase; 4] = [Phase::A, Phase::B, Phase::C, Phase::D];

    /// Bit pattern for the 4 coil outputs, bit *n* drives coil *n*
    #[must_use]
    pub const fn pattern(self) -> u8 {
        match self {
            Phase::A => 0b1001,
            Phase::B => 0b1100,
            Phase::C => 0b0110,
            Phase::D => 0b0011,
        }
    }

    /// Phase that follows this one when turning in `rotation`
    #[must_use]
    pub const fn next(self, rotation: Rotation) -> Phase {
        match (rotation, self) {
            (Rotation::Forward, Phase::A) | (Rotation::Reverse, Phase::C) => Phase::B,
            (Rotation::Forward, Phase::B) | (Rotation::Reverse, Phase::D) => Phase::C,
            (Rotation::Forward, Phase::C) | (Rotation::Reverse, Phase::A) => Phase::D,
            (Rotation::Forward, Phase::D) | (Rotation::Reverse, Phase::B) => Phase::A,
        }
    }
}

/// Order in which [`Phase::CYCLE`] is walked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rotation {
    /// A, B, C, D
    #[default]
    Forward,
    /// A, D, C, B
    Reverse,
}

/// 4-bit parallel coil output
pub trait Coils {
    /// Error raised while driving the outputs
    type Error;

    /// Drive all 4 coil lines from the low nibble of `pattern`
    fn energize(&mut self, pattern: u8) -> Result<(), Self::Error>;
}

impl<P> Coils for [P; 4]
where
    P: OutputPin,
{
    type Error = P::Error;

    fn energize(&mut self, pattern: u8) -> Result<(), Self::Error> {
        for (bit, pin) in self.iter_mut().enumerate() {
            if pattern & (1 << bit) != 0 {
                pin.set_high()?;
            } else {
                pin.set_low()?;
            }
        }
        Ok(())
    }
}

/// Stepper sequencer holding the current phase and rotation
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stepper<C> {
    coils: C,
    phase: Phase,
    rotation: Rotation,
}

impl<C> Stepper<C>
where
    C: Coils,
{
    /// Create a sequencer starting at [`Phase::A`], turning forward
    pub fn new(coils: C) -> Self {
        Self {
            coils,
            phase: Phase::A,
            rotation: Rotation::Forward,
        }
    }

    /// Phase applied by the next step
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current rotation
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Change rotation; takes effect on the next step
    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
    }

    /// Release the coil outputs, consuming the sequencer
    pub fn release(self) -> C {
        self.coils
    }

    /// Apply `steps` phases, holding each for `phase_delay_us`
    ///
    /// # Errors
    ///
    /// Returns the output error if a coil line cannot be driven
    pub fn advance<D: DelayNs>(
        &mut self,
        steps: u32,
        phase_delay_us: u32,
        delay: &mut D,
    ) -> Result<(), C::Error> {
        for _ in 0..steps {
            self.coils.energize(self.phase.pattern())?;
            delay.delay_us(phase_delay_us);
            self.phase = self.phase.next(self.rotation);
        }
        Ok(())
    }

    /// Release all coils
    ///
    /// # Errors
    ///
    /// Returns the output error if a coil line cannot be driven
    pub fn idle(&mut self) -> Result<(), C::Error> {
        self.coils.energize(IDLE_PATTERN)
    }
}

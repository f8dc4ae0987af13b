use crate::ranging::RangingState;

/// Error type for sensor and ranging operations
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Bus transaction failed after the bus layer's own retries
    Bus(E),
    /// The sensor never reported booted within the poll bound
    BootTimeout,
    /// The sensor never finished its first measurement during initialization
    InitTimeout,
    /// No measurement became ready within the poll bound
    DataReadyTimeout,
    /// Operation not allowed in the current ranging state
    InvalidState(RangingState),
}

impl<E> Error<E> {
    /// Plain fault code for reporting
    pub fn fault(&self) -> Fault {
        match self {
            Self::Bus(_) => Fault::Bus,
            Self::BootTimeout => Fault::BootTimeout,
            Self::InitTimeout => Fault::InitTimeout,
            Self::DataReadyTimeout => Fault::DataReadyTimeout,
            Self::InvalidState(_) => Fault::InvalidState,
        }
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus error: {e:?}"),
            Self::InvalidState(state) => write!(f, "not allowed in state {state:?}"),
            other => write!(f, "{}", other.fault()),
        }
    }
}

/// Error type for a full scan
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanError<E, C> {
    /// The ranging state machine failed
    Ranging(Error<E>),
    /// Driving the motor coil outputs failed
    Coils(C),
}

impl<E, C> ScanError<E, C> {
    /// Plain fault code for reporting
    pub fn fault(&self) -> Fault {
        match self {
            Self::Ranging(e) => e.fault(),
            Self::Coils(_) => Fault::Coils,
        }
    }
}

impl<E, C> From<Error<E>> for ScanError<E, C> {
    fn from(error: Error<E>) -> Self {
        Self::Ranging(error)
    }
}

/// Fatal condition handed to the reporting collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// Sensor absent or bus wedged
    Bus,
    /// Sensor never booted
    BootTimeout,
    /// Sensor initialization never completed
    InitTimeout,
    /// Sensor stopped producing samples
    DataReadyTimeout,
    /// Ranging operation issued out of order
    InvalidState,
    /// Motor outputs could not be driven
    Coils,
}

impl core::fmt::Display for Fault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            Self::Bus => "bus error",
            Self::BootTimeout => "boot timeout",
            Self::InitTimeout => "init timeout",
            Self::DataReadyTimeout => "data ready timeout",
            Self::InvalidState => "invalid state",
            Self::Coils => "coil output error",
        };
        f.write_str(text)
    }
}

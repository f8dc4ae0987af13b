//! Range status codes reported alongside each distance.

use crate::utils;

/// Quality classification of one ranging measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RangeStatus {
    /// `0`: distance is valid
    Valid,
    /// `1`: sigma estimate above threshold
    SigmaFailure,
    /// `2`: return signal below threshold
    SignalFailure,
    /// `3`: target below minimum range
    MinRangeFailure,
    /// `4`: phase out of the valid window
    OutOfBounds,
    /// `5`: hardware or VCSEL failure
    HardwareFailure,
    /// `7`: wrapped target, distance is aliased
    WrapAround,
    /// `255`: the device produced no usable status
    NoUpdate,
    /// Any other status code
    Other(u8),
}

impl RangeStatus {
    /// Decode a raw `RESULT__RANGE_STATUS` byte
    #[must_use]
    pub fn from_device(raw: u8) -> Self {
        Self::from(utils::map_range_status(raw))
    }

    /// Numeric status code as reported on the serial line
    #[must_use]
    pub fn code(self) -> u8 {
        u8::from(self)
    }

    /// `true` only for [`RangeStatus::Valid`]
    #[must_use]
    pub fn is_valid(self) -> bool {
        self == Self::Valid
    }
}

impl From<u8> for RangeStatus {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Valid,
            1 => Self::SigmaFailure,
            2 => Self::SignalFailure,
            3 => Self::MinRangeFailure,
            4 => Self::OutOfBounds,
            5 => Self::HardwareFailure,
            7 => Self::WrapAround,
            255 => Self::NoUpdate,
            other => Self::Other(other),
        }
    }
}

impl From<RangeStatus> for u8 {
    fn from(status: RangeStatus) -> u8 {
        match status {
            RangeStatus::Valid => 0,
            RangeStatus::SigmaFailure => 1,
            RangeStatus::SignalFailure => 2,
            RangeStatus::MinRangeFailure => 3,
            RangeStatus::OutOfBounds => 4,
            RangeStatus::HardwareFailure => 5,
            RangeStatus::WrapAround => 7,
            RangeStatus::NoUpdate => 255,
            RangeStatus::Other(code) => code,
        }
    }
}

impl core::fmt::Display for RangeStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.code())
    }
}

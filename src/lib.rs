#![no_std]
#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

mod bus;
mod driver;
mod error;
mod ranging;
mod register;
mod report;
mod scan;
mod status;
mod stepper;
mod utils;

pub use bus::{
    BUSY_POLL_LIMIT, BusConfig, BusError, BusMaster, Direction, MAX_ATTEMPTS, MasterControl,
    MasterRegisters, MasterStatus,
};
pub use driver::{DEFAULT_ADDRESS, INIT_POLL_LIMIT, Measurement, Vl53l1x, power_cycle};
pub use error::{Error, Fault, ScanError};
pub use ranging::{PollTiming, RangeSample, Ranger, RangingState};
pub use register::{DEFAULT_CONFIGURATION, MODEL_ID, Register};
pub use report::{FmtReport, Indicator, PinIndicator, Report};
pub use scan::{ScanPlan, Scanner};
pub use status::RangeStatus;
pub use stepper::{Coils, IDLE_PATTERN, Phase, Rotation, Stepper};

//! Register addresses for the VL53L1X sensor.

/// Register addresses for the VL53L1X (16-bit index, big-endian on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
#[repr(u16)]
pub enum Register {
    /// VHV timeout macro-period loop bound
    VhvConfigTimeoutMacropLoopBound = 0x0008,
    /// Undocumented VHV start register, cleared after init
    VhvConfigInit = 0x000B,
    /// First byte of the default configuration block
    ConfigurationStart = 0x002D,
    /// Interrupt polarity and GPIO mux
    GpioHvMuxCtrl = 0x0030,
    /// GPIO interrupt status
    GpioTioHvStatus = 0x0031,
    /// Interrupt clear
    SystemInterruptClear = 0x0086,
    /// Ranging mode start/stop
    SystemModeStart = 0x0087,
    /// Range status, first byte of the result block
    ResultRangeStatus = 0x0089,
    /// Effective SPAD count (8.8 fixed point)
    ResultDssActualEffectiveSpadsSd0 = 0x008C,
    /// Ambient count rate (MCPS, 9.7 fixed point)
    ResultAmbientCountRateMcpsSd = 0x0090,
    /// Crosstalk-corrected distance in millimeters
    ResultFinalCrosstalkCorrectedRangeMmSd0 = 0x0096,
    /// Crosstalk-corrected peak signal count rate (MCPS, 9.7 fixed point)
    ResultPeakSignalCountRateCrosstalkCorrectedMcpsSd0 = 0x0098,
    /// Firmware boot status
    FirmwareSystemStatus = 0x00E5,
    /// Model identification
    IdentificationModelId = 0x010F,
}

impl From<Register> for u16 {
    fn from(reg: Register) -> u16 {
        reg as u16
    }
}

/// Value of [`Register::SystemModeStart`] that starts continuous ranging
pub const MODE_START_RANGING: u8 = 0x40;

/// Value of [`Register::SystemModeStart`] that stops ranging
pub const MODE_STOP_RANGING: u8 = 0x00;

/// Model id reported by a VL53L1X
pub const MODEL_ID: u16 = 0xEACC;

/// Length of the result block read in one transaction from 0x0089
pub const RESULT_BLOCK_LEN: usize = 17;

/// Default configuration written to 0x2D..=0x87 during initialization
pub const DEFAULT_CONFIGURATION: [u8; 91] = [
    0x00, // 0x2d: bits 2 and 5 set for fast-plus mode
    0x00, // 0x2e: I2C pulled up at 1.8 V
    0x00, // 0x2f: GPIO pulled up at 1.8 V
    0x01, // 0x30: bit 4 clear, interrupt active high
    0x02, // 0x31: bit 1, interrupt depends on polarity
    0x00, // 0x32
    0x02, // 0x33
    0x08, // 0x34
    0x00, // 0x35
    0x08, // 0x36
    0x10, // 0x37
    0x01, // 0x38
    0x01, // 0x39
    0x00, // 0x3a
    0x00, // 0x3b
    0x00, // 0x3c
    0x00, // 0x3d
    0xff, // 0x3e
    0x00, // 0x3f
    0x0F, // 0x40
    0x00, // 0x41
    0x00, // 0x42
    0x00, // 0x43
    0x00, // 0x44
    0x00, // 0x45
    0x20, // 0x46: interrupt on new sample ready
    0x0b, // 0x47
    0x00, // 0x48
    0x00, // 0x49
    0x02, // 0x4a
    0x0a, // 0x4b
    0x21, // 0x4c
    0x00, // 0x4d
    0x00, // 0x4e
    0x05, // 0x4f
    0x00, // 0x50
    0x00, // 0x51
    0x00, // 0x52
    0x00, // 0x53
    0xc8, // 0x54
    0x00, // 0x55
    0x00, // 0x56
    0x38, // 0x57
    0xff, // 0x58
    0x01, // 0x59
    0x00, // 0x5a
    0x08, // 0x5b
    0x00, // 0x5c
    0x00, // 0x5d
    0x01, // 0x5e
    0xcc, // 0x5f
    0x0f, // 0x60
    0x01, // 0x61
    0xf1, // 0x62
    0x0d, // 0x63
    0x01, // 0x64: sigma threshold MSB, 90 mm
    0x68, // 0x65: sigma threshold LSB
    0x00, // 0x66: min count rate MSB
    0x80, // 0x67: min count rate LSB
    0x08, // 0x68
    0xb8, // 0x69
    0x00, // 0x6a
    0x00, // 0x6b
    0x00, // 0x6c: inter-measurement period MSB
    0x00, // 0x6d
    0x0f, // 0x6e
    0x89, // 0x6f: inter-measurement period LSB
    0x00, // 0x70
    0x00, // 0x71
    0x00, // 0x72: distance threshold high MSB
    0x00, // 0x73
    0x00, // 0x74: distance threshold low MSB
    0x00, // 0x75
    0x00, // 0x76
    0x01, // 0x77
    0x0f, // 0x78
    0x0d, // 0x79
    0x0e, // 0x7a
    0x0e, // 0x7b
    0x00, // 0x7c
    0x00, // 0x7d
    0x02, // 0x7e
    0xc7, // 0x7f: ROI center
    0xff, // 0x80: ROI size
    0x9B, // 0x81
    0x00, // 0x82
    0x00, // 0x83
    0x00, // 0x84
    0x01, // 0x85
    0x00, // 0x86: interrupt clear
    0x00, // 0x87: 0x40 here would start ranging right after init
];

bitfield::bitfield! {
    /// `GPIO_HV_MUX__CTRL`
    pub struct GpioHvMuxCtrl(u8);
    impl Debug;
    u8;
    /// Interrupt polarity: `0` = active high, `1` = active low
    pub active_low, _: 4;
    /// GPIO mux select (must be `0x1`)
    pub mux_select, _: 3, 0;
}

impl GpioHvMuxCtrl {
    /// Level of [`GpioTioHvStatus::interrupt`] that signals new data
    #[must_use]
    #[inline]
    pub fn ready_level(&self) -> bool {
        !self.active_low()
    }
}

bitfield::bitfield! {
    /// `GPIO__TIO_HV_STATUS`
    pub struct GpioTioHvStatus(u8);
    impl Debug;
    u8;
    /// Current level of the interrupt line
    pub interrupt, _: 0;
}

bitfield::bitfield! {
    /// `RESULT__RANGE_STATUS`
    pub struct ResultRangeStatus(u8);
    impl Debug;
    u8;
    /// Raw device range status, mapped by [`crate::RangeStatus::from_device`]
    pub range_status, _: 4, 0;
}

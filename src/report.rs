//! Collaborators that observe a scan: sample reporting and status lights.

use core::fmt::Write;

use embedded_hal::digital::OutputPin;

use crate::{error::Fault, ranging::RangeSample};

/// Receives samples in ascending index order, and the fault that ended a
/// scan if there was one
pub trait Report {
    /// One sample per scan position
    fn sample(&mut self, sample: &RangeSample);

    /// The scan halted
    fn fault(&mut self, fault: Fault) {
        let _ = fault;
    }
}

/// Writes one comma-separated line per sample to a text sink
///
/// Lines look like `status, distance, signal, ambient, spads\r\n`.
#[derive(Debug)]
pub struct FmtReport<W> {
    writer: W,
    write_failed: bool,
}

impl<W: Write> FmtReport<W> {
    /// Report to `writer`
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            write_failed: false,
        }
    }

    /// Whether any line could not be written
    pub fn write_failed(&self) -> bool {
        self.write_failed
    }

    /// Release the writer
    pub fn release(self) -> W {
        self.writer
    }
}

impl<W: Write> Report for FmtReport<W> {
    fn sample(&mut self, sample: &RangeSample) {
        let result = write!(
            self.writer,
            "{}, {}, {}, {}, {}\r\n",
            sample.status(),
            sample.distance_mm(),
            sample.signal_rate_kcps(),
            sample.ambient_rate_kcps(),
            sample.spad_count()
        );
        self.write_failed |= result.is_err();
    }

    fn fault(&mut self, fault: Fault) {
        let result = write!(self.writer, "fault: {fault}\r\n");
        self.write_failed |= result.is_err();
    }
}

/// Visual status signalling; purely observational
pub trait Indicator {
    /// The sensor booted and ranging started
    fn booted(&mut self) {}

    /// Sample `index` was taken
    fn sampled(&mut self, index: u16) {
        let _ = index;
    }
}

impl Indicator for () {}

/// Drives one LED: lit at boot, toggled on every sample
#[derive(Debug)]
pub struct PinIndicator<P> {
    pin: P,
    lit: bool,
}

impl<P: OutputPin> PinIndicator<P> {
    /// Use `pin` as the indicator LED, starting dark
    pub fn new(pin: P) -> Self {
        Self { pin, lit: false }
    }

    /// Release the pin
    pub fn release(self) -> P {
        self.pin
    }

    fn show(&mut self, lit: bool) {
        // pin errors do not affect the scan
        let result = if lit {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if result.is_ok() {
            self.lit = lit;
        }
    }
}

impl<P: OutputPin> Indicator for PinIndicator<P> {
    fn booted(&mut self) {
        self.show(true);
    }

    fn sampled(&mut self, _index: u16) {
        self.show(!self.lit);
    }
}

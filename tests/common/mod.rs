//! Simulated hardware shared by the integration tests.

#![allow(dead_code)]

use std::{cell::RefCell, rc::Rc};

use embedded_hal::{
    delay::DelayNs,
    i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation, SevenBitAddress},
};
use vl53l1x_scanner::{
    Coils, Direction, Fault, MasterControl, MasterRegisters, MasterStatus, RangeSample, Report,
};

pub const SENSOR_ADDRESS: u8 = 0x29;

/// Something observable that happened on the simulated hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    BootPoll(bool),
    ConfigLoaded,
    StartRanging,
    StopRanging,
    ReadyPoll(bool),
    ResultRead,
    InterruptCleared,
    InitFinished,
    Coils(u8),
    Delay(u32),
}

/// Ordered record shared between the fakes
#[derive(Debug, Clone, Default)]
pub struct Timeline(Rc<RefCell<Vec<Event>>>);

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn count(&self, event: Event) -> usize {
        self.0.borrow().iter().filter(|e| **e == event).count()
    }

    /// Events after the sensor finished initializing
    pub fn after_init(&self) -> Vec<Event> {
        let events = self.events();
        match events.iter().position(|e| *e == Event::InitFinished) {
            Some(at) => events[at + 1..].to_vec(),
            None => Vec::new(),
        }
    }
}

/// Register-level model of a VL53L1X
pub struct FakeSensor {
    timeline: Timeline,
    /// Boot flag reads ready on this poll (1 = first poll); 0 = never
    pub boot_ready_on_poll: u32,
    /// Data-ready reads ready on this poll after each clear; 0 = never
    pub ready_on_poll: u32,
    pub distance_mm: u16,
    /// Raw RESULT__RANGE_STATUS, 9 decodes to status 0
    pub raw_status: u8,
    pub signal_kcps: u16,
    pub ambient_kcps: u16,
    pub spads: u8,
    /// Any transaction touching this register fails
    pub fail_on: Option<u16>,
    /// Like `fail_on`, but only once initialization has finished
    pub fail_after_init: Option<u16>,
    regs: [u8; 0x200],
    boot_polls: u32,
    ready_polls: u32,
    ranging: bool,
    latched: bool,
    initialized: bool,
}

impl FakeSensor {
    pub fn new(timeline: &Timeline) -> Self {
        let mut regs = [0u8; 0x200];
        regs[0x30] = 0x01;
        Self {
            timeline: timeline.clone(),
            boot_ready_on_poll: 1,
            ready_on_poll: 1,
            distance_mm: 1234,
            raw_status: 9,
            signal_kcps: 2048,
            ambient_kcps: 96,
            spads: 44,
            fail_on: None,
            fail_after_init: None,
            regs,
            boot_polls: 0,
            ready_polls: 0,
            ranging: false,
            latched: false,
            initialized: false,
        }
    }

    pub fn register(&self, index: u16) -> u8 {
        self.regs[usize::from(index)]
    }

    fn result_block(&self) -> [u8; 17] {
        let mut block = [0u8; 17];
        block[0] = self.raw_status;
        block[3] = self.spads;
        block[7..9].copy_from_slice(&(self.ambient_kcps / 8).to_be_bytes());
        block[13..15].copy_from_slice(&self.distance_mm.to_be_bytes());
        block[15..17].copy_from_slice(&(self.signal_kcps / 8).to_be_bytes());
        block
    }

    fn load(&mut self, index: u16) -> u8 {
        match index {
            0x00E5 => {
                self.boot_polls += 1;
                let ready = self.boot_ready_on_poll != 0 && self.boot_polls >= self.boot_ready_on_poll;
                self.timeline.push(Event::BootPoll(ready));
                u8::from(ready)
            }
            0x0031 => {
                if self.ranging && !self.latched {
                    self.ready_polls += 1;
                    self.latched = self.ready_on_poll != 0 && self.ready_polls >= self.ready_on_poll;
                }
                let ready = self.ranging && self.latched;
                self.timeline.push(Event::ReadyPoll(ready));
                u8::from(ready)
            }
            0x0089..=0x0099 => self.result_block()[usize::from(index - 0x0089)],
            _ => self.regs[usize::from(index)],
        }
    }

    fn store(&mut self, index: u16, value: u8, single: bool) {
        self.regs[usize::from(index)] = value;
        if !single {
            return;
        }
        match (index, value) {
            (0x0087, 0x40) => {
                self.ranging = true;
                self.latched = false;
                self.ready_polls = 0;
                self.timeline.push(Event::StartRanging);
            }
            (0x0087, 0x00) => {
                self.ranging = false;
                self.timeline.push(Event::StopRanging);
            }
            (0x0086, 0x01) => {
                self.latched = false;
                self.ready_polls = 0;
                self.timeline.push(Event::InterruptCleared);
            }
            (0x000B, 0x00) => {
                self.initialized = true;
                self.timeline.push(Event::InitFinished);
            }
            _ => {}
        }
    }

    fn check(&self, index: u16) -> Result<(), ErrorKind> {
        let armed = self.initialized && self.fail_after_init == Some(index);
        if armed || self.fail_on == Some(index) {
            Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data))
        } else {
            Ok(())
        }
    }
}

impl ErrorType for FakeSensor {
    type Error = ErrorKind;
}

impl I2c for FakeSensor {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != SENSOR_ADDRESS {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        let mut pointer = 0u16;
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    if bytes.len() < 2 {
                        return Err(ErrorKind::Other);
                    }
                    pointer = u16::from_be_bytes([bytes[0], bytes[1]]);
                    self.check(pointer)?;
                    let data = &bytes[2..];
                    if pointer == 0x002D && !data.is_empty() {
                        self.timeline.push(Event::ConfigLoaded);
                    }
                    let single = data.len() == 1;
                    for (offset, &value) in data.iter().enumerate() {
                        self.store(pointer + offset as u16, value, single);
                    }
                }
                Operation::Read(buffer) => {
                    self.check(pointer)?;
                    if pointer == 0x0089 {
                        self.timeline.push(Event::ResultRead);
                    }
                    for (offset, slot) in buffer.iter_mut().enumerate() {
                        *slot = self.load(pointer + offset as u16);
                    }
                }
            }
        }
        Ok(())
    }
}

/// What a simulated master put on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wire {
    Start { address: u8, read: bool, acked: bool },
    Tx { byte: u8, acked: bool },
    Rx { byte: u8, ack: bool },
    Stop,
}

/// Register-level model of a two-wire master peripheral with one target
/// behind it. The target uses 16-bit register pointers like the sensor.
pub struct SimController {
    pub target: u8,
    pub memory: [u8; 0x200],
    /// START conditions that succeed before every address phase NACKs
    pub nack_after_starts: Option<usize>,
    /// Address phases that NACK before the target starts answering
    pub nack_first_addresses: usize,
    /// Target refuses every data byte
    pub nack_data: bool,
    /// Status reads reporting BUSY after each control write
    pub busy_polls: u32,
    /// BUSY never clears
    pub stuck_busy: bool,
    /// BUSY never clears after a bare STOP
    pub release_hangs: bool,
    pub wire: Vec<Wire>,
    pub controls: Vec<MasterControl>,
    pub starts: usize,
    address: u8,
    direction: Direction,
    mdr_out: u8,
    mdr_in: u8,
    pointer: u16,
    index_bytes: u8,
    status: MasterStatus,
    pending_busy: u32,
    releasing: bool,
}

impl SimController {
    pub fn new() -> Self {
        Self {
            target: SENSOR_ADDRESS,
            memory: [0u8; 0x200],
            nack_after_starts: None,
            nack_first_addresses: 0,
            nack_data: false,
            busy_polls: 0,
            stuck_busy: false,
            release_hangs: false,
            wire: Vec::new(),
            controls: Vec::new(),
            starts: 0,
            address: 0,
            direction: Direction::Write,
            mdr_out: 0,
            mdr_in: 0,
            pointer: 0,
            index_bytes: 0,
            status: MasterStatus::from(0),
            pending_busy: 0,
            releasing: false,
        }
    }

    fn address_acked(&mut self) -> bool {
        if self.address != self.target {
            return false;
        }
        if self
            .nack_after_starts
            .is_some_and(|limit| self.starts > limit)
        {
            return false;
        }
        if self.nack_first_addresses > 0 {
            self.nack_first_addresses -= 1;
            return false;
        }
        true
    }

    fn accept(&mut self, byte: u8) {
        match self.index_bytes {
            0 => {
                self.pointer = u16::from(byte) << 8;
                self.index_bytes = 1;
            }
            1 => {
                self.pointer |= u16::from(byte);
                self.index_bytes = 2;
            }
            _ => {
                self.memory[usize::from(self.pointer)] = byte;
                self.pointer += 1;
            }
        }
    }

    fn emit(&mut self) -> u8 {
        let byte = self.memory[usize::from(self.pointer)];
        self.pointer += 1;
        byte
    }
}

impl MasterRegisters for SimController {
    fn set_target(&mut self, address: SevenBitAddress, direction: Direction) {
        self.address = address;
        self.direction = direction;
    }

    fn write_data(&mut self, byte: u8) {
        self.mdr_out = byte;
    }

    fn read_data(&mut self) -> u8 {
        self.mdr_in
    }

    fn write_control(&mut self, control: MasterControl) {
        self.controls.push(control);
        self.pending_busy = self.busy_polls;
        self.releasing = control.stop() && !control.run() && !control.start();
        let mut status = MasterStatus::from(0);

        if control.start() {
            self.starts += 1;
            let acked = self.address_acked();
            self.wire.push(Wire::Start {
                address: self.address,
                read: self.direction == Direction::Read,
                acked,
            });
            if !acked {
                status.set_error(true);
                status.set_adrack(true);
                if control.stop() {
                    self.wire.push(Wire::Stop);
                }
                self.status = status;
                return;
            }
            if self.direction == Direction::Write {
                self.index_bytes = 0;
            }
        }

        if control.run() {
            match self.direction {
                Direction::Write => {
                    let byte = self.mdr_out;
                    let acked = !self.nack_data;
                    self.wire.push(Wire::Tx { byte, acked });
                    if acked {
                        self.accept(byte);
                    } else {
                        status.set_error(true);
                        status.set_datack(true);
                    }
                }
                Direction::Read => {
                    let byte = self.emit();
                    self.mdr_in = byte;
                    self.wire.push(Wire::Rx {
                        byte,
                        ack: control.ack(),
                    });
                }
            }
        }

        if control.stop() {
            self.wire.push(Wire::Stop);
        }
        self.status = status;
    }

    fn read_status(&mut self) -> MasterStatus {
        if self.stuck_busy || (self.release_hangs && self.releasing) || self.pending_busy > 0 {
            self.pending_busy = self.pending_busy.saturating_sub(1);
            let mut status = self.status;
            status.set_busy(true);
            return status;
        }
        self.status
    }
}

/// Coil port recording every pattern into a timeline
pub struct RecordingCoils {
    timeline: Timeline,
    /// Every write fails after this many successful ones
    pub fail_after: Option<usize>,
    writes: usize,
}

impl RecordingCoils {
    pub fn new(timeline: &Timeline) -> Self {
        Self {
            timeline: timeline.clone(),
            fail_after: None,
            writes: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoilFault;

impl Coils for RecordingCoils {
    type Error = CoilFault;

    fn energize(&mut self, pattern: u8) -> Result<(), Self::Error> {
        if self.fail_after.is_some_and(|limit| self.writes >= limit) {
            return Err(CoilFault);
        }
        self.writes += 1;
        self.timeline.push(Event::Coils(pattern));
        Ok(())
    }
}

/// Time source that records every requested delay instead of sleeping
#[derive(Default)]
pub struct RecordingDelay {
    timeline: Option<Timeline>,
    pub total_ns: u64,
    pub calls: Vec<u32>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(timeline: &Timeline) -> Self {
        Self {
            timeline: Some(timeline.clone()),
            ..Self::default()
        }
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
        self.calls.push(ns);
        if let Some(timeline) = &self.timeline {
            timeline.push(Event::Delay(ns));
        }
    }
}

/// Reporter keeping everything it is handed
#[derive(Default)]
pub struct RecordingReport {
    pub samples: Vec<RangeSample>,
    pub faults: Vec<Fault>,
}

impl Report for RecordingReport {
    fn sample(&mut self, sample: &RangeSample) {
        self.samples.push(*sample);
    }

    fn fault(&mut self, fault: Fault) {
        self.faults.push(fault);
    }
}

/// Check the poll/read/clear ordering of every sample in `events`
pub fn assert_sampling_protocol(events: &[Event]) {
    let mut ready = false;
    let mut awaiting_clear = false;
    for event in events {
        match event {
            Event::ReadyPoll(result) => {
                assert!(!awaiting_clear, "readiness polled before interrupt clear");
                ready = *result;
            }
            Event::ResultRead => {
                assert!(ready, "result read without a successful ready poll");
                assert!(!awaiting_clear, "second read before interrupt clear");
                awaiting_clear = true;
            }
            Event::InterruptCleared => {
                assert!(awaiting_clear, "interrupt cleared without a read");
                awaiting_clear = false;
                ready = false;
            }
            _ => {}
        }
    }
    assert!(!awaiting_clear, "last sample never cleared its interrupt");
}

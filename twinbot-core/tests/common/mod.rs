#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    convert::Infallible,
    rc::Rc,
};

use embedded_hal::{
    delay::DelayNs,
    digital::{self, OutputPin},
};
use twinbot_core::utils::{
    controllers::{ColorSensor, DeviceError, RangeSensor},
    math::color::ColorSample,
};

/// Serial port double shared between the test and the code under test.
#[derive(Clone, Default)]
pub struct FakeLink {
    inner: Rc<RefCell<LinkState>>,
}

#[derive(Default)]
struct LinkState {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

impl FakeLink {
    pub fn push(
        &self,
        bytes: &[u8],
    ) {
        self.inner.borrow_mut().rx.extend(bytes.iter().copied());
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.inner.borrow().tx)
            .split("\r\n")
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Everything written so far, unparsed.
    pub fn output(&self) -> Vec<u8> {
        self.inner.borrow().tx.clone()
    }

    pub fn clear_output(&self) {
        self.inner.borrow_mut().tx.clear();
    }

    pub fn pending(&self) -> usize {
        self.inner.borrow().rx.len()
    }
}

impl embedded_io::ErrorType for FakeLink {
    type Error = Infallible;
}

impl embedded_io::Read for FakeLink {
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> Result<usize, Self::Error> {
        let mut state = self.inner.borrow_mut();
        let mut n = 0;
        while n < buf.len() {
            match state.rx.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl embedded_io::ReadReady for FakeLink {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.inner.borrow().rx.is_empty())
    }
}

impl embedded_io::Write for FakeLink {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> Result<usize, Self::Error> {
        self.inner.borrow_mut().tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Output pin that records its level and can be told to fail.
#[derive(Clone, Default)]
pub struct SharedPin {
    high: Rc<Cell<bool>>,
    history: Rc<RefCell<Vec<bool>>>,
    fail: Rc<Cell<bool>>,
    fail_next: Rc<Cell<usize>>,
}

impl SharedPin {
    pub fn is_high(&self) -> bool {
        self.high.get()
    }

    pub fn history(&self) -> Vec<bool> {
        self.history.borrow().clone()
    }

    pub fn clear_history(&self) {
        self.history.borrow_mut().clear();
    }

    pub fn fail_writes(
        &self,
        fail: bool,
    ) {
        self.fail.set(fail);
    }

    /// Fail only the next `count` writes.
    pub fn fail_next_writes(
        &self,
        count: usize,
    ) {
        self.fail_next.set(count);
    }

    fn write(
        &mut self,
        high: bool,
    ) -> Result<(), digital::ErrorKind> {
        if self.fail.get() {
            return Err(digital::ErrorKind::Other);
        }
        if self.fail_next.get() > 0 {
            self.fail_next.set(self.fail_next.get() - 1);
            return Err(digital::ErrorKind::Other);
        }
        self.high.set(high);
        self.history.borrow_mut().push(high);
        Ok(())
    }
}

impl digital::ErrorType for SharedPin {
    type Error = digital::ErrorKind;
}

impl OutputPin for SharedPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}

/// Delay that records millisecond requests instead of sleeping.
#[derive(Clone, Default)]
pub struct RecordingDelay {
    ms_calls: Rc<RefCell<Vec<u32>>>,
    panic_at_ms: Rc<Cell<Option<u32>>>,
}

impl RecordingDelay {
    pub fn ms_calls(&self) -> Vec<u32> {
        self.ms_calls.borrow().clone()
    }

    /// Panic instead of waiting when asked for exactly `ms`.
    pub fn panic_at(
        &self,
        ms: u32,
    ) {
        self.panic_at_ms.set(Some(ms));
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(
        &mut self,
        _ns: u32,
    ) {
    }

    fn delay_ms(
        &mut self,
        ms: u32,
    ) {
        if self.panic_at_ms.get() == Some(ms) {
            panic!("injected fault during {} ms delay", ms);
        }
        self.ms_calls.borrow_mut().push(ms);
    }
}

/// Range sensor replaying a script; runs dry as "no echo".
#[derive(Clone, Default)]
pub struct ScriptedRange {
    script: Rc<RefCell<VecDeque<Result<Option<u32>, DeviceError>>>>,
    reads: Rc<Cell<usize>>,
}

impl ScriptedRange {
    pub fn new(script: impl IntoIterator<Item = Result<Option<u32>, DeviceError>>) -> Self {
        Self {
            script: Rc::new(RefCell::new(script.into_iter().collect())),
            reads: Rc::default(),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl RangeSensor for ScriptedRange {
    fn distance_cm(&mut self) -> Result<Option<u32>, DeviceError> {
        self.reads.set(self.reads.get() + 1);
        self.script.borrow_mut().pop_front().unwrap_or(Ok(None))
    }
}

/// Color sensor replaying a script; runs dry as "no reading".
#[derive(Clone, Default)]
pub struct ScriptedColor {
    script: Rc<RefCell<VecDeque<Result<Option<ColorSample>, DeviceError>>>>,
    reads: Rc<Cell<usize>>,
}

impl ScriptedColor {
    pub fn new(script: impl IntoIterator<Item = Result<Option<ColorSample>, DeviceError>>) -> Self {
        Self {
            script: Rc::new(RefCell::new(script.into_iter().collect())),
            reads: Rc::default(),
        }
    }

    pub fn samples(samples: impl IntoIterator<Item = ColorSample>) -> Self {
        Self::new(samples.into_iter().map(|s| Ok(Some(s))))
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl ColorSensor for ScriptedColor {
    fn read_color(&mut self) -> Result<Option<ColorSample>, DeviceError> {
        self.reads.set(self.reads.get() + 1);
        self.script.borrow_mut().pop_front().unwrap_or(Ok(None))
    }
}

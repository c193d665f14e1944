//! Serial link handling
//!
//! Wraps an `embedded-io` port used both for single-byte commands and for
//! line-oriented status text. Lines end in CRLF so they render correctly on a
//! serial terminal.

use core::fmt;

use embedded_io::{Read, ReadReady, Write, WriteFmtError};

use crate::utils::controllers::DeviceError;

/// Which link a byte arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Console,
    Bluetooth,
}

impl Source {
    /// Label used in the "Received from ..." acknowledgement.
    pub const fn label(self) -> &'static str {
        match self {
            Source::Console => "Serial Monitor",
            Source::Bluetooth => "Bluetooth",
        }
    }
}

pub struct SerialLink<P> {
    port: P,
    source: Source,
}

impl<P> SerialLink<P> {
    pub fn new(
        port: P,
        source: Source,
    ) -> Self {
        Self { port, source }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn release(self) -> P {
        self.port
    }
}

impl<P: Read + ReadReady> SerialLink<P> {
    /// Take one byte if one is waiting, without blocking.
    pub fn poll_byte(&mut self) -> Result<Option<u8>, DeviceError> {
        if !self.port.read_ready().map_err(DeviceError::serial)? {
            return Ok(None);
        }
        self.wait_byte().map(Some)
    }
}

impl<P: Read> SerialLink<P> {
    /// Block until one byte arrives and consume it.
    pub fn wait_byte(&mut self) -> Result<u8, DeviceError> {
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf).map_err(DeviceError::serial)? {
            0 => Err(DeviceError::LinkClosed),
            _ => Ok(buf[0]),
        }
    }
}

impl<P: Write> SerialLink<P> {
    /// Write formatted text followed by CRLF.
    pub fn println(
        &mut self,
        args: fmt::Arguments<'_>,
    ) -> Result<(), DeviceError> {
        self.println_raw(args, &[])
    }

    /// Write formatted text, then `raw` exactly as given, then CRLF.
    pub fn println_raw(
        &mut self,
        args: fmt::Arguments<'_>,
        raw: &[u8],
    ) -> Result<(), DeviceError> {
        self.port.write_fmt(args).map_err(|e| match e {
            WriteFmtError::Other(e) => DeviceError::serial(e),
            _ => DeviceError::Serial(embedded_io::ErrorKind::Other),
        })?;
        self.port.write_all(raw).map_err(DeviceError::serial)?;
        self.port.write_all(b"\r\n").map_err(DeviceError::serial)?;
        self.port.flush().map_err(DeviceError::serial)
    }

    pub fn print_line(
        &mut self,
        line: &str,
    ) -> Result<(), DeviceError> {
        self.println(format_args!("{}", line))
    }
}

/// Emit a line on a link, logging instead of failing.
///
/// Status text is best-effort: a broken link must not stop the control loop.
macro_rules! say {
    ($link:expr, $($arg:tt)*) => {{
        if let Err(e) = $link.println(format_args!($($arg)*)) {
            tracing::warn!(source = ?$link.source(), "status line dropped: {}", e);
        }
    }};
}
pub(crate) use say;

//! Host stand-ins for the board peripherals.

use std::{
    collections::VecDeque,
    convert::Infallible,
    io::{self, Read as _, Write as _},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, TryRecvError},
    },
    thread,
};

use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_io::{ErrorKind, ErrorType, Read, ReadReady, Write};
use tracing::{debug, info, warn};

/// Output line that logs every level change.
pub struct LogPin {
    name: &'static str,
    high: Option<bool>,
}

impl LogPin {
    pub fn new(name: &'static str) -> Self {
        Self { name, high: None }
    }

    fn drive(
        &mut self,
        high: bool,
    ) {
        if self.high != Some(high) {
            info!(pin = self.name, level = if high { "HIGH" } else { "LOW" }, "line changed");
            self.high = Some(high);
        }
    }
}

impl PinErrorType for LogPin {
    type Error = Infallible;
}

impl OutputPin for LogPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(true);
        Ok(())
    }
}

/// The local console: bytes from stdin, text to stdout.
///
/// A reader thread feeds stdin into a channel so readiness can be checked
/// without blocking. With `strip_line_endings` set, CR and LF are dropped the
/// way a serial monitor configured for "No line ending" would.
pub struct StdinConsole {
    rx: Receiver<u8>,
    pending: VecDeque<u8>,
    eof: Arc<AtomicBool>,
}

impl StdinConsole {
    pub fn spawn(strip_line_endings: bool) -> Self {
        let (tx, rx) = mpsc::channel();
        let eof = Arc::new(AtomicBool::new(false));
        let flag = eof.clone();
        thread::spawn(move || {
            let stdin = io::stdin();
            for byte in stdin.lock().bytes() {
                match byte {
                    Ok(b'\r' | b'\n') if strip_line_endings => continue,
                    Ok(b) => {
                        if tx.send(b).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("stdin read failed: {}", e);
                        break;
                    }
                }
            }
            flag.store(true, Ordering::Release);
        });
        Self {
            rx,
            pending: VecDeque::new(),
            eof,
        }
    }

    /// Queue bytes ahead of anything typed.
    pub fn preload(
        &mut self,
        bytes: &[u8],
    ) {
        self.pending.extend(bytes);
    }

    /// Set once stdin has been read to the end.
    pub fn eof_flag(&self) -> Arc<AtomicBool> {
        self.eof.clone()
    }
}

impl ErrorType for StdinConsole {
    type Error = ErrorKind;
}

impl Read for StdinConsole {
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(b) = self.pending.pop_front() {
            buf[0] = b;
            return Ok(1);
        }
        match self.rx.recv() {
            Ok(b) => {
                buf[0] = b;
                Ok(1)
            }
            // stdin closed
            Err(_) => Ok(0),
        }
    }
}

impl ReadReady for StdinConsole {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        if !self.pending.is_empty() {
            return Ok(true);
        }
        match self.rx.try_recv() {
            Ok(b) => {
                self.pending.push_back(b);
                Ok(true)
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => Ok(false),
        }
    }
}

impl Write for StdinConsole {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> Result<usize, Self::Error> {
        io::stdout().write_all(buf).map_err(|_| ErrorKind::Other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        io::stdout().flush().map_err(|_| ErrorKind::Other)
    }
}

/// Bluetooth serial stand-in: one TCP client at a time.
///
/// Without a listener the link never has input and drops output, like an
/// unpaired module.
pub struct TcpLink {
    listener: Option<TcpListener>,
    client: Option<TcpStream>,
    peeked: Option<u8>,
}

impl TcpLink {
    pub fn disconnected() -> Self {
        Self {
            listener: None,
            client: None,
            peeked: None,
        }
    }

    pub fn bind(port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port)))?;
        listener.set_nonblocking(true)?;
        info!("Bluetooth link listening on {}", listener.local_addr()?);
        Ok(Self {
            listener: Some(listener),
            client: None,
            peeked: None,
        })
    }

    fn accept(&mut self) {
        if self.client.is_some() {
            return;
        }
        let Some(listener) = &self.listener else {
            return;
        };
        match listener.accept() {
            Ok((stream, addr)) => {
                if let Err(e) = stream.set_nonblocking(true) {
                    warn!("cannot configure Bluetooth client {}: {}", addr, e);
                    return;
                }
                info!("Bluetooth client connected from {}", addr);
                self.client = Some(stream);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => warn!("Bluetooth accept failed: {}", e),
        }
    }

    fn drop_client(&mut self) {
        if self.client.take().is_some() {
            info!("Bluetooth client disconnected");
        }
    }
}

impl ErrorType for TcpLink {
    type Error = ErrorKind;
}

impl ReadReady for TcpLink {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        if self.peeked.is_some() {
            return Ok(true);
        }
        self.accept();
        let Some(client) = self.client.as_mut() else {
            return Ok(false);
        };
        let mut byte = [0u8; 1];
        match client.read(&mut byte) {
            Ok(0) => {
                self.drop_client();
                Ok(false)
            }
            Ok(_) => {
                self.peeked = Some(byte[0]);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => {
                debug!("Bluetooth read failed: {}", e);
                self.drop_client();
                Ok(false)
            }
        }
    }
}

impl Read for TcpLink {
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        // only ever called after read_ready reported a byte
        match self.peeked.take() {
            Some(b) => {
                buf[0] = b;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

impl Write for TcpLink {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> Result<usize, Self::Error> {
        if let Some(client) = self.client.as_mut() {
            if let Err(e) = client.write_all(buf) {
                debug!("Bluetooth write failed: {}", e);
                self.drop_client();
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

//! Module Exports
//!
//! Serial links carrying commands in and status text out.
//!
//! # Modules
//! - `serial`: byte polling, blocking waits and CRLF line output over
//!   `embedded-io` ports.

pub mod serial;

pub use serial::{SerialLink, Source};

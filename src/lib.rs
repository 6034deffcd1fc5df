//! `zplusb` finds USB label printers that speak ZPL and streams print
//! data to them.
//!
//! Discovery opens every device matching a [`DeviceFilter`] and binds each
//! one to the first output endpoint in its descriptor tree:
//!
//! ```no_run
//! use zplusb::{discover, usb::Usb, DeviceFilter};
//!
//! let usb = Usb::new()?;
//! let printers = discover(&usb, DeviceFilter::default())?;
//!
//! if let Some(printer) = printers.first() {
//!     printer.write(b"^XA^FO50,50^ADN,36,20^FDHello^FS^XZ")?;
//! }
//! # Ok::<(), zplusb::Error>(())
//! ```
//!
//! Each write claims the printer's default interface, performs a single
//! transfer bounded by [`WRITE_TIMEOUT`] and releases the interface again.
//! Short transfers are reported as [`Error::PartialWrite`]; nothing is
//! retried, the caller decides what to resend.

#![deny(rust_2018_idioms, rustdoc::broken_intra_doc_links)]

pub use rusb;

pub mod descriptor;
pub mod transport;
pub mod usb;

mod discover;
mod error;
mod printer;

pub use descriptor::EndpointAddress;
pub use discover::{discover, DeviceFilter, Discoverer, ZEBRA_VENDOR_ID};
pub use error::Error;
pub use printer::{Printer, WRITE_TIMEOUT};
pub use transport::AutoDetach;

pub type Result<T> = std::result::Result<T, Error>;

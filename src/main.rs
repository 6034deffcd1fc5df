#![deny(rust_2018_idioms)]

mod macros;

use bytes::Bytes;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
    thread,
    time::Duration,
};
use thiserror::Error;
use zplusb::{
    rusb,
    transport::Device,
    usb::{Usb, UsbDevice},
    DeviceFilter, Printer, ZEBRA_VENDOR_ID,
};

/// How long to wait between two discovery attempts with `--wait`.
const WAIT_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum Error {
    #[error("to access device: Permission denied.")]
    PermissionDenied,
    #[error("to find a USB device matching {0}.")]
    NoDevice(DeviceFilter),
    #[error("to find a printer: no matching device has an output endpoint.")]
    NoPrinter,
    #[error("to select printer #{index}: only {count} found.")]
    InvalidSelection { index: usize, count: usize },
    #[error("to send data: the chunk size must not be zero.")]
    InvalidChunkSize,
    #[error("to send data: the printer stopped accepting bytes.")]
    Stalled,
    #[error("due to an I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("to talk to the printer: {0}")]
    Printer(#[from] zplusb::Error),
}

/// Send ZPL print data to a USB label printer.
#[derive(argh::FromArgs)]
struct Arguments {
    /// print debug logs.
    #[argh(switch, short = 'd')]
    debug: bool,

    /// wait until a matching printer is available.
    #[argh(switch, short = 'w')]
    wait: bool,

    /// list the discovered printers and exit.
    #[argh(switch, short = 'l')]
    list: bool,

    /// the USB vendor ID to look for (default: 0x0a5f).
    #[argh(option, short = 'V', from_str_fn(parse_id))]
    vendor_id: Option<u16>,
    /// the USB product ID to look for (default: any).
    #[argh(option, short = 'P', from_str_fn(parse_id))]
    product_id: Option<u16>,

    /// which of the discovered printers to use.
    #[argh(option, short = 'i', default = "0")]
    index: usize,
    /// the number of bytes to send per transfer.
    #[argh(option, short = 'c', default = "4096")]
    chunk_size: usize,

    /// files with the ZPL data to print, `-` reads from stdin.
    #[argh(positional)]
    files: Vec<PathBuf>,
}

fn main() {
    let args = argh::from_env::<Arguments>();

    let level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(err) = run(args) {
        error!("Failed", "{}", err);
        std::process::exit(1);
    }
}

fn run(args: Arguments) -> Result<(), Error> {
    if args.chunk_size == 0 {
        return Err(Error::InvalidChunkSize);
    }

    let filter = DeviceFilter {
        vendor_id: args.vendor_id.unwrap_or(ZEBRA_VENDOR_ID),
        product_id: args.product_id,
    };

    info!("Searching", "for printers matching {}...", filter);
    let usb = Usb::new().map_err(map_usb_error)?;
    let printers = find_printers(&usb, filter, args.wait)?;

    if args.list {
        for (index, printer) in printers.iter().enumerate() {
            list_printer(index, printer);
        }
        return Ok(());
    }

    let count = printers.len();
    let printer = printers
        .into_iter()
        .nth(args.index)
        .ok_or(Error::InvalidSelection {
            index: args.index,
            count,
        })?;
    ok!(
        "Found",
        "printer {:04x}:{:04x} with output endpoint {}",
        printer.vendor_id(),
        printer.product_id(),
        printer.endpoint()
    );

    let sources = if args.files.is_empty() {
        vec![PathBuf::from("-")]
    } else {
        args.files
    };

    for source in &sources {
        info!("Reading", "print data from {:?}...", source);
        let payload = read_payload(source)?;

        info!("Sending", "{} bytes...", payload.len());
        let sent = send(&printer, payload, args.chunk_size)?;
        ok!("Sent", "{} bytes from {:?}", sent, source);
    }

    Ok(())
}

fn list_printer<D: Device>(index: usize, printer: &Printer<D>) {
    let name = match printer.product_string() {
        Ok(Some(name)) => name,
        Ok(None) => String::from("unnamed"),
        Err(err) => {
            log::debug!("failed to read the product string: {}", err);
            String::from("unknown")
        }
    };

    info!(
        "Printer",
        "#{} {:04x}:{:04x} on bus {:03} address {:03}, endpoint {} ({})",
        index,
        printer.vendor_id(),
        printer.product_id(),
        printer.bus_number(),
        printer.address(),
        printer.endpoint(),
        name
    );
}

fn find_printers(
    usb: &Usb,
    filter: DeviceFilter,
    wait: bool,
) -> Result<Vec<Printer<UsbDevice<rusb::Context>>>, Error> {
    let discover = || match zplusb::discover(usb, filter) {
        Ok(printers) => Ok(printers),
        Err(zplusb::Error::NoDeviceFound) => Err(Error::NoDevice(filter)),
        Err(zplusb::Error::Usb(err)) => Err(map_usb_error(err)),
        Err(err) => Err(err.into()),
    };

    let mut printers = discover();
    while wait {
        printers = match printers {
            Ok(_) => break,
            Err(Error::NoDevice(_)) => {
                thread::sleep(WAIT_INTERVAL);
                discover()
            }
            Err(err) => return Err(err),
        }
    }

    let printers = printers?;
    if printers.is_empty() {
        return Err(Error::NoPrinter);
    }

    Ok(printers)
}

fn map_usb_error(err: rusb::Error) -> Error {
    match err {
        rusb::Error::Access => Error::PermissionDenied,
        err => zplusb::Error::Usb(err).into(),
    }
}

fn read_payload(source: &Path) -> Result<Bytes, Error> {
    if source.as_os_str() == "-" {
        let mut buf = Vec::new();
        io::stdin().lock().read_to_end(&mut buf)?;
        return Ok(buf.into());
    }

    Ok(std::fs::read(source)?.into())
}

/// Streams `payload` to the printer, turning a printer that stopped
/// accepting bytes into [`Error::Stalled`].
fn send<D: Device>(printer: &Printer<D>, payload: Bytes, chunk_size: usize) -> Result<usize, Error> {
    match printer.send_chunked(payload, chunk_size) {
        Ok(sent) => Ok(sent),
        Err(zplusb::Error::PartialWrite { written: 0, .. }) => Err(Error::Stalled),
        Err(err) => Err(err.into()),
    }
}

/// Parses a USB ID given either in hex with a `0x` prefix or in decimal.
fn parse_id(value: &str) -> Result<u16, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|err| format!("invalid USB ID {:?}: {}", value, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("0x0a5f"), Ok(0x0a5f));
        assert_eq!(parse_id("0X0A5F"), Ok(0x0a5f));
        assert_eq!(parse_id("2655"), Ok(0x0a5f));
        assert!(parse_id("0x10000").is_err());
        assert!(parse_id("zebra").is_err());
        assert!(parse_id("").is_err());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::NoDevice(DeviceFilter::vendor(0x0a5f).with_product(0x0100));
        assert_eq!(err.to_string(), "to find a USB device matching 0a5f:0100.");

        let err = map_usb_error(rusb::Error::Access);
        assert!(matches!(err, Error::PermissionDenied));

        let err = map_usb_error(rusb::Error::Busy);
        assert!(matches!(err, Error::Printer(zplusb::Error::Usb(rusb::Error::Busy))));
    }

    #[test]
    fn test_read_payload_from_file() {
        let path = std::env::temp_dir().join(format!("zplusb-{}.zpl", std::process::id()));
        std::fs::write(&path, b"^XA^FDlabel^FS^XZ").unwrap();

        let payload = read_payload(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(&payload.unwrap()[..], b"^XA^FDlabel^FS^XZ");
        assert!(matches!(
            read_payload(Path::new("/nonexistent/label.zpl")),
            Err(Error::IoError(_))
        ));
    }
}

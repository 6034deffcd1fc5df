//! A discovered printer and its bounded write path.

use crate::{
    descriptor::{EndpointAddress, EndpointDescriptor},
    transport::{ClaimedInterface, Device},
    Error, Result,
};
use bytes::{Buf, Bytes};
use std::{
    io,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

/// Every write must finish within this window.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// The interface claimed for each write.
const DEFAULT_INTERFACE: u8 = 0;
/// The alternate setting the output endpoint is looked up in.
const DEFAULT_ALT_SETTING: u8 = 0;

/// An opened ZPL printer bound to one output endpoint.
///
/// The device is closed when the printer is dropped. Writes from
/// several threads are serialized.
pub struct Printer<D: Device> {
    /// The underlying device, locked for the duration of each write.
    device: Mutex<D>,
    /// Where the output endpoint was found during discovery.
    endpoint: EndpointAddress,
    vendor_id: u16,
    product_id: u16,
    bus_number: u8,
    address: u8,
}

impl<D: Device> Printer<D> {
    pub(crate) fn new(mut device: D, endpoint: EndpointAddress) -> Self {
        // Only the write path is time bounded.
        device.set_control_timeout(Duration::ZERO);

        Printer {
            vendor_id: device.vendor_id(),
            product_id: device.product_id(),
            bus_number: device.bus_number(),
            address: device.address(),
            device: Mutex::new(device),
            endpoint,
        }
    }

    pub fn endpoint(&self) -> EndpointAddress {
        self.endpoint
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    pub fn bus_number(&self) -> u8 {
        self.bus_number
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Reads the product string of the printer, if it reports one.
    pub fn product_string(&self) -> Result<Option<String>> {
        Ok(self.lock().product_string()?)
    }

    /// Sends `buf` to the printer in a single transfer.
    ///
    /// The default interface is claimed for the duration of the call and
    /// released on every return path. The transfer is bounded by
    /// [`WRITE_TIMEOUT`] and never retried.
    ///
    /// Returns the number of bytes written, which always equals `buf.len()`.
    /// A short transfer yields [`Error::PartialWrite`] carrying the number of
    /// bytes that did reach the printer.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut device = self.lock();
        let mut interface = ClaimedInterface::claim(&mut *device, DEFAULT_INTERFACE)?;

        let out = self.resolve_endpoint(&interface)?;

        let written = match interface.write_out(&out, buf, WRITE_TIMEOUT) {
            Ok(written) => written,
            Err(rusb::Error::Timeout) => return Err(Error::Timeout),
            Err(err) => return Err(err.into()),
        };

        if written < buf.len() {
            return Err(Error::PartialWrite {
                written,
                requested: buf.len(),
            });
        }

        Ok(written)
    }

    /// Streams `payload` in writes of at most `chunk_size` bytes.
    ///
    /// Whatever a partial write leaves behind is sent again. A write that
    /// moves no bytes at all ends the stream with [`Error::PartialWrite`];
    /// timeouts and every other error end it immediately. A `chunk_size` of
    /// zero sends the payload in one write.
    ///
    /// Returns the total number of bytes sent.
    pub fn send_chunked(&self, mut payload: Bytes, chunk_size: usize) -> Result<usize> {
        let total = payload.len();
        let chunk_size = if chunk_size == 0 { total } else { chunk_size };

        while payload.has_remaining() {
            let mut chunk = payload.split_to(chunk_size.min(payload.len()));

            while chunk.has_remaining() {
                match self.write(&chunk) {
                    Ok(written) => chunk.advance(written),
                    Err(Error::PartialWrite { written, requested }) if written > 0 => {
                        log::warn!(
                            "partial write of {}/{} bytes, resending the rest",
                            written,
                            requested
                        );
                        chunk.advance(written);
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        Ok(total)
    }

    /// Looks up the output endpoint recorded at discovery in the device's
    /// current configuration.
    fn resolve_endpoint(
        &self,
        interface: &ClaimedInterface<'_, D>,
    ) -> Result<EndpointDescriptor> {
        let unavailable = Error::EndpointUnavailable {
            endpoint: self.endpoint,
        };

        let config = match interface.active_configuration() {
            Ok(config) => config,
            Err(err) => {
                log::debug!("failed to read the active configuration: {}", err);
                return Err(unavailable);
            }
        };

        config
            .out_endpoint(
                interface.number(),
                DEFAULT_ALT_SETTING,
                self.endpoint.endpoint,
            )
            .cloned()
            .ok_or(unavailable)
    }

    fn lock(&self) -> MutexGuard<'_, D> {
        // A panic mid-write leaves nothing half-done: the claim guard has
        // already released the interface.
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D: Device> io::Write for Printer<D> {
    /// Performs one bounded transfer. A partial write reports the bytes
    /// that were sent so that `write_all` resends the rest.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match Printer::write(self, buf) {
            Ok(written) => Ok(written),
            Err(Error::PartialWrite { written, .. }) if written > 0 => Ok(written),
            Err(err) => Err(err.into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

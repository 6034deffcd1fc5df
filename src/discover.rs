//! Finding ZPL printers among the attached USB devices.

use crate::{
    descriptor::first_out_endpoint,
    printer::Printer,
    transport::{AutoDetach, Context, Device},
    Error, Result,
};
use std::fmt;

/// USB vendor ID of Zebra Technologies.
pub const ZEBRA_VENDOR_ID: u16 = 0x0A5F;

/// Selects devices by vendor and, optionally, product ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFilter {
    pub vendor_id: u16,
    /// `None` or `Some(0)` accepts any product of the vendor.
    pub product_id: Option<u16>,
}

impl DeviceFilter {
    /// Matches every product of the given vendor.
    pub fn vendor(vendor_id: u16) -> Self {
        DeviceFilter {
            vendor_id,
            product_id: None,
        }
    }

    pub fn with_product(mut self, product_id: u16) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        if vendor_id != self.vendor_id {
            return false;
        }

        match self.product_id {
            None | Some(0) => true,
            Some(wanted) => wanted == product_id,
        }
    }
}

impl Default for DeviceFilter {
    fn default() -> Self {
        DeviceFilter::vendor(ZEBRA_VENDOR_ID)
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.product_id {
            None | Some(0) => write!(f, "{:04x}:*", self.vendor_id),
            Some(product_id) => write!(f, "{:04x}:{:04x}", self.vendor_id, product_id),
        }
    }
}

/// Turns matching USB devices into [`Printer`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discoverer {
    filter: DeviceFilter,
    auto_detach: AutoDetach,
}

impl Discoverer {
    /// Creates a discoverer with the host's default auto-detach strategy.
    pub fn new(filter: DeviceFilter) -> Self {
        Discoverer {
            filter,
            auto_detach: AutoDetach::host_default(),
        }
    }

    /// Overrides how kernel driver auto-detachment is treated.
    pub fn auto_detach(mut self, auto_detach: AutoDetach) -> Self {
        self.auto_detach = auto_detach;
        self
    }

    pub fn filter(&self) -> DeviceFilter {
        self.filter
    }

    /// Opens every matching device and binds it to its first output endpoint.
    ///
    /// Fails with [`Error::NoDeviceFound`] if no device matches the filter.
    /// Devices without any output endpoint are skipped, so the result can
    /// still be empty.
    pub fn discover<C: Context>(&self, context: &C) -> Result<Vec<Printer<C::Device>>> {
        let filter = self.filter;
        let devices = context.open_devices(|vid, pid| filter.matches(vid, pid))?;

        if devices.is_empty() {
            return Err(Error::NoDeviceFound);
        }

        let mut printers = Vec::with_capacity(devices.len());
        for mut device in devices {
            self.auto_detach.apply(&mut device);

            let tree = match device.descriptor_tree() {
                Ok(tree) => tree,
                Err(err) => {
                    log::warn!(
                        "skipping {:04x}:{:04x}: failed to read descriptors: {}",
                        device.vendor_id(),
                        device.product_id(),
                        err
                    );
                    continue;
                }
            };

            match first_out_endpoint(&tree) {
                Some(endpoint) => {
                    log::debug!(
                        "found printer {:04x}:{:04x} at endpoint {}",
                        device.vendor_id(),
                        device.product_id(),
                        endpoint
                    );
                    if endpoint.interface != 0 || endpoint.alt_setting != 0 {
                        log::debug!(
                            "{:04x}:{:04x}: endpoint {} is outside interface 0, alt setting 0; \
                             writes will not find it",
                            device.vendor_id(),
                            device.product_id(),
                            endpoint
                        );
                    }
                    printers.push(Printer::new(device, endpoint));
                }
                None => log::debug!(
                    "skipping {:04x}:{:04x}: no output endpoint",
                    device.vendor_id(),
                    device.product_id()
                ),
            }
        }

        Ok(printers)
    }
}

/// Discovers every printer matching `filter`.
///
/// Shorthand for [`Discoverer::new`] followed by [`Discoverer::discover`].
pub fn discover<C: Context>(context: &C, filter: DeviceFilter) -> Result<Vec<Printer<C::Device>>> {
    Discoverer::new(filter).discover(context)
}

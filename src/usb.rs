//! The libusb transport, implemented with `rusb`.

use crate::{
    descriptor::{
        AltSetting, ConfigDescriptor, Direction, EndpointDescriptor, InterfaceDescriptor,
        TransferType,
    },
    transport::{Context, Device},
};
use rusb::{DeviceDescriptor, DeviceHandle, UsbContext};
use std::time::Duration;

/// A libusb context.
///
/// Every device opened through it keeps the context alive, so handles
/// never outlive the library state they depend on.
#[derive(Debug, Clone)]
pub struct Usb<T: UsbContext = rusb::Context> {
    context: T,
}

impl Usb<rusb::Context> {
    /// Creates a fresh libusb context.
    pub fn new() -> rusb::Result<Self> {
        Ok(Usb {
            context: rusb::Context::new()?,
        })
    }
}

impl<T: UsbContext> Context for Usb<T> {
    type Device = UsbDevice<T>;

    fn open_devices<F>(&self, mut filter: F) -> rusb::Result<Vec<UsbDevice<T>>>
    where
        F: FnMut(u16, u16) -> bool,
    {
        let device_list = self.context.devices()?;
        let mut devices = Vec::new();

        for device in device_list.iter() {
            // Skip devices where this step fails.
            let descriptor = match device.device_descriptor() {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    log::debug!(
                        "skipping device {:03}:{:03}: {}",
                        device.bus_number(),
                        device.address(),
                        err
                    );
                    continue;
                }
            };

            if !filter(descriptor.vendor_id(), descriptor.product_id()) {
                continue;
            }

            let handle = device.open()?;
            devices.push(UsbDevice::new(handle, descriptor));
        }

        Ok(devices)
    }
}

/// An opened libusb device.
pub struct UsbDevice<T: UsbContext> {
    handle: DeviceHandle<T>,
    descriptor: DeviceDescriptor,
    control_timeout: Duration,
}

impl<T: UsbContext> UsbDevice<T> {
    fn new(handle: DeviceHandle<T>, descriptor: DeviceDescriptor) -> Self {
        UsbDevice {
            handle,
            descriptor,
            control_timeout: Duration::from_secs(1),
        }
    }
}

impl<T: UsbContext> Device for UsbDevice<T> {
    fn vendor_id(&self) -> u16 {
        self.descriptor.vendor_id()
    }

    fn product_id(&self) -> u16 {
        self.descriptor.product_id()
    }

    fn bus_number(&self) -> u8 {
        self.handle.device().bus_number()
    }

    fn address(&self) -> u8 {
        self.handle.device().address()
    }

    fn descriptor_tree(&self) -> rusb::Result<Vec<ConfigDescriptor>> {
        let device = self.handle.device();
        (0..self.descriptor.num_configurations())
            .map(|index| {
                device
                    .config_descriptor(index)
                    .map(|config| ConfigDescriptor::from(&config))
            })
            .collect()
    }

    fn active_configuration(&self) -> rusb::Result<ConfigDescriptor> {
        let config = self.handle.device().active_config_descriptor()?;
        Ok(ConfigDescriptor::from(&config))
    }

    fn product_string(&self) -> rusb::Result<Option<String>> {
        if self.descriptor.product_string_index().is_none() {
            return Ok(None);
        }

        let languages = self.handle.read_languages(self.control_timeout)?;
        match languages.first() {
            Some(language) => self
                .handle
                .read_product_string(*language, &self.descriptor, self.control_timeout)
                .map(Some),
            None => Ok(None),
        }
    }

    fn set_auto_detach(&mut self, enable: bool) -> rusb::Result<()> {
        self.handle.set_auto_detach_kernel_driver(enable)
    }

    fn set_control_timeout(&mut self, timeout: Duration) {
        // libusb treats a zero timeout as unlimited.
        self.control_timeout = timeout;
    }

    fn claim_interface(&mut self, number: u8) -> rusb::Result<()> {
        self.handle.claim_interface(number)
    }

    fn release_interface(&mut self, number: u8) -> rusb::Result<()> {
        self.handle.release_interface(number)
    }

    fn write_out(
        &mut self,
        endpoint: &EndpointDescriptor,
        buf: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        match endpoint.transfer_type {
            TransferType::Interrupt => self.handle.write_interrupt(endpoint.address(), buf, timeout),
            _ => self.handle.write_bulk(endpoint.address(), buf, timeout),
        }
    }
}

impl From<rusb::Direction> for Direction {
    fn from(direction: rusb::Direction) -> Self {
        match direction {
            rusb::Direction::In => Direction::In,
            rusb::Direction::Out => Direction::Out,
        }
    }
}

impl From<rusb::TransferType> for TransferType {
    fn from(transfer_type: rusb::TransferType) -> Self {
        match transfer_type {
            rusb::TransferType::Control => TransferType::Control,
            rusb::TransferType::Isochronous => TransferType::Isochronous,
            rusb::TransferType::Bulk => TransferType::Bulk,
            rusb::TransferType::Interrupt => TransferType::Interrupt,
        }
    }
}

impl From<&rusb::ConfigDescriptor> for ConfigDescriptor {
    fn from(config: &rusb::ConfigDescriptor) -> Self {
        let interfaces = config
            .interfaces()
            .map(|iface| InterfaceDescriptor {
                number: iface.number(),
                alt_settings: iface
                    .descriptors()
                    .map(|alt| AltSetting {
                        number: alt.setting_number(),
                        endpoints: alt
                            .endpoint_descriptors()
                            .map(|ep| EndpointDescriptor {
                                number: ep.number(),
                                direction: ep.direction().into(),
                                transfer_type: ep.transfer_type().into(),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        ConfigDescriptor {
            number: config.number(),
            interfaces,
        }
    }
}

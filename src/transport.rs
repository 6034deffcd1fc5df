//! The USB host transport the printer code is written against.
//!
//! [`crate::usb`] implements these traits on top of libusb. Keeping them
//! separate lets discovery and the write path run against any transport.

use crate::descriptor::{ConfigDescriptor, EndpointDescriptor};
use std::{
    ops::{Deref, DerefMut},
    time::Duration,
};

/// An open USB context that can enumerate and open devices.
pub trait Context {
    type Device: Device;

    /// Opens every device whose `(vendor_id, product_id)` pair is accepted
    /// by `filter`.
    fn open_devices<F>(&self, filter: F) -> rusb::Result<Vec<Self::Device>>
    where
        F: FnMut(u16, u16) -> bool;
}

/// An opened USB device.
pub trait Device {
    fn vendor_id(&self) -> u16;
    fn product_id(&self) -> u16;
    fn bus_number(&self) -> u8;
    fn address(&self) -> u8;

    /// Reads every configuration descriptor of the device.
    fn descriptor_tree(&self) -> rusb::Result<Vec<ConfigDescriptor>>;

    /// Reads the currently active configuration descriptor.
    fn active_configuration(&self) -> rusb::Result<ConfigDescriptor>;

    /// Reads the product string, if the device has one.
    fn product_string(&self) -> rusb::Result<Option<String>>;

    fn set_auto_detach(&mut self, enable: bool) -> rusb::Result<()>;

    /// Sets the timeout for control transfers. Zero disables it.
    fn set_control_timeout(&mut self, timeout: Duration);

    fn claim_interface(&mut self, number: u8) -> rusb::Result<()>;
    fn release_interface(&mut self, number: u8) -> rusb::Result<()>;

    /// Transfers `buf` to the given output endpoint.
    ///
    /// Returns the number of bytes the device accepted, or
    /// `rusb::Error::Timeout` if the transfer did not finish within `timeout`.
    ///
    /// Implementations must return once `timeout` has elapsed, however the
    /// device behaves. Writes rely on this to stay bounded.
    fn write_out(
        &mut self,
        endpoint: &EndpointDescriptor,
        buf: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;
}

/// How discovery treats the kernel's automatic driver detachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoDetach {
    /// Turn automatic detachment off.
    Disable,
    /// Turn automatic detachment on.
    Enable,
    /// Do not touch the setting.
    Leave,
}

impl AutoDetach {
    /// The strategy for the host this binary was built for.
    ///
    /// Only Linux attaches kernel drivers that libusb can detach, so every
    /// other platform leaves the device alone.
    pub fn host_default() -> Self {
        if cfg!(target_os = "linux") {
            AutoDetach::Disable
        } else {
            AutoDetach::Leave
        }
    }

    pub(crate) fn apply<D: Device>(self, device: &mut D) {
        let enable = match self {
            AutoDetach::Disable => false,
            AutoDetach::Enable => true,
            AutoDetach::Leave => return,
        };

        if let Err(err) = device.set_auto_detach(enable) {
            log::debug!(
                "could not set auto-detach to {} on {:04x}:{:04x}: {}",
                enable,
                device.vendor_id(),
                device.product_id(),
                err
            );
        }
    }
}

impl Default for AutoDetach {
    fn default() -> Self {
        Self::host_default()
    }
}

/// An interface claimed for the lifetime of this guard.
///
/// The interface is released when the guard is dropped.
pub struct ClaimedInterface<'a, D: Device> {
    device: &'a mut D,
    number: u8,
}

impl<'a, D: Device> ClaimedInterface<'a, D> {
    pub fn claim(device: &'a mut D, number: u8) -> rusb::Result<Self> {
        device.claim_interface(number)?;
        Ok(ClaimedInterface { device, number })
    }

    pub fn number(&self) -> u8 {
        self.number
    }
}

impl<D: Device> Deref for ClaimedInterface<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.device
    }
}

impl<D: Device> DerefMut for ClaimedInterface<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.device
    }
}

impl<D: Device> Drop for ClaimedInterface<'_, D> {
    fn drop(&mut self) {
        if let Err(err) = self.device.release_interface(self.number) {
            log::warn!("failed to release interface {}: {}", self.number, err);
        }
    }
}

/// An in-memory transport for tests.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::{
        sync::{Arc, Mutex},
        thread,
    };

    /// How a mock device reacts to a write.
    #[derive(Debug, Clone, Copy)]
    pub(crate) enum Accept {
        /// Take every byte.
        All,
        /// Take at most this many bytes.
        Limit(usize),
        /// Never finish; wait out the timeout and report it.
        Stall,
        /// Fail with the given error.
        Fail(rusb::Error),
    }

    /// What happened to a mock device, shared between all of its clones.
    #[derive(Debug)]
    pub(crate) struct State {
        pub(crate) accept: Accept,
        pub(crate) connected: bool,
        pub(crate) claimed: Vec<u8>,
        pub(crate) released: Vec<u8>,
        pub(crate) auto_detach: Option<bool>,
        pub(crate) control_timeout: Option<Duration>,
        pub(crate) write_timeouts: Vec<Duration>,
        pub(crate) written: Vec<u8>,
    }

    #[derive(Debug, Clone)]
    pub(crate) struct MockDevice {
        pub(crate) vendor_id: u16,
        pub(crate) product_id: u16,
        pub(crate) tree: Option<Vec<ConfigDescriptor>>,
        pub(crate) state: Arc<Mutex<State>>,
    }

    impl MockDevice {
        pub(crate) fn new(vendor_id: u16, product_id: u16, tree: Vec<ConfigDescriptor>) -> Self {
            MockDevice {
                vendor_id,
                product_id,
                tree: Some(tree),
                state: Arc::new(Mutex::new(State {
                    accept: Accept::All,
                    connected: true,
                    claimed: Vec::new(),
                    released: Vec::new(),
                    auto_detach: None,
                    control_timeout: None,
                    write_timeouts: Vec::new(),
                    written: Vec::new(),
                })),
            }
        }

        /// A device whose descriptors cannot be read.
        pub(crate) fn unreadable(vendor_id: u16, product_id: u16) -> Self {
            MockDevice {
                tree: None,
                ..Self::new(vendor_id, product_id, Vec::new())
            }
        }

        pub(crate) fn accept(self, accept: Accept) -> Self {
            self.state.lock().unwrap().accept = accept;
            self
        }

        pub(crate) fn state(&self) -> std::sync::MutexGuard<'_, State> {
            self.state.lock().unwrap()
        }
    }

    impl Device for MockDevice {
        fn vendor_id(&self) -> u16 {
            self.vendor_id
        }

        fn product_id(&self) -> u16 {
            self.product_id
        }

        fn bus_number(&self) -> u8 {
            1
        }

        fn address(&self) -> u8 {
            4
        }

        fn descriptor_tree(&self) -> rusb::Result<Vec<ConfigDescriptor>> {
            self.tree.clone().ok_or(rusb::Error::Io)
        }

        fn active_configuration(&self) -> rusb::Result<ConfigDescriptor> {
            if !self.state().connected {
                return Err(rusb::Error::NoDevice);
            }
            self.tree
                .as_ref()
                .and_then(|tree| tree.first().cloned())
                .ok_or(rusb::Error::NotFound)
        }

        fn product_string(&self) -> rusb::Result<Option<String>> {
            Ok(Some(String::from("Mock Printer")))
        }

        fn set_auto_detach(&mut self, enable: bool) -> rusb::Result<()> {
            self.state().auto_detach = Some(enable);
            Ok(())
        }

        fn set_control_timeout(&mut self, timeout: Duration) {
            self.state().control_timeout = Some(timeout);
        }

        fn claim_interface(&mut self, number: u8) -> rusb::Result<()> {
            self.state().claimed.push(number);
            Ok(())
        }

        fn release_interface(&mut self, number: u8) -> rusb::Result<()> {
            self.state().released.push(number);
            Ok(())
        }

        fn write_out(
            &mut self,
            _endpoint: &EndpointDescriptor,
            buf: &[u8],
            timeout: Duration,
        ) -> rusb::Result<usize> {
            let accept = {
                let mut state = self.state();
                state.write_timeouts.push(timeout);
                state.accept
            };

            match accept {
                Accept::All => {
                    self.state().written.extend_from_slice(buf);
                    Ok(buf.len())
                }
                Accept::Limit(limit) => {
                    let n = limit.min(buf.len());
                    self.state().written.extend_from_slice(&buf[..n]);
                    Ok(n)
                }
                Accept::Stall => {
                    thread::sleep(timeout);
                    Err(rusb::Error::Timeout)
                }
                Accept::Fail(err) => Err(err),
            }
        }
    }

    #[derive(Debug, Default)]
    pub(crate) struct MockContext {
        pub(crate) devices: Vec<MockDevice>,
        pub(crate) fail: Option<rusb::Error>,
    }

    impl MockContext {
        pub(crate) fn new(devices: Vec<MockDevice>) -> Self {
            MockContext {
                devices,
                fail: None,
            }
        }
    }

    impl Context for MockContext {
        type Device = MockDevice;

        fn open_devices<F>(&self, mut filter: F) -> rusb::Result<Vec<MockDevice>>
        where
            F: FnMut(u16, u16) -> bool,
        {
            if let Some(err) = self.fail {
                return Err(err);
            }

            Ok(self
                .devices
                .iter()
                .filter(|dev| filter(dev.vendor_id, dev.product_id))
                .cloned()
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockDevice;
    use super::*;

    #[test]
    fn test_claim_released_on_drop() {
        let mut device = MockDevice::new(0x0a5f, 0x0100, Vec::new());
        {
            let claimed = ClaimedInterface::claim(&mut device, 0).unwrap();
            assert_eq!(claimed.number(), 0);
            assert_eq!(claimed.state().claimed, vec![0]);
            assert!(claimed.state().released.is_empty());
        }
        assert_eq!(device.state().released, vec![0]);
    }

    #[test]
    fn test_auto_detach_strategy() {
        let mut device = MockDevice::new(0x0a5f, 0x0100, Vec::new());

        AutoDetach::Leave.apply(&mut device);
        assert_eq!(device.state().auto_detach, None);

        AutoDetach::Disable.apply(&mut device);
        assert_eq!(device.state().auto_detach, Some(false));

        AutoDetach::Enable.apply(&mut device);
        assert_eq!(device.state().auto_detach, Some(true));
    }

    #[test]
    fn test_host_default() {
        let expected = if cfg!(target_os = "linux") {
            AutoDetach::Disable
        } else {
            AutoDetach::Leave
        };
        assert_eq!(AutoDetach::host_default(), expected);
    }
}

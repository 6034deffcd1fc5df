//! An owned snapshot of a device's descriptor tree.
//!
//! The tree mirrors the USB layout: configurations contain interfaces,
//! interfaces contain alternate settings and alternate settings contain
//! endpoints. Discovery walks it once and remembers where the first
//! output endpoint lives.

use std::fmt;

/// Mask for the endpoint number inside an endpoint address.
const ENDPOINT_NUMBER_MASK: u8 = 0x0f;
/// Bit 7 of an endpoint address is set for device-to-host endpoints.
const ENDPOINT_DIR_IN: u8 = 0x80;

/// The direction data flows through an endpoint, seen from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// The kind of transfer an endpoint performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// The endpoint number, without the direction bit.
    pub number: u8,
    pub direction: Direction,
    pub transfer_type: TransferType,
}

impl EndpointDescriptor {
    /// Returns the full endpoint address as used on the wire.
    pub fn address(&self) -> u8 {
        let number = self.number & ENDPOINT_NUMBER_MASK;
        match self.direction {
            Direction::In => number | ENDPOINT_DIR_IN,
            Direction::Out => number,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AltSetting {
    pub number: u8,
    pub endpoints: Vec<EndpointDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub number: u8,
    pub alt_settings: Vec<AltSetting>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDescriptor {
    pub number: u8,
    pub interfaces: Vec<InterfaceDescriptor>,
}

impl ConfigDescriptor {
    /// Looks up an output endpoint by number inside the given interface
    /// and alternate setting.
    pub fn out_endpoint(
        &self,
        interface: u8,
        alt_setting: u8,
        number: u8,
    ) -> Option<&EndpointDescriptor> {
        self.interfaces
            .iter()
            .filter(|iface| iface.number == interface)
            .flat_map(|iface| iface.alt_settings.iter())
            .filter(|alt| alt.number == alt_setting)
            .flat_map(|alt| alt.endpoints.iter())
            .find(|ep| ep.number == number && ep.direction == Direction::Out)
    }
}

/// Identifies one transmit path inside a device's descriptor tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointAddress {
    pub configuration: u8,
    pub interface: u8,
    pub alt_setting: u8,
    pub endpoint: u8,
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.configuration, self.interface, self.alt_setting, self.endpoint
        )
    }
}

/// Finds the first output endpoint in the tree.
///
/// The walk goes configurations, interfaces, alternate settings and then
/// endpoints, each in descriptor order, and stops at the first match.
pub fn first_out_endpoint(tree: &[ConfigDescriptor]) -> Option<EndpointAddress> {
    tree.iter().find_map(|config| {
        config.interfaces.iter().find_map(|iface| {
            iface.alt_settings.iter().find_map(|alt| {
                alt.endpoints
                    .iter()
                    .find(|ep| ep.direction == Direction::Out)
                    .map(|ep| EndpointAddress {
                        configuration: config.number,
                        interface: iface.number,
                        alt_setting: alt.number,
                        endpoint: ep.number,
                    })
            })
        })
    })
}

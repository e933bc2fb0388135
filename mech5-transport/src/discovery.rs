//! Device discovery for the Mech5 keypad interface

use hidapi::HidApi;
use rusb::{Device, GlobalContext};
use tracing::{debug, warn};

use crate::device_registry::{self, KEYPAD_INTERFACE};
use crate::error::TransportError;
use crate::types::{DiscoveredDevice, HidCollection, TransportDeviceInfo};
use crate::usb::{is_supported_device, UsbKeypadTransport};

/// libusb discovery of keypad interfaces
#[derive(Debug, Default)]
pub struct UsbDiscovery;

impl UsbDiscovery {
    /// Create a new discovery instance
    pub fn new() -> Self {
        Self
    }

    /// List the keypad interface of every connected supported keyboard
    pub fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError> {
        let mut found = Vec::new();

        for device in rusb::devices()?.iter() {
            if !is_supported_device(&device) {
                continue;
            }
            match describe_keypad_interface(&device) {
                Ok(Some(info)) => {
                    debug!(
                        "Found keypad interface at {} ({:?})",
                        info.location(),
                        info.interface_class
                    );
                    found.push(DiscoveredDevice { info });
                }
                Ok(None) => {
                    debug!(
                        "Device at bus {} address {} has no keypad interface",
                        device.bus_number(),
                        device.address()
                    );
                }
                Err(e) => {
                    warn!(
                        "Failed to read descriptors of device at bus {} address {}: {}",
                        device.bus_number(),
                        device.address(),
                        e
                    );
                }
            }
        }

        Ok(found)
    }

    /// Open a discovered device and claim its keypad interface
    pub fn open_device(
        &self,
        device: &DiscoveredDevice,
    ) -> Result<UsbKeypadTransport, TransportError> {
        let usb_device = rusb::devices()?
            .iter()
            .find(|d| d.bus_number() == device.info.bus && d.address() == device.info.address)
            .ok_or_else(|| TransportError::DeviceNotFound(device.info.location()))?;

        UsbKeypadTransport::open(&usb_device, device.info.clone())
    }

    /// Read the product string of a discovered device
    ///
    /// Opens a temporary handle, so it is left out of [`Self::list_devices`],
    /// which the daemon calls on every poll.
    pub fn product_name(&self, device: &DiscoveredDevice) -> Option<String> {
        let usb_device = rusb::devices()
            .ok()?
            .iter()
            .find(|d| d.bus_number() == device.info.bus && d.address() == device.info.address)?;
        let desc = usb_device.device_descriptor().ok()?;
        usb_device
            .open()
            .ok()?
            .read_product_string_ascii(&desc)
            .ok()
    }
}

/// Initialize hidapi
pub fn open_hidapi() -> Result<HidApi, TransportError> {
    Ok(HidApi::new()?)
}

/// Build the transport info for the keypad interface of `device`
fn describe_keypad_interface(
    device: &Device<GlobalContext>,
) -> Result<Option<TransportDeviceInfo>, TransportError> {
    let desc = device.device_descriptor()?;
    let config = device.active_config_descriptor()?;

    let Some(iface_desc) = config
        .interfaces()
        .filter(|iface| iface.number() == KEYPAD_INTERFACE)
        .flat_map(|iface| iface.descriptors())
        .next()
    else {
        return Ok(None);
    };

    let interface_class = device_registry::classify_interface(
        iface_desc.class_code(),
        iface_desc.sub_class_code(),
        iface_desc.protocol_code(),
    );

    Ok(Some(TransportDeviceInfo {
        vid: desc.vendor_id(),
        pid: desc.product_id(),
        bus: device.bus_number(),
        address: device.address(),
        interface_number: iface_desc.interface_number(),
        interface_class,
        // Filled in once the device is opened
        product_name: None,
    }))
}

/// List the HID top-level collections of every supported keyboard
///
/// hidapi reports one entry per collection, which shows which interface
/// carries the LED output report (usage page 0x08).
pub fn list_hid_collections(api: &HidApi) -> Vec<HidCollection> {
    api.device_list()
        .filter(|info| device_registry::is_supported(info.vendor_id(), info.product_id()))
        .map(|info| HidCollection {
            vid: info.vendor_id(),
            pid: info.product_id(),
            interface_number: info.interface_number(),
            usage_page: info.usage_page(),
            usage: info.usage(),
            path: info.path().to_string_lossy().into_owned(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires USB access (run with: cargo test -- --ignored)
    fn test_list_devices() {
        // Passes without a keyboard connected
        let result = UsbDiscovery::new().list_devices();
        assert!(result.is_ok());
    }

    #[test]
    #[ignore] // Requires USB access
    fn test_listing_does_not_open_devices() {
        // Strings are only read through an open handle
        let devices = UsbDiscovery::new().list_devices().unwrap();
        assert!(devices.iter().all(|d| d.info.product_name.is_none()));
    }
}

//! libusb transport bound to the keypad interface

use std::time::Duration;

use rusb::{DeviceHandle, GlobalContext};
use tracing::{debug, info, warn};

use crate::device_registry::{self, descriptor_request, KEYPAD_ENDPOINT};
use crate::error::TransportError;
use crate::types::{ControlSetup, TransportDeviceInfo};
use crate::{ControlPipe, ReportSource};

/// Timeout for the one-shot descriptor fetch at attach time
const DESCRIPTOR_TIMEOUT: Duration = Duration::from_millis(1000);

/// USB transport for one claimed interface of the keyboard
///
/// Dropping the transport releases the interface and hands it back to the
/// kernel driver if one was detached on open.
pub struct UsbKeypadTransport {
    handle: DeviceHandle<GlobalContext>,
    info: TransportDeviceInfo,
    /// Interrupt IN endpoint to read reports from
    endpoint: u8,
    /// Whether we detached a kernel driver and must re-attach it
    reattach: bool,
}

impl UsbKeypadTransport {
    /// Open the device and claim the interface described by `info`
    ///
    /// The product string is read here, through the handle kept for the
    /// lifetime of the transport.
    pub fn open(
        device: &rusb::Device<GlobalContext>,
        mut info: TransportDeviceInfo,
    ) -> Result<Self, TransportError> {
        let iface = info.interface_number;
        let mut handle = device.open()?;

        if info.product_name.is_none() {
            info.product_name = device
                .device_descriptor()
                .ok()
                .and_then(|desc| handle.read_product_string_ascii(&desc).ok());
        }

        let reattach = match handle.kernel_driver_active(iface) {
            Ok(true) => {
                debug!("Detaching kernel driver from interface {}", iface);
                handle.detach_kernel_driver(iface)?;
                true
            }
            Ok(false) => false,
            // Not supported on this platform: nothing to detach
            Err(rusb::Error::NotSupported) => false,
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = handle.claim_interface(iface) {
            if reattach {
                let _ = handle.attach_kernel_driver(iface);
            }
            return Err(e.into());
        }

        info!(
            "Claimed interface {} of {:04x}:{:04x} ({}) at {}",
            iface,
            info.vid,
            info.pid,
            info.product_name.as_deref().unwrap_or("unknown"),
            info.location()
        );

        Ok(Self {
            handle,
            info,
            endpoint: KEYPAD_ENDPOINT,
            reattach,
        })
    }

    /// Device information
    pub fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }

    /// Fetch the raw HID report descriptor of the claimed interface
    pub fn read_report_descriptor(&self) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; descriptor_request::MAX_LENGTH];
        let len = self.handle.read_control(
            descriptor_request::REQUEST_TYPE,
            descriptor_request::REQUEST,
            descriptor_request::VALUE,
            u16::from(self.info.interface_number),
            &mut buf,
            DESCRIPTOR_TIMEOUT,
        )?;
        buf.truncate(len);
        debug!(
            "Report descriptor of interface {}: {} bytes",
            self.info.interface_number, len
        );
        Ok(buf)
    }
}

impl ControlPipe for UsbKeypadTransport {
    fn write_control(&self, setup: ControlSetup, data: &[u8]) -> Result<usize, TransportError> {
        debug!(
            "Control OUT type=0x{:02X} req=0x{:02X} value=0x{:04X} index={} data={:02X?}",
            setup.request_type, setup.request, setup.value, setup.index, data
        );
        let written = self.handle.write_control(
            setup.request_type,
            setup.request,
            setup.value,
            setup.index,
            data,
            setup.timeout,
        )?;
        if written != data.len() {
            return Err(TransportError::ShortTransfer {
                expected: data.len(),
                actual: written,
            });
        }
        Ok(written)
    }
}

impl ReportSource for UsbKeypadTransport {
    fn read_report(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<usize>, TransportError> {
        match self.handle.read_interrupt(self.endpoint, buf, timeout) {
            Ok(len) => Ok(Some(len)),
            Err(rusb::Error::Timeout) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for UsbKeypadTransport {
    fn drop(&mut self) {
        let iface = self.info.interface_number;
        // Both calls fail harmlessly when the device is already unplugged
        let _ = self.handle.release_interface(iface);
        if self.reattach {
            if let Err(e) = self.handle.attach_kernel_driver(iface) {
                if e != rusb::Error::NoDevice {
                    warn!("Failed to re-attach kernel driver to interface {}: {}", iface, e);
                }
            }
        }
        debug!("UsbKeypadTransport for {} dropped", self.info.location());
    }
}

/// Whether `device` is one of the supported keyboards
pub(crate) fn is_supported_device(device: &rusb::Device<GlobalContext>) -> bool {
    device
        .device_descriptor()
        .map(|desc| device_registry::is_supported(desc.vendor_id(), desc.product_id()))
        .unwrap_or(false)
}

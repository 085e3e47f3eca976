//! libusb device link to a TI-84 Plus CE.
//!
//! Discovery opens the first device matching the vendor/product ids.
//! Configuration then prepares it for bulk transfers:
//!
//! 1. detach the kernel driver from interface 0 if one is bound (Linux only;
//!    other platforms report "not supported", which is ignored),
//! 2. select the first configuration,
//! 3. claim interface 0,
//! 4. find one bulk IN and one bulk OUT endpoint on interface 0, setting 0.
//!
//! There is no reconnection logic: if the calculator is unplugged the next
//! transfer fails and the caller decides what to do.

use std::time::Duration;

use rusb::{DeviceHandle, GlobalContext, TransferType};
use tracing::{debug, info, warn};

use super::{BulkIo, TransportError};

const INTERFACE: u8 = 0;
const ALT_SETTING: u8 = 0;

/// An open, configured calculator.
pub struct DeviceLink {
    handle: DeviceHandle<GlobalContext>,
    endpoint_in: u8,
    endpoint_out: u8,
}

impl std::fmt::Debug for DeviceLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLink")
            .field("endpoint_in", &format_args!("0x{:02x}", self.endpoint_in))
            .field("endpoint_out", &format_args!("0x{:02x}", self.endpoint_out))
            .finish()
    }
}

/// An opened but not yet configured device.
pub struct DiscoveredDevice {
    handle: DeviceHandle<GlobalContext>,
}

impl DeviceLink {
    /// Opens the first attached device with the given ids.
    ///
    /// # Errors
    ///
    /// [`TransportError::DeviceNotFound`] when nothing matches.
    pub fn discover(vendor_id: u16, product_id: u16) -> Result<DiscoveredDevice, TransportError> {
        let handle = rusb::open_device_with_vid_pid(vendor_id, product_id).ok_or(
            TransportError::DeviceNotFound {
                vendor_id,
                product_id,
            },
        )?;
        info!("found calculator {vendor_id:04x}:{product_id:04x}");
        Ok(DiscoveredDevice { handle })
    }
}

impl DiscoveredDevice {
    /// Claims the device and resolves its bulk endpoints.
    ///
    /// # Errors
    ///
    /// [`TransportError::EndpointConfiguration`] when claiming fails or the
    /// interface lacks a bulk endpoint in either direction.
    pub fn configure(mut self) -> Result<DeviceLink, TransportError> {
        self.detach_kernel_driver();

        let device = self.handle.device();
        let config = device
            .config_descriptor(0)
            .map_err(|e| TransportError::EndpointConfiguration(format!("no configuration: {e}")))?;

        if let Err(e) = self.handle.set_active_configuration(config.number()) {
            // Already-configured devices may refuse a redundant request.
            warn!("could not select configuration {}: {e}", config.number());
        }

        self.handle.claim_interface(INTERFACE).map_err(|e| {
            TransportError::EndpointConfiguration(format!("claim interface {INTERFACE}: {e}"))
        })?;

        let mut endpoint_in = None;
        let mut endpoint_out = None;

        let descriptors = config
            .interfaces()
            .filter(|i| i.number() == INTERFACE)
            .flat_map(|i| i.descriptors())
            .filter(|d| d.setting_number() == ALT_SETTING);

        for descriptor in descriptors {
            for endpoint in descriptor.endpoint_descriptors() {
                if endpoint.transfer_type() != TransferType::Bulk {
                    continue;
                }
                match endpoint.direction() {
                    rusb::Direction::In => endpoint_in = endpoint_in.or(Some(endpoint.address())),
                    rusb::Direction::Out => endpoint_out = endpoint_out.or(Some(endpoint.address())),
                }
            }
        }

        match (endpoint_in, endpoint_out) {
            (Some(endpoint_in), Some(endpoint_out)) => {
                info!(
                    "calculator configured: bulk IN 0x{endpoint_in:02x}, bulk OUT 0x{endpoint_out:02x}"
                );
                Ok(DeviceLink {
                    handle: self.handle,
                    endpoint_in,
                    endpoint_out,
                })
            }
            (None, _) => Err(TransportError::EndpointConfiguration(
                "no bulk IN endpoint on interface 0".to_string(),
            )),
            (_, None) => Err(TransportError::EndpointConfiguration(
                "no bulk OUT endpoint on interface 0".to_string(),
            )),
        }
    }

    fn detach_kernel_driver(&mut self) {
        match self.handle.kernel_driver_active(INTERFACE) {
            Ok(true) => match self.handle.detach_kernel_driver(INTERFACE) {
                Ok(()) => debug!("detached kernel driver from interface {INTERFACE}"),
                Err(e) => warn!("could not detach kernel driver: {e}"),
            },
            Ok(false) => {}
            Err(rusb::Error::NotSupported) => {}
            Err(e) => warn!("could not query kernel driver state: {e}"),
        }
    }
}

impl BulkIo for DeviceLink {
    fn write_bulk(&mut self, data: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        self.handle
            .write_bulk(self.endpoint_out, data, timeout)
            .map_err(|e| TransportError::from_usb("bulk write", e))
    }

    fn read_bulk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        self.handle
            .read_bulk(self.endpoint_in, buf, timeout)
            .map_err(|e| TransportError::from_usb("bulk read", e))
    }
}

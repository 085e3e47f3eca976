//! Infrastructure layer for the calculator bridge.
//!
//! Contains OS-facing adapters: the libusb bulk transport, configuration
//! file storage, log file setup, and the console relay.

pub mod console_relay;
pub mod logging;
pub mod storage;
pub mod usb;

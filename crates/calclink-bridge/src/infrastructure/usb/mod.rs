//! USB bulk transport for the calculator link.
//!
//! # Two layers (for beginners)
//!
//! - [`BulkIo`] is the raw capability: "write these bytes to the OUT
//!   endpoint", "read up to N bytes from the IN endpoint".  The production
//!   implementation is [`device::DeviceLink`] (libusb via `rusb`); tests use
//!   [`mock::MockBulkDevice`].
//!
//! - [`Transport`] adds the link's policies on top: segmented writes for large
//!   payloads, a single retry on a failed read, and segmented reads that stop
//!   at the first short packet.
//!
//! A read timeout is an expected outcome on this link (the calculator simply
//! has nothing to say), so it is a distinct [`TransportError::Timeout`]
//! variant rather than a generic I/O failure.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

pub mod device;
pub mod mock;

/// Texas Instruments vendor id.
pub const TI_VENDOR_ID: u16 = 0x0451;

/// TI-84 Plus CE product id.
pub const TI84_PLUS_CE_PRODUCT_ID: u16 = 0xE008;

/// Size of one segment in chunked transfers (full-speed bulk packet size).
pub const CHUNK_SIZE: usize = 64;

/// Buffer size of a standard read.
pub const DEFAULT_READ_SIZE: usize = 512;

/// Error type for transport operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No device with the given ids is attached.
    #[error("no USB device {vendor_id:04x}:{product_id:04x} found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// The device lacks the expected bulk endpoints, or claiming failed.
    #[error("endpoint configuration failed: {0}")]
    EndpointConfiguration(String),

    /// The read timed out without data.
    #[error("USB transfer timed out")]
    Timeout,

    /// Any other libusb failure.
    #[error("USB {operation} failed: {source}")]
    Usb {
        operation: &'static str,
        #[source]
        source: rusb::Error,
    },
}

impl TransportError {
    /// Wraps a libusb error, keeping timeouts distinct.
    pub fn from_usb(operation: &'static str, source: rusb::Error) -> Self {
        match source {
            rusb::Error::Timeout => Self::Timeout,
            source => Self::Usb { operation, source },
        }
    }
}

/// Raw bulk endpoint access.
pub trait BulkIo: Send {
    /// Writes `data` to the bulk OUT endpoint, returning the bytes written.
    fn write_bulk(&mut self, data: &[u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Reads from the bulk IN endpoint into `buf`, returning the bytes read.
    fn read_bulk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;
}

/// Bulk transport with the link's write/read policies.
pub struct Transport<B: BulkIo> {
    io: B,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl<B: BulkIo> Transport<B> {
    pub fn new(io: B, read_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            io,
            read_timeout,
            write_timeout,
        }
    }

    /// Writes `data`; `chunked` splits it into [`CHUNK_SIZE`] segments.
    ///
    /// Returns the total number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns the first [`TransportError`] from the underlying device.
    pub fn write(&mut self, data: &[u8], chunked: bool) -> Result<usize, TransportError> {
        if !chunked {
            let written = self.io.write_bulk(data, self.write_timeout)?;
            debug!(bytes = written, "wrote {}", hex::encode(data));
            return Ok(written);
        }

        let mut total = 0;
        for segment in data.chunks(CHUNK_SIZE) {
            total += self.io.write_bulk(segment, self.write_timeout)?;
        }
        debug!(bytes = total, segments = data.chunks(CHUNK_SIZE).len(), "wrote chunked payload");
        Ok(total)
    }

    /// Reads up to `max` bytes.
    ///
    /// A non-timeout failure is retried once with a [`CHUNK_SIZE`] buffer.
    ///
    /// # Errors
    ///
    /// [`TransportError::Timeout`] when the device has nothing to send; any
    /// other error if the retry fails as well.
    pub fn read(&mut self, max: usize) -> Result<Vec<u8>, TransportError> {
        match self.read_once(max) {
            Err(TransportError::Timeout) => Err(TransportError::Timeout),
            Err(e) => {
                warn!("read of {max} bytes failed ({e}); retrying with {CHUNK_SIZE}");
                self.read_once(CHUNK_SIZE)
            }
            ok => ok,
        }
    }

    /// Reads [`CHUNK_SIZE`] segments until a short segment, a timeout, or an
    /// error, and returns everything accumulated so far.
    pub fn read_chunked(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; CHUNK_SIZE];

        loop {
            match self.io.read_bulk(&mut buf, self.read_timeout) {
                Ok(n) => {
                    out.extend_from_slice(&buf[..n]);
                    if n < CHUNK_SIZE {
                        break;
                    }
                }
                Err(TransportError::Timeout) => break,
                Err(e) => {
                    warn!("chunked read stopped after {} bytes: {e}", out.len());
                    break;
                }
            }
        }
        debug!(bytes = out.len(), "chunked read {}", hex::encode(&out));
        out
    }

    fn read_once(&mut self, max: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; max];
        let n = self.io.read_bulk(&mut buf, self.read_timeout)?;
        buf.truncate(n);
        debug!(bytes = n, "read {}", hex::encode(&buf));
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::usb::mock::MockBulkDevice;

    fn transport(mock: &MockBulkDevice) -> Transport<MockBulkDevice> {
        Transport::new(mock.clone(), Duration::from_millis(10), Duration::from_millis(10))
    }

    #[test]
    fn test_unchunked_write_is_one_transfer() {
        // Arrange
        let mock = MockBulkDevice::new();
        let mut t = transport(&mock);

        // Act
        let written = t.write(&[0xAB; 100], false).unwrap();

        // Assert
        assert_eq!(written, 100);
        assert_eq!(mock.writes().len(), 1);
    }

    #[test]
    fn test_chunked_write_splits_into_64_byte_segments() {
        let mock = MockBulkDevice::new();
        let mut t = transport(&mock);

        let written = t.write(&[0x01; 150], true).unwrap();

        let sizes: Vec<usize> = mock.writes().iter().map(Vec::len).collect();
        assert_eq!(written, 150);
        assert_eq!(sizes, vec![64, 64, 22]);
    }

    #[test]
    fn test_write_failure_propagates() {
        let mock = MockBulkDevice::new();
        mock.fail_write_at(0);
        let mut t = transport(&mock);

        assert!(matches!(t.write(&[1], false), Err(TransportError::Usb { .. })));
    }

    #[test]
    fn test_read_returns_scripted_bytes() {
        let mock = MockBulkDevice::new();
        mock.push_read(&[0x00, 0x00, 0x00, 0x02, 0x05, 0xE0, 0x00]);
        let mut t = transport(&mock);

        assert_eq!(t.read(DEFAULT_READ_SIZE).unwrap(), vec![0, 0, 0, 2, 5, 0xE0, 0]);
    }

    #[test]
    fn test_read_timeout_is_not_retried() {
        let mock = MockBulkDevice::new();
        mock.push_timeout();
        let mut t = transport(&mock);

        assert_eq!(t.read(DEFAULT_READ_SIZE), Err(TransportError::Timeout));
        assert_eq!(mock.read_calls(), 1);
    }

    #[test]
    fn test_read_error_is_retried_once_with_small_buffer() {
        // Arrange
        let mock = MockBulkDevice::new();
        mock.push_error(rusb::Error::Overflow);
        mock.push_read(&[0x42; 100]);
        let mut t = transport(&mock);

        // Act
        let bytes = t.read(DEFAULT_READ_SIZE).unwrap();

        // Assert – the retry only had room for one chunk
        assert_eq!(bytes.len(), CHUNK_SIZE);
        assert_eq!(mock.read_calls(), 2);
    }

    #[test]
    fn test_read_chunked_stops_at_short_segment() {
        let mock = MockBulkDevice::new();
        mock.push_read(&[0x07; 150]);
        mock.push_read(&[0x08; 10]);
        let mut t = transport(&mock);

        let bytes = t.read_chunked();

        // 64 + 64 + 22: the third segment is short, so the second script
        // entry is never read.
        assert_eq!(bytes.len(), 150);
        assert_eq!(mock.read_calls(), 3);
    }

    #[test]
    fn test_read_chunked_returns_partial_data_on_timeout() {
        let mock = MockBulkDevice::new();
        mock.push_read(&[0x07; 64]);
        mock.push_timeout();
        let mut t = transport(&mock);

        assert_eq!(t.read_chunked().len(), 64);
    }

    #[test]
    fn test_from_usb_keeps_timeout_distinct() {
        assert_eq!(TransportError::from_usb("read", rusb::Error::Timeout), TransportError::Timeout);
        assert!(matches!(
            TransportError::from_usb("read", rusb::Error::Pipe),
            TransportError::Usb { operation: "read", .. }
        ));
    }
}

//! Mock bulk device for unit testing.
//!
//! Allows tests to script what the "calculator" answers and to inspect what
//! the host wrote, without a device attached.  Clones share state, so a test
//! keeps one clone for inspection and hands the other to the code under test.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{BulkIo, TransportError};

/// One scripted answer to a read.
#[derive(Debug, Clone)]
enum ScriptedRead {
    Data(Vec<u8>),
    Timeout,
    Error(rusb::Error),
}

#[derive(Debug, Default)]
struct MockState {
    reads: VecDeque<ScriptedRead>,
    writes: Vec<Vec<u8>>,
    write_calls: usize,
    read_calls: usize,
    fail_write_at: Option<usize>,
}

/// A scripted implementation of [`BulkIo`].
///
/// Reads are answered from a FIFO script; once the script is exhausted every
/// read times out.  A scripted payload larger than the read buffer is split,
/// the remainder answering the next read, the way a real bulk endpoint
/// delivers a long packet.
#[derive(Debug, Clone, Default)]
pub struct MockBulkDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockBulkDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `data` as the answer to the next unanswered read.
    pub fn push_read(&self, data: &[u8]) {
        self.state().reads.push_back(ScriptedRead::Data(data.to_vec()));
    }

    /// Queues a read timeout.
    pub fn push_timeout(&self) {
        self.state().reads.push_back(ScriptedRead::Timeout);
    }

    /// Queues a libusb failure.
    pub fn push_error(&self, error: rusb::Error) {
        self.state().reads.push_back(ScriptedRead::Error(error));
    }

    /// Makes the write with zero-based index `index` fail.
    pub fn fail_write_at(&self, index: usize) {
        self.state().fail_write_at = Some(index);
    }

    /// Every successful write, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state().writes.clone()
    }

    /// Number of `write_bulk` calls, including failed ones.
    pub fn write_calls(&self) -> usize {
        self.state().write_calls
    }

    /// Number of `read_bulk` calls.
    pub fn read_calls(&self) -> usize {
        self.state().read_calls
    }

    /// Number of scripted answers not yet consumed.
    pub fn pending_reads(&self) -> usize {
        self.state().reads.len()
    }
}

impl BulkIo for MockBulkDevice {
    fn write_bulk(&mut self, data: &[u8], _timeout: Duration) -> Result<usize, TransportError> {
        let mut state = self.state();
        let index = state.write_calls;
        state.write_calls += 1;

        if state.fail_write_at == Some(index) {
            return Err(TransportError::from_usb("write", rusb::Error::Io));
        }
        state.writes.push(data.to_vec());
        Ok(data.len())
    }

    fn read_bulk(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, TransportError> {
        let mut state = self.state();
        state.read_calls += 1;

        match state.reads.pop_front() {
            None | Some(ScriptedRead::Timeout) => Err(TransportError::Timeout),
            Some(ScriptedRead::Error(e)) => Err(TransportError::from_usb("read", e)),
            Some(ScriptedRead::Data(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    state.reads.push_front(ScriptedRead::Data(data[n..].to_vec()));
                }
                Ok(n)
            }
        }
    }
}

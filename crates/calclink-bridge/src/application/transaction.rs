//! Transaction engine: runs scripted sequences over a bulk transport.
//!
//! # Failure semantics
//!
//! The calculator's answers are not reliable enough to be treated as hard
//! protocol checks, so the engine is asymmetric:
//!
//! - A failed **OUT** step aborts the whole sequence.  If the host could not
//!   write, the calculator is in an unknown state and every following step
//!   would be meaningless.
//! - An **IN** step never fails.  A timeout or read error is logged as "no
//!   response"; a response that differs from the expected pattern is logged
//!   as a mismatch.  Execution continues either way.

use calclink_core::{Expect, StepAction, TransactionSequence, TransactionStep, TransferMode};
use thiserror::Error;
use tracing::{debug, warn};

use crate::infrastructure::usb::{BulkIo, Transport, TransportError, DEFAULT_READ_SIZE};

/// Error type for sequence execution.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An OUT step failed; later steps were not executed.
    #[error("sequence aborted at step {step} ({description}): {source}")]
    SequenceAborted {
        /// Zero-based index of the failing step.
        step: usize,
        description: String,
        #[source]
        source: TransportError,
    },

    /// A stand-alone write outside a sequence failed.
    #[error("sending {description} failed: {source}")]
    Send {
        description: String,
        #[source]
        source: TransportError,
    },
}

/// Result of a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// OUT step completed; bytes written.
    Sent(usize),
    /// IN step received these bytes.
    Received(Vec<u8>),
    /// IN step got nothing (timeout or read error).
    NoResponse,
}

/// Executes transaction steps against a [`Transport`].
pub struct TransactionEngine<B: BulkIo> {
    transport: Transport<B>,
}

impl<B: BulkIo> TransactionEngine<B> {
    pub fn new(transport: Transport<B>) -> Self {
        Self { transport }
    }

    /// Runs one step, honouring its pre-delay.
    ///
    /// # Errors
    ///
    /// Only OUT steps fail, with the transport's error.
    pub fn run_step(&mut self, step: &TransactionStep) -> Result<StepOutcome, TransportError> {
        if !step.delay().is_zero() {
            std::thread::sleep(step.delay());
        }

        let large = step.mode() == TransferMode::Large;
        match step.action() {
            StepAction::Out(payload) => {
                let written = self.transport.write(payload, large)?;
                debug!("sent {} ({written} bytes)", step.description());
                Ok(StepOutcome::Sent(written))
            }
            StepAction::In(expect) => {
                let response = if large {
                    Some(self.transport.read_chunked()).filter(|bytes| !bytes.is_empty())
                } else {
                    self.read_response()
                };

                let Some(bytes) = response else {
                    warn!("no response for {}", step.description());
                    return Ok(StepOutcome::NoResponse);
                };

                if let Expect::Pattern(pattern) = expect {
                    if bytes != *pattern {
                        warn!(
                            step = step.description(),
                            expected = %hex::encode(pattern),
                            actual = %hex::encode(&bytes),
                            "response mismatch"
                        );
                    }
                }
                Ok(StepOutcome::Received(bytes))
            }
        }
    }

    /// Runs every step in order.
    ///
    /// # Errors
    ///
    /// [`EngineError::SequenceAborted`] at the first failing OUT step.
    pub fn run_sequence(&mut self, sequence: &TransactionSequence) -> Result<(), EngineError> {
        self.execute(sequence).map(|_| ())
    }

    /// Runs every step in order and returns what the capture step received.
    ///
    /// `Ok(None)` when the sequence has no capture step or it got no data.
    ///
    /// # Errors
    ///
    /// [`EngineError::SequenceAborted`] at the first failing OUT step.
    pub fn run_captured(
        &mut self,
        sequence: &TransactionSequence,
    ) -> Result<Option<Vec<u8>>, EngineError> {
        self.execute(sequence)
    }

    /// Writes `bytes` outside any sequence.
    ///
    /// # Errors
    ///
    /// [`EngineError::Send`] when the write fails.
    pub fn send(&mut self, bytes: &[u8], description: &str) -> Result<usize, EngineError> {
        self.transport
            .write(bytes, false)
            .map_err(|source| EngineError::Send {
                description: description.to_string(),
                source,
            })
    }

    /// Reads one response outside any sequence; `None` when nothing arrived.
    pub fn receive(&mut self) -> Option<Vec<u8>> {
        self.read_response()
    }

    fn read_response(&mut self) -> Option<Vec<u8>> {
        match self.transport.read(DEFAULT_READ_SIZE) {
            Ok(bytes) => Some(bytes),
            Err(TransportError::Timeout) => None,
            Err(e) => {
                warn!("read failed: {e}");
                None
            }
        }
    }

    fn execute(&mut self, sequence: &TransactionSequence) -> Result<Option<Vec<u8>>, EngineError> {
        let mut captured = None;

        for (index, step) in sequence.iter().enumerate() {
            match self.run_step(step) {
                Ok(StepOutcome::Received(bytes)) if step.expectation() == Some(&Expect::Capture) => {
                    captured = Some(bytes);
                }
                Ok(_) => {}
                Err(source) => {
                    return Err(EngineError::SequenceAborted {
                        step: index,
                        description: step.description().to_string(),
                        source,
                    });
                }
            }
        }
        Ok(captured)
    }
}

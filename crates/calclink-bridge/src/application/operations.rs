//! Calculator operations: the user-facing verbs of the link.
//!
//! Each operation builds its request with `calclink-core` and runs it through
//! the [`TransactionEngine`].  Errors propagate unchanged; nothing here
//! retries.
//!
//! Operations take `&mut self`: the link carries one conversation at a time,
//! so callers that share a `CalculatorOperations` must wrap it in a mutex.

use calclink_core::protocol::presets::{self, ACK, END_OF_TRANSMISSION, LIST_MARKER};
use calclink_core::{parse_program_content, parse_program_titles, PacketError, PacketRequest, ProgramTitle};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::transaction::{EngineError, TransactionEngine};
use crate::infrastructure::storage::config::DeviceConfig;
use crate::infrastructure::usb::device::DeviceLink;
use crate::infrastructure::usb::{BulkIo, Transport, TransportError};

/// Upper bound on read/ack rounds in a program listing.
pub const MAX_LISTING_ITERATIONS: usize = 250;

/// Error type for calculator operations.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The request could not be built.
    #[error(transparent)]
    Packet(#[from] PacketError),

    /// A transaction aborted.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The device could not be opened.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// The operations the link poller needs.
///
/// Implemented by [`CalculatorOperations`]; tests substitute in-memory
/// calculators.
#[cfg_attr(test, mockall::automock)]
pub trait CalculatorLink: Send {
    /// Runs the session handshake.
    fn initialize_link(&mut self) -> Result<(), OperationError>;

    /// Titles of every program on the calculator.
    fn list_program_titles(&mut self) -> Result<Vec<String>, OperationError>;

    /// Creates `title`, or replaces it if it already exists.
    fn upsert_program(&mut self, title: &str, text: &str) -> Result<(), OperationError>;

    /// Decoded content of `title`; empty if the calculator sent nothing.
    fn read_program(&mut self, title: &str) -> Result<String, OperationError>;
}

/// Operations over one open link.
pub struct CalculatorOperations<B: BulkIo> {
    engine: TransactionEngine<B>,
}

impl CalculatorOperations<DeviceLink> {
    /// Discovers and configures the calculator described by `config`.
    ///
    /// # Errors
    ///
    /// [`OperationError::Transport`] when the device is absent or its
    /// endpoints cannot be claimed.
    pub fn open(config: &DeviceConfig) -> Result<Self, OperationError> {
        let link = DeviceLink::discover(config.vendor_id, config.product_id)?.configure()?;
        Ok(Self::new(Transport::new(
            link,
            config.read_timeout(),
            config.write_timeout(),
        )))
    }
}

impl<B: BulkIo> CalculatorOperations<B> {
    pub fn new(transport: Transport<B>) -> Self {
        Self {
            engine: TransactionEngine::new(transport),
        }
    }

    /// Runs the session handshake.  Must succeed before anything else.
    ///
    /// # Errors
    ///
    /// [`OperationError::Engine`] when a handshake write fails.
    pub fn initialize_link(&mut self) -> Result<(), OperationError> {
        info!("initializing link");
        self.engine.run_sequence(&presets::init_handshake()?)?;
        info!("link initialized");
        Ok(())
    }

    /// Lists programs, returning the raw directory entries.
    ///
    /// After the opening handshake the calculator sends one packet per
    /// directory entry and waits for an ack after each.  Packets containing
    /// [`LIST_MARKER`] are entries; [`END_OF_TRANSMISSION`] ends the listing.
    /// A read timeout is not an error: the host acks and keeps reading, at
    /// most [`MAX_LISTING_ITERATIONS`] times.
    ///
    /// # Errors
    ///
    /// [`OperationError::Engine`] when a write fails.
    pub fn list_program_names(&mut self) -> Result<Vec<Vec<u8>>, OperationError> {
        self.engine.run_sequence(&presets::list_programs_initial()?)?;

        let mut entries = Vec::new();
        let mut terminated = false;

        for iteration in 1..=MAX_LISTING_ITERATIONS {
            match self.engine.receive() {
                Some(response) if response == END_OF_TRANSMISSION => {
                    debug!("listing ended after {iteration} reads");
                    terminated = true;
                    break;
                }
                Some(response) => {
                    if contains(&response, LIST_MARKER) {
                        entries.push(response);
                    }
                }
                None => debug!("no listing data on read {iteration}"),
            }
            self.engine.send(ACK, "listing ack")?;
        }

        if !terminated {
            warn!("listing stopped at the {MAX_LISTING_ITERATIONS}-read limit");
        }

        self.engine.run_sequence(&presets::list_programs_final()?)?;
        info!("listed {} programs", entries.len());
        Ok(entries)
    }

    /// Lists programs and decodes their titles.
    ///
    /// # Errors
    ///
    /// As [`Self::list_program_names`].
    pub fn list_program_titles(&mut self) -> Result<Vec<String>, OperationError> {
        Ok(parse_program_titles(&self.list_program_names()?))
    }

    /// Stores `value` in the single-letter variable `name`.
    ///
    /// # Errors
    ///
    /// [`OperationError::Packet`] for an invalid name or value;
    /// [`OperationError::Engine`] when a write fails.
    pub fn send_variable(&mut self, name: &str, value: &str) -> Result<(), OperationError> {
        let sequence = PacketRequest::send_variable(name, value)?.build()?;
        self.engine.run_sequence(&sequence)?;
        info!("sent variable {} = {value}", name.trim().to_uppercase());
        Ok(())
    }

    /// Sends a program.  `replace` must be `true` if `title` already exists.
    ///
    /// # Errors
    ///
    /// [`OperationError::Packet`] when the program is too long;
    /// [`OperationError::Engine`] when a write fails.
    pub fn send_program(&mut self, title: &str, text: &str, replace: bool) -> Result<(), OperationError> {
        let request = PacketRequest::send_program(title, text, replace);
        self.engine.run_sequence(&request.build()?)?;
        info!(
            "sent program {} ({})",
            ProgramTitle::new(title),
            if replace { "replaced" } else { "created" }
        );
        Ok(())
    }

    /// Sends a program, choosing create or replace from a fresh listing.
    ///
    /// # Errors
    ///
    /// As [`Self::list_program_names`] and [`Self::send_program`].
    pub fn upsert_program(&mut self, title: &str, text: &str) -> Result<(), OperationError> {
        let normalised = ProgramTitle::new(title);
        let exists = self
            .list_program_titles()?
            .iter()
            .any(|t| t == normalised.as_str());
        self.send_program(normalised.as_str(), text, exists)
    }

    /// Reads and decodes a program.
    ///
    /// # Errors
    ///
    /// [`OperationError::Engine`] when a write fails.
    pub fn read_program(&mut self, title: &str) -> Result<String, OperationError> {
        let sequence = PacketRequest::read_program(title).build()?;
        match self.engine.run_captured(&sequence)? {
            Some(bytes) => Ok(parse_program_content(&bytes)),
            None => {
                warn!("no content received for program {}", ProgramTitle::new(title));
                Ok(String::new())
            }
        }
    }

    /// Leaves exam mode.
    ///
    /// # Errors
    ///
    /// [`OperationError::Engine`] when a write fails.
    pub fn exit_exam_mode(&mut self) -> Result<(), OperationError> {
        self.engine.run_sequence(&presets::exit_exam_mode()?)?;
        info!("exam mode exit sent");
        Ok(())
    }
}

impl<B: BulkIo> CalculatorLink for CalculatorOperations<B> {
    fn initialize_link(&mut self) -> Result<(), OperationError> {
        CalculatorOperations::initialize_link(self)
    }

    fn list_program_titles(&mut self) -> Result<Vec<String>, OperationError> {
        CalculatorOperations::list_program_titles(self)
    }

    fn upsert_program(&mut self, title: &str, text: &str) -> Result<(), OperationError> {
        CalculatorOperations::upsert_program(self, title, text)
    }

    fn read_program(&mut self, title: &str) -> Result<String, OperationError> {
        CalculatorOperations::read_program(self, title)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

//! Application layer use cases for the calculator bridge.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The protocol crate (`calclink-core`) only *describes* transactions.  This
//! layer runs them: it drives the USB transport through the scripted steps,
//! turns scripts into user-level operations, and decides when to poll the
//! calculator.
//!
//! Everything here talks to the device through traits (`BulkIo`,
//! `CalculatorLink`), so the whole layer is tested against in-memory fakes.
//!
//! # Sub-modules
//!
//! - **`transaction`** – Executes a [`calclink_core::TransactionSequence`]
//!   step by step over a bulk transport, aborting on the first failed write.
//!
//! - **`operations`** – The calculator's user-facing verbs: initialise the
//!   link, list, read, and send programs, send a variable, leave exam mode.
//!
//! - **`session`** – The two channels between the poller and a chat relay:
//!   an inbound message queue and an outbound latest-value slot.
//!
//! - **`poller`** – The state machine that pushes queued messages to the
//!   calculator and periodically checks whether it has a question to send.

pub mod operations;
pub mod poller;
pub mod session;
pub mod transaction;

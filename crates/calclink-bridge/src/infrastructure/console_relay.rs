//! Console relay: a terminal front end for the bridge session.
//!
//! Lines typed on stdin as `TITLE: text` are queued for the calculator, and
//! questions the calculator publishes are printed.  The relay follows the
//! same conventions a chat relay would:
//!
//! - titles are cut to 8 characters (the calculator's program name limit);
//! - the text is prefixed with `author: <name>ENTER`, which the calculator
//!   shows as a separate first line;
//! - `Lost connection with TI84` ends the relay;
//! - `DELETE ALL CHATS` is a purge request.  A terminal has no history to
//!   purge, so it is only reported.
//!
//! # Startup comms check
//!
//! [`comms_check`] proves the round trip before the user types anything.  It
//! queues three messages: a notice program, a question program holding the
//! confirmation token, and the ready program set to `SEND`.  The token makes
//! the poller check immediately, it finds the ready signal, and it publishes
//! the question, which is the token coming back.

use std::io::Write;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use calclink_core::tokens::NEWLINE_MARKER;

use crate::application::session::{
    classify_outbound, InboundMessage, RelayHandle, RelayNotice, SessionClosed, CONNECTION_LOST,
};
use crate::infrastructure::storage::config::RelayConfig;

/// Author name prefixed to console messages.
pub const CONSOLE_AUTHOR: &str = "console";

/// Error type for the console relay.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("console I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Closed(#[from] SessionClosed),
}

/// Why [`run_relay`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    /// The poller published the connection-lost sentinel.
    ConnectionLost,
    /// Stdin reached end of file.
    InputClosed,
}

/// Parses `TITLE: text` into an inbound message.
///
/// Returns `None` when there is no `:` or the title is blank.
pub fn parse_line(line: &str, title_max_len: usize) -> Option<InboundMessage> {
    let (title, body) = line.split_once(':')?;
    let title: String = title.trim().chars().take(title_max_len).collect();
    if title.is_empty() {
        return None;
    }
    let text = format!("author: {CONSOLE_AUTHOR}{NEWLINE_MARKER}{}", body.trim());
    Some(InboundMessage::new(title, text))
}

/// Runs the startup comms check.
///
/// Returns `Ok(true)` once an outbound value containing `token` arrives
/// within `timeout`, checking every `poll_every`.  The confirming value is
/// taken from the slot.  Returns `Ok(false)` on timeout or if the poller
/// reports a lost connection first.
///
/// # Errors
///
/// [`SessionClosed`] if the poller has already stopped.
pub async fn comms_check(
    handle: &RelayHandle,
    token: &str,
    timeout: Duration,
    poll_every: Duration,
) -> Result<bool, SessionClosed> {
    handle
        .send(InboundMessage::new(
            "CHECK",
            "SYSTEM: Initiate comms confirmation sequence.",
        ))
        .await?;
    handle.send(InboundMessage::new("QUESTION", token)).await?;
    handle.send(InboundMessage::new("SEND", "SEND")).await?;
    info!("sent comms check to calculator, waiting for confirmation");

    let mut waited = Duration::ZERO;
    while waited < timeout {
        tokio::time::sleep(poll_every).await;
        waited += poll_every;

        match handle.outbound().peek() {
            Some(value) if value.contains(token) => {
                handle.outbound().take();
                info!("comms confirmed");
                return Ok(true);
            }
            Some(value) if value.trim() == CONNECTION_LOST => return Ok(false),
            _ => {}
        }
    }

    warn!("comms check timed out after {} seconds", timeout.as_secs());
    Ok(false)
}

/// Runs the comms check, reports its result on `output`, then relays until
/// the connection is lost or the input ends.
///
/// The comms check cannot hang the session: a poller that stops during the
/// check either drops its queue (the check fails with [`SessionClosed`]) or
/// publishes [`CONNECTION_LOST`], which ends the relay on its first outbound
/// check.
///
/// # Errors
///
/// As [`comms_check`] and [`run_relay`].
pub async fn run_session<R, W>(
    handle: &RelayHandle,
    config: &RelayConfig,
    token: &str,
    comms_poll: Duration,
    input: R,
    output: &mut W,
) -> Result<RelayExit, RelayError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let timeout = Duration::from_secs(config.comms_check_timeout_secs);
    if comms_check(handle, token, timeout, comms_poll).await? {
        writeln!(output, "TI-84 link established. Send messages as `TITLE: message`.")?;
    } else {
        writeln!(output, "Comms check failed: no confirmation from the TI-84.")?;
    }
    run_relay(handle, config, input, output).await
}

/// Relays between `input` lines and the outbound slot until the connection
/// is lost or the input ends.
///
/// # Errors
///
/// [`RelayError`] on console I/O failure or if the poller has stopped.
pub async fn run_relay<R, W>(
    handle: &RelayHandle,
    config: &RelayConfig,
    input: R,
    output: &mut W,
) -> Result<RelayExit, RelayError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut outbound_check =
        tokio::time::interval(Duration::from_secs(config.outbound_check_secs.max(1)));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("console input closed");
                    return Ok(RelayExit::InputClosed);
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_line(&line, config.title_max_len) {
                    Some(message) => {
                        info!("queued message {}", message.title);
                        handle.send(message).await?;
                        writeln!(output, "queued for the calculator")?;
                    }
                    None => writeln!(output, "expected `TITLE: message`")?,
                }
            }
            _ = outbound_check.tick() => {
                let Some(value) = handle.outbound().take() else {
                    continue;
                };
                match classify_outbound(&value) {
                    RelayNotice::ConnectionLost => {
                        writeln!(output, "Connection to TI-84 has been lost.")?;
                        return Ok(RelayExit::ConnectionLost);
                    }
                    RelayNotice::PurgeChats => {
                        writeln!(output, "purge requested (nothing to delete on the console)")?;
                    }
                    RelayNotice::Message(text) => {
                        writeln!(output, "Message from TI-84:\n{text}")?;
                    }
                }
            }
        }
    }
}

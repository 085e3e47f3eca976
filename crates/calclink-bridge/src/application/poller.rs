//! Link poller: relays messages to the calculator and questions back out.
//!
//! # State machine (for beginners)
//!
//! ```text
//! LinkInit ──► SteadyPoll ──(every check_interval)──► QuestionCheck
//!                  ▲                                       │
//!                  └─────────────── ok ────────────────────┤
//!                                                          └─ lost ─► Terminated
//! ```
//!
//! - **LinkInit** runs the session handshake once.  Failure is fatal: the
//!   poller goes straight to Terminated.
//! - **SteadyPoll** runs on every tick (5 s by default).  It drains the
//!   inbound queue and stores each message on the calculator as a program.
//! - **QuestionCheck** runs every `check_interval / tick_interval` ticks.  The
//!   calculator user signals "I have a question" by writing `SEND` into the
//!   ready program; the poller then reads the question program, publishes it,
//!   and clears the ready program.
//! - **Terminated** is entered when the handshake fails or a check cannot
//!   talk to the calculator.
//!   The poller publishes [`CONNECTION_LOST`] so the relay can stop too.
//!
//! A message containing the confirmation token (`"Comms confirmed"`) moves
//! the cycle counter straight to the threshold, so the relay's startup comms
//! check gets its answer on the same tick instead of up to a minute later.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::application::operations::{CalculatorLink, OperationError};
use crate::application::session::{PollerHandle, CONNECTION_LOST};
use crate::infrastructure::storage::config::PollerSettings;

/// Granularity at which a sleeping poller notices a shutdown request.
/// Also the shortest pause between ticks.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Shortest tick interval accepted from the configuration file.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Poller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    LinkInit,
    SteadyPoll,
    QuestionCheck,
    Terminated,
}

/// Timing and program names used by the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub tick_interval: Duration,
    pub check_interval: Duration,
    pub ready_program: String,
    pub question_program: String,
    pub ready_sentinel: String,
    pub confirmation_token: String,
}

impl PollerConfig {
    /// Ticks between question checks; at least one, saturating at
    /// `u32::MAX`.
    pub fn cycles_per_check(&self) -> u32 {
        let tick = self.tick_interval.as_millis().max(1);
        u32::try_from(self.check_interval.as_millis() / tick)
            .unwrap_or(u32::MAX)
            .max(1)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self::from(&PollerSettings::default())
    }
}

impl From<&PollerSettings> for PollerConfig {
    fn from(settings: &PollerSettings) -> Self {
        Self {
            tick_interval: Duration::from_secs(settings.tick_interval_secs).max(MIN_TICK_INTERVAL),
            check_interval: Duration::from_secs(settings.check_interval_secs),
            ready_program: settings.ready_program.clone(),
            question_program: settings.question_program.clone(),
            ready_sentinel: settings.ready_sentinel.clone(),
            confirmation_token: settings.confirmation_token.clone(),
        }
    }
}

/// Error type for the poller.
#[derive(Debug, Error)]
pub enum PollerError {
    /// The session handshake failed.
    #[error("link initialisation failed: {0}")]
    LinkInit(#[source] OperationError),
}

/// Why a question check declared the connection lost.
#[derive(Debug, Error)]
enum CheckFailure {
    #[error("the calculator listed no programs")]
    EmptyListing,
    #[error(transparent)]
    Operation(#[from] OperationError),
}

/// Drives a [`CalculatorLink`] from a [`PollerHandle`].
pub struct LinkPoller<L: CalculatorLink> {
    link: L,
    session: PollerHandle,
    config: PollerConfig,
    state: PollerState,
    cycle: u32,
}

impl<L: CalculatorLink> LinkPoller<L> {
    pub fn new(link: L, session: PollerHandle, config: PollerConfig) -> Self {
        Self {
            link,
            session,
            config,
            state: PollerState::LinkInit,
            cycle: 1,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Ticks since the last question check, starting at 1.
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    /// Runs one poll cycle without sleeping and returns the new state.
    ///
    /// The first tick initialises the link and then polls.  A failed
    /// handshake is terminal: the poller publishes [`CONNECTION_LOST`] so the
    /// relay stops too.
    ///
    /// # Errors
    ///
    /// [`PollerError::LinkInit`] if the handshake fails.
    pub fn tick(&mut self) -> Result<PollerState, PollerError> {
        match self.state {
            PollerState::LinkInit => {
                if let Err(e) = self.link.initialize_link() {
                    error!("initial handshake failed: {e}");
                    self.session.publish(CONNECTION_LOST);
                    self.state = PollerState::Terminated;
                    return Err(PollerError::LinkInit(e));
                }
                info!("initial handshake successful");
                self.state = PollerState::SteadyPoll;
                self.poll_once();
            }
            PollerState::SteadyPoll | PollerState::QuestionCheck => self.poll_once(),
            PollerState::Terminated => {}
        }
        Ok(self.state)
    }

    /// Ticks until terminated or until `running` is cleared, sleeping the
    /// tick interval between cycles.
    ///
    /// # Errors
    ///
    /// [`PollerError::LinkInit`] if the handshake fails.
    pub fn run(mut self, running: &AtomicBool) -> Result<PollerState, PollerError> {
        while running.load(Ordering::Relaxed) {
            if self.tick()? == PollerState::Terminated {
                break;
            }
            self.sleep_tick(running);
        }
        info!("poller stopped in state {:?}", self.state);
        Ok(self.state)
    }

    fn sleep_tick(&self, running: &AtomicBool) {
        let mut remaining = self.config.tick_interval.max(SHUTDOWN_POLL);
        while !remaining.is_zero() && running.load(Ordering::Relaxed) {
            let step = remaining.min(SHUTDOWN_POLL);
            std::thread::sleep(step);
            remaining -= step;
        }
    }

    fn poll_once(&mut self) {
        let threshold = self.config.cycles_per_check();

        for message in self.session.drain_inbound() {
            let title = message.title.trim().to_uppercase();
            info!("sending message to calculator as {title}");
            if let Err(e) = self.link.upsert_program(&title, &message.text) {
                warn!("failed to send message {title}: {e}");
            }
            if message.text.contains(&self.config.confirmation_token) {
                self.cycle = threshold;
            }
        }

        if self.cycle >= threshold {
            self.state = PollerState::QuestionCheck;
            info!("checking for question");
            self.state = match self.check_for_question() {
                Ok(()) => PollerState::SteadyPoll,
                Err(e) => {
                    error!("lost connection to calculator: {e}");
                    self.session.publish(CONNECTION_LOST);
                    PollerState::Terminated
                }
            };
            self.cycle = 0;
        } else {
            let elapsed = self.config.tick_interval * self.cycle;
            let remaining = self.config.check_interval.saturating_sub(elapsed);
            info!("checking for question in {} seconds", remaining.as_secs());
        }

        self.cycle += 1;
    }

    fn check_for_question(&mut self) -> Result<(), CheckFailure> {
        let titles = self.link.list_program_titles()?;
        if titles.is_empty() {
            return Err(CheckFailure::EmptyListing);
        }

        let ready = &self.config.ready_program;
        let question = &self.config.question_program;
        if !(titles.contains(ready) && titles.contains(question)) {
            return Ok(());
        }

        let signal = self.link.read_program(ready)?;
        if signal.trim().to_uppercase() != self.config.ready_sentinel.to_uppercase() {
            return Ok(());
        }

        let text = self.link.read_program(question)?;
        info!("question received ({} characters)", text.chars().count());
        self.session.publish(text);
        self.link.upsert_program(ready, "")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use mockall::predicate::eq;

    use super::*;
    use crate::application::operations::MockCalculatorLink;
    use crate::application::session::{session_channels, InboundMessage, RelayHandle};
    use crate::infrastructure::usb::TransportError;

    /// In-memory calculator holding programs by title.
    #[derive(Default)]
    struct FakeCalculator {
        programs: BTreeMap<String, String>,
        listing_fails: bool,
    }

    impl FakeCalculator {
        fn with(programs: &[(&str, &str)]) -> Self {
            Self {
                programs: programs
                    .iter()
                    .map(|(t, c)| (t.to_string(), c.to_string()))
                    .collect(),
                listing_fails: false,
            }
        }
    }

    impl CalculatorLink for FakeCalculator {
        fn initialize_link(&mut self) -> Result<(), OperationError> {
            Ok(())
        }

        fn list_program_titles(&mut self) -> Result<Vec<String>, OperationError> {
            if self.listing_fails {
                return Err(OperationError::Transport(TransportError::Timeout));
            }
            Ok(self.programs.keys().cloned().collect())
        }

        fn upsert_program(&mut self, title: &str, text: &str) -> Result<(), OperationError> {
            self.programs.insert(title.to_string(), text.to_string());
            Ok(())
        }

        fn read_program(&mut self, title: &str) -> Result<String, OperationError> {
            Ok(self.programs.get(title).cloned().unwrap_or_default())
        }
    }

    fn every_tick_config() -> PollerConfig {
        PollerConfig {
            check_interval: Duration::from_secs(5),
            ..PollerConfig::default()
        }
    }

    fn poller<L: CalculatorLink>(link: L, config: PollerConfig) -> (RelayHandle, LinkPoller<L>) {
        let (relay, handle) = session_channels(8);
        (relay, LinkPoller::new(link, handle, config))
    }

    #[test]
    fn test_default_config_checks_every_twelve_ticks() {
        assert_eq!(PollerConfig::default().cycles_per_check(), 12);
    }

    #[tokio::test]
    async fn test_inbound_message_is_upserted_under_normalised_title() {
        // Arrange
        let mut link = MockCalculatorLink::new();
        link.expect_initialize_link().times(1).returning(|| Ok(()));
        link.expect_upsert_program()
            .with(eq("Q1"), eq("2+2ENTER="))
            .times(1)
            .returning(|_, _| Ok(()));
        let (relay, mut poller) = poller(link, PollerConfig::default());
        relay.send(InboundMessage::new(" q1 ", "2+2ENTER=")).await.unwrap();

        // Act
        let state = poller.tick().unwrap();

        // Assert
        assert_eq!(state, PollerState::SteadyPoll);
        assert_eq!(poller.cycle(), 2);
    }

    #[tokio::test]
    async fn test_send_failure_is_logged_and_polling_continues() {
        let mut link = MockCalculatorLink::new();
        link.expect_initialize_link().returning(|| Ok(()));
        link.expect_upsert_program()
            .returning(|_, _| Err(OperationError::Transport(TransportError::Timeout)));
        let (relay, mut poller) = poller(link, PollerConfig::default());
        relay.send(InboundMessage::new("A", "x")).await.unwrap();

        assert_eq!(poller.tick().unwrap(), PollerState::SteadyPoll);
        assert!(relay.outbound().take().is_none());
    }

    #[test]
    fn test_question_is_published_when_ready_program_says_send() {
        // Arrange
        let link = FakeCalculator::with(&[("SEND", "send"), ("QUESTION", "What is 2+2?")]);
        let (relay, mut poller) = poller(link, PollerConfig::default());

        // Act – the twelfth tick is the first check
        for _ in 0..11 {
            poller.tick().unwrap();
            assert!(relay.outbound().peek().is_none());
        }
        let state = poller.tick().unwrap();

        // Assert
        assert_eq!(state, PollerState::SteadyPoll);
        assert_eq!(relay.outbound().take(), Some("What is 2+2?".to_string()));
        assert_eq!(poller.link.programs["SEND"], "");
        assert_eq!(poller.cycle(), 1);
    }

    #[test]
    fn test_nothing_is_published_when_ready_program_is_not_send() {
        let link = FakeCalculator::with(&[("SEND", ""), ("QUESTION", "What is 2+2?")]);
        let (relay, mut poller) = poller(link, every_tick_config());

        assert_eq!(poller.tick().unwrap(), PollerState::SteadyPoll);
        assert!(relay.outbound().take().is_none());
    }

    #[test]
    fn test_question_program_missing_is_not_a_failure() {
        let link = FakeCalculator::with(&[("SEND", "SEND")]);
        let (relay, mut poller) = poller(link, every_tick_config());

        assert_eq!(poller.tick().unwrap(), PollerState::SteadyPoll);
        assert!(relay.outbound().take().is_none());
    }

    #[test]
    fn test_listing_failure_publishes_connection_lost_and_terminates() {
        // Arrange
        let link = FakeCalculator {
            listing_fails: true,
            ..FakeCalculator::default()
        };
        let (relay, mut poller) = poller(link, every_tick_config());

        // Act
        let state = poller.tick().unwrap();

        // Assert
        assert_eq!(state, PollerState::Terminated);
        assert_eq!(relay.outbound().take(), Some(CONNECTION_LOST.to_string()));
        assert_eq!(poller.tick().unwrap(), PollerState::Terminated);
    }

    #[test]
    fn test_empty_listing_is_connection_lost() {
        let (relay, mut poller) = poller(FakeCalculator::default(), every_tick_config());

        assert_eq!(poller.tick().unwrap(), PollerState::Terminated);
        assert_eq!(relay.outbound().take(), Some(CONNECTION_LOST.to_string()));
    }

    #[test]
    fn test_read_failure_inside_check_is_connection_lost() {
        let mut link = MockCalculatorLink::new();
        link.expect_initialize_link().returning(|| Ok(()));
        link.expect_list_program_titles()
            .returning(|| Ok(vec!["SEND".to_string(), "QUESTION".to_string()]));
        link.expect_read_program()
            .returning(|_| Err(OperationError::Transport(TransportError::Timeout)));
        let (relay, mut poller) = poller(link, every_tick_config());

        assert_eq!(poller.tick().unwrap(), PollerState::Terminated);
        assert_eq!(relay.outbound().take(), Some(CONNECTION_LOST.to_string()));
    }

    #[tokio::test]
    async fn test_confirmation_token_fast_forwards_to_check() {
        // Arrange – comms check as the relay sends it
        let link = FakeCalculator::with(&[("OTHER", "")]);
        let (relay, mut poller) = poller(link, PollerConfig::default());
        relay.send(InboundMessage::new("QUESTION", "Comms confirmed")).await.unwrap();
        relay.send(InboundMessage::new("SEND", "SEND")).await.unwrap();

        // Act – first tick, far from the 12-tick threshold
        let state = poller.tick().unwrap();

        // Assert
        assert_eq!(state, PollerState::SteadyPoll);
        assert_eq!(relay.outbound().take(), Some("Comms confirmed".to_string()));
        assert_eq!(poller.link.programs["SEND"], "");
    }

    #[test]
    fn test_link_init_failure_is_fatal() {
        // Arrange
        let mut link = MockCalculatorLink::new();
        link.expect_initialize_link()
            .times(1)
            .returning(|| Err(OperationError::Transport(TransportError::Timeout)));
        let (relay, mut poller) = poller(link, PollerConfig::default());

        // Act
        let result = poller.tick();

        // Assert – terminal, and the relay is told to stop
        assert!(matches!(result, Err(PollerError::LinkInit(_))));
        assert_eq!(poller.state(), PollerState::Terminated);
        assert_eq!(relay.outbound().take(), Some(CONNECTION_LOST.to_string()));
        assert_eq!(poller.tick().unwrap(), PollerState::Terminated);
    }

    #[test]
    fn test_run_returns_link_init_error() {
        let mut link = MockCalculatorLink::new();
        link.expect_initialize_link()
            .returning(|| Err(OperationError::Transport(TransportError::Timeout)));
        let (relay, poller) = poller(link, PollerConfig::default());
        let running = AtomicBool::new(true);

        assert!(matches!(poller.run(&running), Err(PollerError::LinkInit(_))));
        assert_eq!(relay.outbound().take(), Some(CONNECTION_LOST.to_string()));
    }

    #[test]
    fn test_zero_tick_interval_is_clamped() {
        // Arrange
        let settings = PollerSettings {
            tick_interval_secs: 0,
            ..PollerSettings::default()
        };

        // Act
        let config = PollerConfig::from(&settings);

        // Assert
        assert_eq!(config.tick_interval, MIN_TICK_INTERVAL);
        assert_eq!(config.cycles_per_check(), 60);
    }

    #[test]
    fn test_cycles_per_check_saturates() {
        let config = PollerConfig {
            tick_interval: Duration::from_millis(1),
            check_interval: Duration::from_secs(u64::MAX),
            ..PollerConfig::default()
        };

        assert_eq!(config.cycles_per_check(), u32::MAX);
    }

    #[test]
    fn test_run_returns_when_terminated() {
        let (_relay, poller) = poller(FakeCalculator::default(), every_tick_config());
        let running = AtomicBool::new(true);

        assert_eq!(poller.run(&running).unwrap(), PollerState::Terminated);
    }

    #[test]
    fn test_run_returns_immediately_when_not_running() {
        let (_relay, poller) = poller(FakeCalculator::default(), PollerConfig::default());
        let running = AtomicBool::new(false);

        assert_eq!(poller.run(&running).unwrap(), PollerState::LinkInit);
    }
}

//! Transaction steps and sequences.
//!
//! # How a transaction is described (for beginners)
//!
//! Every exchange with the calculator is a fixed script.  The host writes a
//! packet on the bulk OUT endpoint, then reads one or more answers on the
//! bulk IN endpoint, acknowledges them, and so on.  A [`TransactionStep`] is
//! one line of that script:
//!
//! - **OUT** steps carry the exact bytes to write.
//! - **IN** steps carry an [`Expect`] telling the executor what to do with the
//!   answer: compare it against a known pattern, ignore it, or keep it as the
//!   result of the whole sequence.
//!
//! A [`TransactionSequence`] is the ordered script.  Both types are plain
//! values: nothing here performs I/O.  The executor lives in the bridge crate.

use std::time::Duration;

/// Transfer direction as seen from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host → calculator (bulk OUT).
    Out,
    /// Calculator → host (bulk IN).
    In,
}

/// What the executor should do with the bytes an IN step receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expect {
    /// Accept any response without comparing.
    Any,
    /// Compare against these bytes; a mismatch is logged, never fatal.
    Pattern(Vec<u8>),
    /// Read and discard.
    Skip,
    /// Read and keep as the payload of the sequence.
    Capture,
}

/// USB transfer granularity for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    /// One bulk transfer.
    #[default]
    Standard,
    /// 64-byte segments, for payloads that may exceed one transfer.
    Large,
}

/// The action a step performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    Out(Vec<u8>),
    In(Expect),
}

/// One scripted transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionStep {
    action: StepAction,
    description: String,
    delay: Duration,
    mode: TransferMode,
}

impl TransactionStep {
    fn new(action: StepAction, description: impl Into<String>) -> Self {
        Self {
            action,
            description: description.into(),
            delay: Duration::ZERO,
            mode: TransferMode::Standard,
        }
    }

    /// An OUT step writing `payload`.
    pub fn out(payload: Vec<u8>, description: impl Into<String>) -> Self {
        Self::new(StepAction::Out(payload), description)
    }

    /// An IN step whose response is compared against `pattern`.
    pub fn expect(pattern: Vec<u8>, description: impl Into<String>) -> Self {
        Self::new(StepAction::In(Expect::Pattern(pattern)), description)
    }

    /// An IN step that accepts any response.
    pub fn any(description: impl Into<String>) -> Self {
        Self::new(StepAction::In(Expect::Any), description)
    }

    /// An IN step whose response is read and dropped.
    pub fn skip(description: impl Into<String>) -> Self {
        Self::new(StepAction::In(Expect::Skip), description)
    }

    /// An IN step whose response becomes the sequence result.
    pub fn capture(description: impl Into<String>) -> Self {
        Self::new(StepAction::In(Expect::Capture), description)
    }

    /// Waits `delay` before performing the transfer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Switches the step to segmented transfers.
    pub fn large(mut self) -> Self {
        self.mode = TransferMode::Large;
        self
    }

    pub fn direction(&self) -> Direction {
        match self.action {
            StepAction::Out(_) => Direction::Out,
            StepAction::In(_) => Direction::In,
        }
    }

    pub fn action(&self) -> &StepAction {
        &self.action
    }

    /// Bytes written by an OUT step; `None` for IN steps.
    pub fn payload(&self) -> Option<&[u8]> {
        match &self.action {
            StepAction::Out(bytes) => Some(bytes),
            StepAction::In(_) => None,
        }
    }

    /// Expectation of an IN step; `None` for OUT steps.
    pub fn expectation(&self) -> Option<&Expect> {
        match &self.action {
            StepAction::Out(_) => None,
            StepAction::In(expect) => Some(expect),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }
}

/// An ordered, immutable transaction script.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionSequence {
    steps: Vec<TransactionStep>,
}

impl TransactionSequence {
    pub fn new(steps: Vec<TransactionStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[TransactionStep] {
        &self.steps
    }

    pub fn get(&self, index: usize) -> Option<&TransactionStep> {
        self.steps.get(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TransactionStep> {
        self.steps.iter()
    }

    /// Index of the first [`Expect::Capture`] step, if any.
    pub fn capture_index(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.expectation() == Some(&Expect::Capture))
    }
}

impl<'a> IntoIterator for &'a TransactionSequence {
    type Item = &'a TransactionStep;
    type IntoIter = std::slice::Iter<'a, TransactionStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

impl FromIterator<TransactionStep> for TransactionSequence {
    fn from_iter<I: IntoIterator<Item = TransactionStep>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

//! Out-of-band command queue: jog commands, manual G-code, macro output —
//! anything a session wants to send that isn't part of the loaded program.
//!
//! Unlike the Sender, the Feeder does not track character counts. It is
//! gated by a single `pending` flag: at most one Feeder line is ever in
//! flight, and the next is not dequeued until the previous one's `ok`
//! arrives. Which pipeline gets to use the wire on any given tick (Sender or
//! Feeder) is the Controller's call, not the Feeder's.

use std::collections::VecDeque;

use super::preprocessor::{DetectedHold, GcodeContext, Preprocessor};

/// One line waiting in the Feeder queue, paired with the context snapshot
/// it should be preprocessed against (macro/jog lines may be queued well
/// before they're actually sent, so the context is captured at enqueue
/// time... in practice this is always the live context by reference, but
/// keeping the field makes substitution timing explicit and testable).
#[derive(Debug, Clone)]
pub struct FeederLine {
    /// The raw line text, not yet preprocessed.
    pub line: String,
}

/// Feeder progress/hold state, exposed for `feeder:status` event payloads.
#[derive(Debug, Clone, Default)]
pub struct FeederState {
    /// Lines waiting to be sent, oldest first.
    pub queue: VecDeque<FeederLine>,
    /// Whether the Feeder is holding.
    pub hold: bool,
    /// Why the Feeder is holding, if it is.
    pub hold_reason: Option<String>,
    /// Whether a line is currently in flight awaiting acknowledgment.
    pub pending: bool,
}

/// FIFO queue of out-of-band lines, gated one-in-flight-at-a-time.
pub struct Feeder {
    state: FeederState,
}

impl Feeder {
    /// An empty, non-holding Feeder.
    pub fn new() -> Self {
        Self {
            state: FeederState::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> &FeederState {
        &self.state
    }

    /// Queue a line for transmission.
    pub fn feed(&mut self, line: impl Into<String>) {
        self.state.queue.push_back(FeederLine { line: line.into() });
    }

    /// Drop everything queued and clear `pending`/hold.
    pub fn reset(&mut self) {
        self.state.queue.clear();
        self.state.pending = false;
        self.state.hold = false;
        self.state.hold_reason = None;
    }

    /// Release a hold.
    pub fn unhold(&mut self) {
        self.state.hold = false;
        self.state.hold_reason = None;
    }

    /// Whether the Feeder is currently holding.
    pub fn is_holding(&self) -> bool {
        self.state.hold
    }

    /// Attempt to dequeue and preprocess the next line. Returns `None` if
    /// holding, empty, or a line is already in flight. All four
    /// [`DetectedHold`] variants route to the Feeder's own hold — it has no
    /// Workflow to delegate `M0`/`M1`/`M6` to.
    pub fn next(&mut self, ctx: &mut GcodeContext) -> Option<String> {
        if self.state.hold || self.state.pending {
            return None;
        }
        loop {
            let queued = self.state.queue.pop_front()?;
            let result = Preprocessor::process(&queued.line, ctx);
            if let Some(trigger) = result.hold {
                self.hold_from(trigger);
            }
            if result.output.is_empty() {
                continue;
            }
            self.state.pending = true;
            return Some(result.output);
        }
    }

    fn hold_from(&mut self, trigger: DetectedHold) {
        self.state.hold = true;
        self.state.hold_reason = Some(trigger.reason().to_string());
    }

    /// Hold the Feeder on behalf of a Workflow pause, without re-deriving a
    /// [`DetectedHold`] — the Workflow already knows why it's pausing.
    pub(crate) fn hold_for_workflow(&mut self, reason: String) {
        self.state.hold = true;
        self.state.hold_reason = Some(reason);
    }

    /// Acknowledge the line currently in flight, allowing the next to be
    /// dequeued on the following `next` call.
    pub fn ack(&mut self) {
        self.state.pending = false;
    }
}

impl Default for Feeder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> GcodeContext {
        GcodeContext::new()
    }

    #[test]
    fn feeds_lines_fifo() {
        let mut f = Feeder::new();
        f.feed("G0 X1");
        f.feed("G0 X2");
        let first = f.next(&mut ctx()).unwrap();
        assert_eq!(first, "G0 X1");
        assert!(f.next(&mut ctx()).is_none(), "pending until ack");
        f.ack();
        let second = f.next(&mut ctx()).unwrap();
        assert_eq!(second, "G0 X2");
    }

    #[test]
    fn blank_lines_are_skipped_without_becoming_pending() {
        let mut f = Feeder::new();
        f.feed("; comment");
        f.feed("G0 X1");
        let line = f.next(&mut ctx()).unwrap();
        assert_eq!(line, "G0 X1");
    }

    #[test]
    fn m0_holds_feeder_directly() {
        let mut f = Feeder::new();
        f.feed("M0");
        assert!(f.next(&mut ctx()).is_some());
        assert!(f.is_holding());
        assert_eq!(f.state().hold_reason.as_deref(), Some("M0"));
    }

    #[test]
    fn percent_wait_holds_feeder_too() {
        let mut f = Feeder::new();
        f.feed("%wait");
        assert!(f.next(&mut ctx()).is_some());
        assert!(f.is_holding());
    }

    #[test]
    fn reset_clears_queue_and_hold() {
        let mut f = Feeder::new();
        f.feed("G0 X1");
        f.feed("M0");
        f.next(&mut ctx());
        f.reset();
        assert!(f.state().queue.is_empty());
        assert!(!f.is_holding());
        assert!(!f.state().pending);
    }
}

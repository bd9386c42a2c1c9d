//! Character-counting flow control for a loaded program.
//!
//! Mirrors Smoothieware's own streaming discipline: the host tracks exactly
//! how many bytes it has put in the firmware's receive buffer and only sends
//! another line once an `ok`/`error` for an earlier line frees up room for
//! it. There is no negotiation with the firmware over this — both sides
//! simply agree on the same accounting rule.

use std::collections::VecDeque;
use std::time::Instant;

use smoothie_core::constants::DEFAULT_RECEIVE_BUFFER_SIZE;

use super::preprocessor::{DetectedHold, GcodeContext, Preprocessor};

/// A program loaded into the Sender: its name, raw text, and the lines split
/// out of it (blank/comment-only lines included — they still occupy a slot
/// in `sent`/`received` bookkeeping since Smoothieware still acks them).
#[derive(Debug, Clone)]
pub struct Program {
    /// Display name (usually a filename).
    pub name: String,
    /// The raw program text, unmodified.
    pub text: String,
    /// `text` split on newlines.
    pub lines: Vec<String>,
}

impl Program {
    /// Split `text` into lines and wrap it as a named program.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let lines = text.lines().map(str::to_string).collect();
        Self {
            name: name.into(),
            text,
            lines,
        }
    }
}

/// One line in flight: which program line it was, and how many bytes
/// (including the trailing newline) it occupies in the firmware's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedLine {
    /// Index into `Program::lines`.
    pub index: usize,
    /// Byte length of the transmitted line, including the `\n` terminator.
    pub byte_len: usize,
}

/// The character-counting accounting itself, independent of program/progress
/// bookkeeping: how large the firmware's buffer is believed to be, how much
/// of it is currently occupied, and which lines are occupying it.
#[derive(Debug, Clone)]
pub struct SendingProtocol {
    /// Believed size of the firmware's receive buffer, in bytes.
    pub buffer_size: usize,
    /// Bytes currently believed to be occupying the firmware's buffer.
    pub data_length: usize,
    /// Lines sent but not yet acknowledged, oldest first.
    pub queue: VecDeque<QueuedLine>,
}

impl SendingProtocol {
    fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            data_length: 0,
            queue: VecDeque::new(),
        }
    }

    /// Would a line of `byte_len` (including its `\n`) fit in the buffer
    /// right now? An empty queue always says yes — a single line longer
    /// than the whole buffer must still go out, since nothing else will
    /// ever free room for it.
    fn fits(&self, byte_len: usize) -> bool {
        self.queue.is_empty() || self.data_length + byte_len <= self.buffer_size
    }

    fn push(&mut self, index: usize, byte_len: usize) {
        self.data_length += byte_len;
        self.queue.push_back(QueuedLine { index, byte_len });
    }

    fn ack_one(&mut self) -> Option<QueuedLine> {
        let line = self.queue.pop_front()?;
        self.data_length = self.data_length.saturating_sub(line.byte_len);
        Some(line)
    }
}

/// Result of one `next_once` attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum NextOutcome {
    /// A line was transmitted; callers write `text` to the transport
    /// followed by `\n`.
    Sent(String),
    /// The current line produced no output (blank/comment/`%`-assignment)
    /// and was silently advanced past without consuming buffer space.
    Advanced,
    /// Nothing was sent: the Sender is holding, empty, finished, or the
    /// next line does not fit in the remaining buffer space yet.
    Blocked,
}

/// Sender progress/hold state, exposed for `sender:status` event payloads.
#[derive(Debug, Clone)]
pub struct SenderState {
    /// Name of the currently loaded program, if any.
    pub loaded: Option<String>,
    /// Total lines in the loaded program.
    pub total: usize,
    /// Lines transmitted so far.
    pub sent: usize,
    /// Lines acknowledged so far.
    pub received: usize,
    /// Whether the Sender is currently holding (not transmitting new lines).
    pub hold: bool,
    /// Why the Sender is holding, if it is.
    pub hold_reason: Option<String>,
    /// Character-counting accounting.
    pub sp: SendingProtocol,
    /// When `start()` was called.
    pub started_at: Option<Instant>,
    /// When the program finished (`received == total` with the queue
    /// drained).
    pub finished_at: Option<Instant>,
}

/// Streams a loaded program to the firmware under character-counting flow
/// control, holding on `%wait`/error and surfacing `M0`/`M1`/`M6` for the
/// Workflow to route.
pub struct Sender {
    program: Option<Program>,
    cursor: usize,
    state: SenderState,
}

impl Sender {
    /// A Sender with no program loaded, using the firmware's default
    /// receive-buffer estimate.
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_RECEIVE_BUFFER_SIZE)
    }

    /// A Sender seeded with an explicit buffer-size estimate (tests mostly;
    /// production code should let the Sender self-tune from status reports).
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            program: None,
            cursor: 0,
            state: SenderState {
                loaded: None,
                total: 0,
                sent: 0,
                received: 0,
                hold: false,
                hold_reason: None,
                sp: SendingProtocol::new(buffer_size),
                started_at: None,
                finished_at: None,
            },
        }
    }

    /// Current progress/hold state.
    pub fn state(&self) -> &SenderState {
        &self.state
    }

    /// Load a program. Replaces whatever was previously loaded; does not
    /// start transmission.
    pub fn load(&mut self, program: Program) {
        self.state.total = program.lines.len();
        self.state.loaded = Some(program.name.clone());
        self.state.sent = 0;
        self.state.received = 0;
        self.state.started_at = None;
        self.state.finished_at = None;
        self.state.sp.data_length = 0;
        self.state.sp.queue.clear();
        self.cursor = 0;
        self.program = Some(program);
    }

    /// Drop the loaded program and reset progress.
    pub fn unload(&mut self) {
        self.program = None;
        self.cursor = 0;
        self.state.loaded = None;
        self.state.total = 0;
        self.state.sent = 0;
        self.state.received = 0;
        self.state.started_at = None;
        self.state.finished_at = None;
        self.state.sp.data_length = 0;
        self.state.sp.queue.clear();
    }

    /// Rewind to the first line without unloading the program.
    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.state.sent = 0;
        self.state.received = 0;
        self.state.started_at = None;
        self.state.finished_at = None;
        self.state.sp.data_length = 0;
        self.state.sp.queue.clear();
    }

    /// Mark the start time and clear any hold; transmission proceeds on the
    /// next `pump`/`next_once` call.
    pub fn start(&mut self) {
        self.state.started_at = Some(Instant::now());
        self.state.hold = false;
        self.state.hold_reason = None;
    }

    /// Hold: stop transmitting new lines until `unhold`.
    pub fn hold(&mut self, reason: impl Into<String>) {
        self.state.hold = true;
        self.state.hold_reason = Some(reason.into());
    }

    /// Release a hold.
    pub fn unhold(&mut self) {
        self.state.hold = false;
        self.state.hold_reason = None;
    }

    /// Whether the Sender is currently holding.
    pub fn is_holding(&self) -> bool {
        self.state.hold
    }

    /// Whether the loaded program has finished: every line acknowledged and
    /// nothing left in flight.
    pub fn is_finished(&self) -> bool {
        self.state.loaded.is_some()
            && self.state.received >= self.state.total
            && self.state.sp.queue.is_empty()
    }

    /// Attempt to transmit exactly one line. Returns the outcome plus any
    /// `M0`/`M1`/`M6` trigger the caller (the Workflow, via `pump`) must
    /// route — `%wait` is handled internally and never surfaces here.
    pub fn next_once(&mut self, ctx: &mut GcodeContext) -> (NextOutcome, Option<DetectedHold>) {
        if self.state.hold {
            return (NextOutcome::Blocked, None);
        }
        let Some(program) = self.program.as_ref() else {
            return (NextOutcome::Blocked, None);
        };
        if self.cursor >= program.lines.len() {
            return (NextOutcome::Blocked, None);
        }

        let raw = program.lines[self.cursor].clone();
        let result = Preprocessor::process(&raw, ctx);
        self.cursor += 1;

        if result.output.is_empty() {
            self.state.sent += 1;
            self.state.received += 1;
            if let Some(DetectedHold::Wait) = result.hold {
                self.hold("%wait");
            }
            return (NextOutcome::Advanced, None);
        }

        let byte_len = result.output.len() + 1;
        if !self.state.sp.fits(byte_len) {
            self.cursor -= 1;
            return (NextOutcome::Blocked, None);
        }

        let index = self.cursor - 1;
        self.state.sp.push(index, byte_len);
        self.state.sent += 1;

        let external_hold = match result.hold {
            Some(DetectedHold::Wait) => {
                self.hold("%wait");
                None
            }
            other => other,
        };

        (NextOutcome::Sent(result.output), external_hold)
    }

    /// Drain as many lines as currently fit, invoking `on_trigger` for each
    /// `M0`/`M1`/`M6` detected so the caller can pause the Workflow (which
    /// holds this Sender in turn) before the next line is attempted.
    ///
    /// Returns the lines to transmit, in order.
    pub fn pump(
        &mut self,
        ctx: &mut GcodeContext,
        mut on_trigger: impl FnMut(&mut Self, DetectedHold),
    ) -> Vec<String> {
        let mut out = Vec::new();
        loop {
            let (outcome, trigger) = self.next_once(ctx);
            match outcome {
                NextOutcome::Sent(line) => out.push(line),
                NextOutcome::Advanced => {}
                NextOutcome::Blocked => break,
            }
            if let Some(trig) = trigger {
                on_trigger(self, trig);
            }
            if self.state.hold {
                break;
            }
        }
        out
    }

    /// Acknowledge the oldest in-flight line (an `ok` or `error` response).
    /// Marks the finish time once the program completes.
    pub fn ack(&mut self) -> Option<QueuedLine> {
        let line = self.state.sp.ack_one();
        if line.is_some() {
            self.state.received += 1;
        }
        if self.is_finished() && self.state.finished_at.is_none() {
            self.state.finished_at = Some(Instant::now());
        }
        line
    }

    /// The 1-based line number and raw program text of the oldest in-flight
    /// line, if any. Used to annotate a machine-reported `error:` with the
    /// line it was replying to (spec.md §4.6: `> <line> (line=<n>)`).
    pub fn peek_inflight(&self) -> Option<(usize, String)> {
        let queued = self.state.sp.queue.front()?;
        let program = self.program.as_ref()?;
        let text = program.lines.get(queued.index)?.clone();
        Some((queued.index + 1, text))
    }

    /// Raise the believed buffer size from a status report's `buf.rx`
    /// field. Only called when idle and fully drained, and only ever
    /// increases the estimate — a smaller observed value never shrinks it,
    /// since a momentarily-fuller buffer mid-stream says nothing about the
    /// firmware's actual capacity.
    pub fn tune_buffer_size(&mut self, observed_rx: usize) {
        if self.state.hold || !self.state.sp.queue.is_empty() {
            return;
        }
        let candidate = observed_rx.saturating_sub(8);
        if candidate > self.state.sp.buffer_size {
            self.state.sp.buffer_size = candidate;
        }
    }
}

impl Default for Sender {
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
    fn sends_lines_until_buffer_full() {
        let mut s = Sender::with_buffer_size(10);
        s.load(Program::new("t", "G0 X1\nG0 X2\nG0 X3\n"));
        s.start();
        let sent = s.pump(&mut ctx(), |_, _| {});
        // "G0 X1" is 5 bytes + 1 = 6; two of those exceed a 10-byte buffer.
        assert_eq!(sent, vec!["G0 X1".to_string()]);
        assert_eq!(s.state().sp.data_length, 6);
    }

    #[test]
    fn ack_frees_room_for_next_line() {
        let mut s = Sender::with_buffer_size(10);
        s.load(Program::new("t", "G0 X1\nG0 X2\nG0 X3\n"));
        s.start();
        let sent = s.pump(&mut ctx(), |_, _| {});
        assert_eq!(sent.len(), 1);
        s.ack();
        let sent2 = s.pump(&mut ctx(), |_, _| {});
        assert_eq!(sent2, vec!["G0 X2".to_string()]);
    }

    #[test]
    fn oversized_single_line_sends_when_queue_empty() {
        let mut s = Sender::with_buffer_size(4);
        s.load(Program::new("t", "G0 X1\n"));
        s.start();
        let sent = s.pump(&mut ctx(), |_, _| {});
        assert_eq!(sent, vec!["G0 X1".to_string()]);
    }

    #[test]
    fn blank_and_comment_lines_advance_without_consuming_buffer() {
        let mut s = Sender::with_buffer_size(100);
        s.load(Program::new("t", "; comment only\n\nG0 X1\n"));
        s.start();
        let sent = s.pump(&mut ctx(), |_, _| {});
        assert_eq!(sent, vec!["G0 X1".to_string()]);
        assert_eq!(s.state().sent, 3);
        assert_eq!(s.state().received, 3);
    }

    #[test]
    fn percent_wait_holds_sender_internally() {
        let mut s = Sender::with_buffer_size(100);
        s.load(Program::new("t", "G0 X1\n%wait\nG0 X2\n"));
        s.start();
        let sent = s.pump(&mut ctx(), |_, _| {});
        assert_eq!(sent, vec!["G0 X1".to_string()]);
        assert!(s.is_holding());
        assert_eq!(s.state().hold_reason.as_deref(), Some("%wait"));
    }

    #[test]
    fn m0_surfaces_to_caller_for_workflow_routing() {
        let mut s = Sender::with_buffer_size(100);
        s.load(Program::new("t", "G0 X1\nM0\nG0 X2\n"));
        s.start();
        let mut triggers = Vec::new();
        let sent = s.pump(&mut ctx(), |sender, trig| {
            triggers.push(trig);
            sender.hold("M0");
        });
        assert_eq!(sent, vec!["G0 X1".to_string(), "M0".to_string()]);
        assert_eq!(triggers, vec![DetectedHold::M0]);
        assert!(s.is_holding());
    }

    #[test]
    fn finishes_once_all_lines_acked() {
        let mut s = Sender::with_buffer_size(100);
        s.load(Program::new("t", "G0 X1\nG0 X2\n"));
        s.start();
        s.pump(&mut ctx(), |_, _| {});
        assert!(!s.is_finished());
        s.ack();
        assert!(!s.is_finished());
        s.ack();
        assert!(s.is_finished());
        assert!(s.state().finished_at.is_some());
    }

    #[test]
    fn buffer_size_only_increases() {
        let mut s = Sender::with_buffer_size(50);
        s.tune_buffer_size(100);
        assert_eq!(s.state().sp.buffer_size, 92);
        s.tune_buffer_size(60);
        assert_eq!(s.state().sp.buffer_size, 92);
    }

    #[test]
    fn buffer_size_does_not_tune_mid_stream() {
        let mut s = Sender::with_buffer_size(10);
        s.load(Program::new("t", "G0 X1\nG0 X2\n"));
        s.start();
        s.pump(&mut ctx(), |_, _| {});
        s.tune_buffer_size(200);
        assert_eq!(s.state().sp.buffer_size, 10);
    }

    #[test]
    fn character_counting_invariant_holds_across_load() {
        let mut s = Sender::with_buffer_size(1000);
        s.load(Program::new("t", "G0 X1\nG0 X2\nG0 X3\nG0 X4\n"));
        s.start();
        s.pump(&mut ctx(), |_, _| {});
        let expected: usize = s.state().sp.queue.iter().map(|q| q.byte_len).sum();
        assert_eq!(expected, s.state().sp.data_length);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_program() -> impl Strategy<Value = String> {
        proptest::collection::vec("G0 X[0-9]{1,3}", 0..40)
            .prop_map(|lines| lines.join("\n") + "\n")
    }

    proptest! {
        /// `data_length` always equals the sum of the in-flight queue's
        /// `byte_len`s, and never exceeds `buffer_size` unless the queue
        /// holds exactly the one oversized line that had to go out anyway
        /// (spec.md §3: "data_length == sum(byte_len of lines in flight)").
        #[test]
        fn data_length_matches_queue_sum_and_respects_buffer(
            text in arb_program(),
            buffer_size in 8usize..200,
            ack_every_other in proptest::bool::ANY,
        ) {
            let mut s = Sender::with_buffer_size(buffer_size);
            s.load(Program::new("t", text));
            s.start();
            let mut c = GcodeContext::new();

            for _ in 0..500 {
                let (outcome, _) = s.next_once(&mut c);
                match outcome {
                    NextOutcome::Blocked => {
                        // either finished, or buffer-limited: ack frees room
                        // to make progress, and if nothing is in flight
                        // either way there is nothing left to do.
                        if s.ack().is_none() {
                            break;
                        }
                    }
                    _ => {
                        if ack_every_other {
                            s.ack();
                        }
                    }
                }

                let expected: usize = s.state().sp.queue.iter().map(|q| q.byte_len).sum();
                prop_assert_eq!(expected, s.state().sp.data_length);

                let single_oversized = s.state().sp.queue.len() == 1
                    && s.state().sp.queue.front().unwrap().byte_len > buffer_size;
                if !single_oversized {
                    prop_assert!(s.state().sp.data_length <= buffer_size);
                }
            }

            while s.ack().is_some() {}
            prop_assert_eq!(s.state().sp.data_length, 0);
            prop_assert!(s.state().sp.queue.is_empty());
        }
    }
}

//! Realtime-query gating: the masks and timestamps that keep the controller
//! loop from hammering the firmware with redundant `?`/`$G` queries, and
//! that tell response dispatch whether an incoming `ok` acknowledges a
//! program line or a `$G` query instead.
//!
//! Mirrors the source's `actionMask`/`actionTime` pair: a mask says "a query
//! is outstanding, don't send another one"; a time lets the mask self-clear
//! if the expected reply never shows up.

use std::time::{Duration, Instant};

use smoothie_core::constants::{PARSER_STATE_THROTTLE, PARSER_STATE_TIMEOUT, STATUS_QUERY_TIMEOUT};

/// Query-gating state for one controller's realtime queries.
///
/// `reply_status_report`/`reply_parser_state` are set only for
/// user-originated queries (a session explicitly asked `query_status`/
/// `query_parser_state`) so the controller loop's own periodic polling
/// doesn't echo every status line back to sessions.
#[derive(Debug, Default)]
pub struct ActionState {
    query_status_report: bool,
    query_status_report_time: Option<Instant>,
    reply_status_report: bool,

    query_parser_state: bool,
    query_parser_state_reply: bool,
    query_parser_state_time: Option<Instant>,
    reply_parser_state: bool,

    /// When the Sender reported `end`, and the work position last observed
    /// at that moment — end-of-program detection (spec.md §4.5 step 8)
    /// waits for the machine to actually go idle at that position before
    /// declaring the workflow stopped.
    sender_finish_time: Option<Instant>,
    finish_wpos: Option<(f64, f64, f64, f64, f64, f64)>,
}

impl ActionState {
    /// Whether a `?` should be written this tick: not already outstanding,
    /// or outstanding past the 5s self-heal timeout.
    pub fn should_query_status(&mut self, now: Instant) -> bool {
        if self.query_status_report {
            if self
                .query_status_report_time
                .is_some_and(|t| now.duration_since(t) >= STATUS_QUERY_TIMEOUT)
            {
                self.query_status_report = false;
            } else {
                return false;
            }
        }
        true
    }

    /// Record that `?` was just written.
    pub fn mark_status_queried(&mut self, now: Instant) {
        self.query_status_report = true;
        self.query_status_report_time = Some(now);
    }

    /// Mark the next status query as user-originated, so its reply is
    /// echoed to sessions as `connection:read` rather than silently
    /// consumed.
    pub fn request_status_echo(&mut self) {
        self.reply_status_report = true;
    }

    /// A status report arrived: clears the outstanding-query mask and
    /// returns whether it should be echoed (and clears that flag too).
    pub fn on_status_reply(&mut self) -> bool {
        self.query_status_report = false;
        self.query_status_report_time = None;
        std::mem::take(&mut self.reply_status_report)
    }

    /// Whether `$G` should be written this tick: only while idle, throttled
    /// to once per 500ms trailing edge, and not already outstanding past
    /// its 10s self-heal timeout.
    pub fn should_query_parser_state(&mut self, now: Instant, idle: bool) -> bool {
        if !idle {
            return false;
        }
        if self.query_parser_state {
            if self
                .query_parser_state_time
                .is_some_and(|t| now.duration_since(t) >= PARSER_STATE_TIMEOUT)
            {
                self.query_parser_state = false;
            } else {
                return false;
            }
        }
        self.query_parser_state_time
            .is_none_or(|t| now.duration_since(t) >= PARSER_STATE_THROTTLE)
    }

    /// Record that `$G` was just written.
    pub fn mark_parser_state_queried(&mut self, now: Instant) {
        self.query_parser_state = true;
        self.query_parser_state_reply = true;
        self.query_parser_state_time = Some(now);
    }

    /// Mark the next parser-state query's raw reply as worth surfacing to
    /// sessions (a user-originated `query_parser_state`, not the periodic
    /// one).
    pub fn request_parser_state_echo(&mut self) {
        self.reply_parser_state = true;
    }

    /// A `[...]` parser-state line arrived: clears the outstanding-query
    /// mask (the `ok` that follows still needs routing, see
    /// `take_parser_state_ack`) and returns whether the raw line should be
    /// surfaced.
    pub fn on_parser_state_reply(&mut self) -> bool {
        self.query_parser_state = false;
        std::mem::take(&mut self.reply_parser_state)
    }

    /// Whether the next `ok` belongs to a `$G` query rather than a program/
    /// Feeder line. Consumes the flag — at most one `ok` is ever diverted
    /// this way per query.
    pub fn take_parser_state_ack(&mut self) -> bool {
        std::mem::take(&mut self.query_parser_state_reply)
    }

    /// Record that the Sender just reported `end`, capturing the work
    /// position observed at that instant as the idle baseline.
    pub fn mark_sender_finished(&mut self, now: Instant, wpos: (f64, f64, f64, f64, f64, f64)) {
        self.sender_finish_time = Some(now);
        self.finish_wpos = Some(wpos);
    }

    /// Whether end-of-program detection is currently watching for the
    /// machine to settle.
    pub fn is_awaiting_end_of_program(&self) -> bool {
        self.sender_finish_time.is_some()
    }

    /// One controller-tick step of end-of-program detection (spec.md
    /// §4.5 step 8). `machine_idle` is the firmware's own idle/busy report;
    /// `wpos` is the work position from the latest status report.
    ///
    /// Returns `true` once the machine has held the same work position
    /// while idle for 500ms straight — the caller should then stop the
    /// Workflow and clear this state.
    pub fn tick_end_of_program(
        &mut self,
        now: Instant,
        machine_idle: bool,
        wpos: (f64, f64, f64, f64, f64, f64),
    ) -> bool {
        let Some(finish_time) = self.sender_finish_time else {
            return false;
        };
        let settled = machine_idle && self.finish_wpos == Some(wpos);
        if !settled {
            self.sender_finish_time = Some(now);
            self.finish_wpos = Some(wpos);
            return false;
        }
        if now.duration_since(finish_time) > Duration::from_millis(500) {
            self.sender_finish_time = None;
            self.finish_wpos = None;
            return true;
        }
        false
    }

    /// Discard end-of-program tracking outright (e.g. an explicit
    /// `sender:stop`/`sender:load` superseded it).
    pub fn clear_end_of_program(&mut self) {
        self.sender_finish_time = None;
        self.finish_wpos = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_query_gates_until_reply() {
        let mut a = ActionState::default();
        let t0 = Instant::now();
        assert!(a.should_query_status(t0));
        a.mark_status_queried(t0);
        assert!(!a.should_query_status(t0));
        assert!(!a.on_status_reply());
        assert!(a.should_query_status(t0));
    }

    #[test]
    fn status_query_self_heals_after_timeout() {
        let mut a = ActionState::default();
        let t0 = Instant::now();
        a.mark_status_queried(t0);
        assert!(!a.should_query_status(t0 + Duration::from_secs(1)));
        assert!(a.should_query_status(t0 + Duration::from_secs(6)));
    }

    #[test]
    fn parser_state_only_queried_while_idle() {
        let mut a = ActionState::default();
        let t0 = Instant::now();
        assert!(!a.should_query_parser_state(t0, false));
        assert!(a.should_query_parser_state(t0, true));
    }

    #[test]
    fn parser_state_throttled_to_500ms() {
        let mut a = ActionState::default();
        let t0 = Instant::now();
        a.mark_parser_state_queried(t0);
        assert!(a.on_parser_state_reply() == false);
        assert!(!a.should_query_parser_state(t0 + Duration::from_millis(100), true));
        assert!(a.should_query_parser_state(t0 + Duration::from_millis(600), true));
    }

    #[test]
    fn ok_after_parser_state_query_is_consumed_once() {
        let mut a = ActionState::default();
        let t0 = Instant::now();
        a.mark_parser_state_queried(t0);
        assert!(a.take_parser_state_ack());
        assert!(!a.take_parser_state_ack());
    }

    #[test]
    fn end_of_program_requires_settled_position_for_500ms() {
        let mut a = ActionState::default();
        let t0 = Instant::now();
        let wpos = (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        a.mark_sender_finished(t0, wpos);
        assert!(!a.tick_end_of_program(t0 + Duration::from_millis(100), true, wpos));
        assert!(a.tick_end_of_program(t0 + Duration::from_millis(600), true, wpos));
    }

    #[test]
    fn end_of_program_resets_if_still_moving() {
        let mut a = ActionState::default();
        let t0 = Instant::now();
        let wpos = (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        a.mark_sender_finished(t0, wpos);
        let moved = (1.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(!a.tick_end_of_program(t0 + Duration::from_millis(600), true, moved));
        assert!(!a.tick_end_of_program(t0 + Duration::from_millis(700), true, moved));
        assert!(a.tick_end_of_program(t0 + Duration::from_millis(1300), true, moved));
    }
}

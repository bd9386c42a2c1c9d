//! Session-level run state: idle, running, or paused, and the transitions
//! between them.
//!
//! The Workflow is the thing a session actually watches (`workflow:state`).
//! It owns no transport and no queue of its own — it drives the Sender and
//! Feeder it's given on each transition, and refuses transitions that don't
//! make sense from the current state.

use super::feeder::Feeder;
use super::sender::Sender;

/// Why the workflow is paused, if it is.
#[derive(Debug, Clone, PartialEq)]
pub enum PauseReason {
    /// Paused by a program line (`M0`/`M1`/`M6`/`%wait`).
    Data(String),
    /// Paused by an error response from the firmware.
    Error(String),
    /// Paused by an explicit feedhold request.
    Feedhold,
}

/// Run state of the loaded program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    /// Nothing running.
    Idle,
    /// Streaming a loaded program.
    Running,
    /// Streaming halted, resumable.
    Paused,
}

/// A workflow state transition, published to `workflow:state` subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// Entered `Running`.
    Start,
    /// Entered `Paused`.
    Pause(Option<PauseReason>),
    /// Returned to `Running` from `Paused`.
    Resume,
    /// Returned to `Idle`.
    Stop,
}

/// The idle/running/paused state machine, with the transition table from
/// the protocol's pause/resume/stop semantics: starting when already
/// running, resuming when not paused, and so on are no-ops rather than
/// errors, since sessions race state queries against state changes.
pub struct Workflow {
    state: WorkflowState,
    last_reason: Option<PauseReason>,
}

impl Workflow {
    /// A workflow starting idle.
    pub fn new() -> Self {
        Self {
            state: WorkflowState::Idle,
            last_reason: None,
        }
    }

    /// Current run state.
    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Why the workflow last paused, retained across a subsequent resume
    /// for session UIs that want to show "last pause: M0" after the fact.
    pub fn last_reason(&self) -> Option<&PauseReason> {
        self.last_reason.as_ref()
    }

    /// Begin streaming: `Idle -> Running`. A no-op if already running or
    /// paused.
    pub fn start(&mut self, sender: &mut Sender) -> Option<WorkflowEvent> {
        if self.state != WorkflowState::Idle {
            return None;
        }
        self.state = WorkflowState::Running;
        sender.start();
        Some(WorkflowEvent::Start)
    }

    /// Pause streaming: `Running -> Paused`, holding the Sender and Feeder
    /// so neither transmits while paused. A no-op if already paused or
    /// idle.
    pub fn pause(
        &mut self,
        sender: &mut Sender,
        feeder: &mut Feeder,
        reason: PauseReason,
    ) -> Option<WorkflowEvent> {
        if self.state != WorkflowState::Running {
            return None;
        }
        self.state = WorkflowState::Paused;
        self.last_reason = Some(reason.clone());
        let reason_text = match &reason {
            PauseReason::Data(s) => s.clone(),
            PauseReason::Error(s) => s.clone(),
            PauseReason::Feedhold => "feedhold".to_string(),
        };
        sender.hold(reason_text.clone());
        feeder.hold_for_workflow(reason_text);
        Some(WorkflowEvent::Pause(Some(reason)))
    }

    /// Resume streaming: `Paused -> Running`, releasing the Sender and
    /// Feeder holds. A no-op if not paused.
    pub fn resume(&mut self, sender: &mut Sender, feeder: &mut Feeder) -> Option<WorkflowEvent> {
        if self.state != WorkflowState::Paused {
            return None;
        }
        self.state = WorkflowState::Running;
        sender.unhold();
        feeder.unhold();
        Some(WorkflowEvent::Resume)
    }

    /// Stop streaming: back to `Idle` from either `Running` or `Paused`,
    /// rewinding the Sender to the start of whatever program is loaded
    /// (spec.md §4.2/§4.3: `stop` rewinds, it does not unload — that is
    /// `sender:unload`'s job). A no-op if already idle.
    pub fn stop(&mut self, sender: &mut Sender, feeder: &mut Feeder) -> Option<WorkflowEvent> {
        if self.state == WorkflowState::Idle {
            return None;
        }
        self.state = WorkflowState::Idle;
        sender.rewind();
        feeder.reset();
        Some(WorkflowEvent::Stop)
    }

    /// Whether the workflow is idle.
    pub fn is_idle(&self) -> bool {
        self.state == WorkflowState::Idle
    }
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::smoothieware::sender::Program;

    fn rig() -> (Workflow, Sender, Feeder) {
        let mut sender = Sender::new();
        sender.load(Program::new("t", "G0 X1\n"));
        (Workflow::new(), sender, Feeder::new())
    }

    #[test]
    fn starts_from_idle() {
        let (mut wf, mut sender, _feeder) = rig();
        let event = wf.start(&mut sender);
        assert_eq!(event, Some(WorkflowEvent::Start));
        assert_eq!(*wf.state(), WorkflowState::Running);
    }

    #[test]
    fn starting_twice_is_a_no_op() {
        let (mut wf, mut sender, _feeder) = rig();
        wf.start(&mut sender);
        assert_eq!(wf.start(&mut sender), None);
    }

    #[test]
    fn pause_holds_sender_and_feeder() {
        let (mut wf, mut sender, mut feeder) = rig();
        wf.start(&mut sender);
        let event = wf.pause(&mut sender, &mut feeder, PauseReason::Data("M0".into()));
        assert_eq!(
            event,
            Some(WorkflowEvent::Pause(Some(PauseReason::Data("M0".into()))))
        );
        assert!(sender.is_holding());
        assert!(feeder.is_holding());
        assert_eq!(*wf.state(), WorkflowState::Paused);
    }

    #[test]
    fn resume_releases_holds() {
        let (mut wf, mut sender, mut feeder) = rig();
        wf.start(&mut sender);
        wf.pause(&mut sender, &mut feeder, PauseReason::Feedhold);
        let event = wf.resume(&mut sender, &mut feeder);
        assert_eq!(event, Some(WorkflowEvent::Resume));
        assert!(!sender.is_holding());
        assert!(!feeder.is_holding());
        assert_eq!(*wf.state(), WorkflowState::Running);
    }

    #[test]
    fn stop_rewinds_sender_and_resets_feeder_but_keeps_program_loaded() {
        let (mut wf, mut sender, mut feeder) = rig();
        wf.start(&mut sender);
        let event = wf.stop(&mut sender, &mut feeder);
        assert_eq!(event, Some(WorkflowEvent::Stop));
        assert!(sender.state().loaded.is_some());
        assert_eq!(sender.state().sent, 0);
        assert_eq!(sender.state().received, 0);
        assert!(sender.state().sp.queue.is_empty());
        assert_eq!(*wf.state(), WorkflowState::Idle);
    }

    #[test]
    fn last_reason_survives_resume() {
        let (mut wf, mut sender, mut feeder) = rig();
        wf.start(&mut sender);
        wf.pause(&mut sender, &mut feeder, PauseReason::Data("M1".into()));
        wf.resume(&mut sender, &mut feeder);
        assert_eq!(wf.last_reason(), Some(&PauseReason::Data("M1".into())));
    }
}

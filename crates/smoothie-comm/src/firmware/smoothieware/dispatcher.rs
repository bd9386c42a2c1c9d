//! Command surface: turns session requests (load a program, jog, override
//! feed, run a macro) into writes on the transport and mutations of the
//! Sender/Feeder/Workflow state the controller loop drives.
//!
//! The Dispatcher never reads from the transport itself — inbound bytes are
//! the controller loop's job, routed through the response parser and back
//! into the Sender/Feeder/Workflow via [`super::mod@super`]'s
//! `dispatch_response`. The Dispatcher only writes.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use smoothie_core::event_bus::{AppEvent, EventBus, StreamingEvent};
use smoothie_core::Result;
use tokio::sync::Mutex as AsyncMutex;

use crate::communication::Transport;

use super::actions::ActionState;
use super::feeder::Feeder;
use super::preprocessor::{collapse_coolant, GcodeContext};
use super::response_parser::SmoothiewareResponseParser;
use super::sender::{Program, Sender};
use super::workflow::{PauseReason, Workflow, WorkflowState};

/// Per-controller configuration the Dispatcher consults before acting.
///
/// Persistent storage of these values (a config file, a settings database)
/// is explicitly out of scope here — callers own whatever backs this trait.
pub trait DispatcherConfig: Send + Sync {
    /// Whether an `error:` response should be treated as informational
    /// (streaming continues) rather than pausing the Workflow.
    fn ignore_errors(&self) -> bool;
}

/// Default config: errors always pause the Workflow.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDispatcherConfig;

impl DispatcherConfig for DefaultDispatcherConfig {
    fn ignore_errors(&self) -> bool {
        false
    }
}

/// Resolves a macro identifier to its G-code body. Macro storage (files,
/// database, in-memory map) is the caller's concern.
pub trait MacroLookup: Send + Sync {
    /// Look up the body of macro `id`, if it exists.
    fn macro_body(&self, id: &str) -> Option<String>;
}

/// No macros registered; `macro_run`/`macro_load` always fail to find one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMacros;

impl MacroLookup for NoMacros {
    fn macro_body(&self, _id: &str) -> Option<String> {
        None
    }
}

/// Reads a G-code file's contents for `sender_load`/`watchdir_load`. File
/// monitoring and persistent program storage are out of scope; this trait
/// only covers reading bytes the caller already located.
#[async_trait]
pub trait FileReader: Send + Sync {
    /// Read the file at `path` to a string.
    async fn read_to_string(&self, path: &Path) -> std::io::Result<String>;
}

/// Reads files directly off the local filesystem via `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileReader;

#[async_trait]
impl FileReader for LocalFileReader {
    async fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        tokio::fs::read_to_string(path).await
    }
}

/// Bundles the mutable state the controller loop and Dispatcher share.
pub struct ControllerCore {
    /// Character-counting program Sender.
    pub sender: Sender,
    /// Out-of-band command Feeder.
    pub feeder: Feeder,
    /// Idle/running/paused state machine.
    pub workflow: Workflow,
    /// Inbound line classifier and machine snapshot.
    pub parser: SmoothiewareResponseParser,
    /// Numeric context for `%`-assignment and `[expr]` substitution.
    pub ctx: GcodeContext,
    /// Set when the firmware reports an unacknowledged alarm.
    pub alarm: bool,
    /// Realtime-query gating and end-of-program detection state.
    pub actions: ActionState,
    /// Firmware identification string from the last `version` reply seen.
    pub firmware_id: Option<String>,
}

impl ControllerCore {
    /// A fresh core with nothing loaded, not alarmed.
    pub fn new() -> Self {
        Self {
            sender: Sender::new(),
            feeder: Feeder::new(),
            workflow: Workflow::new(),
            parser: SmoothiewareResponseParser::new(),
            ctx: GcodeContext::new(),
            alarm: false,
            actions: ActionState::default(),
            firmware_id: None,
        }
    }

    /// Whether the Feeder pipeline currently owns the wire.
    ///
    /// While `workflow=running` and the Sender still has lines in flight,
    /// the Sender has exclusive use of the wire (spec.md §4.4/§8 scenario
    /// 5): a freshly-queued Feeder line must wait until the Sender drains
    /// (`received == sent`, empty queue) even if the Feeder itself isn't
    /// holding. An alarm always blocks dispatch regardless of Workflow
    /// state.
    pub(crate) fn feeder_owns_wire(&self) -> bool {
        if self.alarm {
            return false;
        }
        !(self.workflow.state() == &WorkflowState::Running && !self.sender.state().sp.queue.is_empty())
    }
}

impl Default for ControllerCore {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimum accepted feed/spindle override percentage.
const OVERRIDE_MIN: u16 = 10;
/// Maximum accepted feed/spindle override percentage.
const OVERRIDE_MAX: u16 = 200;
/// Default override percentage, used when a relative delta of zero is
/// requested.
const OVERRIDE_DEFAULT: u16 = 100;

/// Turns session commands into transport writes and Sender/Feeder/Workflow
/// state changes.
pub struct Dispatcher {
    core: Arc<RwLock<ControllerCore>>,
    transport: Arc<AsyncMutex<Box<dyn Transport>>>,
    config: Arc<dyn DispatcherConfig>,
    macros: Arc<dyn MacroLookup>,
    files: Arc<dyn FileReader>,
    events: Arc<EventBus>,
}

impl Dispatcher {
    /// Build a Dispatcher over shared core state and a transport.
    pub fn new(
        core: Arc<RwLock<ControllerCore>>,
        transport: Arc<AsyncMutex<Box<dyn Transport>>>,
        config: Arc<dyn DispatcherConfig>,
        macros: Arc<dyn MacroLookup>,
        files: Arc<dyn FileReader>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            core,
            transport,
            config,
            macros,
            files,
            events,
        }
    }

    /// Shared core state, for the controller loop to drive independently.
    pub fn core(&self) -> &Arc<RwLock<ControllerCore>> {
        &self.core
    }

    /// Caller-supplied config, for the controller loop's error routing.
    pub fn config(&self) -> &Arc<dyn DispatcherConfig> {
        &self.config
    }

    /// Shared event bus, for the controller loop to emit inbound-driven
    /// events on the same stream as the Dispatcher's outbound-driven ones.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    fn publish(&self, event: StreamingEvent) {
        let _ = self.events.publish(AppEvent::Streaming(event));
    }

    async fn write_realtime(&self, byte: u8) -> Result<()> {
        let mut transport = self.transport.lock().await;
        transport.write(&[byte])
    }

    async fn write_line(&self, text: &str) -> Result<()> {
        let mut transport = self.transport.lock().await;
        transport.write(text.as_bytes())?;
        transport.write(b"\n")
    }

    /// Load a program into the Sender without starting it. A trailing
    /// `%wait` dwell is appended so the firmware's final `ok` unambiguously
    /// signals completion once the planner queue drains (spec.md §4.3).
    /// Also stops whatever workflow was previously in progress, since
    /// loading a new program while one is running/paused would otherwise
    /// leave the old Sender state dangling.
    pub fn sender_load(&self, name: impl Into<String>, text: impl Into<String>) {
        let name = name.into();
        let text = append_wait_dwell(text.into());
        let total_lines = {
            let mut core = self.core.write();
            let (sender, feeder) = (&mut core.sender, &mut core.feeder);
            core.workflow.stop(sender, feeder);
            core.actions.clear_end_of_program();
            let program = Program::new(name.clone(), text);
            let total = program.lines.len();
            core.sender.load(program);
            total
        };
        self.publish(StreamingEvent::SenderLoad { name, total_lines });
    }

    /// Drop the loaded program.
    pub fn sender_unload(&self) {
        let mut core = self.core.write();
        let (sender, feeder) = (&mut core.sender, &mut core.feeder);
        core.workflow.stop(sender, feeder);
        core.sender.unload();
        drop(core);
        self.publish(StreamingEvent::SenderUnload);
    }

    /// Read a file and load it as the Sender's program.
    pub async fn sender_load_file(&self, path: &Path) -> std::io::Result<()> {
        let text = self.files.read_to_string(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        self.sender_load(name, text);
        Ok(())
    }

    /// Start streaming the loaded program: `Idle -> Running`, then pump the
    /// first batch of lines that fit in the buffer.
    pub async fn sender_start(&self) -> Result<()> {
        let to_send = {
            let mut core = self.core.write();
            core.workflow.start(&mut core.sender);
            core.feeder.reset();
            self.pump_sender_locked(&mut core)
        };
        self.publish(StreamingEvent::WorkflowState {
            state: "Running".to_string(),
        });
        for line in to_send {
            self.write_line(&line).await?;
        }
        Ok(())
    }

    fn pump_sender_locked(&self, core: &mut ControllerCore) -> Vec<String> {
        let ControllerCore {
            sender,
            feeder,
            workflow,
            ctx,
            ..
        } = core;
        sender.pump(ctx, |sender, trigger| match trigger {
            super::preprocessor::DetectedHold::M0 => {
                workflow.pause(sender, feeder, PauseReason::Data("M0".to_string()));
            }
            super::preprocessor::DetectedHold::M1 => {
                workflow.pause(sender, feeder, PauseReason::Data("M1".to_string()));
            }
            super::preprocessor::DetectedHold::M6 => {
                workflow.pause(sender, feeder, PauseReason::Data("M6".to_string()));
            }
            super::preprocessor::DetectedHold::Wait => {}
        })
    }

    /// Stop streaming: `Running`/`Paused -> Idle`, unload the program. If
    /// the firmware last reported `Hold`, releases it with a realtime `~`
    /// first so a stop issued mid-feedhold doesn't leave the board wedged.
    pub async fn sender_stop(&self) -> Result<()> {
        let was_holding = {
            let mut core = self.core.write();
            let holding = core.parser.snapshot().machine_state.as_deref() == Some("Hold");
            let (sender, feeder) = (&mut core.sender, &mut core.feeder);
            core.workflow.stop(sender, feeder);
            core.actions.clear_end_of_program();
            holding
        };
        self.publish(StreamingEvent::WorkflowState {
            state: "Idle".to_string(),
        });
        if was_holding {
            self.write_realtime(b'~').await?;
        }
        Ok(())
    }

    /// Pause streaming: `Running -> Paused`, then a realtime feedhold (`!`)
    /// so the firmware stops motion immediately rather than waiting for the
    /// in-flight line's buffer slot to drain.
    pub async fn sender_pause(&self) -> Result<()> {
        {
            let mut core = self.core.write();
            let (sender, feeder) = (&mut core.sender, &mut core.feeder);
            core.workflow.pause(sender, feeder, PauseReason::Feedhold);
        }
        self.publish(StreamingEvent::WorkflowState {
            state: "Paused".to_string(),
        });
        self.write_realtime(b'!').await
    }

    /// Resume streaming: realtime cycle-start (`~`) first, then
    /// `Paused -> Running` and pump whatever now fits.
    pub async fn sender_resume(&self) -> Result<()> {
        self.write_realtime(b'~').await?;
        let to_send = {
            let mut core = self.core.write();
            {
                let (sender, feeder) = (&mut core.sender, &mut core.feeder);
                core.workflow.resume(sender, feeder);
            }
            self.pump_sender_locked(&mut core)
        };
        self.publish(StreamingEvent::WorkflowState {
            state: "Running".to_string(),
        });
        for line in to_send {
            self.write_line(&line).await?;
        }
        Ok(())
    }

    /// Queue an out-of-band line on the Feeder and, if nothing else holds
    /// the wire, send it immediately. Lines still queue while the Sender
    /// owns the wire (`workflow=running` with lines in flight, spec.md §8
    /// scenario 5) or while the controller reports an alarm (spec.md §4.6:
    /// "further Feeder writes are suppressed") — in both cases the queued
    /// line dispatches later, once `ack_and_pump` next pumps the Feeder.
    pub async fn feed(&self, line: impl Into<String>) -> Result<()> {
        let to_send = {
            let mut core = self.core.write();
            core.feeder.feed(line);
            if core.feeder_owns_wire() {
                let ControllerCore { feeder, ctx, .. } = &mut *core;
                feeder.next(ctx)
            } else {
                None
            }
        };
        if let Some(line) = to_send {
            self.write_line(&line).await?;
        }
        Ok(())
    }

    /// `feeder:start` — if the Sender isn't running, issue a realtime
    /// cycle-start first (matches a session resuming manual jogging after a
    /// feedhold with nothing loaded), then release the Feeder's hold and
    /// attempt to send its head line.
    pub async fn feeder_start(&self) -> Result<()> {
        let running = *self.core.read().workflow.state() == super::workflow::WorkflowState::Running;
        if !running {
            self.write_realtime(b'~').await?;
        }
        let to_send = {
            let mut core = self.core.write();
            core.feeder.unhold();
            if core.feeder_owns_wire() {
                let ControllerCore { feeder, ctx, .. } = &mut *core;
                feeder.next(ctx)
            } else {
                None
            }
        };
        if let Some(line) = to_send {
            self.write_line(&line).await?;
        }
        Ok(())
    }

    /// `feeder:stop` — drop everything queued and clear hold/pending.
    pub fn feeder_stop(&self) {
        self.core.write().feeder.reset();
    }

    /// Immediate realtime feedhold (`!`), no acknowledgment consumed.
    pub async fn feedhold(&self) -> Result<()> {
        self.write_realtime(b'!').await
    }

    /// Immediate realtime cycle start (`~`), no acknowledgment consumed.
    pub async fn cyclestart(&self) -> Result<()> {
        self.write_realtime(b'~').await
    }

    /// Run the homing cycle.
    pub async fn homing(&self) -> Result<()> {
        self.write_line("$H").await
    }

    /// Unlock after an alarm.
    pub async fn unlock(&self) -> Result<()> {
        {
            let mut core = self.core.write();
            core.alarm = false;
        }
        self.write_line("$X").await
    }

    /// Soft reset (realtime `Ctrl-X`, 0x18), no acknowledgment consumed.
    /// Goes through the Workflow transition table like `sender_stop`
    /// (spec.md: "reset — Workflow.stop; Feeder.reset; write `\x18`"),
    /// rather than unloading the Sender outright.
    pub async fn reset(&self) -> Result<()> {
        {
            let mut core = self.core.write();
            let (sender, feeder) = (&mut core.sender, &mut core.feeder);
            core.workflow.stop(sender, feeder);
            core.feeder.reset();
            core.alarm = false;
        }
        self.write_realtime(0x18).await
    }

    /// Sleep is a no-op at this layer: the firmware has no host-visible
    /// sleep state this driver needs to model separately from `Idle`.
    pub fn sleep(&self) {}

    /// Set the feed override. `delta` of zero resets to 100%; otherwise the
    /// new value is `current + delta`, clamped to 10..=200. Sends `M220` and
    /// optimistically updates the snapshot ahead of the firmware's own
    /// status-report confirmation.
    pub async fn override_feed(&self, delta: i32) -> Result<()> {
        let value = {
            let mut core = self.core.write();
            let current = core.parser.snapshot().ov_f;
            let value = next_override(current, delta);
            let ov_s = core.parser.snapshot().ov_s;
            core.parser.set_overrides(value, ov_s);
            value
        };
        self.write_line(&format!("M220 S{value}")).await
    }

    /// Set the spindle override, same clamp/delta rule as `override_feed`,
    /// sending `M221`.
    pub async fn override_spindle(&self, delta: i32) -> Result<()> {
        let value = {
            let mut core = self.core.write();
            let current = core.parser.snapshot().ov_s;
            let value = next_override(current, delta);
            let ov_f = core.parser.snapshot().ov_f;
            core.parser.set_overrides(ov_f, value);
            value
        };
        self.write_line(&format!("M221 S{value}")).await
    }

    /// Rapid override has no firmware-side command on this target; kept as
    /// a no-op for trait-surface parity with feed/spindle overrides.
    pub fn override_rapid(&self, _delta: i32) {}

    /// Fire the laser at `power` percent for `duration_ms` via the
    /// `fire`/`M3`/`M5` sequence (spec.md §4.7): `power == 0` just turns the
    /// laser off; otherwise `M3` arms the spindle/laser, `fire <power>` sets
    /// the test power, and a `G4` dwell (rather than a host-side sleep) lets
    /// the firmware itself time the `duration_ms` window before `fire off`
    /// and `M5` restore it. Everything goes through the Feeder so lasertest
    /// participates in the same flow control as any other ad-hoc command.
    pub async fn lasertest(&self, power: u8, duration_ms: u64) -> Result<()> {
        if power == 0 {
            self.feed("fire off").await?;
            return self.feed("M5").await;
        }
        self.feed("M3").await?;
        self.feed(format!("fire {power}")).await?;
        if duration_ms > 0 {
            let seconds = duration_ms as f64 / 1000.0;
            self.feed(format!("G4 P{seconds}")).await?;
            self.feed("fire off").await?;
            self.feed("M5").await?;
        }
        Ok(())
    }

    /// Send one or more raw G-code lines through the Feeder.
    pub async fn gcode(&self, commands: &[String]) -> Result<()> {
        for command in commands {
            self.feed(command.clone()).await?;
        }
        Ok(())
    }

    /// Run a registered macro by id, feeding its body line by line.
    pub async fn macro_run(&self, id: &str) -> Result<()> {
        let Some(body) = self.macros.macro_body(id) else {
            return Err(smoothie_core::Error::other(format!(
                "no macro registered for id '{id}'"
            )));
        };
        for line in body.lines() {
            self.feed(line.to_string()).await?;
        }
        Ok(())
    }

    /// Load a macro's body as the Sender's program without running it.
    pub fn macro_load(&self, id: &str) -> Result<()> {
        let Some(body) = self.macros.macro_body(id) else {
            return Err(smoothie_core::Error::other(format!(
                "no macro registered for id '{id}'"
            )));
        };
        self.sender_load(id.to_string(), body);
        Ok(())
    }

    /// Load a file from disk and queue it as the Sender's program. File
    /// system watching for externally-changed files is out of scope; this
    /// is a one-shot read triggered by the caller.
    pub async fn watchdir_load(&self, path: &Path) -> std::io::Result<()> {
        self.sender_load_file(path).await
    }

    /// Reissue the machine's cached coolant modal state as G-code, one
    /// command per line since Smoothieware rejects two coolant M-codes on
    /// the same line.
    pub async fn restore_coolant(&self) -> Result<()> {
        let coolant = self.core.read().parser.snapshot().modal.coolant.clone();
        let text = collapse_coolant(&coolant);
        if text.is_empty() {
            return Ok(());
        }
        for line in text.lines() {
            self.feed(line.to_string()).await?;
        }
        Ok(())
    }
}

/// Append a trailing `%wait` line so the last real line of a loaded program
/// is always followed by a dwell the preprocessor turns into `G4 P0.5` —
/// without it, the final `ok` is indistinguishable from an ack for any other
/// line and end-of-program detection has nothing to pin the settle window to.
fn append_wait_dwell(text: String) -> String {
    let mut text = text.trim_end_matches(['\n', '\r']).to_string();
    text.push_str("\n%wait\n");
    text
}

fn next_override(current: u16, delta: i32) -> u16 {
    if delta == 0 {
        return OVERRIDE_DEFAULT;
    }
    let updated = current as i32 + delta;
    updated.clamp(OVERRIDE_MIN as i32, OVERRIDE_MAX as i32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::NoOpTransport;

    fn rig() -> (Dispatcher, Arc<RwLock<ControllerCore>>) {
        let core = Arc::new(RwLock::new(ControllerCore::new()));
        let transport: Box<dyn Transport> = Box::new(NoOpTransport::new("test"));
        let dispatcher = Dispatcher::new(
            core.clone(),
            Arc::new(AsyncMutex::new(transport)),
            Arc::new(DefaultDispatcherConfig),
            Arc::new(NoMacros),
            Arc::new(LocalFileReader),
            Arc::new(EventBus::new()),
        );
        (dispatcher, core)
    }

    #[tokio::test]
    async fn loading_and_starting_pumps_until_the_trailing_wait_holds() {
        let (dispatcher, core) = rig();
        dispatcher.sender_load("t", "G0 X1\nG0 X2\n");
        dispatcher.sender_start().await.unwrap();
        let state = core.read().sender.state().clone();
        // G0 X1, G0 X2, and the appended %wait dwell all fit the default
        // buffer in one pump; the dwell's own hold is what stops the pump.
        assert_eq!(state.sent, 3);
        assert!(core.read().sender.is_holding());
    }

    #[tokio::test]
    async fn feed_queues_and_sends_when_idle() {
        let (dispatcher, core) = rig();
        dispatcher.feed("G0 X1").await.unwrap();
        assert!(core.read().feeder.state().pending);
    }

    #[tokio::test]
    async fn override_feed_clamps_and_resets_on_zero_delta() {
        let (dispatcher, core) = rig();
        dispatcher.override_feed(500).await.unwrap();
        assert_eq!(core.read().parser.snapshot().ov_f, OVERRIDE_MAX);
        dispatcher.override_feed(0).await.unwrap();
        assert_eq!(core.read().parser.snapshot().ov_f, OVERRIDE_DEFAULT);
        dispatcher.override_feed(-1000).await.unwrap();
        assert_eq!(core.read().parser.snapshot().ov_f, OVERRIDE_MIN);
    }

    #[tokio::test]
    async fn m0_mid_program_pauses_workflow_and_sender() {
        let (dispatcher, core) = rig();
        dispatcher.sender_load("t", "G0 X1\nM0\nG0 X2\n");
        dispatcher.sender_start().await.unwrap();
        assert_eq!(*core.read().workflow.state(), super::super::workflow::WorkflowState::Paused);
        assert!(core.read().sender.is_holding());
    }

    #[tokio::test]
    async fn m0_resume_sends_tick_releases_hold_and_streams_remaining_line() {
        let (dispatcher, core) = rig();
        dispatcher.sender_load("t", "G0 X1\nM0\nG0 X2\n");
        dispatcher.sender_start().await.unwrap();
        assert_eq!(core.read().sender.state().sent, 2); // G0 X1, M0

        dispatcher.sender_resume().await.unwrap();
        assert_eq!(
            *core.read().workflow.state(),
            super::super::workflow::WorkflowState::Running
        );
        assert!(!core.read().sender.is_holding());
        assert_eq!(core.read().sender.state().sent, 3); // + G0 X2
    }

    #[tokio::test]
    async fn reset_returns_workflow_to_idle_but_keeps_program_loaded() {
        let (dispatcher, core) = rig();
        dispatcher.sender_load("t", "G0 X1\nG0 X2\n");
        dispatcher.sender_start().await.unwrap();
        assert_eq!(
            *core.read().workflow.state(),
            super::super::workflow::WorkflowState::Running
        );

        dispatcher.reset().await.unwrap();

        assert_eq!(
            *core.read().workflow.state(),
            super::super::workflow::WorkflowState::Idle
        );
        assert_eq!(core.read().sender.state().sent, 0);
        assert_eq!(core.read().sender.state().received, 0);
        assert!(core.read().sender.state().loaded.is_some());
        assert!(core.read().feeder.state().queue.is_empty());
    }

    #[tokio::test]
    async fn unknown_macro_errors() {
        let (dispatcher, _core) = rig();
        assert!(dispatcher.macro_run("missing").await.is_err());
    }

    #[tokio::test]
    async fn lasertest_zero_power_just_turns_laser_off() {
        let (dispatcher, core) = rig();
        dispatcher.lasertest(0, 1000).await.unwrap();
        // "fire off" dispatches immediately (pending), leaving "M5" queued.
        assert!(core.read().feeder.state().pending);
        assert_eq!(core.read().feeder.state().queue.len(), 1);
    }

    #[tokio::test]
    async fn lasertest_nonzero_power_fires_m3_then_queues_fire_dwell_off_m5() {
        let (dispatcher, core) = rig();
        dispatcher.lasertest(50, 1000).await.unwrap();
        // M3 dispatches immediately; fire/G4/fire off/M5 queue behind it.
        assert!(core.read().feeder.state().pending);
        assert_eq!(core.read().feeder.state().queue.len(), 4);
    }

    #[tokio::test]
    async fn feed_queues_without_dispatch_while_sender_owns_the_wire() {
        let (dispatcher, core) = rig();
        // Two real lines plus the trailing %wait dwell; the dwell's own
        // hold stops the pump with the Sender still mid-stream.
        dispatcher.sender_load("t", "G1 X1\nG1 X2\n");
        dispatcher.sender_start().await.unwrap();
        assert!(!core.read().sender.state().sp.queue.is_empty());

        dispatcher.feed("G91").await.unwrap();
        assert!(
            !core.read().feeder.state().pending,
            "Feeder must not dispatch while the Sender has lines in flight"
        );
        assert_eq!(core.read().feeder.state().queue.len(), 1);
    }

    #[tokio::test]
    async fn alarm_suppresses_feeder_dispatch_until_cleared() {
        let (dispatcher, core) = rig();
        core.write().alarm = true;
        dispatcher.feed("G0 X1").await.unwrap();
        assert!(!core.read().feeder.state().pending);
        assert_eq!(core.read().feeder.state().queue.len(), 1);

        core.write().alarm = false;
        dispatcher.feed("G0 X2").await.unwrap();
        assert!(core.read().feeder.state().pending);
    }
}


//! Smoothieware firmware driver: the `ControllerTrait` implementation that
//! ties the Sender, Feeder, Workflow, line preprocessor, and response
//! parser into a single controller running one background task per
//! connection.

pub mod actions;
pub mod dispatcher;
pub mod feeder;
pub mod preprocessor;
pub mod response_parser;
pub mod sender;
pub mod workflow;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use smoothie_core::constants::{BOOTLOADER_SETTLE, CONTROLLER_TICK, POST_VERSION_SETTLE};
use smoothie_core::core::{ControllerListener, ControllerListenerHandle, ControllerTrait, OverrideState};
use smoothie_core::data::{ControllerState, ControllerStatus, PartialPosition};
use smoothie_core::event_bus::{
    AppEvent, CommunicationEvent, ConnectionEvent, DisconnectReason, EventBus, StreamingEvent,
};
use smoothie_core::Result;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::communication::{Transport, TransportEvent};

use dispatcher::{ControllerCore, DefaultDispatcherConfig, Dispatcher, DispatcherConfig, FileReader, LocalFileReader, MacroLookup, NoMacros};
use preprocessor::DetectedHold;
use response_parser::ResponseEvent;
use workflow::{PauseReason, WorkflowState};

/// The Smoothieware firmware driver.
///
/// Owns exactly one connection: a transport, the Sender/Feeder/Workflow
/// state behind it, and (once connected) a single background task that
/// multiplexes the 250ms tick with inbound transport bytes.
pub struct SmoothiewareController {
    name: String,
    core: Arc<RwLock<ControllerCore>>,
    transport: Arc<AsyncMutex<Box<dyn Transport>>>,
    dispatcher: Dispatcher,
    connection_state: Arc<RwLock<ControllerState>>,
    listeners: Arc<RwLock<HashMap<ControllerListenerHandle, Arc<dyn ControllerListener>>>>,
    next_listener_id: AtomicU64,
    loop_handle: Option<JoinHandle<()>>,
    events: Arc<EventBus>,
}

impl SmoothiewareController {
    /// Build a controller over `transport`, with default (no-op) macro
    /// lookup, local-filesystem file reading, and an error policy that
    /// pauses the Workflow on every `error:` response.
    pub fn new(name: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self::with_config(
            name,
            transport,
            Arc::new(DefaultDispatcherConfig),
            Arc::new(NoMacros),
            Arc::new(LocalFileReader),
        )
    }

    /// Build a controller with explicit config/macro/file-reading
    /// dependencies, for callers that persist settings or macros
    /// themselves.
    pub fn with_config(
        name: impl Into<String>,
        transport: Box<dyn Transport>,
        config: Arc<dyn DispatcherConfig>,
        macros: Arc<dyn MacroLookup>,
        files: Arc<dyn FileReader>,
    ) -> Self {
        let core = Arc::new(RwLock::new(ControllerCore::new()));
        let transport = Arc::new(AsyncMutex::new(transport));
        let events = Arc::new(EventBus::new());
        let dispatcher = Dispatcher::new(core.clone(), transport.clone(), config, macros, files, events.clone());
        Self {
            name: name.into(),
            core,
            transport,
            dispatcher,
            connection_state: Arc::new(RwLock::new(ControllerState::Disconnected)),
            listeners: Arc::new(RwLock::new(HashMap::new())),
            next_listener_id: AtomicU64::new(0),
            loop_handle: None,
            events,
        }
    }

    /// Access the Dispatcher directly, for callers that want the full
    /// command surface beyond `ControllerTrait`'s generic methods (macro
    /// run, watchdir load, lasertest, and so on).
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Subscribe to this controller's session fan-out: connection, machine,
    /// streaming, and error events published as the Dispatcher and
    /// controller loop act on this connection.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    fn set_state(&self, state: ControllerState) {
        *self.connection_state.write() = state;
    }

    async fn notify_state_changed(&self, state: ControllerState) {
        let listeners: Vec<_> = self.listeners.read().values().cloned().collect();
        for listener in listeners {
            listener.on_state_changed(state).await;
        }
    }
}

/// Translate one classified response into Sender/Feeder/Workflow state
/// changes, returning whatever lines should now be transmitted. Publishes
/// session fan-out events for the inbound-driven state changes; the
/// Dispatcher publishes the outbound-driven ones (`sender:load`,
/// `workflow:state` on explicit start/pause/resume/stop, ...).
fn dispatch_response(
    core: &mut ControllerCore,
    config: &dyn DispatcherConfig,
    events: &EventBus,
    event: ResponseEvent,
) -> Vec<String> {
    match event {
        ResponseEvent::Status => {
            if core.workflow.is_idle() && core.sender.state().sp.queue.is_empty() {
                if let Some(rx) = core.parser.snapshot().buf_rx {
                    core.sender.tune_buffer_size(rx as usize);
                }
            }
            if core.actions.on_status_reply() {
                let snap = core.parser.snapshot();
                let _ = events.publish(AppEvent::Communication(CommunicationEvent::DataReceived {
                    data: format!("status: {:?} WPos {:?}", snap.machine_state, snap.wpos),
                }));
            }
            Vec::new()
        }
        ResponseEvent::Ok => {
            // A `$G` query's `ok` acknowledges the query itself, never a
            // program/Feeder line — route it nowhere (spec.md §4.6).
            if core.actions.take_parser_state_ack() {
                return Vec::new();
            }
            ack_and_pump(core, events, None)
        }
        ResponseEvent::Error(message) => {
            // Annotate with the in-flight line's origin before it's acked
            // away: `> <line> (line=<n>)` then the raw error (spec.md §4.6).
            if *core.workflow.state() == WorkflowState::Running {
                if let Some((line_no, text)) = core.sender.peek_inflight() {
                    let _ = events.publish(AppEvent::Communication(CommunicationEvent::DataReceived {
                        data: format!("> {text} (line={line_no})"),
                    }));
                }
                let _ = events.publish(AppEvent::Communication(CommunicationEvent::DataReceived {
                    data: format!("error: {message}"),
                }));
            }
            if config.ignore_errors() {
                ack_and_pump(core, events, None)
            } else {
                ack_and_pump(core, events, Some(PauseReason::Error(message)))
            }
        }
        ResponseEvent::Alarm(message) => {
            core.alarm = true;
            core.feeder.reset();
            if *core.workflow.state() != WorkflowState::Idle {
                let (sender, feeder) = (&mut core.sender, &mut core.feeder);
                core.workflow.pause(sender, feeder, PauseReason::Error(message));
                let _ = events.publish(AppEvent::Streaming(StreamingEvent::WorkflowState {
                    state: "Paused".to_string(),
                }));
            }
            Vec::new()
        }
        ResponseEvent::ParserState(body) => {
            if core.actions.on_parser_state_reply() {
                let _ = events.publish(AppEvent::Communication(CommunicationEvent::DataReceived {
                    data: format!("[{body}]"),
                }));
            }
            Vec::new()
        }
        ResponseEvent::Version(id) => {
            core.firmware_id = Some(id);
            Vec::new()
        }
        ResponseEvent::Parameters(_) | ResponseEvent::Other(_) => Vec::new(),
    }
}

/// Route one acknowledgment (`ok` or a non-fatal `error:`) to whichever
/// pipeline owns it — the Sender while the Workflow is running and still
/// has lines in flight, the Feeder otherwise — then pump for more work.
/// `pause_reason`, if given, pauses the Workflow after the ack is applied.
///
/// A Sender that reports `end` does not stop the Workflow here: it only
/// arms end-of-program detection (`ActionState::mark_sender_finished`), and
/// the controller loop's 250ms tick is what actually stops the Workflow
/// once the machine has settled (spec.md §4.5 step 8).
fn ack_and_pump(
    core: &mut ControllerCore,
    events: &EventBus,
    pause_reason: Option<PauseReason>,
) -> Vec<String> {
    let sender_has_inflight = !core.sender.state().sp.queue.is_empty();
    let route_to_sender = *core.workflow.state() == WorkflowState::Running && sender_has_inflight;

    if route_to_sender {
        core.sender.ack();
        if core.sender.is_finished() {
            let wpos = core.parser.snapshot().wpos;
            core.actions.mark_sender_finished(Instant::now(), wpos);
        }
    } else if core.feeder.state().pending {
        core.feeder.ack();
    } else if sender_has_inflight {
        core.sender.ack();
    }

    if let Some(reason) = pause_reason {
        if *core.workflow.state() == WorkflowState::Running {
            let (sender, feeder) = (&mut core.sender, &mut core.feeder);
            core.workflow.pause(sender, feeder, reason);
            let _ = events.publish(AppEvent::Streaming(StreamingEvent::WorkflowState {
                state: "Paused".to_string(),
            }));
        } else {
            core.feeder.hold_for_workflow(match reason {
                PauseReason::Data(s) => s,
                PauseReason::Error(s) => s,
                PauseReason::Feedhold => "feedhold".to_string(),
            });
        }
        return Vec::new();
    }

    let mut lines = Vec::new();
    if *core.workflow.state() == WorkflowState::Running {
        let ControllerCore {
            sender,
            feeder,
            workflow,
            ctx,
            ..
        } = core;
        let mut paused = false;
        lines.extend(sender.pump(ctx, |sender, trigger| {
            let reason = match trigger {
                DetectedHold::M0 => Some("M0"),
                DetectedHold::M1 => Some("M1"),
                DetectedHold::M6 => Some("M6"),
                DetectedHold::Wait => None,
            };
            if let Some(reason) = reason {
                workflow.pause(sender, feeder, PauseReason::Data(reason.to_string()));
                paused = true;
            }
        }));
        if paused {
            let _ = events.publish(AppEvent::Streaming(StreamingEvent::WorkflowState {
                state: "Paused".to_string(),
            }));
        }
    }
    if core.feeder_owns_wire() && !core.feeder.state().pending {
        let ControllerCore { feeder, ctx, .. } = core;
        if let Some(line) = feeder.next(ctx) {
            lines.push(line);
        }
    }
    let sender_state = core.sender.state();
    let _ = events.publish(AppEvent::Streaming(StreamingEvent::SenderStatus {
        sent: sender_state.sent,
        received: sender_state.received,
        total: sender_state.total,
    }));
    let feeder_state = core.feeder.state();
    let _ = events.publish(AppEvent::Streaming(StreamingEvent::FeederStatus {
        queued: feeder_state.queue.len(),
        pending: feeder_state.pending,
    }));
    lines
}

#[async_trait]
impl ControllerTrait for SmoothiewareController {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_state(&self) -> ControllerState {
        *self.connection_state.read()
    }

    fn get_status(&self) -> ControllerStatus {
        match self.core.read().parser.snapshot().machine_state.as_deref() {
            Some("Run") => ControllerStatus::Run,
            Some("Hold") => ControllerStatus::Hold,
            Some("Alarm") => ControllerStatus::Alarm,
            _ if self.core.read().alarm => ControllerStatus::Alarm,
            _ => ControllerStatus::Idle,
        }
    }

    fn get_override_state(&self) -> OverrideState {
        let snapshot = self.core.read();
        let snap = snapshot.parser.snapshot();
        OverrideState {
            feed: snap.ov_f,
            rapid: 100,
            spindle: snap.ov_s,
        }
    }

    async fn connect(&mut self) -> Result<()> {
        self.set_state(ControllerState::Connecting);
        let _ = self.events.publish(AppEvent::Connection(ConnectionEvent::Connecting {
            port: self.name.clone(),
        }));
        {
            let mut transport = self.transport.lock().await;
            let opened = transport.open().await;
            if let Err(err) = opened {
                let _ = self.events.publish(AppEvent::Connection(ConnectionEvent::ConnectionFailed {
                    port: self.name.clone(),
                    error: err.to_string(),
                }));
                return Err(err);
            }
        }
        tokio::time::sleep(BOOTLOADER_SETTLE).await;
        {
            let mut transport = self.transport.lock().await;
            transport.write(b"version\n")?;
        }
        tokio::time::sleep(POST_VERSION_SETTLE).await;

        let rx = self.transport.lock().await.subscribe();
        let core = self.core.clone();
        let config = self.dispatcher.config().clone();
        let transport = self.transport.clone();
        let connection_state = self.connection_state.clone();
        let events = self.events.clone();

        self.loop_handle = Some(tokio::spawn(run_controller_loop(
            core.clone(),
            config,
            transport,
            rx,
            connection_state,
            events,
        )));

        self.set_state(ControllerState::Idle);
        self.notify_state_changed(ControllerState::Idle).await;
        let firmware = core.read().firmware_id.clone().unwrap_or_else(|| "unknown".to_string());
        let _ = self.events.publish(AppEvent::Connection(ConnectionEvent::Connected {
            port: self.name.clone(),
            firmware,
        }));
        let _ = self
            .events
            .publish(AppEvent::Connection(ConnectionEvent::StateChanged { connected: true }));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(handle) = self.loop_handle.take() {
            handle.abort();
        }
        {
            let mut transport = self.transport.lock().await;
            transport.close().await?;
        }
        self.set_state(ControllerState::Disconnected);
        self.notify_state_changed(ControllerState::Disconnected).await;
        let _ = self.events.publish(AppEvent::Connection(ConnectionEvent::Disconnected {
            port: self.name.clone(),
            reason: DisconnectReason::UserRequested,
        }));
        let _ = self
            .events
            .publish(AppEvent::Connection(ConnectionEvent::StateChanged { connected: false }));
        Ok(())
    }

    async fn send_command(&mut self, command: &str) -> Result<()> {
        self.dispatcher.feed(command.to_string()).await
    }

    async fn home(&mut self) -> Result<()> {
        self.dispatcher.homing().await
    }

    async fn reset(&mut self) -> Result<()> {
        self.dispatcher.reset().await
    }

    async fn clear_alarm(&mut self) -> Result<()> {
        self.dispatcher.unlock().await
    }

    async fn unlock(&mut self) -> Result<()> {
        self.dispatcher.unlock().await
    }

    async fn jog_start(&mut self, axis: &str, direction: f64, feed_rate: f64) -> Result<()> {
        let sign = if direction < 0.0 { "-" } else { "" };
        self.dispatcher
            .feed(format!("$J=G91 G21 {axis}{sign}1000 F{feed_rate}"))
            .await
    }

    async fn jog_stop(&mut self) -> Result<()> {
        let mut transport = self.transport.lock().await;
        transport.write(&[0x85])
    }

    async fn jog_incremental(&mut self, axis: &str, distance: f64, feed_rate: f64) -> Result<()> {
        self.dispatcher
            .feed(format!("$J=G91 G21 {axis}{distance} F{feed_rate}"))
            .await
    }

    async fn start_streaming(&mut self) -> Result<()> {
        self.dispatcher.sender_start().await
    }

    async fn pause_streaming(&mut self) -> Result<()> {
        self.dispatcher.sender_pause().await
    }

    async fn resume_streaming(&mut self) -> Result<()> {
        self.dispatcher.sender_resume().await
    }

    async fn cancel_streaming(&mut self) -> Result<()> {
        self.dispatcher.sender_stop().await
    }

    async fn probe_z(&mut self, feed_rate: f64) -> Result<PartialPosition> {
        self.dispatcher.feed(format!("G38.2 Z-10 F{feed_rate}")).await?;
        let wpos = self.core.read().parser.snapshot().wpos;
        Ok(PartialPosition::z_only(wpos.2 as f32))
    }

    async fn probe_x(&mut self, feed_rate: f64) -> Result<PartialPosition> {
        self.dispatcher.feed(format!("G38.2 X-10 F{feed_rate}")).await?;
        let wpos = self.core.read().parser.snapshot().wpos;
        Ok(PartialPosition::x_only(wpos.0 as f32))
    }

    async fn probe_y(&mut self, feed_rate: f64) -> Result<PartialPosition> {
        self.dispatcher.feed(format!("G38.2 Y-10 F{feed_rate}")).await?;
        let wpos = self.core.read().parser.snapshot().wpos;
        Ok(PartialPosition::y_only(wpos.1 as f32))
    }

    async fn set_feed_override(&mut self, percentage: u16) -> Result<()> {
        let current = self.core.read().parser.snapshot().ov_f as i32;
        self.dispatcher
            .override_feed(percentage as i32 - current)
            .await
    }

    async fn set_rapid_override(&mut self, percentage: u8) -> Result<()> {
        self.dispatcher.override_rapid(percentage as i32);
        Ok(())
    }

    async fn set_spindle_override(&mut self, percentage: u16) -> Result<()> {
        let current = self.core.read().parser.snapshot().ov_s as i32;
        self.dispatcher
            .override_spindle(percentage as i32 - current)
            .await
    }

    async fn set_work_zero(&mut self) -> Result<()> {
        self.dispatcher.feed("G10 L20 P0 X0 Y0 Z0".to_string()).await
    }

    async fn set_work_zero_axes(&mut self, axes: &str) -> Result<()> {
        let zeros: String = axes
            .chars()
            .map(|a| format!("{}0 ", a.to_ascii_uppercase()))
            .collect();
        self.dispatcher
            .feed(format!("G10 L20 P0 {}", zeros.trim_end()))
            .await
    }

    async fn go_to_work_zero(&mut self) -> Result<()> {
        self.dispatcher.feed("G0 X0 Y0 Z0".to_string()).await
    }

    async fn set_work_coordinate_system(&mut self, wcs: u8) -> Result<()> {
        let code = 53 + wcs.clamp(1, 6) as u32;
        self.dispatcher.feed(format!("G{code}")).await
    }

    async fn query_status(&mut self) -> Result<ControllerStatus> {
        self.core.write().actions.request_status_echo();
        let mut transport = self.transport.lock().await;
        transport.write(b"?")?;
        drop(transport);
        Ok(self.get_status())
    }

    async fn query_settings(&mut self) -> Result<()> {
        let mut transport = self.transport.lock().await;
        transport.write(b"$$\n")
    }

    async fn query_parser_state(&mut self) -> Result<()> {
        self.core.write().actions.request_parser_state_echo();
        let mut transport = self.transport.lock().await;
        transport.write(b"$G\n")
    }

    fn register_listener(
        &mut self,
        listener: Arc<dyn ControllerListener>,
    ) -> ControllerListenerHandle {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let handle = ControllerListenerHandle(format!("{}-{id}", self.name));
        self.listeners.write().insert(handle.clone(), listener);
        handle
    }

    fn unregister_listener(&mut self, handle: ControllerListenerHandle) {
        self.listeners.write().remove(&handle);
    }

    fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

/// Background task spawned by `connect()`: multiplexes the 250ms controller
/// tick against inbound transport bytes for the lifetime of the connection.
///
/// Each tick does three things (spec.md §4.5): query status if none is
/// outstanding, query parser state if idle and the 500ms throttle has
/// elapsed, and advance end-of-program detection if the Sender reported
/// `end` and is waiting for the machine to settle.
async fn run_controller_loop(
    core: Arc<RwLock<ControllerCore>>,
    config: Arc<dyn DispatcherConfig>,
    transport: Arc<AsyncMutex<Box<dyn Transport>>>,
    mut rx: tokio::sync::broadcast::Receiver<TransportEvent>,
    connection_state: Arc<RwLock<ControllerState>>,
    events: Arc<EventBus>,
) {
    let mut tick = tokio::time::interval(CONTROLLER_TICK);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                if *connection_state.read() == ControllerState::Disconnected {
                    continue;
                }
                let now = Instant::now();
                let (query_status, query_parser_state, finished) = {
                    let mut core = core.write();
                    let idle = core.workflow.is_idle();
                    let query_status = core.actions.should_query_status(now);
                    let query_parser_state = core.actions.should_query_parser_state(now, idle);
                    if query_status {
                        core.actions.mark_status_queried(now);
                    }
                    if query_parser_state {
                        core.actions.mark_parser_state_queried(now);
                    }
                    let finished = if core.actions.is_awaiting_end_of_program() {
                        let machine_idle = core.parser.snapshot().machine_state.as_deref() == Some("Idle");
                        let wpos = core.parser.snapshot().wpos;
                        if core.actions.tick_end_of_program(now, machine_idle, wpos) {
                            let (sender, feeder) = (&mut core.sender, &mut core.feeder);
                            core.workflow.stop(sender, feeder);
                            true
                        } else {
                            false
                        }
                    } else {
                        false
                    };
                    (query_status, query_parser_state, finished)
                };
                if finished {
                    let _ = events.publish(AppEvent::Streaming(StreamingEvent::WorkflowState {
                        state: "Idle".to_string(),
                    }));
                }
                let mut transport = transport.lock().await;
                if query_status && transport.write(b"?").is_err() {
                    continue;
                }
                if query_parser_state {
                    let _ = transport.write(b"$G\n");
                }
            }
            event = rx.recv() => {
                match event {
                    Ok(TransportEvent::Data(bytes)) => {
                        let parsed = core.write().parser.feed(&bytes);
                        let mut to_send = Vec::new();
                        {
                            let mut core = core.write();
                            for event in parsed {
                                to_send.extend(dispatch_response(&mut core, config.as_ref(), events.as_ref(), event));
                            }
                        }
                        if !to_send.is_empty() {
                            let mut transport = transport.lock().await;
                            for line in to_send {
                                let _ = transport.write(line.as_bytes());
                                let _ = transport.write(b"\n");
                            }
                        }
                    }
                    Ok(TransportEvent::Closed) => {
                        let already_disconnected =
                            *connection_state.read() == ControllerState::Disconnected;
                        *connection_state.write() = ControllerState::Disconnected;
                        if !already_disconnected {
                            let _ = events.publish(AppEvent::Connection(ConnectionEvent::Disconnected {
                                port: String::new(),
                                reason: DisconnectReason::ConnectionLost,
                            }));
                            let _ = events.publish(AppEvent::Connection(ConnectionEvent::StateChanged {
                                connected: false,
                            }));
                        }
                    }
                    Ok(TransportEvent::Opened) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::NoOpTransport;

    fn controller() -> SmoothiewareController {
        SmoothiewareController::new("test", Box::new(NoOpTransport::new("test")))
    }

    #[tokio::test]
    async fn connect_transitions_to_idle() {
        let mut c = controller();
        c.connect().await.unwrap();
        assert_eq!(c.get_state(), ControllerState::Idle);
        c.disconnect().await.unwrap();
        assert_eq!(c.get_state(), ControllerState::Disconnected);
    }

    #[tokio::test]
    async fn connect_publishes_connection_lifecycle_events() {
        let mut c = controller();
        let mut rx = c.events().receiver();
        c.connect().await.unwrap();

        let mut saw_connecting = false;
        let mut saw_connected = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                AppEvent::Connection(ConnectionEvent::Connecting { .. }) => saw_connecting = true,
                AppEvent::Connection(ConnectionEvent::Connected { .. }) => saw_connected = true,
                _ => {}
            }
        }
        assert!(saw_connecting);
        assert!(saw_connected);

        c.disconnect().await.unwrap();
        let mut saw_disconnected = false;
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::Connection(ConnectionEvent::Disconnected { .. }) = event {
                saw_disconnected = true;
            }
        }
        assert!(saw_disconnected);
    }

    #[tokio::test]
    async fn listener_registration_roundtrips() {
        use smoothie_core::core::ControllerListener;

        struct NoopListener;
        #[async_trait]
        impl ControllerListener for NoopListener {}

        let mut c = controller();
        let handle = c.register_listener(Arc::new(NoopListener));
        assert_eq!(c.listener_count(), 1);
        c.unregister_listener(handle);
        assert_eq!(c.listener_count(), 0);
    }

    #[tokio::test]
    async fn override_defaults_to_100_percent() {
        let c = controller();
        let state = c.get_override_state();
        assert_eq!(state.feed, 100);
        assert_eq!(state.spindle, 100);
    }

    #[test]
    fn running_error_echoes_inflight_line_before_raw_error() {
        let mut core = ControllerCore::new();
        core.sender.load(sender::Program::new("t", "G0 X1\nG0 X2\n"));
        core.workflow.start(&mut core.sender);
        let sent = core.sender.pump(&mut core.ctx, |_, _| {});
        assert!(!sent.is_empty());

        let events = EventBus::new();
        let mut rx = events.receiver();
        let _ = dispatch_response(
            &mut core,
            &DefaultDispatcherConfig,
            &events,
            ResponseEvent::Error("ALARM: Hard limit".to_string()),
        );

        let mut messages = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::Communication(CommunicationEvent::DataReceived { data }) = event {
                messages.push(data);
            }
        }
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], "> G0 X1 (line=1)");
        assert_eq!(messages[1], "error: ALARM: Hard limit");
    }

    #[test]
    fn idle_error_does_not_echo_inflight_line() {
        let mut core = ControllerCore::new();
        let events = EventBus::new();
        let mut rx = events.receiver();
        let _ = dispatch_response(
            &mut core,
            &DefaultDispatcherConfig,
            &events,
            ResponseEvent::Error("unsupported command".to_string()),
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn alarm_resets_feeder_and_pauses_running_workflow() {
        let mut core = ControllerCore::new();
        core.feeder.feed("G0 X1");
        core.sender.load(sender::Program::new("t", "G0 X1\n"));
        core.workflow.start(&mut core.sender);

        let events = EventBus::new();
        let _ = dispatch_response(
            &mut core,
            &DefaultDispatcherConfig,
            &events,
            ResponseEvent::Alarm("Hard limit -X".to_string()),
        );

        assert!(core.alarm);
        assert!(core.feeder.state().queue.is_empty());
        assert!(!core.feeder.state().pending);
        assert_eq!(*core.workflow.state(), WorkflowState::Paused);
    }
}

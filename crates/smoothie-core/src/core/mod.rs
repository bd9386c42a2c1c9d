//! Controller abstraction.
//!
//! Defines the `ControllerTrait` surface every firmware driver (Smoothieware,
//! and any future firmware) implements, plus the supporting listener type
//! controllers use to notify their host application of state changes.

pub mod listener;
pub mod registry;

pub use listener::{ControllerListener, ControllerListenerHandle};
pub use registry::{ControllerRegistry, SharedController};

use crate::data::{ControllerState, ControllerStatus, PartialPosition};
use crate::error::Result;
use async_trait::async_trait;

/// Feed/rapid/spindle override state reported by a controller.
///
/// This is the simple, controller-facing view: a firmware driver's internal
/// override bookkeeping (see `smoothie-comm`'s `firmware::override_manager`)
/// may carry more detail, but `ControllerTrait::get_override_state` always
/// reduces to this shape for callers that just want current percentages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverrideState {
    /// Feed rate override, percent.
    pub feed: u16,
    /// Rapid override, percent.
    pub rapid: u8,
    /// Spindle override, percent.
    pub spindle: u16,
}

impl Default for OverrideState {
    fn default() -> Self {
        Self {
            feed: 100,
            rapid: 100,
            spindle: 100,
        }
    }
}

/// Common surface every firmware controller driver implements.
///
/// A controller owns exactly one connection to a physical machine and
/// multiplexes the Sender, Feeder, Workflow and realtime-query logic behind
/// this trait so the embedding application never has to know which firmware
/// it is talking to.
#[async_trait]
pub trait ControllerTrait: Send + Sync {
    /// Human-readable controller name (usually the serial port or host:port).
    fn name(&self) -> &str;

    /// Current controller state machine state.
    fn get_state(&self) -> ControllerState;

    /// Current simplified operational status.
    fn get_status(&self) -> ControllerStatus;

    /// Current feed/rapid/spindle override percentages.
    fn get_override_state(&self) -> OverrideState;

    /// Open the connection and run firmware handshake/identification.
    async fn connect(&mut self) -> Result<()>;

    /// Close the connection.
    async fn disconnect(&mut self) -> Result<()>;

    /// Send an out-of-band command through the Feeder.
    async fn send_command(&mut self, command: &str) -> Result<()>;

    /// Run the homing cycle.
    async fn home(&mut self) -> Result<()>;

    /// Soft-reset the controller.
    async fn reset(&mut self) -> Result<()>;

    /// Clear an alarm/lock condition.
    async fn clear_alarm(&mut self) -> Result<()>;

    /// Unlock after an alarm (firmware-specific `$X`/`M999`-style command).
    async fn unlock(&mut self) -> Result<()>;

    /// Begin jogging continuously along the given feed/direction.
    async fn jog_start(&mut self, axis: &str, direction: f64, feed_rate: f64) -> Result<()>;

    /// Stop any in-progress jog.
    async fn jog_stop(&mut self) -> Result<()>;

    /// Jog a fixed distance along one axis.
    async fn jog_incremental(&mut self, axis: &str, distance: f64, feed_rate: f64) -> Result<()>;

    /// Load the current program into the Sender and begin streaming.
    async fn start_streaming(&mut self) -> Result<()>;

    /// Pause the Sender (workflow `running -> paused`).
    async fn pause_streaming(&mut self) -> Result<()>;

    /// Resume the Sender (workflow `paused -> running`).
    async fn resume_streaming(&mut self) -> Result<()>;

    /// Cancel streaming and reset the Sender.
    async fn cancel_streaming(&mut self) -> Result<()>;

    /// Probe towards -Z until the probe triggers or travel limit is reached.
    async fn probe_z(&mut self, feed_rate: f64) -> Result<PartialPosition>;

    /// Probe towards -X.
    async fn probe_x(&mut self, feed_rate: f64) -> Result<PartialPosition>;

    /// Probe towards -Y.
    async fn probe_y(&mut self, feed_rate: f64) -> Result<PartialPosition>;

    /// Set the feed rate override percentage.
    async fn set_feed_override(&mut self, percentage: u16) -> Result<()>;

    /// Set the rapid override percentage.
    async fn set_rapid_override(&mut self, percentage: u8) -> Result<()>;

    /// Set the spindle override percentage.
    async fn set_spindle_override(&mut self, percentage: u16) -> Result<()>;

    /// Zero the active work coordinate system at the current position.
    async fn set_work_zero(&mut self) -> Result<()>;

    /// Zero only the given axes (e.g. `"XY"`) at the current position.
    async fn set_work_zero_axes(&mut self, axes: &str) -> Result<()>;

    /// Rapid to the active work coordinate system's zero.
    async fn go_to_work_zero(&mut self) -> Result<()>;

    /// Switch the active work coordinate system (1-6 for G54-G59).
    async fn set_work_coordinate_system(&mut self, wcs: u8) -> Result<()>;

    /// Query a status report (realtime `?`).
    async fn query_status(&mut self) -> Result<ControllerStatus>;

    /// Query firmware settings (`$$`-style).
    async fn query_settings(&mut self) -> Result<()>;

    /// Query modal parser state (`$G`-style).
    async fn query_parser_state(&mut self) -> Result<()>;

    /// Register a listener for controller lifecycle events.
    fn register_listener(
        &mut self,
        listener: std::sync::Arc<dyn ControllerListener>,
    ) -> ControllerListenerHandle;

    /// Remove a previously registered listener.
    fn unregister_listener(&mut self, handle: ControllerListenerHandle);

    /// Number of currently registered listeners.
    fn listener_count(&self) -> usize;
}

/// Minimal `ControllerTrait` implementation used in tests and examples where
/// no real firmware link is needed.
#[derive(Debug, Default)]
pub struct SimpleController {
    name: String,
    state: ControllerState,
    status: ControllerStatus,
    overrides: OverrideState,
}

impl SimpleController {
    /// Create a disconnected simple controller with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ControllerState::Disconnected,
            status: ControllerStatus::Idle,
            overrides: OverrideState::default(),
        }
    }
}

#[async_trait]
impl ControllerTrait for SimpleController {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_state(&self) -> ControllerState {
        self.state
    }

    fn get_status(&self) -> ControllerStatus {
        self.status
    }

    fn get_override_state(&self) -> OverrideState {
        self.overrides
    }

    async fn connect(&mut self) -> Result<()> {
        self.state = ControllerState::Idle;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.state = ControllerState::Disconnected;
        Ok(())
    }

    async fn send_command(&mut self, _command: &str) -> Result<()> {
        Ok(())
    }

    async fn home(&mut self) -> Result<()> {
        Ok(())
    }

    async fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    async fn clear_alarm(&mut self) -> Result<()> {
        self.state = ControllerState::Idle;
        Ok(())
    }

    async fn unlock(&mut self) -> Result<()> {
        Ok(())
    }

    async fn jog_start(&mut self, _axis: &str, _direction: f64, _feed_rate: f64) -> Result<()> {
        Ok(())
    }

    async fn jog_stop(&mut self) -> Result<()> {
        Ok(())
    }

    async fn jog_incremental(&mut self, _axis: &str, _distance: f64, _feed_rate: f64) -> Result<()> {
        Ok(())
    }

    async fn start_streaming(&mut self) -> Result<()> {
        self.state = ControllerState::Run;
        Ok(())
    }

    async fn pause_streaming(&mut self) -> Result<()> {
        self.state = ControllerState::Hold;
        Ok(())
    }

    async fn resume_streaming(&mut self) -> Result<()> {
        self.state = ControllerState::Run;
        Ok(())
    }

    async fn cancel_streaming(&mut self) -> Result<()> {
        self.state = ControllerState::Idle;
        Ok(())
    }

    async fn probe_z(&mut self, _feed_rate: f64) -> Result<PartialPosition> {
        Ok(PartialPosition::z_only(0.0))
    }

    async fn probe_x(&mut self, _feed_rate: f64) -> Result<PartialPosition> {
        Ok(PartialPosition::x_only(0.0))
    }

    async fn probe_y(&mut self, _feed_rate: f64) -> Result<PartialPosition> {
        Ok(PartialPosition::y_only(0.0))
    }

    async fn set_feed_override(&mut self, percentage: u16) -> Result<()> {
        self.overrides.feed = percentage;
        Ok(())
    }

    async fn set_rapid_override(&mut self, percentage: u8) -> Result<()> {
        self.overrides.rapid = percentage;
        Ok(())
    }

    async fn set_spindle_override(&mut self, percentage: u16) -> Result<()> {
        self.overrides.spindle = percentage;
        Ok(())
    }

    async fn set_work_zero(&mut self) -> Result<()> {
        Ok(())
    }

    async fn set_work_zero_axes(&mut self, _axes: &str) -> Result<()> {
        Ok(())
    }

    async fn go_to_work_zero(&mut self) -> Result<()> {
        Ok(())
    }

    async fn set_work_coordinate_system(&mut self, _wcs: u8) -> Result<()> {
        Ok(())
    }

    async fn query_status(&mut self) -> Result<ControllerStatus> {
        Ok(self.status)
    }

    async fn query_settings(&mut self) -> Result<()> {
        Ok(())
    }

    async fn query_parser_state(&mut self) -> Result<()> {
        Ok(())
    }

    fn register_listener(
        &mut self,
        _listener: std::sync::Arc<dyn ControllerListener>,
    ) -> ControllerListenerHandle {
        ControllerListenerHandle(uuid::Uuid::new_v4().to_string())
    }

    fn unregister_listener(&mut self, _handle: ControllerListenerHandle) {}

    fn listener_count(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simple_controller_connect_sets_idle() {
        let mut c = SimpleController::new("test");
        assert_eq!(c.get_state(), ControllerState::Disconnected);
        c.connect().await.unwrap();
        assert_eq!(c.get_state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn simple_controller_streaming_transitions() {
        let mut c = SimpleController::new("test");
        c.connect().await.unwrap();
        c.start_streaming().await.unwrap();
        assert_eq!(c.get_state(), ControllerState::Run);
        c.pause_streaming().await.unwrap();
        assert_eq!(c.get_state(), ControllerState::Hold);
        c.resume_streaming().await.unwrap();
        assert_eq!(c.get_state(), ControllerState::Run);
        c.cancel_streaming().await.unwrap();
        assert_eq!(c.get_state(), ControllerState::Idle);
    }

    #[test]
    fn override_default_is_100_percent() {
        let o = OverrideState::default();
        assert_eq!(o.feed, 100);
        assert_eq!(o.rapid, 100);
        assert_eq!(o.spindle, 100);
    }
}

//! Data models for controller/connection state and partial position updates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A fully-specified machine or work position across all six axes.
///
/// Unlike `PartialPosition`, every axis carries a concrete value; this is
/// what the event bus reports for a position snapshot (`PositionUpdated`,
/// `ProbeTriggered`) rather than a selective update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X-axis position
    pub x: f32,
    /// Y-axis position
    pub y: f32,
    /// Z-axis position
    pub z: f32,
    /// A-axis position
    pub a: f32,
    /// B-axis position
    pub b: f32,
    /// C-axis position
    pub c: f32,
}

impl Position {
    /// Create a new position with X, Y, Z coordinates; A/B/C default to 0.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            a: 0.0,
            b: 0.0,
            c: 0.0,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// Partial position for updating only specific axes
///
/// Used when only some axes need to be updated. Each axis is represented as an `Option`
/// where `None` means "don't change this axis" and `Some(value)` means "set to value".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialPosition {
    /// X-axis position (if Some, update this axis)
    pub x: Option<f32>,
    /// Y-axis position (if Some, update this axis)
    pub y: Option<f32>,
    /// Z-axis position (if Some, update this axis)
    pub z: Option<f32>,
    /// A-axis position (if Some, update this axis)
    pub a: Option<f32>,
    /// B-axis position (if Some, update this axis)
    pub b: Option<f32>,
    /// C-axis position (if Some, update this axis)
    pub c: Option<f32>,
}

impl PartialPosition {
    /// Create a new empty partial position (all axes None)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a partial position with only X axis set
    pub fn x_only(x: f32) -> Self {
        Self {
            x: Some(x),
            ..Default::default()
        }
    }

    /// Create a partial position with only Y axis set
    pub fn y_only(y: f32) -> Self {
        Self {
            y: Some(y),
            ..Default::default()
        }
    }

    /// Create a partial position with only Z axis set
    pub fn z_only(z: f32) -> Self {
        Self {
            z: Some(z),
            ..Default::default()
        }
    }

    /// Check if this partial position is empty (no axes set)
    pub fn is_empty(&self) -> bool {
        self.x.is_none()
            && self.y.is_none()
            && self.z.is_none()
            && self.a.is_none()
            && self.b.is_none()
            && self.c.is_none()
    }
}

/// Machine/Controller state machine states
///
/// Represents the operational state of the CNC controller.
/// This enum tracks the full lifecycle of controller operation from
/// initial connection through execution and error states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerState {
    /// Not connected to any controller
    Disconnected,
    /// In the process of connecting to controller
    Connecting,
    /// Connected and idle, ready for commands
    Idle,
    /// Executing a G-code program
    Run,
    /// Program paused, awaiting resume
    Hold,
    /// Manual jog/movement mode
    Jog,
    /// Machine alarm state (requires manual intervention)
    Alarm,
    /// Check mode (dry-run without machine movement)
    Check,
    /// Safety door interlock triggered
    Door,
    /// Homing/homing cycle in progress
    Home,
    /// Low-power sleep/idle state
    Sleep,
}

impl ControllerState {
    /// Check if this state indicates the controller is connected
    pub fn is_connected(&self) -> bool {
        !matches!(
            self,
            ControllerState::Disconnected | ControllerState::Connecting
        )
    }

    /// Check if this state indicates the controller is ready for commands
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            ControllerState::Idle | ControllerState::Jog | ControllerState::Sleep
        )
    }

    /// Check if this state indicates an error condition
    pub fn is_error(&self) -> bool {
        matches!(self, ControllerState::Alarm)
    }

    /// Check if this state indicates active motion
    pub fn is_moving(&self) -> bool {
        matches!(
            self,
            ControllerState::Run | ControllerState::Jog | ControllerState::Home
        )
    }

    /// Check if a transition from this state to `target` is valid.
    ///
    /// Returns `true` for valid transitions according to the CNC state machine:
    /// - Disconnected can only go to Connecting
    /// - Connecting can go to Idle, Alarm, or back to Disconnected
    /// - Alarm requires explicit reset to Idle (or disconnect)
    /// - Any connected state can go to Disconnected (connection loss)
    pub fn can_transition_to(&self, target: ControllerState) -> bool {
        use ControllerState::*;
        if *self == target {
            return true;
        }
        match (self, target) {
            // Connection lifecycle
            (Disconnected, Connecting) => true,
            (Connecting, Idle | Alarm | Disconnected) => true,
            // Any connected state can disconnect
            (_, Disconnected) => true,
            // Cannot transition from Disconnected/Connecting to active states directly
            (Disconnected | Connecting, _) => false,
            // Alarm can only go to Idle (reset) or Disconnected
            (Alarm, Idle) => true,
            (Alarm, _) => false,
            // Idle can go to any active state
            (Idle, _) => true,
            // Run can hold, alarm, complete to idle, or door
            (Run, Hold | Alarm | Idle | Door | Check) => true,
            // Hold can resume to run, go idle, or alarm
            (Hold, Run | Idle | Alarm) => true,
            // Home completes to idle or alarm
            (Home, Idle | Alarm) => true,
            // Jog completes to idle or alarm
            (Jog, Idle | Alarm) => true,
            // Door can go back to hold or idle when cleared
            (Door, Hold | Idle | Alarm) => true,
            // Check can return to idle
            (Check, Idle | Alarm) => true,
            // Sleep wakes to idle
            (Sleep, Idle | Alarm) => true,
            // All other transitions are invalid
            _ => false,
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Idle => write!(f, "Idle"),
            Self::Run => write!(f, "Run"),
            Self::Hold => write!(f, "Hold"),
            Self::Jog => write!(f, "Jog"),
            Self::Alarm => write!(f, "Alarm"),
            Self::Check => write!(f, "Check"),
            Self::Door => write!(f, "Door"),
            Self::Home => write!(f, "Home"),
            Self::Sleep => write!(f, "Sleep"),
        }
    }
}

/// Current status indicator of the controller
///
/// Simple enum representing immediate operational status.
/// Used for UI display and basic state tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerStatus {
    /// Idle and ready for commands
    Idle,
    /// Processing a command
    Run,
    /// Paused during execution
    Hold,
    /// Alarm condition
    Alarm,
    /// Error state
    Error,
}

impl std::fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Run => write!(f, "Run"),
            Self::Hold => write!(f, "Hold"),
            Self::Alarm => write!(f, "Alarm"),
            Self::Error => write!(f, "Error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_new_defaults_extra_axes_to_zero() {
        let p = Position::new(1.0, 2.0, 3.0);
        assert_eq!((p.x, p.y, p.z), (1.0, 2.0, 3.0));
        assert_eq!((p.a, p.b, p.c), (0.0, 0.0, 0.0));
    }

    #[test]
    fn partial_position_axis_helpers() {
        assert!(PartialPosition::new().is_empty());
        assert!(!PartialPosition::x_only(1.0).is_empty());
    }

    #[test]
    fn controller_state_transitions() {
        assert!(ControllerState::Disconnected.can_transition_to(ControllerState::Connecting));
        assert!(!ControllerState::Disconnected.can_transition_to(ControllerState::Run));
        assert!(ControllerState::Alarm.can_transition_to(ControllerState::Idle));
        assert!(!ControllerState::Alarm.can_transition_to(ControllerState::Run));
    }
}

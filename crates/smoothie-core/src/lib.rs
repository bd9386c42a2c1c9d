//! # smoothie-core
//!
//! Core types, traits, and utilities shared by the Smoothieware controller
//! driver. Provides the controller abstraction (`ControllerTrait`), machine
//! state/position data model, the event bus, and the error hierarchy that
//! `smoothie-comm` builds its firmware-specific logic on top of.

pub mod constants;
pub mod core;
pub mod data;
pub mod error;
pub mod event_bus;

pub use core::{
    ControllerListener, ControllerListenerHandle, ControllerRegistry, ControllerTrait,
    OverrideState, SharedController, SimpleController,
};

pub use data::{ControllerState, ControllerStatus, PartialPosition, Position};

pub use error::{ConnectionError, ControllerError, Error, FirmwareError, GcodeError, Result};

// Re-export event bus for convenience
pub use event_bus::{AppEvent, EventBus, EventBusConfig, EventCategory, EventFilter, SubscriptionId};

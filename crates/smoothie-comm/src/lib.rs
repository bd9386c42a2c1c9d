#![allow(dead_code)]
//! # smoothie-comm
//!
//! Transport (Serial/TCP) and Smoothieware firmware driver for the
//! Smoothieware controller driver crate. Owns the Sender/Feeder/Workflow
//! state machines, the line preprocessor, the response parser, and the
//! command dispatcher that together stream a loaded G-code program to a
//! Smoothieware board under character-counting flow control.

pub mod communication;
pub mod firmware;

pub use communication::{
    serial::{list_ports, SerialPortInfo},
    tcp::TcpConnectionInfo,
    ConnectionDriver, ConnectionParams, NoOpTransport, SerialParity, SerialTransport, Transport,
    TransportEvent,
};

pub use firmware::{
    ControllerCore, DefaultDispatcherConfig, DetectedHold, Dispatcher, DispatcherConfig, Feeder,
    FeederLine, FeederState, FileReader, GcodeContext, LocalFileReader, MacroLookup,
    MachineSnapshot, ModalState, NoMacros, PauseReason, Preprocessor, Program, QueuedLine,
    ResponseEvent, Sender, SenderState, SendingProtocol, SmoothiewareController,
    SmoothiewareResponseParser, Workflow, WorkflowEvent, WorkflowState,
};

//! Firmware-specific logic for the Smoothieware CNC controller driver.

pub mod smoothieware;

pub use smoothieware::{
    dispatcher::{
        ControllerCore, DefaultDispatcherConfig, Dispatcher, DispatcherConfig, FileReader,
        LocalFileReader, MacroLookup, NoMacros,
    },
    feeder::{Feeder, FeederLine, FeederState},
    preprocessor::{DetectedHold, GcodeContext, Preprocessor},
    response_parser::{MachineSnapshot, ModalState, ResponseEvent, SmoothiewareResponseParser},
    sender::{Program, QueuedLine, Sender, SenderState, SendingProtocol},
    workflow::{PauseReason, Workflow, WorkflowEvent, WorkflowState},
    SmoothiewareController,
};

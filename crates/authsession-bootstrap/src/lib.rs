//! Session bootstrap for client applications.
//!
//! Provides:
//! - `BootstrapController` - the startup state machine
//! - `BootstrapRun` - one cancellable lookup attempt
//! - `SessionFacade` - the public session surface

pub mod controller;
pub mod facade;
pub mod run;

pub use controller::{BootstrapController, BootstrapError, BootstrapPhase};
pub use facade::SessionFacade;
pub use run::{BootstrapRun, Lookup, RunId};

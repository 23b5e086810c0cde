//! Builder API for declaring states and assembling machines.
//!
//! [`StateConfiguration`] collects the declarations for one state;
//! [`StateMachineBuilder`] gathers them for a whole machine and validates
//! everything in `build()`.

mod configuration;
mod error;
mod machine;

pub use configuration::StateConfiguration;
pub use error::ConfigurationError;
pub use machine::StateMachineBuilder;

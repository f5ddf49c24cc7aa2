//! Builder API for ergonomic machine construction.
//!
//! This module provides the fluent [`MachineBuilder`], construction options,
//! and the [`state_table!`](crate::state_table) macro for writing state
//! tables with minimal boilerplate.

pub mod error;
pub mod machine;
pub mod macros;
pub mod options;

pub use error::BuildError;
pub use machine::MachineBuilder;
pub use options::{ApiMember, MachineConfig, MachineOptions};

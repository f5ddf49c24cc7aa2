//! Declarative side of a machine.
//!
//! - State tables and their per-state definitions
//! - The compiler deriving lookup tables from a table and a target
//! - Conventional handler and event names
//!
//! Nothing in this module runs hooks; it only describes and resolves them.

mod compiled;
mod definition;
mod naming;

pub use compiled::CompiledDefinition;
pub use definition::{CallbackSpec, DataMap, DataSpec, StateDefinition, StateTable};
pub use naming::{before_hook_label, pascal_case, route_event, route_label, state_label};

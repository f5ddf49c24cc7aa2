//! Definition lint built on Stillwater's `Validation`.
//!
//! Instead of stopping at the first problem, every check runs and all
//! problems are reported together.
//!
//! # Example
//!
//! ```rust
//! use deferred_fsm::core::{StateDefinition, StateTable};
//! use deferred_fsm::effects::Bindings;
//! use deferred_fsm::validation::{problems, validate};
//!
//! struct Door;
//!
//! let table = StateTable::<Door>::new()
//!     .state("open", StateDefinition::new().transitions(["shut"]).initial())
//!     .state("shut", StateDefinition::new().transitions(["open", "gone"]));
//!
//! let result = validate(&table, &Bindings::new(), false);
//! assert_eq!(problems(&result).len(), 1);
//! ```

pub mod rules;
pub mod violations;

pub use rules::{problems, validate};
pub use violations::DefinitionError;

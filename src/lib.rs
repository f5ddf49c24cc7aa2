//! Deferred FSM: a finite state machine layered over an existing object.
//!
//! A machine governs which of a target's methods may run in its current
//! state and moves the target between states through asynchronous
//! transitions. Every hook may defer its answer: transitions and gated
//! method calls resolve only after their whole hook chain has settled.
//!
//! # Core Concepts
//!
//! - **State table**: ordered states, each listing allowed methods,
//!   reachable states, enter/exit hooks and optional data
//! - **Bindings**: the target's explicit callable surface, from gated
//!   methods to named callbacks and apply handlers
//! - **Method gate**: a gated method fails with "not allowed" unless the
//!   current state lists it
//! - **Transitions**: one at a time, rolled back on failure, with forced
//!   requests queued while another is in flight
//!
//! # Example
//!
//! ```rust
//! use deferred_fsm::builder::MachineBuilder;
//! use deferred_fsm::effects::Bindings;
//! use deferred_fsm::state_table;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct Player;
//!
//! let player = MachineBuilder::new(Arc::new(Player))
//!     .states(state_table! {
//!         "stopped" => { initial, methods: ["play"] },
//!         "playing" => { methods: ["stop"], trigger: "play" },
//!     })
//!     .bindings(
//!         Bindings::new()
//!             .method("play", |_, _| async { Ok(json!("playing")) })
//!             .method("stop", |_, _| async { Ok(json!("stopped")) }),
//!     )
//!     .build()
//!     .unwrap();
//!
//! futures::executor::block_on(async {
//!     assert_eq!(player.call("play", vec![]).await.unwrap(), json!("playing"));
//!     assert!(player.has_state("playing"));
//!     assert!(player.call("play", vec![]).await.is_err());
//! });
//! ```

pub mod builder;
pub mod core;
pub mod effects;
pub mod validation;

// Re-export commonly used types
pub use builder::{ApiMember, BuildError, MachineBuilder, MachineOptions};
pub use crate::core::{StateDefinition, StateTable};
pub use effects::{Bindings, EventBus, FsmError, FsmResult, StateMachine, TransitionInfo};

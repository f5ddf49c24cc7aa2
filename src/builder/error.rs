//! Build errors for state machines.

use crate::validation::DefinitionError;
use thiserror::Error;

/// Errors that can occur when building a machine in strict mode.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid state definition: {}", join(.0))]
    InvalidDefinition(Vec<DefinitionError>),
}

fn join(problems: &[DefinitionError]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

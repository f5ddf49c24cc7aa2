//! Definition checks, accumulated with `Validation`.

use crate::core::{CallbackSpec, DataSpec, StateTable};
use crate::effects::Bindings;
use crate::validation::violations::DefinitionError;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<DefinitionError>>;

/// Check `table` against the target's `bindings`, collecting ALL problems.
///
/// Construction never requires a clean report: unresolved specs are dropped
/// and unimplemented methods are simply not gated. This is a lint for tables
/// that are meant to be exact.
pub fn validate<T>(table: &StateTable<T>, bindings: &Bindings<T>, gate_all_methods: bool) -> Check {
    let mut checks: Vec<Check> = Vec::new();

    let initial: Vec<String> = table
        .iter()
        .filter(|(_, definition)| definition.initial)
        .map(|(name, _)| name.to_string())
        .collect();
    checks.push(if initial.len() > 1 {
        Validation::fail(DefinitionError::MultipleInitialStates { states: initial })
    } else {
        Validation::success(())
    });

    let mut triggers: Vec<(&str, &str)> = Vec::new();

    for (name, definition) in table.iter() {
        for to in definition.transitions.iter().flatten() {
            checks.push(if table.contains(to) {
                Validation::success(())
            } else {
                Validation::fail(DefinitionError::UnknownTransitionTarget {
                    from: name.to_string(),
                    to: to.clone(),
                })
            });
        }

        for method in definition.methods.iter().flatten() {
            checks.push(if bindings.has_method(method) {
                Validation::success(())
            } else {
                Validation::fail(DefinitionError::UnimplementedMethod {
                    state: name.to_string(),
                    method: method.clone(),
                })
            });
        }

        for (hook, specs) in [("enter", &definition.enter), ("exit", &definition.exit)] {
            for spec in specs {
                checks.push(match spec {
                    CallbackSpec::Named(callback) if !bindings.has_callback(callback) => {
                        Validation::fail(DefinitionError::UnresolvedCallback {
                            state: name.to_string(),
                            hook,
                            name: callback.clone(),
                        })
                    }
                    _ => Validation::success(()),
                });
            }
        }

        if let Some(DataSpec::Method(provider)) = &definition.data {
            checks.push(if bindings.has_data_provider(provider) {
                Validation::success(())
            } else {
                Validation::fail(DefinitionError::UnresolvedDataProvider {
                    state: name.to_string(),
                    name: provider.clone(),
                })
            });
        }

        if let Some(trigger) = &definition.trigger {
            if let Some((_, first)) = triggers.iter().find(|(seen, _)| *seen == trigger.as_str()) {
                checks.push(Validation::fail(DefinitionError::DuplicateTrigger {
                    trigger: trigger.clone(),
                    first: first.to_string(),
                    second: name.to_string(),
                }));
            }
            triggers.push((trigger.as_str(), name));

            let listed = table
                .iter()
                .any(|(_, other)| other.methods.iter().flatten().any(|m| m == trigger));
            let gated = bindings.has_method(trigger) && (gate_all_methods || listed);
            checks.push(if gated {
                Validation::success(())
            } else {
                Validation::fail(DefinitionError::TriggerNotGated {
                    state: name.to_string(),
                    trigger: trigger.clone(),
                })
            });
        }
    }

    Validation::all_vec(checks).map(|_| ())
}

/// Flatten a validation result into a plain list of problems.
pub fn problems(result: &Check) -> Vec<DefinitionError> {
    match result {
        Validation::Success(_) => Vec::new(),
        Validation::Failure(errors) => errors.iter().cloned().collect(),
    }
}

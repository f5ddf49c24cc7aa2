//! End-to-end scenarios driving machines through their public API.

use deferred_fsm::builder::{ApiMember, MachineBuilder, MachineOptions};
use deferred_fsm::core::{DataMap, StateDefinition, StateTable};
use deferred_fsm::effects::{
    Bindings, EventBus, EventPayload, FsmError, StateMachine, SubjectHooks, TransitionOutcome,
};
use deferred_fsm::state_table;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

type Log = Arc<Mutex<Vec<String>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn push(log: &Log, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[derive(Default)]
struct Door {
    calls: Mutex<Vec<String>>,
}

impl Door {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn door_states() -> StateTable<Door> {
    state_table! {
        "open" => { methods: ["walkThrough", "closeDoor"], transitions: ["shut"] },
        "shut" => { methods: ["lock", "openDoor", "closeDoor"], transitions: ["open", "locked", "destroyed"] },
        "locked" => { methods: ["unlock", "kickDown"], transitions: ["shut", "destroyed"] },
        "destroyed" => {},
    }
}

fn door_bindings(emitter: &EventBus) -> Bindings<Door> {
    let mut bindings = Bindings::new();
    for method in ["walkThrough", "lock", "openDoor", "unlock", "kickDown"] {
        bindings = bindings.method(method, move |door: Arc<Door>, _| async move {
            door.calls.lock().unwrap().push(method.to_string());
            Ok(Value::Null)
        });
    }
    bindings
        .method("closeDoor", |door: Arc<Door>, _| async move {
            door.calls.lock().unwrap().push("closeDoor".to_string());
            Ok(json!(42))
        })
        .emitter(emitter.clone())
}

fn door(states: StateTable<Door>) -> (Arc<Door>, StateMachine<Door>, Log) {
    let emitter = EventBus::new();
    let events = log();
    let sink = Arc::clone(&events);
    emitter.on("all", move |name, payload| {
        let detail = match payload {
            EventPayload::Exec { method, .. } => method.clone(),
            EventPayload::Transition(record) => record.to.clone(),
        };
        push(&sink, format!("{name} {detail}"));
    });

    let target = Arc::new(Door::default());
    let machine = StateMachine::new(
        Arc::clone(&target),
        states,
        door_bindings(&emitter),
        MachineOptions::default(),
    );
    (target, machine, events)
}

#[tokio::test]
async fn door_gates_methods_by_state() {
    let (target, machine, _) = door(door_states());

    machine.transition("open", false).await.unwrap();

    let error = machine.call("openDoor", vec![]).await.unwrap_err();
    assert!(error.is_method_not_allowed());
    assert_eq!(error.to_string(), "Method \"openDoor\" not allowed.");

    assert_eq!(machine.call("closeDoor", vec![]).await.unwrap(), json!(42));
    assert_eq!(target.calls(), ["closeDoor"]);
}

#[tokio::test]
async fn methods_are_rejected_before_the_first_transition() {
    let (target, machine, events) = door(door_states());

    assert_eq!(machine.state(), None);
    let error = machine.call("closeDoor", vec![]).await.unwrap_err();

    assert!(error.is_method_not_allowed());
    assert!(target.calls().is_empty());
    assert!(entries(&events).is_empty());
}

#[tokio::test]
async fn allow_list_and_force() {
    let (_, machine, _) = door(door_states());
    machine.transition("open", false).await.unwrap();

    let error = machine.transition("locked", false).await.unwrap_err();
    assert!(error.is_transition_not_allowed());
    assert_eq!(error.to_string(), "Transition \"locked\" not allowed.");

    assert!(machine.transition("open", true).await.is_err());
    assert!(machine.transition("cellar", true).await.is_err());
    assert!(machine.set_state("locked", true).await.is_ok());
    assert!(machine.has_state("locked"));
}

#[tokio::test]
async fn global_hooks_then_exit_then_enter() {
    let order = log();
    let (exit_log, enter_log) = (Arc::clone(&order), Arc::clone(&order));
    let states = door_states()
        .state(
            "open",
            StateDefinition::new().transitions(["shut"]).exit_fn(move |info| {
                push(&exit_log, format!("exit {}", info.from.as_deref().unwrap_or("-")));
                async { Ok(()) }
            }),
        )
        .state(
            "shut",
            StateDefinition::new().transitions(["open"]).enter_fn(move |info| {
                push(&enter_log, format!("enter {}", info.to));
                async { Ok(()) }
            }),
        );
    let (_, machine, events) = door(states);

    let seen = Arc::clone(&order);
    machine.on_transition(move |fsm, info| {
        push(&seen, format!("transition {} (now {:?})", info.to, fsm.state()));
        async { Ok(()) }
    });

    machine.transition("open", false).await.unwrap();
    order.lock().unwrap().clear();
    machine.transition("shut", false).await.unwrap();

    assert_eq!(
        entries(&order),
        ["transition shut (now Some(\"shut\"))", "exit open", "enter shut"]
    );
    assert_eq!(entries(&events), ["transition open", "transition shut"]);
}

#[tokio::test]
async fn prepended_transition_hooks_run_first() {
    let (_, machine, _) = door(door_states());
    let order = log();
    let (late, early) = (Arc::clone(&order), Arc::clone(&order));

    machine.on_transition(move |_, _| {
        push(&late, "registered first");
        async { Ok(()) }
    });
    machine.on_transition_prepend(move |_, _| {
        push(&early, "prepended");
        async { Ok(()) }
    });
    machine.transition("shut", false).await.unwrap();

    assert_eq!(entries(&order), ["prepended", "registered first"]);
}

fn held_door() -> (StateMachine<Door>, Arc<Notify>) {
    let gate = Arc::new(Notify::new());
    let wait = Arc::clone(&gate);
    let states = door_states().state(
        "shut",
        StateDefinition::new()
            .transitions(["open", "locked"])
            .enter_fn(move |_| {
                let wait = Arc::clone(&wait);
                async move {
                    wait.notified().await;
                    Ok(())
                }
            }),
    );
    let (_, machine, _) = door(states);
    (machine, gate)
}

async fn until_in_flight(machine: &StateMachine<Door>) {
    while !machine.in_transition() {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn non_forced_request_is_rejected_while_in_flight() {
    let (machine, gate) = held_door();
    machine.transition("open", false).await.unwrap();

    let running = tokio::spawn(machine.transition("shut", false));
    until_in_flight(&machine).await;

    assert_eq!(machine.state().as_deref(), Some("shut"));
    let error = machine.transition("open", false).await.unwrap_err();
    assert!(error.is_transition_not_allowed());

    gate.notify_one();
    let outcome = running.await.unwrap().unwrap();

    assert!(!outcome.is_queued());
    assert_eq!(outcome.info().map(|info| info.to.as_str()), Some("shut"));
    assert_eq!(machine.state().as_deref(), Some("shut"));
    assert!(!machine.in_transition());
}

#[tokio::test]
async fn forced_request_is_queued_until_the_current_one_settles() {
    let (machine, gate) = held_door();
    machine.transition("open", false).await.unwrap();

    let running = tokio::spawn(machine.transition("shut", false));
    until_in_flight(&machine).await;

    let queued = machine.transition("locked", true).await.unwrap();
    assert!(matches!(queued, TransitionOutcome::Queued(ref name) if name == "locked"));
    assert_eq!(machine.state().as_deref(), Some("shut"));

    gate.notify_one();
    running.await.unwrap().unwrap();

    assert_eq!(machine.state().as_deref(), Some("locked"));
}

#[tokio::test]
async fn rejected_request_leaves_the_queued_target_in_place() {
    let (machine, gate) = held_door();
    machine.transition("open", false).await.unwrap();

    let running = tokio::spawn(machine.transition("shut", false));
    until_in_flight(&machine).await;

    assert!(machine.transition("locked", true).await.unwrap().is_queued());
    let error = machine.transition("open", false).await.unwrap_err();
    assert!(matches!(error, FsmError::TransitionNotAllowed(ref name) if name == "open"));

    gate.notify_one();
    running.await.unwrap().unwrap();

    assert_eq!(machine.state().as_deref(), Some("locked"));
    assert!(!machine.in_transition());
}

#[tokio::test]
async fn dropped_transition_releases_the_machine() {
    let (machine, _gate) = held_door();
    machine.transition("open", false).await.unwrap();

    let held = machine.clone();
    let timed_out = tokio::time::timeout(std::time::Duration::from_millis(20), async move {
        let running = held.transition("shut", false);
        let queued = held.transition("locked", true);
        let (outcome, _) = futures::join!(running, queued);
        outcome
    })
    .await;

    assert!(timed_out.is_err());
    assert!(!machine.in_transition());
    assert_eq!(machine.state().as_deref(), Some("open"));

    machine.transition("destroyed", true).await.unwrap();
    assert_eq!(machine.state().as_deref(), Some("destroyed"));
}

#[tokio::test]
async fn failed_enter_hook_rolls_back_with_the_original_error() {
    let states = door_states().state(
        "shut",
        StateDefinition::new()
            .transitions(["open"])
            .enter_fn(|_| async { Err(FsmError::message("jammed")) }),
    );
    let (_, machine, events) = door(states);

    let failures = log();
    let sink = Arc::clone(&failures);
    machine.on_failure(move |_, info| {
        push(&sink, format!("{:?} -> {}", info.from, info.to));
        async { Ok(()) }
    });

    machine.transition("open", false).await.unwrap();
    let error = machine.transition("shut", false).await.unwrap_err();

    assert_eq!(error.to_string(), "jammed");
    assert_eq!(machine.state().as_deref(), Some("open"));
    assert!(!machine.in_transition());
    assert_eq!(entries(&failures), ["Some(\"open\") -> shut"]);
    assert_eq!(
        entries(&events),
        ["transition open", "transition:fail shut", "transition open"]
    );
}

#[tokio::test]
async fn reasonless_rejection_reports_transition_not_allowed() {
    let states = door_states().state(
        "shut",
        StateDefinition::new()
            .transitions(["open"])
            .enter_fn(|_| async { Err(FsmError::Rejected) }),
    );
    let (_, machine, _) = door(states);
    machine.transition("open", false).await.unwrap();

    let error = machine.transition("shut", false).await.unwrap_err();

    assert!(matches!(error, FsmError::TransitionNotAllowed(ref name) if name == "shut"));
}

#[tokio::test]
async fn failed_first_transition_stays_at_its_target() {
    let states = door_states().state(
        "open",
        StateDefinition::new()
            .transitions(["shut"])
            .enter_fn(|_| async { Err(FsmError::message("stuck")) }),
    );
    let (_, machine, _) = door(states);

    assert!(machine.transition("open", false).await.is_err());

    assert_eq!(machine.state().as_deref(), Some("open"));
    assert!(!machine.in_transition());
}

#[tokio::test]
async fn rollback_needs_a_way_back() {
    let states = door_states()
        .state("open", StateDefinition::new().transitions(["shut"]))
        .state(
            "shut",
            StateDefinition::new()
                .transitions(["locked"])
                .enter_fn(|_| async { Err(FsmError::message("jammed")) }),
        );
    let (_, machine, _) = door(states);
    machine.transition("open", false).await.unwrap();

    assert!(machine.transition("shut", false).await.is_err());

    assert_eq!(machine.state().as_deref(), Some("shut"));
}

#[tokio::test]
async fn trigger_transition_settles_before_the_method_result() {
    let (target, machine, events) = door(door_states());
    let order = log();
    let seen = Arc::clone(&order);
    machine.on_transition(move |_, info| {
        let calls = info.context.calls();
        push(&seen, format!("to {} after {:?}", info.to, calls));
        async { Ok(()) }
    });

    let states = door_states().state(
        "shut",
        StateDefinition::new()
            .methods(["lock", "openDoor", "closeDoor"])
            .transitions(["open"])
            .trigger("closeDoor"),
    );
    let (triggered_target, triggered, _) = door(states);
    let sink = Arc::clone(&order);
    triggered.on_transition(move |_, info| {
        push(&sink, format!("trigger to {} after {:?}", info.to, info.context.calls()));
        async { Ok(()) }
    });

    triggered.transition("open", false).await.unwrap();
    assert_eq!(triggered.call("closeDoor", vec![]).await.unwrap(), json!(42));

    assert_eq!(triggered.state().as_deref(), Some("shut"));
    assert_eq!(
        entries(&order),
        ["trigger to open after []", "trigger to shut after []"]
    );
    assert_eq!(triggered_target.calls(), ["closeDoor"]);

    machine.transition("open", false).await.unwrap();
    machine.call("closeDoor", vec![]).await.unwrap();
    assert_eq!(machine.state().as_deref(), Some("open"));
    assert_eq!(target.calls(), ["closeDoor"]);
    assert_eq!(entries(&events), ["transition open", "exec closeDoor"]);
}

#[tokio::test]
async fn failed_trigger_blocks_the_method() {
    let states = door_states()
        .state("open", StateDefinition::new().methods(["closeDoor"]).transitions(["shut"]))
        .state(
            "shut",
            StateDefinition::new()
                .transitions(["open"])
                .trigger("closeDoor")
                .enter_fn(|_| async { Err(FsmError::message("frame bent")) }),
        );
    let (target, machine, events) = door(states);
    machine.transition("open", false).await.unwrap();

    let error = machine.call("closeDoor", vec![]).await.unwrap_err();

    assert_eq!(error.to_string(), "frame bent");
    assert!(target.calls().is_empty());
    assert_eq!(machine.state().as_deref(), Some("open"));
    assert_eq!(
        entries(&events),
        [
            "transition open",
            "transition:fail shut",
            "transition open",
            "exec:fail closeDoor"
        ]
    );
}

struct Player;

#[tokio::test]
async fn proxy_player_applies_handlers_and_keeps_events_apart() {
    let handlers = log();
    let (route, state, complete) = (Arc::clone(&handlers), Arc::clone(&handlers), Arc::clone(&handlers));
    let target_events = EventBus::new();
    let target_log = log();
    let target_sink = Arc::clone(&target_log);
    target_events.on("all", move |name, _| push(&target_sink, name));

    let bindings = Bindings::<Player>::new()
        .method("play", |_, _| async { Ok(json!("playing")) })
        .method("stop", |_, _| async { Ok(json!("stopped")) })
        .on_route("stopped", "playing", move |_| {
            push(&route, "onStoppedToPlaying");
            async { Ok(()) }
        })
        .on_state("playing", move |_| {
            push(&state, "onPlaying");
            async { Ok(()) }
        })
        .on_transition_complete(move |info| {
            push(&complete, format!("onTransitionComplete {}", info.to));
            async { Ok(()) }
        })
        .emitter(target_events.clone());

    let before = log();
    let before_sink = Arc::clone(&before);
    let player = MachineBuilder::new(Arc::new(Player))
        .states(state_table! {
            "stopped" => { initial, methods: ["play"], transitions: ["playing"] },
            "playing" => { methods: ["stop"], transitions: ["stopped"], trigger: "play" },
        })
        .bindings(bindings)
        .proxy()
        .apply()
        .proxy_hooks(SubjectHooks::new().on_before("play", move |call| {
            push(&before_sink, format!("onBeforePlay {:?}", call.machine.state()));
            async { Ok(()) }
        }))
        .build()
        .unwrap();

    let proxy_log = log();
    let proxy_sink = Arc::clone(&proxy_log);
    player
        .events()
        .unwrap()
        .on("all", move |name, _| push(&proxy_sink, name));

    assert_eq!(player.call("play", vec![]).await.unwrap(), json!("playing"));

    assert!(player.has_state("playing"));
    assert_eq!(entries(&before), ["onBeforePlay Some(\"stopped\")"]);
    assert_eq!(
        entries(&handlers),
        ["onStoppedToPlaying", "onPlaying", "onTransitionComplete playing"]
    );
    assert_eq!(entries(&target_log), ["stopped:to:playing", "playing", "transition"]);
    assert_eq!(entries(&proxy_log), ["transition", "exec"]);
}

fn generic_handler_calls(options: MachineOptions, with_complete: bool) -> Vec<String> {
    let calls = log();
    let (generic, complete) = (Arc::clone(&calls), Arc::clone(&calls));
    let mut bindings = Bindings::<Player>::new().on_transition(move |_| {
        push(&generic, "onTransition");
        async { Ok(()) }
    });
    if with_complete {
        bindings = bindings.on_transition_complete(move |_| {
            push(&complete, "onTransitionComplete");
            async { Ok(()) }
        });
    }

    let player = StateMachine::new(
        Arc::new(Player),
        state_table! { "stopped" => {}, "playing" => {} },
        bindings,
        options,
    );
    futures::executor::block_on(player.transition("playing", false)).unwrap();
    entries(&calls)
}

#[test]
fn generic_target_handler_dispatch() {
    let apply = MachineOptions {
        apply: true,
        ..MachineOptions::default()
    };
    let omitted = MachineOptions {
        omit: vec![ApiMember::OnTransition],
        ..apply.clone()
    };
    let proxied = MachineOptions {
        proxy: true,
        ..apply.clone()
    };

    assert!(generic_handler_calls(apply.clone(), false).is_empty());
    assert_eq!(generic_handler_calls(omitted, false), ["onTransition"]);
    assert_eq!(generic_handler_calls(proxied.clone(), false), ["onTransition"]);
    assert_eq!(generic_handler_calls(proxied, true), ["onTransitionComplete"]);
    assert!(generic_handler_calls(MachineOptions::default(), false).is_empty());
}

#[tokio::test]
async fn failing_apply_handler_fails_the_transition() {
    let player = MachineBuilder::new(Arc::new(Player))
        .states(state_table! { "stopped" => { initial }, "playing" => {} })
        .bindings(Bindings::new().on_state("playing", |_| async { Err(FsmError::message("no media")) }))
        .apply()
        .build()
        .unwrap();

    let error = player.transition("playing", false).await.unwrap_err();

    assert_eq!(error.to_string(), "no media");
    assert_eq!(player.state().as_deref(), Some("stopped"));
}

#[tokio::test]
async fn apply_transition_can_be_called_directly() {
    let reached = log();
    let sink = Arc::clone(&reached);
    let player = MachineBuilder::new(Arc::new(Player))
        .states(state_table! { "stopped" => { initial }, "playing" => {} })
        .bindings(Bindings::new().on_state("playing", move |info| {
            push(&sink, info.to);
            async { Ok(()) }
        }))
        .build()
        .unwrap();

    let outcome = player.transition("playing", false).await.unwrap();
    assert!(entries(&reached).is_empty());

    player.apply_transition(outcome.into_info().unwrap()).await.unwrap();
    assert_eq!(entries(&reached), ["playing"]);
}

#[tokio::test]
async fn omitted_members_are_left_out() {
    let calls = log();
    let sink = Arc::clone(&calls);
    let machine = MachineBuilder::new(Arc::new(Player))
        .states(state_table! { "stopped" => { initial }, "playing" => {} })
        .omit(ApiMember::Transition)
        .omit(ApiMember::OnTransition)
        .omit(ApiMember::ApplyTransition)
        .build()
        .unwrap();

    machine.on_transition(move |_, _| {
        push(&sink, "hook");
        async { Ok(()) }
    });

    let error = machine.transition("playing", false).await.unwrap_err();
    assert!(matches!(error, FsmError::Omitted(ApiMember::Transition)));

    machine.set_state("playing", false).await.unwrap();
    assert!(machine.has_state("playing"));
    assert!(entries(&calls).is_empty());

    let info = machine.set_state("stopped", false).await.unwrap().into_info().unwrap();
    assert!(matches!(
        machine.apply_transition(info).await,
        Err(FsmError::Omitted(ApiMember::ApplyTransition))
    ));
}

#[test]
fn state_queries_return_fresh_values() {
    let states = door_states();
    let (_, first, _) = door(states.clone());
    let (_, second, _) = door(states);

    let mut listed = first.state_transitions(Some("shut"));
    listed.push("cellar".to_string());

    assert_eq!(second.state_transitions(Some("shut")), ["open", "locked", "destroyed"]);
    assert_eq!(first.state_transitions(Some("shut")), ["open", "locked", "destroyed"]);
    assert_eq!(first.states(), second.states());
    assert_eq!(first.state_transitions(Some("destroyed")), ["open", "shut", "locked"]);
    assert_eq!(first.state_methods(Some("open")), ["walkThrough", "closeDoor"]);
    assert_eq!(first.state_methods(Some("destroyed")).len(), 6);
    assert_eq!(first.state_transitions(None).len(), 4);
}

#[tokio::test]
async fn state_data_variants() {
    let mut fixed = DataMap::new();
    fixed.insert("volume".into(), json!(7));

    let states = StateTable::<Player>::new()
        .state("stopped", StateDefinition::new().data(fixed).initial())
        .state(
            "playing",
            StateDefinition::new().data_fn(|machine, state| {
                let mut data = DataMap::new();
                data.insert("state".into(), json!(state));
                data.insert("proxy".into(), json!(machine.is_proxy()));
                data
            }),
        )
        .state("paused", StateDefinition::new().data_method("pausedData"))
        .state("ejected", StateDefinition::new().data_method("missing"));

    let bindings = Bindings::new().data_provider("pausedData", |_, state| {
        let mut data = DataMap::new();
        data.insert("label".into(), json!(format!("{state}!")));
        data
    });

    let seen = log();
    let sink = Arc::clone(&seen);
    let machine = StateMachine::new(Arc::new(Player), states, bindings, MachineOptions::default());
    machine.on_transition(move |_, info| {
        push(&sink, Value::Object(info.data).to_string());
        async { Ok(()) }
    });

    let mut current = machine.state_data(None);
    assert_eq!(current.get("volume"), Some(&json!(7)));
    current.insert("volume".into(), json!(11));
    assert_eq!(machine.state_data(None).get("volume"), Some(&json!(7)));

    assert_eq!(machine.state_data(Some("paused")).get("label"), Some(&json!("paused!")));
    assert!(machine.state_data(Some("ejected")).is_empty());
    assert!(machine.state_data(Some("cellar")).is_empty());

    machine.transition("playing", false).await.unwrap();
    assert_eq!(entries(&seen), [r#"{"proxy":false,"state":"playing"}"#]);
}

#[test]
fn machine_from_json_config() {
    let config = deferred_fsm::builder::MachineConfig::<Player>::from_json(
        r#"{
            "options": { "gateAllMethods": true },
            "states": {
                "stopped": { "initial": true, "methods": ["play"], "enter": "onStop" },
                "playing": { "methods": ["stop"], "trigger": "play", "data": { "speed": 1 } }
            }
        }"#,
    )
    .unwrap();

    let machine = MachineBuilder::new(Arc::new(Player))
        .config(config)
        .bindings(
            Bindings::new()
                .method("play", |_, _| async { Ok(Value::Null) })
                .method("stop", |_, _| async { Ok(Value::Null) })
                .method("eject", |_, _| async { Ok(Value::Null) })
                .callback("onStop", |_| async { Ok(()) }),
        )
        .strict()
        .build()
        .unwrap();

    assert_eq!(machine.initial_state(), Some("stopped"));
    assert_eq!(machine.gated_methods(), ["play", "stop", "eject"]);
    assert_eq!(machine.state_data(Some("playing")).get("speed"), Some(&json!(1)));
}

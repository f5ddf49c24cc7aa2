//! A media player driven through a proxy machine.
//!
//! The player itself knows nothing about states. The proxy gates its
//! methods, moves it between states on `play`/`pause`/`stop`, and applies
//! per-state handlers on every transition.
//!
//! Run with: cargo run --example media_player

use deferred_fsm::builder::MachineBuilder;
use deferred_fsm::core::DataMap;
use deferred_fsm::effects::{Bindings, EventPayload, FsmError, SubjectHooks};
use deferred_fsm::state_table;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Player {
    track: Mutex<Option<String>>,
    position: Mutex<u64>,
}

impl Player {
    fn now_playing(&self) -> String {
        let track = self.track.lock().unwrap();
        track.clone().unwrap_or_else(|| "nothing".to_string())
    }
}

fn bindings() -> Bindings<Player> {
    Bindings::new()
        .method("load", |player: Arc<Player>, args: Vec<Value>| async move {
            let track = args
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| FsmError::message("load expects a track name"))?;
            *player.track.lock().unwrap() = Some(track.to_string());
            *player.position.lock().unwrap() = 0;
            Ok(json!(track))
        })
        .method("play", |player: Arc<Player>, _| async move { Ok(json!(player.now_playing())) })
        .method("pause", |player: Arc<Player>, _| async move {
            let mut position = player.position.lock().unwrap();
            *position += 30;
            Ok(json!(*position))
        })
        .method("stop", |player: Arc<Player>, _| async move {
            *player.position.lock().unwrap() = 0;
            Ok(Value::Null)
        })
        .on_route("paused", "playing", |info| async move {
            println!("  resuming {}", info.context.now_playing());
            Ok(())
        })
        .on_state("playing", |info| async move {
            println!("  speakers on for {}", info.context.now_playing());
            Ok(())
        })
        .on_state("stopped", |_| async {
            println!("  speakers off");
            Ok(())
        })
        .data_provider("position", |machine, _| {
            let mut data = DataMap::new();
            data.insert("position".into(), json!(*machine.context().position.lock().unwrap()));
            data
        })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let hooks = SubjectHooks::<Player>::new().on_before("play", |call| async move {
        if call.machine.context().track.lock().unwrap().is_none() {
            return Err(FsmError::message("no track loaded"));
        }
        Ok(())
    });

    let player = MachineBuilder::new(Arc::new(Player::default()))
        .states(state_table! {
            "stopped" => { initial, methods: ["load", "play"], transitions: ["playing"], trigger: "stop" },
            "playing" => { methods: ["pause", "stop"], transitions: ["paused", "stopped"], trigger: "play" },
            "paused" => { methods: ["play", "stop"], transitions: ["playing", "stopped"], trigger: "pause", data_method: "position" },
        })
        .bindings(bindings())
        .proxy()
        .apply()
        .proxy_hooks(hooks)
        .strict()
        .build()?;

    if let Some(events) = player.events() {
        events.on("all", |name, payload| match payload {
            EventPayload::Exec { method, .. } => println!("[{name}] {method}"),
            EventPayload::Transition(record) => {
                println!("[{name}] {:?} -> {}", record.from, record.to)
            }
        });
    }

    println!("state: {:?}", player.state());

    if let Err(error) = player.call("play", vec![]).await {
        println!("play refused: {error}");
    }

    player.call("load", vec![json!("Blue in Green")]).await?;
    player.call("play", vec![]).await?;
    player.call("pause", vec![]).await?;
    println!("paused data: {}", Value::Object(player.state_data(None)));

    if let Err(error) = player.call("load", vec![json!("So What")]).await {
        println!("load refused: {error}");
    }

    player.call("play", vec![]).await?;
    player.call("stop", vec![]).await?;
    println!("state: {:?}", player.state());

    Ok(())
}

//! sim-runner: headless host for the AgentWorks simulation core.
//!
//! Usage:
//!   sim-runner --seed 12345 --ticks 6000 --width 32 --height 24 --db run.db
//!   sim-runner --commands build.json --save-out save.json
//!   sim-runner --load save.json --ticks 1200
//!   sim-runner --ipc-mode

use agentworks_core::{
    command::QueuedCommand,
    config::SimConfig,
    engine::SimEngine,
    event::{EventLogEntry, SimEvent},
    map_gen::MapSize,
    save::SaveBlob,
    store::SimStore,
    types::{EntityId, Tick},
};
use anyhow::{Context, Result};
use serde_json::json;
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcRequest {
    Init {
        seed:   u64,
        #[serde(default)]
        width:  Option<i32>,
        #[serde(default)]
        height: Option<i32>,
    },
    Step {
        until: Tick,
    },
    Enqueue {
        commands: Vec<QueuedCommand>,
    },
    GetSnapshot,
    Save,
    Load {
        blob: SaveBlob,
    },
    Details {
        entity_id: EntityId,
    },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let data_dir = string_arg(&args, "--data-dir").unwrap_or("./data");

    let config = match SimConfig::load(data_dir) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("{e}; using built-in configuration");
            SimConfig::default()
        }
    };

    let seed = parse_arg(&args, "--seed", config.seed);
    let ticks = parse_arg(&args, "--ticks", 6_000u64);
    let size = MapSize::new(
        parse_arg(&args, "--width", config.map_size.width),
        parse_arg(&args, "--height", config.map_size.height),
    );

    let mut engine = SimEngine::new(config);

    if ipc_mode {
        return run_ipc_loop(&mut engine);
    }

    println!("AgentWorks sim-runner");
    println!("  seed:      {seed}");
    println!("  ticks:     {ticks}");
    println!("  map:       {}x{}", size.width, size.height);
    println!("  data_dir:  {data_dir}");
    println!();

    let store = match string_arg(&args, "--db") {
        Some(db) => {
            let store = SimStore::open(db)?;
            store.migrate()?;
            Some(store)
        }
        None => None,
    };

    let init_events = match string_arg(&args, "--load") {
        Some(path) => {
            let raw = fs::read_to_string(path).with_context(|| format!("Cannot read {path}"))?;
            engine.load(SaveBlob::from_json(&raw)?)?
        }
        None => engine.init(seed, size)?,
    };

    if let Some(path) = string_arg(&args, "--commands") {
        let raw = fs::read_to_string(path).with_context(|| format!("Cannot read {path}"))?;
        let commands: Vec<QueuedCommand> =
            serde_json::from_str(&raw).with_context(|| format!("{path}: expected a list of commands"))?;
        log::info!("Queued {} command(s) from {path}", commands.len());
        engine.enqueue_commands(commands);
    }

    let run_id = format!("run-{}-{}", engine.world().seed, unix_secs());
    if let Some(store) = &store {
        store.insert_run(&run_id, engine.world().seed, env!("CARGO_PKG_VERSION"))?;
        log_events(store, &run_id, engine.current_tick(), &init_events)?;
    }

    let until = engine.current_tick() + ticks;
    let mut event_count = init_events.len();
    while engine.current_tick() < until {
        let tick = engine.current_tick();
        let events = engine.tick();
        event_count += events.len();
        if let Some(store) = &store {
            log_events(store, &run_id, tick, &events)?;
        }
    }

    if let Some(store) = &store {
        let save_id = store.save_blob(&run_id, &engine.save())?;
        log::info!("Stored save {save_id} for {run_id}");
    }
    if let Some(path) = string_arg(&args, "--save-out") {
        fs::write(path, engine.save().to_json()?).with_context(|| format!("Cannot write {path}"))?;
        println!("  save written to {path}");
    }

    print_summary(&engine, &run_id, ticks, event_count)
}

fn log_events(store: &SimStore, run_id: &str, tick: Tick, events: &[SimEvent]) -> Result<()> {
    for event in events {
        store.append_event(&EventLogEntry::from_event(run_id, tick, event)?)?;
    }
    Ok(())
}

fn run_ipc_loop(engine: &mut SimEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let request: IpcRequest = match serde_json::from_str(&buffer) {
            Ok(r) => r,
            Err(e) => {
                writeln!(stdout, "{}", json!({ "ok": false, "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };

        if matches!(request, IpcRequest::Quit) {
            writeln!(stdout, "{}", json!({ "ok": true }))?;
            stdout.flush()?;
            break;
        }

        let response = match handle_request(engine, request) {
            Ok(body) => json!({ "ok": true, "result": body }),
            Err(e) => json!({ "ok": false, "error": e.to_string() }),
        };
        writeln!(stdout, "{response}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_request(engine: &mut SimEngine, request: IpcRequest) -> Result<serde_json::Value> {
    let body = match request {
        IpcRequest::Init { seed, width, height } => {
            let default = engine.config().map_size;
            let size = MapSize::new(width.unwrap_or(default.width), height.unwrap_or(default.height));
            let events = engine.init(seed, size)?;
            json!({ "events": events, "snapshot": engine.get_snapshot()? })
        }
        IpcRequest::Step { until } => {
            let events = engine.step(until)?;
            json!({ "events": events, "snapshot": engine.get_snapshot()? })
        }
        IpcRequest::Enqueue { commands } => {
            engine.enqueue_commands(commands);
            json!({ "pending": engine.pending_commands().len() })
        }
        IpcRequest::GetSnapshot => serde_json::to_value(engine.get_snapshot()?)?,
        IpcRequest::Save => serde_json::to_value(engine.save())?,
        IpcRequest::Load { blob } => {
            // `load` runs the migration chain itself.
            let events = engine.load(blob)?;
            json!({ "events": events, "snapshot": engine.get_snapshot()? })
        }
        IpcRequest::Details { entity_id } => serde_json::to_value(engine.get_entity_details(entity_id))?,
        IpcRequest::Quit => serde_json::Value::Null,
    };
    Ok(body)
}

fn print_summary(engine: &SimEngine, run_id: &str, ticks: u64, event_count: usize) -> Result<()> {
    let snapshot = engine.get_snapshot()?;

    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {run_id}");
    println!("  ticks run:      {ticks}");
    println!("  final tick:     {}", snapshot.tick);
    println!("  events:         {event_count}");
    println!("  money:          {}", snapshot.money);
    println!("  population:     {}", snapshot.population);
    println!("  food stock:     {}", snapshot.food_stock);
    println!("  avg happiness:  {:.2}", snapshot.avg_happiness);
    println!("  buildings:      {}", snapshot.buildings.len());
    println!("  roads:          {}", snapshot.roads.len());
    println!("  auto-expansion: {}", if snapshot.auto_expansion_enabled { "on" } else { "off" });

    println!();
    println!("=== LEDGER (last day) ===");
    match snapshot.economy.ledger.last() {
        Some(day) => println!(
            "  day {} | income {} | expense {} | net {} | money after {}",
            day.day, day.income, day.expense, day.net, day.money_after
        ),
        None => println!("  (No days closed yet)"),
    }

    if snapshot.game_over {
        println!();
        println!(
            "GAME OVER: {}",
            snapshot.game_over_reason.as_deref().unwrap_or("unknown reason")
        );
    } else if snapshot.bankruptcy_ticks > 0 {
        println!();
        println!("  bankrupt, {} day(s) remaining", snapshot.bankruptcy_days_remaining);
    }
    Ok(())
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn unix_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

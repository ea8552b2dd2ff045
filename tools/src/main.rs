//! session-runner: headless tower-defense session runner.
//!
//! Usage:
//!   session-runner --seed 12345 --waves 10 --db run.db
//!   session-runner --seed 12345 --db run.db --resume
//!   session-runner --seed 12345 --waves 40 --infinite
//!   session-runner --seed 12345 --ipc-mode

use anyhow::Result;
use siegeline_core::{
    clock::GameSpeed,
    config::SessionConfig,
    entities::{Cell, GameState, MapConfig},
    event::{event_type_name, SessionEvent},
    host::SessionHost,
    session::Session,
    store::SqliteStore,
    types::{Millis, WaveIndex},
    wave_scheduler::WavePhase,
};
use std::env;
use std::io::{self, BufRead, Write};

/// Real milliseconds per simulated frame.
const FRAME_MS: Millis = 50;
/// Hard stop for headless runs.
const MAX_FRAMES: u64 = 200_000;

const MAP_WIDTH: u32 = 24;
const MAP_HEIGHT: u32 = 11;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Tick { count: u64 },
    StartWave,
    BuildTower { kind: String, col: i32, row: i32 },
    Pause,
    Resume,
    SetSpeed { speed: GameSpeed },
    Save,
    Load,
    Quit,
}

#[derive(serde::Serialize)]
struct UiState {
    wave: WaveIndex,
    phase: WavePhase,
    wave_elapsed_ms: Millis,
    infinite_mode: bool,
    game_state: GameState,
    paused: bool,
    speed: GameSpeed,
    currency: u64,
    lives: u32,
    score: u64,
    towers: usize,
    enemies: usize,
    pending_spawns: usize,
    play_time_ms: Millis,
    has_saved_game: bool,
    events: Vec<SessionEvent>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let resume = args.iter().any(|a| a == "--resume");
    let infinite = args.iter().any(|a| a == "--infinite");
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");
    let data_dir = args
        .windows(2)
        .find(|w| w[0] == "--data-dir")
        .map(|w| w[1].as_str())
        .unwrap_or("./data");

    let config = SessionConfig::load(data_dir)?;
    let waves = parse_arg(&args, "--waves", config.waves.total_waves);

    if !ipc_mode {
        println!("Siegeline — session-runner");
        println!("  seed:      {seed}");
        println!("  waves:     {waves}");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!("  resume:    {resume}");
        println!("  infinite:  {infinite}");
        println!();
    }

    // Saves and scores live in one database; each owner gets its own
    // connection. :memory: becomes a shared-cache URI so both see it.
    let db_effective: String = if db == ":memory:" {
        format!("file:session_{}?mode=memory&cache=shared", unix_seconds())
    } else {
        db.to_string()
    };
    let save_store = SqliteStore::open(&db_effective)?;
    save_store.migrate()?;
    let score_store = save_store.reopen()?;

    let map = MapConfig {
        seed,
        width: MAP_WIDTH,
        height: MAP_HEIGHT,
        biome: "grassland".into(),
        difficulty: "normal".into(),
    };
    let mut session = Session::new(config, map, save_store, score_store);
    session.game_mut().set_infinite_mode(infinite);

    if resume {
        if session.load() {
            log::info!("Resumed saved game at wave={}", session.game().waves().current_wave());
        } else {
            log::warn!("--resume given but no usable save; starting fresh");
        }
    }

    if ipc_mode {
        run_ipc_loop(&mut session)?;
    } else {
        run_headless(&mut session, waves);
        print_summary(&session);
    }

    Ok(())
}

/// Play until the game ends or `wave_limit` waves are cleared, building
/// towers between waves with whatever currency is on hand.
fn run_headless(session: &mut Session<SqliteStore>, wave_limit: WaveIndex) {
    for _ in 0..MAX_FRAMES {
        let game = session.game();
        if game.is_finished() {
            break;
        }
        let waves = game.waves();
        let between_waves = matches!(waves.phase(), WavePhase::Idle | WavePhase::Complete);
        if between_waves {
            if waves.current_wave() >= wave_limit {
                break;
            }
            place_towers(session);
            if !session.start_next_wave() {
                break;
            }
        }
        for event in session.tick(FRAME_MS) {
            log::debug!("{}: {}", event_type_name(&event), serde_json::to_string(&event).unwrap_or_default());
        }
    }
    session.save();
}

/// Fill cells beside the lane, nearest the exit first, while affordable.
fn place_towers(session: &mut Session<SqliteStore>) {
    const KINDS: [&str; 3] = ["arrow", "frost", "flame"];
    let lane = session.game().lane_row();
    let mut k = session.game().towers().len();
    for col in (0..MAP_WIDTH as i32).rev() {
        for row in [lane - 1, lane + 1] {
            let cell = Cell { col, row };
            if session.game().towers().iter().any(|t| t.cell == cell) {
                continue;
            }
            if session.game_mut().build_tower(KINDS[k % KINDS.len()], cell).is_none() {
                return;
            }
            k += 1;
        }
    }
}

fn run_ipc_loop(session: &mut Session<SqliteStore>) -> Result<()> {
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

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        let events = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => Vec::new(),
            IpcCommand::Tick { count } => session.run_ticks(count, FRAME_MS),
            IpcCommand::StartWave => {
                if !session.start_next_wave() {
                    log::debug!("start_wave ignored");
                }
                session.tick(0)
            }
            IpcCommand::BuildTower { kind, col, row } => {
                if session.game_mut().build_tower(&kind, Cell { col, row }).is_none() {
                    log::debug!("build_tower '{kind}' at ({col}, {row}) refused");
                }
                Vec::new()
            }
            IpcCommand::Pause => {
                session.game_mut().pause();
                Vec::new()
            }
            IpcCommand::Resume => {
                session.game_mut().resume();
                Vec::new()
            }
            IpcCommand::SetSpeed { speed } => {
                session.game_mut().set_speed(speed);
                Vec::new()
            }
            IpcCommand::Save => {
                session.save();
                session.tick(0)
            }
            IpcCommand::Load => {
                if !session.load() {
                    log::info!("load: nothing restored");
                }
                session.tick(0)
            }
        };
        let state = build_ui_state(session, events);
        writeln!(stdout, "{}", serde_json::to_string(&state)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn build_ui_state(session: &Session<SqliteStore>, events: Vec<SessionEvent>) -> UiState {
    let game = session.game();
    let store = game.store_state();
    UiState {
        wave: game.waves().current_wave(),
        phase: game.waves().phase(),
        wave_elapsed_ms: game.waves().wave_elapsed_ms(),
        infinite_mode: game.waves().is_infinite_mode(),
        game_state: store.game_state,
        paused: game.clock().paused,
        speed: game.clock().speed,
        currency: store.currency,
        lives: store.lives,
        score: store.score,
        towers: game.towers().len(),
        enemies: game.enemies().len(),
        pending_spawns: game.waves().pending_spawns(),
        play_time_ms: game.elapsed_ms(),
        has_saved_game: session.has_saved_game(),
        events,
    }
}

fn print_summary(session: &Session<SqliteStore>) {
    let game = session.game();
    let store = game.store_state();
    let snapshots = session.snapshots();

    println!("=== SESSION SUMMARY ===");
    println!("  outcome:        {:?}", store.game_state);
    println!("  wave reached:   {}", game.waves().current_wave());
    println!("  score:          {}", store.score);
    println!("  lives left:     {}", store.lives);
    println!("  currency:       {}", store.currency);
    println!("  enemies killed: {}", store.enemies_killed);
    println!("  towers built:   {}", store.towers_built);
    println!("  play time:      {:.1}s", game.elapsed_ms() as f64 / 1000.0);
    println!("  saves written:  {}", snapshots.saves_written());
    println!("  saves failed:   {}", snapshots.saves_failed());
    match snapshots.store().key_count() {
        Ok(keys) => println!("  keys stored:    {keys}"),
        Err(e) => log::warn!("Cannot count stored keys: {e}"),
    }

    println!();
    println!("=== LEADERBOARD (Top 5) ===");
    let top = session.leaderboard().get_top_scores(5);
    if top.is_empty() {
        println!("  (No finished games yet)");
    } else {
        for entry in &top {
            println!(
                "  #{} | {:>6} pts | wave {:>3} | {} | {}",
                entry.rank.unwrap_or(0),
                entry.score,
                entry.wave,
                entry.map_biome,
                entry.date.format("%Y-%m-%d %H:%M")
            );
        }
    }
    let stats = session.leaderboard().get_score_stats();
    println!(
        "  games: {} | average: {:.0} | best wave: {}",
        stats.total_games, stats.average_score, stats.highest_wave
    );
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn unix_seconds() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

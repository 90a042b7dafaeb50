//! LAN Tetris runner.
//!
//! Three modes: `single` runs a local game, `host` serves an authoritative
//! session on TCP, `join` connects to one. The single and join modes read
//! line commands from stdin (left/right/cw/ccw/soft/drop/hold/pause/
//! restart/show/quit), so the game is playable over a plain terminal and
//! scriptable from a pipe.

use std::time::SystemTime;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::time::{interval, Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lan_tetris::core::{Engine, PlayerSnapshot};
use lan_tetris::net::{run_host, Client, HostConfig, Notice, DEFAULT_PORT};
use lan_tetris::types::{InputEvent, Phase, TICK_MS};

#[derive(Parser)]
#[command(name = "lan-tetris", version, about = "Falling-block puzzle over LAN")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a local game.
    Single {
        /// Seed for the piece sequence; random when omitted.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Host an authoritative session.
    Host {
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Base seed for player engines; random when omitted.
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 8)]
        max_players: usize,
    },
    /// Join a hosted session.
    Join {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
        #[arg(long, default_value = "guest")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Single { seed } => run_single(seed).await,
        Command::Host {
            bind,
            port,
            seed,
            max_players,
        } => {
            let config = HostConfig {
                bind,
                port,
                base_seed: seed,
                max_players,
            };
            run_host(config, None).await
        }
        Command::Join { host, port, name } => run_join(&format!("{host}:{port}"), &name).await,
    }
}

async fn run_single(seed: Option<u64>) -> Result<()> {
    let seed = seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as u64
    });
    info!(seed, "starting local game");

    let mut engine = Engine::new(seed);
    let mut ticker = interval(Duration::from_millis(u64::from(TICK_MS)));
    let mut lines = BufReader::new(stdin()).lines();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                engine.tick(u64::from(TICK_MS));
                if let Some(outcome) = engine.take_last_outcome() {
                    if !outcome.cleared_rows.is_empty() {
                        info!(
                            rows = outcome.cleared_rows.len(),
                            points = outcome.points,
                            combo = outcome.combo,
                            score = engine.score(),
                            "line clear"
                        );
                    }
                    if outcome.topped_out {
                        println!("{}", render(&PlayerSnapshot::capture(&engine)));
                        info!(score = engine.score(), lines = engine.lines(), "game over");
                        return Ok(());
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { return Ok(()) };
                if line.trim() == "quit" {
                    return Ok(());
                }
                for event in parse_commands(&line) {
                    engine.apply_event(event);
                }
                if let Some(outcome) = engine.take_last_outcome() {
                    if !outcome.cleared_rows.is_empty() {
                        info!(
                            rows = outcome.cleared_rows.len(),
                            points = outcome.points,
                            combo = outcome.combo,
                            score = engine.score(),
                            "line clear"
                        );
                    }
                    if outcome.topped_out {
                        info!(score = engine.score(), lines = engine.lines(), "game over");
                        return Ok(());
                    }
                }
                println!("{}", render(&PlayerSnapshot::capture(&engine)));
            }
        }
    }
}

async fn run_join(addr: &str, name: &str) -> Result<()> {
    let mut client = Client::connect(addr, name).await?;
    info!(player_id = client.player_id(), addr, "joined");

    let mut notices = client
        .take_notices()
        .expect("fresh client has its notice stream");
    let mut lines = BufReader::new(stdin()).lines();

    loop {
        tokio::select! {
            notice = notices.recv() => {
                match notice {
                    Some(Notice::LineClear { player_id, row_indices, combo_count, points }) => {
                        info!(%player_id, rows = row_indices.len(), combo_count, points, "line clear");
                    }
                    Some(Notice::GameOver { player_id, final_score }) => {
                        info!(%player_id, final_score, "game over");
                    }
                    Some(Notice::PeerLeft { player_id, reason }) => {
                        info!(%player_id, %reason, "player left");
                    }
                    Some(Notice::Disconnected { reason }) => {
                        warn!(%reason, "session ended");
                        return Ok(());
                    }
                    None => {
                        warn!("connection lost");
                        return Ok(());
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    client.disconnect("stdin closed").await;
                    return Ok(());
                };
                let trimmed = line.trim();
                if trimmed == "quit" {
                    client.disconnect("quit").await;
                    return Ok(());
                }
                if trimmed == "show" {
                    if let Some(snapshot) = client.my_snapshot() {
                        println!("{}", render(&snapshot));
                    }
                    continue;
                }
                let events = parse_commands(trimmed);
                if !events.is_empty() {
                    client.send_events(events)?;
                }
            }
        }
    }
}

/// Parse a whitespace-separated command line into input events. Unknown
/// words are reported and skipped.
fn parse_commands(line: &str) -> Vec<InputEvent> {
    let mut events = Vec::new();
    for word in line.split_whitespace() {
        let event = match word {
            "left" | "l" => InputEvent::MoveLeft,
            "right" | "r" => InputEvent::MoveRight,
            "cw" => InputEvent::RotateCw,
            "ccw" => InputEvent::RotateCcw,
            "soft" | "s" => InputEvent::SoftDrop,
            "drop" | "d" => InputEvent::HardDrop,
            "hold" | "h" => InputEvent::Hold,
            "pause" | "p" => InputEvent::Pause,
            "restart" => InputEvent::Restart,
            other => {
                warn!(command = other, "unknown command");
                continue;
            }
        };
        events.push(event);
    }
    events
}

/// Plain-text board for terminal play: `.` empty, `#` stack, `@` the
/// falling piece.
fn render(snapshot: &PlayerSnapshot) -> String {
    use lan_tetris::types::{BOARD_BUFFER_ROWS, BOARD_VISIBLE_HEIGHT, BOARD_WIDTH};

    let mut grid = [[b'.'; BOARD_WIDTH as usize]; BOARD_VISIBLE_HEIGHT as usize];
    for (y, row) in snapshot.board.iter().enumerate() {
        for (x, &cell) in row.iter().enumerate() {
            if cell != 0 {
                grid[y][x] = b'#';
            }
        }
    }
    if let Some(active) = snapshot.active {
        for (mx, my) in lan_tetris::core::shape(active.kind, active.rotation) {
            let x = active.x + mx;
            let y = active.y + my - BOARD_BUFFER_ROWS as i8;
            if (0..BOARD_WIDTH as i8).contains(&x) && (0..BOARD_VISIBLE_HEIGHT as i8).contains(&y)
            {
                grid[y as usize][x as usize] = b'@';
            }
        }
    }

    let mut out = String::new();
    for row in &grid {
        out.push('|');
        out.push_str(std::str::from_utf8(row).expect("ascii board"));
        out.push_str("|\n");
    }
    out.push_str(&format!(
        "score {}  lines {}  level {}  next {:?}  hold {:?}{}",
        snapshot.score,
        snapshot.lines,
        snapshot.level,
        snapshot.next,
        snapshot.hold,
        match snapshot.phase {
            Phase::Running => "",
            Phase::Paused => "  [paused]",
            Phase::GameOver => "  [game over]",
        }
    ));
    out
}

//! Host session - authoritative game server for LAN play
//!
//! The host owns one engine per connected player. All mutation happens on a
//! single session task: peer reader tasks forward parsed input over a
//! bounded channel, and a 60 Hz interval on the same task drives gravity.
//! Snapshots of every player are broadcast after each tick, so clients
//! render only what the host has already decided.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::SystemTime;

use anyhow::{Context, Result};
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::core::{Engine, PlayerSnapshot};
use crate::net::protocol::{
    read_raw_frame, write_frame, Message, Payload, PlayerEntry, StateUpdate, DEFAULT_PORT,
};
use crate::types::{InputEvent, TICK_MS};

/// Host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub bind: String,
    pub port: u16,
    /// Base seed for player engines; player N plays seed `base_seed + N`.
    /// None picks one from the clock.
    pub base_seed: Option<u64>,
    pub max_players: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            base_seed: None,
            max_players: 8,
        }
    }
}

impl HostConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Everything peer tasks may ask of the session task.
enum SessionEvent {
    Join {
        desired_name: String,
        outbound: mpsc::UnboundedSender<Message>,
        reply: oneshot::Sender<JoinReply>,
    },
    Input {
        player_id: String,
        sequence_number: u64,
        events: Vec<InputEvent>,
    },
    Leave {
        player_id: String,
        reason: String,
    },
}

enum JoinReply {
    Granted {
        player_id: String,
        initial: StateUpdate,
    },
    Refused {
        reason: String,
    },
}

struct PlayerSlot {
    name: String,
    engine: Engine,
    last_seq: Option<u64>,
    outbound: mpsc::UnboundedSender<Message>,
}

/// Run the host until the listener fails. `ready` fires with the bound
/// address once the server accepts connections, which tests use instead of
/// sleeping.
pub async fn run_host(
    config: HostConfig,
    ready: Option<oneshot::Sender<SocketAddr>>,
) -> Result<()> {
    let listener = TcpListener::bind(config.socket_addr())
        .await
        .with_context(|| format!("bind {}", config.socket_addr()))?;
    let bound = listener.local_addr()?;
    info!(%bound, "hosting session");
    if let Some(tx) = ready {
        let _ = tx.send(bound);
    }

    let base_seed = config.base_seed.unwrap_or_else(seed_from_clock);
    debug!(base_seed, "session seed");

    // Bounded so a flooding peer stalls its own reader, not the session.
    let (session_tx, session_rx) = mpsc::channel::<SessionEvent>(64);
    let max_players = config.max_players;
    tokio::spawn(session_task(session_rx, base_seed, max_players));

    loop {
        let (socket, addr) = listener.accept().await?;
        info!(%addr, "peer connected");
        let session_tx = session_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_peer(socket, addr, session_tx).await {
                warn!(%addr, error = %e, "peer error");
            }
            info!(%addr, "peer disconnected");
        });
    }
}

fn seed_from_clock() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64
        ^ 0x9e3779b97f4a7c15
}

/// The single writer of all game state. Input events and the tick interval
/// are interleaved here, so engines never need locks.
async fn session_task(
    mut rx: mpsc::Receiver<SessionEvent>,
    base_seed: u64,
    max_players: usize,
) {
    let mut players: BTreeMap<String, PlayerSlot> = BTreeMap::new();
    let mut joined_count: u64 = 0;

    let mut ticker = interval(Duration::from_millis(u64::from(TICK_MS)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    debug!("all peers gone, session task stopping");
                    return;
                };
                handle_event(event, &mut players, &mut joined_count, base_seed, max_players);
            }
            _ = ticker.tick() => {
                tick_players(&mut players);
            }
        }
    }
}

fn handle_event(
    event: SessionEvent,
    players: &mut BTreeMap<String, PlayerSlot>,
    joined_count: &mut u64,
    base_seed: u64,
    max_players: usize,
) {
    match event {
        SessionEvent::Join {
            desired_name,
            outbound,
            reply,
        } => {
            if players.len() >= max_players {
                warn!(%desired_name, "join refused, session full");
                let _ = reply.send(JoinReply::Refused {
                    reason: "session full".to_string(),
                });
                return;
            }

            *joined_count += 1;
            let player_id = format!("player_{}", *joined_count);
            let seed = base_seed.wrapping_add(*joined_count);
            players.insert(
                player_id.clone(),
                PlayerSlot {
                    name: desired_name.clone(),
                    engine: Engine::new(seed),
                    last_seq: None,
                    outbound,
                },
            );
            info!(%player_id, name = %desired_name, "player joined");

            let initial = build_state_update(players);
            let _ = reply.send(JoinReply::Granted { player_id, initial });
            broadcast_state(players);
        }

        SessionEvent::Input {
            player_id,
            sequence_number,
            events,
        } => {
            let Some(slot) = players.get_mut(&player_id) else {
                debug!(%player_id, "input for unknown player");
                return;
            };
            // Replays and reordered frames are dropped: only strictly
            // increasing sequence numbers mutate the engine.
            if let Some(last) = slot.last_seq {
                if sequence_number <= last {
                    debug!(%player_id, sequence_number, last, "stale input dropped");
                    return;
                }
            }
            slot.last_seq = Some(sequence_number);
            // Outcomes are taken per event: a batch can lock twice, and the
            // first lock's notices must not be overwritten by the second.
            let mut notices = Vec::new();
            for event in events {
                slot.engine.apply_event(event);
                if let Some(outcome) = slot.engine.take_last_outcome() {
                    notices.extend(outcome_notices(&player_id, slot, outcome));
                }
            }
            for notice in &notices {
                send_to_all(players, notice);
            }
        }

        SessionEvent::Leave { player_id, reason } => {
            if players.remove(&player_id).is_some() {
                info!(%player_id, %reason, "player left");
                let bye = Message::new(Some(player_id), Payload::Disconnect { reason });
                send_to_all(players, &bye);
                broadcast_state(players);
            }
        }
    }
}

fn tick_players(players: &mut BTreeMap<String, PlayerSlot>) {
    if players.is_empty() {
        return;
    }
    for slot in players.values_mut() {
        slot.engine.tick(u64::from(TICK_MS));
    }
    drain_outcomes(players);
    broadcast_state(players);
}

/// Turn buffered lock outcomes into out-of-band notifications.
fn drain_outcomes(players: &mut BTreeMap<String, PlayerSlot>) {
    let mut notices: Vec<Message> = Vec::new();
    for (player_id, slot) in players.iter_mut() {
        if let Some(outcome) = slot.engine.take_last_outcome() {
            notices.extend(outcome_notices(player_id, slot, outcome));
        }
    }
    for notice in notices {
        send_to_all(players, &notice);
    }
}

fn outcome_notices(
    player_id: &str,
    slot: &PlayerSlot,
    outcome: crate::core::LockOutcome,
) -> Vec<Message> {
    let mut notices = Vec::new();
    if !outcome.cleared_rows.is_empty() {
        notices.push(Message::new(
            Some(player_id.to_string()),
            Payload::LineClear {
                row_indices: outcome.cleared_rows.to_vec(),
                combo_count: outcome.combo,
                points: outcome.points,
            },
        ));
    }
    if outcome.topped_out {
        notices.push(Message::new(
            Some(player_id.to_string()),
            Payload::GameOver {
                final_score: slot.engine.score(),
            },
        ));
    }
    notices
}

fn build_state_update(players: &BTreeMap<String, PlayerSlot>) -> StateUpdate {
    let mut update = StateUpdate::default();
    for (player_id, slot) in players {
        update.players.insert(
            player_id.clone(),
            PlayerEntry {
                name: slot.name.clone(),
                snapshot: PlayerSnapshot::capture(&slot.engine),
            },
        );
    }
    update
}

fn broadcast_state(players: &BTreeMap<String, PlayerSlot>) {
    if players.is_empty() {
        return;
    }
    let update = build_state_update(players);
    let msg = Message::new(None, Payload::StateUpdate(update));
    send_to_all(players, &msg);
}

fn send_to_all(players: &BTreeMap<String, PlayerSlot>, msg: &Message) {
    for slot in players.values() {
        // A closed channel means the writer died; Leave follows shortly.
        let _ = slot.outbound.send(msg.clone());
    }
}

/// One connected peer: handshake, then pump frames both ways until EOF.
async fn handle_peer(
    socket: TcpStream,
    addr: SocketAddr,
    session_tx: mpsc::Sender<SessionEvent>,
) -> Result<()> {
    let (read_half, write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);
    let mut writer = BufWriter::new(write_half);

    // The first decodable frame must be a connect. Garbage bodies are
    // dropped since the length prefix keeps the stream aligned.
    let desired_name = loop {
        let Some(body) = read_raw_frame(&mut reader).await? else {
            return Ok(());
        };
        let frame: Message = match serde_json::from_slice(&body) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%addr, error = %e, "malformed frame dropped");
                continue;
            }
        };
        match frame.payload {
            Payload::Connect { desired_name } => break desired_name,
            other => {
                debug!(%addr, payload = ?other, "expected connect");
                let bye = Message::new(
                    None,
                    Payload::Disconnect {
                        reason: "connect required".to_string(),
                    },
                );
                write_frame(&mut writer, &bye).await?;
                return Ok(());
            }
        }
    };

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    let (reply_tx, reply_rx) = oneshot::channel();
    session_tx
        .send(SessionEvent::Join {
            desired_name,
            outbound: outbound_tx,
            reply: reply_tx,
        })
        .await
        .context("session task gone")?;

    let (player_id, initial) = match reply_rx.await.context("join reply dropped")? {
        JoinReply::Granted { player_id, initial } => (player_id, initial),
        JoinReply::Refused { reason } => {
            let bye = Message::new(None, Payload::Disconnect { reason });
            write_frame(&mut writer, &bye).await?;
            return Ok(());
        }
    };

    let connected = Message::new(
        Some(player_id.clone()),
        Payload::Connected {
            assigned_player_id: player_id.clone(),
            initial_state: initial,
        },
    );
    write_frame(&mut writer, &connected).await?;

    // Writer task: everything the session broadcasts for this peer.
    let write_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if write_frame(&mut writer, &msg).await.is_err() {
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    let mut leave_reason = "connection closed".to_string();
    loop {
        let body = match read_raw_frame(&mut reader).await {
            Ok(Some(body)) => body,
            Ok(None) => break,
            Err(e) => {
                leave_reason = format!("read error: {e:#}");
                break;
            }
        };
        // Only framing desync and oversized lengths end the connection.
        // A body that will not decode is logged and dropped.
        let frame: Message = match serde_json::from_slice(&body) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%addr, %player_id, error = %e, "malformed frame dropped");
                continue;
            }
        };
        match frame.payload {
            Payload::Input {
                sequence_number,
                events,
            } => {
                // The id assigned at join wins over whatever the frame
                // claims, so a peer cannot drive another player's engine.
                session_tx
                    .send(SessionEvent::Input {
                        player_id: player_id.clone(),
                        sequence_number,
                        events,
                    })
                    .await
                    .context("session task gone")?;
            }
            Payload::Disconnect { reason } => {
                leave_reason = reason;
                break;
            }
            other => {
                debug!(%addr, %player_id, payload = ?other, "unexpected frame ignored");
            }
        }
    }

    let _ = session_tx
        .send(SessionEvent::Leave {
            player_id,
            reason: leave_reason,
        })
        .await;
    write_task.abort();
    Ok(())
}

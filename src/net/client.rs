//! Peer client - connects to a host and mirrors its authoritative state.
//!
//! The client never simulates. It sends input events with increasing
//! sequence numbers and renders whatever state updates the host pushes.
//! The latest full table lives in a watch channel; line clears, game overs,
//! and disconnects arrive as discrete notices.

use anyhow::{bail, Context, Result};
use tokio::io::{BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::PlayerSnapshot;
use crate::net::protocol::{read_frame, read_raw_frame, write_frame, Message, Payload, StateUpdate};
use crate::types::InputEvent;

/// Discrete out-of-band notifications from the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    LineClear {
        player_id: String,
        row_indices: Vec<usize>,
        combo_count: u32,
        points: u64,
    },
    GameOver {
        player_id: String,
        final_score: u64,
    },
    /// Another player left the session; this connection is unaffected.
    PeerLeft {
        player_id: String,
        reason: String,
    },
    Disconnected {
        reason: String,
    },
}

/// Handle to a live session. Dropping it tears the connection down.
pub struct Client {
    player_id: String,
    updates: watch::Receiver<StateUpdate>,
    notices: Option<mpsc::UnboundedReceiver<Notice>>,
    outbound: mpsc::UnboundedSender<Message>,
    next_seq: u64,
    reader_task: JoinHandle<()>,
    writer_task: Option<JoinHandle<()>>,
}

impl Client {
    /// Connect and complete the handshake. `addr` is `host:port`.
    pub async fn connect(addr: &str, desired_name: &str) -> Result<Self> {
        let socket = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connect {addr}"))?;
        let (read_half, write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half);
        let mut writer = BufWriter::new(write_half);

        let hello = Message::new(
            None,
            Payload::Connect {
                desired_name: desired_name.to_string(),
            },
        );
        write_frame(&mut writer, &hello).await?;

        let reply = read_frame(&mut reader)
            .await?
            .context("host closed during handshake")?;
        let (player_id, initial) = match reply.payload {
            Payload::Connected {
                assigned_player_id,
                initial_state,
            } => (assigned_player_id, initial_state),
            Payload::Disconnect { reason } => bail!("host refused: {reason}"),
            other => bail!("unexpected handshake reply: {other:?}"),
        };
        debug!(%player_id, "joined session");

        let (update_tx, updates) = watch::channel(initial);
        let (notice_tx, notices) = mpsc::unbounded_channel();
        let reader_task = tokio::spawn(read_loop(reader, player_id.clone(), update_tx, notice_tx));

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let writer_task = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                if let Err(e) = write_frame(&mut writer, &msg).await {
                    warn!(error = %e, "send to host failed");
                    break;
                }
            }
        });

        Ok(Self {
            player_id,
            updates,
            notices: Some(notices),
            outbound,
            next_seq: 0,
            reader_task,
            writer_task: Some(writer_task),
        })
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    /// Queue a batch of input events, stamped with the next sequence number.
    pub fn send_events(&mut self, events: Vec<InputEvent>) -> Result<()> {
        self.next_seq += 1;
        let msg = Message::new(
            Some(self.player_id.clone()),
            Payload::Input {
                sequence_number: self.next_seq,
                events,
            },
        );
        self.outbound
            .send(msg)
            .map_err(|_| anyhow::anyhow!("connection to host lost"))
    }

    /// Most recent authoritative state of the whole table.
    pub fn latest(&self) -> StateUpdate {
        self.updates.borrow().clone()
    }

    /// This player's snapshot from the latest update, if present.
    pub fn my_snapshot(&self) -> Option<PlayerSnapshot> {
        self.updates
            .borrow()
            .players
            .get(&self.player_id)
            .map(|entry| entry.snapshot.clone())
    }

    /// Wait for the next state update from the host.
    pub async fn changed(&mut self) -> Result<()> {
        self.updates
            .changed()
            .await
            .map_err(|_| anyhow::anyhow!("connection to host lost"))
    }

    /// Next out-of-band notice; None once the connection is gone and the
    /// queue has drained (or after `take_notices`).
    pub async fn next_notice(&mut self) -> Option<Notice> {
        match self.notices.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Detach the notice stream so it can be polled independently of this
    /// handle. Subsequent `next_notice` calls return None.
    pub fn take_notices(&mut self) -> Option<mpsc::UnboundedReceiver<Notice>> {
        self.notices.take()
    }

    /// Tell the host we are leaving, then drop the connection once the
    /// goodbye frame has been written.
    pub async fn disconnect(mut self, reason: &str) {
        let bye = Message::new(
            Some(self.player_id.clone()),
            Payload::Disconnect {
                reason: reason.to_string(),
            },
        );
        let _ = self.outbound.send(bye);
        // Swap in a closed sender so the writer task drains and exits.
        let (closed, _) = mpsc::unbounded_channel();
        self.outbound = closed;
        if let Some(task) = self.writer_task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.reader_task.abort();
        if let Some(task) = self.writer_task.take() {
            task.abort();
        }
    }
}

async fn read_loop<R>(
    mut reader: R,
    own_id: String,
    update_tx: watch::Sender<StateUpdate>,
    notice_tx: mpsc::UnboundedSender<Notice>,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    loop {
        let body = match read_raw_frame(&mut reader).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                let _ = notice_tx.send(Notice::Disconnected {
                    reason: "host closed connection".to_string(),
                });
                return;
            }
            Err(e) => {
                let _ = notice_tx.send(Notice::Disconnected {
                    reason: format!("read error: {e:#}"),
                });
                return;
            }
        };
        let frame: Message = match serde_json::from_slice(&body) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "malformed frame from host dropped");
                continue;
            }
        };

        match frame.payload {
            Payload::StateUpdate(update) => {
                // Receivers only ever want the newest table.
                let _ = update_tx.send(update);
            }
            Payload::LineClear {
                row_indices,
                combo_count,
                points,
            } => {
                let _ = notice_tx.send(Notice::LineClear {
                    player_id: frame.player_id.unwrap_or_default(),
                    row_indices,
                    combo_count,
                    points,
                });
            }
            Payload::GameOver { final_score } => {
                let _ = notice_tx.send(Notice::GameOver {
                    player_id: frame.player_id.unwrap_or_default(),
                    final_score,
                });
            }
            Payload::Disconnect { reason } => match frame.player_id {
                // Another player's departure is news, not a teardown.
                Some(id) if id != own_id => {
                    let _ = notice_tx.send(Notice::PeerLeft {
                        player_id: id,
                        reason,
                    });
                }
                _ => {
                    let _ = notice_tx.send(Notice::Disconnected { reason });
                    return;
                }
            },
            other => {
                debug!(payload = ?other, "unexpected frame from host ignored");
            }
        }
    }
}

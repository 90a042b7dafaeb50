//! Protocol module - framed JSON messages for LAN play
//!
//! Every frame on the wire is a 4-byte big-endian length prefix followed by
//! one JSON envelope. The envelope carries a type tag, the sender's player
//! id where relevant, a payload object, and a wall-clock timestamp in
//! seconds. Hosts never trust the timestamp for ordering; input ordering
//! comes from per-player sequence numbers.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::core::snapshot::PlayerSnapshot;
use crate::types::InputEvent;

/// Upper bound on a single frame. A state update for a full table of
/// players fits in a few KiB; anything near this limit is a corrupt or
/// hostile peer.
pub const MAX_FRAME_BYTES: u32 = 256 * 1024;

pub const DEFAULT_PORT: u16 = 5555;

/// One wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Seconds since the Unix epoch, informational only.
    pub timestamp: f64,
    /// Sender's assigned id; absent on the first connect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(flatten)]
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// Client -> host, first frame on a fresh connection.
    Connect { desired_name: String },
    /// Host -> client, handshake reply with the authoritative view.
    Connected {
        assigned_player_id: String,
        initial_state: StateUpdate,
    },
    /// Client -> host, a batch of input events.
    Input {
        sequence_number: u64,
        events: Vec<InputEvent>,
    },
    /// Host -> clients, full authoritative state of every player.
    StateUpdate(StateUpdate),
    /// Host -> clients, out of band notification of a clear.
    LineClear {
        row_indices: Vec<usize>,
        combo_count: u32,
        points: u64,
    },
    /// Host -> clients, a player topped out.
    GameOver { final_score: u64 },
    /// Either direction, intent to leave.
    Disconnect { reason: String },
}

/// Everything a renderer needs about the whole table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateUpdate {
    pub players: BTreeMap<String, PlayerEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub name: String,
    pub snapshot: PlayerSnapshot,
}

impl Message {
    pub fn new(player_id: Option<String>, payload: Payload) -> Self {
        Self {
            timestamp: unix_timestamp(),
            player_id,
            payload,
        }
    }
}

/// Seconds since the Unix epoch as a float.
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Write one length-prefixed frame.
pub async fn write_frame<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(message).context("encode frame")?;
    if body.len() as u32 > MAX_FRAME_BYTES {
        bail!("outbound frame of {} bytes exceeds limit", body.len());
    }
    writer.write_u32(body.len() as u32).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed body without decoding it. Returns None on
/// clean EOF at a frame boundary; a connection dropped mid-frame or an
/// oversized length prefix is an error. After `Ok(Some(..))` the stream
/// sits at the next frame boundary whether or not the body parses.
pub async fn read_raw_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e).context("read frame length"),
    };
    if len > MAX_FRAME_BYTES {
        bail!("inbound frame of {len} bytes exceeds limit");
    }

    let mut body = vec![0u8; len as usize];
    reader
        .read_exact(&mut body)
        .await
        .context("read frame body")?;
    Ok(Some(body))
}

/// Read and decode one frame. A body that fails to decode is an error
/// here; callers that must survive malformed peers use [`read_raw_frame`]
/// and decode themselves, since the framing stays aligned either way.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Message>>
where
    R: AsyncRead + Unpin,
{
    match read_raw_frame(reader).await? {
        Some(body) => Ok(Some(serde_json::from_slice(&body).context("decode frame")?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_uses_expected_wire_shape() {
        let msg = Message {
            timestamp: 1.5,
            player_id: None,
            payload: Payload::Connect {
                desired_name: "ada".to_string(),
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"connect""#));
        assert!(json.contains(r#""desired_name":"ada""#));
        assert!(!json.contains("player_id"));
    }

    #[test]
    fn input_roundtrips_with_events() {
        let msg = Message::new(
            Some("player_1".to_string()),
            Payload::Input {
                sequence_number: 42,
                events: vec![InputEvent::MoveLeft, InputEvent::HardDrop],
            },
        );
        let json = serde_json::to_vec(&msg).unwrap();
        let back: Message = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, msg);
        assert!(String::from_utf8(json).unwrap().contains("hard_drop"));
    }

    #[test]
    fn parses_frames_from_other_implementations() {
        // Field order and extra whitespace must not matter.
        let json = r#"{
            "player_id": "player_2",
            "data": {"sequence_number": 7, "events": ["rotate_cw"]},
            "type": "input",
            "timestamp": 1724744400.25
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        match msg.payload {
            Payload::Input {
                sequence_number,
                events,
            } => {
                assert_eq!(sequence_number, 7);
                assert_eq!(events, vec![InputEvent::RotateCw]);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn frame_roundtrip_over_a_buffer() {
        let msg = Message::new(
            Some("player_1".to_string()),
            Payload::Disconnect {
                reason: "quit".to_string(),
            },
        );

        let mut buf = Vec::new();
        write_frame(&mut buf, &msg).await.unwrap();
        // 4-byte big-endian prefix matches the body length.
        let len = u32::from_be_bytes(buf[..4].try_into().unwrap());
        assert_eq!(len as usize, buf.len() - 4);

        let mut cursor = std::io::Cursor::new(buf);
        let back = read_frame(&mut cursor).await.unwrap().unwrap();
        assert_eq!(back, msg);
        // EOF at the boundary reads as end of stream.
        assert!(read_frame(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_BYTES + 1).to_be_bytes());
        let mut cursor = std::io::Cursor::new(buf);
        assert!(read_frame(&mut cursor).await.is_err());
    }

    #[tokio::test]
    async fn undecodable_body_leaves_the_stream_aligned() {
        // A well-framed garbage body followed by a real message: the raw
        // read consumes exactly the garbage, and the next frame decodes.
        let mut buf = Vec::new();
        let garbage = b"not json at all";
        buf.extend_from_slice(&(garbage.len() as u32).to_be_bytes());
        buf.extend_from_slice(garbage);
        let msg = Message::new(
            None,
            Payload::Connect {
                desired_name: "ada".to_string(),
            },
        );
        write_frame(&mut buf, &msg).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let body = read_raw_frame(&mut cursor).await.unwrap().unwrap();
        assert!(serde_json::from_slice::<Message>(&body).is_err());
        let back = read_frame(&mut cursor).await.unwrap().unwrap();
        assert_eq!(back, msg);
    }

    #[tokio::test]
    async fn truncated_frame_is_an_error() {
        let msg = Message::new(None, Payload::Connect {
            desired_name: "bob".to_string(),
        });
        let mut buf = Vec::new();
        write_frame(&mut buf, &msg).await.unwrap();
        buf.truncate(buf.len() - 3);
        let mut cursor = std::io::Cursor::new(buf);
        assert!(read_frame(&mut cursor).await.is_err());
    }
}

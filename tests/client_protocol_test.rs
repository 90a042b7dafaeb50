//! Client behavior against a scripted host.
//!
//! A bare TcpListener plays the host role and feeds the client exact
//! frames, so handshake handling, notice ordering, and refusal paths can
//! be pinned down without a real session.

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;

use lan_tetris::core::{Engine, PlayerSnapshot};
use lan_tetris::net::protocol::{
    read_frame, write_frame, Message, Payload, PlayerEntry, StateUpdate,
};
use lan_tetris::net::{Client, Notice};
use lan_tetris::types::InputEvent;

fn entry(name: &str, seed: u64) -> PlayerEntry {
    PlayerEntry {
        name: name.to_string(),
        snapshot: PlayerSnapshot::capture(&Engine::new(seed)),
    }
}

#[tokio::test]
async fn client_surfaces_notices_in_order() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let host = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        // Handshake.
        let hello = read_frame(&mut socket).await.unwrap().unwrap();
        match hello.payload {
            Payload::Connect { desired_name } => assert_eq!(desired_name, "ada"),
            other => panic!("expected connect, got {other:?}"),
        }
        let mut initial = StateUpdate::default();
        initial.players.insert("player_1".to_string(), entry("ada", 1));
        write_frame(
            &mut socket,
            &Message::new(
                Some("player_1".to_string()),
                Payload::Connected {
                    assigned_player_id: "player_1".to_string(),
                    initial_state: initial,
                },
            ),
        )
        .await
        .unwrap();

        // A clear, a state update, then a game over.
        write_frame(
            &mut socket,
            &Message::new(
                Some("player_1".to_string()),
                Payload::LineClear {
                    row_indices: vec![19, 21],
                    combo_count: 1,
                    points: 300,
                },
            ),
        )
        .await
        .unwrap();

        let mut update = StateUpdate::default();
        update.players.insert("player_1".to_string(), entry("ada", 1));
        update.players.insert("player_2".to_string(), entry("bob", 2));
        write_frame(
            &mut socket,
            &Message::new(None, Payload::StateUpdate(update)),
        )
        .await
        .unwrap();

        write_frame(
            &mut socket,
            &Message::new(
                Some("player_1".to_string()),
                Payload::GameOver { final_score: 4200 },
            ),
        )
        .await
        .unwrap();

        // The first input frame from the client must carry seq 1.
        let input = read_frame(&mut socket).await.unwrap().unwrap();
        match input.payload {
            Payload::Input {
                sequence_number,
                events,
            } => {
                assert_eq!(sequence_number, 1);
                assert_eq!(events, vec![InputEvent::RotateCw]);
                assert_eq!(input.player_id.as_deref(), Some("player_1"));
            }
            other => panic!("expected input, got {other:?}"),
        }
    });

    let mut client = timeout(
        Duration::from_secs(2),
        Client::connect(&addr.to_string(), "ada"),
    )
    .await
    .expect("connect timed out")
    .unwrap();
    assert_eq!(client.player_id(), "player_1");
    assert!(client.my_snapshot().is_some());

    let first = timeout(Duration::from_secs(2), client.next_notice())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        first,
        Notice::LineClear {
            player_id: "player_1".to_string(),
            row_indices: vec![19, 21],
            combo_count: 1,
            points: 300,
        }
    );

    let second = timeout(Duration::from_secs(2), client.next_notice())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        second,
        Notice::GameOver {
            player_id: "player_1".to_string(),
            final_score: 4200,
        }
    );

    // The state update between the notices landed in the watch slot.
    timeout(Duration::from_secs(2), async {
        while client.latest().players.len() != 2 {
            client.changed().await.unwrap();
        }
    })
    .await
    .expect("state update never arrived");

    client.send_events(vec![InputEvent::RotateCw]).unwrap();
    timeout(Duration::from_secs(2), host)
        .await
        .expect("host script timed out")
        .unwrap();
}

#[tokio::test]
async fn refused_handshake_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = read_frame(&mut socket).await;
        let _ = write_frame(
            &mut socket,
            &Message::new(
                None,
                Payload::Disconnect {
                    reason: "session full".to_string(),
                },
            ),
        )
        .await;
    });

    let err = match Client::connect(&addr.to_string(), "late").await {
        Ok(_) => panic!("connect should fail"),
        Err(e) => e,
    };
    assert!(err.to_string().contains("session full"));
}

mod support;

use support::{connect, next_close_code, next_json, next_of_type, send_json};

#[tokio::test]
async fn when_solo_game_starts_then_init_precedes_game_started() {
    let mut socket = connect("/ws").await;
    send_json(
        &mut socket,
        serde_json::json!({"type": "start", "difficulty": "easy", "fuel_mode": "limited"}),
    )
    .await;

    let init = next_json(&mut socket).await.expect("init frame");
    assert_eq!(init["type"], "init");
    assert_eq!(init["lander"]["fuel"], 300.0);
    assert_eq!(init["constants"]["terrain_width"], 1200.0);
    assert!(!init["terrain"]["landing_zones"].as_array().expect("zones").is_empty());

    let started = next_json(&mut socket).await.expect("game_started frame");
    assert_eq!(started["type"], "game_started");

    let telemetry = next_of_type(&mut socket, "telemetry").await;
    assert!(telemetry["altitude"].is_number());
    assert!(telemetry["nearest_landing_zone"]["direction"].is_string());
}

#[tokio::test]
async fn when_ping_is_sent_before_handshake_then_pong_is_returned() {
    let mut socket = connect("/ws").await;
    send_json(&mut socket, serde_json::json!({"type": "ping"})).await;
    let reply = next_json(&mut socket).await.expect("pong frame");
    assert_eq!(reply["type"], "pong");
}

#[tokio::test]
async fn when_frame_is_malformed_then_connection_is_closed() {
    let mut socket = connect("/ws").await;
    send_json(&mut socket, serde_json::json!({"type": "teleport"})).await;
    assert!(next_json(&mut socket).await.is_none());
}

#[tokio::test]
async fn when_frame_is_over_the_size_limit_then_connection_closes_with_too_big() {
    let mut socket = connect("/ws").await;
    let pad = "x".repeat(5_000);
    send_json(&mut socket, serde_json::json!({"type": "ping", "pad": pad})).await;
    assert_eq!(next_close_code(&mut socket).await, Some(1009));
}

#[tokio::test]
async fn when_room_is_unknown_then_error_is_sent_and_socket_stays_open() {
    let mut socket = connect("/ws").await;
    send_json(
        &mut socket,
        serde_json::json!({"type": "join_room", "room_id": "no-such-room"}),
    )
    .await;
    let error = next_json(&mut socket).await.expect("error frame");
    assert_eq!(error["type"], "error");
    assert_eq!(error["message"], "game session not found");

    send_json(&mut socket, serde_json::json!({"type": "ping"})).await;
    let reply = next_json(&mut socket).await.expect("pong frame");
    assert_eq!(reply["type"], "pong");
}

#[tokio::test]
async fn when_guest_joins_a_room_then_creator_starts_it_for_both() {
    let mut host = connect("/ws").await;
    send_json(
        &mut host,
        serde_json::json!({"type": "create_room", "player_name": "Host"}),
    )
    .await;
    let created = next_of_type(&mut host, "room_created").await;
    let room_id = created["room_id"].as_str().expect("room id").to_string();

    let mut guest = connect("/ws").await;
    send_json(
        &mut guest,
        serde_json::json!({"type": "join_room", "room_id": room_id, "player_name": "Guest"}),
    )
    .await;
    let joined = next_of_type(&mut guest, "room_joined").await;
    assert_eq!(joined["room_id"], room_id.as_str());

    let announced = next_of_type(&mut host, "player_joined").await;
    assert_eq!(announced["player"]["name"], "Guest");

    // Only the creator may start the game.
    send_json(&mut guest, serde_json::json!({"type": "start_game"})).await;
    let refused = next_of_type(&mut guest, "error").await;
    assert_eq!(refused["message"], "only the room creator can start the game");

    send_json(&mut host, serde_json::json!({"type": "start_game"})).await;
    for socket in [&mut host, &mut guest] {
        let init = next_of_type(socket, "init").await;
        assert_eq!(init["players"].as_object().expect("players map").len(), 2);
        next_of_type(socket, "game_started").await;
        let telemetry = next_of_type(socket, "telemetry").await;
        assert!(telemetry["players"].is_object());
    }
}

#[tokio::test]
async fn when_spectating_an_unknown_session_then_error_precedes_close() {
    let mut socket = connect("/spectate/missing-session").await;
    let error = next_json(&mut socket).await.expect("error frame");
    assert_eq!(error["type"], "error");
    assert!(next_json(&mut socket).await.is_none());
}

#[tokio::test]
async fn when_spectating_a_running_game_then_init_and_telemetry_arrive() {
    let mut pilot = connect("/ws").await;
    send_json(&mut pilot, serde_json::json!({"type": "create_room"})).await;
    let created = next_of_type(&mut pilot, "room_created").await;
    let room_id = created["room_id"].as_str().expect("room id").to_string();
    send_json(&mut pilot, serde_json::json!({"type": "start_game"})).await;
    next_of_type(&mut pilot, "game_started").await;

    let mut watcher = connect(&format!("/spectate/{room_id}")).await;
    let init = next_json(&mut watcher).await.expect("init frame");
    assert_eq!(init["type"], "init");
    next_of_type(&mut watcher, "telemetry").await;
}

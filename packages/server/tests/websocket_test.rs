//! Integration tests for the WebSocket surface: admission, subscriptions,
//! event routing and heartbeat expiry.

mod common;

use std::time::{Duration, Instant};

use common::{TestClient, TestServer};
use haiso_server::config::ServerConfig;
use serde_json::json;
use tokio_tungstenite::{connect_async, tungstenite};

#[tokio::test]
async fn test_connection_without_valid_token_is_rejected() {
    // テスト項目: トークンなし・無効なトークンの接続は 401 で拒否され、登録されない
    // given (前提条件):
    let server = TestServer::start().await;

    // when (操作):
    let missing = connect_async(format!("ws://{}/ws", server.addr)).await;
    let invalid = connect_async(server.ws_url("nope")).await;

    // then (期待する結果):
    for result in [missing, invalid] {
        match result {
            Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 401),
            other => panic!("expected 401, got {other:?}"),
        }
    }
    assert_eq!(server.health().await["connections"], 0);
}

#[tokio::test]
async fn test_connected_greeting_carries_principal() {
    // テスト項目: 接続直後に connected フレームでプリンシパルが通知される
    // given (前提条件):
    let server = TestServer::start().await;

    // when (操作):
    let client = TestClient::connect(&server, "t-d1").await;

    // then (期待する結果):
    assert_eq!(client.connected["userId"], "d1");
    assert_eq!(client.connected["role"], "driver");
    assert!(client.connected["connectionId"].is_string());
    assert_eq!(server.health().await["connections"], 1);
}

#[tokio::test]
async fn test_same_user_may_hold_several_connections() {
    // テスト項目: 同一ユーザーの複数接続はそれぞれ独立に購読できる
    // given (前提条件):
    let server = TestServer::start().await;
    let mut phone = TestClient::connect(&server, "t-c1").await;
    let mut laptop = TestClient::connect(&server, "t-c1").await;

    // when (操作):
    phone.subscribe("chat:7").await;
    laptop.subscribe("chat:7").await;
    phone
        .send_json(json!({"type": "chat_message", "roomId": "7", "message": "both?"}))
        .await;

    // then (期待する結果):
    assert_eq!(phone.next_json().await["payload"]["message"], "both?");
    assert_eq!(laptop.next_json().await["payload"]["message"], "both?");
    assert_ne!(phone.connected["connectionId"], laptop.connected["connectionId"]);
}

#[tokio::test]
async fn test_unrelated_customer_cannot_subscribe_to_order_room() {
    // テスト項目: 注文に無関係な顧客の購読は forbidden で、メンバーは作られない
    // given (前提条件):
    let server = TestServer::start().await;
    server.put_order("42", Some("d1"), "in_transit").await;
    let mut stranger = TestClient::connect(&server, "t-c2").await;

    // when (操作):
    let reply = stranger.subscribe("order:42").await;

    // then (期待する結果):
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "forbidden");
    let rooms: serde_json::Value = reqwest::get(server.http_url("/debug/rooms"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rooms["rooms"], json!([]));
}

#[tokio::test]
async fn test_order_update_reaches_order_room_members() {
    // テスト項目: 注文ステータスの更新が order ルームの購読者に届く
    // given (前提条件):
    let server = TestServer::start().await;
    server.put_order("42", Some("d1"), "picked_up").await;
    let mut customer = TestClient::connect(&server, "t-c1").await;
    let mut merchant = TestClient::connect(&server, "t-m1").await;
    assert_eq!(customer.subscribe("order:42").await["type"], "subscribed");
    assert_eq!(merchant.subscribe("order:42").await["type"], "subscribed");

    // when (操作):
    let response: serde_json::Value = reqwest::Client::new()
        .post(server.http_url("/api/orders/42/status"))
        .json(&json!({"status": "in_transit", "metadata": {"etaMinutes": 9}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(response["delivered"], 2);
    for client in [&mut customer, &mut merchant] {
        let event = client.next_json().await;
        assert_eq!(event["type"], "order_update");
        assert_eq!(event["roomId"], "order:42");
        assert_eq!(event["payload"]["status"], "in_transit");
        assert_eq!(event["payload"]["metadata"]["etaMinutes"], 9);
        assert!(event.get("sourceUserId").is_none());
    }
}

#[tokio::test]
async fn test_chat_requires_membership() {
    // テスト項目: 未購読のチャットへの送信は forbidden、購読後は全メンバーに届く
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = TestClient::connect(&server, "t-c1").await;
    let mut bob = TestClient::connect(&server, "t-m1").await;
    bob.subscribe("chat:7").await;

    // when (操作):
    alice
        .send_json(json!({"type": "chat_message", "roomId": "7", "message": "hello?"}))
        .await;
    let rejected = alice.next_json().await;
    bob.expect_silence(Duration::from_millis(200)).await;

    alice.subscribe("chat:7").await;
    alice
        .send_json(json!({"type": "chat_message", "roomId": "7", "message": "hello!"}))
        .await;

    // then (期待する結果):
    assert_eq!(rejected["type"], "error");
    assert_eq!(rejected["code"], "forbidden");

    let delivered = bob.next_json().await;
    assert_eq!(delivered["type"], "chat_message");
    assert_eq!(delivered["sourceUserId"], "c1");
    assert_eq!(delivered["payload"]["message"], "hello!");
    assert_eq!(alice.next_json().await["payload"]["message"], "hello!");
}

#[tokio::test]
async fn test_publish_order_is_preserved_per_room() {
    // テスト項目: 同じルームへの連続した publish は送信順に届く
    // given (前提条件):
    let server = TestServer::start().await;
    let mut sender = TestClient::connect(&server, "t-c1").await;
    let mut receiver = TestClient::connect(&server, "t-c2").await;
    sender.subscribe("chat:9").await;
    receiver.subscribe("chat:9").await;

    // when (操作):
    for n in 0..20 {
        sender
            .send_json(json!({"type": "chat_message", "roomId": "9", "message": format!("m{n}")}))
            .await;
    }

    // then (期待する結果):
    for n in 0..20 {
        assert_eq!(
            receiver.next_json().await["payload"]["message"],
            format!("m{n}")
        );
    }
}

#[tokio::test]
async fn test_location_updates_flow_from_driver_to_customer() {
    // テスト項目: ドライバーの位置情報が進行中の注文の顧客に届き、顧客からの送信は拒否される
    // given (前提条件):
    let server = TestServer::start().await;
    server.put_order("42", Some("d1"), "in_transit").await;
    let mut driver = TestClient::connect(&server, "t-d1").await;
    let mut customer = TestClient::connect(&server, "t-c1").await;
    assert_eq!(driver.subscribe("driver_location:d1").await["type"], "subscribed");
    assert_eq!(customer.subscribe("driver_location:d1").await["type"], "subscribed");
    let location = json!({
        "type": "location_update",
        "latitude": 35.68,
        "longitude": 139.76,
        "trackingType": "gps",
        "sharingLevel": "order_parties",
    });

    // when (操作):
    driver.send_json(location.clone()).await;
    let received = customer.next_json().await;
    customer.send_json(location).await;
    let rejected = customer.next_json().await;

    // then (期待する結果):
    assert_eq!(received["type"], "location_update");
    assert_eq!(received["roomId"], "driver_location:d1");
    assert_eq!(received["payload"]["latitude"], 35.68);
    assert_eq!(rejected["code"], "forbidden");
}

#[tokio::test]
async fn test_invalid_frames_are_answered_with_errors() {
    // テスト項目: 不正なフレームはエラーで応答され、接続は維持される
    // given (前提条件):
    let server = TestServer::start().await;
    let mut client = TestClient::connect(&server, "t-c1").await;
    client.subscribe("chat:7").await;

    // when (操作):
    client.send_json(json!({"type": "teleport"})).await;
    let unknown = client.next_json().await;
    client
        .send_json(json!({"type": "order_update", "orderId": "42", "status": "delivered"}))
        .await;
    let system_only = client.next_json().await;
    client
        .send_json(json!({"type": "chat_message", "roomId": "7", "message": "   "}))
        .await;
    let blank = client.next_json().await;
    client.send_json(json!({"type": "ping"})).await;
    let pong = client.next_json().await;

    // then (期待する結果):
    assert_eq!(unknown["code"], "invalid_event");
    assert_eq!(system_only["code"], "invalid_event");
    assert_eq!(blank["code"], "invalid_event");
    assert_eq!(pong["type"], "pong");
    assert_eq!(server.health().await["connections"], 1);
}

#[tokio::test]
async fn test_silent_connection_is_closed_after_two_intervals() {
    // テスト項目: 2 × interval 無通信の接続は切断され、全ルームから削除される
    // given (前提条件):
    let server = TestServer::start_with(ServerConfig {
        heartbeat_interval: Duration::from_millis(100),
        ..ServerConfig::default()
    })
    .await;
    let mut silent = TestClient::connect(&server, "t-c1").await;
    let mut lively = TestClient::connect(&server, "t-c2").await;
    silent.subscribe("chat:7").await;
    lively.subscribe("chat:7").await;

    // when (操作):
    lively.answer_pings(Duration::from_millis(800)).await;
    let closed = silent.wait_closed(Duration::from_secs(2)).await;

    // then (期待する結果):
    assert!(closed);
    assert_eq!(server.health().await["connections"], 1);
    let rooms: serde_json::Value = reqwest::get(server.http_url("/debug/rooms"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rooms["rooms"], json!([{"roomId": "chat:7", "members": 1}]));
}

#[tokio::test]
async fn test_silence_starting_between_pings_is_reclaimed_on_deadline() {
    // テスト項目: ping の直後から無通信になった接続も、最後の受信から 2 × interval で切断される
    // given (前提条件):
    let server = TestServer::start_with(ServerConfig {
        heartbeat_interval: Duration::from_millis(300),
        ..ServerConfig::default()
    })
    .await;
    let mut client = TestClient::connect(&server, "t-c1").await;
    tokio::time::sleep(Duration::from_millis(330)).await;

    // when (操作):
    client.send_json(json!({"type": "ping"})).await;
    let last_traffic = Instant::now();
    let closed = client.wait_closed(Duration::from_millis(800)).await;
    let elapsed = last_traffic.elapsed();

    // then (期待する結果):
    assert!(closed);
    assert!(elapsed >= Duration::from_millis(550), "closed too early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(800), "closed too late: {elapsed:?}");
}

#[tokio::test]
async fn test_client_disconnect_leaves_every_room() {
    // テスト項目: クライアントが切断すると全ルームから削除される
    // given (前提条件):
    let server = TestServer::start().await;
    let mut client = TestClient::connect(&server, "t-c1").await;
    client.subscribe("chat:7").await;
    client.subscribe("user:c1").await;

    // when (操作):
    drop(client);
    let mut remaining = 1;
    for _ in 0..40 {
        remaining = server.health().await["connections"].as_u64().unwrap();
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // then (期待する結果):
    assert_eq!(remaining, 0);
    let rooms: serde_json::Value = reqwest::get(server.http_url("/debug/rooms"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rooms["rooms"], json!([]));
}

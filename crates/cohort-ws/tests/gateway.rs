use cohort_core::{auth, AppConfig, AppState};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SECRET: &str = "gateway-test-secret";

async fn start_server() -> (SocketAddr, AppState) {
    let pool = cohort_db::create_pool("sqlite::memory:", 1).await.unwrap();
    cohort_db::run_migrations(&pool).await.unwrap();
    let state = AppState::new(
        pool,
        AppConfig {
            jwt_secret: SECRET.into(),
            min_send_interval_ms: 0,
            ..AppConfig::default()
        },
    );

    for id in [1, 2, 9] {
        cohort_db::users::create_user(&state.db, id, &format!("u{id}@example.com"), &format!("User{id}"), "Test", None)
            .await
            .unwrap();
        cohort_db::profiles::create_profile(&state.db, id + 1000, id, "math")
            .await
            .unwrap();
    }
    cohort_db::groups::create_group(&state.db, 100, "Algebra", None, 5).await.unwrap();
    cohort_db::members::add_member(&state.db, 100, 1001).await.unwrap();
    cohort_db::members::add_member(&state.db, 100, 1002).await.unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = cohort_ws::gateway_router().with_state(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn connect(addr: SocketAddr, user_id: i64) -> Client {
    let token = auth::create_token(user_id, SECRET, 3600).unwrap();
    let (mut ws, _) = connect_async(format!("ws://{addr}/gateway?token={token}"))
        .await
        .unwrap();
    let hello = next_frame(&mut ws).await;
    assert_eq!(hello["op"], json!(10));
    assert_eq!(hello["d"]["user_id"], json!(user_id.to_string()));
    ws
}

async fn next_frame(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("frame before timeout")
            .expect("stream open")
            .expect("valid frame");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn send(ws: &mut Client, frame: Value) {
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

#[tokio::test]
async fn unauthenticated_upgrade_is_refused() {
    let (addr, _) = start_server().await;
    for url in [
        format!("ws://{addr}/gateway"),
        format!("ws://{addr}/gateway?token=bogus"),
    ] {
        match connect_async(url).await {
            Ok(_) => panic!("upgrade should have been refused"),
            Err(err) => assert!(err.to_string().contains("401"), "unexpected error: {err}"),
        }
    }
}

#[tokio::test]
async fn heartbeat_and_malformed_frames() {
    let (addr, _) = start_server().await;
    let mut ada = connect(addr, 1).await;

    send(&mut ada, json!({"op": 1})).await;
    assert_eq!(next_frame(&mut ada).await, json!({"op": 11}));

    send(&mut ada, json!({"op": 2, "t": "dance", "ack": 9})).await;
    let ack = next_frame(&mut ada).await;
    assert_eq!(ack["op"], json!(12));
    assert_eq!(ack["ack"], json!(9));
    assert_eq!(ack["d"], json!({"success": false, "message": "Invalid data", "data": null}));

    send(&mut ada, json!({"op": 2, "t": "join-group", "d": {}, "ack": 10})).await;
    assert_eq!(next_frame(&mut ada).await["d"]["message"], json!("groupId missing"));

    send(&mut ada, json!({"op": 2, "t": "read-messages", "d": {"messageIds": ["1"]}, "ack": 11})).await;
    let ack = next_frame(&mut ada).await;
    assert_eq!(ack["ack"], json!(11));
    assert_eq!(ack["d"]["message"], json!("Invalid data"));
}

#[tokio::test]
async fn room_lifecycle_over_the_wire() {
    let (addr, state) = start_server().await;
    let mut ada = connect(addr, 1).await;
    let mut bob = connect(addr, 2).await;
    let mut eve = connect(addr, 9).await;

    send(&mut ada, json!({"op": 2, "t": "join-group", "d": "100", "ack": 1})).await;
    let ack = next_frame(&mut ada).await;
    assert_eq!(ack["d"]["success"], json!(true));
    assert_eq!(ack["d"]["message"], json!("joined"));
    assert_eq!(ack["d"]["data"], json!({"messages": [], "nextCursor": null}));
    let roster = next_frame(&mut ada).await;
    assert_eq!(roster["t"], json!("group-online-users"));
    assert_eq!(roster["d"], json!(["1"]));

    send(&mut bob, json!({"op": 2, "t": "join-group", "d": {"groupId": 100}, "ack": 1})).await;
    assert_eq!(next_frame(&mut bob).await["d"]["message"], json!("joined"));
    assert_eq!(next_frame(&mut bob).await["d"], json!(["1", "2"]));
    assert_eq!(next_frame(&mut ada).await["d"], json!(["1", "2"]));

    send(&mut eve, json!({"op": 2, "t": "join-group", "d": 100, "ack": 4})).await;
    let ack = next_frame(&mut eve).await;
    assert_eq!(ack["d"]["success"], json!(false));
    assert_eq!(ack["d"]["message"], json!("You are not a member of this group"));

    send(&mut bob, json!({"op": 2, "t": "typing", "d": {"groupId": "100"}})).await;
    let typing = next_frame(&mut ada).await;
    assert_eq!(typing["t"], json!("user-typing"));
    assert_eq!(typing["d"], json!({"userId": "2", "fullname": "User2 Test"}));

    send(
        &mut ada,
        json!({"op": 2, "t": "send-message", "d": {"groupId": "100", "message": "hello"}, "ack": 2}),
    )
    .await;
    let ack = next_frame(&mut ada).await;
    assert_eq!(ack["d"]["message"], json!("sent"));
    assert_eq!(ack["d"]["data"]["message"], json!("hello"));
    let message_id = ack["d"]["data"]["id"].clone();

    let own_copy = next_frame(&mut ada).await;
    assert_eq!(own_copy["t"], json!("new-message"));
    let delivered = next_frame(&mut bob).await;
    assert_eq!(delivered["t"], json!("new-message"));
    assert_eq!(delivered["d"]["id"], message_id);
    assert_eq!(delivered["d"]["sender"]["firstname"], json!("User1"));
    assert!(own_copy["s"].as_u64().unwrap() > roster["s"].as_u64().unwrap());

    send(
        &mut bob,
        json!({"op": 2, "t": "read-messages", "d": {"groupId": 100, "messageIds": [message_id]}, "ack": 3}),
    )
    .await;
    assert_eq!(next_frame(&mut bob).await["d"]["message"], json!("marked as read"));
    let read = next_frame(&mut ada).await;
    assert_eq!(read["t"], json!("messages-read"));
    assert_eq!(read["d"]["userId"], json!("2"));

    send(&mut ada, json!({"op": 2, "t": "fetch-messages", "d": {"groupId": 100, "limit": 10}, "ack": 5})).await;
    let page = next_frame(&mut ada).await;
    assert_eq!(page["d"]["success"], json!(true));
    let fetched = &page["d"]["data"]["messages"][0];
    assert_eq!(fetched["isRead"], json!(true));
    assert_eq!(fetched["fullyRead"], json!(true));
    assert_eq!(fetched["readCount"], json!(1));

    bob.close(None).await.unwrap();
    assert_eq!(next_frame(&mut ada).await["d"], json!(["1"]));
    assert_eq!(state.presence.roster(100), vec![1]);
}

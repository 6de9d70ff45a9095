use std::time::Duration;

use kachel_channel::{connect_with_config, ChannelConfig};
use kachel_envelope::{decode_call, encode_response, ResponseEnvelope};
use kachel_transport::{MessageConnection, WebSocketConnection};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;

/// Minimal controller: answers `get` and `click`, hangs up on `hangup`.
async fn controller() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (tcp, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let ws = accept_async(tcp).await.unwrap();
                let mut conn = WebSocketConnection::new(ws);
                while let Some(Ok(text)) = conn.recv().await {
                    let call = decode_call(&text).unwrap();
                    let value = match call.command.as_str() {
                        "get" => json!({"sensors": {}, "miner_ok": true}),
                        "click" => json!({"ok": true, "target": call.args.first().cloned().unwrap_or(Value::Null)}),
                        "hangup" => {
                            let _ = conn.close().await;
                            return;
                        }
                        _ => Value::Null,
                    };
                    let response = ResponseEnvelope::new(call.command, call.sequence, value);
                    conn.send(encode_response(&response).unwrap()).await.unwrap();
                }
            });
        }
    });
    format!("ws://{addr}/ws")
}

fn fast_reconnect() -> ChannelConfig {
    ChannelConfig {
        reconnect_delay: Duration::from_millis(50),
        ..ChannelConfig::default()
    }
}

#[tokio::test]
async fn calls_over_websocket() {
    let address = controller().await;
    let channel = connect_with_config(address, fast_reconnect());
    assert_eq!(channel.connected().await.unwrap(), 1);

    let state = channel.call("get", vec![], Map::new()).await.unwrap();
    assert_eq!(state["miner_ok"], json!(true));

    let clicked = channel
        .call("click", vec![json!("relay_fan")], Map::new())
        .await
        .unwrap();
    assert_eq!(clicked, json!({"ok": true, "target": "relay_fan"}));
}

#[tokio::test]
async fn reconnects_after_server_hangup() {
    let address = controller().await;
    let channel = connect_with_config(address, fast_reconnect());
    let mut events = channel.connect_events();
    assert_eq!(events.next().await, Some(1));

    let first = channel.issue("get", vec![], Map::new()).await.unwrap();
    assert_eq!(first.await.unwrap()["miner_ok"], json!(true));
    let hangup = channel.issue("hangup", vec![], Map::new()).await.unwrap();
    assert_eq!(hangup.sequence(), 0);

    assert_eq!(events.next().await, Some(2));
    let after = channel.issue("get", vec![], Map::new()).await.unwrap();
    assert_eq!((after.sequence(), after.generation()), (0, 2));
    assert_eq!(after.await.unwrap()["sensors"], json!({}));
}

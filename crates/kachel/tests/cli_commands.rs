#![cfg(feature = "cli")]

use std::process::{Command, Output};

use kachel::envelope::{decode_call, encode_response, ResponseEnvelope};
use kachel::transport::{MessageConnection, WebSocketConnection};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;

async fn controller() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(ws) = accept_async(tcp).await else {
                    return;
                };
                let mut conn = WebSocketConnection::new(ws);
                while let Some(Ok(text)) = conn.recv().await {
                    let call = decode_call(&text).unwrap();
                    let value = match call.command.as_str() {
                        "get" => json!({"miner_ok": true, "sensors": {}}),
                        "click" => json!({"clicked": call.args, "kwargs": call.kwargs}),
                        _ => Value::Null,
                    };
                    let response = ResponseEnvelope::new(call.command, call.sequence, value);
                    if conn.send(encode_response(&response).unwrap()).await.is_err() {
                        return;
                    }
                }
            });
        }
    });
    format!("ws://{addr}/ws")
}

async fn kachel(args: &[&str]) -> Output {
    let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
    tokio::task::spawn_blocking(move || {
        Command::new(env!("CARGO_BIN_EXE_kachel"))
            .args(["--log-level", "error", "--format", "json"])
            .args(&args)
            .env_remove("KACHEL_URL")
            .output()
            .expect("kachel should run")
    })
    .await
    .unwrap()
}

fn stdout_json_lines(output: &Output) -> Vec<Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("stdout should be JSON lines"))
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn call_prints_return_value() {
    let url = controller().await;
    let output = kachel(&[
        "call",
        "--url",
        &url,
        "click",
        "--args",
        r#"["relay_fan"]"#,
        "--kwargs",
        r#"{"hold":true}"#,
    ])
    .await;

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let lines = stdout_json_lines(&output);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["command"], "click");
    assert_eq!(lines[0]["sequence"], 0);
    assert_eq!(lines[0]["generation"], 1);
    assert_eq!(
        lines[0]["return"],
        json!({"clicked": ["relay_fan"], "kwargs": {"hold": true}})
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn watch_polls_until_count() {
    let url = controller().await;
    let output = kachel(&["watch", "--url", &url, "--interval", "50ms", "--count", "2"]).await;

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let lines = stdout_json_lines(&output);
    assert_eq!(lines.len(), 2);
    for line in &lines {
        assert_eq!(line["command"], "get");
        assert_eq!(line["return"]["miner_ok"], true);
        // each poll resolves before the next is issued, so the table compacts back to 0
        assert_eq!(line["sequence"], 0);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn call_times_out_without_controller() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    drop(listener);

    let output = kachel(&["call", "--url", &url, "get", "--timeout", "300ms"]).await;
    assert_eq!(output.status.code(), Some(124));
    assert!(String::from_utf8_lossy(&output.stderr).contains("timed out"));
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_args_are_usage_errors() {
    let output = kachel(&["call", "--url", "ws://127.0.0.1:9/ws", "click", "--args", "{}"]).await;
    assert_eq!(output.status.code(), Some(64));
}

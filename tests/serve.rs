use assert_cmd::prelude::*;
use futures_util::{SinkExt, StreamExt};
use std::{fs, net::TcpListener, process::Command, time::Duration};
use tempfile::TempDir;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::protocol::Message;

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Full-stack smoke test; needs a Postgres reachable via the
/// `POSTGRES_*` environment (defaults to localhost:5432, algostr/algostr).
/// Run with `cargo test -- --ignored`.
#[tokio::test]
#[ignore]
async fn serve_answers_http_and_challenges_ws() {
    let dir = TempDir::new().unwrap();
    let port = free_port();
    let env_path = dir.path().join("env");
    let pg = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.into());
    fs::write(
        &env_path,
        format!(
            concat!(
                "POSTGRES_HOST={}\n",
                "POSTGRES_PORT={}\n",
                "POSTGRES_USER={}\n",
                "POSTGRES_PASSWORD={}\n",
                "POSTGRES_DB={}\n",
                "PURGE_MONTHS=3\n",
                "BIND=127.0.0.1:{}\n",
                "RELAY_NAME=smoke\n",
                "RELAYS_UPSTREAM=ws://127.0.0.1:9\n",
            ),
            pg("POSTGRES_HOST", "127.0.0.1"),
            pg("POSTGRES_PORT", "5432"),
            pg("POSTGRES_USER", "algostr"),
            pg("POSTGRES_PASSWORD", "algostr"),
            pg("POSTGRES_DB", "algostr"),
            port,
        ),
    )
    .unwrap();

    let mut child = Command::cargo_bin("algostr")
        .unwrap()
        .args(["--env", env_path.to_str().unwrap()])
        .spawn()
        .unwrap();

    // allow the server to start
    sleep(Duration::from_millis(500)).await;

    // NIP-11 document
    let url = format!("http://127.0.0.1:{}/", port);
    let client = reqwest::Client::new();
    let info: serde_json::Value = client
        .get(&url)
        .header("Accept", "application/nostr+json")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["name"], "smoke");

    // health check
    let health: serde_json::Value = reqwest::get(format!("http://127.0.0.1:{}/healthz", port))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    // WebSocket AUTH challenge, then auth-required rejection
    let ws_url = format!("ws://127.0.0.1:{}/", port);
    let (mut ws, _) = tokio_tungstenite::connect_async(ws_url).await.unwrap();
    let first = ws.next().await.unwrap().unwrap();
    let Message::Text(txt) = first else {
        panic!("expected text frame")
    };
    let val: serde_json::Value = serde_json::from_str(&txt).unwrap();
    assert_eq!(val[0], "AUTH");

    let req = serde_json::json!(["REQ", "s", {"kinds": [1]}]);
    ws.send(Message::Text(req.to_string())).await.unwrap();
    let mut rejected = false;
    while let Some(msg) = ws.next().await {
        if let Message::Text(t) = msg.unwrap() {
            if t.contains("auth-required") {
                rejected = true;
                break;
            }
        }
    }
    assert!(rejected);

    child.kill().unwrap();
    let _ = child.wait();
}

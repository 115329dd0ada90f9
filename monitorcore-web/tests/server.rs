use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use monitorcore::{Broadcaster, Snapshot};
use monitorcore_web::{router, serve, AppState};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};

struct TestServer {
    addr: SocketAddr,
    state: AppState,
    _shutdown: oneshot::Sender<()>,
}

async fn start(static_dir: Option<&Path>) -> TestServer {
    let state = AppState::new(Broadcaster::new());
    let app = router(state.clone(), static_dir);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        serve(listener, app, async {
            rx.await.ok();
        })
        .await
        .unwrap();
    });

    TestServer {
        addr,
        state,
        _shutdown: tx,
    }
}

async fn wait_for_subscribers(state: &AppState, count: usize) {
    timeout(Duration::from_secs(5), async {
        while state.broadcaster().len() != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber count never reached");
}

async fn next_json<S>(ws: &mut S) -> Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("no message")
            .unwrap()
            .unwrap();
        if msg.is_text() {
            return serde_json::from_str(msg.to_text().unwrap()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_status_endpoint() {
    let server = start(None).await;
    let body: Value = reqwest::get(format!("http://{}/api/status", server.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "running");
    assert_eq!(body["monitor_exe"], "not found");
    assert_eq!(body["subscribers"], 0);
}

#[tokio::test]
async fn test_status_reports_fatal_error() {
    let server = start(None).await;
    server.state.set_producer("/opt/monitor/monitor");
    server.state.set_fatal("Failed to start monitor");

    let body: Value = reqwest::get(format!("http://{}/api/status", server.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["monitor_exe"], "/opt/monitor/monitor");
    assert_eq!(body["error"], "Failed to start monitor");
}

#[tokio::test]
async fn test_dashboard_page() {
    let server = start(None).await;
    let response = reqwest::get(format!("http://{}/", server.addr)).await.unwrap();
    assert!(response.status().is_success());
    let text = response.text().await.unwrap();
    assert!(text.contains("<title>MonitorCore</title>"));
}

#[tokio::test]
async fn test_static_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.txt"), "hi").unwrap();
    let server = start(Some(dir.path())).await;

    let text = reqwest::get(format!("http://{}/static/hello.txt", server.addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(text, "hi");
}

#[tokio::test]
async fn test_websocket_receives_updates_in_order() {
    let server = start(None).await;
    let (mut ws, _) = connect_async(format!("ws://{}/ws", server.addr)).await.unwrap();
    wait_for_subscribers(&server.state, 1).await;

    for seq in 0..3 {
        let snapshot = Snapshot::decode(&format!(r#"{{"seq":{}}}"#, seq)).unwrap();
        server.state.broadcaster().publish(snapshot);
    }

    for seq in 0..3 {
        assert_eq!(
            next_json(&mut ws).await,
            json!({"event": "system_update", "data": {"seq": seq}})
        );
    }
}

#[tokio::test]
async fn test_websocket_fans_out_to_every_client() {
    let server = start(None).await;
    let (mut a, _) = connect_async(format!("ws://{}/ws", server.addr)).await.unwrap();
    let (mut b, _) = connect_async(format!("ws://{}/ws", server.addr)).await.unwrap();
    wait_for_subscribers(&server.state, 2).await;

    server
        .state
        .broadcaster()
        .publish(Snapshot::decode(r#"{"memory":{"usagePercent":42}}"#).unwrap());

    for ws in [&mut a, &mut b] {
        let value = next_json(ws).await;
        assert_eq!(value["data"]["memory"]["usagePercent"], 42);
    }
}

#[tokio::test]
async fn test_fatal_error_replayed_to_new_client() {
    let server = start(None).await;
    server.state.set_fatal("Monitor executable not found");

    let (mut ws, _) = connect_async(format!("ws://{}/ws", server.addr)).await.unwrap();
    assert_eq!(
        next_json(&mut ws).await,
        json!({"event": "error", "data": {"message": "Monitor executable not found"}})
    );
}

#[tokio::test]
async fn test_fatal_error_pushed_to_connected_client() {
    let server = start(None).await;
    let (mut ws, _) = connect_async(format!("ws://{}/ws", server.addr)).await.unwrap();
    wait_for_subscribers(&server.state, 1).await;

    server.state.set_fatal("Monitor stream failed");
    assert_eq!(next_json(&mut ws).await["event"], "error");
}

#[tokio::test]
async fn test_disconnect_unregisters_subscriber() {
    let server = start(None).await;
    let (mut ws, _) = connect_async(format!("ws://{}/ws", server.addr)).await.unwrap();
    wait_for_subscribers(&server.state, 1).await;

    ws.close(None).await.unwrap();
    wait_for_subscribers(&server.state, 0).await;

    // Publishing with nobody listening is fine.
    let report = server
        .state
        .broadcaster()
        .publish(Snapshot::decode("{}").unwrap());
    assert_eq!(report.queued, 0);
}

#[tokio::test]
async fn test_closing_broadcaster_ends_sockets() {
    let server = start(None).await;
    let (mut ws, _) = connect_async(format!("ws://{}/ws", server.addr)).await.unwrap();
    wait_for_subscribers(&server.state, 1).await;

    server.state.broadcaster().close();

    // The server drops the connection; the stream ends or errors out.
    let end = timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) => break,
                Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(end.is_ok());
    let _ = ws.send(Message::Close(None)).await;
}

//! Integration tests for Trellis
//!
//! These tests run the whole service over a temporary project: pipeline,
//! file watcher and server, with a real WebSocket client.

use std::net::SocketAddr;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use trellis_indexer::Coordinator;
use trellis_server::{Broadcaster, ServerConfig, ServerMessage, ServerState, TrellisServer};
use trellis_watcher::{Pipeline, PipelineConfig, WatcherService};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(10);

struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    dir: TempDir,
}

fn write_project(root: &Path, files: &[(&str, &str)]) {
    std::fs::write(root.join("tsconfig.json"), r#"{ "include": ["src"] }"#).unwrap();
    for (rel, content) in files {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

async fn start_server(files: &[(&str, &str)]) -> TestServer {
    let dir = TempDir::new().unwrap();
    write_project(dir.path(), files);
    serve_project(dir).await
}

async fn serve_project(dir: TempDir) -> TestServer {
    let broadcaster = Arc::new(Broadcaster::new());
    let config = PipelineConfig {
        debounce: Duration::from_millis(20),
        recompute_on_attach: true,
    };
    let coordinator = Coordinator::new(dir.path().join("tsconfig.json"));
    let (pipeline, handle) = Pipeline::start(coordinator, broadcaster.clone(), config).await;
    tokio::spawn(pipeline.run());

    let mut watcher = WatcherService::new(dir.path(), handle.clone()).unwrap();
    watcher.start_watching().unwrap();
    tokio::spawn(async move { watcher.process_events().await });

    let server = TrellisServer::new(broadcaster, handle, ServerConfig::default());
    let state = server.state();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve(listener));

    TestServer { addr, state, dir }
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    client
}

async fn next_event(client: &mut Client) -> Value {
    loop {
        let msg = timeout(WAIT, client.next())
            .await
            .expect("no message within timeout")
            .expect("connection closed")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Read events until one satisfies `pred`, returning everything seen.
async fn events_until(client: &mut Client, pred: impl Fn(&Value) -> bool) -> Vec<Value> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(client).await;
        let done = pred(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

async fn join(client: &mut Client, state: &ServerState, session: &str) {
    let before = state.broadcaster.session_members(session).len();
    let frame = json!({ "event": "join-session", "data": session }).to_string();
    client.send(Message::Text(frame)).await.unwrap();

    timeout(WAIT, async {
        while state.broadcaster.session_members(session).len() == before {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("join was not registered");
}

/// Minimal HTTP/1.1 request, returns the raw response.
async fn http(addr: SocketAddr, method: &str, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        method, path, addr
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    timeout(WAIT, stream.read_to_string(&mut response))
        .await
        .expect("no HTTP response within timeout")
        .unwrap();
    response
}

fn is_update(event: &Value) -> bool {
    event["event"] == "uml_update"
}

#[tokio::test]
async fn test_client_receives_current_diagram_on_connect() {
    let server = start_server(&[(
        "src/controller.ts",
        "class Controller extends Base { handle(req: Request): Response { return null; } }",
    )])
    .await;

    let mut client = connect(server.addr).await;
    let first = next_event(&mut client).await;

    assert_eq!(first["event"], "uml_update");
    assert_eq!(
        first["data"],
        concat!(
            "@startuml\nclass Controller {\n  handle(req: Request): Response\n}\n",
            "Controller --> Base\n@enduml"
        )
    );
}

#[tokio::test]
async fn test_no_blank_diagram_before_first_success() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path(), &[("src/a.ts", "class A {}")]);
    std::fs::write(dir.path().join("tsconfig.json"), "{ not json").unwrap();
    let server = serve_project(dir).await;

    let mut client = connect(server.addr).await;
    let first = next_event(&mut client).await;
    assert_eq!(first["event"], "error");
}

#[tokio::test]
async fn test_file_change_pushes_new_diagram() {
    let server = start_server(&[("src/a.ts", "class A {}")]).await;
    let mut client = connect(server.addr).await;
    let first = next_event(&mut client).await;
    assert_eq!(first["data"], "@startuml\nclass A {\n}\n@enduml");

    std::fs::write(
        server.dir.path().join("src/a.ts"),
        "class A {}\nclass B extends A { run(): void {} }",
    )
    .unwrap();

    let events = events_until(&mut client, |e| {
        is_update(e) && e["data"].as_str().is_some_and(|text| text.contains("class B"))
    })
    .await;
    let last = events.last().unwrap();
    assert_eq!(
        last["data"],
        "@startuml\nclass A {\n}\nclass B {\n  run(): void\n}\nB --> A\n@enduml"
    );
}

#[tokio::test]
async fn test_broken_file_reports_error_and_keeps_others() {
    let server = start_server(&[("src/a.ts", "class A {}")]).await;
    let mut client = connect(server.addr).await;
    next_event(&mut client).await;

    std::fs::write(server.dir.path().join("src/b.ts"), "class Broken { oops( {").unwrap();

    let events = events_until(&mut client, |e| e["event"] == "error").await;
    let error = events.last().unwrap();
    let message = error["data"]["message"].as_str().unwrap();
    assert!(message.contains("b.ts"), "unexpected message: {}", message);

    let diagram = http(server.addr, "GET", "/api/diagram").await;
    assert!(diagram.contains("class A"));
    assert!(!diagram.contains("Broken"));
}

#[tokio::test]
async fn test_session_messages_stay_in_room() {
    let server = start_server(&[("src/a.ts", "class A {}")]).await;
    let mut x = connect(server.addr).await;
    let mut y = connect(server.addr).await;
    next_event(&mut x).await;
    next_event(&mut y).await;

    join(&mut x, &server.state, "X").await;
    join(&mut y, &server.state, "Y").await;

    let broadcaster = &server.state.broadcaster;
    assert_eq!(broadcaster.send_to_session("X", ServerMessage::error("for X")), 1);
    broadcaster.broadcast_all(ServerMessage::error("marker"));

    let for_x = |e: &Value| e["data"]["message"] == "for X";
    let marker = |e: &Value| e["data"]["message"] == "marker";

    let x_events = events_until(&mut x, marker).await;
    assert!(x_events.iter().any(for_x));

    let y_events = events_until(&mut y, marker).await;
    assert!(!y_events.iter().any(for_x));
}

#[tokio::test]
async fn test_session_diagram_endpoint() {
    let server = start_server(&[("src/a.ts", "class A {}")]).await;
    let mut client = connect(server.addr).await;
    next_event(&mut client).await;
    join(&mut client, &server.state, "review").await;

    let response = http(server.addr, "POST", "/api/sessions/review/diagram").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains(r#""delivered":1"#));

    let response = http(server.addr, "POST", "/api/sessions/nobody/diagram").await;
    assert!(response.contains(r#""delivered":0"#));
}

#[tokio::test]
async fn test_disconnect_cleans_up() {
    let server = start_server(&[("src/a.ts", "class A {}")]).await;
    let mut client = connect(server.addr).await;
    next_event(&mut client).await;
    join(&mut client, &server.state, "X").await;

    client.close(None).await.unwrap();
    drop(client);

    let broadcaster = &server.state.broadcaster;
    timeout(WAIT, async {
        while broadcaster.connection_count() > 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection was not removed");
    assert_eq!(broadcaster.session_count(), 0);

    let health = http(server.addr, "GET", "/api/health").await;
    assert!(health.contains(r#""connections":0"#));
}

#[tokio::test]
async fn test_recompute_endpoint() {
    let server = start_server(&[("src/a.ts", "class A {}")]).await;
    let response = http(server.addr, "POST", "/api/recompute").await;
    assert!(response.starts_with("HTTP/1.1 202"));
}

#[test]
fn test_render_command() {
    let dir = TempDir::new().unwrap();
    write_project(
        dir.path(),
        &[("src/shape.ts", "abstract class Shape { abstract area(): number; }")],
    );

    let output = Command::new(env!("CARGO_BIN_EXE_trellis"))
        .arg("--root")
        .arg(dir.path())
        .arg("render")
        .output()
        .expect("Failed to execute trellis");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "@startuml\nclass Shape {\n  area(): number\n}\n@enduml\n");
}

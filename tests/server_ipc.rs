//! Research server over a real unix socket

use delve::export::ResearchExporter;
use delve::research::{AgentMode, ResearchAgent};
use delve::server::{serve, ErrorKind, IpcClient, IpcRequest, IpcServer, ServerState};
use delve::DelveError;
use std::sync::Arc;
use tempfile::TempDir;

struct UpperAgent;

impl ResearchAgent for UpperAgent {
    fn chat(&self, message: &str) -> String {
        message.to_uppercase()
    }

    fn mode(&self) -> AgentMode {
        AgentMode::Keyword
    }
}

#[tokio::test]
async fn test_ipc_roundtrip() {
    let temp = TempDir::new().unwrap();
    let socket = temp.path().join("run").join("delve.sock");

    let mut ipc_server = IpcServer::new(socket.clone());
    ipc_server.bind().await.unwrap();

    let exporter = ResearchExporter::new(temp.path().join("outputs"), "v1").unwrap();
    let state = Arc::new(ServerState::new(Some(exporter)));

    let serve_state = state.clone();
    let server = tokio::spawn(async move {
        serve(&ipc_server, serve_state).await.unwrap();
        ipc_server.shutdown().unwrap();
    });

    let client = IpcClient::new(socket.clone());

    let health = client.send(&IpcRequest::Health).await.unwrap();
    assert_eq!(health.data.unwrap()["status"], "initializing");

    let early = client
        .send(&IpcRequest::Research {
            query: "entropy".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(early.kind, Some(ErrorKind::NotInitialized));

    state.install_agent(Arc::new(UpperAgent)).await;

    let answer = client
        .send(&IpcRequest::Research {
            query: "entropy".to_string(),
        })
        .await
        .unwrap();
    assert!(answer.success);
    let data = answer.data.unwrap();
    assert_eq!(data["response"], "ENTROPY");
    assert_eq!(data["query"], "entropy");
    assert!(data["timestamp"].is_string());

    let status = client.send(&IpcRequest::Status).await.unwrap().data.unwrap();
    assert_eq!(status["queries"], 1);
    assert_eq!(status["session_active"], true);
    assert_eq!(status["exporter_ready"], true);

    let export = client.send(&IpcRequest::Export).await.unwrap();
    assert!(export.success);
    let path = export.data.unwrap()["path"].as_str().unwrap().to_string();
    assert!(std::path::Path::new(&path).exists());

    let stop = client.send(&IpcRequest::Stop).await.unwrap();
    assert!(stop.success);

    server.await.unwrap();
    assert!(!socket.exists());
}

#[tokio::test]
async fn test_client_without_server() {
    let temp = TempDir::new().unwrap();
    let client = IpcClient::new(temp.path().join("absent.sock"));

    let result = client.send(&IpcRequest::Health).await;
    assert!(matches!(result, Err(DelveError::ServerNotRunning)));
}

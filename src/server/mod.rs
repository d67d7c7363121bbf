// Research server: the pipeline behind a unix socket

mod ipc;
mod process;
mod signals;

pub use ipc::{read_frame, write_frame, ErrorKind, IpcClient, IpcRequest, IpcResponse, IpcServer};
pub use process::{ProcessManager, StopOutcome};
pub use signals::SignalHandler;

use crate::app::{build_exporter, build_research_agent};
use crate::config::{expand_tilde, Config};
use crate::error::{DelveError, Result};
use crate::export::ResearchExporter;
use crate::research::ResearchAgent;
use crate::session::ResearchSession;
use chrono::Local;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UnixStream;
use tokio::sync::{Mutex, Notify, RwLock};

/// PID bookkeeping for the configured server
pub fn process_manager(config: &Config) -> ProcessManager {
    ProcessManager::new(expand_tilde(&config.server.pid_file))
}

pub fn socket_path(config: &Config) -> PathBuf {
    expand_tilde(&config.server.socket_path)
}

enum AgentSlot {
    Initializing,
    Ready(Arc<dyn ResearchAgent>),
    Failed(String),
}

/// State shared by all connection handlers
pub struct ServerState {
    agent: RwLock<AgentSlot>,
    session: Mutex<Option<ResearchSession>>,
    exporter: Option<ResearchExporter>,
    shutdown: Notify,
}

impl ServerState {
    pub fn new(exporter: Option<ResearchExporter>) -> Self {
        Self {
            agent: RwLock::new(AgentSlot::Initializing),
            session: Mutex::new(None),
            exporter,
            shutdown: Notify::new(),
        }
    }

    /// Make the agent available and open a session for it
    pub async fn install_agent(&self, agent: Arc<dyn ResearchAgent>) {
        let session = ResearchSession::new(agent.mode().to_string());
        tracing::info!(session = %session.session_id, mode = %agent.mode(), "Research agent ready");

        *self.session.lock().await = Some(session);
        *self.agent.write().await = AgentSlot::Ready(agent);
    }

    /// Record a fatal setup error and stop serving
    pub async fn fail_initialization(&self, message: String) {
        tracing::error!("Research agent failed to initialize: {}", message);
        *self.agent.write().await = AgentSlot::Failed(message);
        self.request_shutdown();
    }

    pub async fn initialization_error(&self) -> Option<String> {
        match &*self.agent.read().await {
            AgentSlot::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }

    pub async fn shutdown_requested(&self) {
        self.shutdown.notified().await;
    }

    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        match request {
            IpcRequest::Research { query } => self.research(query).await,
            IpcRequest::Export => self.export().await,
            IpcRequest::Health => self.health().await,
            IpcRequest::Status => self.status().await,
            IpcRequest::Stop => {
                self.request_shutdown();
                IpcResponse::success("Shutdown initiated")
            }
        }
    }

    async fn research(&self, query: String) -> IpcResponse {
        if query.trim().is_empty() {
            return IpcResponse::error(ErrorKind::InvalidRequest, "Query cannot be empty");
        }

        let agent = match &*self.agent.read().await {
            AgentSlot::Ready(agent) => agent.clone(),
            AgentSlot::Initializing => {
                return IpcResponse::error(
                    ErrorKind::NotInitialized,
                    "Research agent is still initializing",
                )
            }
            AgentSlot::Failed(message) => {
                return IpcResponse::error(
                    ErrorKind::NotInitialized,
                    format!("Research agent failed to initialize: {}", message),
                )
            }
        };

        let started = Instant::now();
        let message = query.clone();
        let outcome = tokio::task::spawn_blocking(move || agent.chat(&message)).await;

        // A failed query is still logged, with its error as the response
        let (response, failure) = match outcome {
            Ok(response) => (response, None),
            Err(e) => {
                let text = format!("Error processing query: {}", e);
                (text.clone(), Some(text))
            }
        };

        if let Some(session) = self.session.lock().await.as_mut() {
            session.record(&query, &response, started);
        }

        match failure {
            Some(text) => IpcResponse::error(ErrorKind::ProcessingFailed, text),
            None => IpcResponse::success_with_data(json!({
                "response": response,
                "query": query,
                "timestamp": Local::now().to_rfc3339(),
            })),
        }
    }

    async fn export(&self) -> IpcResponse {
        match self.export_session().await {
            Ok(path) => IpcResponse::success_with_data(json!({
                "filename": path.file_name().map(|n| n.to_string_lossy().into_owned()),
                "path": path.display().to_string(),
            })),
            Err(DelveError::Session(message)) => {
                IpcResponse::error(ErrorKind::NotInitialized, message)
            }
            Err(e) => IpcResponse::error(ErrorKind::ProcessingFailed, e.to_string()),
        }
    }

    /// Export the active session as JSON and note it in the session
    pub async fn export_session(&self) -> Result<PathBuf> {
        let mut guard = self.session.lock().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| DelveError::Session("No active session".to_string()))?;
        let exporter = self
            .exporter
            .as_ref()
            .ok_or_else(|| DelveError::Export("Exporter unavailable".to_string()))?;

        let path = exporter.export_to_json(&*session, None)?;
        session.record_export(&path, "json");
        Ok(path)
    }

    async fn health(&self) -> IpcResponse {
        let status = match &*self.agent.read().await {
            AgentSlot::Initializing => "initializing",
            AgentSlot::Ready(_) => "healthy",
            AgentSlot::Failed(_) => "failed",
        };
        IpcResponse::success_with_data(json!({ "status": status }))
    }

    async fn status(&self) -> IpcResponse {
        let mode = match &*self.agent.read().await {
            AgentSlot::Ready(agent) => Some(agent.mode().to_string()),
            _ => None,
        };
        let session = self.session.lock().await;

        IpcResponse::success_with_data(json!({
            "agent_ready": mode.is_some(),
            "session_active": session.is_some(),
            "exporter_ready": self.exporter.is_some(),
            "mode": mode,
            "queries": session.as_ref().map(|s| s.len()).unwrap_or(0),
            "timestamp": Local::now().to_rfc3339(),
        }))
    }

    async fn has_queries(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }
}

/// Accept connections until shutdown is requested
pub async fn serve(server: &IpcServer, state: Arc<ServerState>) -> Result<()> {
    loop {
        tokio::select! {
            accepted = server.accept() => match accepted {
                Ok(stream) => {
                    let state = state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, state).await {
                            tracing::error!("Client handler error: {}", e);
                        }
                    });
                }
                Err(e) => tracing::warn!("Accept failed: {}", e),
            },
            _ = state.shutdown_requested() => {
                tracing::info!("Shutdown requested");
                return Ok(());
            }
        }
    }
}

async fn handle_client(mut stream: UnixStream, state: Arc<ServerState>) -> Result<()> {
    let response = match read_frame::<IpcRequest, _>(&mut stream).await {
        Ok(request) => state.handle(request).await,
        Err(DelveError::Json { source, .. }) => {
            IpcResponse::error(ErrorKind::InvalidRequest, format!("Malformed request: {}", source))
        }
        Err(e) => return Err(e),
    };

    write_frame(&mut stream, &response).await
}

/// The research server process
pub struct ResearchServer {
    config: Config,
    process_manager: ProcessManager,
}

impl ResearchServer {
    pub fn new(config: Config) -> Self {
        let process_manager = process_manager(&config);
        Self {
            config,
            process_manager,
        }
    }

    /// Run in the current process until stopped
    pub async fn run_foreground(&self) -> Result<()> {
        self.process_manager.acquire()?;
        tracing::info!("Research server starting");

        let result = self.run().await;

        if let Err(e) = self.process_manager.release() {
            tracing::error!("Failed to cleanup on exit: {}", e);
        }
        result
    }

    async fn run(&self) -> Result<()> {
        let mut signal_handler = SignalHandler::new()?;

        let mut ipc_server = IpcServer::new(socket_path(&self.config));
        ipc_server.bind().await?;

        let exporter = match build_exporter(&self.config) {
            Ok(exporter) => Some(exporter),
            Err(e) => {
                tracing::warn!("Exporter unavailable: {}", e);
                None
            }
        };
        let state = Arc::new(ServerState::new(exporter));

        // The socket is already bound so health reports "initializing" meanwhile
        let config = self.config.clone();
        let init_state = state.clone();
        tokio::spawn(async move {
            match tokio::task::spawn_blocking(move || build_research_agent(&config)).await {
                Ok(Ok(agent)) => init_state.install_agent(agent).await,
                Ok(Err(e)) => init_state.fail_initialization(e.to_string()).await,
                Err(e) => {
                    init_state
                        .fail_initialization(format!("initialization task failed: {}", e))
                        .await
                }
            }
        });

        tokio::select! {
            result = serve(&ipc_server, state.clone()) => result?,
            _ = signal_handler.wait() => {}
        }

        tracing::info!("Shutting down research server");

        if state.has_queries().await {
            match state.export_session().await {
                Ok(path) => tracing::info!("Session exported to {}", path.display()),
                Err(e) => tracing::error!("Failed to export session on shutdown: {}", e),
            }
        }

        ipc_server.shutdown()?;

        if let Some(message) = state.initialization_error().await {
            return Err(DelveError::Server(message));
        }

        tracing::info!("Research server shutdown complete");
        Ok(())
    }

    /// Fork into the background and run there
    pub fn start_detached(self) -> Result<()> {
        if self.process_manager.is_running() {
            return Err(DelveError::Server("Server is already running".to_string()));
        }

        let log_file = expand_tilde(&self.config.server.log_file);
        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DelveError::Io {
                source: e,
                context: format!("Failed to create log directory: {:?}", parent),
            })?;
        }

        let stdout = std::fs::File::create(log_file.with_extension("stdout")).map_err(|e| {
            DelveError::Io {
                source: e,
                context: "Failed to create stdout log file".to_string(),
            }
        })?;
        let stderr = std::fs::File::create(log_file.with_extension("stderr")).map_err(|e| {
            DelveError::Io {
                source: e,
                context: "Failed to create stderr log file".to_string(),
            }
        })?;

        // The PID file is written by ProcessManager after the fork
        let daemon = daemonize::Daemonize::new()
            .working_directory(std::env::current_dir().map_err(|e| DelveError::Io {
                source: e,
                context: "Failed to get current directory".to_string(),
            })?)
            .stdout(stdout)
            .stderr(stderr);

        daemon
            .start()
            .map_err(|e| DelveError::Server(format!("Failed to daemonize: {}", e)))?;

        // The runtime must be created after the fork
        let runtime = tokio::runtime::Runtime::new().map_err(|e| DelveError::Io {
            source: e,
            context: "Failed to create tokio runtime".to_string(),
        })?;
        runtime.block_on(self.run_foreground())
    }
}

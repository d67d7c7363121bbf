// Unix domain socket transport with a length-prefixed JSON protocol

use crate::error::{DelveError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

/// Maximum frame size (10MB)
const MAX_MESSAGE_SIZE: u32 = 10 * 1024 * 1024;

/// Requests a client can send to the research server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IpcRequest {
    /// Submit a research query
    Research { query: String },
    /// Export the server's session as JSON
    Export,
    /// Liveness and readiness probe
    Health,
    /// Server state summary
    Status,
    /// Ask the server to shut down
    Stop,
}

/// Failure classes a client can distinguish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The research agent is still being built
    NotInitialized,
    InvalidRequest,
    ProcessingFailed,
}

/// Response sent from the server back to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl IpcResponse {
    /// Create a successful response
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            kind: None,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Create a successful response with data
    pub fn success_with_data(data: serde_json::Value) -> Self {
        Self {
            success: true,
            kind: None,
            message: None,
            data: Some(data),
        }
    }

    /// Create an error response
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: Some(kind),
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Unix domain socket server for IPC
pub struct IpcServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
}

impl IpcServer {
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            listener: None,
        }
    }

    /// Bind to the socket path and start listening
    pub async fn bind(&mut self) -> Result<()> {
        // Remove a stale socket left by a previous run
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| DelveError::Io {
                source: e,
                context: format!("Failed to remove existing socket: {:?}", self.socket_path),
            })?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DelveError::Io {
                source: e,
                context: format!("Failed to create socket directory: {:?}", parent),
            })?;
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| DelveError::Io {
            source: e,
            context: format!("Failed to bind to socket: {:?}", self.socket_path),
        })?;

        self.listener = Some(listener);

        tracing::info!("IPC server listening on {:?}", self.socket_path);
        Ok(())
    }

    /// Accept incoming connections
    pub async fn accept(&self) -> Result<UnixStream> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| DelveError::Server("Server not bound".to_string()))?;

        let (stream, _addr) = listener.accept().await.map_err(|e| DelveError::Io {
            source: e,
            context: "Failed to accept connection".to_string(),
        })?;

        Ok(stream)
    }

    /// Shutdown the server and clean up the socket file
    pub fn shutdown(&self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| DelveError::Io {
                source: e,
                context: format!("Failed to remove socket: {:?}", self.socket_path),
            })?;
        }
        Ok(())
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

/// Read one length-prefixed JSON frame
pub async fn read_frame<T, S>(stream: &mut S) -> Result<T>
where
    T: DeserializeOwned,
    S: AsyncRead + Unpin,
{
    // 4-byte big-endian length prefix
    let length = stream.read_u32().await.map_err(|e| DelveError::Io {
        source: e,
        context: "Failed to read message length".to_string(),
    })?;

    if length > MAX_MESSAGE_SIZE {
        return Err(DelveError::Server(format!(
            "Message too large: {} bytes (max: {})",
            length, MAX_MESSAGE_SIZE
        )));
    }

    let mut buffer = vec![0u8; length as usize];
    stream
        .read_exact(&mut buffer)
        .await
        .map_err(|e| DelveError::Io {
            source: e,
            context: "Failed to read message payload".to_string(),
        })?;

    serde_json::from_slice(&buffer).map_err(|e| DelveError::Json {
        source: e,
        context: "Failed to deserialize IPC message".to_string(),
    })
}

/// Write one length-prefixed JSON frame
pub async fn write_frame<T, S>(stream: &mut S, value: &T) -> Result<()>
where
    T: Serialize,
    S: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(value).map_err(|e| DelveError::Json {
        source: e,
        context: "Failed to serialize IPC message".to_string(),
    })?;

    if payload.len() > MAX_MESSAGE_SIZE as usize {
        return Err(DelveError::Server(format!(
            "Message too large: {} bytes (max: {})",
            payload.len(),
            MAX_MESSAGE_SIZE
        )));
    }

    stream
        .write_u32(payload.len() as u32)
        .await
        .map_err(|e| DelveError::Io {
            source: e,
            context: "Failed to write message length".to_string(),
        })?;

    stream
        .write_all(&payload)
        .await
        .map_err(|e| DelveError::Io {
            source: e,
            context: "Failed to write message payload".to_string(),
        })?;

    stream.flush().await.map_err(|e| DelveError::Io {
        source: e,
        context: "Failed to flush message".to_string(),
    })?;

    Ok(())
}

/// IPC client for talking to a running research server
pub struct IpcClient {
    socket_path: PathBuf,
}

impl IpcClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    /// Connect, send one request and wait for its response
    pub async fn send(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused => {
                    DelveError::ServerNotRunning
                }
                _ => DelveError::Io {
                    source: e,
                    context: format!("Failed to connect to server at {:?}", self.socket_path),
                },
            })?;

        write_frame(&mut stream, request).await?;
        read_frame(&mut stream).await
    }
}

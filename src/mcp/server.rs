//! MCP server lifecycle for the Penpot tools.
//!
//! 1. **Initialisation**: version negotiation and capabilities
//! 2. **Operation**: `tools/list`, `tools/call`, `resources/list`,
//!    `resources/read` and `ping`
//! 3. **Shutdown**: end of input or a termination signal
//!
//! Requests are handled one at a time, so at most one update session is in
//! flight per server.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, error, info};

use crate::mcp::protocol::{
    negotiate_version, parse_message, ErrorCode, IncomingMessage, JsonRpcError, JsonRpcErrorData,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId, ToolCallParams, SERVER_NAME,
};
use crate::mcp::resources;
use crate::mcp::tools::{self, Backend};
use crate::mcp::transport::{StdioTransport, Transport};

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize received, waiting for initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
    /// Shutdown in progress.
    ShuttingDown,
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolCapabilities>,
    /// Resource-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceCapabilities>,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: Some(ToolCapabilities::default()),
            resources: Some(ResourceCapabilities::default()),
        }
    }
}

/// Tool-specific capabilities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change during the session.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Resources are read on demand; no subscriptions.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCapabilities {
    pub subscribe: bool,
    pub list_changed: bool,
}

/// Parameters for `resources/read`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceReadParams {
    pub uri: String,
}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    pub protocol_version: String,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// MCP server over a line transport.
#[derive(Debug)]
pub struct McpServer<R, W> {
    state: ServerState,
    transport: Transport<R, W>,
    protocol_version: Option<&'static str>,
    backend: Backend,
}

impl McpServer<tokio::io::BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    /// Creates a server on stdin and stdout.
    #[must_use]
    pub fn new(backend: Backend) -> Self {
        Self::with_transport(backend, StdioTransport::stdio())
    }
}

impl<R, W> McpServer<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a server on any transport.
    pub const fn with_transport(backend: Backend, transport: Transport<R, W>) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            transport,
            protocol_version: None,
            backend,
        }
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Protocol version agreed during initialisation.
    #[must_use]
    pub const fn protocol_version(&self) -> Option<&'static str> {
        self.protocol_version
    }

    /// Runs the MCP server main loop with graceful shutdown handling.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn run(&mut self) -> std::io::Result<()> {
        self.run_with_shutdown().await
    }

    #[cfg(unix)]
    async fn run_with_shutdown(&mut self) -> std::io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(std::io::Error::other)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(std::io::Error::other)?;

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                line_result = self.transport.read_line() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    #[cfg(windows)]
    async fn run_with_shutdown(&mut self) -> std::io::Result<()> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Received Ctrl+C, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                line_result = self.transport.read_line() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Returns `true` if the server should shut down.
    async fn handle_transport_result(
        &mut self,
        line_result: std::io::Result<Option<String>>,
    ) -> std::io::Result<bool> {
        let Some(line) = line_result? else {
            info!("Input closed, shutting down");
            self.state = ServerState::ShuttingDown;
            return Ok(true);
        };

        if line.trim().is_empty() {
            return Ok(false);
        }

        if let Some(reply) = self.handle_line(&line).await {
            self.transport.send(&reply).await?;
        }

        Ok(self.state == ServerState::ShuttingDown)
    }

    /// Handles one line of input and returns the reply to send, if any.
    pub async fn handle_line(&mut self, line: &str) -> Option<Value> {
        let reply = match parse_message(line) {
            Ok(IncomingMessage::Request(req)) => match self.handle_request(&req).await {
                Ok(response) => serde_json::to_value(response),
                Err(error) => serde_json::to_value(error),
            },
            Ok(IncomingMessage::Notification(notif)) => {
                self.handle_notification(&notif);
                return None;
            }
            Err(error) => serde_json::to_value(error),
        };
        match reply {
            Ok(value) => Some(value),
            Err(e) => {
                error!(error = %e, "Failed to serialise reply");
                None
            }
        }
    }

    async fn handle_request(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        debug!(method = %req.method, id = %req.id, "Request");
        match req.method.as_str() {
            "initialize" => self.handle_initialize(req),
            "tools/list" => self.handle_tools_list(req),
            "tools/call" => self.handle_tools_call(req).await,
            "resources/list" => self.handle_resources_list(req),
            "resources/read" => self.handle_resources_read(req),
            "ping" => Ok(Self::handle_ping(req)),
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        }
    }

    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        match notif.method.as_str() {
            "notifications/initialized" if self.state == ServerState::Initialising => {
                info!("Client initialised");
                self.state = ServerState::Running;
            }
            "notifications/cancelled" => debug!("Cancellation ignored; requests run to completion"),
            other => debug!(method = other, "Ignoring notification"),
        }
    }

    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        if self.state != ServerState::AwaitingInit {
            return Err(JsonRpcError::new(
                Some(req.id.clone()),
                JsonRpcErrorData::with_message(
                    ErrorCode::InvalidRequest,
                    "Server already initialised",
                ),
            ));
        }

        let params: InitializeParams = req.params_as("initialize")?;
        let version = negotiate_version(&params.protocol_version);
        if let Some(client) = &params.client_info {
            info!(client = %client.name, version = version, "Initialising");
        }

        self.protocol_version = Some(version);
        self.state = ServerState::Initialising;

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({
                "protocolVersion": version,
                "capabilities": ServerCapabilities::default(),
                "serverInfo": ServerInfo::default(),
            }),
        ))
    }

    fn handle_tools_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;
        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "tools": tools::definitions() }),
        ))
    }

    async fn handle_tools_call(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;
        let params: ToolCallParams = req.params_as("tool call")?;

        let result = tools::call(&self.backend, &params.name, &params.arguments).await;
        let result_value = serde_json::to_value(&result).map_err(|e| {
            error!(error = %e, "Failed to serialise tool call result");
            JsonRpcError::internal_error(req.id.clone(), "Internal error: failed to serialise result")
        })?;

        Ok(JsonRpcResponse::success(req.id.clone(), result_value))
    }

    fn handle_resources_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;
        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "resources": resources::definitions() }),
        ))
    }

    fn handle_resources_read(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;
        let params: ResourceReadParams = req.params_as("resource read")?;
        let contents = resources::read(&self.backend, &params.uri).ok_or_else(|| {
            JsonRpcError::invalid_params(req.id.clone(), format!("Unknown resource: {}", params.uri))
        })?;
        Ok(JsonRpcResponse::success(req.id.clone(), contents))
    }

    fn handle_ping(req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(req.id.clone(), json!({}))
    }

    fn require_running(&self, id: &RequestId) -> Result<(), JsonRpcError> {
        if self.state != ServerState::Running {
            return Err(JsonRpcError::new(
                Some(id.clone()),
                JsonRpcErrorData::with_message(ErrorCode::InvalidRequest, "Server not initialised"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::penpot::cache::FileCache;
    use crate::penpot::memory::InMemoryPlatform;
    use std::sync::Arc;
    use std::time::Duration;

    type TestServer = McpServer<&'static [u8], Vec<u8>>;

    fn server() -> TestServer {
        let backend = Backend::offline(
            Arc::new(InMemoryPlatform::new()),
            FileCache::new(Duration::from_secs(60), 4),
        );
        McpServer::with_transport(backend, Transport::new(&b""[..], Vec::new()))
    }

    async fn initialised() -> TestServer {
        let mut server = server();
        server
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{}}}"#)
            .await;
        server
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        server
    }

    #[tokio::test]
    async fn initialize_negotiates_version() {
        let mut server = server();
        let reply = server
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26","capabilities":{},"clientInfo":{"name":"test"}}}"#)
            .await
            .unwrap();
        assert_eq!(reply["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(reply["result"]["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(server.state(), ServerState::Initialising);

        let unknown = server
            .handle_line(r#"{"jsonrpc":"2.0","id":2,"method":"initialize","params":{"protocolVersion":"1999-01-01"}}"#)
            .await
            .unwrap();
        assert_eq!(unknown["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn unknown_version_gets_ours() {
        let mut server = server();
        let reply = server
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"1999-01-01"}}"#)
            .await
            .unwrap();
        assert_eq!(reply["result"]["protocolVersion"], "2024-11-05");
    }

    #[tokio::test]
    async fn tools_require_initialisation() {
        let mut server = server();
        let reply = server
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn lists_and_calls_tools() {
        let mut server = initialised().await;
        assert_eq!(server.state(), ServerState::Running);

        let list = server
            .handle_line(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
            .await
            .unwrap();
        let names: Vec<&str> = list["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"add_rectangle"));
        assert!(names.contains(&"apply_design_changes"));

        let call = server
            .handle_line(r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"nope","arguments":{}}}"#)
            .await
            .unwrap();
        assert_eq!(call["result"]["isError"], true);
    }

    #[tokio::test]
    async fn protocol_errors() {
        let mut server = initialised().await;
        let parse = server.handle_line("{not json").await.unwrap();
        assert_eq!(parse["error"]["code"], -32700);

        let method = server
            .handle_line(r#"{"jsonrpc":"2.0","id":9,"method":"prompts/list"}"#)
            .await
            .unwrap();
        assert_eq!(method["error"]["code"], -32601);

        let ping = server
            .handle_line(r#"{"jsonrpc":"2.0","id":10,"method":"ping"}"#)
            .await
            .unwrap();
        assert_eq!(ping["result"], json!({}));
    }

    #[tokio::test]
    async fn lists_and_reads_resources() {
        let mut server = initialised().await;
        let init_caps = ServerCapabilities::default();
        assert!(init_caps.resources.is_some());

        let list = server
            .handle_line(r#"{"jsonrpc":"2.0","id":4,"method":"resources/list"}"#)
            .await
            .unwrap();
        let uris: Vec<&str> = list["result"]["resources"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["uri"].as_str().unwrap())
            .collect();
        assert_eq!(uris, [resources::SERVER_INFO_URI, resources::CACHED_FILES_URI]);

        let info = server
            .handle_line(r#"{"jsonrpc":"2.0","id":5,"method":"resources/read","params":{"uri":"server://info"}}"#)
            .await
            .unwrap();
        assert_eq!(info["result"]["contents"][0]["uri"], "server://info");

        let cached = server
            .handle_line(r#"{"jsonrpc":"2.0","id":6,"method":"resources/read","params":{"uri":"penpot://cached-files"}}"#)
            .await
            .unwrap();
        let text = cached["result"]["contents"][0]["text"].as_str().unwrap();
        assert_eq!(serde_json::from_str::<Value>(text).unwrap()["count"], 0);

        let unknown = server
            .handle_line(r#"{"jsonrpc":"2.0","id":7,"method":"resources/read","params":{"uri":"penpot://schema"}}"#)
            .await
            .unwrap();
        assert_eq!(unknown["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn run_stops_at_end_of_input() {
        let input: &'static [u8] = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n";
        let backend = Backend::offline(
            Arc::new(InMemoryPlatform::new()),
            FileCache::new(Duration::from_secs(60), 4),
        );
        let mut server = McpServer::with_transport(backend, Transport::new(input, Vec::new()));
        server.run().await.unwrap();
        assert_eq!(server.state(), ServerState::ShuttingDown);
    }
}

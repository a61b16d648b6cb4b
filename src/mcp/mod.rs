//! Model Context Protocol (MCP) server implementation.
//!
//! Exposes Penpot operations as tools to AI assistants over stdio, using
//! JSON-RPC 2.0 messages. Server status and the file cache are readable as
//! resources.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         MCP Server                          │
//! │                                                             │
//! │   ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    │
//! │   │  Transport  │───▶│   Server    │───▶│   Tools     │    │
//! │   │   (stdio)   │    │  (lifecycle)│    │  (handlers) │    │
//! │   └─────────────┘    └─────────────┘    └─────────────┘    │
//! │                                                │            │
//! │                                                ▼            │
//! │                                  ┌──────────────────────┐  │
//! │                                  │ Editor / HttpPlatform │  │
//! │                                  └──────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! Targets MCP 2024-11-05 and also accepts 2025-03-26.

pub mod protocol;
pub mod resources;
pub mod server;
pub mod tools;
pub mod transport;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use server::McpServer;
pub use tools::Backend;
pub use transport::{StdioTransport, Transport};

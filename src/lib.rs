//! penpot-mcp: MCP server for AI-assisted editing of Penpot design files
//!
//! This library lets AI assistants read Penpot files and change them through
//! declarative intents, without knowing the platform's wire format.
//!
//! # Architecture
//!
//! The MCP server exposes small, typed tools. The AI decides what to draw:
//!
//! - **Read**: teams, projects, files, object trees, comments, libraries
//! - **Edit**: add shapes, restyle, move, group, delete, in validated batches
//! - **Export**: render an object to PNG, JPEG, SVG or PDF
//!
//! Every edit goes through one optimistic update: read the revision, build
//! the change list, submit once. A lost race is reported, never retried
//! silently.
//!
//! # Modules
//!
//! - [`config`] — Configuration loading and validation
//! - [`error`] — Configuration error types
//! - [`mcp`] — MCP protocol implementation
//! - [`penpot`] — Wire codec, change builder, update session and backends

pub mod config;
pub mod error;
pub mod mcp;
pub mod penpot;

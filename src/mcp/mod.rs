//! Model Context Protocol (MCP) server implementation.
//!
//! Exposes directory enumeration as MCP tools over a stdio transport using
//! JSON-RPC 2.0 messages.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          MCP Server                          │
//! │                                                              │
//! │  ┌───────────┐   ┌────────────┐   ┌──────────┐               │
//! │  │ Transport │──▶│   Server   │──▶│ Registry │──▶ handlers   │
//! │  │  (lines)  │   │ (lifecycle)│   │ (schema) │       │       │
//! │  └───────────┘   └────────────┘   └──────────┘       ▼       │
//! │                                         ┌──────────────────┐ │
//! │                                         │  ServerContext   │ │
//! │                                         │ scanner · cache  │ │
//! │                                         │ sessions · svcs  │ │
//! │                                         └──────────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod context;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod tools;
pub mod transport;

pub use context::{CacheStatus, ServerContext};
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use registry::{ParamKind, ParamSpec, Tool, ToolDefinition, ToolRegistry};
pub use server::McpServer;
pub use transport::{LineTransport, StdioTransport};

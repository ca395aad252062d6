//! treewalk-mcp: MCP server for bounded, paginated directory enumeration
//!
//! This library lets an MCP client enumerate arbitrarily large directory
//! trees without the server ever loading a whole tree into memory at once.
//!
//! # Architecture
//!
//! - **Listings**: filtered, sorted, offset-paginated batches; `next_offset`
//!   is the only continuation signal
//! - **Streams**: cursor-based sessions that walk a tree across calls
//! - **Ceilings**: memory, time, and entry-count limits that turn runaway
//!   scans into partial results
//! - **Cache**: TTL + LRU cache of complete listings
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types
//! - [`scan`]: Walking, filtering, ceilings, sorting, and pagination
//! - [`cache`]: Listing cache
//! - [`session`]: Stream sessions
//! - [`services`]: Usage, metrics, and health collaborators
//! - [`mcp`]: MCP protocol implementation

pub mod cache;
pub mod config;
pub mod error;
pub mod mcp;
pub mod scan;
pub mod services;
pub mod session;

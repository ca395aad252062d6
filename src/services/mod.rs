//! Collaborators consumed through narrow traits.
//!
//! The server depends only on the traits here. The bundled implementations
//! are small in-process defaults; embedders can swap in their own through
//! [`crate::mcp::ServerContext::with_services`].

mod health;
mod metrics;
mod usage;

pub use health::{HealthCheck, HealthStatus, ProcessHealth};
pub use metrics::{CodeMetrics, LineMetrics, MetricsReport};
pub use usage::{UsageAck, UsageLedger, UsageRecorder, UsageTotals};

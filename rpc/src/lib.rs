//! HTTP/JSON server for Agora governance.
//!
//! Provides endpoints for:
//! - DAO creation, settings and membership moderation
//! - Proposal submission and vote casting
//! - Quorum overview, quorum settings and proposal evaluation
//! - Vote delegation
//! - Execution queueing and queue inspection
//! - Health and Prometheus metrics
//!
//! Every response uses the same envelope: `{"success": true, "data": …}` or
//! `{"success": false, "error": {"message", "code", "details"?}}`. Caller
//! identity comes from the `x-user-id` header set by the authentication layer.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod server;

pub use error::{RpcError, RpcResult};
pub use extract::{ApiJson, ApiPath, ApiResponse, Caller, USER_ID_HEADER};
pub use server::{router, RpcServer, RpcState};

//! HTTP API.
//!
//! - `GET /health`, `GET /ready` - health checks, no auth
//! - `POST /v1/chat`, `POST /v1/agent-step` - routed completions
//! - `POST /v1/router/debug` - routing decision without dispatch
//! - `GET /v1/models` - registry dump
//! - `GET /v1/usage` - tenant usage summary
//! - `POST /v1/admin/models/invalidate` - only when `ADMIN_KEY` is set

mod auth;
mod chat;
mod debug;
mod models;
mod routes;
mod types;
mod usage;

pub use auth::{RequestId, REQUEST_ID_HEADER};
pub use routes::{build_router, serve, AppState};
pub use types::{parse_chat_request, ChatRequest};

//! # Omni Gateway
//!
//! An inference gateway: one authenticated HTTP API in front of several LLM
//! providers, choosing the cheapest, fastest or best model for each request.
//!
//! This library provides:
//! - An HTTP API for routed chat completions, routing diagnostics and usage
//! - Per-tenant API key authentication and fixed-window rate limiting
//! - Task classification and multi-criteria model ranking
//! - Provider dispatch with per-call retries and candidate fallback
//!
//! ## Request Flow
//!
//! ```text
//!   request ──▶ Gatekeeper ──▶ Classifier ──▶ Routing Engine ──▶ Dispatcher ──▶ response
//!               (auth + rate     (task type)    (ranked models     (retry, then      │
//!                limit)                          from registry)     next candidate)   ▼
//!                                                                              usage write
//!                                                                            (fire and forget)
//! ```
//!
//! ## Modules
//! - `api`: axum router, middleware and handlers
//! - `auth`: API keys and the gatekeeper
//! - `ratelimit`: fixed-window counters (Upstash REST or in-process)
//! - `registry`: model catalog types and the TTL cache
//! - `routing`: classifier, scorer and routing engine
//! - `dispatch`: provider table and fallback loop
//! - `llm`: provider transports
//! - `budget`: cost, savings and token estimates
//! - `usage`: audit writes and usage summaries
//! - `store`: persistence boundary

pub mod api;
pub mod auth;
pub mod budget;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod ratelimit;
pub mod registry;
pub mod routing;
pub mod store;
pub mod usage;

pub use config::Config;
pub use error::{ApiError, GatewayError};

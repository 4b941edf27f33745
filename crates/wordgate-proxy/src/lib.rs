//! Wordgate Proxy - content-censoring HTTP forward proxy engine.
//!
//! This crate implements the proxy itself: browser clients point at it, an
//! operator feeds it a denylist over a persistent control connection, and
//! requests whose URL (or, optionally, fetched HTML body) contains a
//! denylisted word are rewritten to fetch a fixed error page instead.
//!
//! ## Architecture
//!
//! ```text
//! Operator ──control──▶ Accept Loop ──owns──▶ PolicyStore
//!                            │                    │ snapshot per accept
//!                            ▼                    ▼
//! Browser ──connect──▶ Worker (task) ──▶ Request Filter ──▶ Origin
//!                            ▲                                 │
//!                            └───── Response Streamer ◀────────┘
//! ```
//!
//! - One control connection is accepted before clients are served; its
//!   `BLOCK`/`UNBLOCK` lines mutate the denylist between accepts.
//! - Each accepted client connection runs in its own spawned worker with an
//!   owned denylist snapshot; updates are visible only to workers accepted
//!   afterwards.
//! - Only `GET` requests are proxied; plain HTTP only (no TLS
//!   interception).

mod control;
mod error;
mod filter;
mod http;
mod server;
mod stream;
mod worker;

pub use control::ControlChannel;
pub use error::{ProxyError, Result};
pub use filter::{screen_request, FilterOutcome};
pub use http::{html_document, HttpRequest, ResponseHead};
pub use server::{
    BoundProxy, ProxyConfig, ProxyHandle, ProxyServer, DEFAULT_CLIENT_PORT, DEFAULT_CONTROL_PORT,
    DEFAULT_ERROR_URL, DEFAULT_ORIGIN_PORT,
};
pub use stream::relay_response;
pub use worker::REQUEST_BUFFER_SIZE;

//! Error types for the proxy.

use std::net::SocketAddr;

use thiserror::Error;

/// Proxy error type.
///
/// Everything except [`ProxyError::Bind`] and [`ProxyError::Address`] is a
/// per-connection condition: the worker that hits it logs and tears down its
/// own sockets while the accept loop keeps serving.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Failed to bind a listening socket.
    #[error("failed to bind to {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),

    /// Invalid listen address.
    #[error("invalid address: {0}")]
    Address(String),

    /// IO error on an established connection.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The client request could not be parsed.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Only GET requests are proxied.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    /// The request carried no Host header.
    #[error("request has no Host header")]
    MissingHost,

    /// The origin host did not resolve to any address.
    #[error("could not resolve origin host {0}")]
    OriginUnresolved(String),

    /// Resolving or connecting to the origin failed.
    #[error("could not connect to origin {host}: {source}")]
    OriginConnect {
        /// The origin host taken from the request's Host header.
        host: String,
        /// The underlying socket error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;

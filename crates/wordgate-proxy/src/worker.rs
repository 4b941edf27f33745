//! Per-connection request pipeline.
//!
//! One worker owns the entire life of an accepted client connection: it
//! reads and parses the request, screens the URL against its denylist
//! snapshot, fetches from the origin, optionally re-inspects HTML bodies,
//! and streams the final response back. Workers never share state; the
//! snapshot and both sockets are owned and close on every exit path when
//! the worker returns.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};

use wordgate_core::PolicySnapshot;

use crate::error::{ProxyError, Result};
use crate::filter::{screen_request, FilterOutcome};
use crate::http::{html_document, HttpRequest, ResponseHead};
use crate::server::ProxyConfig;
use crate::stream::relay_response;

/// Size of the request receive buffer. A request longer than this is
/// truncated to the first read.
pub const REQUEST_BUFFER_SIZE: usize = 8192;

/// Handles one accepted client connection end to end.
///
/// Origin resolution and connect failures are answered with a 502 page;
/// every other error propagates to the caller, which logs it and lets the
/// sockets drop.
pub async fn handle_client(
    mut client: TcpStream,
    policy: PolicySnapshot,
    config: Arc<ProxyConfig>,
) -> Result<()> {
    let mut buf = vec![0u8; REQUEST_BUFFER_SIZE];
    let n = client.read(&mut buf).await?;
    if n == 0 {
        // Client connected and went away without sending anything.
        return Ok(());
    }

    let mut request = HttpRequest::parse(&buf[..n])?;
    tracing::debug!(
        "client request: {} {} {}",
        request.method(),
        request.target(),
        request.version()
    );

    let outcome = screen_request(&mut request, &policy, &config.error_url, false)?;
    if outcome == FilterOutcome::Rewritten {
        tracing::info!("denylisted URL rewritten to error page");
    }

    if request.method() != "GET" {
        return Err(ProxyError::UnsupportedMethod(request.method().to_string()));
    }

    let host = request.host().ok_or(ProxyError::MissingHost)?;

    let (mut origin, mut first_chunk) =
        match fetch_origin(&host, config.origin_port, &request).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!("origin fetch for {} failed: {}", host, e);
                return send_bad_gateway(&mut client).await;
            }
        };

    if config.deep_inspection && request.target() != config.error_url {
        let head = ResponseHead::parse(&first_chunk);
        if let Some(document) = html_document(&first_chunk, &head) {
            if let Some(word) = policy.first_match(&document) {
                tracing::info!(
                    "denylisted word {:?} found in response body, refetching error page",
                    word
                );
                screen_request(&mut request, &policy, &config.error_url, true)?;

                match fetch_origin(&host, config.origin_port, &request).await {
                    Ok(refetched) => (origin, first_chunk) = refetched,
                    Err(e) => {
                        tracing::warn!("error-page refetch from {} failed: {}", host, e);
                        return send_bad_gateway(&mut client).await;
                    }
                }
            }
        }
    }

    let forwarded = relay_response(&mut origin, &mut client, &first_chunk).await?;
    tracing::debug!("forwarded {} bytes to client", forwarded);
    Ok(())
}

/// Opens a fresh origin connection, sends the request, and reads the first
/// chunk of the response.
async fn fetch_origin(
    host: &str,
    port: u16,
    request: &HttpRequest,
) -> Result<(TcpStream, Vec<u8>)> {
    let mut origin = connect_origin(host, port).await?;
    origin.write_all(&request.to_bytes()).await?;

    let mut buf = vec![0u8; REQUEST_BUFFER_SIZE];
    let n = origin.read(&mut buf).await?;
    buf.truncate(n);
    Ok((origin, buf))
}

/// Resolves the origin host and connects on the configured port.
async fn connect_origin(host: &str, port: u16) -> Result<TcpStream> {
    let mut addrs = lookup_host((host, port))
        .await
        .map_err(|e| ProxyError::OriginConnect {
            host: host.to_string(),
            source: e,
        })?;
    let addr = addrs
        .next()
        .ok_or_else(|| ProxyError::OriginUnresolved(host.to_string()))?;

    TcpStream::connect(addr)
        .await
        .map_err(|e| ProxyError::OriginConnect {
            host: host.to_string(),
            source: e,
        })
}

/// Answers the client with a minimal 502 page when the origin is
/// unreachable.
async fn send_bad_gateway(client: &mut TcpStream) -> Result<()> {
    let body = "<html><body><h1>502 Bad Gateway</h1></body></html>";
    let response = format!(
        "HTTP/1.1 502 Bad Gateway\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    client.write_all(response.as_bytes()).await?;
    Ok(())
}

//! Origin-to-client response relaying.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::http::ResponseHead;

/// Size of the relay read buffer.
const CHUNK_SIZE: usize = 8192;

/// Relays a buffered-plus-streamed origin response to the client.
///
/// `first_chunk` is the already-received start of the response. With a
/// `Content-Length` header its value is the authoritative body size: the
/// buffered chunk is forwarded, then further origin chunks are forwarded as
/// they arrive until that many body bytes have been seen or the origin
/// closes early. Without one, only the buffered chunk is forwarded and no
/// further read is attempted; a body delimited purely by connection close
/// is truncated to the first read.
///
/// Returns the total number of bytes written to the client.
pub async fn relay_response<O, C>(origin: &mut O, client: &mut C, first_chunk: &[u8]) -> Result<u64>
where
    O: AsyncRead + Unpin,
    C: AsyncWrite + Unpin,
{
    let head = ResponseHead::parse(first_chunk);

    client.write_all(first_chunk).await?;
    let mut forwarded = first_chunk.len() as u64;

    let Some(total) = head.content_length else {
        client.flush().await?;
        return Ok(forwarded);
    };

    let mut body_seen = first_chunk.len().saturating_sub(head.header_len);
    let mut buf = vec![0u8; CHUNK_SIZE];
    while body_seen < total {
        let n = origin.read(&mut buf).await?;
        if n == 0 {
            tracing::debug!(
                "origin closed {} body bytes before declared length",
                total - body_seen
            );
            break;
        }
        client.write_all(&buf[..n]).await?;
        body_seen += n;
        forwarded += n as u64;
    }

    client.flush().await?;
    Ok(forwarded)
}

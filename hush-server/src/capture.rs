//! Bounded body capture for the middleware.
//!
//! A body is read only up to the side's capture limit. The chunks read are
//! replayed in front of the unread rest, so the handler and the client
//! always get the full, unchanged body.

use axum::body::{Body, HttpBody};
use axum::http::{HeaderMap, header};
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, stream};
use hush_core::BodyCapture;

/// Read at most `limit` bytes of `body` for the log.
///
/// Returns the body to pass on and what was captured. A body that ends
/// within the limit is captured whole and handed on as a single buffer.
pub async fn capture_prefix(body: Body, limit: usize) -> Result<(Body, BodyCapture), axum::Error> {
    let total = body.size_hint().exact().and_then(|n| usize::try_from(n).ok());
    let mut data = body.into_data_stream();
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut seen = 0usize;

    while seen <= limit {
        match data.next().await {
            Some(Ok(chunk)) => {
                seen += chunk.len();
                chunks.push(chunk);
            }
            Some(Err(e)) => return Err(e),
            None => {
                let bytes = concat(&chunks);
                return Ok((Body::from(bytes.clone()), BodyCapture::Captured(bytes)));
            }
        }
    }

    let prefix = concat(&chunks).slice(..limit);
    let replay = stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>));
    let body = Body::from_stream(replay.chain(data));
    Ok((body, BodyCapture::Truncated { prefix, total }))
}

/// Whether a response body must be passed on without reading it first:
/// server-sent events, and any body whose length is not known up front.
pub fn is_streaming(headers: &HeaderMap, body: &Body) -> bool {
    let event_stream = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/event-stream"));
    event_stream || body.size_hint().exact().is_none()
}

fn concat(chunks: &[Bytes]) -> Bytes {
    match chunks {
        [] => Bytes::new(),
        [single] => single.clone(),
        _ => {
            let mut buf = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
            for chunk in chunks {
                buf.extend_from_slice(chunk);
            }
            buf.freeze()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::convert::Infallible;

    fn chunked(parts: &[&'static str]) -> Body {
        let parts: Vec<Result<Bytes, Infallible>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect();
        Body::from_stream(stream::iter(parts))
    }

    #[tokio::test]
    async fn small_body_is_captured_whole() {
        let (body, capture) = capture_prefix(Body::from("hello"), 16).await.unwrap();
        assert_eq!(capture, BodyCapture::Captured(Bytes::from_static(b"hello")));
        assert_eq!(to_bytes(body, usize::MAX).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn large_body_keeps_prefix_and_forwards_everything() {
        let (body, capture) = capture_prefix(Body::from("abcdefghij"), 4).await.unwrap();
        assert_eq!(
            capture,
            BodyCapture::Truncated {
                prefix: Bytes::from_static(b"abcd"),
                total: Some(10),
            }
        );
        assert_eq!(to_bytes(body, usize::MAX).await.unwrap(), "abcdefghij");
    }

    #[tokio::test]
    async fn chunked_body_stops_reading_past_limit() {
        let (body, capture) = capture_prefix(chunked(&["ab", "cd", "ef", "gh"]), 3)
            .await
            .unwrap();
        assert_eq!(
            capture,
            BodyCapture::Truncated {
                prefix: Bytes::from_static(b"abc"),
                total: None,
            }
        );
        assert_eq!(to_bytes(body, usize::MAX).await.unwrap(), "abcdefgh");
    }

    #[tokio::test]
    async fn chunked_body_within_limit_is_whole() {
        let (_, capture) = capture_prefix(chunked(&["ab", "cd"]), 8).await.unwrap();
        assert_eq!(capture, BodyCapture::Captured(Bytes::from_static(b"abcd")));
    }

    #[test]
    fn streaming_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_streaming(&headers, &Body::from("x")));
        assert!(is_streaming(&headers, &chunked(&["x"])));
        headers.insert(header::CONTENT_TYPE, "text/event-stream".parse().unwrap());
        assert!(is_streaming(&headers, &Body::from("x")));
    }
}

//! Ranged content streaming for `GET`/`HEAD /content/{id}`: `Range`
//! header parsing and a chunked `ReaderStream` response, backed by a
//! `Store` resource lookup rather than a filesystem media-index scan.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::error::{EemsError, Result};
use crate::state::AppState;

const CHUNK_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ByteRange {
    first: u64,
    last: u64,
}

/// Parses a single-range `Range: bytes=...` header value against a
/// known resource `size`. Accepts `first-last`, `first-` (open-ended),
/// or `-suffix_len` (suffix); rejects multi-range headers.
fn parse_range(header: &str, size: u64) -> std::result::Result<Option<ByteRange>, ()> {
    let spec = match header.strip_prefix("bytes=") {
        Some(rest) => rest,
        None => return Err(()),
    };
    // Multiple ranges are rejected rather than honored as a single span.
    if spec.contains(',') {
        return Err(());
    }
    let (first_str, last_str) = spec.split_once('-').ok_or(())?;

    if first_str.is_empty() {
        // Suffix range: last `N` bytes.
        let suffix_len: u64 = last_str.parse().map_err(|_| ())?;
        if suffix_len == 0 || size == 0 {
            return Err(());
        }
        let first = size.saturating_sub(suffix_len);
        return Ok(Some(ByteRange { first, last: size - 1 }));
    }

    let first: u64 = first_str.parse().map_err(|_| ())?;
    if first >= size {
        return Err(());
    }
    let last = if last_str.is_empty() {
        size - 1
    } else {
        let parsed: u64 = last_str.parse().map_err(|_| ())?;
        parsed.min(size - 1)
    };
    if first > last {
        return Err(());
    }
    Ok(Some(ByteRange { first, last }))
}

pub async fn serve_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    match serve_content_inner(state, id, method, headers).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn serve_content_inner(
    state: AppState,
    id: String,
    method: Method,
    headers: HeaderMap,
) -> Result<Response> {
    let id: i64 = id
        .parse()
        .map_err(|_| EemsError::NotFound(format!("invalid resource id: {id}")))?;
    let resource = state.store.get_resource(id).await?;

    let mut file = tokio::fs::File::open(&resource.location)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EemsError::NotFound(resource.location.clone()),
            _ => EemsError::IOError(e),
        })?;
    let size = file.metadata().await?.len();

    let range = match headers.get(axum::http::header::RANGE).and_then(|v| v.to_str().ok()) {
        Some(raw) => match parse_range(raw, size) {
            Ok(r) => r,
            Err(()) => return Err(EemsError::RangeNotSatisfiable),
        },
        None => None,
    };

    let (status, first, len) = match range {
        Some(ByteRange { first, last }) => (StatusCode::PARTIAL_CONTENT, first, last - first + 1),
        None => (StatusCode::OK, 0, size),
    };

    if first > 0 {
        file.seek(std::io::SeekFrom::Start(first)).await?;
    }

    let mut builder = Response::builder()
        .status(status)
        .header(axum::http::header::CONTENT_TYPE, resource.mime_type.clone())
        .header(axum::http::header::ACCEPT_RANGES, "bytes")
        .header(axum::http::header::CONTENT_LENGTH, len.to_string());

    if let Some(ByteRange { first, last }) = range {
        builder = builder.header(
            axum::http::header::CONTENT_RANGE,
            format!("bytes {first}-{last}/{size}"),
        );
    }

    if method == Method::HEAD {
        return builder
            .body(Body::empty())
            .map_err(|e| EemsError::Fatal(e.to_string()));
    }

    let limited = file.take(len);
    let stream = ReaderStream::with_capacity(limited, CHUNK_SIZE);
    builder
        .body(Body::from_stream(stream))
        .map_err(|e| EemsError::Fatal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bounded_range() {
        let r = parse_range("bytes=10-19", 100).unwrap().unwrap();
        assert_eq!(r, ByteRange { first: 10, last: 19 });
    }

    #[test]
    fn parses_open_ended_range() {
        let r = parse_range("bytes=90-", 100).unwrap().unwrap();
        assert_eq!(r, ByteRange { first: 90, last: 99 });
    }

    #[test]
    fn parses_suffix_range() {
        let r = parse_range("bytes=-10", 100).unwrap().unwrap();
        assert_eq!(r, ByteRange { first: 90, last: 99 });
    }

    #[test]
    fn clamps_last_beyond_size() {
        let r = parse_range("bytes=50-1000", 100).unwrap().unwrap();
        assert_eq!(r, ByteRange { first: 50, last: 99 });
    }

    #[test]
    fn rejects_first_at_or_beyond_size() {
        assert!(parse_range("bytes=100-", 100).is_err());
        assert!(parse_range("bytes=200-300", 100).is_err());
    }

    #[test]
    fn rejects_first_greater_than_last() {
        assert!(parse_range("bytes=50-40", 100).is_err());
    }

    #[test]
    fn rejects_multi_range_and_malformed_header() {
        assert!(parse_range("bytes=0-10,20-30", 100).is_err());
        assert!(parse_range("banana", 100).is_err());
        assert!(parse_range("bytes=abc-def", 100).is_err());
    }

    #[test]
    fn no_range_header_means_whole_file() {
        assert_eq!(parse_range("bytes=0-", 100).unwrap(), Some(ByteRange { first: 0, last: 99 }));
    }
}

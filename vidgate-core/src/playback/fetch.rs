use std::sync::Arc;

use async_stream::try_stream;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use super::client::{UpstreamClient, UpstreamError};
use super::range::ChunkPlan;

/// Minimal protobuf payload ({15: 0}) the origin expects on chunk POSTs.
pub const CHUNK_POST_BODY: [u8; 2] = [0x78, 0x00];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("non-200 response ({status}) from origin for chunk {start}-{end}")]
    ChunkStatus {
        status: StatusCode,
        start: u64,
        end: u64,
    },
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Re-fetches `[first_byte, first_byte + total_bytes - 1]` from the
/// terminal location as sequential range-bounded POSTs and re-emits the
/// bodies as one continuous block stream. Block boundaries are whatever
/// the transport yields and do not align with chunk boundaries. A non-200
/// chunk response ends the stream with an error; bytes already emitted
/// stand as a truncated delivery. Dropping the stream stops all further
/// requests.
pub fn stream_chunks(
    client: Arc<dyn UpstreamClient>,
    location: Url,
    headers: HeaderMap,
    first_byte: u64,
    total_bytes: u64,
    chunk_size: u64,
) -> BoxStream<'static, Result<Bytes, FetchError>> {
    let base_query: Vec<(String, String)> = location
        .query_pairs()
        .filter(|(key, _)| key != "range")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let mut base = location;
    base.set_query(None);

    let stream = try_stream! {
        for (start, end) in ChunkPlan::new(first_byte, total_bytes, chunk_size) {
            let mut url = base.clone();
            {
                let mut pairs = url.query_pairs_mut();
                pairs.extend_pairs(base_query.iter().map(|(key, value)| (key.as_str(), value.as_str())));
                pairs.append_pair("range", &format!("{start}-{end}"));
            }
            let response = client
                .post(&url, &headers, CHUNK_POST_BODY.to_vec())
                .await?;
            if response.status != StatusCode::OK {
                tracing::warn!(
                    target: "playback",
                    status = %response.status,
                    start,
                    end,
                    "aborting stream on chunk failure"
                );
                Err(FetchError::ChunkStatus {
                    status: response.status,
                    start,
                    end,
                })?;
            }
            let mut body = response.body;
            while let Some(block) = body.next().await {
                yield block?;
            }
        }
    };
    stream.boxed()
}

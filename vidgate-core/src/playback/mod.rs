mod client;
mod error;
mod fetch;
mod range;
mod resolve;
mod respond;
mod validate;

pub use client::{
    GoogleVideoClient, UpstreamClient, UpstreamError, UpstreamResponse, UpstreamResult,
};
pub use error::{PlaybackError, PlaybackResult};
pub use fetch::{stream_chunks, FetchError, CHUNK_POST_BODY};
pub use range::{ByteRange, ChunkPlan};
pub use resolve::{
    outbound_headers, resolve, user_agent_for, ResolveError, ResolveResult, ResolvedLocation,
    MAX_REDIRECT_HOPS,
};
pub use respond::build_response;
pub use validate::{validate, ValidatedFields, ValidationError};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use futures::stream::BoxStream;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;
use url::Url;

use crate::cipher::QueryCipher;
use crate::config::VidgateConfig;

/// Process-wide pipeline state, built once at startup and shared
/// read-only across request tasks.
pub struct PlaybackContext {
    pub cipher: QueryCipher,
    pub client: Arc<dyn UpstreamClient>,
    pub chunk_size_bytes: u64,
}

impl PlaybackContext {
    pub fn from_config(config: &VidgateConfig) -> PlaybackResult<Self> {
        let cipher = QueryCipher::from_base64(
            &config.secret.video_playback_decryption_key,
            &config.secret.video_playback_decryption_iv,
        )?;
        let client = GoogleVideoClient::new(Duration::from_secs(
            config.networking.videoplayback.upstream_timeout_seconds,
        ))?;
        Ok(Self {
            cipher,
            client: Arc::new(client),
            chunk_size_bytes: config.networking.videoplayback.chunk_size_bytes(),
        })
    }

    pub fn new(
        cipher: QueryCipher,
        client: Arc<dyn UpstreamClient>,
        chunk_size_bytes: u64,
    ) -> Self {
        Self {
            cipher,
            client,
            chunk_size_bytes,
        }
    }
}

/// Inbound request as handed over by the router: query parameters with
/// last-value-wins on duplicates, plus the raw `Range` header.
#[derive(Debug, Clone, Default)]
pub struct PlaybackRequest {
    pub params: HashMap<String, String>,
    pub range: Option<String>,
}

/// The single artifact handed back to the server layer.
pub struct ResponseEnvelope {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BoxStream<'static, Result<Bytes, FetchError>>,
}

impl std::fmt::Debug for ResponseEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseEnvelope")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &"<stream>")
            .finish()
    }
}

/// Runs the full pipeline: decrypt, validate, resolve, assemble, stream.
pub async fn handle(
    ctx: &PlaybackContext,
    request: PlaybackRequest,
) -> PlaybackResult<ResponseEnvelope> {
    let mut params = request.params;
    let title = params.get("title").cloned();

    if params.get("enc").map(String::as_str) == Some("true") {
        let blob = params
            .get("data")
            .cloned()
            .ok_or(PlaybackError::MissingEncryptedData)?;
        let payload = ctx.cipher.decrypt(&blob)?;
        params.remove("enc");
        params.remove("data");
        if let Some(pot) = payload.get("pot").and_then(Value::as_str) {
            params.insert("pot".into(), pot.to_string());
        }
        if let Some(ip) = payload.get("ip").and_then(Value::as_str) {
            params.insert("ip".into(), ip.to_string());
        }
    }

    let fields = validate(&params, Utc::now().timestamp())?;
    params.remove("host");
    params.remove("title");

    let range = request.range.as_deref().and_then(ByteRange::parse);
    if let Some(range) = &range {
        params.insert("range".into(), range.as_query_value());
    }

    let headers = outbound_headers(&fields.client);
    let location = playback_url(&fields.host, &params)?;
    let resolved = resolve(ctx.client.as_ref(), location, &headers).await?;

    let (status, response_headers) = build_response(
        range.as_ref(),
        resolved.status,
        &resolved.headers,
        title.as_deref(),
        params.get("clen").map(String::as_str),
    );

    let first_byte = range.map(|range| range.first_byte).unwrap_or(0);
    let total_bytes = respond::content_length(&resolved.headers);
    let body = stream_chunks(
        Arc::clone(&ctx.client),
        resolved.location,
        headers,
        first_byte,
        total_bytes,
        ctx.chunk_size_bytes,
    );

    Ok(ResponseEnvelope {
        status,
        headers: response_headers,
        body,
    })
}

fn playback_url(host: &str, params: &HashMap<String, String>) -> PlaybackResult<Url> {
    let mut url = Url::parse(&format!("https://{host}/videoplayback"))?;
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params.iter());
    }
    Ok(url)
}

use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use super::client::{UpstreamClient, UpstreamError};

/// The upstream redirect chain is untrusted and must not be followed
/// indefinitely.
pub const MAX_REDIRECT_HOPS: usize = 5;

const USER_AGENT_ANDROID: &str = "com.google.android.youtube/1537338816 (Linux; U; Android 13; en_US; ; Build/TQ2A.230505.002; Cronet/113.0.5672.24)";
const USER_AGENT_IOS: &str =
    "com.google.ios.youtube/19.32.8 (iPhone14,5; U; CPU iOS 17_6 like Mac OS X;)";
const USER_AGENT_DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36";

pub fn user_agent_for(client_id: &str) -> &'static str {
    match client_id {
        "ANDROID" => USER_AGENT_ANDROID,
        "IOS" => USER_AGENT_IOS,
        _ => USER_AGENT_DESKTOP,
    }
}

/// The fixed header set sent on every HEAD probe and chunk POST.
pub fn outbound_headers(client_id: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(
        header::ACCEPT_ENCODING,
        HeaderValue::from_static("gzip, deflate, br, zstd"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-us,en;q=0.5"),
    );
    headers.insert(
        header::ORIGIN,
        HeaderValue::from_static("https://www.youtube.com"),
    );
    headers.insert(
        header::REFERER,
        HeaderValue::from_static("https://www.youtube.com"),
    );
    headers.insert(
        header::USER_AGENT,
        HeaderValue::from_static(user_agent_for(client_id)),
    );
    headers
}

/// Terminal response of a redirect chase: the first HEAD response that is
/// neither a redirect nor a 403.
#[derive(Debug)]
pub struct ResolvedLocation {
    pub location: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub attempts: usize,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("origin rejected the request")]
    Forbidden { headers: HeaderMap, body: Bytes },
    #[error("origin redirected too many times")]
    TooManyRedirects,
    #[error("origin sent an unusable redirect location {target}: {source}")]
    BadLocation {
        target: String,
        source: url::ParseError,
    },
    #[error("origin sent a redirect location that is not printable")]
    UnreadableLocation,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Chases HEAD-based redirects from `location` until a terminal response,
/// a 403 (forwarded verbatim), or the hop bound is hit.
pub async fn resolve(
    client: &dyn UpstreamClient,
    mut location: Url,
    headers: &HeaderMap,
) -> ResolveResult<ResolvedLocation> {
    for attempt in 0..MAX_REDIRECT_HOPS {
        let response = client.head(&location, headers).await?;
        if response.status == StatusCode::FORBIDDEN {
            let headers = response.headers.clone();
            let body = response.into_bytes().await?;
            return Err(ResolveError::Forbidden { headers, body });
        }
        match redirect_target(&response.headers, &location)? {
            Some(next) => {
                tracing::debug!(
                    target: "playback",
                    hop = attempt + 1,
                    next = %next,
                    "following upstream redirect"
                );
                location = next;
            }
            None => {
                return Ok(ResolvedLocation {
                    location,
                    status: response.status,
                    headers: response.headers,
                    attempts: attempt + 1,
                });
            }
        }
    }
    Err(ResolveError::TooManyRedirects)
}

fn redirect_target(headers: &HeaderMap, base: &Url) -> ResolveResult<Option<Url>> {
    let Some(value) = headers.get(header::LOCATION) else {
        return Ok(None);
    };
    let target = value
        .to_str()
        .map_err(|_| ResolveError::UnreadableLocation)?;
    let next = base.join(target).map_err(|source| ResolveError::BadLocation {
        target: target.to_string(),
        source,
    })?;
    Ok(Some(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::stream;
    use futures::StreamExt;

    use super::super::client::{UpstreamResponse, UpstreamResult};

    struct ScriptedResponse {
        status: StatusCode,
        headers: HeaderMap,
        body: Vec<Bytes>,
    }

    impl ScriptedResponse {
        fn new(status: StatusCode) -> Self {
            Self {
                status,
                headers: HeaderMap::new(),
                body: Vec::new(),
            }
        }

        fn redirect(target: &str) -> Self {
            let mut response = Self::new(StatusCode::FOUND);
            response
                .headers
                .insert(header::LOCATION, target.parse().unwrap());
            response
        }
    }

    #[derive(Default)]
    struct MockUpstream {
        responses: Mutex<VecDeque<ScriptedResponse>>,
        heads: Mutex<Vec<String>>,
    }

    impl MockUpstream {
        fn scripted(responses: Vec<ScriptedResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                heads: Mutex::new(Vec::new()),
            }
        }

        fn head_count(&self) -> usize {
            self.heads.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl UpstreamClient for MockUpstream {
        async fn head(&self, url: &Url, _headers: &HeaderMap) -> UpstreamResult<UpstreamResponse> {
            self.heads.lock().unwrap().push(url.to_string());
            let scripted = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected HEAD probe");
            Ok(UpstreamResponse {
                status: scripted.status,
                headers: scripted.headers,
                body: stream::iter(scripted.body.into_iter().map(Ok)).boxed(),
            })
        }

        async fn post(
            &self,
            _url: &Url,
            _headers: &HeaderMap,
            _body: Vec<u8>,
        ) -> UpstreamResult<UpstreamResponse> {
            panic!("resolver must not POST");
        }
    }

    fn start_url() -> Url {
        Url::parse("https://rr3---sn-abc.googlevideo.com/videoplayback?id=demo").unwrap()
    }

    #[tokio::test]
    async fn returns_first_non_redirecting_response() {
        let mut terminal = ScriptedResponse::new(StatusCode::OK);
        terminal
            .headers
            .insert(header::CONTENT_LENGTH, "42".parse().unwrap());
        let upstream = MockUpstream::scripted(vec![terminal]);
        let resolved = resolve(&upstream, start_url(), &outbound_headers("WEB"))
            .await
            .unwrap();
        assert_eq!(resolved.status, StatusCode::OK);
        assert_eq!(resolved.attempts, 1);
        assert_eq!(resolved.location, start_url());
        assert_eq!(upstream.head_count(), 1);
    }

    #[tokio::test]
    async fn follows_location_then_terminates() {
        let upstream = MockUpstream::scripted(vec![
            ScriptedResponse::redirect("https://rr5---sn-xyz.googlevideo.com/videoplayback?id=demo"),
            ScriptedResponse::new(StatusCode::OK),
        ]);
        let resolved = resolve(&upstream, start_url(), &outbound_headers("WEB"))
            .await
            .unwrap();
        assert_eq!(resolved.attempts, 2);
        assert_eq!(
            resolved.location.host_str(),
            Some("rr5---sn-xyz.googlevideo.com")
        );
        assert_eq!(upstream.head_count(), 2);
    }

    #[tokio::test]
    async fn resolves_relative_redirect_against_current_location() {
        let upstream = MockUpstream::scripted(vec![
            ScriptedResponse::redirect("/videoplayback?id=demo&mirror=1"),
            ScriptedResponse::new(StatusCode::OK),
        ]);
        let resolved = resolve(&upstream, start_url(), &outbound_headers("WEB"))
            .await
            .unwrap();
        assert_eq!(
            resolved.location.host_str(),
            Some("rr3---sn-abc.googlevideo.com")
        );
        assert_eq!(resolved.location.query(), Some("id=demo&mirror=1"));
    }

    #[tokio::test]
    async fn forbidden_is_returned_verbatim_without_further_probes() {
        let mut forbidden = ScriptedResponse::new(StatusCode::FORBIDDEN);
        forbidden
            .headers
            .insert("x-origin-reason", "blocked".parse().unwrap());
        forbidden.body = vec![Bytes::from_static(b"denied")];
        let upstream = MockUpstream::scripted(vec![forbidden]);
        let error = resolve(&upstream, start_url(), &outbound_headers("WEB"))
            .await
            .unwrap_err();
        match error {
            ResolveError::Forbidden { headers, body } => {
                assert_eq!(headers.get("x-origin-reason").unwrap(), "blocked");
                assert_eq!(body.as_ref(), b"denied");
            }
            other => panic!("expected Forbidden, got {other:?}"),
        }
        assert_eq!(upstream.head_count(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_exactly_five_probes() {
        let upstream = MockUpstream::scripted(
            (0..6)
                .map(|hop| {
                    ScriptedResponse::redirect(&format!(
                        "https://rr{hop}---sn-abc.googlevideo.com/videoplayback"
                    ))
                })
                .collect(),
        );
        let error = resolve(&upstream, start_url(), &outbound_headers("WEB"))
            .await
            .unwrap_err();
        assert!(matches!(error, ResolveError::TooManyRedirects));
        assert_eq!(upstream.head_count(), MAX_REDIRECT_HOPS);
    }

    #[test]
    fn user_agent_variants() {
        assert!(user_agent_for("ANDROID").starts_with("com.google.android.youtube/"));
        assert!(user_agent_for("IOS").starts_with("com.google.ios.youtube/"));
        assert!(user_agent_for("WEB").starts_with("Mozilla/5.0"));
        assert!(user_agent_for("TVHTML5").starts_with("Mozilla/5.0"));
    }

    #[test]
    fn outbound_headers_carry_fixed_set() {
        let headers = outbound_headers("ANDROID");
        assert_eq!(headers.get(header::ACCEPT).unwrap(), "*/*");
        assert_eq!(
            headers.get(header::ORIGIN).unwrap(),
            "https://www.youtube.com"
        );
        assert_eq!(
            headers.get(header::REFERER).unwrap(),
            "https://www.youtube.com"
        );
        assert_eq!(
            headers.get(header::USER_AGENT).unwrap(),
            USER_AGENT_ANDROID
        );
    }
}

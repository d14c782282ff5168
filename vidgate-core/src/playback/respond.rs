use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;

use crate::rfc5987::encode_value_chars;

use super::range::ByteRange;

/// Percent-encoding set matching javascript's `encodeURIComponent`, used
/// for the plain `filename=` half of `content-disposition`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Derives the client-facing status and headers from the terminal HEAD
/// response. Pure; the body stream is attached by the caller.
pub fn build_response(
    requested: Option<&ByteRange>,
    terminal_status: StatusCode,
    terminal_headers: &HeaderMap,
    title: Option<&str>,
    clen: Option<&str>,
) -> (StatusCode, HeaderMap) {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_LENGTH,
        copied(terminal_headers, header::CONTENT_LENGTH),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCEPT_RANGES,
        copied(terminal_headers, header::ACCEPT_RANGES),
    );
    headers.insert(
        header::CONTENT_TYPE,
        copied(terminal_headers, header::CONTENT_TYPE),
    );
    headers.insert(header::EXPIRES, copied(terminal_headers, header::EXPIRES));
    headers.insert(
        header::LAST_MODIFIED,
        copied(terminal_headers, header::LAST_MODIFIED),
    );

    if let Some(title) = title {
        let disposition = format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            utf8_percent_encode(title, URI_COMPONENT),
            encode_value_chars(title)
        );
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }

    let mut status = terminal_status;
    if let Some(range) = requested {
        // A terminal 206 already carries correct range semantics and is
        // passed through untouched.
        if terminal_status == StatusCode::OK {
            match range.last_byte {
                Some(last) => {
                    status = StatusCode::PARTIAL_CONTENT;
                    let clen = clen.filter(|clen| !clen.is_empty()).unwrap_or("*");
                    set_content_range(
                        &mut headers,
                        &format!("bytes {}-{}/{}", range.first_byte, last, clen),
                    );
                }
                None => {
                    let received = content_length(terminal_headers);
                    let total = range.first_byte.saturating_add(received);
                    let last = total.saturating_sub(1);
                    if range.first_byte != 0 {
                        status = StatusCode::PARTIAL_CONTENT;
                    }
                    set_content_range(
                        &mut headers,
                        &format!("bytes {}-{}/{}", range.first_byte, last, total),
                    );
                }
            }
        }
    }

    (status, headers)
}

/// Terminal `Content-Length` as a count, 0 when absent or unparseable.
pub(crate) fn content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

fn copied(source: &HeaderMap, name: HeaderName) -> HeaderValue {
    source
        .get(&name)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(""))
}

fn set_content_range(headers: &mut HeaderMap, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(header::CONTENT_RANGE, value);
    }
}

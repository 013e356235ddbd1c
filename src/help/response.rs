//! Outbound response under construction.

use std::io::Write;

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use http_body_util::Full;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Response, StatusCode};
use md5::{Digest, Md5};
use tracing::warn;

use crate::error::BridgeError;
use crate::help::request::InboundRequest;
use crate::serve::server_constants::REVALIDATE_CACHE_CONTROL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Gzip,
}

impl ContentEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEncoding::Gzip => "gzip",
        }
    }
}

/// Response assembled by the bridge and handed back to the transport.
#[derive(Debug, Clone)]
pub struct OutboundResponse {
    status: StatusCode,
    content_type: Option<String>,
    headers: Vec<(String, String)>,
    content_encoding: Option<ContentEncoding>,
    body: Bytes,
}

impl Default for OutboundResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl OutboundResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: None,
            headers: Vec::new(),
            content_encoding: None,
            body: Bytes::new(),
        }
    }

    pub fn error(status: StatusCode, message: &str) -> Self {
        let mut response = Self::new();
        response.set_error(status, message);
        response
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    pub fn content_encoding(&self) -> Option<ContentEncoding> {
        self.content_encoding
    }

    pub fn set_content_encoding(&mut self, encoding: ContentEncoding) {
        self.content_encoding = Some(encoding);
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a header, replacing any previous value of the same name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            slot.1 = value;
        } else {
            self.headers.push((name, value));
        }
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// Apply a raw `Name: Value` header line. Returns false for malformed lines.
    pub fn set_header_line(&mut self, line: &str) -> bool {
        match line.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() => {
                let name = name.trim();
                let value = value.trim();
                if name.eq_ignore_ascii_case("content-type") {
                    self.set_content_type(value);
                } else {
                    self.set_header(name, value);
                }
                true
            }
            _ => false,
        }
    }

    /// Content may be cached but must be revalidated on every use.
    pub fn set_cache_with_revalidation_headers(&mut self) {
        let now = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        self.set_header("Expires", now);
        self.set_header("Cache-Control", REVALIDATE_CACHE_CONTROL);
    }

    /// Set the body with an ETag. If the request already holds a matching
    /// entity, answer 304 with an empty body instead.
    pub fn set_cacheable_body(
        &mut self,
        content: Vec<u8>,
        request: &InboundRequest,
    ) -> Result<(), BridgeError> {
        let etag = content_etag(&content);
        self.set_header("ETag", etag.clone());

        if request.if_none_match().map_or(false, |v| etag_matches(v, &etag)) {
            self.status = StatusCode::NOT_MODIFIED;
            self.content_encoding = None;
            self.body = Bytes::new();
            return Ok(());
        }

        self.set_body(content)
    }

    /// Set the body, compressing it if a content encoding was selected.
    pub fn set_body(&mut self, content: Vec<u8>) -> Result<(), BridgeError> {
        self.body = match self.content_encoding {
            Some(ContentEncoding::Gzip) => Bytes::from(gzip(&content)?),
            None => Bytes::from(content),
        };
        Ok(())
    }

    /// Set the body verbatim, dropping any selected content encoding.
    pub fn set_body_unencoded(&mut self, content: Vec<u8>) {
        self.content_encoding = None;
        self.body = Bytes::from(content);
    }

    pub fn set_error(&mut self, status: StatusCode, message: &str) {
        self.status = status;
        self.content_type = Some("text/plain; charset=UTF-8".to_string());
        self.content_encoding = None;
        self.remove_header("ETag");
        self.body = Bytes::from(message.to_string());
    }

    pub fn set_bridge_error(&mut self, error: &BridgeError) {
        self.set_error(error.status(), &error.to_string());
    }

    pub fn into_hyper(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        let headers = response.headers_mut();

        if let Some(content_type) = self.content_type.as_deref() {
            if let Ok(value) = HeaderValue::from_str(content_type) {
                headers.insert(hyper::header::CONTENT_TYPE, value);
            }
        }
        if let Some(encoding) = self.content_encoding {
            headers.insert(
                hyper::header::CONTENT_ENCODING,
                HeaderValue::from_static(encoding.as_str()),
            );
        }
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => warn!("dropping invalid response header {:?}: {:?}", name, value),
            }
        }
        response
    }
}

/// Strong ETag derived from the body digest.
pub fn content_etag(content: &[u8]) -> String {
    format!("\"{:x}\"", Md5::digest(content))
}

fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate == etag || candidate.strip_prefix("W/") == Some(etag)
    })
}

fn gzip(content: &[u8]) -> Result<Vec<u8>, BridgeError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(content.len() / 2), Compression::default());
    encoder.write_all(content)?;
    Ok(encoder.finish()?)
}

//! Inbound requests and their translation into handler call frames.

use std::borrow::Cow;

use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue, ACCEPT_ENCODING, CONTENT_TYPE, IF_NONE_MATCH};
use hyper::{HeaderMap, Method};
use indexmap::IndexMap;

use crate::interpreter::{Arg, Expr, Value};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// An HTTP request as delivered by the transport layer.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Raw request target: path plus optional query string, still encoded.
    pub uri: String,
    pub query_fields: Vec<(String, String)>,
    pub form_fields: Vec<(String, String)>,
    pub body: Bytes,
    pub headers: HeaderMap,
}

impl InboundRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let query_fields = uri
            .split_once('?')
            .map(|(_, query)| parse_fields(query))
            .unwrap_or_default();
        Self {
            method,
            uri,
            query_fields,
            form_fields: Vec::new(),
            body: Bytes::new(),
            headers: HeaderMap::new(),
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    /// Build from hyper request parts and the collected body.
    pub fn from_parts(parts: &http::request::Parts, body: Bytes) -> Self {
        let uri = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        let mut request = Self::new(parts.method.clone(), uri);
        request.headers = parts.headers.clone();
        request.set_body(body);
        request
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(HeaderName::from_static(name), value);
        }
        self
    }

    pub fn with_body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        if let Ok(value) = HeaderValue::from_str(content_type) {
            self.headers.insert(CONTENT_TYPE, value);
        }
        self.set_body(body.into());
        self
    }

    fn set_body(&mut self, body: Bytes) {
        self.form_fields = if !body.is_empty() && self.content_type().starts_with(FORM_URLENCODED) {
            parse_fields(&String::from_utf8_lossy(&body))
        } else {
            Vec::new()
        };
        self.body = body;
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> &str {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    pub fn if_none_match(&self) -> Option<&str> {
        self.headers.get(IF_NONE_MATCH).and_then(|v| v.to_str().ok())
    }

    /// Encodings listed in Accept-Encoding, lowercased, excluding `q=0` entries.
    pub fn accepted_encodings(&self) -> Vec<String> {
        let mut encodings = Vec::new();
        for value in self.headers.get_all(ACCEPT_ENCODING) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for item in value.split(',') {
                let mut parts = item.split(';');
                let coding = parts.next().unwrap_or("").trim().to_ascii_lowercase();
                let refused = parts.any(|p| {
                    p.trim()
                        .strip_prefix("q=")
                        .and_then(|q| q.trim().parse::<f32>().ok())
                        .map(|q| q == 0.0)
                        .unwrap_or(false)
                });
                if !coding.is_empty() && !refused {
                    encodings.push(coding);
                }
            }
        }
        encodings
    }

    pub fn accepts_encoding(&self, encoding: &str) -> bool {
        self.accepted_encodings()
            .iter()
            .any(|e| e.eq_ignore_ascii_case(encoding))
    }
}

/// Parse `a=1&b=2` style fields in order of appearance. Keys may repeat.
pub fn parse_fields(input: &str) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    if input.is_empty() {
        return fields;
    }

    for pair in input.split('&').filter(|p| !p.is_empty()) {
        match pair.split_once('=') {
            Some((key, value)) => fields.push((url_decode(key, true), url_decode(value, true))),
            None => fields.push((url_decode(pair, true), String::new())),
        }
    }
    fields
}

/// Percent-decode `input`. With `plus_as_space`, `+` decodes to a space first.
pub fn url_decode(input: &str, plus_as_space: bool) -> String {
    let input: Cow<str> = if plus_as_space {
        Cow::Owned(input.replace('+', " "))
    } else {
        Cow::Borrowed(input)
    };
    match urlencoding::decode(&input) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(input.as_bytes())).into_owned(),
    }
}

/// Remove the mount `location` from the front of `uri` and drop the query string.
pub fn strip_location<'a>(location: &str, uri: &'a str) -> &'a str {
    let uri = if !location.is_empty() {
        uri.strip_prefix(location).unwrap_or(uri)
    } else {
        uri
    };
    match uri.find('?') {
        Some(pos) => &uri[..pos],
        None => uri,
    }
}

/// Arguments of one httpd handler call: `handler(path, query, body)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallFrame {
    pub path: String,
    pub query: Value,
    pub body: Value,
}

impl CallFrame {
    pub fn into_args(self) -> Vec<Arg> {
        vec![
            Arg::positional(Expr::Constant(Value::string(self.path))),
            Arg::positional(Expr::Constant(self.query)),
            Arg::positional(Expr::Constant(self.body)),
        ]
    }
}

/// Build the call frame for `request` served under `location`.
///
/// The path is decoded without plus-to-space translation: `+` is a literal
/// character in help topic paths.
pub fn translate(location: &str, request: &InboundRequest) -> CallFrame {
    let path = url_decode(strip_location(location, &request.uri), false);
    CallFrame {
        path,
        query: fields_value(&request.query_fields),
        body: body_value(request),
    }
}

/// `NULL` for no fields, otherwise a named character vector. A repeated key
/// keeps its first position and takes the last value.
fn fields_value(fields: &[(String, String)]) -> Value {
    if fields.is_empty() {
        return Value::Null;
    }
    let mut map = IndexMap::with_capacity(fields.len());
    for (key, value) in fields {
        map.insert(key.clone(), value.clone());
    }
    Value::named_strings(map)
}

fn body_value(request: &InboundRequest) -> Value {
    if request.body.is_empty() {
        return Value::Null;
    }
    if !request.form_fields.is_empty() {
        return fields_value(&request.form_fields);
    }
    let content_type = request.content_type();
    Value::Raw {
        bytes: request.body.to_vec(),
        content_type: (!content_type.is_empty()).then(|| content_type.to_string()),
    }
}

//! Interpreting handler results and rendering them as HTTP responses.
//!
//! A handler returns one of a small set of shapes:
//!
//! * a non-empty character vector: an error message;
//! * a non-empty list `list(payload, content_type, headers, status)` where only
//!   the payload is required;
//! * a raw vector: binary content.
//!
//! The payload is either text, raw bytes or a file reference. A file is
//! signalled by naming the first list element `file`, or by the legacy
//! `c("*FILE*", path)` payload.

use std::path::PathBuf;

use hyper::StatusCode;
use tracing::{debug, error, warn};

use crate::error::BridgeError;
use crate::filesystem::FileSystem;
use crate::help::filter::ContentFilter;
use crate::help::request::InboundRequest;
use crate::help::response::{ContentEncoding, OutboundResponse};
use crate::interpreter::Value;
use crate::serve::server_constants::DEFAULT_CONTENT_TYPE;

/// Payload text that marks a legacy file reference.
pub const FILE_SENTINEL: &str = "*FILE*";

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Text(String),
    File(PathBuf),
    Raw(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub body: ResponseBody,
    pub content_type: String,
    /// Raw `Name: Value` header lines.
    pub headers: Vec<String>,
    pub status: StatusCode,
}

impl Payload {
    fn new(body: ResponseBody) -> Self {
        Self {
            body,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            headers: Vec::new(),
            status: StatusCode::OK,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HandlerResult {
    /// The handler reported an error.
    Error(String),
    Payload(Payload),
}

impl HandlerResult {
    /// Classify a handler's return value. Unrecognized shapes are rejected.
    pub fn from_value(value: &Value) -> Result<Self, BridgeError> {
        match value {
            Value::Character { values, .. } if !values.is_empty() => {
                Ok(HandlerResult::Error(values[0].clone()))
            }
            Value::List { values, names } if !values.is_empty() => {
                payload_from_list(values, names.as_deref()).map(HandlerResult::Payload)
            }
            Value::Raw {
                bytes,
                content_type,
            } => {
                let mut payload = Payload::new(ResponseBody::Raw(bytes.clone()));
                if let Some(content_type) = content_type {
                    payload.content_type = content_type.clone();
                }
                Ok(HandlerResult::Payload(payload))
            }
            _ => Err(BridgeError::MalformedResult),
        }
    }
}

fn payload_from_list(values: &[Value], names: Option<&[String]>) -> Result<Payload, BridgeError> {
    let body = payload_body(&values[0], names)?;
    let mut payload = Payload::new(body);

    if let Some(Value::Character { values: ct, .. }) = values.get(1) {
        if let Some(content_type) = ct.first() {
            payload.content_type = content_type.clone();
        }
    }

    if let Some(Value::Character { values: lines, .. }) = values.get(2) {
        payload.headers = lines.clone();
    }

    if let Some(code) = values.get(3) {
        payload.status = code
            .as_integer()
            .and_then(|code| u16::try_from(code).ok())
            .and_then(|code| StatusCode::from_u16(code).ok())
            .ok_or(BridgeError::MalformedResult)?;
    }

    Ok(payload)
}

fn payload_body(payload: &Value, names: Option<&[String]>) -> Result<ResponseBody, BridgeError> {
    let content = match payload {
        Value::Character { values, .. } if !values.is_empty() => values[0].clone(),
        Value::List { values, .. } if !values.is_empty() => {
            values[0].as_scalar_string().unwrap_or_default()
        }
        Value::Raw { bytes, .. } => return Ok(ResponseBody::Raw(bytes.clone())),
        _ => return Err(BridgeError::MalformedResult),
    };

    if names.and_then(|n| n.first()).map(String::as_str) == Some("file") {
        return Ok(ResponseBody::File(PathBuf::from(content)));
    }
    if payload.len() > 1 && content == FILE_SENTINEL {
        if let Some(path) = payload.string_element(1) {
            return Ok(ResponseBody::File(PathBuf::from(path)));
        }
    }
    Ok(ResponseBody::Text(content))
}

/// Render an evaluated handler value into `response`.
pub fn render_value(
    value: &Value,
    request: &InboundRequest,
    filter: &ContentFilter,
    fs: &dyn FileSystem,
    response: &mut OutboundResponse,
) {
    match HandlerResult::from_value(value) {
        Ok(HandlerResult::Error(message)) => {
            debug!("help handler returned error: {}", message);
            response.set_bridge_error(&BridgeError::Handler(message));
        }
        Ok(HandlerResult::Payload(payload)) => render_payload(payload, request, filter, fs, response),
        Err(err) => {
            warn!("help handler returned unexpected {} value", value.type_name());
            response.set_bridge_error(&err);
        }
    }
}

/// Render a classified payload into `response`.
pub fn render_payload(
    payload: Payload,
    request: &InboundRequest,
    filter: &ContentFilter,
    fs: &dyn FileSystem,
    response: &mut OutboundResponse,
) {
    response.set_status(payload.status);
    response.set_content_type(payload.content_type);
    for line in &payload.headers {
        if !response.set_header_line(line) {
            warn!("skipping malformed header line from handler: {:?}", line);
        }
    }

    // Header lines may have replaced the content type.
    let identity = ContentFilter::Identity;
    let filter = if response.content_type() == Some(DEFAULT_CONTENT_TYPE) {
        filter
    } else {
        &identity
    };

    match payload.body {
        ResponseBody::File(path) => {
            response.set_cache_with_revalidation_headers();
            match fs.read_bytes(&path) {
                Ok(contents) => set_cacheable_content(filter.apply(contents), request, response),
                Err(err) => {
                    let err = BridgeError::file_read(path, err);
                    debug!("help file unavailable: {:?}", err);
                    response.set_bridge_error(&err);
                }
            }
        }
        ResponseBody::Text(content) if payload.status == StatusCode::OK => {
            set_dynamic_content(content.into_bytes(), request, filter, response);
        }
        // Redirects and other statuses pass through untouched.
        ResponseBody::Text(content) => response.set_body_unencoded(content.into_bytes()),
        ResponseBody::Raw(bytes) => set_dynamic_content(bytes, request, &identity, response),
    }
}

/// Dynamic content: gzip when accepted, revalidate on every use, ETag.
pub fn set_dynamic_content(
    content: Vec<u8>,
    request: &InboundRequest,
    filter: &ContentFilter,
    response: &mut OutboundResponse,
) {
    if request.accepts_encoding(ContentEncoding::Gzip.as_str()) {
        response.set_content_encoding(ContentEncoding::Gzip);
    }
    response.set_cache_with_revalidation_headers();
    set_cacheable_content(filter.apply(content), request, response);
}

fn set_cacheable_content(content: Vec<u8>, request: &InboundRequest, response: &mut OutboundResponse) {
    if let Err(err) = response.set_cacheable_body(content, request) {
        error!("failed to encode help response: {}", err);
        response.set_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
    }
}

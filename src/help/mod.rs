//! The help bridge: serves the interpreter's httpd handlers through the
//! session server.
//!
//! Requests under `/help` go to the interpreter's help handler and their HTML
//! is rewritten for the help pane. Requests under `/custom` go to handlers
//! registered by packages, looked up by name, and are served as produced.

pub mod filter;
pub mod hooks;
pub mod invoker;
pub mod locality;
pub mod request;
pub mod resolver;
pub mod response;
pub mod result;

#[cfg(test)]
pub(crate) mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error};

use crate::error::{BridgeError, HookError};
use crate::events::{ClientEvent, ClientEventSink};
use crate::filesystem::FileSystem;
use crate::interpreter::Interpreter;
use crate::serve::server_constants::{
    get_mime_type, CUSTOM_LOCATION, DEFAULT_CONTENT_TYPE, HELP_CSS_PATH, HELP_LOCATION,
};

use filter::ContentFilter;
use locality::BindingSlot;
use request::{strip_location, url_decode, InboundRequest};
use resolver::{HandlerPolicy, HandlerResolver};
use response::OutboundResponse;
use result::render_value;

/// Per-session state shared by the hooks and the request handlers.
pub struct SessionContext {
    binding: BindingSlot,
    events: Arc<dyn ClientEventSink>,
}

impl SessionContext {
    pub fn new(events: Arc<dyn ClientEventSink>) -> Self {
        Self {
            binding: BindingSlot::new(),
            events,
        }
    }

    pub fn binding(&self) -> &BindingSlot {
        &self.binding
    }

    pub fn emit(&self, event: ClientEvent) {
        self.events.enqueue(event);
    }
}

/// The two mount points served by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mount {
    Help,
    Custom,
}

impl Mount {
    /// Mount serving `path`, if any.
    pub fn for_path(path: &str) -> Option<Self> {
        [Mount::Help, Mount::Custom].into_iter().find(|mount| {
            let prefix = mount.prefix();
            path.strip_prefix(prefix)
                .map_or(false, |rest| rest.is_empty() || rest.starts_with(['/', '?']))
        })
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Mount::Help => HELP_LOCATION,
            Mount::Custom => CUSTOM_LOCATION,
        }
    }

    /// Prefix stripped from the URI before the handler sees it. Custom
    /// handlers see the full path so they can find their own name in it.
    pub fn location(&self) -> &'static str {
        match self {
            Mount::Help => HELP_LOCATION,
            Mount::Custom => "",
        }
    }

    pub fn policy(&self) -> HandlerPolicy {
        match self {
            Mount::Help => HandlerPolicy::Help,
            Mount::Custom => HandlerPolicy::Custom,
        }
    }

    pub fn filter(&self, request: &InboundRequest) -> ContentFilter {
        match self {
            Mount::Help => ContentFilter::help_contents(&request.uri, HELP_LOCATION),
            Mount::Custom => ContentFilter::Identity,
        }
    }
}

/// Dispatches help requests into the interpreter and renders the results.
pub struct HelpBridge {
    session: Arc<SessionContext>,
    resolver: HandlerResolver,
    fs: Arc<dyn FileSystem>,
    help_css: Option<PathBuf>,
}

impl HelpBridge {
    pub fn new(
        session: Arc<SessionContext>,
        fs: Arc<dyn FileSystem>,
        help_css: Option<PathBuf>,
    ) -> Self {
        Self {
            session,
            resolver: HandlerResolver::new(),
            fs,
            help_css,
        }
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn resolver(&self) -> &HandlerResolver {
        &self.resolver
    }

    /// Replace the daemon built-ins and browse handlers in `interpreter`.
    pub fn install<I: Interpreter + ?Sized>(&self, interpreter: &mut I) -> Result<(), HookError> {
        hooks::register_help_hooks(interpreter, &self.session)
    }

    pub fn handle_help_request<I: Interpreter + ?Sized>(
        &self,
        interpreter: &mut I,
        request: &InboundRequest,
    ) -> OutboundResponse {
        self.handle(interpreter, Mount::Help, request)
    }

    pub fn handle_custom_request<I: Interpreter + ?Sized>(
        &self,
        interpreter: &mut I,
        request: &InboundRequest,
    ) -> OutboundResponse {
        self.handle(interpreter, Mount::Custom, request)
    }

    pub fn handle<I: Interpreter + ?Sized>(
        &self,
        interpreter: &mut I,
        mount: Mount,
        request: &InboundRequest,
    ) -> OutboundResponse {
        let mut response = OutboundResponse::new();
        self.handle_httpd_request(interpreter, mount, request, &mut response);
        response
    }

    fn handle_httpd_request<I: Interpreter + ?Sized>(
        &self,
        interpreter: &mut I,
        mount: Mount,
        request: &InboundRequest,
        response: &mut OutboundResponse,
    ) {
        let filter = mount.filter(request);
        let path = url_decode(strip_location(mount.location(), &request.uri), true);
        debug!("{} {} -> {:?} handler path {}", request.method, request.uri, mount, path);

        if path == HELP_CSS_PATH && self.serve_help_css(request, &filter, response) {
            return;
        }

        let frame = request::translate(mount.location(), request);
        let resolve = |interpreter: &mut I| self.resolver.resolve(interpreter, mount.policy(), &path);

        match invoker::invoke(interpreter, resolve, frame) {
            Ok(value) => render_value(&value, request, &filter, self.fs.as_ref(), response),
            Err(fault) => {
                error!("help handler for {} failed: {}", request.uri, fault);
                response.set_bridge_error(&BridgeError::from(fault));
            }
        }
    }

    /// Serve the configured help stylesheet. Returns false if there is none.
    fn serve_help_css(
        &self,
        request: &InboundRequest,
        filter: &ContentFilter,
        response: &mut OutboundResponse,
    ) -> bool {
        let Some(css) = self.help_css.as_deref().filter(|p| self.fs.exists(p)) else {
            return false;
        };
        response.set_content_type(get_mime_type(css));
        response.set_cache_with_revalidation_headers();
        match self.fs.read_bytes(css) {
            Ok(contents) => {
                let identity = ContentFilter::Identity;
                let filter = if response.content_type() == Some(DEFAULT_CONTENT_TYPE) {
                    filter
                } else {
                    &identity
                };
                if let Err(err) = response.set_cacheable_body(filter.apply(contents), request) {
                    response.set_bridge_error(&err);
                }
            }
            Err(err) => response.set_bridge_error(&BridgeError::file_read(css, err)),
        }
        true
    }
}

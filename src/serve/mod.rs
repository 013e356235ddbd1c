//! HTTP front end for the help bridge.
//!
//! A hyper server accepts connections on the tokio runtime and hands every
//! `/help` and `/custom` request to the interpreter thread through a bounded
//! queue. Anything else is answered with 404 without touching the interpreter.

pub mod env_loader;
pub mod server_constants;
mod worker_pool;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use crossbeam::channel;
use http_body_util::BodyExt;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::events::ClientEventSink;
use crate::filesystem::OsFileSystem;
use crate::help::request::InboundRequest;
use crate::help::response::OutboundResponse;
use crate::help::{HelpBridge, Mount, SessionContext};
use crate::interpreter::Interpreter;

use worker_pool::{spawn_interpreter_worker, InterpreterQueue, RequestData, WorkerSender};

/// A bound help server with its interpreter thread running.
pub struct HelpServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    sender: WorkerSender,
    session: Arc<SessionContext>,
}

impl HelpServer {
    /// Bind the listener and start the interpreter thread.
    ///
    /// `factory` builds the interpreter on that thread. Binding fails if the
    /// help hooks cannot be installed into it.
    pub async fn bind<I, F>(
        config: &BridgeConfig,
        events: Arc<dyn ClientEventSink>,
        factory: F,
    ) -> BridgeResult<Self>
    where
        I: Interpreter + 'static,
        F: FnOnce() -> I + Send + 'static,
    {
        let listener = TcpListener::bind(config.socket_addr()).await?;
        let local_addr = listener.local_addr()?;

        let session = Arc::new(SessionContext::new(events));
        let bridge = HelpBridge::new(
            session.clone(),
            Arc::new(OsFileSystem),
            config.help_css_path.clone(),
        );

        let queue = InterpreterQueue::new(config.queue_capacity);
        let sender = queue.get_sender();
        let startup_rx = spawn_interpreter_worker(bridge, factory, queue.get_receiver())?;
        drop(queue);

        match startup_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(BridgeError::WorkerUnavailable),
        }

        info!("help server listening on http://{}", local_addr);
        Ok(Self {
            listener,
            local_addr,
            sender,
            session,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Session state shared with the interpreter hooks.
    pub fn session(&self) -> Arc<SessionContext> {
        self.session.clone()
    }

    /// Serve until the process exits.
    pub async fn run(self) -> BridgeResult<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves. The interpreter thread exits once the
    /// last open connection is gone.
    pub async fn run_until<S>(self, shutdown: S) -> BridgeResult<()>
    where
        S: Future<Output = ()>,
    {
        let HelpServer { listener, sender, .. } = self;
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("accept failed: {}", e);
                        continue;
                    }
                },
            };
            let io = TokioIo::new(stream);
            let request_tx = sender.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let request_tx = request_tx.clone();
                    async move { handle_hyper_request(req, request_tx).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("connection from {} closed with error: {}", peer, e);
                }
            });
        }

        info!("help server shutting down");
        Ok(())
    }
}

async fn handle_hyper_request(
    req: Request<Incoming>,
    request_tx: WorkerSender,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();
    let request = InboundRequest::from_parts(&parts, body);
    Ok(dispatch(request, &request_tx).await.into_hyper())
}

/// Route `request` to its mount and wait for the interpreter's answer.
async fn dispatch(request: InboundRequest, request_tx: &WorkerSender) -> OutboundResponse {
    let path = request.uri.split('?').next().unwrap_or_default();
    let Some(mount) = Mount::for_path(path) else {
        return OutboundResponse::error(StatusCode::NOT_FOUND, "Not Found");
    };

    let (response_tx, response_rx) = oneshot::channel();
    let request_data = RequestData {
        mount,
        request,
        response_tx,
    };

    if let Err(e) = request_tx.try_send(request_data) {
        match e {
            channel::TrySendError::Full(data) => {
                warn!("interpreter queue full, rejecting {}", data.request.uri)
            }
            channel::TrySendError::Disconnected(data) => {
                warn!("interpreter thread gone, rejecting {}", data.request.uri)
            }
        }
        return unavailable();
    }

    match response_rx.await {
        Ok(response) => response,
        Err(_) => unavailable(),
    }
}

fn unavailable() -> OutboundResponse {
    let mut response = OutboundResponse::new();
    response.set_bridge_error(&BridgeError::WorkerUnavailable);
    response
}

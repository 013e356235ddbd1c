//! Interpreter worker management
//!
//! The interpreter is single threaded, so every help request is queued to one
//! dedicated worker thread that owns it. The HTTP side only ever holds a
//! [`WorkerSender`].

use std::thread;

use crossbeam::channel;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::error::{BridgeError, HookError};
use crate::help::request::InboundRequest;
use crate::help::response::OutboundResponse;
use crate::help::{HelpBridge, Mount};
use crate::interpreter::Interpreter;
use crate::serve::server_constants::INTERPRETER_THREAD_NAME;

/// Request data sent to the interpreter thread
pub(crate) struct RequestData {
    pub mount: Mount,
    pub request: InboundRequest,
    pub response_tx: oneshot::Sender<OutboundResponse>,
}

/// Bounded queue in front of the interpreter thread.
pub(crate) struct InterpreterQueue {
    sender: channel::Sender<RequestData>,
    receiver: channel::Receiver<RequestData>,
}

impl InterpreterQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, receiver) = channel::bounded(capacity);
        Self { sender, receiver }
    }

    pub(crate) fn get_sender(&self) -> WorkerSender {
        WorkerSender {
            sender: self.sender.clone(),
        }
    }

    pub(crate) fn get_receiver(&self) -> channel::Receiver<RequestData> {
        self.receiver.clone()
    }
}

#[derive(Clone)]
pub(crate) struct WorkerSender {
    sender: channel::Sender<RequestData>,
}

impl WorkerSender {
    /// Non-blocking send - returns the data back if the queue is full.
    /// Used from async context to avoid blocking tokio worker threads.
    #[allow(clippy::result_large_err)]
    pub(crate) fn try_send(
        &self,
        data: RequestData,
    ) -> Result<(), channel::TrySendError<RequestData>> {
        self.sender.try_send(data)
    }
}

/// Spawn the interpreter thread.
///
/// `factory` runs on the new thread, so the interpreter itself never has to
/// cross threads. The returned receiver resolves once the help hooks are
/// installed (or failed to install). The thread runs until every sender of
/// `work_rx` is dropped.
pub(crate) fn spawn_interpreter_worker<I, F>(
    bridge: HelpBridge,
    factory: F,
    work_rx: channel::Receiver<RequestData>,
) -> Result<oneshot::Receiver<Result<(), HookError>>, BridgeError>
where
    I: Interpreter + 'static,
    F: FnOnce() -> I + Send + 'static,
{
    let (startup_tx, startup_rx) = oneshot::channel();

    thread::Builder::new()
        .name(INTERPRETER_THREAD_NAME.to_string())
        .spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let mut interpreter = factory();
                if let Err(e) = bridge.install(&mut interpreter) {
                    let _ = startup_tx.send(Err(e));
                    return;
                }
                let _ = startup_tx.send(Ok(()));
                worker_loop(&bridge, &mut interpreter, work_rx);
            }));

            if result.is_err() {
                error!("interpreter thread panicked");
            }
        })?;

    Ok(startup_rx)
}

fn worker_loop<I: Interpreter>(
    bridge: &HelpBridge,
    interpreter: &mut I,
    work_rx: channel::Receiver<RequestData>,
) {
    info!("interpreter thread ready");
    while let Ok(data) = work_rx.recv() {
        let response = bridge.handle(interpreter, data.mount, &data.request);
        if data.response_tx.send(response).is_err() {
            debug!("client went away before {} was answered", data.request.uri);
        }
    }
    info!("request queue closed, interpreter thread exiting");
}

//! Remote tool invocation.
//!
//! [`RemoteToolClient::invoke`] is the only thing stages see: a blocking call
//! that returns decoded JSON or a classified [`RemoteCallError`]. The async
//! transport and the runtime juggling stay in here.

pub mod decode;
pub mod error;

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info, warn};

use crate::app::ports::{ToolReply, ToolTransportPort};
use crate::envelope::MessageEnvelope;
use crate::error::{AuditorError, Result};
use crate::infra::mcp_transport::McpHttpTransport;
use crate::observability::metrics;

pub use decode::{decode_reply, reject_reported_errors, strip_code_fences};
pub use error::{RemoteCallError, RemoteResult};

#[derive(Clone)]
pub struct RemoteToolClient {
    transport: Arc<dyn ToolTransportPort>,
}

impl RemoteToolClient {
    pub fn new(transport: Arc<dyn ToolTransportPort>) -> Self {
        Self { transport }
    }

    /// Client over the HTTP tool transport.
    pub fn http(request_timeout: Option<Duration>) -> Self {
        Self::new(Arc::new(McpHttpTransport::new(request_timeout)))
    }

    /// Blocking call, safe from plain threads and from inside a tokio runtime.
    ///
    /// On a current-thread runtime the ambient event loop stays blocked while
    /// the call runs on a private runtime in a scoped thread. If the remote
    /// service is served by that same loop the call deadlocks; async callers
    /// should use [`invoke_async`](Self::invoke_async) instead.
    pub fn invoke(&self, address: &str, operation: &str, arguments: Value) -> RemoteResult<Value> {
        block_on_bridge(address, self.invoke_async(address, operation, arguments))
    }

    /// Send a request envelope to the operation its task names.
    pub fn dispatch(&self, address: &str, request: &MessageEnvelope) -> Result<Value> {
        let operation = request.task().operation().ok_or_else(|| {
            AuditorError::Crash(format!(
                "envelope {} ({}) is not a remote request",
                request.message_id(),
                request.task().task_type()
            ))
        })?;
        let arguments = request.task().arguments()?;
        debug!(
            message_id = %request.message_id(),
            sender = request.sender(),
            receiver = request.receiver(),
            "Dispatching {} to {}",
            operation,
            address
        );
        Ok(self.invoke(address, operation, arguments)?)
    }

    pub async fn invoke_async(
        &self,
        address: &str,
        operation: &str,
        arguments: Value,
    ) -> RemoteResult<Value> {
        let started = Instant::now();
        info!("Calling remote tool '{}' at {}", operation, address);

        let outcome = match self.transport.call_tool(address, operation, arguments).await {
            Ok(reply) => interpret_reply(address, reply),
            Err(cause) => Err(RemoteCallError::ConnectionFailure {
                address: address.to_string(),
                cause,
            }),
        };

        metrics::remote::call_duration(operation, started.elapsed().as_secs_f64());
        match &outcome {
            Ok(_) => metrics::remote::call_success(operation),
            Err(e) => {
                warn!("Remote tool '{}' failed: {}", operation, e);
                metrics::remote::call_error(operation, e.kind());
            }
        }
        outcome
    }
}

/// Classify raw reply content.
fn interpret_reply(address: &str, reply: ToolReply) -> RemoteResult<Value> {
    let text = reply.first_text().ok_or_else(|| RemoteCallError::EmptyResponse {
        address: address.to_string(),
    })?;
    if reply.is_error {
        return Err(RemoteCallError::RemoteBusinessError {
            message: text.trim().to_string(),
        });
    }
    decode_reply(text).and_then(reject_reported_errors)
}

/// Drive `fut` to completion from synchronous code.
///
/// Inside a multi-thread runtime the call runs on the ambient runtime via
/// `block_in_place`. A current-thread runtime cannot be blocked from its only
/// worker, so the call gets a private runtime on a scoped thread. Without any
/// runtime a private one is built in place.
fn block_on_bridge<F, T>(address: &str, fut: F) -> RemoteResult<T>
where
    F: Future<Output = RemoteResult<T>> + Send,
    T: Send,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| handle.block_on(fut))
        }
        Ok(_) => std::thread::scope(|scope| {
            scope
                .spawn(|| run_on_private_runtime(address, fut))
                .join()
                .unwrap_or_else(|_| {
                    Err(RemoteCallError::ConnectionFailure {
                        address: address.to_string(),
                        cause: "remote call thread panicked".to_string(),
                    })
                })
        }),
        Err(_) => run_on_private_runtime(address, fut),
    }
}

fn run_on_private_runtime<F, T>(address: &str, fut: F) -> RemoteResult<T>
where
    F: Future<Output = RemoteResult<T>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| RemoteCallError::ConnectionFailure {
            address: address.to_string(),
            cause: format!("failed to start runtime: {}", e),
        })?;
    runtime.block_on(fut)
}

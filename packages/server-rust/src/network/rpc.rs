//! Binary RPC listener.
//!
//! Frames are length-delimited MsgPack-encoded envelopes over TCP. One
//! task reads each connection; every decoded request frame is handled by
//! its own worker task (one worker per request), so slow calls never block
//! the connection's read loop. Responses are funneled through a bounded
//! per-connection channel and may complete out of order; clients correlate
//! by `call_id`.
//!
//! Deferred startup, as for the HTTP module: `new()` allocates, `bind()`
//! claims the port, `serve()` accepts until shutdown.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use quill_core::messages::{self, CallMetadata, RequestEnvelope, ResponseEnvelope};
use quill_core::Message;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, error, info, warn};

use super::shutdown::ShutdownController;
use crate::auth::resolve_request_id;
use crate::service::RpcService;

/// Outbound channel capacity per connection.
const OUTBOUND_CAPACITY: usize = 64;

/// The binary RPC server lifecycle.
pub struct RpcModule {
    host: String,
    port: u16,
    listener: Option<TcpListener>,
    service: Arc<RpcService>,
    shutdown: Arc<ShutdownController>,
}

impl RpcModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        port: u16,
        service: Arc<RpcService>,
        shutdown: Arc<ShutdownController>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            listener: None,
            service,
            shutdown,
        }
    }

    /// Binds the TCP listener, returning the actual port (relevant when
    /// port 0 requested an OS-assigned one).
    ///
    /// # Errors
    ///
    /// Returns an error when the address cannot be bound.
    pub async fn bind(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!(%addr, port, "rpc listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Accepts connections until the shutdown signal fires.
    ///
    /// # Errors
    ///
    /// Returns an error on a fatal accept failure.
    ///
    /// # Panics
    ///
    /// Panics if `bind()` was not called first.
    pub async fn serve(self) -> anyhow::Result<()> {
        let listener = self.listener.expect("bind() must be called before serve()");
        let mut shutdown_rx = self.shutdown.shutdown_receiver();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "rpc connection accepted");
                            let service = Arc::clone(&self.service);
                            let shutdown = Arc::clone(&self.shutdown);
                            tokio::spawn(handle_connection(stream, service, shutdown));
                        }
                        Err(err) => warn!(%err, "rpc accept failed"),
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("rpc listener shutting down");
                    break;
                }
            }
        }
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    service: Arc<RpcService>,
    shutdown: Arc<ShutdownController>,
) {
    let framed = Framed::new(stream, LengthDelimitedCodec::new());
    let (mut sink, mut frames) = framed.split();

    let (outbound, mut outbound_rx) = mpsc::channel::<Vec<u8>>(OUTBOUND_CAPACITY);
    let writer = tokio::spawn(async move {
        while let Some(bytes) = outbound_rx.recv().await {
            if sink.send(Bytes::from(bytes)).await.is_err() {
                break;
            }
        }
    });

    let mut shutdown_rx = shutdown.shutdown_receiver();
    loop {
        tokio::select! {
            frame = frames.next() => {
                match frame {
                    Some(Ok(bytes)) => {
                        let service = Arc::clone(&service);
                        let outbound = outbound.clone();
                        let guard = shutdown.in_flight_guard();
                        tokio::spawn(async move {
                            let _guard = guard;
                            let response = serve_frame(&service, &bytes).await;
                            match messages::encode(&response) {
                                Ok(encoded) => {
                                    let _ = outbound.send(encoded).await;
                                }
                                Err(err) => error!(%err, "failed to encode response"),
                            }
                        });
                    }
                    Some(Err(err)) => {
                        warn!(%err, "rpc connection read failed");
                        break;
                    }
                    None => break,
                }
            }
            _ = shutdown_rx.changed() => break,
        }
    }

    drop(outbound);
    let _ = writer.await;
}

/// Decodes and serves one frame. Undecodable frames still get a response:
/// an `ERROR` envelope with `call_id` 0 and a freshly minted request id.
async fn serve_frame(service: &RpcService, bytes: &[u8]) -> ResponseEnvelope {
    match messages::decode::<RequestEnvelope>(bytes) {
        Ok(envelope) => service.serve_envelope(envelope).await,
        Err(err) => {
            let request_id = resolve_request_id(&CallMetadata::default());
            ResponseEnvelope {
                call_id: 0,
                request_id: request_id.clone(),
                body: Message::from_error(&err.with_request_id(request_id)),
            }
        }
    }
}

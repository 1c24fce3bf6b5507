//! In-process RPC client.
//!
//! The HTTP gateway does not invoke business logic directly: it re-encodes
//! each decoded call as a binary RPC call against the just-started
//! listener and relays the response. The client multiplexes calls over a
//! single connection, correlating responses to callers by `call_id`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use quill_core::messages::{self, CallMetadata, RequestEnvelope, ResponseEnvelope};
use quill_core::{Error, Message, Result};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::warn;

type Pending = Arc<DashMap<u64, oneshot::Sender<ResponseEnvelope>>>;

/// Client end of the binary RPC protocol.
pub struct RpcClient {
    outbound: mpsc::Sender<Vec<u8>>,
    pending: Pending,
    next_call_id: AtomicU64,
}

impl RpcClient {
    /// Dials the RPC listener and spawns the connection's read/write
    /// tasks. The listener must already be accepting connections.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection cannot be established.
    pub async fn connect(addr: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let framed = Framed::new(stream, LengthDelimitedCodec::new());
        let (mut sink, mut frames) = framed.split();

        let (outbound, mut outbound_rx) = mpsc::channel::<Vec<u8>>(64);
        tokio::spawn(async move {
            while let Some(bytes) = outbound_rx.recv().await {
                if sink.send(Bytes::from(bytes)).await.is_err() {
                    break;
                }
            }
        });

        let pending: Pending = Arc::new(DashMap::new());
        let dispatch_map = Arc::clone(&pending);
        tokio::spawn(async move {
            while let Some(frame) = frames.next().await {
                match frame {
                    Ok(bytes) => match messages::decode::<ResponseEnvelope>(&bytes) {
                        Ok(envelope) => {
                            if let Some((_, caller)) = dispatch_map.remove(&envelope.call_id) {
                                let _ = caller.send(envelope);
                            }
                        }
                        Err(err) => warn!(%err, "undecodable response frame"),
                    },
                    Err(err) => {
                        warn!(%err, "rpc client read failed");
                        break;
                    }
                }
            }
            // Connection gone: wake every waiter with a closed channel.
            dispatch_map.clear();
        });

        Ok(Self {
            outbound,
            pending,
            next_call_id: AtomicU64::new(0),
        })
    }

    /// Performs one call and waits for its response envelope.
    ///
    /// # Errors
    ///
    /// Returns `Internal` when the connection is closed before the
    /// response arrives. Operation failures are not an `Err` here: they
    /// come back as an `ERROR` message in the envelope body.
    pub async fn call(&self, metadata: CallMetadata, body: Message) -> Result<ResponseEnvelope> {
        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (done, done_rx) = oneshot::channel();
        self.pending.insert(call_id, done);

        let envelope = RequestEnvelope {
            call_id,
            metadata,
            body,
        };
        let bytes = messages::encode(&envelope)?;
        if self.outbound.send(bytes).await.is_err() {
            self.pending.remove(&call_id);
            return Err(Error::internal("rpc connection closed"));
        }

        done_rx
            .await
            .map_err(|_| Error::internal("rpc connection closed"))
    }
}

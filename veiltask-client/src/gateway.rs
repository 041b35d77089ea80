use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use veiltask_core::errors::DecryptError;
use veiltask_core::models::{Address, CipherHandle, EncryptedRecord, TaskReceipt, TaskSubmission};
use veiltask_core::protocol::{GatewayRequest, GatewayResponse};

use crate::chain::TaskStore;
use crate::decrypt::Decryptor;
use crate::errors::{ClientError, ClientResult};
use crate::events::EventDispatcher;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<GatewayResponse>>>>;

/// JSON-over-WebSocket client for the task gateway. Implements both the
/// on-chain store interface and the decryption oracle interface.
///
/// Requests carry a numeric correlation id; a reader task routes each
/// response to the waiting caller, so responses may arrive in any order.
#[derive(Clone)]
pub struct GatewayClient {
    tx: mpsc::Sender<GatewayRequest>,
    pending: PendingMap,
    next_id: Arc<AtomicU64>,
    is_connected: Arc<AtomicBool>,
}

impl GatewayClient {
    pub async fn connect(
        gateway_url: &str,
        address: &Address,
        auth_token: &str,
        event_dispatcher: Option<Arc<EventDispatcher>>,
    ) -> ClientResult<Self> {
        let ws_stream = Self::connect_with_retry(gateway_url, event_dispatcher.clone()).await?;
        let (write, read) = ws_stream.split();

        let (tx_send, mut rx_send) = mpsc::channel::<GatewayRequest>(100);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let is_connected = Arc::new(AtomicBool::new(true));

        // Writer task
        let writer_connected = is_connected.clone();
        tokio::spawn(async move {
            let mut write = write;
            while let Some(msg) = rx_send.recv().await {
                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("GATEWAY: failed to serialize request: {}", e);
                        continue;
                    }
                };
                if write.send(Message::Text(json)).await.is_err() {
                    writer_connected.store(false, Ordering::Relaxed);
                    break;
                }
            }
        });

        // Reader task: route correlated responses to waiting callers.
        let reader_pending = pending.clone();
        let reader_connected = is_connected.clone();
        let reader_dispatcher = event_dispatcher.clone();
        tokio::spawn(async move {
            let mut read = read;
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let response: GatewayResponse = match serde_json::from_str(&text) {
                            Ok(response) => response,
                            Err(e) => {
                                tracing::warn!("GATEWAY: discarding unparseable message: {}", e);
                                continue;
                            }
                        };
                        match response.request_id() {
                            Some(id) => {
                                let waiter = reader_pending
                                    .lock()
                                    .ok()
                                    .and_then(|mut pending| pending.remove(&id));
                                match waiter {
                                    Some(tx) => {
                                        let _ = tx.send(response);
                                    }
                                    None => {
                                        tracing::warn!(
                                            "GATEWAY: response for unknown request id {}",
                                            id
                                        );
                                    }
                                }
                            }
                            None => match response {
                                GatewayResponse::AuthSuccess { session_id } => {
                                    tracing::info!(
                                        "GATEWAY: authenticated, session {}",
                                        session_id
                                    );
                                }
                                GatewayResponse::AuthError { reason } => {
                                    tracing::error!(
                                        "GATEWAY: authentication rejected: {}",
                                        reason
                                    );
                                }
                                GatewayResponse::Pong => {}
                                other => {
                                    tracing::debug!(
                                        "GATEWAY: ignoring uncorrelated message: {:?}",
                                        std::mem::discriminant(&other)
                                    );
                                }
                            },
                        }
                    }
                    Ok(Message::Close(_)) => {
                        reader_connected.store(false, Ordering::Relaxed);
                        if let Some(ref dispatcher) = reader_dispatcher {
                            dispatcher.emit_connection_changed(false);
                        }
                    }
                    _ => {}
                }
            }
            reader_connected.store(false, Ordering::Relaxed);
        });

        let client = Self {
            tx: tx_send,
            pending,
            next_id: Arc::new(AtomicU64::new(1)),
            is_connected,
        };

        client
            .send(GatewayRequest::Authenticate {
                address: address.clone(),
                auth_token: auth_token.to_string(),
            })
            .await?;

        Ok(client)
    }

    async fn connect_with_retry(
        gateway_url: &str,
        event_dispatcher: Option<Arc<EventDispatcher>>,
    ) -> ClientResult<
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    > {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(2000),
            max_elapsed_time: Some(Duration::from_secs(10)),
            randomization_factor: 0.1,
            ..Default::default()
        };

        let gateway_url = gateway_url.to_string();
        let dispatcher = event_dispatcher.clone();
        let operation = || async {
            match connect_async(&gateway_url).await {
                Ok((ws_stream, _)) => {
                    if let Some(ref dispatcher) = dispatcher {
                        dispatcher.emit_connection_changed(true);
                    }
                    Ok(ws_stream)
                }
                Err(e) => {
                    tracing::warn!("GATEWAY: connection to {} failed: {}", gateway_url, e);
                    Err(backoff::Error::transient(e))
                }
            }
        };

        retry(backoff, operation)
            .await
            .map_err(|e| ClientError::Gateway(e.to_string()))
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::Relaxed)
    }

    async fn send(&self, request: GatewayRequest) -> ClientResult<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| ClientError::ConnectionLost)
    }

    /// Issue one correlated request and await its response.
    async fn request(
        &self,
        build: impl FnOnce(u64) -> GatewayRequest,
    ) -> ClientResult<GatewayResponse> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| ClientError::Lock("gateway pending map".to_string()))?
            .insert(id, tx);

        if let Err(e) = self.send(build(id)).await {
            self.drop_pending(id);
            return Err(e);
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ClientError::ConnectionLost),
            Err(_) => {
                self.drop_pending(id);
                Err(ClientError::Gateway(format!("request {} timed out", id)))
            }
        }
    }

    fn drop_pending(&self, id: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&id);
        }
    }
}

#[async_trait]
impl TaskStore for GatewayClient {
    async fn get_tasks(&self, owner: &Address) -> ClientResult<Vec<EncryptedRecord>> {
        let owner = owner.clone();
        match self
            .request(|id| GatewayRequest::GetTasks { id, owner })
            .await?
        {
            GatewayResponse::Tasks { records, .. } => Ok(records),
            GatewayResponse::Error { code, message, .. } => {
                Err(ClientError::Gateway(format!("{:?}: {}", code, message)))
            }
            _ => Err(ClientError::Gateway(
                "unexpected response to get_tasks".to_string(),
            )),
        }
    }

    async fn create_task(
        &self,
        submission: TaskSubmission,
        fee: u128,
    ) -> ClientResult<TaskReceipt> {
        match self
            .request(|id| GatewayRequest::CreateTask {
                id,
                submission,
                fee,
            })
            .await?
        {
            GatewayResponse::TaskCreated { receipt, .. } => Ok(receipt),
            GatewayResponse::Error { code, message, .. } => {
                Err(ClientError::Gateway(format!("{:?}: {}", code, message)))
            }
            _ => Err(ClientError::Gateway(
                "unexpected response to create_task".to_string(),
            )),
        }
    }

    async fn task_creation_fee(&self) -> ClientResult<u128> {
        match self
            .request(|id| GatewayRequest::TaskCreationFee { id })
            .await?
        {
            GatewayResponse::CreationFee { amount, .. } => Ok(amount),
            GatewayResponse::Error { code, message, .. } => {
                Err(ClientError::Gateway(format!("{:?}: {}", code, message)))
            }
            _ => Err(ClientError::Gateway(
                "unexpected response to task_creation_fee".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Decryptor for GatewayClient {
    async fn decrypt(&self, handle: &CipherHandle) -> Result<String, DecryptError> {
        let handle = handle.clone();
        match self
            .request(|id| GatewayRequest::Decrypt { id, handle })
            .await
        {
            Ok(GatewayResponse::Decrypted { plaintext, .. }) => Ok(plaintext),
            Ok(GatewayResponse::DecryptFailed {
                reason, retryable, ..
            }) => {
                if retryable {
                    Err(DecryptError::Transient(reason))
                } else {
                    Err(DecryptError::Permanent(reason))
                }
            }
            Ok(GatewayResponse::Error { message, .. }) => Err(DecryptError::Permanent(message)),
            Ok(_) => Err(DecryptError::Permanent(
                "unexpected response to decrypt".to_string(),
            )),
            // Connection trouble is worth retrying later.
            Err(e) => Err(DecryptError::Transient(e.to_string())),
        }
    }
}

use crate::domain::payment::PaymentRecord;
use crate::domain::ports::{ChannelEvent, PaymentApi, PushChannel, PushStream};
use crate::error::{Result, TrackerError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

/// What the in-memory gateway answers to a status query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryReply {
    Respond(Value),
    /// Simulates a network failure with the given text.
    Fail(String),
}

/// A thread-safe in-memory payment backend.
///
/// Holds payment records by id and a single scripted status query reply.
/// Counts status queries so callers can check the fallback fired only once.
#[derive(Default, Clone)]
pub struct InMemoryPaymentApi {
    payments: Arc<RwLock<HashMap<String, PaymentRecord>>>,
    reply: Arc<RwLock<Option<QueryReply>>>,
    queries: Arc<AtomicUsize>,
}

impl InMemoryPaymentApi {
    /// Creates a new, empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn store(&self, record: PaymentRecord) {
        let mut payments = self.payments.write().await;
        payments.insert(record.id.clone(), record);
    }

    pub async fn set_query_reply(&self, reply: QueryReply) {
        *self.reply.write().await = Some(reply);
    }

    /// Number of status queries issued so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentApi for InMemoryPaymentApi {
    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentRecord> {
        let payments = self.payments.read().await;
        payments
            .get(payment_id)
            .cloned()
            .ok_or_else(|| TrackerError::NotFound(payment_id.to_string()))
    }

    async fn query_status(&self, _tracking_key: &str) -> Result<Value> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match self.reply.read().await.clone() {
            Some(QueryReply::Respond(response)) => Ok(response),
            Some(QueryReply::Fail(error)) => Err(TrackerError::IoError(io::Error::other(error))),
            None => Err(TrackerError::UnexpectedResponse(
                "no status query reply configured".to_string(),
            )),
        }
    }
}

/// An in-memory push channel.
///
/// Each tracking key gets one subscription; events are fed through the
/// [`PushSender`] returned by [`InMemoryPushChannel::open`].
#[derive(Default, Clone)]
pub struct InMemoryPushChannel {
    pending: Arc<Mutex<HashMap<String, mpsc::UnboundedReceiver<ChannelEvent>>>>,
    subscriptions: Arc<AtomicUsize>,
}

impl InMemoryPushChannel {
    /// Creates a new push channel with no open keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the channel for `tracking_key` and returns its feeding end.
    pub fn open(&self, tracking_key: &str) -> PushSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tracking_key.to_string(), rx);
        PushSender { tx }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushChannel for InMemoryPushChannel {
    async fn subscribe(&self, tracking_key: &str) -> Result<PushStream> {
        let rx = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(tracking_key)
            .ok_or_else(|| TrackerError::NotFound(format!("push channel {tracking_key}")))?;
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

/// Feeding end of an in-memory push channel. Dropping it closes the channel.
#[derive(Debug, Clone)]
pub struct PushSender {
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl PushSender {
    /// Delivers a raw message. Returns `false` once the subscriber is gone.
    pub fn send_message(&self, raw: impl Into<String>) -> bool {
        self.tx.send(ChannelEvent::Message(raw.into())).is_ok()
    }

    pub fn send_error(&self, error: impl Into<String>) -> bool {
        self.tx.send(ChannelEvent::Error(error.into())).is_ok()
    }

    /// True once the subscriber has dropped its end of the channel.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the subscriber has dropped its end of the channel.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    /// Plays `script` in the background, each event after its delay, then keeps
    /// the channel open until the subscriber goes away.
    pub fn play(self, script: Vec<(Duration, ChannelEvent)>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            for (delay, event) in script {
                tokio::time::sleep(delay).await;
                if self.tx.send(event).is_err() {
                    return;
                }
            }
            self.closed().await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{PaymentMethod, PaymentStatus};
    use futures_util::StreamExt;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn record() -> PaymentRecord {
        PaymentRecord {
            id: "pay_1".to_string(),
            status: PaymentStatus::Pending,
            amount: dec!(100.0),
            currency: "KES".to_string(),
            method: PaymentMethod::Mpesa,
            invoice_id: Some("inv_1".to_string()),
            tracking_key: None,
        }
    }

    #[tokio::test]
    async fn test_in_memory_payment_api() {
        let api = InMemoryPaymentApi::new();
        api.store(record()).await;

        assert_eq!(api.fetch_payment("pay_1").await.unwrap(), record());
        assert!(matches!(
            api.fetch_payment("pay_2").await,
            Err(TrackerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_in_memory_query_reply() {
        let api = InMemoryPaymentApi::new();
        assert!(api.query_status("k").await.is_err());

        api.set_query_reply(QueryReply::Respond(json!({"resultCode": 0})))
            .await;
        assert_eq!(api.query_status("k").await.unwrap(), json!({"resultCode": 0}));

        api.set_query_reply(QueryReply::Fail("unreachable".to_string()))
            .await;
        assert!(matches!(
            api.query_status("k").await,
            Err(TrackerError::IoError(_))
        ));
        assert_eq!(api.query_count(), 3);
    }

    #[tokio::test]
    async fn test_in_memory_push_channel() {
        let channel = InMemoryPushChannel::new();
        let sender = channel.open("k");

        let mut stream = channel.subscribe("k").await.unwrap();
        assert!(channel.subscribe("k").await.is_err());
        assert_eq!(channel.subscription_count(), 1);

        assert!(sender.send_message("hello"));
        assert_eq!(
            stream.next().await,
            Some(ChannelEvent::Message("hello".to_string()))
        );

        drop(stream);
        assert!(sender.is_closed());
        assert!(!sender.send_message("late"));
    }
}

use super::payment::PaymentRecord;
use crate::error::Result;
use async_trait::async_trait;
use futures_util::Stream;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;

/// REST collaborator: the payment record and the gateway status query.
#[async_trait]
pub trait PaymentApi: Send + Sync {
    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentRecord>;
    /// One-shot status query. The response shape is gateway-defined.
    async fn query_status(&self, tracking_key: &str) -> Result<Value>;
}

/// Event delivered by a live push subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Message(String),
    Error(String),
}

/// A live subscription. The stream ending means the channel closed.
pub type PushStream = Pin<Box<dyn Stream<Item = ChannelEvent> + Send>>;

/// Real-time channel addressed by tracking key.
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn subscribe(&self, tracking_key: &str) -> Result<PushStream>;
}

pub type PaymentApiRef = Arc<dyn PaymentApi>;
pub type PushChannelRef = Arc<dyn PushChannel>;

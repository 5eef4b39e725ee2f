use crate::application::tracker::PaymentTracker;
use crate::config::TrackerConfig;
use crate::domain::payment::PaymentRecord;
use crate::domain::ports::ChannelEvent;
use crate::domain::session::PaymentSession;
use crate::error::Result;
use crate::infrastructure::in_memory::{InMemoryPaymentApi, InMemoryPushChannel, QueryReply};
use serde::Deserialize;
use serde_json::Value;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

/// A scripted tracking session replayed against the in-memory adapters.
///
/// ```json
/// {
///   "payment": { "id": "pay_1", "status": "pending", "amount": "100",
///                "currency": "KES", "method": "mpesa" },
///   "trackingKey": "ws_CO_1",
///   "push": [{ "afterMs": 500, "message": { "resultCode": 0 } }],
///   "query": { "response": { "resultCode": "1032" } },
///   "fallbackDelayMs": 2000
/// }
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationScript {
    pub payment: PaymentRecord,
    #[serde(default)]
    pub tracking_key: Option<String>,
    #[serde(default)]
    pub push: Vec<ScriptedPush>,
    #[serde(default)]
    pub query: Option<ScriptedQuery>,
    #[serde(default)]
    pub fallback_delay_ms: Option<u64>,
    #[serde(default)]
    pub unmount_after_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptedPush {
    /// Delay after the previous push event.
    pub after_ms: u64,
    #[serde(flatten)]
    pub event: ScriptedEvent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptedEvent {
    /// A JSON string is sent verbatim, anything else is serialized first.
    Message(Value),
    Error(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptedQuery {
    Response(Value),
    Error(String),
}

impl From<ScriptedEvent> for ChannelEvent {
    fn from(event: ScriptedEvent) -> Self {
        match event {
            ScriptedEvent::Message(Value::String(raw)) => ChannelEvent::Message(raw),
            ScriptedEvent::Message(payload) => ChannelEvent::Message(payload.to_string()),
            ScriptedEvent::Error(error) => ChannelEvent::Error(error),
        }
    }
}

impl From<ScriptedQuery> for QueryReply {
    fn from(query: ScriptedQuery) -> Self {
        match query {
            ScriptedQuery::Response(response) => QueryReply::Respond(response),
            ScriptedQuery::Error(error) => QueryReply::Fail(error),
        }
    }
}

impl SimulationScript {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        Ok(serde_json::from_reader(source)?)
    }

    /// Runs the script to completion, reporting each distinct snapshot.
    pub async fn run<F>(self, on_snapshot: F) -> Result<PaymentSession>
    where
        F: FnMut(&PaymentSession) -> Result<()>,
    {
        let api = InMemoryPaymentApi::new();
        let push = InMemoryPushChannel::new();

        let payment_id = self.payment.id.clone();
        let tracking_key = self
            .tracking_key
            .clone()
            .or_else(|| self.payment.tracking_key.clone());
        api.store(self.payment).await;
        if let Some(query) = self.query {
            api.set_query_reply(query.into()).await;
        }
        if let Some(key) = &tracking_key {
            let script: Vec<(Duration, ChannelEvent)> = self
                .push
                .into_iter()
                .map(|step| (Duration::from_millis(step.after_ms), step.event.into()))
                .collect();
            push.open(key).play(script);
        }

        let mut config = TrackerConfig::default();
        if let Some(ms) = self.fallback_delay_ms {
            config.fallback_delay = Duration::from_millis(ms);
        }
        let tracker = PaymentTracker::new(Arc::new(api), Arc::new(push), &config);
        let handle = tracker.mount(&payment_id, tracking_key).await?;

        let unmount_after = self.unmount_after_ms.map(Duration::from_millis);
        handle
            .follow(on_snapshot, async move {
                match unmount_after {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => std::future::pending().await,
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::PaymentStatus;

    const SCRIPT: &str = r#"{
        "payment": {"id": "pay_7", "status": "pending", "amount": "120.00",
                    "currency": "KES", "method": "mpesa"},
        "trackingKey": "ws_CO_7",
        "push": [
            {"afterMs": 10, "message": "garbage"},
            {"afterMs": 10, "error": "socket hiccup"},
            {"afterMs": 10, "message": {"resultCode": 2001, "message": "wrong pin"}}
        ],
        "fallbackDelayMs": 60000
    }"#;

    #[test]
    fn test_script_parsing() {
        let script = SimulationScript::from_reader(SCRIPT.as_bytes()).unwrap();
        assert_eq!(script.push.len(), 3);
        assert!(matches!(script.push[1].event, ScriptedEvent::Error(_)));
        assert!(script.query.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_run() {
        let script = SimulationScript::from_reader(SCRIPT.as_bytes()).unwrap();
        let mut seen = Vec::new();

        let last = script
            .run(|snapshot| {
                seen.push(snapshot.clone());
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(last.status, PaymentStatus::Failed);
        assert_eq!(last.error_message.as_deref(), Some("Wrong M-Pesa PIN entered"));
        assert_eq!(seen.first().unwrap().status, PaymentStatus::Pending);
        assert_eq!(seen.last().unwrap(), &last);
        assert!(seen.iter().any(|s| s.channel_error.as_deref() == Some("socket hiccup")));
    }
}

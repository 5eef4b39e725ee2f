#![allow(dead_code)]

use payment_tracker::application::tracker::PaymentTracker;
use payment_tracker::config::TrackerConfig;
use payment_tracker::domain::payment::{PaymentMethod, PaymentRecord, PaymentStatus};
use payment_tracker::infrastructure::in_memory::{
    InMemoryPaymentApi, InMemoryPushChannel, PushSender,
};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

pub const PAYMENT_ID: &str = "pay_1";
pub const TRACKING_KEY: &str = "ws_CO_191220191020363925";

pub struct Harness {
    pub api: InMemoryPaymentApi,
    pub push: InMemoryPushChannel,
    pub sender: PushSender,
    pub tracker: PaymentTracker,
}

pub fn record(method: PaymentMethod, status: PaymentStatus) -> PaymentRecord {
    PaymentRecord {
        id: PAYMENT_ID.to_string(),
        status,
        amount: dec!(1500.00),
        currency: "KES".to_string(),
        method,
        invoice_id: Some("inv_42".to_string()),
        tracking_key: None,
    }
}

/// In-memory backend holding one payment, with the push channel for
/// `TRACKING_KEY` open and the default 60 second fallback window.
pub async fn harness(method: PaymentMethod, status: PaymentStatus) -> Harness {
    let api = InMemoryPaymentApi::new();
    api.store(record(method, status)).await;
    let push = InMemoryPushChannel::new();
    let sender = push.open(TRACKING_KEY);

    let tracker = PaymentTracker::new(
        Arc::new(api.clone()),
        Arc::new(push.clone()),
        &TrackerConfig::default(),
    );

    Harness {
        api,
        push,
        sender,
        tracker,
    }
}

/// Asserts the push subscriber goes away promptly.
pub async fn assert_listener_closed(sender: &PushSender) {
    tokio::time::timeout(Duration::from_secs(1), sender.closed())
        .await
        .expect("push listener was not closed");
}

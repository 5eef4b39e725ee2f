use super::payment::{PaymentMethod, PaymentRecord, PaymentStatus};
use serde::Serialize;

/// Snapshot of one payment confirmation session.
///
/// This is what the status screen renders. It is rebuilt from the backend
/// record on every mount and only refined in memory by live events.
#[derive(Debug, Serialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub payment_id: String,
    pub tracking_key: Option<String>,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Set only when `status` is `Failed` or `Cancelled`.
    pub error_message: Option<String>,
    /// Display-only; closing the channel never implies failure.
    pub channel_connected: bool,
    /// Last transport error, display-only.
    pub channel_error: Option<String>,
    pub fallback_armed: bool,
    pub fallback_fired: bool,
    /// The status query came back, with an answer or an error.
    pub fallback_answered: bool,
}

impl PaymentSession {
    /// Builds the initial session from the authoritative record.
    ///
    /// An explicit `tracking_key` wins over the one stored on the record.
    pub fn from_record(record: &PaymentRecord, tracking_key: Option<String>) -> Self {
        Self {
            payment_id: record.id.clone(),
            tracking_key: tracking_key.or_else(|| record.tracking_key.clone()),
            method: record.method,
            status: record.status,
            error_message: None,
            channel_connected: false,
            channel_error: None,
            fallback_armed: false,
            fallback_fired: false,
            fallback_answered: false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the "retry payment" action should be offered.
    pub fn can_retry(&self) -> bool {
        matches!(
            self.status,
            PaymentStatus::Failed | PaymentStatus::Cancelled
        )
    }

    /// Whether the "checking status" indicator should be shown.
    pub fn fallback_active(&self) -> bool {
        self.fallback_fired && !self.fallback_answered && !self.is_terminal()
    }

    pub fn wants_push(&self) -> bool {
        self.method.supports_push() && self.tracking_key.is_some()
    }

    pub fn wants_fallback(&self) -> bool {
        self.method.supports_query() && self.tracking_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(method: PaymentMethod, tracking_key: Option<&str>) -> PaymentRecord {
        PaymentRecord {
            id: "pay_1".to_string(),
            status: PaymentStatus::Pending,
            amount: dec!(250.00),
            currency: "KES".to_string(),
            method,
            invoice_id: None,
            tracking_key: tracking_key.map(str::to_string),
        }
    }

    #[test]
    fn test_explicit_tracking_key_wins() {
        let session = PaymentSession::from_record(
            &record(PaymentMethod::Mpesa, Some("from_record")),
            Some("explicit".to_string()),
        );
        assert_eq!(session.tracking_key.as_deref(), Some("explicit"));

        let session =
            PaymentSession::from_record(&record(PaymentMethod::Mpesa, Some("from_record")), None);
        assert_eq!(session.tracking_key.as_deref(), Some("from_record"));
    }

    #[test]
    fn test_channels_require_tracking_key() {
        let session = PaymentSession::from_record(&record(PaymentMethod::Mpesa, None), None);
        assert!(!session.wants_push());
        assert!(!session.wants_fallback());

        let session = PaymentSession::from_record(&record(PaymentMethod::Card, Some("k")), None);
        assert!(session.wants_push());
        assert!(!session.wants_fallback());
    }

    #[test]
    fn test_fallback_active_until_answered() {
        let mut session = PaymentSession::from_record(&record(PaymentMethod::Mpesa, None), None);
        assert!(!session.fallback_active());
        session.fallback_fired = true;
        assert!(session.fallback_active());
        session.status = PaymentStatus::Processing;
        session.fallback_answered = true;
        assert!(!session.fallback_active());
    }

    #[test]
    fn test_retry_only_after_failure() {
        let mut session = PaymentSession::from_record(&record(PaymentMethod::Mpesa, None), None);
        assert!(!session.can_retry());
        session.status = PaymentStatus::Cancelled;
        assert!(session.can_retry());
        session.status = PaymentStatus::Completed;
        assert!(!session.can_retry());
    }
}

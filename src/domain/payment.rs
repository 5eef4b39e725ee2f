use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a payment as seen by the tracker.
///
/// Statuses are ordered: `Pending` < `Processing` < terminal. A session only ever
/// moves forward through that order.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed | Self::Cancelled => 2,
        }
    }

    /// Whether moving from `self` to `next` is a forward transition.
    pub fn can_advance_to(self, next: PaymentStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment channel recorded on the backend payment.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Mobile money (STK push). Supports both the push channel and the status query.
    Mpesa,
    /// Card gateway. Completion is relayed over the push channel only.
    Card,
    BankTransfer,
    Cash,
    #[serde(other)]
    Other,
}

impl PaymentMethod {
    pub fn is_tracked(self) -> bool {
        matches!(self, Self::Mpesa | Self::Card)
    }

    pub fn supports_push(self) -> bool {
        matches!(self, Self::Mpesa | Self::Card)
    }

    pub fn supports_query(self) -> bool {
        matches!(self, Self::Mpesa)
    }
}

/// The backend's authoritative payment record.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: String,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
    #[serde(default, alias = "invoice")]
    pub invoice_id: Option<String>,
    #[serde(default, alias = "checkoutRequestId")]
    pub tracking_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_only_moves_forward() {
        assert!(PaymentStatus::Pending.can_advance_to(PaymentStatus::Processing));
        assert!(PaymentStatus::Pending.can_advance_to(PaymentStatus::Failed));
        assert!(PaymentStatus::Processing.can_advance_to(PaymentStatus::Completed));
        assert!(!PaymentStatus::Processing.can_advance_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Processing.can_advance_to(PaymentStatus::Processing));
        assert!(!PaymentStatus::Completed.can_advance_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Cancelled.can_advance_to(PaymentStatus::Completed));
    }

    #[test]
    fn test_method_capabilities() {
        assert!(PaymentMethod::Mpesa.supports_query());
        assert!(PaymentMethod::Card.supports_push());
        assert!(!PaymentMethod::Card.supports_query());
        assert!(!PaymentMethod::Cash.is_tracked());
        assert!(!PaymentMethod::BankTransfer.is_tracked());
    }

    #[test]
    fn test_record_deserialization() {
        let json = r#"{
            "id": "pay_1",
            "status": "canceled",
            "amount": "1500.50",
            "currency": "KES",
            "method": "paypal",
            "invoice": "inv_9",
            "checkoutRequestId": "ws_CO_1"
        }"#;
        let record: PaymentRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.status, PaymentStatus::Cancelled);
        assert_eq!(record.amount, dec!(1500.50));
        assert_eq!(record.method, PaymentMethod::Other);
        assert_eq!(record.invoice_id.as_deref(), Some("inv_9"));
        assert_eq!(record.tracking_key.as_deref(), Some("ws_CO_1"));
    }
}

//! Normalization of gateway result codes.
//!
//! The gateway reports each transaction attempt with an integer result code.
//! [`resolve`] maps that code onto a [`PaymentStatus`] plus the message shown to
//! the user, using the [`RESULT_CODES`] table. Codes missing from the table fall
//! through to a failure carrying the gateway's own message.

use super::payment::PaymentStatus;

pub const SUCCESS_CODE: i64 = 0;

/// "The transaction is still under processing."
pub const STILL_PROCESSING_CODE: i64 = 4999;

pub const DEFAULT_FAILURE_MESSAGE: &str = "Payment failed. Please try again.";

/// Known result codes, excluding success and the still-processing sentinel.
pub static RESULT_CODES: &[(i64, PaymentStatus, &str)] = &[
    (1, PaymentStatus::Failed, "Insufficient M-Pesa balance"),
    (
        11,
        PaymentStatus::Failed,
        "Invalid phone number - this account cannot receive payment requests",
    ),
    (
        26,
        PaymentStatus::Failed,
        "M-Pesa is busy - please try again shortly",
    ),
    (
        1001,
        PaymentStatus::Failed,
        "Another M-Pesa transaction is in progress - please wait and retry",
    ),
    (
        1019,
        PaymentStatus::Failed,
        "Transaction expired - please try again",
    ),
    (
        1025,
        PaymentStatus::Failed,
        "Payment request could not be sent - please try again",
    ),
    (1032, PaymentStatus::Cancelled, "Payment cancelled by user"),
    (
        1037,
        PaymentStatus::Failed,
        "Payment timeout - could not reach your phone",
    ),
    (2001, PaymentStatus::Failed, "Wrong M-Pesa PIN entered"),
    (
        9999,
        PaymentStatus::Failed,
        "M-Pesa internal error - please try again later",
    ),
];

/// A normalized gateway outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: PaymentStatus,
    /// Set only for `Failed` and `Cancelled`.
    pub message: Option<String>,
}

impl Outcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: PaymentStatus::Failed,
            message: Some(message.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Maps a gateway result code and message to a normalized outcome.
pub fn resolve(code: i64, message: &str) -> Outcome {
    match code {
        SUCCESS_CODE => Outcome {
            status: PaymentStatus::Completed,
            message: None,
        },
        STILL_PROCESSING_CODE => Outcome {
            status: PaymentStatus::Processing,
            message: None,
        },
        _ => match RESULT_CODES.iter().find(|(known, _, _)| *known == code) {
            Some((_, status, mapped)) => Outcome {
                status: *status,
                message: Some((*mapped).to_string()),
            },
            None => {
                let message = message.trim();
                if message.is_empty() {
                    Outcome::failed(DEFAULT_FAILURE_MESSAGE)
                } else {
                    Outcome::failed(message)
                }
            }
        },
    }
}

use crate::domain::message::{PushMessage, QueryResult};
use crate::domain::outcome::{self, Outcome};
use crate::domain::payment::PaymentStatus;
use crate::domain::session::PaymentSession;
use serde_json::Value;
use tracing::{debug, info, warn};

pub const FALLBACK_FAILURE_MESSAGE: &str =
    "Could not verify payment status. You may retry the payment.";

/// Inputs accepted by [`SessionMachine::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    ChannelOpened,
    ChannelMessage(String),
    ChannelError(String),
    ChannelClosed,
    FallbackFired,
    FallbackResponse(Value),
    FallbackFailed(String),
    Unmount,
}

/// Cancellation work the owner of the listener and fallback tasks must carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    CloseChannel,
    CancelFallback,
}

/// The session controller's state machine.
///
/// Pure and synchronous: it owns a [`PaymentSession`], folds inputs into it and
/// reports which background work has to be cancelled. Once torn down (terminal
/// status or unmount) every further input is ignored.
#[derive(Debug)]
pub struct SessionMachine {
    session: PaymentSession,
    listening: bool,
    fallback_live: bool,
    torn_down: bool,
}

impl SessionMachine {
    pub fn new(session: PaymentSession) -> Self {
        let torn_down = session.is_terminal();
        Self {
            session,
            listening: false,
            fallback_live: false,
            torn_down,
        }
    }

    pub fn snapshot(&self) -> &PaymentSession {
        &self.session
    }

    pub fn into_snapshot(self) -> PaymentSession {
        self.session
    }

    /// True after teardown; no input will change the snapshot again.
    pub fn is_finished(&self) -> bool {
        self.torn_down
    }

    /// Records that a push listener was started.
    pub fn start_listener(&mut self) {
        if !self.torn_down {
            self.listening = true;
        }
    }

    /// Records that the fallback timer was armed.
    pub fn arm_fallback(&mut self) {
        if !self.torn_down && !self.session.fallback_fired {
            self.fallback_live = true;
            self.session.fallback_armed = true;
        }
    }

    pub fn apply(&mut self, input: SessionInput) -> Vec<Effect> {
        if self.torn_down {
            debug!(payment_id = %self.session.payment_id, ?input, "session finished, input ignored");
            return Vec::new();
        }

        match input {
            SessionInput::ChannelOpened => {
                self.session.channel_connected = true;
                self.session.channel_error = None;
                Vec::new()
            }
            SessionInput::ChannelMessage(raw) => match PushMessage::parse(&raw) {
                Ok(PushMessage::GatewayResult { code, message }) => {
                    self.apply_outcome(outcome::resolve(code, &message))
                }
                Ok(PushMessage::StatusUpdate { status, message }) => {
                    self.apply_outcome(status_outcome(status, message))
                }
                Err(e) => {
                    warn!(payment_id = %self.session.payment_id, error = %e, "dropping malformed push message");
                    Vec::new()
                }
            },
            SessionInput::ChannelError(error) => {
                warn!(payment_id = %self.session.payment_id, %error, "push channel error");
                self.session.channel_error = Some(error);
                Vec::new()
            }
            SessionInput::ChannelClosed => {
                self.listening = false;
                self.session.channel_connected = false;
                Vec::new()
            }
            SessionInput::FallbackFired => {
                info!(payment_id = %self.session.payment_id, "no confirmation yet, querying gateway");
                self.session.fallback_armed = false;
                self.session.fallback_fired = true;
                Vec::new()
            }
            SessionInput::FallbackResponse(response) => {
                self.fallback_live = false;
                self.session.fallback_answered = true;
                let outcome = match QueryResult::extract(&response) {
                    Ok(result) => outcome::resolve(result.code, &result.description),
                    Err(e) => {
                        warn!(payment_id = %self.session.payment_id, error = %e, "status query response not understood");
                        Outcome::failed(FALLBACK_FAILURE_MESSAGE)
                    }
                };
                self.apply_outcome(outcome)
            }
            SessionInput::FallbackFailed(error) => {
                self.fallback_live = false;
                self.session.fallback_answered = true;
                warn!(payment_id = %self.session.payment_id, %error, "status query failed");
                self.apply_outcome(Outcome::failed(FALLBACK_FAILURE_MESSAGE))
            }
            SessionInput::Unmount => {
                info!(payment_id = %self.session.payment_id, status = %self.session.status, "session abandoned");
                self.teardown()
            }
        }
    }

    /// Cancels everything still running. Safe to call repeatedly; effects are
    /// only returned the first time.
    pub fn teardown(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.listening {
            effects.push(Effect::CloseChannel);
        }
        if self.fallback_live {
            effects.push(Effect::CancelFallback);
        }
        self.listening = false;
        self.fallback_live = false;
        self.session.channel_connected = false;
        self.session.fallback_armed = false;
        self.torn_down = true;
        effects
    }

    fn apply_outcome(&mut self, outcome: Outcome) -> Vec<Effect> {
        let current = self.session.status;
        if !current.can_advance_to(outcome.status) {
            debug!(payment_id = %self.session.payment_id, %current, next = %outcome.status, "non-forward transition ignored");
            return Vec::new();
        }

        info!(payment_id = %self.session.payment_id, from = %current, to = %outcome.status, "payment status changed");
        self.session.status = outcome.status;
        if outcome.is_terminal() {
            self.session.error_message = outcome.message;
            self.teardown()
        } else {
            Vec::new()
        }
    }
}

fn status_outcome(status: PaymentStatus, message: Option<String>) -> Outcome {
    let message = match status {
        PaymentStatus::Failed => Some(message.unwrap_or_else(|| "Payment failed".to_string())),
        PaymentStatus::Cancelled => {
            Some(message.unwrap_or_else(|| "Payment was cancelled".to_string()))
        }
        _ => None,
    };
    Outcome { status, message }
}

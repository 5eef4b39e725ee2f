use super::session::{Effect, SessionInput, SessionMachine};
use crate::config::TrackerConfig;
use crate::domain::ports::{ChannelEvent, PaymentApiRef, PushChannelRef};
use crate::domain::session::PaymentSession;
use crate::error::Result;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Mounts payment confirmation sessions.
///
/// Each call to [`PaymentTracker::mount`] reconstructs the session from the
/// backend record and, for tracked methods, races the push listener against a
/// single delayed status query.
pub struct PaymentTracker {
    api: PaymentApiRef,
    push: PushChannelRef,
    fallback_delay: Duration,
}

impl PaymentTracker {
    /// Creates a new `PaymentTracker`.
    ///
    /// # Arguments
    ///
    /// * `api` - The REST backend used for the record and the status query.
    /// * `push` - The real-time channel carrying completion events.
    /// * `config` - Only `fallback_delay` is read here.
    pub fn new(api: PaymentApiRef, push: PushChannelRef, config: &TrackerConfig) -> Self {
        Self {
            api,
            push,
            fallback_delay: config.fallback_delay,
        }
    }

    /// Starts tracking `payment_id`.
    ///
    /// Only a failure to load the payment record is returned as an error;
    /// everything after that is folded into the session snapshot.
    pub async fn mount(
        &self,
        payment_id: &str,
        tracking_key: Option<String>,
    ) -> Result<TrackerHandle> {
        let record = self.api.fetch_payment(payment_id).await?;
        let session = PaymentSession::from_record(&record, tracking_key);
        let mut machine = SessionMachine::new(session);

        let (inputs, rx) = mpsc::unbounded_channel();
        let mut listener = None;
        let mut fallback = None;

        let session = machine.snapshot().clone();
        if machine.is_finished() {
            info!(payment_id, status = %session.status, "payment already settled, nothing to track");
        } else if !session.method.is_tracked() {
            info!(payment_id, method = ?session.method, "payment method is not tracked");
        } else {
            if session.wants_push()
                && let Some(key) = session.tracking_key.clone()
            {
                machine.start_listener();
                listener = Some(tokio::spawn(listen(self.push.clone(), key, inputs.clone())));
            }
            if session.wants_fallback()
                && let Some(key) = session.tracking_key.clone()
            {
                machine.arm_fallback();
                fallback = Some(tokio::spawn(poll_once(
                    self.api.clone(),
                    key,
                    self.fallback_delay,
                    inputs.clone(),
                )));
            }
            info!(
                payment_id,
                status = %session.status,
                push = listener.is_some(),
                fallback = fallback.is_some(),
                "tracking payment"
            );
        }
        if listener.is_none() && fallback.is_none() {
            machine.teardown();
        }

        let (snapshots_tx, snapshots) = watch::channel(machine.snapshot().clone());
        let (history_tx, history) = mpsc::unbounded_channel();
        let _ = history_tx.send(machine.snapshot().clone());
        let publisher = Publisher {
            latest: snapshots_tx,
            history: history_tx,
        };
        let driver = tokio::spawn(drive(machine, rx, publisher, listener, fallback));

        Ok(TrackerHandle {
            inputs,
            snapshots,
            history,
            driver: Some(driver),
        })
    }
}

/// The screen-side view of a mounted session.
///
/// Dropping the handle unmounts the session.
pub struct TrackerHandle {
    inputs: mpsc::UnboundedSender<SessionInput>,
    snapshots: watch::Receiver<PaymentSession>,
    /// Every published snapshot, in order, starting with the initial one.
    history: mpsc::UnboundedReceiver<PaymentSession>,
    driver: Option<JoinHandle<PaymentSession>>,
}

impl TrackerHandle {
    pub fn snapshot(&self) -> PaymentSession {
        self.snapshots.borrow().clone()
    }

    /// A receiver holding the latest snapshot. Intermediate snapshots may be
    /// skipped; use [`TrackerHandle::follow`] to see each one.
    pub fn subscribe(&self) -> watch::Receiver<PaymentSession> {
        self.snapshots.clone()
    }

    /// Waits until the session reaches a terminal status.
    ///
    /// Returns the latest snapshot instead if the session ends without one
    /// (for example after [`TrackerHandle::unmount`]).
    pub async fn wait_for_terminal(&self) -> PaymentSession {
        let mut rx = self.snapshots.clone();
        if let Ok(snapshot) = rx.wait_for(PaymentSession::is_terminal).await {
            return snapshot.clone();
        }
        rx.borrow().clone()
    }

    /// Abandons the session. Idempotent.
    pub fn unmount(&self) {
        let _ = self.inputs.send(SessionInput::Unmount);
    }

    /// Reports every distinct snapshot to `on_snapshot`, in order, until the
    /// session finishes. The session is unmounted when `stop` resolves first.
    pub async fn follow<F, S>(mut self, mut on_snapshot: F, stop: S) -> Result<PaymentSession>
    where
        F: FnMut(&PaymentSession) -> Result<()>,
        S: Future<Output = ()>,
    {
        tokio::pin!(stop);
        let mut last: Option<PaymentSession> = None;
        let mut stopped = false;
        loop {
            tokio::select! {
                next = self.history.recv() => {
                    let Some(snapshot) = next else {
                        break;
                    };
                    if last.as_ref() != Some(&snapshot) {
                        on_snapshot(&snapshot)?;
                        last = Some(snapshot);
                    }
                }
                _ = &mut stop, if !stopped => {
                    stopped = true;
                    self.unmount();
                }
            }
        }

        self.finished().await
    }

    /// Waits for the session to finish and returns its final snapshot.
    pub async fn finished(mut self) -> Result<PaymentSession> {
        match self.driver.take() {
            Some(driver) => Ok(driver.await?),
            None => Ok(self.snapshot()),
        }
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        self.unmount();
    }
}

async fn drive(
    mut machine: SessionMachine,
    mut inputs: mpsc::UnboundedReceiver<SessionInput>,
    publisher: Publisher,
    mut listener: Option<JoinHandle<()>>,
    mut fallback: Option<JoinHandle<()>>,
) -> PaymentSession {
    while !machine.is_finished() {
        let Some(input) = inputs.recv().await else {
            break;
        };
        let effects = machine.apply(input);
        cancel(effects, &mut listener, &mut fallback);
        publisher.publish(machine.snapshot());
    }

    // Inputs still queued are dropped with the receiver.
    cancel(machine.teardown(), &mut listener, &mut fallback);
    abort(&mut listener);
    abort(&mut fallback);
    publisher.publish(machine.snapshot());
    machine.into_snapshot()
}

/// Fans each snapshot out to the latest-value watch and the ordered history.
struct Publisher {
    latest: watch::Sender<PaymentSession>,
    history: mpsc::UnboundedSender<PaymentSession>,
}

impl Publisher {
    fn publish(&self, snapshot: &PaymentSession) {
        self.latest.send_replace(snapshot.clone());
        let _ = self.history.send(snapshot.clone());
    }
}

fn cancel(
    effects: Vec<Effect>,
    listener: &mut Option<JoinHandle<()>>,
    fallback: &mut Option<JoinHandle<()>>,
) {
    for effect in effects {
        match effect {
            Effect::CloseChannel => abort(listener),
            Effect::CancelFallback => abort(fallback),
        }
    }
}

fn abort(task: &mut Option<JoinHandle<()>>) {
    if let Some(task) = task.take() {
        task.abort();
    }
}

async fn listen(
    push: PushChannelRef,
    tracking_key: String,
    inputs: mpsc::UnboundedSender<SessionInput>,
) {
    let mut stream = match push.subscribe(&tracking_key).await {
        Ok(stream) => stream,
        Err(e) => {
            let _ = inputs.send(SessionInput::ChannelError(e.to_string()));
            let _ = inputs.send(SessionInput::ChannelClosed);
            return;
        }
    };
    debug!(%tracking_key, "push channel connected");
    if inputs.send(SessionInput::ChannelOpened).is_err() {
        return;
    }

    while let Some(event) = stream.next().await {
        let input = match event {
            ChannelEvent::Message(raw) => SessionInput::ChannelMessage(raw),
            ChannelEvent::Error(error) => SessionInput::ChannelError(error),
        };
        if inputs.send(input).is_err() {
            return;
        }
    }

    debug!(%tracking_key, "push channel closed by peer");
    let _ = inputs.send(SessionInput::ChannelClosed);
}

async fn poll_once(
    api: PaymentApiRef,
    tracking_key: String,
    delay: Duration,
    inputs: mpsc::UnboundedSender<SessionInput>,
) {
    tokio::time::sleep(delay).await;
    if inputs.send(SessionInput::FallbackFired).is_err() {
        return;
    }

    let input = match api.query_status(&tracking_key).await {
        Ok(response) => SessionInput::FallbackResponse(response),
        Err(e) => SessionInput::FallbackFailed(e.to_string()),
    };
    let _ = inputs.send(input);
}

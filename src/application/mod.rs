//! Application layer containing the session controller.
//!
//! `session` holds the pure state machine; `tracker` runs it on `tokio`,
//! owning the push listener and the fallback query as two cancellable tasks
//! and publishing snapshots through a `watch` channel.

pub mod session;
pub mod tracker;

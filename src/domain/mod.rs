//! Domain layer: payment types, the result-code resolver, wire message parsing,
//! and the ports the tracker talks to.

pub mod message;
pub mod outcome;
pub mod payment;
pub mod ports;
pub mod session;

//! Delivery side of the notification pipeline.
//!
//! Consumes `bot:notify` events from the bus and hands them to the messenger
//! gateway. Delivery is best-effort: one failed send never affects the next.

pub mod gateway;
pub mod handler;
pub mod session;

//! Unread-message notification job.
//!
//! On every tick of a recurring trigger the job asks the backend which users
//! have unread chat messages and publishes one `bot:notify` event per user.

pub mod cadence;
pub mod dispatcher;
pub mod message;
pub mod service;
pub mod source;
pub mod trigger;

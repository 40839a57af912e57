//! Civic alert broadcaster: pushes alerts and daily digests to Telegram and
//! WhatsApp recipients and keeps a rolling log of every attempt.

pub mod broadcast;
pub mod broadcast_log;
pub mod channels;
pub mod config;
pub mod db;
pub mod digest;
pub mod error;
pub mod formatter;
pub mod http;
pub mod model;

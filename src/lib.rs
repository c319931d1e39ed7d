//! Inbox Pilot — webhook auto-responder for Meta DMs and comments.

pub mod classify;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod gateway;
pub mod routing;
pub mod server;
pub mod state;

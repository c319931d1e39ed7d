//! Outbound collaborators — Graph API delivery and escalation email.

pub mod graph;
pub mod notify;

pub use graph::{GraphClient, MessageGateway};
pub use notify::{Escalation, Notifier, SmtpNotifier};

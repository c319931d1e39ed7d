//! Routing — the menu, the DM flow decision, and the dispatcher.

pub mod dispatcher;
pub mod flow;
pub mod menu;

pub use dispatcher::{Dispatcher, RoutingDeps};
pub use flow::{FlowDecision, next_step};
pub use menu::{MenuCatalog, MenuOption};

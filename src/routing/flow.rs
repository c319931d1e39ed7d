//! The DM flow decision, as a pure function.
//!
//! Order is fixed: high-intent categories bypass everything, then a due
//! menu goes out, then the message is read as a menu pick. Nothing here
//! touches state; the dispatcher applies the decision.

use crate::classify::Category;
use crate::routing::menu::{MenuCatalog, MenuOption};
use crate::state::menu::MenuPhase;

/// What to do with a general-channel (DM) message.
#[derive(Debug, PartialEq)]
pub enum FlowDecision<'a> {
    /// Category auto-reply plus team escalation; menu state untouched.
    Escalate { category: Category },
    /// Send the menu and record that it went out.
    ShowMenu,
    /// Reply with the picked option's FAQ text.
    Faq(&'a MenuOption),
    /// Ask for a 1-5 pick.
    Nudge,
}

impl FlowDecision<'_> {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            FlowDecision::Escalate { .. } => "escalate",
            FlowDecision::ShowMenu => "show_menu",
            FlowDecision::Faq(_) => "faq",
            FlowDecision::Nudge => "nudge",
        }
    }
}

pub fn next_step<'a>(
    phase: MenuPhase,
    category: Category,
    text: &str,
    menu: &'a MenuCatalog,
) -> FlowDecision<'a> {
    if category.is_high_intent() {
        return FlowDecision::Escalate { category };
    }
    if phase.is_due() {
        return FlowDecision::ShowMenu;
    }
    match menu.parse_selection(text) {
        Some(option) => FlowDecision::Faq(option),
        None => FlowDecision::Nudge,
    }
}

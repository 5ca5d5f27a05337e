/// Demo Actions
///
/// Actions shipped with the gateway binary. Each module exports a `register`
/// function that adds its action to the map during startup.

pub mod calc;
pub mod echo;
pub mod whoami;

use crate::core::registry::{ActionMap, ActionResponse, HttpStatus};

/// Map of every built-in action.
pub fn registry() -> ActionMap {
    let mut actions = ActionMap::new();
    echo::register(&mut actions);
    whoami::register(&mut actions);
    calc::register(&mut actions);
    actions
}

/// 400 response for arguments that do not match the action's input type.
fn invalid_input(err: impl std::fmt::Display) -> (ActionResponse, HttpStatus) {
    (ActionResponse::error("InvalidInput", err.to_string()), 400)
}

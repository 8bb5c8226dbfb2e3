mod action;
mod sandbox;

pub use action::CodeAction;
pub use sandbox::{Sandbox, SandboxInput};

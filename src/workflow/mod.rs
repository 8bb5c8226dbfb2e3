pub mod actions;
pub mod edge;
mod executor;
pub mod node;
pub mod template;
mod workflow;

pub use executor::{NodeExecutor, NodeOutcome};
pub use node::Node;
pub use workflow::Workflow;

mod context;
mod process;

pub use context::{Context, ExecutionContext, LogEntry, LogLevel, NodeRun, items_of};
pub use process::{Process, ProcessState};

mod call;
mod credential;
mod event;
mod execution;
mod registration;
mod token;
mod usage;
mod workflow;

pub use call::Call;
pub use credential::Credential;
pub use event::Event;
pub use execution::Execution;
pub use registration::Registration;
pub use token::ApiToken;
pub use usage::Usage;
pub use workflow::Workflow;

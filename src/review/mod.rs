mod attempts;
mod dispatcher;
mod scheduler;
mod workflow;

pub use dispatcher::Dispatcher;
pub use scheduler::{Firing, Scheduler};
pub use workflow::ReviewWorkflow;

//! The scheduled publishing pipeline.

mod aggregator;
mod dispatcher;
mod formatter;
mod retry;
mod runner;

pub use aggregator::aggregate_post_status;
pub use dispatcher::{DispatchOutcome, Dispatcher, Settlement};
pub use formatter::format_for_platform;
pub use retry::{GiveUpReason, RetryDecision, RetryPolicy};
pub use runner::{AttemptState, DISPATCH_RATE_KEY, PublishRunner, TriggerReport, TriggerResult};

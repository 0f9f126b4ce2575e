//! Background jobs running next to the worker pool.

mod queue_monitor;

pub use queue_monitor::QueueMonitor;

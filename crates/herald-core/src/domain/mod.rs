//! Domain entities - the core business objects of the publishing pipeline.

mod account;
mod destination;
mod log;
mod platform;
mod post;

pub use account::SocialAccount;
pub use destination::{DestinationStatus, DestinationUpdate, PostDestination};
pub use log::{AttemptStatus, PublishLogEntry};
pub use platform::Platform;
pub use post::{PostStatus, ScheduledPost};

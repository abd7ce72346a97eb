//! Live collections: reconcilers driven by a data service.

mod collection;
mod subscription;

pub use collection::{LiveCollection, LiveOptions};
pub use subscription::{Signal, SignalSender, SubscriptionId, SubscriptionManager};

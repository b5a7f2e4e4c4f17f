pub mod reconciler;
pub mod scheduler;
pub mod subscription_service;

pub use reconciler::Reconciler;
pub use scheduler::{Dispatch, Scheduler, SchedulerConfig, SchedulerHandle};
pub use subscription_service::{MarkReadSummary, SubscriptionService, UnreadService};

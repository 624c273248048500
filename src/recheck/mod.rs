pub mod scheduler;

pub use scheduler::{PendingRecheck, RecheckHandler, RecheckScheduler, RecheckSchedulerConfig};

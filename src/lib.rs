pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod infra;
pub mod interceptor;
pub mod logging;
pub mod model;
pub mod offline;
pub mod pipeline;
pub mod plugin;
pub mod recheck;
pub mod webhook;

pub use config::{CallbackConfig, MemoryPropertyStore, PropertyStore, TomlPropertyStore};
pub use error::{CallbackError, Result};
pub use gate::MessageGate;
pub use infra::{AvailabilityOracle, MemoryPresenceDirectory, PresenceDirectory, UserAccount};
pub use interceptor::{InterceptorChain, InterceptorId, InterceptorRegistry, PacketInterceptor};
pub use model::*;
pub use offline::{MemoryOfflineStore, OfflineMessage, OfflinePersister, OfflineStore, SledOfflineStore};
pub use pipeline::{Decision, DeferredCheck, NotificationPipeline};
pub use plugin::{HostServices, OfflineCallbackPlugin};
pub use recheck::{PendingRecheck, RecheckHandler, RecheckScheduler, RecheckSchedulerConfig};
pub use webhook::{
    DispatchOutcome, DispatchPath, HttpWebhookTransport, MockWebhookTransport, NotificationDispatcher,
    NotificationPayload, WebhookTransport,
};

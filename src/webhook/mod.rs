pub mod dispatcher;
pub mod transport;
pub mod types;

pub use dispatcher::NotificationDispatcher;
pub use transport::{HttpWebhookTransport, MockWebhookTransport, WebhookTransport};
pub use types::{DispatchOutcome, DispatchPath, NotificationPayload};

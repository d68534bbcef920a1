pub mod badge;
pub mod channel;
pub mod dispatcher;
pub mod surface;
pub mod webhook;

pub use badge::badge_for;
pub use channel::{Alert, BannerChannel, PrimaryWithFallback, SystemChannel};
pub use dispatcher::{DeliveryOutcome, NotificationDedup, NotificationDispatcher};
pub use surface::{SurfaceMessage, SurfaceMessenger};
pub use webhook::WebhookNotifier;

pub mod gateway;
pub mod notifier;
pub mod paygate;

pub use gateway::{GatewayReceipt, PaymentGateway};
pub use notifier::{LogNotifier, NotificationDispatcher, NotificationEvent};
pub use paygate::PaygateClient;

pub mod account_service;
pub mod payment_service;
pub mod pin_service;
pub mod retry_queue;
pub mod round_up_service;
pub mod wallet_service;

pub use account_service::AccountService;
pub use payment_service::PaymentService;
pub use pin_service::PinService;
pub use retry_queue::RetryQueue;
pub use round_up_service::RoundUpService;
pub use wallet_service::WalletService;

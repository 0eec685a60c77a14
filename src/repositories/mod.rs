pub mod pin_repository;
pub mod round_up_repository;
pub mod transaction_repository;
pub mod user_repository;
pub mod wallet_repository;

pub use pin_repository::PinRepository;
pub use round_up_repository::RoundUpRepository;
pub use transaction_repository::TransactionRepository;
pub use user_repository::UserRepository;
pub use wallet_repository::WalletRepository;

pub mod dtos;
pub mod enum_types;
pub mod pin;
pub mod round_up;
pub mod transaction;
pub mod user;
pub mod wallet;

pub use dtos::*;
pub use enum_types::*;
pub use pin::*;
pub use round_up::*;
pub use transaction::*;
pub use user::*;
pub use wallet::*;

pub mod amount;
pub mod api;
pub mod collab;
pub mod discount;
pub mod engine;
pub mod ledger;
pub mod model;

pub use amount::Amount;
pub use engine::Engine;
pub use model::{Booking, BookingStatus, MoneyRequest, TransactionRecord, UserId};

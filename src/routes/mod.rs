pub mod auth;
pub mod contract;
pub mod payout;
pub mod utils;
pub mod wallet;

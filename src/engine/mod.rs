pub mod board;
pub mod escrow;
pub mod gateway;
pub mod notify;
pub mod payout;
pub mod terms;
pub mod wallet;

pub mod auth;
pub mod mem;
pub mod models;
pub mod pg;
pub mod store;

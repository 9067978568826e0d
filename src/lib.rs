pub mod db;
pub mod engine;
pub mod error;
pub mod routes;

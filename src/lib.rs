pub mod accounts;
pub mod api;
pub mod bootstrap;
pub mod config;
pub mod contracts;
pub mod error;
pub mod ledger;
pub mod middleware;
pub mod server;
pub mod settlement;

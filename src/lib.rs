pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod identity;
pub mod import;
pub mod models;
pub mod normalize;
pub mod notify;
pub mod pipeline;
pub mod remote;
pub mod routes;
pub mod seed;
pub mod state;
pub mod stats;
pub mod storage;
pub mod store;
pub mod sync;
pub mod utils;

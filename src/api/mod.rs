pub mod client;
pub mod provider;

pub use client::ApiFootballClient;
pub use provider::{response_items, FootballApi, Params};

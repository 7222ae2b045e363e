pub mod auth;
pub mod client;
pub mod config;
pub mod models;

pub use client::{FeedClient, FeedError};
pub use models::CandidateProduct;

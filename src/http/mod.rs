pub mod client;

pub use client::JsonHttpClient;

pub mod circuit;
pub mod client;
pub mod quota;
pub mod responses;

pub use circuit::CircuitBreaker;
pub use client::{ChannelReference, YoutubeApiClient};
pub use quota::{QuotaCost, QuotaTracker};
pub use responses::*;

pub mod client;
pub mod error;
pub mod gate;

pub use client::AnalysisClient;
pub use error::AnalysisError;

pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod modules;
pub mod normalizer;
pub mod reputation;
pub mod server;
pub mod verdict;

pub use config::Config;
pub use engine::{AnalysisEngine, AnalysisReport};
pub use error::AnalysisError;
pub use history::{FileSenderHistory, InMemorySenderHistory, SenderHistory, SenderRecord};
pub use normalizer::{parse_message, StructuredEmail};
pub use verdict::{Classification, Verdict};

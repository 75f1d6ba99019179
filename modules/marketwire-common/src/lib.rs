pub mod config;
pub mod types;

pub use config::Config;
pub use types::{
    Category, FeedError, FetchedItem, RunStats, SourceCategory, SourceConfig, SourceKind,
};

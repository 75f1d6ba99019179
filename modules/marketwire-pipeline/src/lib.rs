pub mod fetcher;
pub mod pipeline;
pub mod publisher;
pub mod scorer;
pub mod sources;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

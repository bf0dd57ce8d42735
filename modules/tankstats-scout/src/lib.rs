pub mod cascade;
pub mod mapper;
pub mod normalize;
pub mod participants;
pub mod patterns;
pub mod runner;
pub mod sources;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod validity;

//! Task strategies: what one poll does.
//!
//! ## Contents
//! - [`TaskStrategy`] the trait every poller kind implements
//! - [`StrategyFn`] closure-backed strategy
//! - [`FakeApi`] simulated remote call (kind `fake`)
//! - [`HttpPoll`] HTTP GET poller (kind `http`)
//! - [`Strategies`] kind → factory registry used at spawn

mod fake;
mod http;
mod registry;
mod strategy;
mod strategy_fn;

pub use fake::FakeApi;
pub use http::HttpPoll;
pub use registry::{Strategies, StrategyFactory};
pub use strategy::{StrategyRef, TaskStrategy};
pub use strategy_fn::StrategyFn;

//! Analysis operations over a [`Dataset`](crate::domain::Dataset).
//!
//! - cleaning: dedup, date coercion, imputation (`clean`)
//! - column role inference (`classify`)
//! - time-series decomposition (`trend`)
//! - group-by comparison and outliers (`segment`)
//!
//! Every operation borrows its input and returns new values.

pub mod classify;
pub mod clean;
pub mod segment;
pub mod trend;

pub use classify::*;
pub use clean::*;
pub use segment::*;
pub use trend::*;

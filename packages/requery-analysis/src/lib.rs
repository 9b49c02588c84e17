pub mod executor;
pub mod measurement;
pub mod qpp;
pub mod stats;

mod error;

pub use error::{Error, Result};
pub use executor::MeasurementExecutor;
pub use measurement::Measurement;
pub use stats::{ConfiguredSource, ResultList, SearchOptions, SearchResult, StatisticsSource};

use std::{future::Future, pin::Pin};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

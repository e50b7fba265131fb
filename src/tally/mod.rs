pub mod aggregator;
pub mod calculation;

pub use aggregator::aggregate;
pub use calculation::*;

pub mod debounce;
pub mod epoch;
pub mod metrics;

pub use debounce::*;
pub use epoch::*;
pub use metrics::*;

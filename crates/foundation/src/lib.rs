pub mod bounds;
pub mod category;
pub mod params;
pub mod time;

// Foundation crate: query-intent value types only, no I/O.
pub use bounds::*;
pub use category::*;
pub use params::*;
pub use time::*;

pub mod accumulator;
pub mod batch;
pub mod config;
pub mod coordinator;
pub mod decoder;
pub mod error;
pub mod protocol;
pub mod request;
pub mod session;
pub mod status;
pub mod transport;

pub use accumulator::*;
pub use batch::*;
pub use config::*;
pub use coordinator::*;
pub use decoder::*;
pub use error::*;
pub use protocol::*;
pub use request::*;
pub use session::*;
pub use status::*;
pub use transport::*;

pub mod audio;
pub mod cli;
pub mod config;
pub mod console;
pub mod driver;
pub mod error;
pub mod kernel;
pub mod protocol;
pub mod services;
pub mod session;
pub mod transport;
pub mod vision;

pub use error::{RelayError, Result};
pub use kernel::reactor::Reactor;

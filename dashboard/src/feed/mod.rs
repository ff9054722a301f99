pub mod poller;
pub mod synthetic;

pub use synthetic::SyntheticSource;

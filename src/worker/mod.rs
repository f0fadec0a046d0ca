pub mod executor;
pub mod manager;
pub mod worker;

pub use executor::{execute_command, CommandOutcome};
pub use manager::WorkerManager;
pub use worker::Worker;

mod config;
mod error;
mod grpc;
mod lifecycle;
mod queue;
mod store;
mod terminal;

pub use config::{Config, DEFAULT_TERMINALS};
pub use error::{ConfigError, FlightError};
pub use grpc::{FlightsService, Subscription};
pub use lifecycle::FlightLifecycle;
pub use queue::ArrivalQueue;
pub use store::InMemoryFlightStore;
pub use terminal::{run_terminal, AllocationService, Intervals, Terminal, TerminalReport};

pub mod aggregation;
pub mod broadcast;
pub mod config;
pub mod observability;
pub mod parameters;
pub mod scheduler;
pub mod server;
pub mod snapshot;
pub mod store;

pub use aggregation::{AggregationEngine, ConsumptionWindow, Site};
pub use broadcast::{Broadcaster, ChannelHub};
pub use scheduler::Scheduler;

pub mod channels;
pub mod types;

pub use channels::{
    heartbeat_key, keys, metrics_channel, results_channel, tasks_channel, ttl, validate_agent_id,
};
pub use types::*;

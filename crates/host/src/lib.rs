mod config;
mod events;
mod host;

pub use config::HostConfig;
pub use events::{DisconnectReason, HostEvent};
pub use host::{Host, LOCAL_PLAYER_ID};

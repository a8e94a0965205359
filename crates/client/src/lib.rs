mod client;
mod config;
mod events;
mod history;
mod interpolation;

pub use client::Client;
pub use config::ClientConfig;
pub use events::ClientEvent;
pub use history::InputHistory;
pub use interpolation::InterpolationState;

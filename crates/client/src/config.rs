use pulse::net::{CONNECTION_TIMEOUT, HEARTBEAT_INTERVAL, INTERPOLATION_DELAY};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connection_timeout: f32,
    pub heartbeat_interval: f32,
    /// How far behind the newest server tick remote players are rendered.
    pub interpolation_delay: f32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection_timeout: CONNECTION_TIMEOUT,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            interpolation_delay: INTERPOLATION_DELAY,
        }
    }
}

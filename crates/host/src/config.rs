use pulse::net::{
    CONNECTION_TIMEOUT, HEARTBEAT_INTERVAL, MAX_PLAYERS, SNAPSHOT_RATE, TICK_RATE,
};

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub tick_rate: u32,
    pub snapshot_rate: u32,
    pub max_players: usize,
    pub connection_timeout: f32,
    pub heartbeat_interval: f32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            snapshot_rate: SNAPSHOT_RATE,
            max_players: MAX_PLAYERS,
            connection_timeout: CONNECTION_TIMEOUT,
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }
}

impl HostConfig {
    pub fn tick_interval(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    pub fn snapshot_interval(&self) -> f32 {
        1.0 / self.snapshot_rate as f32
    }
}

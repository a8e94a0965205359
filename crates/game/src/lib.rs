pub mod net;
pub mod simulation;

pub use net::{
    Connection, ConnectionError, ConnectionManager, ConnectionState, EntityState, NetworkEndpoint,
    NetworkStats, PacketBuffer, PacketHeader, PacketType, PlayerInput, PlayerState, DEFAULT_PORT,
    MAX_PACKET_SIZE, MAX_PLAYERS, TICK_RATE,
};
pub use simulation::{apply_input, MOVE_SPEED};

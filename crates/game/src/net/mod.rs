mod codec;
mod connection;
mod endpoint;
mod protocol;
mod stats;
mod tracking;

pub use codec::PacketBuffer;
pub use connection::{Connection, ConnectionError, ConnectionManager, ConnectionState};
pub use endpoint::NetworkEndpoint;
pub use protocol::{
    EntityState, PacketHeader, PacketType, PlayerInput, PlayerState, CONNECTION_TIMEOUT,
    DEFAULT_PORT, ENTITY_STATE_WIRE_SIZE, ENTITY_TYPE_CUBE, ENTITY_TYPE_PLAYER, HEADER_SIZE,
    HEARTBEAT_INTERVAL, INPUT_BUFFER_SIZE, INPUT_REDUNDANCY, INTERPOLATION_DELAY, MAX_PACKET_SIZE,
    MAX_PLAYERS, PENDING_INPUT_CAPACITY, PLAYER_INPUT_WIRE_SIZE, PLAYER_STATE_WIRE_SIZE,
    PROTOCOL_MAGIC, SNAPSHOT_INTERVAL, SNAPSHOT_RATE, STATE_BUFFER_SIZE, TICK_INTERVAL, TICK_RATE,
};
pub use stats::NetworkStats;
pub use tracking::{AckTracker, PendingPacket, ReceiveTracker};

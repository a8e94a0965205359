use glam::Vec3;

pub const DEFAULT_PORT: u16 = 7777;
pub const MAX_PACKET_SIZE: usize = 1400; // safe MTU
pub const MAX_PLAYERS: usize = 16;

pub const TICK_RATE: u32 = 60;
pub const TICK_INTERVAL: f32 = 1.0 / TICK_RATE as f32;
pub const SNAPSHOT_RATE: u32 = 20;
pub const SNAPSHOT_INTERVAL: f32 = 1.0 / SNAPSHOT_RATE as f32;

pub const CONNECTION_TIMEOUT: f32 = 10.0;
pub const HEARTBEAT_INTERVAL: f32 = 1.0;
pub const INTERPOLATION_DELAY: f32 = 0.1;

pub const INPUT_BUFFER_SIZE: usize = 64;
pub const STATE_BUFFER_SIZE: usize = 128;
pub const PENDING_INPUT_CAPACITY: usize = 256;
pub const INPUT_REDUNDANCY: usize = 5;

pub const PROTOCOL_MAGIC: [u8; 4] = *b"PULS";

/// Header bytes on the wire: 4 magic + 1 type + 4x u32 + 1x u16.
pub const HEADER_SIZE: usize = 23;

pub const PLAYER_INPUT_WIRE_SIZE: usize = 21;
pub const PLAYER_STATE_WIRE_SIZE: usize = 32;
pub const ENTITY_STATE_WIRE_SIZE: usize = 37;

pub const ENTITY_TYPE_PLAYER: u8 = 0;
pub const ENTITY_TYPE_CUBE: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    ConnectRequest = 0x01,
    ConnectAccept = 0x02,
    ConnectReject = 0x03,
    Disconnect = 0x04,
    Heartbeat = 0x05,
    Input = 0x10,
    StateUpdate = 0x11,
    WorldSnapshot = 0x12,
    EntityCreate = 0x20,
    EntityDestroy = 0x21,
    EventBroadcast = 0x22,
    Ack = 0x30,
    ReliableData = 0x31,
}

impl PacketType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(PacketType::ConnectRequest),
            0x02 => Some(PacketType::ConnectAccept),
            0x03 => Some(PacketType::ConnectReject),
            0x04 => Some(PacketType::Disconnect),
            0x05 => Some(PacketType::Heartbeat),
            0x10 => Some(PacketType::Input),
            0x11 => Some(PacketType::StateUpdate),
            0x12 => Some(PacketType::WorldSnapshot),
            0x20 => Some(PacketType::EntityCreate),
            0x21 => Some(PacketType::EntityDestroy),
            0x22 => Some(PacketType::EventBroadcast),
            0x30 => Some(PacketType::Ack),
            0x31 => Some(PacketType::ReliableData),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub magic: [u8; 4],
    pub packet_type: u8,
    pub sequence: u32,
    pub ack: u32,
    pub ack_bits: u32,
    pub tick: u32,
    pub payload_size: u16,
}

impl PacketHeader {
    pub fn new(packet_type: PacketType) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            packet_type: packet_type as u8,
            sequence: 0,
            ack: 0,
            ack_bits: 0,
            tick: 0,
            payload_size: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC
    }

    pub fn packet_type(&self) -> Option<PacketType> {
        PacketType::from_u8(self.packet_type)
    }
}

impl Default for PacketHeader {
    fn default() -> Self {
        Self::new(PacketType::Heartbeat)
    }
}

/// One frame of sampled input. `keys` is the movement bitfield below.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerInput {
    pub sequence: u32,
    pub tick: u32,
    pub keys: u8,
    pub yaw: f32,
    pub pitch: f32,
    pub delta_time: f32,
}

impl PlayerInput {
    pub const KEY_FORWARD: u8 = 0x01;
    pub const KEY_BACK: u8 = 0x02;
    pub const KEY_LEFT: u8 = 0x04;
    pub const KEY_RIGHT: u8 = 0x08;
    pub const KEY_UP: u8 = 0x10;
    pub const KEY_DOWN: u8 = 0x20;

    #[inline]
    pub fn has_key(&self, key: u8) -> bool {
        self.keys & key != 0
    }

    #[inline]
    pub fn set_key(&mut self, key: u8, pressed: bool) {
        if pressed {
            self.keys |= key;
        } else {
            self.keys &= !key;
        }
    }
}

/// Authoritative snapshot of one player at a given host tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub player_id: u32,
    pub tick: u32,
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub last_processed_input: u32,
}

impl PlayerState {
    /// Freshly connected players materialize at the spawn point facing -Z.
    pub fn spawn(player_id: u32) -> Self {
        Self {
            player_id,
            tick: 0,
            position: Vec3::new(0.0, 1.7, 5.0),
            yaw: -90.0,
            pitch: 0.0,
            last_processed_input: 0,
        }
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            player_id: 0,
            tick: 0,
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            last_processed_input: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityState {
    pub entity_id: u32,
    pub entity_type: u8,
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

impl EntityState {
    pub fn new(entity_id: u32, entity_type: u8, position: Vec3) -> Self {
        Self {
            entity_id,
            entity_type,
            position,
            velocity: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
        }
    }
}

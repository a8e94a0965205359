use glam::Vec3;

#[derive(Debug, Clone, Copy)]
pub enum ClientEvent {
    Connected {
        player_id: u32,
    },
    Disconnected,
    EntityCreated {
        entity_id: u32,
        entity_type: u8,
        position: Vec3,
    },
    EntityDestroyed {
        entity_id: u32,
    },
}

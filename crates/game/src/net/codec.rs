use glam::Vec3;

use super::protocol::{
    EntityState, PacketHeader, PlayerInput, PlayerState, HEADER_SIZE, MAX_PACKET_SIZE,
};

/// Fixed-capacity serialization buffer with independent read/write cursors.
///
/// All scalars are little-endian. Writes past capacity are dropped, reads
/// past the write cursor yield zero; neither is an error, so a truncated
/// datagram decodes to zeroed fields instead of failing mid-packet.
pub struct PacketBuffer {
    pub data: [u8; MAX_PACKET_SIZE],
    pub write_pos: usize,
    pub read_pos: usize,
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketBuffer {
    pub fn new() -> Self {
        Self {
            data: [0u8; MAX_PACKET_SIZE],
            write_pos: 0,
            read_pos: 0,
        }
    }

    pub fn reset(&mut self) {
        self.write_pos = 0;
        self.read_pos = 0;
    }

    pub fn len(&self) -> usize {
        self.write_pos
    }

    pub fn is_empty(&self) -> bool {
        self.write_pos == 0
    }

    /// Bytes written but not yet read.
    pub fn remaining(&self) -> usize {
        self.write_pos.saturating_sub(self.read_pos)
    }

    pub fn write_bytes(&mut self, src: &[u8]) {
        if self.write_pos + src.len() <= MAX_PACKET_SIZE {
            self.data[self.write_pos..self.write_pos + src.len()].copy_from_slice(src);
            self.write_pos += src.len();
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_vec3(&mut self, value: Vec3) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
    }

    pub fn read_bytes(&mut self, dst: &mut [u8]) {
        if self.read_pos + dst.len() <= self.write_pos {
            dst.copy_from_slice(&self.data[self.read_pos..self.read_pos + dst.len()]);
            self.read_pos += dst.len();
        }
    }

    pub fn read_u8(&mut self) -> u8 {
        let mut buf = [0u8; 1];
        self.read_bytes(&mut buf);
        buf[0]
    }

    pub fn read_u16(&mut self) -> u16 {
        let mut buf = [0u8; 2];
        self.read_bytes(&mut buf);
        u16::from_le_bytes(buf)
    }

    pub fn read_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf);
        u32::from_le_bytes(buf)
    }

    pub fn read_f32(&mut self) -> f32 {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf);
        f32::from_le_bytes(buf)
    }

    pub fn read_vec3(&mut self) -> Vec3 {
        let x = self.read_f32();
        let y = self.read_f32();
        let z = self.read_f32();
        Vec3::new(x, y, z)
    }

    pub fn write_header(&mut self, header: &PacketHeader) {
        self.write_bytes(&header.magic);
        self.write_u8(header.packet_type);
        self.write_u32(header.sequence);
        self.write_u32(header.ack);
        self.write_u32(header.ack_bits);
        self.write_u32(header.tick);
        self.write_u16(header.payload_size);
    }

    pub fn read_header(&mut self) -> PacketHeader {
        let mut header = PacketHeader::default();
        self.read_bytes(&mut header.magic);
        header.packet_type = self.read_u8();
        header.sequence = self.read_u32();
        header.ack = self.read_u32();
        header.ack_bits = self.read_u32();
        header.tick = self.read_u32();
        header.payload_size = self.read_u16();
        header
    }

    /// Reserve header space before writing a variable-size payload.
    /// Returns the header position for the matching [`end_packet`] call.
    ///
    /// [`end_packet`]: PacketBuffer::end_packet
    pub fn begin_packet(&mut self) -> usize {
        let header_pos = self.write_pos;
        self.write_pos += HEADER_SIZE;
        header_pos
    }

    /// Patch the reserved header in with the now-known payload size.
    pub fn end_packet(&mut self, header_pos: usize, header: &mut PacketHeader) {
        header.payload_size = (self.write_pos - header_pos - HEADER_SIZE) as u16;
        let saved = self.write_pos;
        self.write_pos = header_pos;
        self.write_header(header);
        self.write_pos = saved;
    }

    pub fn write_player_input(&mut self, input: &PlayerInput) {
        self.write_u32(input.sequence);
        self.write_u32(input.tick);
        self.write_u8(input.keys);
        self.write_f32(input.yaw);
        self.write_f32(input.pitch);
        self.write_f32(input.delta_time);
    }

    pub fn read_player_input(&mut self) -> PlayerInput {
        PlayerInput {
            sequence: self.read_u32(),
            tick: self.read_u32(),
            keys: self.read_u8(),
            yaw: self.read_f32(),
            pitch: self.read_f32(),
            delta_time: self.read_f32(),
        }
    }

    pub fn write_player_state(&mut self, state: &PlayerState) {
        self.write_u32(state.player_id);
        self.write_u32(state.tick);
        self.write_vec3(state.position);
        self.write_f32(state.yaw);
        self.write_f32(state.pitch);
        self.write_u32(state.last_processed_input);
    }

    pub fn read_player_state(&mut self) -> PlayerState {
        PlayerState {
            player_id: self.read_u32(),
            tick: self.read_u32(),
            position: self.read_vec3(),
            yaw: self.read_f32(),
            pitch: self.read_f32(),
            last_processed_input: self.read_u32(),
        }
    }

    pub fn write_entity_state(&mut self, entity: &EntityState) {
        self.write_u32(entity.entity_id);
        self.write_u8(entity.entity_type);
        self.write_vec3(entity.position);
        self.write_vec3(entity.velocity);
        self.write_f32(entity.yaw);
        self.write_f32(entity.pitch);
    }

    pub fn read_entity_state(&mut self) -> EntityState {
        EntityState {
            entity_id: self.read_u32(),
            entity_type: self.read_u8(),
            position: self.read_vec3(),
            velocity: self.read_vec3(),
            yaw: self.read_f32(),
            pitch: self.read_f32(),
        }
    }
}

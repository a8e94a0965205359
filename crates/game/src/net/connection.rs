use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;

use thiserror::Error;

use super::protocol::{PacketHeader, PacketType, PlayerInput, PENDING_INPUT_CAPACITY};
use super::tracking::{AckTracker, ReceiveTracker};

const ACK_PENDING_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("server full")]
    ServerFull,
}

/// Per-peer reliability state plus the host-side input queue.
///
/// The client reuses this for its single server peer; the input queue and
/// processed-input watermark only matter on the host side.
#[derive(Debug)]
pub struct Connection {
    pub player_id: u32,
    pub addr: SocketAddr,
    pub state: ConnectionState,
    pub local_sequence: u32,
    pub receive_tracker: ReceiveTracker,
    pub ack_tracker: AckTracker,
    pub last_receive_time: f32,
    pub last_send_time: f32,
    pub last_processed_input: u32,
    pending_inputs: VecDeque<PlayerInput>,
}

impl Connection {
    pub fn new(player_id: u32, addr: SocketAddr, now: f32) -> Self {
        Self {
            player_id,
            addr,
            state: ConnectionState::Connected,
            local_sequence: 0,
            receive_tracker: ReceiveTracker::new(),
            ack_tracker: AckTracker::new(ACK_PENDING_CAPACITY),
            last_receive_time: now,
            last_send_time: now,
            last_processed_input: 0,
            pending_inputs: VecDeque::with_capacity(PENDING_INPUT_CAPACITY),
        }
    }

    pub fn touch(&mut self, now: f32) {
        self.last_receive_time = now;
    }

    pub fn is_timed_out(&self, now: f32, timeout: f32) -> bool {
        now - self.last_receive_time > timeout
    }

    /// Record the peer's sequence and fold its ack fields into the RTT
    /// estimate. Called for every packet that carries reliability data.
    pub fn process_acks(&mut self, header: &PacketHeader, now: f32) {
        self.receive_tracker.record(header.sequence);
        self.ack_tracker.process_ack(header.ack, header.ack_bits, now);
    }

    /// Build an outbound header: fresh sequence, current ack window, and the
    /// sequence registered for RTT measurement.
    pub fn build_header(&mut self, packet_type: PacketType, tick: u32, now: f32) -> PacketHeader {
        self.local_sequence += 1;
        let (ack, ack_bits) = self.receive_tracker.ack_data();

        let mut header = PacketHeader::new(packet_type);
        header.sequence = self.local_sequence;
        header.ack = ack;
        header.ack_bits = ack_bits;
        header.tick = tick;

        self.ack_tracker.track_packet(header.sequence, now);
        header
    }

    /// Queue an input for the next tick. Duplicates at or below the
    /// processed watermark are dropped; on overflow the oldest entry goes.
    pub fn push_input(&mut self, input: PlayerInput) {
        if input.sequence <= self.last_processed_input {
            return;
        }
        if self.pending_inputs.len() >= PENDING_INPUT_CAPACITY {
            self.pending_inputs.pop_front();
        }
        self.pending_inputs.push_back(input);
    }

    pub fn pop_input(&mut self) -> Option<PlayerInput> {
        self.pending_inputs.pop_front()
    }

    pub fn pending_input_count(&self) -> usize {
        self.pending_inputs.len()
    }

    pub fn rtt(&self) -> f32 {
        self.ack_tracker.srtt()
    }
}

/// Host-side connection table, indexed by player id and by socket address.
#[derive(Debug)]
pub struct ConnectionManager {
    connections: HashMap<u32, Connection>,
    by_addr: HashMap<SocketAddr, u32>,
    next_player_id: u32,
    max_players: usize,
}

impl ConnectionManager {
    pub fn new(max_players: usize) -> Self {
        Self {
            connections: HashMap::new(),
            by_addr: HashMap::new(),
            next_player_id: 1,
            max_players,
        }
    }

    /// Allocate a player id and connection for a new address, or hand back
    /// the existing connection if the address is already known.
    pub fn create(&mut self, addr: SocketAddr, now: f32) -> Result<&mut Connection, ConnectionError> {
        if let Some(&player_id) = self.by_addr.get(&addr) {
            return Ok(self.connections.get_mut(&player_id).unwrap());
        }

        if self.connections.len() >= self.max_players {
            return Err(ConnectionError::ServerFull);
        }

        let player_id = self.next_player_id;
        self.next_player_id += 1;

        self.connections
            .insert(player_id, Connection::new(player_id, addr, now));
        self.by_addr.insert(addr, player_id);

        Ok(self.connections.get_mut(&player_id).unwrap())
    }

    pub fn get(&self, player_id: u32) -> Option<&Connection> {
        self.connections.get(&player_id)
    }

    pub fn get_mut(&mut self, player_id: u32) -> Option<&mut Connection> {
        self.connections.get_mut(&player_id)
    }

    pub fn get_by_addr(&self, addr: &SocketAddr) -> Option<&Connection> {
        self.by_addr
            .get(addr)
            .and_then(|id| self.connections.get(id))
    }

    pub fn get_by_addr_mut(&mut self, addr: &SocketAddr) -> Option<&mut Connection> {
        if let Some(&player_id) = self.by_addr.get(addr) {
            self.connections.get_mut(&player_id)
        } else {
            None
        }
    }

    pub fn remove(&mut self, player_id: u32) -> Option<Connection> {
        if let Some(conn) = self.connections.remove(&player_id) {
            self.by_addr.remove(&conn.addr);
            Some(conn)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Connection> {
        self.connections.values_mut()
    }

    /// Phase one of timeout removal: collect ids without mutating, so the
    /// caller can broadcast departures before erasing anything.
    pub fn timed_out(&self, now: f32, timeout: f32) -> Vec<u32> {
        self.connections
            .iter()
            .filter(|(_, conn)| conn.is_timed_out(now, timeout))
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn clear(&mut self) {
        self.connections.clear();
        self.by_addr.clear();
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::PlayerInput;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    #[test]
    fn test_create_allocates_increasing_ids() {
        let mut manager = ConnectionManager::new(16);
        let a = manager.create(addr(1000), 0.0).unwrap().player_id;
        let b = manager.create(addr(1001), 0.0).unwrap().player_id;
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(manager.count(), 2);
    }

    #[test]
    fn test_create_is_idempotent_per_addr() {
        let mut manager = ConnectionManager::new(16);
        let first = manager.create(addr(1000), 0.0).unwrap().player_id;
        let again = manager.create(addr(1000), 1.0).unwrap().player_id;
        assert_eq!(first, again);
        assert_eq!(manager.count(), 1);
    }

    #[test]
    fn test_server_full() {
        let mut manager = ConnectionManager::new(1);
        manager.create(addr(1000), 0.0).unwrap();
        assert!(matches!(
            manager.create(addr(1001), 0.0),
            Err(ConnectionError::ServerFull)
        ));
    }

    #[test]
    fn test_remove_clears_both_indices() {
        let mut manager = ConnectionManager::new(16);
        let id = manager.create(addr(1000), 0.0).unwrap().player_id;
        assert!(manager.remove(id).is_some());
        assert!(manager.get(id).is_none());
        assert!(manager.get_by_addr(&addr(1000)).is_none());

        // the slot frees up again
        assert!(manager.create(addr(1002), 0.0).is_ok());
    }

    #[test]
    fn test_timed_out_collects_without_removing() {
        let mut manager = ConnectionManager::new(16);
        let id = manager.create(addr(1000), 0.0).unwrap().player_id;
        manager.create(addr(1001), 0.0).unwrap().touch(11.0);

        let stale = manager.timed_out(11.5, 10.0);
        assert_eq!(stale, vec![id]);
        assert_eq!(manager.count(), 2);
    }

    #[test]
    fn test_push_input_filters_processed() {
        let mut conn = Connection::new(1, addr(1000), 0.0);
        conn.last_processed_input = 5;

        conn.push_input(PlayerInput {
            sequence: 5,
            ..Default::default()
        });
        conn.push_input(PlayerInput {
            sequence: 6,
            ..Default::default()
        });

        assert_eq!(conn.pending_input_count(), 1);
        assert_eq!(conn.pop_input().unwrap().sequence, 6);
    }

    #[test]
    fn test_push_input_bounded() {
        let mut conn = Connection::new(1, addr(1000), 0.0);
        for seq in 1..=(PENDING_INPUT_CAPACITY as u32 + 10) {
            conn.push_input(PlayerInput {
                sequence: seq,
                ..Default::default()
            });
        }

        assert_eq!(conn.pending_input_count(), PENDING_INPUT_CAPACITY);
        // oldest entries were dropped
        assert_eq!(conn.pop_input().unwrap().sequence, 11);
    }

    #[test]
    fn test_build_header_carries_ack_window() {
        let mut conn = Connection::new(1, addr(1000), 0.0);
        let mut incoming = PacketHeader::new(PacketType::Heartbeat);
        incoming.sequence = 7;
        conn.process_acks(&incoming, 0.0);

        let header = conn.build_header(PacketType::StateUpdate, 42, 0.0);
        assert_eq!(header.sequence, 1);
        assert_eq!(header.ack, 7);
        assert_eq!(header.ack_bits & 1, 1);
        assert_eq!(header.tick, 42);

        let next = conn.build_header(PacketType::StateUpdate, 43, 0.0);
        assert_eq!(next.sequence, 2);
    }
}

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::time::Instant;

use glam::Vec3;
use log::{info, warn};

use pulse::net::{
    ConnectionError, ConnectionManager, ConnectionState, EntityState, NetworkEndpoint,
    PacketBuffer, PacketHeader, PacketType, PlayerInput, PlayerState, ENTITY_TYPE_CUBE,
    ENTITY_TYPE_PLAYER, PLAYER_INPUT_WIRE_SIZE,
};
use pulse::simulation::apply_input;

use crate::config::HostConfig;
use crate::events::{DisconnectReason, HostEvent};

/// The host's own player uses the reserved id 0.
pub const LOCAL_PLAYER_ID: u32 = 0;

/// Authoritative peer. Owns the player map, advances the simulation on a
/// fixed-rate tick, and broadcasts state at the snapshot cadence. All work
/// happens inside `update(dt)` on the caller's thread; events raised during
/// an update are queued for `drain_events`.
pub struct Host {
    endpoint: Option<NetworkEndpoint>,
    config: HostConfig,
    connections: ConnectionManager,
    players: HashMap<u32, PlayerState>,
    current_tick: u32,
    tick_accumulator: f32,
    snapshot_accumulator: f32,
    start_time: Instant,
    running: bool,
    pending_events: VecDeque<HostEvent>,
}

impl Host {
    pub fn new(config: HostConfig) -> Self {
        let max_players = config.max_players;
        Self {
            endpoint: None,
            config,
            connections: ConnectionManager::new(max_players),
            players: HashMap::new(),
            current_tick: 0,
            tick_accumulator: 0.0,
            snapshot_accumulator: 0.0,
            start_time: Instant::now(),
            running: false,
            pending_events: VecDeque::new(),
        }
    }

    pub fn start(&mut self, port: u16) -> io::Result<()> {
        let endpoint = NetworkEndpoint::bind(("0.0.0.0", port))?;
        info!("host listening on {}", endpoint.local_addr());

        self.endpoint = Some(endpoint);
        self.connections = ConnectionManager::new(self.config.max_players);
        self.players.clear();
        self.current_tick = 0;
        self.tick_accumulator = 0.0;
        self.snapshot_accumulator = 0.0;
        self.start_time = Instant::now();
        self.running = true;
        Ok(())
    }

    pub fn stop(&mut self) {
        if !self.running {
            return;
        }

        let now = self.now();
        let tick = self.current_tick;
        if let Some(endpoint) = self.endpoint.as_mut() {
            for conn in self.connections.iter_mut() {
                let header = conn.build_header(PacketType::Disconnect, tick, now);
                let mut buffer = PacketBuffer::new();
                buffer.write_header(&header);
                let _ = endpoint.send_to(&buffer, conn.addr);
            }
        }

        self.endpoint = None;
        self.connections.clear();
        self.players.clear();
        self.running = false;
        info!("host stopped");
    }

    pub fn update(&mut self, dt: f32) {
        if !self.running {
            return;
        }

        let now = self.now();

        self.receive_packets(now);
        self.check_timeouts(now);

        self.tick_accumulator += dt;
        while self.tick_accumulator >= self.config.tick_interval() {
            self.process_tick();
            self.tick_accumulator -= self.config.tick_interval();
        }

        // One snapshot per update even when behind; snapshots carry full
        // state, so skipped intervals heal themselves.
        self.snapshot_accumulator += dt;
        if self.snapshot_accumulator >= self.config.snapshot_interval() {
            self.broadcast_state_updates(now);
            self.snapshot_accumulator -= self.config.snapshot_interval();
        }

        self.send_heartbeats(now);
    }

    /// Apply input from the host's own (player 0) sampling, outside the
    /// network path.
    pub fn process_local_input(&mut self, input: PlayerInput) {
        let tick = self.current_tick;
        if let Some(state) = self.players.get_mut(&LOCAL_PLAYER_ID) {
            apply_input(state, &input);
            state.tick = tick;
        }
    }

    /// The host's own player state, created on first access.
    pub fn local_player(&mut self) -> &mut PlayerState {
        self.players
            .entry(LOCAL_PLAYER_ID)
            .or_insert_with(|| PlayerState::spawn(LOCAL_PLAYER_ID))
    }

    pub fn players(&self) -> &HashMap<u32, PlayerState> {
        &self.players
    }

    pub fn current_tick(&self) -> u32 {
        self.current_tick
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.count()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.endpoint.as_ref().map(|e| e.local_addr())
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = HostEvent> + '_ {
        self.pending_events.drain(..)
    }

    fn now(&self) -> f32 {
        self.start_time.elapsed().as_secs_f32()
    }

    fn receive_packets(&mut self, now: f32) {
        let packets = {
            let Some(endpoint) = self.endpoint.as_mut() else {
                return;
            };
            match endpoint.receive() {
                Ok(packets) => packets,
                Err(e) => {
                    warn!("receive failed: {}", e);
                    return;
                }
            }
        };

        for (header, mut buffer, addr) in packets {
            self.handle_packet(header, &mut buffer, addr, now);
        }
    }

    fn handle_packet(
        &mut self,
        header: PacketHeader,
        buffer: &mut PacketBuffer,
        addr: SocketAddr,
        now: f32,
    ) {
        let Some(packet_type) = header.packet_type() else {
            return;
        };

        match packet_type {
            PacketType::ConnectRequest => self.handle_connect_request(addr, now),
            PacketType::Disconnect => {
                if let Some(conn) = self.connections.get_by_addr(&addr) {
                    let player_id = conn.player_id;
                    self.remove_player(player_id, DisconnectReason::Graceful, now);
                }
            }
            PacketType::Heartbeat | PacketType::Ack => {
                if let Some(conn) = self.connections.get_by_addr_mut(&addr) {
                    conn.touch(now);
                    conn.process_acks(&header, now);
                }
            }
            PacketType::Input => self.handle_input(&header, buffer, addr, now),
            _ => {}
        }
    }

    fn handle_connect_request(&mut self, addr: SocketAddr, now: f32) {
        if let Some(conn) = self.connections.get_by_addr(&addr) {
            // duplicate request, our accept was probably lost
            if conn.state == ConnectionState::Connected {
                let player_id = conn.player_id;
                self.send_connect_accept(player_id, now);
            }
            return;
        }

        let player_id = match self.connections.create(addr, now) {
            Ok(conn) => conn.player_id,
            Err(ConnectionError::ServerFull) => {
                warn!("rejecting {}: server full", addr);
                self.send_connect_reject(addr);
                return;
            }
        };

        self.players.insert(player_id, PlayerState::spawn(player_id));
        info!("player {} connected from {}", player_id, addr);

        self.send_connect_accept(player_id, now);
        self.send_world_snapshot(player_id, now);
        self.broadcast_entity_create(player_id, now);

        self.pending_events
            .push_back(HostEvent::PlayerConnected { player_id });
    }

    fn handle_input(
        &mut self,
        header: &PacketHeader,
        buffer: &mut PacketBuffer,
        addr: SocketAddr,
        now: f32,
    ) {
        let Some(conn) = self.connections.get_by_addr_mut(&addr) else {
            return;
        };
        if conn.state != ConnectionState::Connected {
            return;
        }

        conn.touch(now);
        conn.process_acks(header, now);

        // Redundant batch: the client resends its unacked tail every frame.
        let count = header.payload_size as usize / PLAYER_INPUT_WIRE_SIZE;
        for _ in 0..count {
            let input = buffer.read_player_input();
            conn.push_input(input);
        }
    }

    fn process_tick(&mut self) {
        self.current_tick += 1;

        for conn in self.connections.iter_mut() {
            while let Some(input) = conn.pop_input() {
                if input.sequence <= conn.last_processed_input {
                    continue;
                }
                if let Some(state) = self.players.get_mut(&conn.player_id) {
                    apply_input(state, &input);
                    state.tick = self.current_tick;
                    state.last_processed_input = input.sequence;
                }
                conn.last_processed_input = input.sequence;
            }
        }
    }

    fn check_timeouts(&mut self, now: f32) {
        // two phases: collect, then remove, so broadcasts see a stable table
        let stale = self
            .connections
            .timed_out(now, self.config.connection_timeout);
        for player_id in stale {
            warn!("player {} timed out", player_id);
            self.remove_player(player_id, DisconnectReason::Timeout, now);
        }
    }

    fn remove_player(&mut self, player_id: u32, reason: DisconnectReason, now: f32) {
        self.broadcast_entity_destroy(player_id, now);
        self.connections.remove(player_id);
        self.players.remove(&player_id);

        info!("player {} {}", player_id, reason.as_str());
        self.pending_events
            .push_back(HostEvent::PlayerDisconnected { player_id, reason });
    }

    fn broadcast_state_updates(&mut self, now: f32) {
        let tick = self.current_tick;
        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };

        for conn in self.connections.iter_mut() {
            if conn.state != ConnectionState::Connected {
                continue;
            }

            let mut header = conn.build_header(PacketType::StateUpdate, tick, now);
            let mut buffer = PacketBuffer::new();
            let header_pos = buffer.begin_packet();

            buffer.write_u8(self.players.len() as u8);
            for state in self.players.values() {
                buffer.write_player_state(state);
            }

            buffer.end_packet(header_pos, &mut header);
            let _ = endpoint.send_to(&buffer, conn.addr);
            conn.last_send_time = now;
        }
    }

    fn send_heartbeats(&mut self, now: f32) {
        let tick = self.current_tick;
        let interval = self.config.heartbeat_interval;
        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };

        for conn in self.connections.iter_mut() {
            if conn.state != ConnectionState::Connected
                || now - conn.last_send_time < interval
            {
                continue;
            }

            let header = conn.build_header(PacketType::Heartbeat, tick, now);
            let mut buffer = PacketBuffer::new();
            buffer.write_header(&header);
            let _ = endpoint.send_to(&buffer, conn.addr);
            conn.last_send_time = now;
        }
    }

    fn send_connect_accept(&mut self, player_id: u32, now: f32) {
        let tick = self.current_tick;
        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };
        let Some(conn) = self.connections.get_mut(player_id) else {
            return;
        };

        let mut header = conn.build_header(PacketType::ConnectAccept, tick, now);
        let mut buffer = PacketBuffer::new();
        let header_pos = buffer.begin_packet();
        buffer.write_u32(conn.player_id);
        buffer.write_u32(tick);
        buffer.end_packet(header_pos, &mut header);

        let _ = endpoint.send_to(&buffer, conn.addr);
        conn.last_send_time = now;
    }

    fn send_connect_reject(&mut self, addr: SocketAddr) {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };

        // no connection exists for this peer, so no sequence to burn
        let mut header = PacketHeader::new(PacketType::ConnectReject);
        header.tick = self.current_tick;
        let mut buffer = PacketBuffer::new();
        buffer.write_header(&header);
        let _ = endpoint.send_to(&buffer, addr);
    }

    fn send_world_snapshot(&mut self, player_id: u32, now: f32) {
        let tick = self.current_tick;
        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };
        let Some(conn) = self.connections.get_mut(player_id) else {
            return;
        };

        let mut header = conn.build_header(PacketType::WorldSnapshot, tick, now);
        let mut buffer = PacketBuffer::new();
        let header_pos = buffer.begin_packet();

        buffer.write_u8(self.players.len() as u8);
        for state in self.players.values() {
            buffer.write_player_state(state);
        }

        let entities = world_entities();
        buffer.write_u8(entities.len() as u8);
        for entity in &entities {
            buffer.write_entity_state(entity);
        }

        buffer.end_packet(header_pos, &mut header);
        let _ = endpoint.send_to(&buffer, conn.addr);
        conn.last_send_time = now;
    }

    fn broadcast_entity_create(&mut self, player_id: u32, now: f32) {
        let Some(state) = self.players.get(&player_id) else {
            return;
        };
        let position = state.position;
        let tick = self.current_tick;

        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };
        for conn in self.connections.iter_mut() {
            if conn.state != ConnectionState::Connected || conn.player_id == player_id {
                continue;
            }

            let mut header = conn.build_header(PacketType::EntityCreate, tick, now);
            let mut buffer = PacketBuffer::new();
            let header_pos = buffer.begin_packet();
            buffer.write_u32(player_id);
            buffer.write_u8(ENTITY_TYPE_PLAYER);
            buffer.write_vec3(position);
            buffer.end_packet(header_pos, &mut header);

            let _ = endpoint.send_to(&buffer, conn.addr);
            conn.last_send_time = now;
        }
    }

    fn broadcast_entity_destroy(&mut self, player_id: u32, now: f32) {
        let tick = self.current_tick;
        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };

        for conn in self.connections.iter_mut() {
            if conn.state != ConnectionState::Connected {
                continue;
            }

            let mut header = conn.build_header(PacketType::EntityDestroy, tick, now);
            let mut buffer = PacketBuffer::new();
            let header_pos = buffer.begin_packet();
            buffer.write_u32(player_id);
            buffer.end_packet(header_pos, &mut header);

            let _ = endpoint.send_to(&buffer, conn.addr);
            conn.last_send_time = now;
        }
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The fixed world: three static cubes every client learns about in its
/// first snapshot.
fn world_entities() -> [EntityState; 3] {
    [
        EntityState::new(1, ENTITY_TYPE_CUBE, Vec3::new(0.0, 1.0, 0.0)),
        EntityState::new(2, ENTITY_TYPE_CUBE, Vec3::new(5.0, 1.0, 3.0)),
        EntityState::new(3, ENTITY_TYPE_CUBE, Vec3::new(-3.0, 0.5, -5.0)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU16, Ordering};

    static PORT_COUNTER: AtomicU16 = AtomicU16::new(42000);

    fn started_host() -> Host {
        let mut host = Host::new(HostConfig::default());
        let port = PORT_COUNTER.fetch_add(1, Ordering::SeqCst);
        host.start(port).unwrap();
        host
    }

    #[test]
    fn test_start_stop() {
        let mut host = started_host();
        assert!(host.is_running());
        assert!(host.local_addr().is_some());

        host.stop();
        assert!(!host.is_running());
        assert_eq!(host.player_count(), 0);
    }

    #[test]
    fn test_tick_advances_with_accumulated_time() {
        let mut host = started_host();
        assert_eq!(host.current_tick(), 0);

        host.update(0.5);
        let after_half_second = host.current_tick();
        assert!(after_half_second >= 29, "got {}", after_half_second);

        host.update(0.5);
        assert!(host.current_tick() > after_half_second);
    }

    #[test]
    fn test_update_without_start_is_inert() {
        let mut host = Host::new(HostConfig::default());
        host.update(1.0);
        assert_eq!(host.current_tick(), 0);
    }

    #[test]
    fn test_local_player_lifecycle() {
        let mut host = started_host();
        assert_eq!(host.player_count(), 0);

        let spawn = *host.local_player();
        assert_eq!(spawn.player_id, LOCAL_PLAYER_ID);
        assert_eq!(host.player_count(), 1);

        host.process_local_input(PlayerInput {
            keys: PlayerInput::KEY_FORWARD,
            yaw: 0.0,
            delta_time: 0.1,
            ..Default::default()
        });

        assert!(host.local_player().position.x > spawn.position.x);
    }

    #[test]
    fn test_local_input_without_player_is_dropped() {
        let mut host = started_host();
        host.process_local_input(PlayerInput {
            keys: PlayerInput::KEY_FORWARD,
            delta_time: 0.1,
            ..Default::default()
        });
        assert_eq!(host.player_count(), 0);
    }
}

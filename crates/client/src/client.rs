use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Instant;

use log::{debug, info, warn};

use pulse::net::{
    Connection, ConnectionState, NetworkEndpoint, NetworkStats, PacketBuffer, PacketHeader,
    PacketType, PlayerInput, PlayerState, ENTITY_TYPE_PLAYER, INPUT_REDUNDANCY, TICK_INTERVAL,
};
use pulse::simulation::apply_input;

use crate::config::ClientConfig;
use crate::events::ClientEvent;
use crate::history::InputHistory;
use crate::interpolation::InterpolationState;

const CONNECT_RETRY_INTERVAL: f32 = 1.0;

/// Position error below this needs no correction at all.
const RECONCILE_EPSILON: f32 = 0.01;
/// Position error above this snaps instead of blending.
const SNAP_THRESHOLD: f32 = 1.0;
/// Fraction of the remaining error removed per reconciliation event.
const BLEND_FACTOR: f32 = 0.1;

/// Predicting peer. Applies its own inputs immediately, reconciles against
/// the host's authoritative state, and renders remote players on a delayed
/// interpolation timeline. Events raised during `update(dt)` are queued for
/// `drain_events`.
pub struct Client {
    endpoint: Option<NetworkEndpoint>,
    connection: Connection,
    config: ClientConfig,
    state: ConnectionState,
    player_id: u32,
    server_tick: u32,
    input_sequence: u32,
    connect_start_time: f32,
    start_time: Instant,
    local_state: PlayerState,
    remote_players: HashMap<u32, PlayerState>,
    interpolation_states: HashMap<u32, InterpolationState>,
    input_history: InputHistory,
    pending_events: VecDeque<ClientEvent>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        // placeholder peer until connect() knows the real address
        let placeholder: SocketAddr = ([127, 0, 0, 1], 0).into();

        Self {
            endpoint: None,
            connection: Connection::new(0, placeholder, 0.0),
            config,
            state: ConnectionState::Disconnected,
            player_id: 0,
            server_tick: 0,
            input_sequence: 0,
            connect_start_time: 0.0,
            start_time: Instant::now(),
            local_state: PlayerState::default(),
            remote_players: HashMap::new(),
            interpolation_states: HashMap::new(),
            input_history: InputHistory::new(),
            pending_events: VecDeque::new(),
        }
    }

    pub fn connect<A: ToSocketAddrs>(&mut self, addr: A) -> io::Result<()> {
        let server_addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no address resolved"))?;

        let endpoint = NetworkEndpoint::bind("0.0.0.0:0")?;
        info!("connecting to {}", server_addr);

        self.endpoint = Some(endpoint);
        self.start_time = Instant::now();
        self.connection = Connection::new(0, server_addr, 0.0);
        self.state = ConnectionState::Connecting;
        self.connect_start_time = 0.0;
        self.player_id = 0;
        self.server_tick = 0;
        self.input_sequence = 0;
        self.local_state = PlayerState::default();

        self.send_connect_request(0.0);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if self.state != ConnectionState::Disconnected {
            self.send_disconnect();
            self.state = ConnectionState::Disconnected;
            self.pending_events.push_back(ClientEvent::Disconnected);
            info!("disconnected");
        }

        self.endpoint = None;
        self.remote_players.clear();
        self.interpolation_states.clear();
        self.input_history.clear();
    }

    pub fn update(&mut self, _dt: f32) {
        if self.state == ConnectionState::Disconnected {
            return;
        }

        let now = self.now();
        self.receive_packets(now);

        match self.state {
            ConnectionState::Connecting => {
                if now - self.connect_start_time > self.config.connection_timeout {
                    warn!("connect timed out");
                    self.disconnect();
                } else if now - self.connection.last_send_time > CONNECT_RETRY_INTERVAL {
                    self.send_connect_request(now);
                }
            }
            ConnectionState::Connected => {
                if now - self.connection.last_receive_time > self.config.connection_timeout {
                    warn!("lost contact with host");
                    self.disconnect();
                } else if now - self.connection.last_send_time > self.config.heartbeat_interval {
                    self.send_heartbeat(now);
                }
            }
            _ => {}
        }
    }

    /// Predict locally, remember the input for reconciliation, and ship the
    /// unacknowledged tail to the host. Each input rides along in up to
    /// `INPUT_REDUNDANCY` consecutive packets, which is the whole
    /// loss-mitigation story for the input stream.
    pub fn send_input(&mut self, input: PlayerInput) {
        if self.state != ConnectionState::Connected {
            return;
        }
        let now = self.now();

        self.input_sequence += 1;
        let mut input = input;
        input.sequence = self.input_sequence;
        input.tick = self.server_tick;

        let mut predicted = self.local_state;
        apply_input(&mut predicted, &input);
        predicted.tick = self.server_tick;

        self.input_history.add(input, predicted);
        self.local_state = predicted;

        let unacked = self.input_history.unacknowledged();
        let count = unacked.len().min(INPUT_REDUNDANCY);

        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };
        let mut header = self
            .connection
            .build_header(PacketType::Input, self.server_tick, now);
        let mut buffer = PacketBuffer::new();
        let header_pos = buffer.begin_packet();
        for recent in &unacked[unacked.len() - count..] {
            buffer.write_player_input(recent);
        }
        buffer.end_packet(header_pos, &mut header);

        let _ = endpoint.send_to(&buffer, self.connection.addr);
        self.connection.last_send_time = now;
    }

    pub fn local_state(&self) -> &PlayerState {
        &self.local_state
    }

    pub fn local_state_mut(&mut self) -> &mut PlayerState {
        &mut self.local_state
    }

    /// Remote players as they should be rendered right now: interpolated at
    /// the delayed render tick, falling back to the last known state when
    /// the buffer cannot bracket it.
    pub fn interpolated_players(&self) -> HashMap<u32, PlayerState> {
        let delay_ticks = (self.config.interpolation_delay / TICK_INTERVAL).round() as u32;
        let render_tick = self.server_tick.saturating_sub(delay_ticks);

        let mut result = HashMap::new();
        for (&player_id, interp) in &self.interpolation_states {
            if player_id == self.player_id {
                continue;
            }
            if let Some(state) = interp.interpolate(render_tick) {
                result.insert(player_id, state);
            } else if let Some(state) = self.remote_players.get(&player_id) {
                result.insert(player_id, *state);
            }
        }
        result
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.state == ConnectionState::Connecting
    }

    pub fn player_id(&self) -> u32 {
        self.player_id
    }

    pub fn server_tick(&self) -> u32 {
        self.server_tick
    }

    pub fn player_count(&self) -> usize {
        self.remote_players.len() + 1
    }

    pub fn rtt(&self) -> f32 {
        self.connection.rtt()
    }

    pub fn stats(&self) -> Option<&NetworkStats> {
        self.endpoint.as_ref().map(|e| e.stats())
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ClientEvent> + '_ {
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
            if addr != self.connection.addr {
                continue;
            }
            self.handle_packet(header, &mut buffer, now);
            if self.state == ConnectionState::Disconnected {
                break;
            }
        }
    }

    fn handle_packet(&mut self, header: PacketHeader, buffer: &mut PacketBuffer, now: f32) {
        self.connection.touch(now);
        self.connection.process_acks(&header, now);

        let Some(packet_type) = header.packet_type() else {
            return;
        };

        match packet_type {
            PacketType::ConnectAccept => {
                if self.state == ConnectionState::Connecting {
                    self.handle_connect_accept(buffer);
                }
            }
            PacketType::ConnectReject => {
                warn!("host rejected the connection");
                self.disconnect();
            }
            PacketType::Disconnect => {
                info!("host closed the connection");
                self.disconnect();
            }
            PacketType::Heartbeat => {}
            PacketType::StateUpdate => {
                if self.state == ConnectionState::Connected {
                    self.handle_state_update(&header, buffer);
                }
            }
            PacketType::WorldSnapshot => {
                if self.state == ConnectionState::Connected {
                    self.handle_world_snapshot(buffer);
                }
            }
            PacketType::EntityCreate => {
                if self.state == ConnectionState::Connected {
                    self.handle_entity_create(buffer);
                }
            }
            PacketType::EntityDestroy => {
                if self.state == ConnectionState::Connected {
                    self.handle_entity_destroy(buffer);
                }
            }
            _ => {}
        }
    }

    fn handle_connect_accept(&mut self, buffer: &mut PacketBuffer) {
        self.player_id = buffer.read_u32();
        self.server_tick = buffer.read_u32();
        self.state = ConnectionState::Connected;

        self.local_state = PlayerState::spawn(self.player_id);
        self.local_state.tick = self.server_tick;

        info!(
            "connected as player {} at tick {}",
            self.player_id, self.server_tick
        );
        self.pending_events.push_back(ClientEvent::Connected {
            player_id: self.player_id,
        });
    }

    fn handle_state_update(&mut self, header: &PacketHeader, buffer: &mut PacketBuffer) {
        self.server_tick = header.tick;

        let player_count = buffer.read_u8();
        for _ in 0..player_count {
            let state = buffer.read_player_state();
            if state.player_id == self.player_id {
                self.reconcile(state);
            } else {
                self.remote_players.insert(state.player_id, state);
                self.interpolation_states
                    .entry(state.player_id)
                    .or_default()
                    .add_state(state);
            }
        }
    }

    fn handle_world_snapshot(&mut self, buffer: &mut PacketBuffer) {
        let player_count = buffer.read_u8();
        for _ in 0..player_count {
            let state = buffer.read_player_state();
            if state.player_id == self.player_id {
                // first authoritative word on our own state; adopt it whole
                self.local_state = state;
            } else {
                self.remote_players.insert(state.player_id, state);
                self.interpolation_states
                    .entry(state.player_id)
                    .or_default()
                    .add_state(state);
            }
        }

        let entity_count = buffer.read_u8();
        for _ in 0..entity_count {
            let entity = buffer.read_entity_state();
            self.pending_events.push_back(ClientEvent::EntityCreated {
                entity_id: entity.entity_id,
                entity_type: entity.entity_type,
                position: entity.position,
            });
        }

        debug!(
            "world snapshot: {} players, {} entities",
            player_count, entity_count
        );
    }

    fn handle_entity_create(&mut self, buffer: &mut PacketBuffer) {
        let entity_id = buffer.read_u32();
        let entity_type = buffer.read_u8();
        let position = buffer.read_vec3();

        if entity_type == ENTITY_TYPE_PLAYER {
            let state = PlayerState {
                player_id: entity_id,
                position,
                ..Default::default()
            };
            self.remote_players.insert(entity_id, state);
        }

        debug!("entity {} created (type {})", entity_id, entity_type);
        self.pending_events.push_back(ClientEvent::EntityCreated {
            entity_id,
            entity_type,
            position,
        });
    }

    fn handle_entity_destroy(&mut self, buffer: &mut PacketBuffer) {
        let entity_id = buffer.read_u32();

        self.remote_players.remove(&entity_id);
        self.interpolation_states.remove(&entity_id);

        debug!("entity {} destroyed", entity_id);
        self.pending_events
            .push_back(ClientEvent::EntityDestroyed { entity_id });
    }

    /// Fold the host's authoritative view of our player back into the
    /// prediction: release acknowledged inputs, replay the rest on top of
    /// the server state, then blend or snap toward that corrected present.
    fn reconcile(&mut self, server: PlayerState) {
        self.input_history
            .acknowledge_up_to(server.last_processed_input);

        let error = server.position - self.local_state.position;
        let error_magnitude = error.length();
        if error_magnitude <= RECONCILE_EPSILON {
            return;
        }

        let mut corrected = server;
        for input in self.input_history.unacknowledged() {
            apply_input(&mut corrected, &input);
        }

        if error_magnitude < SNAP_THRESHOLD {
            self.local_state.position +=
                (corrected.position - self.local_state.position) * BLEND_FACTOR;
        } else {
            self.local_state.position = corrected.position;
        }
    }

    fn send_connect_request(&mut self, now: f32) {
        self.send_header_only(PacketType::ConnectRequest, now);
    }

    fn send_disconnect(&mut self) {
        let now = self.now();
        self.send_header_only(PacketType::Disconnect, now);
    }

    fn send_heartbeat(&mut self, now: f32) {
        self.send_header_only(PacketType::Heartbeat, now);
    }

    fn send_header_only(&mut self, packet_type: PacketType, now: f32) {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };

        let header = self
            .connection
            .build_header(packet_type, self.server_tick, now);
        let mut buffer = PacketBuffer::new();
        buffer.write_header(&header);

        let _ = endpoint.send_to(&buffer, self.connection.addr);
        self.connection.last_send_time = now;
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client_is_disconnected() {
        let client = Client::new(ClientConfig::default());
        assert!(!client.is_connected());
        assert!(!client.is_connecting());
        assert_eq!(client.player_id(), 0);
    }

    #[test]
    fn test_send_input_requires_connection() {
        let mut client = Client::new(ClientConfig::default());
        let before = *client.local_state();
        client.send_input(PlayerInput {
            keys: PlayerInput::KEY_FORWARD,
            delta_time: 0.1,
            ..Default::default()
        });
        assert_eq!(client.local_state().position, before.position);
    }

    #[test]
    fn test_connect_enters_connecting() {
        let mut client = Client::new(ClientConfig::default());
        client.connect("127.0.0.1:19998").unwrap();
        assert!(client.is_connecting());
        assert!(!client.is_connected());
    }
}

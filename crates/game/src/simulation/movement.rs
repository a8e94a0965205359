use std::f32::consts::PI;

use crate::net::{PlayerInput, PlayerState};

pub const MOVE_SPEED: f32 = 5.0;

/// The shared translation rule. Host and client must apply inputs
/// bit-for-bit identically or prediction never converges, so any change
/// here changes the protocol.
pub fn apply_input(state: &mut PlayerState, input: &PlayerInput) {
    let velocity = MOVE_SPEED * input.delta_time;
    let yaw_rad = input.yaw * PI / 180.0;
    let (sin_yaw, cos_yaw) = yaw_rad.sin_cos();

    if input.has_key(PlayerInput::KEY_FORWARD) {
        state.position.x += cos_yaw * velocity;
        state.position.z += sin_yaw * velocity;
    }
    if input.has_key(PlayerInput::KEY_BACK) {
        state.position.x -= cos_yaw * velocity;
        state.position.z -= sin_yaw * velocity;
    }
    if input.has_key(PlayerInput::KEY_LEFT) {
        state.position.x += sin_yaw * velocity;
        state.position.z -= cos_yaw * velocity;
    }
    if input.has_key(PlayerInput::KEY_RIGHT) {
        state.position.x -= sin_yaw * velocity;
        state.position.z += cos_yaw * velocity;
    }
    if input.has_key(PlayerInput::KEY_UP) {
        state.position.y += velocity;
    }
    if input.has_key(PlayerInput::KEY_DOWN) {
        state.position.y -= velocity;
    }

    state.yaw = input.yaw;
    state.pitch = input.pitch;
}

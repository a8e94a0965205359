use pulse::net::{PlayerState, STATE_BUFFER_SIZE};

/// Ring of authoritative states for one remote player. `count` is the
/// total ever received; the newest `STATE_BUFFER_SIZE` stay resident.
#[derive(Debug)]
pub struct InterpolationState {
    states: [PlayerState; STATE_BUFFER_SIZE],
    count: u32,
}

impl Default for InterpolationState {
    fn default() -> Self {
        Self::new()
    }
}

impl InterpolationState {
    pub fn new() -> Self {
        Self {
            states: [PlayerState::default(); STATE_BUFFER_SIZE],
            count: 0,
        }
    }

    pub fn add_state(&mut self, state: PlayerState) {
        self.states[self.count as usize % STATE_BUFFER_SIZE] = state;
        self.count += 1;
    }

    pub fn received_count(&self) -> u32 {
        self.count
    }

    /// Blend between the newest state at or before `target_tick` and its
    /// insertion-order successor. Returns the older state unchanged when no
    /// newer one exists (freeze, never extrapolate), and `None` when the
    /// target predates everything buffered.
    pub fn interpolate(&self, target_tick: u32) -> Option<PlayerState> {
        if self.count < 2 {
            return None;
        }

        let resident = (self.count as usize).min(STATE_BUFFER_SIZE);
        let newest = self.count as usize;

        let mut before = None;
        let mut after = None;
        for i in 0..resident {
            let state = &self.states[(newest - 1 - i) % STATE_BUFFER_SIZE];
            if state.tick <= target_tick {
                before = Some(state);
                if i > 0 {
                    after = Some(&self.states[(newest - i) % STATE_BUFFER_SIZE]);
                }
                break;
            }
        }

        let before = before?;
        let Some(after) = after else {
            return Some(*before);
        };

        let t = if after.tick > before.tick {
            (target_tick - before.tick) as f32 / (after.tick - before.tick) as f32
        } else {
            0.0
        };
        let t = t.clamp(0.0, 1.0);

        Some(PlayerState {
            player_id: before.player_id,
            tick: target_tick,
            position: before.position.lerp(after.position, t),
            yaw: before.yaw + (after.yaw - before.yaw) * t,
            pitch: before.pitch + (after.pitch - before.pitch) * t,
            last_processed_input: after.last_processed_input,
        })
    }
}

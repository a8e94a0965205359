use pulse::net::{PlayerInput, PlayerState, INPUT_BUFFER_SIZE};

/// Ring of inputs awaiting server acknowledgement, paired with the state
/// predicted after each. Oldest entries are overwritten when full; inputs
/// the server has applied are released by `acknowledge_up_to`.
#[derive(Debug)]
pub struct InputHistory {
    inputs: [PlayerInput; INPUT_BUFFER_SIZE],
    predicted: [PlayerState; INPUT_BUFFER_SIZE],
    head: usize,
    count: usize,
}

impl Default for InputHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl InputHistory {
    pub fn new() -> Self {
        Self {
            inputs: [PlayerInput::default(); INPUT_BUFFER_SIZE],
            predicted: [PlayerState::default(); INPUT_BUFFER_SIZE],
            head: 0,
            count: 0,
        }
    }

    pub fn add(&mut self, input: PlayerInput, predicted: PlayerState) {
        let idx = (self.head + self.count) % INPUT_BUFFER_SIZE;
        self.inputs[idx] = input;
        self.predicted[idx] = predicted;
        if self.count < INPUT_BUFFER_SIZE {
            self.count += 1;
        } else {
            self.head = (self.head + 1) % INPUT_BUFFER_SIZE;
        }
    }

    /// Release every stored input the server has applied. Entries are in
    /// sequence order, so this only ever advances the head.
    pub fn acknowledge_up_to(&mut self, sequence: u32) {
        while self.count > 0 && self.inputs[self.head].sequence <= sequence {
            self.head = (self.head + 1) % INPUT_BUFFER_SIZE;
            self.count -= 1;
        }
    }

    /// Unacknowledged inputs, oldest first.
    pub fn unacknowledged(&self) -> Vec<PlayerInput> {
        (0..self.count)
            .map(|i| self.inputs[(self.head + i) % INPUT_BUFFER_SIZE])
            .collect()
    }

    /// The state predicted after the newest stored input, if any survive.
    pub fn latest_prediction(&self) -> Option<&PlayerState> {
        if self.count == 0 {
            return None;
        }
        let idx = (self.head + self.count - 1) % INPUT_BUFFER_SIZE;
        Some(&self.predicted[idx])
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(sequence: u32) -> PlayerInput {
        PlayerInput {
            sequence,
            ..Default::default()
        }
    }

    #[test]
    fn test_acknowledge_releases_prefix() {
        let mut history = InputHistory::new();
        for seq in 1..=10 {
            history.add(input(seq), PlayerState::default());
        }
        assert_eq!(history.unacknowledged().len(), 10);

        history.acknowledge_up_to(5);

        let remaining = history.unacknowledged();
        assert_eq!(remaining.len(), 5);
        let sequences: Vec<u32> = remaining.iter().map(|i| i.sequence).collect();
        assert_eq!(sequences, vec![6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_acknowledge_past_everything_empties() {
        let mut history = InputHistory::new();
        for seq in 1..=4 {
            history.add(input(seq), PlayerState::default());
        }
        history.acknowledge_up_to(100);
        assert!(history.is_empty());
    }

    #[test]
    fn test_latest_prediction_tracks_newest_entry() {
        let mut history = InputHistory::new();
        assert!(history.latest_prediction().is_none());

        for seq in 1..=3 {
            let predicted = PlayerState {
                last_processed_input: seq,
                ..Default::default()
            };
            history.add(input(seq), predicted);
        }

        assert_eq!(history.latest_prediction().unwrap().last_processed_input, 3);

        history.acknowledge_up_to(3);
        assert!(history.latest_prediction().is_none());
    }

    #[test]
    fn test_overflow_overwrites_oldest() {
        let mut history = InputHistory::new();
        for seq in 1..=(INPUT_BUFFER_SIZE as u32 + 8) {
            history.add(input(seq), PlayerState::default());
        }

        let stored = history.unacknowledged();
        assert_eq!(stored.len(), INPUT_BUFFER_SIZE);
        assert_eq!(stored[0].sequence, 9);
        assert_eq!(stored.last().unwrap().sequence, INPUT_BUFFER_SIZE as u32 + 8);
    }

    #[test]
    fn test_order_preserved_across_wrap() {
        let mut history = InputHistory::new();
        for seq in 1..=(INPUT_BUFFER_SIZE as u32 * 2) {
            history.add(input(seq), PlayerState::default());
        }
        history.acknowledge_up_to(INPUT_BUFFER_SIZE as u32 + 32);

        let stored = history.unacknowledged();
        for pair in stored.windows(2) {
            assert!(pair[0].sequence < pair[1].sequence);
        }
    }
}

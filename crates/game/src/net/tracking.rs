use std::collections::VecDeque;

/// Inbound sequence bookkeeping: highest sequence seen plus a 32-bit window
/// of which earlier sequences arrived. Bit 0 of the bitfield corresponds to
/// the remote sequence itself, bit i to `remote_sequence - i`.
#[derive(Debug, Default)]
pub struct ReceiveTracker {
    remote_sequence: u32,
    ack_bits: u32,
}

impl ReceiveTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sequence: u32) {
        if sequence > self.remote_sequence {
            let shift = sequence - self.remote_sequence;
            if shift < 32 {
                self.ack_bits = (self.ack_bits << shift) | 1;
            } else {
                self.ack_bits = 1;
            }
            self.remote_sequence = sequence;
        } else if sequence < self.remote_sequence {
            let diff = self.remote_sequence - sequence;
            if diff < 32 {
                self.ack_bits |= 1 << diff;
            }
        }
        // sequence == remote_sequence is already covered by bit 0
    }

    pub fn ack_data(&self) -> (u32, u32) {
        (self.remote_sequence, self.ack_bits)
    }

    pub fn remote_sequence(&self) -> u32 {
        self.remote_sequence
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PendingPacket {
    pub sequence: u32,
    pub send_time: f32,
    pub acked: bool,
}

/// Outbound bookkeeping: remembers when each sequence left so that incoming
/// ack fields can be turned into a smoothed round-trip estimate.
#[derive(Debug)]
pub struct AckTracker {
    pending: VecDeque<PendingPacket>,
    max_pending: usize,
    srtt: f32,
}

const RTT_ALPHA: f32 = 0.125;
const INITIAL_RTT: f32 = 0.1;

impl AckTracker {
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(max_pending),
            max_pending,
            srtt: INITIAL_RTT,
        }
    }

    pub fn track_packet(&mut self, sequence: u32, now: f32) {
        while self.pending.len() >= self.max_pending {
            self.pending.pop_front();
        }
        self.pending.push_back(PendingPacket {
            sequence,
            send_time: now,
            acked: false,
        });
    }

    /// Match incoming ack fields against pending sends. The bitfield uses
    /// the same convention as [`ReceiveTracker`]: bit i covers `ack - i`.
    pub fn process_ack(&mut self, ack: u32, ack_bits: u32, now: f32) {
        let mut samples = Vec::new();

        for pending in &mut self.pending {
            if pending.acked || pending.sequence > ack {
                continue;
            }

            let diff = ack - pending.sequence;
            let acked = diff < 32 && ack_bits & (1 << diff) != 0;
            if acked {
                pending.acked = true;
                samples.push(now - pending.send_time);
            }
        }

        for rtt in samples {
            self.srtt = (1.0 - RTT_ALPHA) * self.srtt + RTT_ALPHA * rtt;
        }

        while self.pending.front().is_some_and(|p| p.acked) {
            self.pending.pop_front();
        }
    }

    pub fn srtt(&self) -> f32 {
        self.srtt
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_order_receive() {
        let mut tracker = ReceiveTracker::new();
        tracker.record(1);
        tracker.record(2);
        tracker.record(3);

        let (ack, bits) = tracker.ack_data();
        assert_eq!(ack, 3);
        assert_eq!(bits & 0b111, 0b111);
    }

    #[test]
    fn test_reordered_receive() {
        let mut tracker = ReceiveTracker::new();
        tracker.record(3);
        tracker.record(1);
        tracker.record(2);

        let (ack, bits) = tracker.ack_data();
        assert_eq!(ack, 3);
        // bit 0 = seq 3, bit 1 = seq 2, bit 2 = seq 1
        assert_eq!(bits & 0b111, 0b111);
    }

    #[test]
    fn test_gap_marks_missing() {
        let mut tracker = ReceiveTracker::new();
        tracker.record(1);
        tracker.record(4);

        let (ack, bits) = tracker.ack_data();
        assert_eq!(ack, 4);
        assert_eq!(bits & 1, 1); // seq 4 received
        assert_eq!(bits & (1 << 1), 0); // seq 3 missing
        assert_eq!(bits & (1 << 2), 0); // seq 2 missing
        assert_eq!(bits & (1 << 3), 1 << 3); // seq 1 received
    }

    #[test]
    fn test_large_gap_resets_window() {
        let mut tracker = ReceiveTracker::new();
        tracker.record(1);
        tracker.record(100);

        let (ack, bits) = tracker.ack_data();
        assert_eq!(ack, 100);
        assert_eq!(bits, 1);
    }

    #[test]
    fn test_equal_sequence_is_noop() {
        let mut tracker = ReceiveTracker::new();
        tracker.record(5);
        let before = tracker.ack_data();
        tracker.record(5);
        assert_eq!(tracker.ack_data(), before);
    }

    #[test]
    fn test_stale_sequence_outside_window() {
        let mut tracker = ReceiveTracker::new();
        tracker.record(100);
        tracker.record(50);

        let (ack, bits) = tracker.ack_data();
        assert_eq!(ack, 100);
        assert_eq!(bits, 1);
    }

    #[test]
    fn test_ack_tracker_rtt() {
        let mut tracker = AckTracker::new(64);
        tracker.track_packet(1, 0.0);
        tracker.process_ack(1, 1, 0.1);

        // One 100ms sample pulls the initial estimate toward itself.
        assert!((tracker.srtt() - 0.1).abs() < 0.01);
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn test_ack_tracker_bitfield_ack() {
        let mut tracker = AckTracker::new(64);
        tracker.track_packet(1, 0.0);
        tracker.track_packet(2, 0.0);
        tracker.track_packet(3, 0.0);

        // ack=3 with bits covering 3 and 1, but not 2
        tracker.process_ack(3, 0b101, 0.05);
        assert_eq!(tracker.pending_count(), 1);
        assert_eq!(tracker.pending.front().unwrap().sequence, 2);
    }
}

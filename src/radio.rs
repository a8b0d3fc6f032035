//! The radio queue: transmissions pilots owe the controller, released after
//! a per-class delay (spec §3, §4.5). Text synthesis itself is out of scope
//! (spec §1); the core only invokes an injected [`RadioFormatter`], mirroring
//! the teacher's `position_update_text`/`to_fsd_string` "format a protocol
//! string from state" pattern generalized to a trait object.

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Delay class, each a `[lo, hi)` tick range (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadioDelayClass {
    CheckIn,
    Readback,
    General,
    System,
}

impl RadioDelayClass {
    fn range_ticks(&self) -> (u32, u32) {
        match self {
            RadioDelayClass::CheckIn => (3, 6),
            RadioDelayClass::Readback => (2, 4),
            RadioDelayClass::General => (1, 3),
            RadioDelayClass::System => (0, 0),
        }
    }

    pub fn draw_delay_ticks(&self, rng: &mut impl Rng) -> u32 {
        let (lo, hi) = self.range_ticks();
        if lo == hi {
            lo
        } else {
            rng.gen_range(lo..hi)
        }
    }
}

/// Sender of a radio transmission (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RadioSender {
    Aircraft(String),
    Controller,
    System,
}

/// A queued-but-not-yet-sent transmission (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRadio {
    pub sender: RadioSender,
    pub message: String,
    pub send_at_tick: u64,
    pub frequency_mhz: f64,
}

/// A released transmission, as broadcast externally (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioTransmission {
    pub id: u64,
    pub from: RadioSender,
    pub message: String,
    pub timestamp_tick: u64,
    pub frequency_mhz: f64,
}

/// FIFO radio queue with per-message delay class (spec §4.5).
#[derive(Debug, Clone, Default)]
pub struct RadioQueue {
    pending: VecDeque<PendingRadio>,
    next_id: u64,
}

impl RadioQueue {
    pub fn enqueue(&mut self, sender: RadioSender, message: String, send_at_tick: u64, frequency_mhz: f64) {
        self.pending.push_back(PendingRadio { sender, message, send_at_tick, frequency_mhz });
    }

    /// Return all messages whose send-at tick has matured, preserving the
    /// relative order of what remains (spec §4.5, `drainQueue`).
    pub fn drain_matured(&mut self, current_tick: u64) -> Vec<RadioTransmission> {
        let mut released = Vec::new();
        let mut remaining = VecDeque::with_capacity(self.pending.len());
        for item in self.pending.drain(..) {
            if item.send_at_tick <= current_tick {
                let id = self.next_id;
                self.next_id += 1;
                released.push(RadioTransmission {
                    id,
                    from: item.sender,
                    message: item.message,
                    timestamp_tick: current_tick,
                    frequency_mhz: item.frequency_mhz,
                });
            } else {
                remaining.push_back(item);
            }
        }
        self.pending = remaining;
        released
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Synthesizes transmission text from structured state (spec §6). The core
/// only invokes this; it never inspects the returned strings.
pub trait RadioFormatter {
    fn format_readback(&self, callsign: &str, raw_text: &str) -> String;
    fn format_checkin(&self, callsign: &str, altitude_ft: f64) -> String;
    fn format_unable(&self, callsign: &str, reason: &str) -> String;
    fn format_system_event(&self, callsign: &str, event: &str) -> String;
}

/// Minimal formatter used by tests and the CLI demo when no richer formatter
/// is injected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextRadioFormatter;

impl RadioFormatter for PlaintextRadioFormatter {
    fn format_readback(&self, callsign: &str, raw_text: &str) -> String {
        format!("{callsign}, {raw_text}")
    }

    fn format_checkin(&self, callsign: &str, altitude_ft: f64) -> String {
        format!("{callsign}, with you, {:.0} feet", altitude_ft)
    }

    fn format_unable(&self, callsign: &str, reason: &str) -> String {
        format!("{callsign}, unable, {reason}")
    }

    fn format_system_event(&self, callsign: &str, event: &str) -> String {
        format!("[{callsign}] {event}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn drain_matured_preserves_order_of_remainder() {
        let mut queue = RadioQueue::default();
        queue.enqueue(RadioSender::Controller, "a".to_string(), 5, 118.5);
        queue.enqueue(RadioSender::Controller, "b".to_string(), 2, 118.5);
        queue.enqueue(RadioSender::Controller, "c".to_string(), 10, 118.5);

        let released = queue.drain_matured(5);
        assert_eq!(released.len(), 2);
        assert_eq!(released[0].message, "a");
        assert_eq!(released[1].message, "b");
        assert!(!queue.is_empty());
    }

    #[test]
    fn checkin_delay_is_within_published_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let delay = RadioDelayClass::CheckIn.draw_delay_ticks(&mut rng);
            assert!((3..6).contains(&delay));
        }
    }

    #[test]
    fn system_class_has_zero_delay() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(RadioDelayClass::System.draw_delay_ticks(&mut rng), 0);
    }
}

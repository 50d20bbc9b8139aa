//! Per-chat sequence gate.
//!
//! Publishers may race, so sequenced events for one chat can reach the
//! fan-out worker out of commit order. The gate releases them strictly in
//! sequence: an event ahead of a gap is held until the gap fills, the hold
//! times out, or more than `window` events are waiting. Giving up on a gap
//! is reported as a [`Skip`] so the caller can tell the affected clients to
//! resynchronize.
//!
//! The first sequence a gate sees becomes its baseline. A sequence below
//! the baseline was never released by this gate and is reported as
//! [`GateOutcome::Late`]; one between the baseline and the release position
//! was already released (or skipped) and is a [`GateOutcome::Duplicate`].

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

/// Items released by giving up on a sequence gap.
#[derive(Debug, PartialEq, Eq)]
pub struct Skip<T> {
    /// Sequences that were never seen.
    pub missing: u64,
    /// Items after the gap, in sequence order.
    pub ready: Vec<T>,
}

/// Result of offering one item.
#[derive(Debug, PartialEq, Eq)]
pub enum GateOutcome<T> {
    /// Items to deliver now, in sequence order.
    Ready(Vec<T>),
    /// Held behind a gap.
    Held,
    /// Already released, skipped, or held.
    Duplicate(T),
    /// Below the baseline; never released by this gate.
    Late(T),
    /// The window overflowed and the gap was given up on.
    Skipped(Skip<T>),
}

/// Reorder buffer for one chat.
#[derive(Debug)]
pub struct ReorderGate<T> {
    baseline: Option<u64>,
    next: Option<u64>,
    held: BTreeMap<u64, T>,
    gap_since: Option<Instant>,
    last_active: Instant,
    window: usize,
    timeout: Duration,
}

impl<T> ReorderGate<T> {
    /// Create an empty gate.
    pub fn new(window: usize, timeout: Duration) -> Self {
        Self {
            baseline: None,
            next: None,
            held: BTreeMap::new(),
            gap_since: None,
            last_active: Instant::now(),
            window: window.max(1),
            timeout,
        }
    }

    /// Offer the item committed at `sequence`.
    pub fn offer(&mut self, sequence: u64, item: T, now: Instant) -> GateOutcome<T> {
        self.last_active = now;
        let baseline = *self.baseline.get_or_insert(sequence);
        let next = *self.next.get_or_insert(sequence);
        if sequence < baseline {
            return GateOutcome::Late(item);
        }
        if sequence < next || self.held.contains_key(&sequence) {
            return GateOutcome::Duplicate(item);
        }

        if sequence > next {
            self.held.insert(sequence, item);
            self.gap_since.get_or_insert(now);
            if self.held.len() > self.window {
                return GateOutcome::Skipped(self.skip_gap(now));
            }
            return GateOutcome::Held;
        }

        let mut ready = vec![item];
        self.next = Some(sequence + 1);
        self.drain_into(&mut ready, now);
        GateOutcome::Ready(ready)
    }

    /// Give up on the current gap if it has been waited on long enough.
    pub fn expire(&mut self, now: Instant) -> Option<Skip<T>> {
        match self.deadline() {
            Some(deadline) if now >= deadline => Some(self.skip_gap(now)),
            _ => None,
        }
    }

    /// When the current gap times out, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.gap_since.map(|since| since + self.timeout)
    }

    /// Next sequence that would be released immediately.
    pub fn next_expected(&self) -> Option<u64> {
        self.next
    }

    /// Items waiting behind a gap.
    pub fn held(&self) -> usize {
        self.held.len()
    }

    /// Whether nothing is held and nothing was offered for `idle`.
    pub fn is_idle(&self, now: Instant, idle: Duration) -> bool {
        self.held.is_empty() && now.saturating_duration_since(self.last_active) >= idle
    }

    fn skip_gap(&mut self, now: Instant) -> Skip<T> {
        let mut missing = 0;
        if let Some((&first, _)) = self.held.first_key_value() {
            missing = first - self.next.unwrap_or(first);
            self.next = Some(first);
        }
        let mut ready = Vec::new();
        self.drain_into(&mut ready, now);
        Skip { missing, ready }
    }

    fn drain_into(&mut self, ready: &mut Vec<T>, now: Instant) {
        while let Some(next) = self.next {
            let Some(item) = self.held.remove(&next) else {
                break;
            };
            ready.push(item);
            self.next = Some(next + 1);
        }
        self.gap_since = if self.held.is_empty() { None } else { Some(now) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> ReorderGate<u64> {
        ReorderGate::new(4, Duration::from_millis(100))
    }

    #[test]
    fn test_in_order_passes_through() {
        let mut gate = gate();
        let now = Instant::now();
        for seq in 1..=3 {
            assert_eq!(gate.offer(seq, seq, now), GateOutcome::Ready(vec![seq]));
        }
        assert_eq!(gate.next_expected(), Some(4));
        assert_eq!(gate.deadline(), None);
    }

    #[test]
    fn test_gap_is_filled_in_order() {
        let mut gate = gate();
        let now = Instant::now();
        assert_eq!(gate.offer(5, 5, now), GateOutcome::Ready(vec![5]));
        assert_eq!(gate.offer(7, 7, now), GateOutcome::Held);
        assert_eq!(gate.offer(8, 8, now), GateOutcome::Held);
        assert_eq!(gate.offer(6, 6, now), GateOutcome::Ready(vec![6, 7, 8]));
        assert_eq!(gate.held(), 0);
    }

    #[test]
    fn test_duplicate_and_late_sequences() {
        let mut gate = gate();
        let now = Instant::now();
        gate.offer(5, 5, now);
        gate.offer(7, 7, now);
        assert_eq!(gate.offer(5, 5, now), GateOutcome::Duplicate(5));
        assert_eq!(gate.offer(7, 7, now), GateOutcome::Duplicate(7));
        assert_eq!(gate.offer(4, 4, now), GateOutcome::Late(4));
    }

    #[test]
    fn test_gap_times_out() {
        let mut gate = gate();
        let start = Instant::now();
        gate.offer(1, 1, start);
        gate.offer(3, 3, start);
        gate.offer(4, 4, start);

        assert_eq!(gate.expire(start + Duration::from_millis(50)), None);
        assert_eq!(
            gate.expire(start + Duration::from_millis(100)),
            Some(Skip {
                missing: 1,
                ready: vec![3, 4]
            })
        );
        assert_eq!(gate.next_expected(), Some(5));
        assert_eq!(gate.offer(2, 2, start), GateOutcome::Duplicate(2));
    }

    #[test]
    fn test_window_overflow_skips_gap() {
        let mut gate = gate();
        let now = Instant::now();
        gate.offer(1, 1, now);
        for seq in 4..=7 {
            assert_eq!(gate.offer(seq, seq, now), GateOutcome::Held);
        }
        assert_eq!(
            gate.offer(8, 8, now),
            GateOutcome::Skipped(Skip {
                missing: 2,
                ready: vec![4, 5, 6, 7, 8]
            })
        );
    }

    #[test]
    fn test_idle_only_when_empty() {
        let mut gate = gate();
        let start = Instant::now();
        gate.offer(1, 1, start);
        gate.offer(3, 3, start);
        let later = start + Duration::from_secs(60);
        assert!(!gate.is_idle(later, Duration::from_secs(30)));

        gate.offer(2, 2, start);
        assert!(gate.is_idle(later, Duration::from_secs(30)));
        assert!(!gate.is_idle(start + Duration::from_secs(10), Duration::from_secs(30)));
    }
}

// Global event scheduler. Every periodic or one-shot hardware event (Compare
// timer, AI/VI/SI/PI DMA completion, RSP halt, RDP full sync) is represented
// as an event that fires at an absolute cycle count rather than being
// polled each tick.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CpuCompare,
    ViVblank,
    AiDma,
    PiDma,
    SiDma,
    SpDma,
    RspStep,
    RdpFullSync,
}

struct Event {
    kind: EventKind,
    fire_at: u64,
    seq: u64,
}

/// Priority queue keyed by fire cycle, FIFO among ties. A `Vec` kept sorted
/// by insertion is adequate here: the event count is small (single digits)
/// and `run_until` is called once per CPU step, so a binary heap buys
/// nothing but complexity.
pub struct Scheduler {
    events: VecDeque<Event>,
    next_seq: u64,
    pub clock: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler { events: VecDeque::new(), next_seq: 0, clock: 0 }
    }

    pub fn add_event(&mut self, kind: EventKind, fire_at: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let pos = self
            .events
            .iter()
            .position(|e| e.fire_at > fire_at)
            .unwrap_or(self.events.len());
        self.events.insert(pos, Event { kind, fire_at, seq });
    }

    /// Reschedules the first pending event of `kind`, if any, preserving its
    /// FIFO position relative to other events at the new fire time.
    pub fn change_event_time(&mut self, kind: EventKind, new_fire_at: u64) {
        if let Some(idx) = self.events.iter().position(|e| e.kind == kind) {
            self.events.remove(idx);
            self.add_event(kind, new_fire_at);
        }
    }

    pub fn remove_event(&mut self, kind: EventKind) {
        self.events.retain(|e| e.kind != kind);
    }

    pub fn has_event(&self, kind: EventKind) -> bool {
        self.events.iter().any(|e| e.kind == kind)
    }

    /// Pops and returns every event whose fire time is at or before `clock`,
    /// in non-decreasing fire-time order with FIFO tie-breaking. Only events
    /// already pending at entry are considered, so an event handler that
    /// schedules a new event for the same or an earlier cycle does not get
    /// processed in the same `run_until` call (reentrancy safety per the
    /// scheduler contract).
    pub fn run_until(&mut self, clock: u64) -> Vec<EventKind> {
        self.clock = clock;
        let ready_seq_cutoff = self.next_seq;
        let mut fired = Vec::new();
        loop {
            match self.events.front() {
                Some(e) if e.fire_at <= clock && e.seq < ready_seq_cutoff => {
                    let e = self.events.pop_front().unwrap();
                    fired.push(e.kind);
                }
                _ => break,
            }
        }
        fired
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_nondecreasing_order() {
        let mut s = Scheduler::new();
        s.add_event(EventKind::AiDma, 100);
        s.add_event(EventKind::PiDma, 50);
        s.add_event(EventKind::SiDma, 50);
        let fired = s.run_until(200);
        assert_eq!(fired, vec![EventKind::PiDma, EventKind::SiDma, EventKind::AiDma]);
    }

    #[test]
    fn leaves_future_events_pending() {
        let mut s = Scheduler::new();
        s.add_event(EventKind::CpuCompare, 1000);
        assert!(s.run_until(10).is_empty());
        assert!(s.has_event(EventKind::CpuCompare));
    }

    #[test]
    fn reschedule_moves_without_duplicating() {
        let mut s = Scheduler::new();
        s.add_event(EventKind::CpuCompare, 1000);
        s.change_event_time(EventKind::CpuCompare, 10);
        let fired = s.run_until(10);
        assert_eq!(fired, vec![EventKind::CpuCompare]);
        assert!(!s.has_event(EventKind::CpuCompare));
    }

    #[test]
    fn events_added_during_run_until_wait_for_next_call() {
        let mut s = Scheduler::new();
        s.add_event(EventKind::SpDma, 5);
        let fired = s.run_until(5);
        assert_eq!(fired, vec![EventKind::SpDma]);
        s.add_event(EventKind::SpDma, 5);
        assert!(s.has_event(EventKind::SpDma));
    }
}

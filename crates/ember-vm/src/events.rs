//! Host event queue and timers
//!
//! Timers fire by pushing [`Event::ResumeFiber`] onto the [`EventQueue`],
//! which the VM drains before every instruction. Time comes from a
//! [`Clock`]: [`SystemClock`] sleeps for real, [`VirtualClock`] jumps
//! straight to the next deadline so tests stay fast and deterministic.

use crate::value::ObjRef;
use slotmap::{new_key_type, SlotMap};
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Host message handled at the next safe point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Put a parked fiber back on top of the current one
    ResumeFiber(ObjRef),
    /// Run a collection at the next safe point
    CollectGarbage,
}

#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Fibers referenced by queued events
    pub fn fibers(&self) -> impl Iterator<Item = ObjRef> + '_ {
        self.events.iter().filter_map(|event| match event {
            Event::ResumeFiber(fiber) => Some(*fiber),
            Event::CollectGarbage => None,
        })
    }
}

/// Monotonic time source
pub trait Clock {
    /// Time elapsed since the clock started
    fn now(&self) -> Duration;

    /// Block until `now() >= deadline`
    fn sleep_until(&mut self, deadline: Duration);
}

/// Wall clock backed by [`Instant`]
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep_until(&mut self, deadline: Duration) {
        let now = self.now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

/// Manually driven clock; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    now: Rc<Cell<Duration>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn elapsed(&self) -> Duration {
        self.now.get()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep_until(&mut self, deadline: Duration) {
        if deadline > self.now.get() {
            self.now.set(deadline);
        }
    }
}

new_key_type! {
    /// Handle to a pending timer
    pub struct TimerKey;
}

#[derive(Debug)]
struct Timer {
    deadline: Duration,
    /// Creation order, breaks ties between equal deadlines
    sequence: u64,
    fiber: ObjRef,
}

/// Registry of pending one-shot timers
pub struct Timers {
    clock: Box<dyn Clock>,
    pending: SlotMap<TimerKey, Timer>,
    next_sequence: u64,
}

impl Timers {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self {
            clock,
            pending: SlotMap::with_key(),
            next_sequence: 0,
        }
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Schedule `fiber` to be resumed after `delay`; deadlines past the
    /// clock's range saturate
    pub fn start(&mut self, delay: Duration, fiber: ObjRef) -> TimerKey {
        let deadline = self
            .clock
            .now()
            .checked_add(delay)
            .unwrap_or(Duration::MAX);
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.pending.insert(Timer {
            deadline,
            sequence,
            fiber,
        })
    }

    /// Number of timers that have not fired yet
    pub fn active(&self) -> usize {
        self.pending.len()
    }

    /// Fire every expired timer, oldest deadline first; returns how many fired
    pub fn poll(&mut self, queue: &mut EventQueue) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let now = self.clock.now();
        let mut expired: Vec<(Duration, u64, TimerKey)> = self
            .pending
            .iter()
            .filter(|(_, timer)| timer.deadline <= now)
            .map(|(key, timer)| (timer.deadline, timer.sequence, key))
            .collect();
        expired.sort_unstable();

        for (_, _, key) in &expired {
            if let Some(timer) = self.pending.remove(*key) {
                queue.push(Event::ResumeFiber(timer.fiber));
            }
        }
        expired.len()
    }

    /// Block until the earliest timer is due, then fire what expired
    pub fn wait(&mut self, queue: &mut EventQueue) -> usize {
        let next = self.pending.values().map(|timer| timer.deadline).min();
        if let Some(deadline) = next {
            self.clock.sleep_until(deadline);
        }
        self.poll(queue)
    }

    /// Cancel every pending timer
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Fibers waiting on a timer
    pub fn fibers(&self) -> impl Iterator<Item = ObjRef> + '_ {
        self.pending.values().map(|timer| timer.fiber)
    }
}

impl std::fmt::Debug for Timers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timers")
            .field("now", &self.clock.now())
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fiber(n: u32) -> ObjRef {
        ObjRef::new(n, 0)
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let clock = VirtualClock::new();
        let mut timers = Timers::new(Box::new(clock.clone()));
        let mut queue = EventQueue::new();

        timers.start(Duration::from_millis(30), fiber(1));
        timers.start(Duration::from_millis(10), fiber(2));
        timers.start(Duration::from_millis(10), fiber(3));

        assert_eq!(timers.poll(&mut queue), 0);
        clock.advance(Duration::from_millis(15));
        assert_eq!(timers.poll(&mut queue), 2);
        assert_eq!(queue.pop(), Some(Event::ResumeFiber(fiber(2))));
        assert_eq!(queue.pop(), Some(Event::ResumeFiber(fiber(3))));
        assert_eq!(timers.active(), 1);
    }

    #[test]
    fn test_wait_jumps_virtual_clock_to_deadline() {
        let clock = VirtualClock::new();
        let mut timers = Timers::new(Box::new(clock.clone()));
        let mut queue = EventQueue::new();

        timers.start(Duration::from_millis(250), fiber(7));
        assert_eq!(timers.wait(&mut queue), 1);
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
        assert_eq!(queue.fibers().collect::<Vec<_>>(), vec![fiber(7)]);
        assert_eq!(timers.active(), 0);
    }

    #[test]
    fn test_deadline_saturates_instead_of_overflowing() {
        let clock = VirtualClock::new();
        clock.advance(Duration::from_secs(1));
        let mut timers = Timers::new(Box::new(clock.clone()));
        let mut queue = EventQueue::new();

        timers.start(Duration::MAX, fiber(4));
        assert_eq!(timers.poll(&mut queue), 0);
        assert_eq!(timers.active(), 1);
    }

    #[test]
    fn test_system_clock_sleeps() {
        let mut clock = SystemClock::new();
        clock.sleep_until(Duration::from_millis(5));
        assert!(clock.now() >= Duration::from_millis(5));
    }
}

//! Deterministic single-shot timers driven by explicit elapsed time.
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Identifies a scheduled event until it fires or is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// Queue of pending events ordered by due time, then by scheduling order.
///
/// Time only moves through [`TimerQueue::advance`], so hosts decide where the
/// clock comes from (a UI frame loop, a test, a simulation).
#[derive(Debug)]
pub struct TimerQueue<E> {
    now: Duration,
    next_id: u64,
    pending: BTreeMap<(Duration, u64), E>,
    due_at: HashMap<u64, Duration>,
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> TimerQueue<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            pending: BTreeMap::new(),
            due_at: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, delay: Duration, event: E) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        let due = self.now.saturating_add(delay);
        self.pending.insert((due, id), event);
        self.due_at.insert(id, due);
        TimerHandle(id)
    }

    /// Drop a pending event. Returns it if it had not fired yet.
    pub fn cancel(&mut self, handle: TimerHandle) -> Option<E> {
        let due = self.due_at.remove(&handle.0)?;
        self.pending.remove(&(due, handle.0))
    }

    #[must_use]
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.due_at.contains_key(&handle.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Time elapsed since the queue was created.
    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Move time forward and return every event that became due, earliest
    /// first.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<E> {
        self.now = self.now.saturating_add(elapsed);
        let mut fired = Vec::new();
        while let Some(entry) = self.pending.first_entry() {
            let (due, id) = *entry.key();
            if due > self.now {
                break;
            }
            self.due_at.remove(&id);
            fired.push(entry.remove());
        }
        fired
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.due_at.clear();
    }
}

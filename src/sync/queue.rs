//! Bounded blocking FIFO

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::{QueueError, Rejected};

#[derive(Debug)]
struct State<T> {
    items: VecDeque<T>,
    enabled: bool,
}

/// Fixed-capacity queue shared between producer and consumer threads.
///
/// `put` blocks while the queue is full and `get` while it is empty.
/// Disabling the queue wakes every waiter; until it is enabled again all
/// blocking and non-blocking calls fail with [`QueueError::Disabled`].
#[derive(Debug)]
pub struct BoundedQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Enabled queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::bad_parameters("capacity must be positive"));
        }
        let mut items = VecDeque::new();
        items
            .try_reserve_exact(capacity)
            .map_err(QueueError::allocation)?;
        Ok(Self {
            state: Mutex::new(State { items, enabled: true }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        })
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items currently queued.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// No item queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Accepting `put` and `get`.
    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Switch the queue on or off. Turning it off wakes all blocked
    /// producers and consumers; queued items are kept.
    pub fn enable(&self, enabled: bool) {
        let mut state = self.lock();
        if state.enabled == enabled {
            return;
        }
        state.enabled = enabled;
        drop(state);
        debug!(enabled, "queue state changed");
        if !enabled {
            self.not_empty.notify_all();
            self.not_full.notify_all();
        }
    }

    /// Append `item`, waiting up to `timeout` for room (`None` waits
    /// indefinitely). On failure the item is handed back.
    pub fn put(&self, item: T, timeout: Option<Duration>) -> Result<(), Rejected<T>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.lock();
        loop {
            if !state.enabled {
                return Err(Rejected::new(item, QueueError::Disabled));
            }
            if state.items.len() < self.capacity {
                break;
            }
            state = match self.wait(&self.not_full, state, deadline) {
                Some(state) => state,
                None => {
                    trace!("put timed out");
                    return Err(Rejected::new(item, QueueError::Timeout));
                }
            };
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Append `item` only if there is room right now.
    pub fn try_put(&self, item: T) -> Result<(), Rejected<T>> {
        let mut state = self.lock();
        if !state.enabled {
            return Err(Rejected::new(item, QueueError::Disabled));
        }
        if state.items.len() >= self.capacity {
            return Err(Rejected::new(item, QueueError::Full));
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Take the oldest item, waiting up to `timeout` for one (`None`
    /// waits indefinitely).
    pub fn get(&self, timeout: Option<Duration>) -> Result<T, QueueError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.lock();
        loop {
            if !state.enabled {
                return Err(QueueError::Disabled);
            }
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Ok(item);
            }
            state = match self.wait(&self.not_empty, state, deadline) {
                Some(state) => state,
                None => {
                    trace!("get timed out");
                    return Err(QueueError::Timeout);
                }
            };
        }
    }

    /// Take the oldest item if there is one.
    pub fn try_get(&self) -> Result<T, QueueError> {
        let mut state = self.lock();
        if !state.enabled {
            return Err(QueueError::Disabled);
        }
        let item = state.items.pop_front().ok_or(QueueError::Empty)?;
        drop(state);
        self.not_full.notify_one();
        Ok(item)
    }

    /// Block on `condvar` until notified or `deadline` passes. `None` once
    /// the deadline is over.
    fn wait<'a>(
        &self,
        condvar: &Condvar,
        guard: MutexGuard<'a, State<T>>,
        deadline: Option<Instant>,
    ) -> Option<MutexGuard<'a, State<T>>> {
        match deadline {
            None => Some(condvar.wait(guard).unwrap_or_else(|e| e.into_inner())),
            Some(deadline) => {
                let remaining = deadline.checked_duration_since(Instant::now())?;
                if remaining.is_zero() {
                    return None;
                }
                let (guard, _) = condvar
                    .wait_timeout(guard, remaining)
                    .unwrap_or_else(|e| e.into_inner());
                // Re-check the state before reporting a timeout.
                Some(guard)
            }
        }
    }

    /// The state stays consistent across a panicking holder, so a poisoned
    /// lock is recovered rather than propagated.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_single_thread() {
        let queue = BoundedQueue::new(3).unwrap();
        for i in 0..3 {
            queue.try_put(i).unwrap();
        }
        let rejected = queue.try_put(3).unwrap_err();
        assert_eq!(rejected.item, 3);
        assert_eq!(rejected.reason, QueueError::Full);

        assert_eq!(queue.try_get(), Ok(0));
        assert_eq!(queue.get(None), Ok(1));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            BoundedQueue::<u8>::new(0),
            Err(QueueError::BadParameters(_))
        ));
    }

    #[test]
    fn test_timeouts() {
        let queue = BoundedQueue::new(1).unwrap();
        assert_eq!(queue.get(Some(Duration::from_millis(10))), Err(QueueError::Timeout));
        queue.put('a', None).unwrap();
        let rejected = queue.put('b', Some(Duration::ZERO)).unwrap_err();
        assert_eq!(rejected.reason, QueueError::Timeout);
        assert_eq!(rejected.into_inner(), 'b');
    }

    #[test]
    fn test_disable_keeps_items() {
        let queue = BoundedQueue::new(2).unwrap();
        queue.put(7, None).unwrap();
        queue.enable(false);
        assert!(!queue.is_enabled());
        assert_eq!(queue.get(None), Err(QueueError::Disabled));
        assert_eq!(queue.try_put(8).unwrap_err().reason, QueueError::Disabled);

        queue.enable(true);
        assert_eq!(queue.get(None), Ok(7));
    }
}

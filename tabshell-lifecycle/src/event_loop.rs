//! Deferred single-threaded task queue.
//!
//! [`EventLoop`] holds tasks keyed by their due time on a virtual clock. The
//! owner advances the clock (from a real timer or, in tests, by hand) and
//! pops due tasks one at a time. Tasks posted while another task is being
//! handled are never run in the same turn, so a zero-delay post means "on
//! the next turn of the loop".
//!
//! [`LoopHandle`] is the cheap, clonable posting side handed to controllers
//! and hosts. It only borrows the queue for the duration of a post, so it is
//! safe to post from inside task handlers.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

struct Queue<T> {
    /// Virtual time elapsed since the loop was created.
    now: Duration,
    /// Tie-breaker keeping FIFO order among tasks with the same deadline.
    next_seq: u64,
    pending: BTreeMap<(Duration, u64), T>,
}

impl<T> Queue<T> {
    fn push(&mut self, delay: Duration, task: T) {
        let due = self.now + delay;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert((due, seq), task);
    }

    fn discard(&mut self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, task| !predicate(task));
        before - self.pending.len()
    }
}

/// Owning side of the deferred task queue.
pub struct EventLoop<T> {
    queue: Rc<RefCell<Queue<T>>>,
}

/// Posting side of an [`EventLoop`].
pub struct LoopHandle<T> {
    queue: Rc<RefCell<Queue<T>>>,
}

impl<T> Clone for LoopHandle<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Rc::clone(&self.queue),
        }
    }
}

impl<T> Default for EventLoop<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventLoop<T> {
    /// Create an empty loop with its virtual clock at zero.
    pub fn new() -> Self {
        Self {
            queue: Rc::new(RefCell::new(Queue {
                now: Duration::ZERO,
                next_seq: 0,
                pending: BTreeMap::new(),
            })),
        }
    }

    /// A handle for posting tasks to this loop.
    pub fn handle(&self) -> LoopHandle<T> {
        LoopHandle {
            queue: Rc::clone(&self.queue),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.queue.borrow().now
    }

    /// Move the clock forward by `by`.
    pub fn advance_by(&self, by: Duration) {
        self.queue.borrow_mut().now += by;
    }

    /// Move the clock to `to`. The clock never runs backwards.
    pub fn advance_to(&self, to: Duration) {
        let mut queue = self.queue.borrow_mut();
        if to > queue.now {
            queue.now = to;
        }
    }

    /// Deadline of the earliest queued task, if any.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue
            .borrow()
            .pending
            .keys()
            .next()
            .map(|(due, _)| *due)
    }

    /// Remove and return the earliest task whose deadline has passed.
    pub fn pop_ready(&self) -> Option<T> {
        let mut queue = self.queue.borrow_mut();
        let now = queue.now;
        match queue.pending.first_key_value() {
            Some(((due, _), _)) if *due <= now => queue.pending.pop_first().map(|(_, task)| task),
            _ => None,
        }
    }

    /// Number of queued tasks, due or not.
    pub fn len(&self) -> usize {
        self.queue.borrow().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every queued task matching `predicate`.
    ///
    /// Used when the target of the tasks is destroyed.
    pub fn discard(&self, predicate: impl FnMut(&T) -> bool) -> usize {
        self.queue.borrow_mut().discard(predicate)
    }
}

impl<T> LoopHandle<T> {
    /// Run `task` on the next turn of the loop.
    pub fn post(&self, task: T) {
        self.queue.borrow_mut().push(Duration::ZERO, task);
    }

    /// Run `task` once `delay` has elapsed on the loop's clock.
    pub fn post_delayed(&self, task: T, delay: Duration) {
        self.queue.borrow_mut().push(delay, task);
    }

    /// Drop queued tasks matching `predicate` that have not run yet.
    pub fn discard(&self, predicate: impl FnMut(&T) -> bool) -> usize {
        self.queue.borrow_mut().discard(predicate)
    }

    /// Current virtual time of the loop this handle posts to.
    pub fn now(&self) -> Duration {
        self.queue.borrow().now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_delay_tasks_run_in_post_order() {
        let event_loop = EventLoop::new();
        let handle = event_loop.handle();
        handle.post("a");
        handle.post("b");
        assert_eq!(event_loop.pop_ready(), Some("a"));
        assert_eq!(event_loop.pop_ready(), Some("b"));
        assert_eq!(event_loop.pop_ready(), None);
    }

    #[test]
    fn test_delayed_task_waits_for_clock() {
        let event_loop = EventLoop::new();
        let handle = event_loop.handle();
        handle.post_delayed(1, Duration::from_millis(200));
        handle.post(0);

        assert_eq!(event_loop.pop_ready(), Some(0));
        assert_eq!(event_loop.pop_ready(), None);
        assert_eq!(event_loop.next_deadline(), Some(Duration::from_millis(200)));

        event_loop.advance_by(Duration::from_millis(199));
        assert_eq!(event_loop.pop_ready(), None);
        event_loop.advance_by(Duration::from_millis(1));
        assert_eq!(event_loop.pop_ready(), Some(1));
        assert!(event_loop.is_empty());
    }

    #[test]
    fn test_clock_never_runs_backwards() {
        let event_loop: EventLoop<()> = EventLoop::new();
        event_loop.advance_to(Duration::from_secs(2));
        event_loop.advance_to(Duration::from_secs(1));
        assert_eq!(event_loop.now(), Duration::from_secs(2));
    }

    #[test]
    fn test_discard_drops_matching_tasks() {
        let event_loop = EventLoop::new();
        let handle = event_loop.handle();
        for n in 0..5 {
            handle.post(n);
        }
        assert_eq!(event_loop.discard(|n| n % 2 == 0), 3);
        assert_eq!(event_loop.pop_ready(), Some(1));
        assert_eq!(event_loop.pop_ready(), Some(3));
    }

    #[test]
    fn test_handle_discards_queued_tasks() {
        let event_loop = EventLoop::new();
        let handle = event_loop.handle();
        handle.post_delayed("deadline", Duration::from_secs(1));
        handle.post("reply");
        assert_eq!(handle.discard(|task| *task == "deadline"), 1);
        event_loop.advance_by(Duration::from_secs(2));
        assert_eq!(event_loop.pop_ready(), Some("reply"));
        assert_eq!(event_loop.pop_ready(), None);
    }
}

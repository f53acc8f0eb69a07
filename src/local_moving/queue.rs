//! Shared work queue of nodes awaiting (re-)evaluation

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

struct QueueState {
    /// Nodes waiting to be evaluated, oldest first
    items: VecDeque<usize>,

    /// Batches popped whose re-enqueue set has not been pushed yet
    in_flight: usize,

    /// Set when a worker unwinds; waiters stop instead of blocking forever
    aborted: bool,
}

/// Multiset of node indices shared by all workers of a pass
///
/// The queue is drained only when it holds no items and no worker holds an
/// unfinished batch. Both conditions are read under one lock, so a worker
/// between popping and pushing back its re-enqueue set keeps the pass alive.
pub struct WorkQueue {
    state: Mutex<QueueState>,

    /// Signalled on every push and whenever the last in-flight batch finishes
    signal: Condvar,

    /// Per-node "waiting in the queue" flags, best effort
    pending: Vec<AtomicBool>,
}

impl WorkQueue {
    /// Create an empty queue for a network with `node_count` nodes
    pub fn new(node_count: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(node_count),
                in_flight: 0,
                aborted: false,
            }),
            signal: Condvar::new(),
            pending: (0..node_count).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    // Critical sections never panic, so a poisoned lock still guards a
    // consistent state.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert the initial visiting order; called once before workers start
    pub fn seed(&self, order: &[usize]) {
        self.push_all(order);
    }

    /// Append items to the back of the queue
    pub fn push_all(&self, items: &[usize]) {
        if items.is_empty() {
            return;
        }
        let mut state = self.lock();
        self.enqueue(&mut state, items);
        drop(state);
        self.signal.notify_all();
    }

    fn enqueue(&self, state: &mut QueueState, items: &[usize]) {
        for &node in items {
            self.pending[node].store(true, Ordering::Release);
        }
        state.items.extend(items.iter().copied());
    }

    fn take(&self, state: &mut QueueState, max_count: usize) -> Vec<usize> {
        let count = max_count.min(state.items.len());
        let nodes: Vec<usize> = state.items.drain(..count).collect();
        for &node in &nodes {
            self.pending[node].store(false, Ordering::Release);
        }
        state.in_flight += 1;
        nodes
    }

    /// Remove up to `max_count` items without blocking
    ///
    /// Returns `None` when the queue is empty. The batch counts as in flight
    /// until it is completed or dropped.
    pub fn pop_batch(&self, max_count: usize) -> Option<Batch<'_>> {
        let mut state = self.lock();
        if state.items.is_empty() || max_count == 0 {
            return None;
        }
        let nodes = self.take(&mut state, max_count);
        Some(Batch { queue: self, nodes, released: false })
    }

    /// Remove up to `max_count` items, waiting while the queue is empty but
    /// other batches are still in flight
    ///
    /// Returns `None` once the queue is drained or aborted.
    pub fn wait_for_batch(&self, max_count: usize) -> Option<Batch<'_>> {
        let mut state = self.lock();
        loop {
            if state.aborted || max_count == 0 {
                return None;
            }
            if !state.items.is_empty() {
                let nodes = self.take(&mut state, max_count);
                return Some(Batch { queue: self, nodes, released: false });
            }
            if state.in_flight == 0 {
                return None;
            }
            state = self.signal.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Whether the queue currently holds no items
    ///
    /// Batches in flight are ignored; use `is_drained` for termination.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Number of batches popped but not yet completed
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Whether a node is waiting in the queue
    pub fn is_pending(&self, node: usize) -> bool {
        self.pending[node].load(Ordering::Acquire)
    }

    /// Empty with no batch in flight
    pub fn is_drained(&self) -> bool {
        let state = self.lock();
        state.items.is_empty() && state.in_flight == 0
    }

    /// Block until the queue is drained or aborted; returns `true` on drain
    pub fn wait_until_drained(&self) -> bool {
        let mut state = self.lock();
        while !state.aborted && !(state.items.is_empty() && state.in_flight == 0) {
            state = self.signal.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        !state.aborted
    }

    /// Stop the pass: wake every waiter and refuse further batches
    pub fn abort(&self) {
        self.lock().aborted = true;
        self.signal.notify_all();
    }

    /// Whether `abort` was called
    pub fn is_aborted(&self) -> bool {
        self.lock().aborted
    }

    fn release(&self, requeue: &[usize]) {
        let mut state = self.lock();
        self.enqueue(&mut state, requeue);
        state.in_flight -= 1;
        drop(state);
        self.signal.notify_all();
    }
}

/// Nodes popped from a `WorkQueue`
///
/// Holds one in-flight slot. `complete` pushes the re-enqueue set and frees
/// the slot atomically; dropping an uncompleted batch (including during a
/// panic) frees the slot without pushing anything.
pub struct Batch<'a> {
    queue: &'a WorkQueue,
    nodes: Vec<usize>,
    released: bool,
}

impl<'a> Batch<'a> {
    /// The popped nodes
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    /// Push the nodes that need re-evaluation and finish the batch
    pub fn complete(mut self, requeue: &[usize]) {
        self.released = true;
        self.queue.release(requeue);
    }
}

impl Drop for Batch<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.queue.release(&[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_fifo_order_up_to_batch_size() {
        let queue = WorkQueue::new(10);
        queue.seed(&[4, 2, 7, 1, 9]);

        let first = queue.pop_batch(3).unwrap();
        assert_eq!(first.nodes(), &[4, 2, 7]);
        assert!(!queue.is_pending(4));
        assert!(queue.is_pending(1));
        first.complete(&[]);

        let second = queue.pop_batch(3).unwrap();
        assert_eq!(second.nodes(), &[1, 9]);
        second.complete(&[]);

        assert!(queue.pop_batch(3).is_none());
        assert!(queue.is_drained());
    }

    #[test]
    fn in_flight_batch_blocks_drain() {
        let queue = WorkQueue::new(4);
        queue.seed(&[0, 1]);

        let batch = queue.pop_batch(7).unwrap();
        assert!(queue.is_empty());
        assert!(!queue.is_drained());
        assert_eq!(queue.in_flight(), 1);

        batch.complete(&[3]);
        assert!(!queue.is_drained());
        assert!(queue.is_pending(3));

        let batch = queue.pop_batch(7).unwrap();
        assert_eq!(batch.nodes(), &[3]);
        drop(batch);
        assert!(queue.is_drained());
        assert_eq!(queue.in_flight(), 0);
    }

    #[test]
    fn panicking_holder_releases_its_batch() {
        let queue = WorkQueue::new(3);
        queue.seed(&[0, 1, 2]);

        let outcome = crossbeam::thread::scope(|scope| {
            scope.spawn(|_| {
                let _batch = queue.pop_batch(3).unwrap();
                panic!("worker failure");
            })
            .join()
        })
        .unwrap();

        assert!(outcome.is_err());
        assert_eq!(queue.in_flight(), 0);
        assert!(queue.is_drained());
    }

    #[test]
    fn concurrent_pops_neither_lose_nor_duplicate() {
        let n = 10_000;
        let queue = WorkQueue::new(n);
        let order: Vec<usize> = (0..n).collect();
        queue.seed(&order);
        let requeued: Vec<AtomicBool> = (0..n).map(|_| AtomicBool::new(false)).collect();

        let mut seen: Vec<usize> = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let queue = &queue;
                    let requeued = &requeued;
                    scope.spawn(move |_| {
                        let mut local = Vec::new();
                        while let Some(batch) = queue.wait_for_batch(7) {
                            local.extend_from_slice(batch.nodes());
                            // every multiple of 1000 goes back exactly once
                            let again: Vec<usize> = batch.nodes().iter()
                                .copied()
                                .filter(|&node| node % 1000 == 0 && !requeued[node].swap(true, Ordering::SeqCst))
                                .collect();
                            batch.complete(&again);
                        }
                        local
                    })
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        })
        .unwrap();

        seen.sort_unstable();
        let mut expected: Vec<usize> = (0..n).collect();
        expected.extend((0..n).step_by(1000));
        expected.sort_unstable();
        assert_eq!(seen, expected);
        assert!(queue.is_drained());
    }

    #[test]
    fn abort_wakes_waiters() {
        let queue = WorkQueue::new(2);
        queue.seed(&[0, 1]);
        let held = queue.pop_batch(1).unwrap();

        queue.abort();
        assert!(queue.wait_for_batch(1).is_none());
        assert!(!queue.wait_until_drained());
        drop(held);
        assert!(queue.is_aborted());
    }
}

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A queued path tagged with its insertion index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub index: usize,
    pub path: PathBuf,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<WorkItem>,
    next_index: usize,
}

/// Bounded multi-producer, multi-consumer queue of file paths.
#[derive(Debug)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a path, blocking while the queue is full. Returns the
    /// insertion index.
    pub fn push(&self, path: PathBuf) -> usize {
        let mut state = self.lock();
        while state.items.len() >= self.capacity {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        self.append(state, path)
    }

    /// Like [`push`](Self::push), but hands the path back if no space frees
    /// up within `timeout`.
    pub fn push_timeout(&self, path: PathBuf, timeout: Duration) -> Result<usize, PathBuf> {
        let state = self.lock();
        let (state, _) = self
            .not_full
            .wait_timeout_while(state, timeout, |s| s.items.len() >= self.capacity)
            .unwrap_or_else(PoisonError::into_inner);

        if state.items.len() >= self.capacity {
            return Err(path);
        }
        Ok(self.append(state, path))
    }

    /// Puts an item back at the front with its original index. Never blocks,
    /// so the queue may briefly hold more than `capacity` items.
    pub fn requeue(&self, item: WorkItem) {
        self.lock().items.push_front(item);
        self.not_empty.notify_one();
    }

    fn append(&self, mut state: MutexGuard<'_, QueueState>, path: PathBuf) -> usize {
        let index = state.next_index;
        state.next_index += 1;
        state.items.push_back(WorkItem { index, path });
        drop(state);

        self.not_empty.notify_one();
        index
    }

    /// Takes the oldest item, waiting up to `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<WorkItem> {
        let state = self.lock();
        let (mut state, _) = self
            .not_empty
            .wait_timeout_while(state, timeout, |s| s.items.is_empty())
            .unwrap_or_else(PoisonError::into_inner);

        let item = state.items.pop_front();
        drop(state);

        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Takes the oldest item without waiting.
    pub fn try_pop(&self) -> Option<WorkItem> {
        let item = self.lock().items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Set once by the producer after its last push.
#[derive(Debug, Default)]
pub struct CompletionSignal {
    done: AtomicBool,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks input as finished. Returns `false` if it was already set.
    pub fn set(&self) -> bool {
        !self.done.swap(true, Ordering::SeqCst)
    }

    pub fn is_set(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

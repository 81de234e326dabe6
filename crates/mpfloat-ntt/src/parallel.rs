//! Parallel runner primitives and the carry-CRT rendezvous.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::{Condvar, Mutex};

/// Fan contiguous bands of `rows` rows (each `row_len` elements) of a
/// slice out across up to `threads` rayon tasks.
///
/// The worker receives the index of its first row and the band slice.
/// With `threads <= 1` the work runs in the calling thread.
pub fn split_rows<T, F>(data: &mut [T], row_len: usize, threads: usize, work: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync,
{
    debug_assert_eq!(data.len() % row_len.max(1), 0);
    let rows = data.len() / row_len.max(1);
    if threads <= 1 || rows <= 1 {
        work(0, data);
        return;
    }

    let bands = threads.min(rows);
    let per_band = rows.div_ceil(bands);

    rayon::scope(|scope| {
        let mut rest = data;
        let mut first_row = 0;
        while !rest.is_empty() {
            let take = (per_band * row_len).min(rest.len());
            let (band, tail) = rest.split_at_mut(take);
            rest = tail;
            let row = first_row;
            first_row += take / row_len;
            let work = &work;
            scope.spawn(move |_| work(row, band));
        }
    });
}

/// Run `count` interdependent block workers on dedicated scoped threads.
///
/// Unlike a work-stealing pool, every block is guaranteed its own thread,
/// so workers may block on [`MessagePasser::receive_message`] waiting for
/// an earlier block without risk of starving it. With `count == 1` the
/// single block runs in the calling thread.
pub fn run_blocks<F>(count: usize, work: F)
where
    F: Fn(usize) + Sync,
{
    if count <= 1 {
        work(0);
        return;
    }
    std::thread::scope(|scope| {
        for index in 1..count {
            let work = &work;
            scope.spawn(move || work(index));
        }
        work(0);
    });
}

/// One-shot rendezvous map: exactly one send per key, receives block
/// until the matching send has run.
pub struct MessagePasser<K, V> {
    messages: Mutex<HashMap<K, V>>,
    arrived: Condvar,
}

impl<K: Eq + Hash + Clone, V> MessagePasser<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(HashMap::new()),
            arrived: Condvar::new(),
        }
    }

    /// Deliver `value` under `key`. Panics on a duplicate send: each key
    /// is a one-shot rendezvous.
    pub fn send_message(&self, key: K, value: V) {
        let previous = self.messages.lock().insert(key, value);
        assert!(previous.is_none(), "duplicate send for message key");
        self.arrived.notify_all();
    }

    /// Take the message for `key`, blocking until it has been sent.
    pub fn receive_message(&self, key: &K) -> V {
        let mut messages = self.messages.lock();
        loop {
            if let Some(value) = messages.remove(key) {
                return value;
            }
            self.arrived.wait(&mut messages);
        }
    }

    /// Take the message for `key` if it has already arrived.
    pub fn get_message(&self, key: &K) -> Option<V> {
        self.messages.lock().remove(key)
    }
}

impl<K: Eq + Hash + Clone, V> Default for MessagePasser<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

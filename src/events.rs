// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::Arc;

use parking_lot::Mutex;

/// Listener callback for an event carrying a `T`.
pub type Listener<T> = Box<dyn Fn(T) + Send + Sync>;

/// A list of listeners for one kind of notification. Listeners run on the
/// thread that emits, in subscription order.
pub struct Event<T> {
    listeners: Mutex<Vec<Listener<T>>>,
}

impl<T: Copy> Event<T> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Adds a listener. Must not be called from inside a listener.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.listeners.lock().push(Box::new(listener));
    }

    /// Delivers `value` to every listener.
    pub fn emit(&self, value: T) {
        for listener in self.listeners.lock().iter() {
            listener(value);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl<T: Copy> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide notifications.
#[derive(Default)]
pub struct Events {
    /// The audio block size changed; carries the new frame count.
    pub block_size_changed: Event<usize>,
}

impl Events {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_emit_reaches_all_listeners() {
        let events = Events::new();
        let total = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let total = total.clone();
            events
                .block_size_changed
                .subscribe(move |size| {
                    total.fetch_add(size, Ordering::SeqCst);
                });
        }
        assert_eq!(events.block_size_changed.listener_count(), 3);

        events.block_size_changed.emit(128);
        assert_eq!(total.load(Ordering::SeqCst), 384);
    }
}

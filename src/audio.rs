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
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use tracing::{error, info};

use crate::events::Events;

pub mod cpal;

/// How often the callback size is checked.
const WATCH_INTERVAL: Duration = Duration::from_millis(100);

/// An output device as reported by the audio host.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub host: String,
    pub max_channels: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name, self.max_channels, self.host
        )
    }
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<DeviceInfo>, Box<dyn Error>> {
    cpal::list_devices()
}

/// Watches the frame count of the output callback and reports changes
/// through [`Events::block_size_changed`] on its own thread, keeping the
/// listeners off the audio thread.
pub struct BlockSizeWatcher {
    stop: Option<Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl BlockSizeWatcher {
    pub fn start(
        callback_frames: Arc<AtomicUsize>,
        events: Arc<Events>,
    ) -> Result<BlockSizeWatcher, Box<dyn Error>> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let join_handle = thread::Builder::new()
            .name("block-size-watcher".to_string())
            .spawn(move || {
                let mut last = 0;
                loop {
                    match stop_rx.recv_timeout(WATCH_INTERVAL) {
                        Err(RecvTimeoutError::Timeout) => {}
                        _ => return,
                    }
                    let frames = callback_frames.load(Ordering::Relaxed);
                    if frames > 0 && frames != last {
                        info!(from = last, to = frames, "Output block size changed");
                        last = frames;
                        events.block_size_changed.emit(frames);
                    }
                }
            })?;
        Ok(BlockSizeWatcher {
            stop: Some(stop_tx),
            join_handle: Some(join_handle),
        })
    }
}

impl Drop for BlockSizeWatcher {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                error!("Error joining block size watcher");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use crate::testutil::eventually;

    use super::*;

    #[test]
    fn test_block_size_watcher() {
        let callback_frames = Arc::new(AtomicUsize::new(0));
        let events = Events::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        events
            .block_size_changed
            .subscribe(move |frames| seen_clone.lock().push(frames));

        let watcher = BlockSizeWatcher::start(callback_frames.clone(), events.clone()).unwrap();
        callback_frames.store(512, Ordering::Relaxed);
        eventually(|| seen.lock().as_slice() == [512], "first size never reported");
        callback_frames.store(128, Ordering::Relaxed);
        eventually(|| seen.lock().as_slice() == [512, 128], "change never reported");
        drop(watcher);
        assert_eq!(seen.lock().len(), 2);
    }
}

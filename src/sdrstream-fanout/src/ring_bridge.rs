//! Bridges the blocking shared-ring reader (C10) into the async broadcast
//! channel the fan-out server's subscribers read from. Runs on its own OS
//! thread, not a tokio task: the ring reader's poll loop is blocking
//! application code, and the "OS threads for the core" rule keeps
//! cooperative tasks confined to the subscriber connections themselves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sdrstream_ring::{PollOutcome, RingReader};
use tokio::sync::broadcast;
use tracing::info;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

pub fn spawn(mut reader: RingReader, tx: broadcast::Sender<Arc<sdrstream_core::frame::SpectrumFrame>>) -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = stop.clone();
    std::thread::Builder::new()
        .name("sdrstream-ring-bridge".into())
        .spawn(move || {
            while !thread_stop.load(Ordering::Acquire) {
                match reader.poll() {
                    PollOutcome::Frame(frame) => {
                        let _ = tx.send(Arc::new(frame));
                    }
                    PollOutcome::Resynced { .. } => {}
                    PollOutcome::Idle => std::thread::sleep(POLL_INTERVAL),
                    PollOutcome::EndOfStream => {
                        info!("ring writer announced shutdown, stopping bridge");
                        break;
                    }
                }
            }
        })
        .expect("spawning ring bridge thread");
    stop
}

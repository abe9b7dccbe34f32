//! Status thread (T3): a low-frequency producer of a fixed 56-byte status
//! record, sent over the same outbound byte stream as spectrum frames but
//! never written into the spectrum ring.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub use sdrstream_core::status::{StatusRecord, STATUS_RECORD_LEN, STATUS_WIRE_MAGIC};

pub struct StatusThread {
    handle: Option<JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
}

impl StatusThread {
    /// Spawn the status thread at the given cadence (1-5 Hz per the spec);
    /// `emit` is called with each freshly built record. `stop_flag` is
    /// shared with the rest of the daemon's thread topology so a
    /// control-socket `STOP` (which sets the acquisition loop's flag)
    /// stops this thread too.
    pub fn spawn(
        interval: Duration,
        frame_counter: Arc<std::sync::atomic::AtomicU64>,
        overflow_counter: Arc<std::sync::atomic::AtomicU64>,
        emit: impl Fn(StatusRecord) + Send + 'static,
        stop_flag: Arc<AtomicBool>,
    ) -> Self {
        let thread_stop = stop_flag.clone();

        let handle = std::thread::Builder::new()
            .name("sdrstream-status".into())
            .spawn(move || {
                let start = std::time::Instant::now();
                while !thread_stop.load(Ordering::Acquire) {
                    let record = StatusRecord {
                        timestamp: start.elapsed().as_secs_f64(),
                        temperature_c: f32::NAN,
                        reference_locked: false,
                        frame_counter: frame_counter.load(Ordering::Relaxed),
                        overflow_count: overflow_counter.load(Ordering::Relaxed),
                    };
                    emit(record);
                    std::thread::sleep(interval);
                }
            })
            .expect("spawning status thread");

        StatusThread {
            handle: Some(handle),
            stop_flag,
        }
    }

    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatusThread {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::mpsc;

    #[test]
    fn status_thread_emits_on_the_configured_cadence() {
        let (tx, rx) = mpsc::channel();
        let frame_counter = Arc::new(AtomicU64::new(7));
        let overflow_counter = Arc::new(AtomicU64::new(0));
        let mut thread = StatusThread::spawn(
            Duration::from_millis(10),
            frame_counter,
            overflow_counter,
            move |record| {
                let _ = tx.send(record);
            },
            Arc::new(AtomicBool::new(false)),
        );
        let record = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(record.frame_counter, 7);
        thread.stop();
    }
}

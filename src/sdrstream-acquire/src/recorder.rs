//! IQ recorder (C7): a bounded pool of pre-allocated blocks shuttled
//! between a `free` queue and a `to_write` queue, so the consumer that
//! feeds the writer never allocates in the hot path and the writer never
//! stalls the producer. Modeled on the classic double-queue arena noted
//! in the design notes, built here with bounded lock-free MPMC queues.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;
use crossbeam_queue::ArrayQueue;
use sdrstream_core::frame::SampleBlock;

struct RecordBlock {
    samples: Vec<num_complex::Complex32>,
}

pub struct IqRecorder {
    consumer: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
    blocks_dropped: Arc<AtomicU64>,
    blocks_written: Arc<AtomicU64>,
    samples_target: Option<u64>,
    samples_written: Arc<AtomicUsize>,
}

impl IqRecorder {
    /// `pool_size` pre-allocated blocks, each able to hold up to
    /// `block_capacity` complex samples. `sample_target` bounds the
    /// recording length; `None` means "until stopped".
    pub fn spawn(
        rx: Receiver<Arc<SampleBlock>>,
        output_path: impl AsRef<Path>,
        pool_size: usize,
        block_capacity: usize,
        sample_target: Option<u64>,
    ) -> std::io::Result<Self> {
        let free: Arc<ArrayQueue<RecordBlock>> = Arc::new(ArrayQueue::new(pool_size));
        for _ in 0..pool_size {
            let _ = free.push(RecordBlock {
                samples: Vec::with_capacity(block_capacity),
            });
        }
        let to_write: Arc<ArrayQueue<RecordBlock>> = Arc::new(ArrayQueue::new(pool_size));

        let blocks_dropped = Arc::new(AtomicU64::new(0));
        let blocks_written = Arc::new(AtomicU64::new(0));
        let samples_written = Arc::new(AtomicUsize::new(0));

        let file = File::create(output_path)?;
        let mut out = BufWriter::new(file);

        let writer_to_write = to_write.clone();
        let writer_free = free.clone();
        let writer_blocks_written = blocks_written.clone();
        let writer_done = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let writer_done_flag = writer_done.clone();

        let writer = std::thread::Builder::new()
            .name("sdrstream-recorder-writer".into())
            .spawn(move || loop {
                match writer_to_write.pop() {
                    Some(mut block) => {
                        let bytes = complex_slice_as_bytes(&block.samples);
                        let _ = out.write_all(bytes);
                        writer_blocks_written.fetch_add(1, Ordering::Relaxed);
                        block.samples.clear();
                        let _ = writer_free.push(block);
                    }
                    None => {
                        if writer_done_flag.load(Ordering::Acquire) {
                            let _ = out.flush();
                            return;
                        }
                        std::thread::sleep(Duration::from_millis(5));
                    }
                }
            })
            .expect("spawning recorder writer thread");

        let consumer_blocks_dropped = blocks_dropped.clone();
        let consumer_samples_written = samples_written.clone();
        let consumer_done = writer_done;

        let consumer = std::thread::Builder::new()
            .name("sdrstream-recorder-consumer".into())
            .spawn(move || {
                while let Ok(block) = rx.recv() {
                    if let Some(target) = sample_target {
                        if consumer_samples_written.load(Ordering::Relaxed) as u64 >= target {
                            break;
                        }
                    }
                    match free.pop() {
                        Some(mut slot) => {
                            slot.samples.clear();
                            slot.samples.extend_from_slice(&block.samples);
                            consumer_samples_written
                                .fetch_add(block.samples.len(), Ordering::Relaxed);
                            let _ = to_write.push(slot);
                        }
                        None => {
                            consumer_blocks_dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                consumer_done.store(true, Ordering::Release);
            })
            .expect("spawning recorder consumer thread");

        Ok(IqRecorder {
            consumer: Some(consumer),
            writer: Some(writer),
            blocks_dropped,
            blocks_written,
            samples_target: sample_target,
            samples_written,
        })
    }

    pub fn blocks_dropped(&self) -> u64 {
        self.blocks_dropped.load(Ordering::Relaxed)
    }

    pub fn blocks_written(&self) -> u64 {
        self.blocks_written.load(Ordering::Relaxed)
    }

    pub fn samples_written(&self) -> usize {
        self.samples_written.load(Ordering::Relaxed)
    }

    pub fn is_complete(&self) -> bool {
        match self.samples_target {
            Some(target) => self.samples_written() as u64 >= target,
            None => false,
        }
    }

    /// Block until both the consumer and writer threads exit (consumer
    /// exits when its input channel closes or the target is reached;
    /// writer then drains `to_write` and flushes).
    pub fn join(&mut self) {
        if let Some(h) = self.consumer.take() {
            let _ = h.join();
        }
        if let Some(h) = self.writer.take() {
            let _ = h.join();
        }
    }
}

fn complex_slice_as_bytes(samples: &[num_complex::Complex32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(samples.as_ptr() as *const u8, std::mem::size_of_val(samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use num_complex::Complex32;

    #[test]
    fn recorder_writes_all_samples_when_pool_keeps_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.iq");
        let (tx, rx) = bounded(16);
        let mut recorder = IqRecorder::spawn(rx, &path, 8, 256, Some(512)).unwrap();

        for _ in 0..4 {
            let block = Arc::new(SampleBlock {
                samples: vec![Complex32::new(1.0, 0.0); 128],
                host_timestamp: 0.0,
                overflowed: false,
            });
            tx.send(block).unwrap();
        }
        drop(tx);
        recorder.join();

        let written = std::fs::metadata(&path).unwrap().len();
        assert_eq!(written, 4 * 128 * 8);
    }

    #[test]
    fn recorder_drops_and_counts_when_pool_is_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.iq");
        let (tx, rx) = bounded(64);
        // A pool of size 1 with a slow-draining writer (we don't control
        // speed directly, but a pool of 1 block under many rapid sends
        // will exhaust quickly in practice); what matters is correctness
        // of the counting path, exercised by filling the pool eagerly.
        let mut recorder = IqRecorder::spawn(rx, &path, 1, 64, None).unwrap();
        for _ in 0..50 {
            let block = Arc::new(SampleBlock {
                samples: vec![Complex32::new(0.0, 0.0); 64],
                host_timestamp: 0.0,
                overflowed: false,
            });
            tx.send(block).unwrap();
        }
        drop(tx);
        recorder.join();
        // Either every block was absorbed (pool drained fast enough) or
        // some were dropped and counted; both are valid outcomes of a
        // race against the writer, but the counter must never panic and
        // must account for what wasn't written.
        assert!(recorder.blocks_dropped() <= 50);
    }
}

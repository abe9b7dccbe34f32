//! Recorder binary: captures raw IQ samples to disk for a fixed duration
//! or until interrupted. Runs C4 (acquisition) + C7 (recorder) only; no
//! DSP, no ring, no fan-out.

use std::time::Duration;

use clap::Parser;
use crossbeam_channel::bounded;
use sdrstream_acquire::{AcquisitionLoop, IqRecorder};
use sdrstream_app::config::{ConfigFile, StreamerConfig};
use sdrstream_core::radio::RadioConfig;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Raw IQ capture to disk")]
struct Cli {
    #[arg(long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    #[arg(long)]
    freq: Option<f64>,

    #[arg(long)]
    rate: Option<f64>,

    #[arg(long)]
    gain: Option<f64>,

    /// Recording length in seconds. Omit to record until interrupted.
    #[arg(long)]
    duration: Option<f64>,

    #[arg(long, value_name = "PATH")]
    output: std::path::PathBuf,

    /// Override the recorder's per-block sample capacity.
    #[arg(long)]
    buffer: Option<usize>,
}

fn resolve_config(cli: &Cli) -> StreamerConfig {
    let mut cfg = match &cli.config {
        Some(path) => StreamerConfig::load_from_file(path).unwrap_or_default(),
        None => StreamerConfig::load_from_default_paths(),
    };
    if let Some(v) = cli.freq {
        cfg.radio.center_freq_hz = v;
    }
    if let Some(v) = cli.rate {
        cfg.radio.sample_rate_hz = v;
    }
    if let Some(v) = cli.gain {
        cfg.radio.gain_db = v;
    }
    if let Some(v) = cli.buffer {
        cfg.recorder.block_capacity = v;
    }
    cfg
}

fn main() -> std::io::Result<()> {
    let cli = Cli::parse();
    let cfg = resolve_config(&cli);
    sdrstream_app::init_logging(Some(&cfg.general.log_level));

    let device = sdrstream_daemon::build_device(&cfg)?;
    let radio_cfg = RadioConfig {
        center_freq_hz: cfg.radio.center_freq_hz,
        sample_rate_hz: cfg.radio.sample_rate_hz,
        gain_db: cfg.radio.gain_db,
        bandwidth_hz: cfg.radio.bandwidth_hz,
        channel_mask: cfg.radio.channel_mask,
        block_size: cfg.radio.block_size,
    };

    let (tx, rx) = bounded(64);
    let (mut acquisition, state) = AcquisitionLoop::spawn(device, radio_cfg, vec![tx])?;

    info!(
        freq = state.actuals.center_freq_hz,
        rate = state.actuals.sample_rate_hz,
        output = %cli.output.display(),
        "recording started"
    );

    let sample_target = cli
        .duration
        .map(|secs| (secs * state.actuals.sample_rate_hz).round() as u64);

    let mut recorder = IqRecorder::spawn(
        rx,
        &cli.output,
        cfg.recorder.pool_size,
        cfg.recorder.block_capacity,
        sample_target,
    )?;

    match sample_target {
        Some(_) => {
            while !recorder.is_complete() {
                std::thread::sleep(Duration::from_millis(200));
                eprintln!(
                    "\rsamples written: {:>12}  blocks dropped: {:>6}",
                    recorder.samples_written(),
                    recorder.blocks_dropped()
                );
            }
            acquisition.stop();
        }
        None => {
            // No target: run until ctrl-c kills the process. The consumer
            // thread keeps draining the acquisition loop's channel in the
            // background; there is nothing further to block on here.
            loop {
                std::thread::sleep(Duration::from_secs(1));
                eprintln!(
                    "\rsamples written: {:>12}  blocks dropped: {:>6}",
                    recorder.samples_written(),
                    recorder.blocks_dropped()
                );
            }
        }
    }

    recorder.join();

    let metadata = serde_json::json!({
        "global": {
            "core:datatype": "cf32_le",
            "core:sample_rate": state.actuals.sample_rate_hz,
            "core:version": "1.0.0",
        },
        "captures": [{
            "core:sample_start": 0,
            "core:frequency": state.actuals.center_freq_hz,
        }],
        "annotations": [],
        "sdrstream:blocks_written": recorder.blocks_written(),
        "sdrstream:blocks_dropped": recorder.blocks_dropped(),
        "sdrstream:samples_written": recorder.samples_written(),
    });
    println!("{}", serde_json::to_string_pretty(&metadata)?);

    Ok(())
}

//! Scanner binary: sweeps a frequency range and emits a JSON array of
//! per-step power measurements. Runs C4 + C8 only; owns the radio
//! exclusively for the run, never concurrently with the streaming daemon.

use std::time::Duration;

use clap::Parser;
use sdrstream_acquire::FrequencyScanner;
use sdrstream_app::config::StreamerConfig;
use sdrstream_core::window::WindowKind;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Frequency sweep power scanner")]
struct Cli {
    #[arg(long)]
    start: f64,

    #[arg(long)]
    stop: f64,

    #[arg(long)]
    step: f64,

    #[arg(long)]
    rate: Option<f64>,

    #[arg(long)]
    gain: Option<f64>,

    #[arg(long = "fft-size")]
    fft_size: Option<usize>,

    #[arg(long)]
    averages: Option<u32>,

    #[arg(long)]
    window: Option<String>,
}

fn main() -> std::io::Result<()> {
    let cli = Cli::parse();
    let mut cfg = StreamerConfig::default();
    sdrstream_app::init_logging(Some(&cfg.general.log_level));

    let rate = cli.rate.unwrap_or(cfg.radio.sample_rate_hz);
    let gain = cli.gain.unwrap_or(cfg.radio.gain_db);
    let fft_size = cli.fft_size.unwrap_or(cfg.dsp.fft_size);
    let averages = cli.averages.unwrap_or(cfg.scanner.averages);
    let window_kind: WindowKind = cli
        .window
        .as_deref()
        .unwrap_or(&cfg.dsp.window)
        .parse()
        .unwrap_or_default();

    cfg.radio.sample_rate_hz = rate;
    cfg.radio.gain_db = gain;
    let mut device = sdrstream_daemon::build_device(&cfg)?;

    let settle = Duration::from_millis(cfg.scanner.settle_ms);
    let scanner = FrequencyScanner::new(fft_size, window_kind, averages, settle);

    info!(
        start = cli.start,
        stop = cli.stop,
        step = cli.step,
        "scan starting"
    );

    let results = scanner.scan(device.as_mut(), cli.start, cli.stop, cli.step, rate, gain);

    let records: Vec<_> = results
        .iter()
        .map(|r| {
            serde_json::json!({
                "frequencyHz": r.actual_freq_hz,
                "avgPeakDbfs": r.avg_peak_dbfs,
                "maxPeakDbfs": r.max_peak_dbfs,
                "avgTotalDbfs": r.avg_total_dbfs,
                "validCount": r.valid_count,
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

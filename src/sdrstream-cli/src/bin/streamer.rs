//! Streamer binary: runs the full streaming pipeline (C4-C6, C9) until
//! interrupted.

use clap::Parser;
use sdrstream_app::config::{ConfigFile, StreamerConfig};
use sdrstream_daemon::Daemon;
use sdrstream_fanout::FanoutState;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Real-time SDR spectrum streaming daemon")]
struct Cli {
    #[arg(long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    #[arg(long)]
    freq: Option<f64>,

    #[arg(long)]
    rate: Option<f64>,

    #[arg(long)]
    gain: Option<f64>,

    #[arg(long = "fft-size")]
    fft_size: Option<usize>,

    #[arg(long)]
    bw: Option<f64>,

    #[arg(long)]
    device: Option<String>,

    /// Override the fan-out WebSocket listen address (e.g. "0.0.0.0:9000").
    #[arg(long)]
    binary: Option<String>,
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
    if let Some(v) = cli.fft_size {
        cfg.dsp.fft_size = v;
    }
    if let Some(v) = cli.bw {
        cfg.radio.bandwidth_hz = v;
    }
    if let Some(v) = &cli.device {
        cfg.radio.backend = v.clone();
    }
    if let Some(v) = &cli.binary {
        cfg.fanout.listen_addr = v.clone();
    }
    cfg
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();
    let cfg = resolve_config(&cli);
    sdrstream_app::init_logging(Some(&cfg.general.log_level));

    info!(backend = %cfg.radio.backend, freq = cfg.radio.center_freq_hz, "starting streamer");

    let fanout_state = FanoutState::new(256, cfg.dsp.fft_size, 1);
    let daemon = Daemon::start(&cfg, fanout_state.status.clone())?;
    let shutdown_signal = daemon.shutdown_signal();

    let ring_name = format!("{}-{}", cfg.general.ring_name_prefix, cfg.ring.name);
    let dims = sdrstream_ring::RingDimensions {
        ring_size: cfg.ring.slot_count,
        fft_size: cfg.dsp.fft_size as u32,
        channel_count: cfg.radio.channel_mask.count_ones().max(1),
        frame_stride: sdrstream_ring::slot_stride(cfg.dsp.fft_size, 1) as u32,
    };

    // Give the daemon a moment to create the ring before attaching.
    std::thread::sleep(std::time::Duration::from_millis(50));
    let reader = sdrstream_ring::RingReader::attach(&ring_name, dims)
        .expect("attaching fan-out bridge to the spectrum ring");
    let bridge_stop = sdrstream_fanout::ring_bridge::spawn(reader, fanout_state.frames.clone());

    let mut daemon = daemon;
    daemon.set_fanout_stop(bridge_stop);

    let server = sdrstream_fanout::bind(&cfg.fanout.listen_addr, fanout_state)?;
    let server_handle = server.handle();

    // A remote STOP trips `shutdown_signal` from inside the daemon's own
    // threads; poll it here so the HTTP server (the one piece of the
    // pipeline this binary, not the daemon, owns) stops too.
    let watcher = actix_web::rt::spawn(async move {
        while !shutdown_signal.load(std::sync::atomic::Ordering::Acquire) {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        server_handle.stop(true).await;
    });

    let result = server.await;
    watcher.abort();
    daemon.shutdown();
    result
}

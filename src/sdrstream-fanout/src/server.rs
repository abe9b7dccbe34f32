//! The fan-out HTTP/WebSocket server (C9). Structurally the same shape as
//! the audio WebSocket frontend this was adapted from: an `actix_ws`
//! upgrade, a `tokio::select!` loop merging a broadcast receiver with the
//! incoming message stream, ping/idle-timeout liveness, and explicit
//! lag/drop accounting instead of letting the broadcast channel's own lag
//! error silently pass through.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use sdrstream_core::frame::SpectrumFrame;
use sdrstream_core::status::{StatusRecord, STATUS_RECORD_LEN};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame_codec::{
    backpressure_notice_json, connected_greeting_json, encode_spectrum_message,
    encode_status_message, frame_for_wire,
};
use crate::policy::{Decision, SubscriberState};

const PING_INTERVAL: Duration = Duration::from_secs(10);
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const OUTBOUND_QUEUE_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct FanoutState {
    pub frames: broadcast::Sender<Arc<SpectrumFrame>>,
    pub status: broadcast::Sender<StatusRecord>,
    pub fft_size: usize,
    pub channel_count: usize,
    pub subscriber_count: Arc<AtomicU64>,
    pub compression_threshold: usize,
}

impl FanoutState {
    pub fn new(capacity: usize, fft_size: usize, channel_count: usize) -> Self {
        Self::with_compression_threshold(capacity, fft_size, channel_count, 1024)
    }

    pub fn with_compression_threshold(
        capacity: usize,
        fft_size: usize,
        channel_count: usize,
        compression_threshold: usize,
    ) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        let (status_tx, _status_rx) = broadcast::channel(16);
        FanoutState {
            frames: tx,
            status: status_tx,
            fft_size,
            channel_count,
            subscriber_count: Arc::new(AtomicU64::new(0)),
            compression_threshold,
        }
    }
}

async fn ws_route(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<FanoutState>,
) -> actix_web::Result<HttpResponse> {
    let (response, session, msg_stream) = actix_ws::handle(&req, body)?;
    state.subscriber_count.fetch_add(1, Ordering::Relaxed);
    let state = state.get_ref().clone();
    let subscriber_id = Uuid::new_v4();
    actix_web::rt::spawn(run_subscriber(subscriber_id, state, session, msg_stream));
    Ok(response)
}

/// Binary frames destined for one subscriber's socket go through this
/// channel to a dedicated writer task rather than straight out of the
/// select loop below, so `outstanding_bytes` reflects bytes actually
/// still queued for the wire instead of the size of whatever frame the
/// broadcast channel handed us most recently.
fn spawn_writer(
    subscriber_id: Uuid,
    mut session: actix_ws::Session,
) -> (mpsc::Sender<Vec<u8>>, Arc<AtomicUsize>) {
    let outstanding_bytes = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(OUTBOUND_QUEUE_CAPACITY);
    let writer_outstanding = outstanding_bytes.clone();
    actix_web::rt::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            let len = bytes.len();
            if session.binary(bytes).await.is_err() {
                warn!(%subscriber_id, "socket write failed, stopping writer task");
                break;
            }
            writer_outstanding.fetch_sub(len, Ordering::AcqRel);
        }
        let _ = session.close(None).await;
    });
    (tx, outstanding_bytes)
}

async fn run_subscriber(
    subscriber_id: Uuid,
    state: FanoutState,
    mut session: actix_ws::Session,
    mut msg_stream: actix_ws::MessageStream,
) {
    use futures_util::StreamExt;

    let mut rx = state.frames.subscribe();
    let mut status_rx = state.status.subscribe();
    let mut sub_state = SubscriberState::default();
    let connected_at = Instant::now();
    let mut last_activity = Instant::now();
    let mut ping_tick = tokio::time::interval(PING_INTERVAL);

    let _ = session
        .text(connected_greeting_json(state.fft_size, state.channel_count))
        .await;

    let (out_tx, outstanding_bytes) = spawn_writer(subscriber_id, session.clone());

    loop {
        tokio::select! {
            _ = ping_tick.tick() => {
                if last_activity.elapsed() > IDLE_TIMEOUT {
                    info!(%subscriber_id, "subscriber idle timeout, closing");
                    break;
                }
                if session.ping(b"").await.is_err() {
                    break;
                }
            }
            frame = rx.recv() => {
                match frame {
                    Ok(frame) => {
                        let bytes = encode_spectrum_message(&frame);
                        let queued = outstanding_bytes.load(Ordering::Acquire);
                        let decision = sub_state.decide(queued);
                        match decision {
                            Decision::Enqueue => {
                                let wired = frame_for_wire(bytes, state.compression_threshold);
                                let len = wired.len();
                                outstanding_bytes.fetch_add(len, Ordering::AcqRel);
                                // The writer queue can fill faster than
                                // `outstanding_bytes` crosses HIGH_WATERMARK
                                // (it's a much smaller, fixed-capacity
                                // buffer); treat that the same as a policy
                                // drop rather than disconnecting the
                                // subscriber outright.
                                if out_tx.try_send(wired).is_err() {
                                    outstanding_bytes.fetch_sub(len, Ordering::AcqRel);
                                    sub_state.record_enqueue_failure();
                                }
                            }
                            Decision::Drop => {}
                            Decision::DropAndNotify => {
                                let notice = backpressure_notice_json(
                                    sub_state.drop_count,
                                    queued,
                                    connected_at.elapsed().as_secs_f64(),
                                );
                                let _ = session.text(notice).await;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(%subscriber_id, skipped = n, "subscriber lagged behind the frame broadcast");
                        sub_state.record_enqueue_failure();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            status = status_rx.recv() => {
                match status {
                    Ok(record) => {
                        let wired = encode_status_message(&record);
                        if out_tx.try_send(wired).is_err() {
                            warn!(%subscriber_id, "writer queue full, dropping status update");
                        } else {
                            outstanding_bytes.fetch_add(STATUS_RECORD_LEN, Ordering::AcqRel);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => {}
                }
            }
            msg = msg_stream.next() => {
                match msg {
                    Some(Ok(_)) => {
                        last_activity = Instant::now();
                    }
                    Some(Err(_)) | None => break,
                }
            }
        }
    }

    state.subscriber_count.fetch_sub(1, Ordering::Relaxed);
    drop(out_tx);
    let _ = session.close(None).await;
}

/// Binds the listener and returns the unstarted server. Split from `run` so
/// callers that need to stop the server from outside the request-handling
/// task (e.g. on a remote control-socket STOP) can grab `server.handle()`
/// before awaiting it.
pub fn bind(addr: &str, state: FanoutState) -> std::io::Result<actix_web::dev::Server> {
    let data = web::Data::new(state);
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .route("/spectrum", web::get().to(ws_route))
    })
    .bind(addr)?
    .shutdown_timeout(1)
    .run())
}

pub async fn run(addr: &str, state: FanoutState) -> std::io::Result<()> {
    bind(addr, state)?.await
}

//! The control server (C5): accepts local stream-socket connections, reads
//! fixed 9-byte commands, forwards them to the acquisition mailbox, and
//! writes fixed 73-byte responses. Structurally an accept-loop-plus-
//! per-connection-handler server, same shape as the line-oriented
//! frontends this crate's sibling components were adapted from, but using
//! blocking `std::net` I/O with explicit deadlines instead of async tasks,
//! per the "OS threads for the core" design rule.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};

use crate::command::{Command, ProtocolError, Response, COMMAND_LEN};
use crate::mailbox::Mailbox;

const IO_DEADLINE: Duration = Duration::from_secs(5);
const APPLY_DEADLINE: Duration = Duration::from_secs(2);

/// Shared status the control server reports on GET_STATUS; updated by the
/// DSP thread as frames are published.
#[derive(Default)]
pub struct StatusBoard {
    pub last_peak_dbfs: Mutex<f32>,
}

pub struct ControlServer {
    listener: TcpListener,
    stop_flag: Arc<AtomicBool>,
}

impl ControlServer {
    pub fn bind(addr: &str) -> std::io::Result<Self> {
        Self::bind_with_stop_flag(addr, Arc::new(AtomicBool::new(false)))
    }

    /// Bind using a stop flag shared with the rest of the daemon's thread
    /// topology, so a remote `STOP` (applied to the acquisition loop's own
    /// flag by `apply_command`) also ends this server's accept loop.
    pub fn bind_with_stop_flag(addr: &str, stop_flag: Arc<AtomicBool>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(ControlServer { listener, stop_flag })
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// Serve forever (or until `stop_flag` is set), one connection at a
    /// time, on the calling thread.
    pub fn serve(&self, mailbox: Mailbox, status: Arc<StatusBoard>) {
        self.listener
            .set_nonblocking(true)
            .expect("nonblocking accept for stop-flag polling");
        while !self.stop_flag.load(Ordering::Acquire) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    info!(%peer, "control connection accepted");
                    handle_connection(stream, &mailbox, &status);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    warn!(error = %e, "control accept failed");
                }
            }
        }
    }
}

fn handle_connection(mut stream: TcpStream, mailbox: &Mailbox, status: &StatusBoard) {
    let _ = stream.set_read_timeout(Some(IO_DEADLINE));
    let _ = stream.set_write_timeout(Some(IO_DEADLINE));

    loop {
        let mut buf = [0u8; COMMAND_LEN];
        if let Err(e) = stream.read_exact(&mut buf) {
            if e.kind() != std::io::ErrorKind::UnexpectedEof {
                warn!(error = %e, "control read failed, closing connection");
            }
            return;
        }

        let decoded = Command::decode(&buf);
        let response = match decoded {
            Ok(cmd) => dispatch(cmd, mailbox, status),
            Err(ProtocolError::BadLength(n)) => {
                Response::err(format!("bad command length: {n}"))
            }
            Err(ProtocolError::UnknownOpcode(op)) => {
                Response::err(format!("unknown opcode: {op}"))
            }
        };

        if stream.write_all(&response.encode()).is_err() {
            return;
        }

        if matches!(decoded, Ok(Command::Stop)) {
            return;
        }
    }
}

fn dispatch(cmd: Command, mailbox: &Mailbox, status: &StatusBoard) -> Response {
    match cmd {
        Command::Ping => Response::ok(0.0, "pong"),
        Command::GetStatus => {
            let peak = *status.last_peak_dbfs.lock().unwrap();
            Response::ok(peak as f64, "ok")
        }
        Command::SetFreq(_) | Command::SetGain(_) | Command::SetSampleRate(_)
        | Command::SetBandwidth(_) => {
            mailbox.send(cmd);
            match mailbox.wait_for_ack(APPLY_DEADLINE) {
                Some(actual) => Response::ok(actual, "applied"),
                None => Response::err("timed out waiting for acquisition loop"),
            }
        }
        Command::Stop => {
            mailbox.send(Command::Stop);
            Response::ok(0.0, "stopping")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpStream as ClientStream;

    #[test]
    fn ping_over_the_wire_returns_pong() {
        let server = ControlServer::bind("127.0.0.1:0").unwrap();
        let addr = server.listener.local_addr().unwrap();
        let mailbox = Mailbox::new();
        let status = Arc::new(StatusBoard::default());
        let stop_flag = server.stop_flag();

        let handle = std::thread::spawn(move || server.serve(mailbox, status));

        let mut client = ClientStream::connect(addr).unwrap();
        client.write_all(&Command::Ping.encode()).unwrap();
        let mut resp_buf = [0u8; crate::command::RESPONSE_LEN];
        client.read_exact(&mut resp_buf).unwrap();
        let resp = Response::decode(&resp_buf).unwrap();
        assert!(resp.success);
        assert_eq!(resp.message, "pong");

        stop_flag.store(true, Ordering::Release);
        drop(client);
        let _ = handle.join();
    }

    #[test]
    fn malformed_command_gets_an_error_response_not_a_closed_socket() {
        let server = ControlServer::bind("127.0.0.1:0").unwrap();
        let addr = server.listener.local_addr().unwrap();
        let mailbox = Mailbox::new();
        let status = Arc::new(StatusBoard::default());
        let stop_flag = server.stop_flag();

        let handle = std::thread::spawn(move || server.serve(mailbox, status));

        let mut client = ClientStream::connect(addr).unwrap();
        client.write_all(&[0xFFu8; COMMAND_LEN]).unwrap();
        let mut resp_buf = [0u8; crate::command::RESPONSE_LEN];
        client.read_exact(&mut resp_buf).unwrap();
        let resp = Response::decode(&resp_buf).unwrap();
        assert!(!resp.success);

        stop_flag.store(true, Ordering::Release);
        drop(client);
        let _ = handle.join();
    }
}

//! Single-consumer command mailbox the control server uses to reach into
//! the acquisition thread without the acquisition thread ever blocking on
//! it. Modeled on the retune/gain `Arc<Mutex<Option<_>>>` + `try_lock`
//! pattern used by the acquisition loop this was adapted from: a mutex
//! guards the slot, but the acquisition thread only ever calls
//! `try_lock`, so a contended mailbox degrades to "check again next
//! block", never to a stall.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::command::Command;

#[derive(Clone, Default)]
pub struct Mailbox {
    slot: Arc<Mutex<Option<Command>>>,
    ack: Arc<(Mutex<Option<f64>>, Condvar)>,
}

impl Mailbox {
    pub fn new() -> Self {
        Mailbox {
            slot: Arc::new(Mutex::new(None)),
            ack: Arc::new((Mutex::new(None), Condvar::new())),
        }
    }

    /// Producer side: overwrite any pending, not-yet-applied command.
    /// Never blocks for long: this is a plain mutex, but contention is
    /// limited to the instant the acquisition thread drains it.
    pub fn send(&self, cmd: Command) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(cmd);
        }
        if let Ok(mut ack) = self.ack.0.lock() {
            *ack = None;
        }
    }

    /// Consumer side: take the pending command if any, without blocking.
    pub fn try_take(&self) -> Option<Command> {
        self.slot.try_lock().ok().and_then(|mut slot| slot.take())
    }

    /// Acquisition-thread side: record the actual value the device applied
    /// for the most recent command and wake any waiter.
    pub fn acknowledge(&self, actual: f64) {
        let (lock, cvar) = &*self.ack;
        if let Ok(mut guard) = lock.lock() {
            *guard = Some(actual);
            cvar.notify_all();
        }
    }

    /// Control-server side: block up to `deadline` for the acknowledgement
    /// of the command just sent. Returns `None` on timeout.
    pub fn wait_for_ack(&self, deadline: Duration) -> Option<f64> {
        let (lock, cvar) = &*self.ack;
        let guard = lock.lock().ok()?;
        let (guard, _) = cvar.wait_timeout_while(guard, deadline, |v| v.is_none()).ok()?;
        *guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_then_take_round_trips() {
        let mailbox = Mailbox::new();
        assert!(mailbox.try_take().is_none());
        mailbox.send(Command::Ping);
        assert_eq!(mailbox.try_take(), Some(Command::Ping));
        assert!(mailbox.try_take().is_none());
    }

    #[test]
    fn newer_send_overwrites_unconsumed_older_one() {
        let mailbox = Mailbox::new();
        mailbox.send(Command::SetGain(10.0));
        mailbox.send(Command::SetGain(20.0));
        assert_eq!(mailbox.try_take(), Some(Command::SetGain(20.0)));
    }
}

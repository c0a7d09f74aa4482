//! In-memory transport for tests and demos (spec §8: scenarios exercised
//! without real hardware). Used by unit and integration tests, and by the
//! `sanectl` binary, which has no physical transport to open a device
//! discovery session against.

use std::collections::VecDeque;
use std::time::Duration;

use super::{BulkTransport, Direction, ParallelMode, RegisterTransport};
use crate::error::BackendError;
use crate::wire::{self, BulkHeader};

/// Scripted response to one `exchange` call.
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    pub status: u32,
    /// Bytes returned for an `In` data phase; ignored for `Out`/`None`.
    pub data: Vec<u8>,
}

impl ScriptedReply {
    pub fn ok() -> Self {
        ScriptedReply { status: wire::STATUS_GOOD, data: Vec::new() }
    }

    pub fn ok_with_data(data: Vec<u8>) -> Self {
        ScriptedReply { status: wire::STATUS_GOOD, data }
    }

    pub fn check_condition() -> Self {
        ScriptedReply { status: wire::STATUS_CHECK_CONDITION, data: Vec::new() }
    }
}

/// A canned in-memory stand-in for both transport traits. Replies are
/// consumed in FIFO order from `script`; once exhausted, `exchange` repeats
/// the last reply (or `STATUS_GOOD` with zero-filled data if none was ever
/// queued), which keeps long `READ` loops from needing one entry per call.
pub struct SimTransport {
    script: VecDeque<ScriptedReply>,
    last: Option<ScriptedReply>,
    registers: [u8; 256],
    mode: ParallelMode,
    pub calls: Vec<String>,
}

impl SimTransport {
    pub fn new() -> Self {
        SimTransport {
            script: VecDeque::new(),
            last: None,
            registers: [0u8; 256],
            mode: ParallelMode::Spp,
            calls: Vec::new(),
        }
    }

    pub fn with_mode(mode: ParallelMode) -> Self {
        let mut t = SimTransport::new();
        t.mode = mode;
        t
    }

    pub fn queue(&mut self, reply: ScriptedReply) {
        self.script.push_back(reply);
    }

    fn next_reply(&mut self) -> ScriptedReply {
        if let Some(reply) = self.script.pop_front() {
            self.last = Some(reply.clone());
            reply
        } else if let Some(reply) = &self.last {
            reply.clone()
        } else {
            ScriptedReply::ok()
        }
    }
}

impl Default for SimTransport {
    fn default() -> Self {
        SimTransport::new()
    }
}

impl BulkTransport for SimTransport {
    fn exchange(
        &mut self,
        header: BulkHeader,
        _command: &[u8],
        direction: Direction,
        data: &mut [u8],
        _timeout: Duration,
    ) -> Result<u32, BackendError> {
        self.calls.push(format!("exchange(code={:#06x})", u16::from(header.code)));
        let reply = self.next_reply();
        if direction == Direction::In {
            let n = reply.data.len().min(data.len());
            data[..n].copy_from_slice(&reply.data[..n]);
            for byte in &mut data[n..] {
                *byte = 0;
            }
        }
        Ok(reply.status)
    }
}

impl RegisterTransport for SimTransport {
    fn register_write(&mut self, register: u8, value: u8) -> Result<(), BackendError> {
        self.registers[register as usize] = value;
        Ok(())
    }

    fn register_read(&mut self, register: u8) -> Result<u8, BackendError> {
        Ok(self.registers[register as usize])
    }

    fn burst_read(&mut self, buf: &mut [u8], _delay: u8) -> Result<usize, BackendError> {
        let reply = self.next_reply();
        let n = reply.data.len().min(buf.len());
        buf[..n].copy_from_slice(&reply.data[..n]);
        Ok(n)
    }

    fn mode(&self) -> ParallelMode {
        self.mode
    }
}

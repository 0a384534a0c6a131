//! Gateway payload framing and NDJSON replay.
//!
//! A recorded session is a file with one gateway payload per line:
//!
//! ```text
//! {"op":10,"d":{"heartbeat_interval":41250}}
//! {"op":0,"s":1,"t":"READY","d":{...}}
//! ```
//!
//! [`replay`] feeds every dispatch payload of such a stream into a [`State`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::BufRead;
use thiserror::Error;
use tracing::{debug, warn};

use crate::runtime::{Dispatch, Event, Handlers, State};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: invalid payload: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown opcode {0}")]
    UnknownOpcode(u64),
}

/// Gateway opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Dispatch,
    Heartbeat,
    Identify,
    StatusUpdate,
    Resume,
    Reconnect,
    RequestGuildMembers,
    InvalidSession,
    Hello,
    HeartbeatAck,
}

impl TryFrom<u64> for Opcode {
    type Error = IngestError;

    fn try_from(op: u64) -> Result<Self, Self::Error> {
        let opcode = match op {
            0 => Opcode::Dispatch,
            1 => Opcode::Heartbeat,
            2 => Opcode::Identify,
            3 => Opcode::StatusUpdate,
            6 => Opcode::Resume,
            7 => Opcode::Reconnect,
            8 => Opcode::RequestGuildMembers,
            9 => Opcode::InvalidSession,
            10 => Opcode::Hello,
            11 => Opcode::HeartbeatAck,
            other => return Err(IngestError::UnknownOpcode(other)),
        };
        Ok(opcode)
    }
}

/// Gateway close codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    Unknown,
    OpcodeError,
    DecodeError,
    AuthFail,
    AuthDupe,
    InvalidSeq,
    RateLimited,
    SessionTimeout,
    InvalidShard,
    ShardingRequired,
}

impl CloseCode {
    pub fn from_code(code: u16) -> Option<Self> {
        let close = match code {
            4000 => CloseCode::Unknown,
            4001 => CloseCode::OpcodeError,
            4002 => CloseCode::DecodeError,
            4004 => CloseCode::AuthFail,
            4005 => CloseCode::AuthDupe,
            4007 => CloseCode::InvalidSeq,
            4008 => CloseCode::RateLimited,
            4009 => CloseCode::SessionTimeout,
            4010 => CloseCode::InvalidShard,
            4011 => CloseCode::ShardingRequired,
            _ => return None,
        };
        Some(close)
    }

    pub fn code(&self) -> u16 {
        match self {
            CloseCode::Unknown => 4000,
            CloseCode::OpcodeError => 4001,
            CloseCode::DecodeError => 4002,
            CloseCode::AuthFail => 4004,
            CloseCode::AuthDupe => 4005,
            CloseCode::InvalidSeq => 4007,
            CloseCode::RateLimited => 4008,
            CloseCode::SessionTimeout => 4009,
            CloseCode::InvalidShard => 4010,
            CloseCode::ShardingRequired => 4011,
        }
    }

    /// Reconnecting cannot help after bad credentials or a bad shard setup.
    pub fn should_reconnect(&self) -> bool {
        !matches!(
            self,
            CloseCode::AuthFail | CloseCode::InvalidShard | CloseCode::ShardingRequired
        )
    }
}

/// One frame of the gateway protocol.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayPayload {
    pub op: u64,
    #[serde(default)]
    pub d: Value,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

impl GatewayPayload {
    pub fn opcode(&self) -> Result<Opcode, IngestError> {
        Opcode::try_from(self.op)
    }
}

/// NDJSON (Newline Delimited JSON) reader
///
/// Yields one payload per non-blank line.
pub struct NdjsonReader<R: BufRead> {
    lines: std::io::Lines<R>,
    line: usize,
}

impl<R: BufRead> NdjsonReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for NdjsonReader<R> {
    type Item = Result<GatewayPayload, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(err) => return Some(Err(err.into())),
            };
            self.line += 1;

            if text.trim().is_empty() {
                continue;
            }

            let line = self.line;
            return Some(
                serde_json::from_str(&text).map_err(|source| IngestError::Json { line, source }),
            );
        }
    }
}

/// Counters reported by [`replay`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub payloads: usize,
    pub dispatched: usize,
    pub changed: usize,
    /// Dispatches whose records were rejected.
    pub failed: usize,
    /// Handler invocations.
    pub handled: usize,
    pub last_sequence: Option<u64>,
}

/// Apply every dispatch payload from `reader` to `state`, in order.
///
/// Rejected records are logged and counted; malformed lines and IO errors
/// stop the replay.
pub fn replay<R: BufRead>(state: &State, reader: R) -> Result<ReplayStats, IngestError> {
    replay_with(state, &Handlers::new(), reader)
}

/// [`replay`], running `handlers` after each dispatch is applied.
///
/// Handlers do not run for rejected dispatches or unknown events.
pub fn replay_with<R: BufRead>(
    state: &State,
    handlers: &Handlers,
    reader: R,
) -> Result<ReplayStats, IngestError> {
    let mut stats = ReplayStats::default();

    for payload in NdjsonReader::new(reader) {
        let payload = payload?;
        stats.payloads += 1;
        if payload.s.is_some() {
            stats.last_sequence = payload.s;
        }

        let opcode = match payload.opcode() {
            Ok(opcode) => opcode,
            Err(err) => {
                warn!(error = %err, "Skipping payload");
                continue;
            }
        };
        if opcode != Opcode::Dispatch {
            debug!(?opcode, "Skipping non-dispatch payload");
            continue;
        }

        let Some(event) = payload.t.as_deref() else {
            warn!(seq = ?payload.s, "Dispatch payload without event name");
            continue;
        };

        stats.dispatched += 1;
        let changed = match state.apply(event, &payload.d) {
            Ok(changed) => changed,
            Err(err) => {
                stats.failed += 1;
                warn!(event, seq = ?payload.s, error = %err, "Rejected dispatch");
                continue;
            }
        };
        if changed {
            stats.changed += 1;
        }

        if let Some(event) = Event::from_name(event) {
            let dispatch = Dispatch {
                event,
                data: &payload.d,
                sequence: payload.s,
                changed,
            };
            stats.handled += handlers.emit(state, &dispatch);
        }
    }

    Ok(stats)
}

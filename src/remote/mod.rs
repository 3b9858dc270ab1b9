//! Request/response boundary to the parking coordination service.
//!
//! Every call is synchronous and bounded by the transport timeout. Callers
//! treat any [`RemoteError`] as "no decision this tick" and keep their local
//! state; see the gate controllers for the retry rules.

use crate::state::{EntryAssignment, SlotEvent};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod http;
pub mod mock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    TwoWheeler,
    FourWheeler,
}

impl VehicleClass {
    pub fn wheels(self) -> u8 {
        match self {
            VehicleClass::TwoWheeler => 2,
            VehicleClass::FourWheeler => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    CallFailure,
    MalformedResponse,
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("dns error: {0}")]
    Dns(String),
    #[error("connect error: {0}")]
    Connect(std::io::Error),
    #[error("io error: {0}")]
    Io(std::io::Error),
    #[error("http status {0} ({1})")]
    Http(u16, String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RemoteError {
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            RemoteError::Json(_) | RemoteError::Malformed(_) => RemoteErrorKind::MalformedResponse,
            _ => RemoteErrorKind::CallFailure,
        }
    }

    /// Errors that mean the service is unreachable rather than unhappy.
    pub fn is_link_loss(&self) -> bool {
        matches!(self, RemoteError::Dns(_) | RemoteError::Connect(_))
    }
}

pub trait RemoteCoordinator {
    /// Report a confirmed slot transition. Returns the service's status code.
    fn notify_slot_event(&mut self, event: SlotEvent) -> Result<u16, RemoteError>;

    fn request_entry_assignment(
        &mut self,
        class: VehicleClass,
    ) -> Result<EntryAssignment, RemoteError>;

    fn request_exit_code(&mut self) -> Result<String, RemoteError>;

    fn poll_exit_approval(&mut self) -> Result<bool, RemoteError>;

    fn is_link_up(&self) -> bool {
        true
    }

    /// Try to restore a lost link. Called between ticks, never inside one.
    fn reconnect(&mut self) -> bool {
        true
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SlotEventBody {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub slot: u8,
}

impl From<SlotEvent> for SlotEventBody {
    fn from(event: SlotEvent) -> Self {
        Self {
            kind: event.wire_type(),
            slot: event.slot(),
        }
    }
}

pub(crate) fn parse_entry_assignment(body: &str) -> Result<EntryAssignment, RemoteError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let field = |name: &str| -> Result<u32, RemoteError> {
        value
            .get(name)
            .and_then(serde_json::Value::as_u64)
            .and_then(|raw| u32::try_from(raw).ok())
            .ok_or_else(|| RemoteError::Malformed(format!("missing or invalid `{name}`")))
    };
    Ok(EntryAssignment {
        slot: field("slot")?,
        passkey: field("passkey")?,
    })
}

pub(crate) fn parse_exit_code(body: &str) -> Result<String, RemoteError> {
    let code = body.trim();
    if code.is_empty() {
        return Err(RemoteError::Malformed("empty exit code".to_string()));
    }
    Ok(code.to_string())
}

pub(crate) fn parse_approval(body: &str) -> Result<bool, RemoteError> {
    body.trim()
        .parse::<i64>()
        .map(|flag| flag == 1)
        .map_err(|_| RemoteError::Malformed(format!("approval flag not an integer: {body:?}")))
}

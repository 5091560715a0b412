use serde::Serialize;

use super::{SessionError, SessionStore, SessionValue};

const FLASH_PREFIX: &str = "flash:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Info,
    Warning,
    Danger,
}

impl FlashKind {
    pub const ALL: [FlashKind; 4] = [FlashKind::Success, FlashKind::Info, FlashKind::Warning, FlashKind::Danger];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Info => "info",
            FlashKind::Warning => "warning",
            FlashKind::Danger => "danger",
        }
    }

    fn key(&self) -> String { format!("{}{}", FLASH_PREFIX, self.as_str()) }
}

/// One-time notice shown on the next page the client loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

pub fn set_flash(session: &mut dyn SessionStore, kind: FlashKind, message: &str) -> Result<(), SessionError> {
    session.set(&kind.key(), SessionValue::Text(message.to_string()))
}

/// Returns pending notices and removes them, so each is seen exactly once.
pub fn take_flash(session: &mut dyn SessionStore) -> Vec<Flash> {
    let mut out = Vec::new();
    for kind in FlashKind::ALL {
        let key = kind.key();
        if let Some(value) = session.get(&key) {
            session.delete(&key);
            if let Some(message) = value.as_text() {
                out.push(Flash { kind, message: message.to_string() });
            }
        }
    }
    out
}

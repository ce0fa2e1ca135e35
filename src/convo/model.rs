use crate::error::{ConvoError, ConvoResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sender {
    Horse,
    Claw,
}

impl Sender {
    pub fn as_str(self) -> &'static str {
        match self {
            Sender::Horse => "Horse",
            Sender::Claw => "Claw",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sender {
    type Err = ConvoError;

    fn from_str(raw: &str) -> ConvoResult<Self> {
        match raw {
            "Horse" => Ok(Sender::Horse),
            "Claw" => Ok(Sender::Claw),
            other => Err(ConvoError::InvalidSender(other.to_string())),
        }
    }
}

/// A stored message as returned by `get` and the query methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: String,
    pub content: String,
    pub timestamp: String,
    pub sender: Sender,
    pub session_key: String,
    pub channel: String,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub record: MessageRecord,
    pub distance: f64,
}

/// Insert request. `message_id` and `timestamp` fall back to the derived id
/// and the write time respectively.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub content: String,
    pub sender: Sender,
    pub session_key: String,
    pub order: i64,
    pub channel: String,
    pub timestamp: Option<String>,
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnsupportedRole(String),
    Noise(String),
    Malformed(String),
    NotAMessage,
    Duplicate(String),
    Backend(String),
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::UnsupportedRole(_) => "role",
            SkipReason::Noise(_) => "noise",
            SkipReason::Malformed(_) => "malformed",
            SkipReason::NotAMessage => "not_message",
            SkipReason::Duplicate(_) => "duplicate",
            SkipReason::Backend(_) => "backend",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnsupportedRole(role) => write!(f, "unsupported role `{role}`"),
            SkipReason::Noise(kind) => write!(f, "noise ({kind})"),
            SkipReason::Malformed(why) => write!(f, "malformed entry: {why}"),
            SkipReason::NotAMessage => f.write_str("line carries no message"),
            SkipReason::Duplicate(id) => write!(f, "duplicate id {id}"),
            SkipReason::Backend(err) => write!(f, "backend error: {err}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(String),
    Skipped(SkipReason),
}

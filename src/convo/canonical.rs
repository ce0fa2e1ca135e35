use crate::convo::identity::IdentityResolver;
use crate::convo::model::{NewMessage, Sender, SkipReason};
use crate::convo::noise::NoiseFilter;
use crate::convo::text::extract_text;
use crate::convo::timestamp::CanonicalTimestamp;
use serde_json::Value;

/// One transcript entry after envelope normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub role: Option<String>,
    pub content: Value,
    pub timestamp: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleMap {
    pub human: String,
    pub agent: String,
}

impl Default for RoleMap {
    fn default() -> Self {
        Self {
            human: "user".to_string(),
            agent: "assistant".to_string(),
        }
    }
}

impl RoleMap {
    pub fn sender_for(&self, role: &str) -> Option<Sender> {
        if role == self.human {
            Some(Sender::Horse)
        } else if role == self.agent {
            Some(Sender::Claw)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EntryContext<'a> {
    pub session_key: &'a str,
    pub index: u64,
    pub channel: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Canonical {
    Record(NewMessage),
    Skip(SkipReason),
}

#[derive(Debug, Clone, Default)]
pub struct Canonicalizer {
    pub roles: RoleMap,
    pub noise: NoiseFilter,
    pub identity: IdentityResolver,
}

impl Canonicalizer {
    pub fn new(roles: RoleMap, noise: NoiseFilter, identity: IdentityResolver) -> Self {
        Self {
            roles,
            noise,
            identity,
        }
    }

    /// Turn one raw entry into a store-ready message or a skip reason.
    /// Never fails: anything that cannot be canonicalised is a skip.
    pub fn canonicalize(&self, entry: &RawEntry, ctx: EntryContext<'_>) -> Canonical {
        let role = entry.role.as_deref().unwrap_or("");
        let Some(sender) = self.roles.sender_for(role) else {
            return Canonical::Skip(SkipReason::UnsupportedRole(role.to_string()));
        };

        let text = extract_text(&entry.content);
        let class = self.noise.classify(&text);
        if class.is_noise() {
            return Canonical::Skip(SkipReason::Noise(class.describe()));
        }

        let timestamp = match entry
            .timestamp
            .as_ref()
            .filter(|v| !is_unset_timestamp(v))
            .map(source_timestamp)
            .transpose()
        {
            Ok(ts) => ts.map(|ts| ts.iso),
            Err(reason) => return Canonical::Skip(SkipReason::Malformed(reason)),
        };

        let message_id = self
            .identity
            .resolve(&text, ctx.session_key, ctx.index)
            .into_string();

        Canonical::Record(NewMessage {
            content: text,
            sender,
            session_key: ctx.session_key.to_string(),
            order: i64::try_from(ctx.index).unwrap_or(i64::MAX),
            channel: ctx.channel.to_string(),
            timestamp,
            message_id: Some(message_id),
        })
    }
}

/// Producers write `0` or `""` for a missing timestamp; those fall back to now.
pub fn is_unset_timestamp(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Source timestamps are epoch milliseconds; some producers write RFC 3339
/// strings instead.
fn source_timestamp(value: &Value) -> Result<CanonicalTimestamp, String> {
    match value {
        Value::Number(n) => {
            let millis = n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
                .ok_or_else(|| format!("timestamp {n} is not an integer"))?;
            CanonicalTimestamp::from_epoch_millis(millis).map_err(|err| err.to_string())
        }
        Value::String(raw) => CanonicalTimestamp::parse(raw).map_err(|err| err.to_string()),
        other => Err(format!("unsupported timestamp value {other}")),
    }
}

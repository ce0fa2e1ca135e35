use regex::Regex;

/// Feishu thread messages carry `[message_id: om_<hex>]` in the prompt text.
pub const FEISHU_MESSAGE_ID_PATTERN: &str = r"\[message_id:\s*(om_[a-f0-9]+)\]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedId {
    External(String),
    Derived(String),
}

impl ResolvedId {
    pub fn as_str(&self) -> &str {
        match self {
            ResolvedId::External(id) | ResolvedId::Derived(id) => id,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            ResolvedId::External(id) | ResolvedId::Derived(id) => id,
        }
    }
}

pub fn derived_id(session_key: &str, index: u64) -> String {
    format!("{session_key}_{index:06}")
}

/// Recovers externally assigned message ids from text. Each registered
/// pattern must expose the id as capture group 1; patterns are tried in
/// registration order and the first hit wins.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    patterns: Vec<Regex>,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self {
            patterns: vec![Regex::new(FEISHU_MESSAGE_ID_PATTERN).expect("static pattern compiles")],
        }
    }
}

impl IdentityResolver {
    pub fn with_patterns<I, S>(extra: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut resolver = Self::default();
        for pattern in extra {
            resolver.register(pattern.as_ref())?;
        }
        Ok(resolver)
    }

    pub fn register(&mut self, pattern: &str) -> Result<(), regex::Error> {
        let compiled = Regex::new(pattern)?;
        if compiled.captures_len() < 2 {
            return Err(regex::Error::Syntax(format!(
                "identity pattern `{pattern}` needs a capture group for the id"
            )));
        }
        self.patterns.push(compiled);
        Ok(())
    }

    pub fn external_id(&self, text: &str) -> Option<String> {
        self.patterns.iter().find_map(|re| {
            re.captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
    }

    pub fn resolve(&self, text: &str, session_key: &str, index: u64) -> ResolvedId {
        match self.external_id(text) {
            Some(id) => ResolvedId::External(id),
            None => ResolvedId::Derived(derived_id(session_key, index)),
        }
    }
}

//! Utility functions and identity types for rsgroup

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Longest accepted group name
const MAX_GROUP_NAME_LEN: usize = 128;

/// Server identity in `host:port` form.
///
/// The host is lower-cased once here so that identities coming from
/// operators compare equal to the ones reported by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerId(String);

impl ServerId {
    /// Parse and normalize a `host:port` pair
    pub fn parse(raw: &str) -> crate::Result<Self> {
        let trimmed = raw.trim();
        let (host, port) = trimmed.rsplit_once(':').ok_or_else(|| {
            crate::Error::InvalidArgument(format!("server '{}' is not host:port", raw))
        })?;

        if host.is_empty() {
            return Err(crate::Error::InvalidArgument(format!(
                "server '{}' has an empty host",
                raw
            )));
        }

        let port: u16 = port.parse().map_err(|_| {
            crate::Error::InvalidArgument(format!("server '{}' has an invalid port", raw))
        })?;

        Ok(Self(format!("{}:{}", host.to_lowercase(), port)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn host(&self) -> &str {
        self.0.rsplit_once(':').map(|(h, _)| h).unwrap_or(&self.0)
    }

    pub fn port(&self) -> u16 {
        self.0
            .rsplit_once(':')
            .and_then(|(_, p)| p.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ServerId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ServerId {
    type Error = crate::Error;

    fn try_from(s: String) -> crate::Result<Self> {
        Self::parse(&s)
    }
}

impl From<ServerId> for String {
    fn from(id: ServerId) -> Self {
        id.0
    }
}

/// Parse a batch of raw server identities, failing on the first bad one
pub fn parse_servers<I, S>(raw: I) -> crate::Result<Vec<ServerId>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter().map(|s| ServerId::parse(s.as_ref())).collect()
}

/// Validate a group name: non-empty, bounded, `[A-Za-z0-9_.-]` only
pub fn validate_group_name(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(crate::Error::InvalidArgument(
            "group name cannot be empty".into(),
        ));
    }

    if name.len() > MAX_GROUP_NAME_LEN {
        return Err(crate::Error::InvalidArgument(format!(
            "group name too long (max {} bytes)",
            MAX_GROUP_NAME_LEN
        )));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(crate::Error::InvalidArgument(format!(
            "group name '{}' contains invalid characters",
            name
        )));
    }

    Ok(())
}

/// Validate a table name (must be non-empty, no control chars)
pub fn validate_table_name(table: &str) -> crate::Result<()> {
    if table.is_empty() {
        return Err(crate::Error::InvalidArgument(
            "table name cannot be empty".into(),
        ));
    }

    if table.chars().any(|c| c.is_control()) {
        return Err(crate::Error::InvalidArgument(format!(
            "table name '{}' contains invalid characters",
            table.escape_debug()
        )));
    }

    Ok(())
}

/// Parse duration string (e.g., "100ms", "30s", "5m", "1h")
pub fn parse_duration(s: &str) -> crate::Result<std::time::Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::Error::InvalidConfig("empty duration".into()));
    }

    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num_str, unit) = s.split_at(split);

    let num: u64 = num_str
        .parse()
        .map_err(|_| crate::Error::InvalidConfig(format!("invalid duration: {}", s)))?;

    let duration = match unit {
        "ms" => std::time::Duration::from_millis(num),
        "s" => std::time::Duration::from_secs(num),
        "m" => std::time::Duration::from_secs(num * 60),
        "h" => std::time::Duration::from_secs(num * 3600),
        _ => {
            return Err(crate::Error::InvalidConfig(format!(
                "unknown duration unit: {}",
                unit
            )))
        }
    };

    Ok(duration)
}

/// Get current Unix timestamp (milliseconds)
pub fn timestamp_now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

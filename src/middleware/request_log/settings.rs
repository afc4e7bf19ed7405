//! Serializable request-log options.

use serde::Deserialize;

/// Which optional fields a [`RequestLog`](super::RequestLog) adds to each
/// record.
///
/// Every toggle defaults to off and every list to empty, so a `Settings`
/// can be deserialized from any subset of its keys:
///
/// ```rust
/// use reqlog::middleware::request_log::Settings;
///
/// let settings: Settings = serde_json::from_str(r#"{
///     "log_user_agent": true,
///     "tag_response_headers": ["content-type"]
/// }"#).unwrap();
///
/// assert!(settings.log_user_agent);
/// assert!(!settings.log_host);
/// ```
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Adds `host`.
    pub log_host: bool,
    /// Adds `user-agent`.
    pub log_user_agent: bool,
    /// Adds `forwarded_for`: `X-Forwarded-For`, or the remote IP without it.
    pub log_forwarded_for: bool,
    /// Adds `username` from the string local stored under this key.
    pub log_username: Option<String>,
    /// Request headers logged verbatim under their own name.
    pub tag_request_headers: Vec<String>,
    /// Response headers logged verbatim under their own name.
    pub tag_response_headers: Vec<String>,
    /// Request locals logged under their own name, keeping their type.
    pub tags: Vec<String>,
}

impl Settings {
    /// Drops blank names and duplicates. Header names compare without ASCII
    /// case, like every header lookup; local keys compare exactly. The first
    /// spelling wins.
    pub(crate) fn normalized(mut self) -> Self {
        dedup_by(&mut self.tag_request_headers, |a, b| a.eq_ignore_ascii_case(b));
        dedup_by(&mut self.tag_response_headers, |a, b| a.eq_ignore_ascii_case(b));
        dedup_by(&mut self.tags, |a, b| a == b);
        self.log_username = self.log_username.filter(|key| !key.trim().is_empty());
        self
    }
}

fn dedup_by(names: &mut Vec<String>, same: impl Fn(&str, &str) -> bool) {
    let mut kept: Vec<String> = Vec::with_capacity(names.len());
    for name in names.drain(..) {
        let name = name.trim();
        if name.is_empty() || kept.iter().any(|k| same(k.as_str(), name)) {
            continue;
        }
        kept.push(name.to_owned());
    }
    *names = kept;
}

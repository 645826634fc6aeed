//! Referrer records: objects holding a reference to a config object.
//!
//! Two sources produce these: the `referring_objects` list returned on
//! every config GET, and the message body of a 409 Conflict returned by a
//! probing delete (`fail_if_referred: true`).

use regex::Regex;
use serde_json::Value;
use std::fmt::Display;
use std::sync::OnceLock;

const RAW_MESSAGE_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Referrer {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    /// Unparsed message text when structured extraction failed.
    pub raw: Option<String>,
}

impl Referrer {
    pub fn new(kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            raw: None,
        }
    }

    fn unparsed(raw: &str) -> Self {
        Self {
            kind: "?".to_string(),
            namespace: "?".to_string(),
            name: "?".to_string(),
            raw: Some(raw.chars().take(RAW_MESSAGE_LIMIT).collect()),
        }
    }
}

impl Display for Referrer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.raw {
            Some(raw) => write!(f, "{}", raw.chars().take(80).collect::<String>()),
            None => write!(f, "{}/{}/{}", self.kind, self.namespace, self.name),
        }
    }
}

fn intro_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:referred\s+by|referenced\s+by|referencing)\s+(.*)")
            .expect("referrer intro regex is valid")
    })
}

fn tuple_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\w+)\s+\[?(\S+?)/(\S+?)\]?(?:,|$|\s)").expect("referrer tuple regex is valid")
    })
}

/// Best-effort parse of a 409 Conflict body from the XC API.
///
/// The body is typically JSON with a `message` like
/// `"... referred by http_loadbalancer ns/name, origin_pool [ns/name] ..."`.
/// Falls back to a single unparsed record carrying the raw message.
pub fn parse_conflict_referrers(body: &str) -> Vec<Referrer> {
    let message = match serde_json::from_str::<Value>(body) {
        Ok(data) => data
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Err(_) => return vec![Referrer::unparsed(body)],
    };

    let mut referrers = Vec::new();
    if let Some(m) = intro_re().captures(&message) {
        let refs_part = m.get(1).map(|g| g.as_str()).unwrap_or_default();
        for rm in tuple_re().captures_iter(refs_part) {
            referrers.push(Referrer::new(&rm[1], &rm[2], &rm[3]));
        }
    }
    if referrers.is_empty() {
        referrers.push(Referrer::unparsed(&message));
    }
    referrers
}

/// Extract the `referring_objects` back-reference list from a config GET
/// response. Missing or malformed entries are dropped.
pub fn extract_referring_objects(config: &Value) -> Vec<Referrer> {
    config
        .get("referring_objects")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let obj = item.as_object()?;
                    Some(Referrer::new(
                        obj.get("kind").and_then(Value::as_str).unwrap_or("?"),
                        obj.get("namespace").and_then(Value::as_str)?,
                        obj.get("name").and_then(Value::as_str)?,
                    ))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bracketed_and_plain_tuples() {
        let body = json!({
            "code": 9,
            "message": "object is referred by http_loadbalancer ns1/lb-c, origin_pool [ns1/op-x]"
        })
        .to_string();
        let referrers = parse_conflict_referrers(&body);
        assert_eq!(
            referrers,
            vec![
                Referrer::new("http_loadbalancer", "ns1", "lb-c"),
                Referrer::new("origin_pool", "ns1", "op-x"),
            ]
        );
    }

    #[test]
    fn falls_back_to_raw_on_unexpected_message() {
        let body = json!({"message": "something unrelated"}).to_string();
        let referrers = parse_conflict_referrers(&body);
        assert_eq!(referrers.len(), 1);
        assert_eq!(referrers[0].kind, "?");
        assert_eq!(referrers[0].raw.as_deref(), Some("something unrelated"));
    }

    #[test]
    fn falls_back_to_raw_on_non_json_body() {
        let referrers = parse_conflict_referrers("<html>gateway error</html>");
        assert_eq!(referrers.len(), 1);
        assert!(referrers[0].raw.as_deref().unwrap().contains("gateway"));
    }

    #[test]
    fn extracts_referring_objects_list() {
        let config = json!({
            "metadata": {"name": "op-shared"},
            "referring_objects": [
                {"kind": "http_loadbalancer", "name": "lb-c", "namespace": "ns1", "uid": "u1"},
                {"bogus": true}
            ]
        });
        let referrers = extract_referring_objects(&config);
        assert_eq!(referrers, vec![Referrer::new("http_loadbalancer", "ns1", "lb-c")]);
    }

    #[test]
    fn missing_referring_objects_is_empty() {
        assert!(extract_referring_objects(&json!({"metadata": {}})).is_empty());
    }
}

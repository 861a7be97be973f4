use serde::{Deserialize, Serialize};

use super::record::{Record, RecordKind};

/// Scheme used to reach a check's target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(format!("unsupported protocol '{other}'")),
        }
    }
}

/// HTTP method used by a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "delete" => Ok(HttpMethod::Delete),
            other => Err(format!("unsupported method '{other}'")),
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Last persisted liveness of a check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    /// No probe has completed yet
    #[default]
    Unknown,
    Up,
    Down,
}

impl std::fmt::Display for CheckState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckState::Unknown => write!(f, "unknown"),
            CheckState::Up => write!(f, "up"),
            CheckState::Down => write!(f, "down"),
        }
    }
}

impl std::str::FromStr for CheckState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(CheckState::Unknown),
            "up" => Ok(CheckState::Up),
            "down" => Ok(CheckState::Down),
            other => Err(format!("unsupported state '{other}'")),
        }
    }
}

/// One monitored endpoint and its last known state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub id: String,

    /// Phone of the owning user, immutable after creation
    pub user_phone: String,

    pub protocol: Protocol,

    /// Host and path, without scheme
    pub url: String,

    pub method: HttpMethod,

    /// Status codes that classify a response as up
    pub success_codes: Vec<u16>,

    /// Probe budget in seconds, 1 to 5
    pub timeout_seconds: u64,

    #[serde(default)]
    pub state: CheckState,

    /// Unix milliseconds of the most recent probe attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<i64>,
}

impl Check {
    /// Full URL a probe is sent to
    pub fn target_url(&self) -> String {
        format!("{}://{}", self.protocol, self.url)
    }

    /// Human readable "METHOD url" label used in alerts and logs
    pub fn describe(&self) -> String {
        format!("{} {}", self.method.as_str().to_uppercase(), self.target_url())
    }

    pub fn accepts(&self, status_code: u16) -> bool {
        self.success_codes.contains(&status_code)
    }
}

impl Record for Check {
    const KIND: RecordKind = RecordKind::Check;

    fn key(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Check {
        Check {
            id: "abcdefghij0123456789".into(),
            user_phone: "5551234567".into(),
            protocol: Protocol::Https,
            url: "example.com/health".into(),
            method: HttpMethod::Get,
            success_codes: vec![200, 201],
            timeout_seconds: 3,
            state: CheckState::Unknown,
            last_checked: None,
        }
    }

    #[test]
    fn test_target_and_description() {
        let check = sample();
        assert_eq!(check.target_url(), "https://example.com/health");
        assert_eq!(check.describe(), "GET https://example.com/health");
    }

    #[test]
    fn test_success_code_membership() {
        let check = sample();
        assert!(check.accepts(201));
        assert!(!check.accepts(204));
    }

    #[test]
    fn test_document_field_names() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["userPhone"], "5551234567");
        assert_eq!(value["successCodes"], serde_json::json!([200, 201]));
        assert_eq!(value["timeoutSeconds"], 3);
        assert_eq!(value["state"], "unknown");
        assert!(value.get("lastChecked").is_none());
    }
}

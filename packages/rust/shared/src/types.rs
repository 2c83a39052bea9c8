//! Core domain types shared by the controller and the HTTP surface.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Opaque conversation identifier.
///
/// Freshly minted ids are UUID v7 strings (time-sortable), but any
/// non-empty string a client sends back is accepted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a new identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Use the client-supplied id verbatim, or mint one when it is absent
    /// or blank.
    pub fn from_client(raw: Option<&str>) -> Self {
        match raw {
            Some(id) if !id.trim().is_empty() => Self(id.to_string()),
            _ => Self::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from_client(Some(s)))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Inbound chat turn: `{message, session_id?}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Free text from the user. Missing is treated as empty.
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, session_id: Option<&SessionId>) -> Self {
        Self {
            message: message.into(),
            session_id: session_id.map(|id| id.to_string()),
        }
    }
}

/// Outbound reply: `{response, session_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: SessionId,
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// One labelled piece of tool output, rendered as `{"<label>": <body>}`.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceItem {
    pub label: String,
    pub body: serde_json::Value,
}

impl Serialize for EvidenceItem {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.label, &self.body)?;
        map.end()
    }
}

/// Ordered tool results handed to the model to ground its reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Evidence(Vec<EvidenceItem>);

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `body` under `label`.
    pub fn push(&mut self, label: impl Into<String>, body: &impl Serialize) {
        let label = label.into();
        match serde_json::to_value(body) {
            Ok(body) => self.0.push(EvidenceItem { label, body }),
            Err(e) => tracing::warn!(%label, error = %e, "dropping unserializable evidence"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn items(&self) -> &[EvidenceItem] {
        &self.0
    }

    /// Pretty-printed JSON, as appended to model prompts.
    pub fn render(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_are_uuids() {
        let id = SessionId::new();
        assert!(Uuid::parse_str(id.as_str()).is_ok());
        assert_ne!(id, SessionId::new());
    }

    #[test]
    fn client_id_kept_verbatim() {
        let id = SessionId::from_client(Some("browser-tab-7"));
        assert_eq!(id.as_str(), "browser-tab-7");
    }

    #[test]
    fn client_id_keeps_surrounding_whitespace() {
        let id = SessionId::from_client(Some(" abc "));
        assert_eq!(id.as_str(), " abc ");
        assert_ne!(id, SessionId::from_client(Some("abc")));
    }

    #[test]
    fn blank_client_id_is_replaced() {
        let id = SessionId::from_client(Some("   "));
        assert!(Uuid::parse_str(id.as_str()).is_ok());
        let id = SessionId::from_client(None);
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn request_without_message_deserializes() {
        let req: ChatRequest = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(req.message, "");
        assert!(req.session_id.is_none());
    }

    #[test]
    fn evidence_renders_labelled_items_in_order() {
        let mut evidence = Evidence::new();
        evidence.push("virustotal_ip_report", &serde_json::json!({"status": "ok"}));
        evidence.push("abuseipdb_report", &serde_json::json!({"status": "unconfigured"}));

        assert_eq!(evidence.len(), 2);
        let value: serde_json::Value =
            serde_json::from_str(&evidence.render()).expect("rendered evidence is JSON");
        assert_eq!(value[0]["virustotal_ip_report"]["status"], "ok");
        assert_eq!(value[1]["abuseipdb_report"]["status"], "unconfigured");
        assert!(evidence.render().contains('\n'));
    }

    #[test]
    fn response_serializes_session_as_string() {
        let resp = ChatResponse {
            response: "hi".into(),
            session_id: SessionId::from_client(Some("abc")),
        };
        let json = serde_json::to_string(&resp).expect("serialize");
        assert_eq!(json, r#"{"response":"hi","session_id":"abc"}"#);
    }
}

//! Data model for captured mail: the message snapshot taken at the moment a
//! mail arrives, and the namespace derivation used to partition live feeds.
//!
//! Serialized field names match the capture wire format consumed by existing
//! UI clients (`ID`, `From`, `To`, `Content`, `Created`).
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Header carrying routing metadata. Its first value is expected to be a JSON
/// object whose `ms` field names the namespace the message belongs to.
pub const ROUTING_HEADER: &str = "X-Fields";

/// Stable identifier of a captured message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate a fresh identifier, qualified by the capturing host.
    #[must_use]
    pub fn generate(hostname: &str) -> Self {
        Self(format!("{}@{hostname}", Uuid::new_v4()))
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One hop of a mail path: the envelope sender or a recipient.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailPath {
    /// Relay hosts the message passed through.
    #[serde(rename = "Relays")]
    pub relays: Vec<String>,
    /// Local part of the address.
    #[serde(rename = "Mailbox")]
    pub mailbox: String,
    /// Domain part of the address.
    #[serde(rename = "Domain")]
    pub domain: String,
    /// Raw ESMTP parameters, if any.
    #[serde(rename = "Params")]
    pub params: String,
}

impl MailPath {
    /// A path with just a mailbox and domain.
    #[must_use]
    pub fn new(mailbox: &str, domain: &str) -> Self {
        Self {
            mailbox: mailbox.to_string(),
            domain: domain.to_string(),
            ..Self::default()
        }
    }

    /// The `mailbox@domain` form of this path.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}@{}", self.mailbox, self.domain)
    }
}

/// Parsed content of a captured message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    /// Header multimap, preserving repeated headers in arrival order.
    #[serde(rename = "Headers")]
    pub headers: HashMap<String, Vec<String>>,
    /// Message body.
    #[serde(rename = "Body")]
    pub body: String,
    /// Size of the raw message in bytes.
    #[serde(rename = "Size")]
    pub size: usize,
}

impl MessageContent {
    /// First value of the named header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Immutable snapshot of one stored message at the moment of capture. This is
/// the unit handed to the fan-out layer and pushed to live feeds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedMessage {
    /// Stable message identifier.
    #[serde(rename = "ID")]
    pub id: MessageId,
    /// Envelope sender.
    #[serde(rename = "From")]
    pub from: MailPath,
    /// Envelope recipients.
    #[serde(rename = "To")]
    pub to: Vec<MailPath>,
    /// Parsed message content.
    #[serde(rename = "Content")]
    pub content: MessageContent,
    /// Capture timestamp.
    #[serde(rename = "Created")]
    pub created: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RoutingFields {
    #[serde(default)]
    ms: String,
}

impl CapturedMessage {
    /// Build a message captured now, with a generated identifier.
    #[must_use]
    pub fn new(hostname: &str, from: MailPath, to: Vec<MailPath>, content: MessageContent) -> Self {
        Self {
            id: MessageId::generate(hostname),
            from,
            to,
            content,
            created: Utc::now(),
        }
    }

    /// Namespace this message belongs to, derived from the routing header.
    ///
    /// Missing header, an empty value list, or an unparsable value all yield
    /// the empty namespace, which matches no real subscriber.
    #[must_use]
    pub fn namespace(&self) -> String {
        let Some(raw) = self.content.header(ROUTING_HEADER) else {
            return String::new();
        };

        serde_json::from_str::<RoutingFields>(raw)
            .map(|fields| fields.ms)
            .unwrap_or_default()
    }
}

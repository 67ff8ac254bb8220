use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Participant role tag used by the export for the customer side.
pub const CUSTOMER_ROLE: &str = "customer";

/// Event types that never carry conversation text.
pub const SYSTEM_EVENT: &str = "system_message";
pub const FORM_EVENT: &str = "form";

/// Field name the pre-chat form uses for the phone number.
pub const PRECHAT_PHONE_FIELD: &str = "Phone Number";

// ---------------------------------------------------------------------------
// Raw export schema.
//
// The export is a nested, sparsely-populated structure; every field defaults
// so absence deserializes to an empty value and downstream code never probes
// for presence again.
// ---------------------------------------------------------------------------

/// One conversation as it appears in the raw export.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConversation {
    pub id: String,
    pub users: Vec<RawUser>,
    pub thread: RawThread,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawUser {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub visit: RawVisit,
    /// Session annotations arrive as a list of single-entry key/value maps.
    pub session_fields: Vec<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawVisit {
    pub referrer: String,
    pub ip: String,
    pub user_agent: String,
    pub geolocation: RawGeolocation,
    pub started_at: String,
    pub ended_at: String,
    pub last_pages: Vec<RawPage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawGeolocation {
    pub country: String,
    pub region: String,
    pub country_code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPage {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawThread {
    pub events: Vec<RawEvent>,
    pub properties: RawThreadProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawThreadProperties {
    pub routing: RawRouting,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawRouting {
    pub start_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: String,
    pub author_id: String,
    pub text: String,
    pub properties: RawEventProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawEventProperties {
    pub form_type: String,
    pub form_data: BTreeMap<String, serde_json::Value>,
    pub fields: Vec<RawFormField>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawFormField {
    pub name: String,
    pub answer: String,
}

// ---------------------------------------------------------------------------
// Derived domain types.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    Customer,
    Agent,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sender::Customer => write!(f, "Customer"),
            Sender::Agent => write!(f, "Agent"),
        }
    }
}

/// A text-bearing conversation message in original event order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Normalized UTC+8 display time, or the original string when
    /// normalization failed.
    pub time: String,
    /// Parsed instant; `None` exactly when the raw timestamp was unparsable
    /// or absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub sender: Sender,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Geolocation {
    pub country: String,
    pub region: String,
    pub country_code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisitMetadata {
    pub referrer: String,
    pub start_url: String,
    pub geolocation: Geolocation,
    /// Flattened session key/value annotations, original order preserved.
    pub session_annotations: Vec<(String, String)>,
}

/// Canonical intermediate unit produced by extraction and retained only when
/// it passes validity classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanedConversation {
    pub id: String,
    pub contact: ContactInfo,
    pub visit: VisitMetadata,
    pub messages: Vec<Message>,
}

/// SLA verdict for the first agent response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qualification {
    Qualified,
    Unqualified,
    NoReply,
    AnomalousTime,
}

impl std::fmt::Display for Qualification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Qualification::Qualified => write!(f, "qualified"),
            Qualification::Unqualified => write!(f, "unqualified"),
            Qualification::NoReply => write!(f, "no_reply"),
            Qualification::AnomalousTime => write!(f, "anomalous_time"),
        }
    }
}

/// First-response timing metrics, derived once per conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingResult {
    pub first_customer_time: Option<DateTime<Utc>>,
    pub first_agent_reply_time: Option<DateTime<Utc>>,
    pub latency_seconds: Option<f64>,
    pub qualification: Qualification,
}

/// Acquisition channel label, derived once from visit metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLabel {
    pub base_channel: String,
    pub is_paid: bool,
}

impl ChannelLabel {
    /// Combined `<base>_<paid|organic>` label.
    pub fn label(&self) -> String {
        if self.is_paid {
            format!("{}_paid", self.base_channel)
        } else {
            format!("{}_organic", self.base_channel)
        }
    }
}

/// Flat enriched record emitted for each retained conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub channel: String,
    pub referrer: String,
    pub start_url: String,
    pub country: String,
    pub region: String,
    /// Region doubles as city; the export carries no finer granularity.
    pub city: String,
    pub country_code: String,
    /// ISO-8601 UTC instant of the first message; sort key of the dataset.
    pub created_at: String,
    /// UTC+8 display time of the first message.
    pub started_on: String,
    pub messages_count: usize,
    pub has_email: bool,
    pub has_phone: bool,
    pub response_time_seconds: Option<f64>,
    pub sla_qualification: Qualification,
}

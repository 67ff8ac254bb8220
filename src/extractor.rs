use crate::timefmt;
use crate::types::{
    CleanedConversation, ContactInfo, Geolocation, Message, RawConversation, RawEvent, RawUser,
    Sender, VisitMetadata, CUSTOMER_ROLE, FORM_EVENT, PRECHAT_PHONE_FIELD, SYSTEM_EVENT,
};
use tracing::{debug, warn};

/// Why a raw conversation was dropped before validity classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No participant tagged with the customer role.
    NoCustomerParticipant,
    /// The event stream yielded no message authored by the customer.
    NoCustomerMessage,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoCustomerParticipant => write!(f, "no customer participant"),
            SkipReason::NoCustomerMessage => write!(f, "no customer message"),
        }
    }
}

/// Extraction output: the cleaned intermediate plus a count of timestamps
/// that fell back to their original string form.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub conversation: CleanedConversation,
    pub degraded_times: usize,
}

/// Walk one raw conversation into the flat intermediate shape.
///
/// Validity is not decided here; only structural eligibility is: a record
/// without a customer participant, or without a single customer-authored
/// message, is skipped entirely.
pub fn extract(raw: &RawConversation) -> std::result::Result<Extraction, SkipReason> {
    let customer = raw
        .users
        .iter()
        .find(|user| user.kind == CUSTOMER_ROLE)
        .ok_or(SkipReason::NoCustomerParticipant)?;

    let contact = resolve_contact(customer, &raw.thread.events);
    let visit = resolve_visit(raw, customer);
    let (messages, degraded_times) = build_messages(raw, customer);

    if !messages
        .iter()
        .any(|message| message.sender == Sender::Customer)
    {
        return Err(SkipReason::NoCustomerMessage);
    }

    debug!(
        conversation_id = %raw.id,
        messages = messages.len(),
        "Extracted conversation"
    );

    Ok(Extraction {
        conversation: CleanedConversation {
            id: raw.id.clone(),
            contact,
            visit,
            messages,
        },
        degraded_times,
    })
}

/// Contact resolution precedence: direct participant fields, then session
/// annotations, then form-submission events. Each source fills only
/// currently-empty fields; later sources never override.
fn resolve_contact(customer: &RawUser, events: &[RawEvent]) -> ContactInfo {
    let mut contact = ContactInfo {
        name: customer.name.trim().to_string(),
        email: customer.email.trim().to_string(),
        phone: customer.phone.trim().to_string(),
    };

    for annotation in &customer.session_fields {
        for (key, value) in annotation {
            let key = key.to_lowercase();
            if key.contains("email") {
                fill_if_empty(&mut contact.email, value);
            } else if key.contains("phone") || key.contains("mobile") || key.contains("telephone") {
                fill_if_empty(&mut contact.phone, value);
            }
        }
    }

    for event in events.iter().filter(|event| event.kind == FORM_EVENT) {
        // Standard forms carry a flat key/value map
        for (key, value) in &event.properties.form_data {
            let Some(value) = value.as_str() else { continue };
            match key.to_lowercase().as_str() {
                "name" => fill_if_empty(&mut contact.name, value),
                "email" => fill_if_empty(&mut contact.email, value),
                "phone" => fill_if_empty(&mut contact.phone, value),
                _ => {}
            }
        }
        // Pre-chat forms carry named/answered field pairs instead
        for field in &event.properties.fields {
            if field.name == PRECHAT_PHONE_FIELD {
                fill_if_empty(&mut contact.phone, &field.answer);
            } else if field.name.to_lowercase().contains("email") {
                fill_if_empty(&mut contact.email, &field.answer);
            }
        }
    }

    contact
}

fn fill_if_empty(slot: &mut String, value: &str) {
    if slot.is_empty() && !value.trim().is_empty() {
        *slot = value.trim().to_string();
    }
}

fn resolve_visit(raw: &RawConversation, customer: &RawUser) -> VisitMetadata {
    let visit = &customer.visit;

    // Routing carries the dedicated landing URL; fall back to the first of
    // the visit's last pages when it is absent.
    let start_url = if raw.thread.properties.routing.start_url.is_empty() {
        visit
            .last_pages
            .first()
            .map(|page| page.url.clone())
            .unwrap_or_default()
    } else {
        raw.thread.properties.routing.start_url.clone()
    };

    let session_annotations = customer
        .session_fields
        .iter()
        .flat_map(|annotation| {
            annotation
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
        })
        .collect();

    VisitMetadata {
        referrer: visit.referrer.clone(),
        start_url,
        geolocation: Geolocation {
            country: visit.geolocation.country.clone(),
            region: visit.geolocation.region.clone(),
            country_code: visit.geolocation.country_code.clone(),
        },
        session_annotations,
    }
}

/// Filter the event stream down to text-bearing messages, preserving order.
fn build_messages(raw: &RawConversation, customer: &RawUser) -> (Vec<Message>, usize) {
    let mut messages = Vec::new();
    let mut degraded = 0;

    for event in &raw.thread.events {
        if event.kind == SYSTEM_EVENT || event.kind == FORM_EVENT {
            continue;
        }
        let content = event.text.trim();
        if content.is_empty() {
            continue;
        }

        // Author id absent or non-matching means the agent side
        let sender = if !customer.id.is_empty() && event.author_id == customer.id {
            Sender::Customer
        } else {
            Sender::Agent
        };

        let timestamp = timefmt::parse_instant(&event.created_at);
        let time = match timestamp {
            Some(instant) => timefmt::format_display(instant),
            None if event.created_at.trim().is_empty() => String::new(),
            None => {
                warn!(
                    conversation_id = %raw.id,
                    raw = %event.created_at,
                    "Could not parse message timestamp, keeping original string"
                );
                degraded += 1;
                event.created_at.clone()
            }
        };

        messages.push(Message {
            time,
            timestamp,
            sender,
            content: content.to_string(),
        });
    }

    (messages, degraded)
}

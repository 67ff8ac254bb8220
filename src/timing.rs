use crate::types::{Message, Qualification, Sender, TimingResult};

/// Compute first-response metrics and the SLA verdict for one conversation.
///
/// Messages whose timestamp failed to parse are treated as absent. The first
/// agent message positioned after the first timed customer message decides
/// the verdict: a reply at or after the customer time yields a latency and a
/// threshold comparison; a reply timestamped before it is a clock anomaly.
pub fn analyze(messages: &[Message], sla_seconds: f64) -> TimingResult {
    let mut first_customer_time = None;
    let mut first_agent_reply_time = None;
    let mut saw_anomalous_reply = false;

    for message in messages {
        let Some(timestamp) = message.timestamp else {
            continue;
        };
        match message.sender {
            Sender::Customer => {
                if first_customer_time.is_none() {
                    first_customer_time = Some(timestamp);
                }
            }
            Sender::Agent => {
                if let Some(customer) = first_customer_time {
                    if timestamp >= customer {
                        first_agent_reply_time = Some(timestamp);
                        break;
                    }
                    // Reply timestamped before the customer message: a clock
                    // anomaly, not a qualifying reply
                    saw_anomalous_reply = true;
                    if first_agent_reply_time.is_none() {
                        first_agent_reply_time = Some(timestamp);
                    }
                }
            }
        }
    }

    let (latency_seconds, qualification) = match (first_customer_time, first_agent_reply_time) {
        (Some(customer), Some(reply)) if reply >= customer => {
            let latency = (reply - customer).num_milliseconds() as f64 / 1000.0;
            let latency = (latency * 100.0).round() / 100.0;
            let verdict = if latency <= sla_seconds {
                Qualification::Qualified
            } else {
                Qualification::Unqualified
            };
            (Some(latency), verdict)
        }
        (Some(_), Some(_)) if saw_anomalous_reply => (None, Qualification::AnomalousTime),
        _ => (None, Qualification::NoReply),
    };

    TimingResult {
        first_customer_time,
        first_agent_reply_time,
        latency_seconds,
        qualification,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timefmt;
    use chrono::{DateTime, Utc};

    fn message(sender: Sender, time: &str) -> Message {
        let timestamp: Option<DateTime<Utc>> = timefmt::parse_instant(time);
        Message {
            time: time.to_string(),
            timestamp,
            sender,
            content: "text".to_string(),
        }
    }

    #[test]
    fn test_reply_within_threshold_is_qualified() {
        let result = analyze(
            &[
                message(Sender::Customer, "2025-08-01T02:00:00Z"),
                message(Sender::Agent, "2025-08-01T02:00:29Z"),
            ],
            30.0,
        );
        assert_eq!(result.qualification, Qualification::Qualified);
        assert_eq!(result.latency_seconds, Some(29.0));
    }

    #[test]
    fn test_reply_past_threshold_is_unqualified() {
        let result = analyze(
            &[
                message(Sender::Customer, "2025-08-01T02:00:00Z"),
                message(Sender::Agent, "2025-08-01T02:00:31Z"),
            ],
            30.0,
        );
        assert_eq!(result.qualification, Qualification::Unqualified);
        assert_eq!(result.latency_seconds, Some(31.0));
    }

    #[test]
    fn test_no_agent_reply_is_no_reply() {
        let result = analyze(&[message(Sender::Customer, "2025-08-01T02:00:00Z")], 30.0);
        assert_eq!(result.qualification, Qualification::NoReply);
        assert!(result.latency_seconds.is_none());
        assert!(result.first_agent_reply_time.is_none());
    }

    #[test]
    fn test_no_messages_is_no_reply() {
        let result = analyze(&[], 30.0);
        assert_eq!(result.qualification, Qualification::NoReply);
        assert!(result.first_customer_time.is_none());
    }

    #[test]
    fn test_reply_before_customer_is_anomalous() {
        let result = analyze(
            &[
                message(Sender::Customer, "2025-08-01T02:00:30Z"),
                message(Sender::Agent, "2025-08-01T02:00:00Z"),
            ],
            30.0,
        );
        assert_eq!(result.qualification, Qualification::AnomalousTime);
        assert!(result.latency_seconds.is_none());
    }

    #[test]
    fn test_later_qualifying_reply_supersedes_anomalous_one() {
        let result = analyze(
            &[
                message(Sender::Customer, "2025-08-01T02:00:00Z"),
                message(Sender::Agent, "2025-08-01T01:59:50Z"),
                message(Sender::Agent, "2025-08-01T02:00:10Z"),
            ],
            30.0,
        );
        assert_eq!(result.qualification, Qualification::Qualified);
        assert_eq!(result.latency_seconds, Some(10.0));
    }

    #[test]
    fn test_agent_messages_before_customer_are_ignored() {
        let result = analyze(
            &[
                message(Sender::Agent, "2025-08-01T01:59:00Z"),
                message(Sender::Customer, "2025-08-01T02:00:00Z"),
                message(Sender::Agent, "2025-08-01T02:00:10Z"),
            ],
            30.0,
        );
        assert_eq!(result.qualification, Qualification::Qualified);
        assert_eq!(result.latency_seconds, Some(10.0));
    }

    #[test]
    fn test_untimed_messages_are_skipped() {
        let result = analyze(
            &[
                message(Sender::Customer, "garbage"),
                message(Sender::Customer, "2025-08-01T02:00:00Z"),
                message(Sender::Agent, ""),
                message(Sender::Agent, "2025-08-01T02:00:05Z"),
            ],
            30.0,
        );
        assert_eq!(result.qualification, Qualification::Qualified);
        assert_eq!(result.latency_seconds, Some(5.0));
    }

    #[test]
    fn test_fractional_latency_rounds_to_two_decimals() {
        let result = analyze(
            &[
                message(Sender::Customer, "2025-08-01T02:00:00.000Z"),
                message(Sender::Agent, "2025-08-01T02:00:12.345Z"),
            ],
            30.0,
        );
        assert_eq!(result.latency_seconds, Some(12.35));
    }
}

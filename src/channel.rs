use crate::types::ChannelLabel;
use once_cell::sync::Lazy;

/// Paid-click parameters injected by Google Ads.
static GOOGLE_PAID_PARAMS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "gclid=",
        "gad_source=",
        "gad_campaignid=",
        "gbraid=",
        "wbraid=",
    ]
});

/// Paid-click signals from Facebook/Meta placements.
static FACEBOOK_PAID_PARAMS: Lazy<Vec<&'static str>> = Lazy::new(|| vec!["fbclid=", "utm_source=fb"]);

/// Ordered base-channel table; first substring match wins.
static PLATFORM_TABLE: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("google", "google"),
        ("youtube", "youtube"),
        ("youtu.be", "youtube"),
        ("facebook", "facebook"),
        ("fb.com", "facebook"),
        ("instagram", "instagram"),
        ("bing", "bing"),
        ("yandex", "yandex"),
    ]
});

/// Classifies the acquisition channel from referrer and landing-URL signals.
pub struct ChannelAttributor {
    first_party_domain: String,
}

impl ChannelAttributor {
    pub fn new(first_party_domain: impl Into<String>) -> Self {
        Self {
            first_party_domain: first_party_domain.into().to_lowercase(),
        }
    }

    /// Derive the channel label from the referrer and landing URL.
    pub fn attribute(&self, referrer: &str, start_url: &str) -> ChannelLabel {
        let combined = format!("{} {}", referrer, start_url).to_lowercase();
        ChannelLabel {
            base_channel: self.base_channel(referrer),
            is_paid: is_paid(&combined),
        }
    }

    fn base_channel(&self, referrer: &str) -> String {
        if referrer.trim().is_empty() {
            return "direct".to_string();
        }
        let lowered = referrer.to_lowercase();
        for (needle, channel) in PLATFORM_TABLE.iter() {
            if lowered.contains(needle) {
                return channel.to_string();
            }
        }
        if !self.first_party_domain.is_empty() && lowered.contains(&self.first_party_domain) {
            return "website_internal".to_string();
        }
        match registrable_domain(&lowered) {
            Some(domain) => format!("website_{}", domain),
            None => "other".to_string(),
        }
    }
}

/// Membership test over the combined lowercased referrer + landing URL;
/// each paid family is independent.
fn is_paid(combined: &str) -> bool {
    let google_paid = GOOGLE_PAID_PARAMS
        .iter()
        .any(|param| combined.contains(param))
        || (combined.contains("utm_source=google") && combined.contains("utm_medium=cpc"));
    let facebook_paid = FACEBOOK_PAID_PARAMS
        .iter()
        .any(|param| combined.contains(param));
    let generic_paid = combined.contains("utm_campaign=");

    google_paid || facebook_paid || generic_paid
}

/// Authority of the referrer URL with any leading `www.` stripped.
fn registrable_domain(referrer: &str) -> Option<String> {
    let rest = referrer.split_once("://").map(|(_, rest)| rest)?;
    let authority = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    // Drop userinfo and port
    let host = authority.rsplit('@').next().unwrap_or(authority);
    let host = host.split(':').next().unwrap_or(host);
    let host = host.trim_start_matches("www.");
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributor() -> ChannelAttributor {
        ChannelAttributor::new("vertu.com")
    }

    #[test]
    fn test_empty_referrer_with_fb_utm_is_direct_paid() {
        let label = attributor().attribute("", "https://example.com/?utm_source=fb");
        assert_eq!(label.label(), "direct_paid");
    }

    #[test]
    fn test_google_referrer_with_gclid_is_google_paid() {
        let label = attributor().attribute(
            "https://www.google.com/",
            "https://example.com/?gclid=abc",
        );
        assert_eq!(label.label(), "google_paid");
    }

    #[test]
    fn test_google_referrer_without_paid_params_is_organic() {
        let label = attributor().attribute("https://www.google.com/", "https://example.com/");
        assert_eq!(label.label(), "google_organic");
        assert!(!label.is_paid);
    }

    #[test]
    fn test_google_utm_pair_requires_both_parts() {
        let paid = attributor().attribute(
            "https://www.google.com/",
            "https://example.com/?utm_source=google&utm_medium=cpc",
        );
        assert!(paid.is_paid);

        let organic = attributor().attribute(
            "https://www.google.com/",
            "https://example.com/?utm_source=google",
        );
        assert!(!organic.is_paid);
    }

    #[test]
    fn test_utm_campaign_alone_marks_paid() {
        let label = attributor().attribute(
            "https://duckduckgo.com/",
            "https://example.com/?utm_campaign=spring",
        );
        assert_eq!(label.label(), "website_duckduckgo.com_paid");
    }

    #[test]
    fn test_platform_table_order() {
        assert_eq!(
            attributor().attribute("https://youtu.be/xyz", "").base_channel,
            "youtube"
        );
        assert_eq!(
            attributor()
                .attribute("https://m.facebook.com/page", "")
                .base_channel,
            "facebook"
        );
        assert_eq!(
            attributor().attribute("https://yandex.ru/search", "").base_channel,
            "yandex"
        );
    }

    #[test]
    fn test_first_party_domain_is_internal() {
        let label = attributor().attribute("https://vertu.com/collections", "");
        assert_eq!(label.base_channel, "website_internal");
    }

    #[test]
    fn test_unknown_referrer_derives_website_domain() {
        let label = attributor().attribute("https://www.example.org/page?a=1", "");
        assert_eq!(label.base_channel, "website_example.org");
    }

    #[test]
    fn test_unparsable_referrer_is_other() {
        let label = attributor().attribute("not a url", "");
        assert_eq!(label.base_channel, "other");
        assert_eq!(label.label(), "other_organic");
    }
}

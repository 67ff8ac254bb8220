use crate::config::ValidityConfig;

/// Decides whether a conversation represents a genuine, non-test lead.
///
/// Exclusion rules run before any acceptance rule; after them a lead is
/// accepted iff it carries a plausible email or a plausible phone number.
/// Name-only records are never accepted.
pub struct LeadValidator {
    config: ValidityConfig,
}

impl LeadValidator {
    pub fn new(config: ValidityConfig) -> Self {
        Self { config }
    }

    pub fn is_valid_lead(&self, name: &str, email: &str, phone: &str, referrer: &str) -> bool {
        if self.is_test_email(email) || self.is_test_name(name) || self.is_admin_referrer(referrer)
        {
            return false;
        }
        self.has_plausible_email(email) || has_plausible_phone(phone)
    }

    fn is_test_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return false;
        }
        if self
            .config
            .denylisted_emails
            .iter()
            .any(|denied| email == denied.to_lowercase())
        {
            return true;
        }
        if self
            .config
            .test_domains
            .iter()
            .any(|domain| email.ends_with(&domain.to_lowercase()))
        {
            return true;
        }
        // qq.com addresses whose local part mentions "test" are QA traffic
        if let Some((local, domain)) = email.split_once('@') {
            if domain == "qq.com" && local.contains("test") {
                return true;
            }
        }
        false
    }

    fn is_test_name(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return false;
        }
        self.config
            .test_keywords
            .iter()
            .any(|keyword| name.contains(&keyword.to_lowercase()))
    }

    fn is_admin_referrer(&self, referrer: &str) -> bool {
        !self.config.admin_referrer_prefix.is_empty()
            && referrer.trim().starts_with(&self.config.admin_referrer_prefix)
    }

    fn has_plausible_email(&self, email: &str) -> bool {
        let email = email.trim();
        !email.is_empty() && email.contains('@')
    }
}

/// Any digit-bearing, non-URL phone string qualifies; no minimum digit count
/// is enforced.
fn has_plausible_phone(phone: &str) -> bool {
    let phone = phone.trim();
    if phone.is_empty() || phone.eq_ignore_ascii_case("n/a") {
        return false;
    }
    let lowered = phone.to_lowercase();
    if lowered.starts_with("http") || lowered.starts_with("www") {
        return false;
    }
    phone.chars().any(|c| c.is_ascii_digit())
}

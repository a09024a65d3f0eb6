use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Top-level configuration. Every table and threshold the evaluators use
/// lives here as immutable data handed to each evaluator at construction,
/// so tests can override any of it without touching global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP transport binds to.
    pub listen: String,
    /// Inputs above this many bytes are rejected before any parsing work.
    pub max_message_bytes: usize,
    /// Path of the sender-history table. Empty keeps history in memory only.
    pub sender_db: String,
    pub reputation: ReputationConfig,
    pub auth: AuthConfig,
    pub url: UrlConfig,
    pub content: ContentConfig,
    pub attachments: AttachmentConfig,
    pub sender_history: SenderHistoryConfig,
    pub anomaly: AnomalyConfig,
    pub spam: SpamConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen: "0.0.0.0:8080".to_string(),
            max_message_bytes: 50 * 1024 * 1024,
            sender_db: "mailtriage-senders.json".to_string(),
            reputation: ReputationConfig::default(),
            auth: AuthConfig::default(),
            url: UrlConfig::default(),
            content: ContentConfig::default(),
            attachments: AttachmentConfig::default(),
            sender_history: SenderHistoryConfig::default(),
            anomaly: AnomalyConfig::default(),
            spam: SpamConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read config file: {}", path.as_ref().display()))?;
        let mut config: Config =
            serde_yaml::from_str(&content).context("failed to parse config file")?;
        if config.reputation.api_key.is_none() {
            config.reputation.api_key = std::env::var("VIRUSTOTAL_API_KEY").ok();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("failed to write config file: {}", path.as_ref().display()))?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_message_bytes == 0 {
            anyhow::bail!("max_message_bytes must be non-zero");
        }
        if self.auth.max_score == 0
            || self.url.max_score == 0
            || self.content.max_score == 0
            || self.attachments.max_score == 0
            || self.anomaly.max_score == 0
            || self.spam.max_score == 0
        {
            anyhow::bail!("module score caps must be non-zero");
        }
        if self.url.max_urls == 0 {
            anyhow::bail!("url.max_urls must be non-zero");
        }
        Ok(())
    }
}

/// Optional external URL-reputation service. With no API key the lookup is
/// a no-op; lookup failures never fail an analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub timeout_seconds: u64,
    /// Only this many top-priority URLs are ever sent out per message.
    pub max_lookups: usize,
    /// Pause between consecutive lookups, for provider quota compliance.
    pub lookup_delay_ms: u64,
    /// Score added when the provider reports a URL malicious.
    pub hit_score: u32,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        ReputationConfig {
            api_key: None,
            api_url: "https://www.virustotal.com/api/v3/urls".to_string(),
            timeout_seconds: 10,
            max_lookups: 2,
            lookup_delay_ms: 1000,
            hit_score: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorCluster {
    pub vendor: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub max_score: u32,
    pub executive_keywords: Vec<String>,
    pub vendors: Vec<VendorCluster>,
    /// Local-part prefixes commonly used by spoofed service senders.
    pub spoofed_prefixes: Vec<String>,
    /// Domain prefixes that mark a sender domain as suspicious.
    pub suspicious_domain_prefixes: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            max_score: 50,
            executive_keywords: strings(&[
                "ceo",
                "cfo",
                "cto",
                "coo",
                "vp",
                "president",
                "director",
                "founder",
                "chairman",
                "managing director",
                "general counsel",
                "finance director",
                "chief",
                "executive",
                "owner",
                "partner",
                "general manager",
                "board member",
            ]),
            vendors: vec![
                VendorCluster {
                    vendor: "microsoft".to_string(),
                    keywords: strings(&["outlook", "office365", "sharepoint", "teams", "azure"]),
                },
                VendorCluster {
                    vendor: "google".to_string(),
                    keywords: strings(&["gmail", "drive", "workspace", "analytics"]),
                },
                VendorCluster {
                    vendor: "amazon".to_string(),
                    keywords: strings(&["aws", "amazon.com", "prime"]),
                },
                VendorCluster {
                    vendor: "apple".to_string(),
                    keywords: strings(&["icloud", "itunes", "appstore"]),
                },
                VendorCluster {
                    vendor: "paypal".to_string(),
                    keywords: strings(&["ebay", "checkout"]),
                },
                VendorCluster {
                    vendor: "bank".to_string(),
                    keywords: strings(&["security", "verify", "update", "confirm"]),
                },
            ],
            spoofed_prefixes: strings(&[
                "support-", "noreply-", "secure-", "verify-", "notify-", "billing-", "alert-",
                "admin-", "no-reply",
            ]),
            suspicious_domain_prefixes: strings(&["mail-", "secure-", "verify-", "support-"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlConfig {
    pub max_score: u32,
    /// Only the first `max_urls` extracted URLs are scored.
    pub max_urls: usize,
    pub suspicious_tlds: Vec<String>,
    pub shorteners: Vec<String>,
    /// Fixed misspelling-to-brand map for typosquat detection.
    pub typosquats: BTreeMap<String, String>,
    pub standard_ports: Vec<u16>,
}

impl Default for UrlConfig {
    fn default() -> Self {
        let mut typosquats = BTreeMap::new();
        for (typo, brand) in [
            ("amzaon", "amazon"),
            ("gogle", "google"),
            ("mircrosoft", "microsoft"),
            ("facbook", "facebook"),
            ("paypel", "paypal"),
        ] {
            typosquats.insert(typo.to_string(), brand.to_string());
        }
        UrlConfig {
            max_score: 45,
            max_urls: 15,
            suspicious_tlds: strings(&[
                ".tk", ".ml", ".ga", ".cf", ".gq", ".xyz", ".top", ".work", ".date", ".racing",
                ".webcam", ".download", ".science", ".click", ".space", ".review", ".win",
                ".party", ".bid", ".faith", ".accountant",
            ]),
            shorteners: strings(&[
                "bit.ly",
                "tinyurl.com",
                "short.link",
                "goo.gl",
                "ow.ly",
                "is.gd",
                "buff.ly",
                "adf.ly",
                "t.co",
                "ur1.ca",
            ]),
            typosquats,
            standard_ports: vec![80, 443, 8080, 3000, 8443],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub max_score: u32,
    pub urgency_keywords: Vec<String>,
    pub financial_keywords: Vec<String>,
    pub credential_keywords: Vec<String>,
    pub authority_keywords: Vec<String>,
    pub personal_identifiers: Vec<String>,
    pub quid_pro_quo_keywords: Vec<String>,
    pub scareware_keywords: Vec<String>,
    pub misspellings: Vec<String>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        ContentConfig {
            max_score: 40,
            urgency_keywords: strings(&[
                "urgent",
                "immediately",
                "action required",
                "suspend",
                "terminate",
                "expire",
                "critical",
                "warning",
                "emergency",
                "alert",
                "critical issue",
                "verify now",
                "confirm asap",
                "act immediately",
                "time sensitive",
                "only today",
                "limited availability",
                "respond now",
                "no delay",
            ]),
            financial_keywords: strings(&[
                "wire transfer",
                "bank details",
                "invoice",
                "payment",
                "account number",
                "routing number",
                "swift code",
                "iban",
                "credit card",
                "debit card",
                "bank account",
                "transfer funds",
                "money transfer",
                "payment processing",
                "refund",
                "reimbursement",
                "wire this amount",
            ]),
            credential_keywords: strings(&[
                "password",
                "verify your account",
                "click here to login",
                "confirm identity",
                "reset password",
                "update password",
                "authenticate",
                "verification needed",
                "security code",
                "confirm credentials",
                "sign in",
                "log in",
                "ssn",
                "social security",
                "id verification",
                "re-authenticate",
            ]),
            authority_keywords: strings(&[
                "compliance",
                "audit",
                "investigation",
                "federal agent",
                "irs",
                "fraud department",
                "security team",
                "legal",
                "lawsuit",
                "court",
                "jail",
                "prison",
                "arrest",
                "subpoena",
                "attorney",
                "financial crimes",
                "money laundering",
                "sanctions",
            ]),
            personal_identifiers: strings(&[
                "your account",
                "your email",
                "your password",
                "your information",
                "your transaction",
                "your order",
                "your bank",
                "your credit",
                "account 1234",
                "case #",
                "reference #",
                "transaction id",
            ]),
            quid_pro_quo_keywords: strings(&[
                "help you",
                "assist you",
                "support you",
                "benefit you",
                "advantage you",
                "special offer",
                "gift",
                "bonus",
                "reward",
                "exclusive access",
                "free",
                "no cost",
                "refund",
                "compensation",
                "claim prize",
            ]),
            scareware_keywords: strings(&[
                "malware detected",
                "virus found",
                "system compromised",
                "unauthorized access",
                "suspicious activity",
                "unusual login",
                "security breach",
                "security risk",
                "update required",
                "update windows",
                "update your browser",
                "critical update",
                "your pc is at risk",
                "your device is infected",
                "threat detected",
            ]),
            misspellings: strings(&[
                "clck",
                "clik",
                "chck",
                "veriffy",
                "verificaton",
                "confirmm",
                "confrim",
                "accout",
                "acount",
                "recieve",
                "occured",
                "shoudl",
                "neccessary",
                "accomodate",
                "desparate",
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentConfig {
    pub max_score: u32,
    pub dangerous_extensions: Vec<String>,
    pub macro_extensions: Vec<String>,
    /// Inner extensions that make a double-extension filename look benign.
    pub benign_inner_extensions: Vec<String>,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        AttachmentConfig {
            max_score: 15,
            dangerous_extensions: strings(&[
                ".exe", ".scr", ".bat", ".vbs", ".js", ".ps1", ".cmd", ".com", ".msi",
            ]),
            macro_extensions: strings(&[".docm", ".xlsm", ".pptm"]),
            benign_inner_extensions: strings(&[".pdf", ".doc", ".docx", ".xls", ".xlsx", ".txt"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderHistoryConfig {
    pub max_score: u32,
    pub first_time_score: u32,
}

impl Default for SenderHistoryConfig {
    fn default() -> Self {
        SenderHistoryConfig {
            max_score: 10,
            first_time_score: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub max_score: u32,
    /// Inclusive local-hour window considered a late-night send.
    pub late_hour_start: u32,
    pub late_hour_end: u32,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        AnomalyConfig {
            max_score: 30,
            late_hour_start: 2,
            late_hour_end: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpamCategory {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpamConfig {
    pub max_score: u32,
    /// Evaluated in order; the subject check stops at the first category hit.
    pub categories: Vec<SpamCategory>,
    pub generic_greetings: Vec<String>,
    pub free_mail_domains: Vec<String>,
    pub generic_sender_names: Vec<String>,
    pub dangerous_extensions: Vec<String>,
    pub financial_filename_words: Vec<String>,
    pub shorteners: Vec<String>,
}

impl Default for SpamConfig {
    fn default() -> Self {
        SpamConfig {
            max_score: 100,
            categories: vec![
                SpamCategory {
                    name: "marketing".to_string(),
                    keywords: strings(&[
                        "unsubscribe",
                        "marketing",
                        "promotional",
                        "deal",
                        "offer",
                        "discount",
                        "save now",
                        "limited time",
                        "act now",
                        "click here",
                        "call now",
                        "buy now",
                        "order now",
                        "exclusive offer",
                        "special promotion",
                    ]),
                },
                SpamCategory {
                    name: "newsletter".to_string(),
                    keywords: strings(&[
                        "newsletter",
                        "mailing list",
                        "subscribe",
                        "weekly digest",
                        "monthly report",
                        "news update",
                        "announcement",
                        "bulletin",
                        "publication",
                        "journal",
                    ]),
                },
                SpamCategory {
                    name: "advance-fee".to_string(),
                    keywords: strings(&[
                        "nigerian",
                        "lottery",
                        "inheritance",
                        "claim your prize",
                        "congratulations",
                        "you won",
                        "selected",
                        "beneficiary",
                        "advance fee",
                        "processing fee",
                        "update your account",
                        "verify your identity",
                        "confirm password",
                    ]),
                },
                SpamCategory {
                    name: "bulk-greeting".to_string(),
                    keywords: strings(&[
                        "dear customer",
                        "dear user",
                        "dear member",
                        "dear subscriber",
                        "dear valued",
                        "to whom it may concern",
                        "dear friend",
                    ]),
                },
            ],
            generic_greetings: strings(&[
                "dear customer",
                "dear user",
                "dear friend",
                "to whom it may concern",
                "dear valued",
                "dear sir/madam",
                "hello there",
            ]),
            free_mail_domains: strings(&[
                "gmail.com",
                "yahoo.com",
                "hotmail.com",
                "outlook.com",
                "aol.com",
            ]),
            generic_sender_names: strings(&[
                "noreply",
                "support",
                "info",
                "contact",
                "admin",
                "notification",
            ]),
            dangerous_extensions: strings(&[".exe", ".scr", ".vbs", ".bat", ".cmd", ".com"]),
            financial_filename_words: strings(&["invoice", "payment", "receipt", "bill"]),
            shorteners: strings(&["bit.ly", "tinyurl", "short.link", "goo.gl"]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.auth.max_score, 50);
        assert_eq!(config.url.max_score, 45);
        assert_eq!(config.content.max_score, 40);
        assert_eq!(config.attachments.max_score, 15);
        assert_eq!(config.sender_history.max_score, 10);
        assert_eq!(config.anomaly.max_score, 30);
        assert_eq!(config.spam.max_score, 100);
    }

    #[test]
    fn round_trips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.listen, config.listen);
        assert_eq!(back.url.suspicious_tlds, config.url.suspicious_tlds);
        assert_eq!(back.spam.categories.len(), 4);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: Config = serde_yaml::from_str("listen: \"127.0.0.1:9000\"\n").unwrap();
        assert_eq!(config.listen, "127.0.0.1:9000");
        assert_eq!(config.max_message_bytes, 50 * 1024 * 1024);
        assert!(!config.content.urgency_keywords.is_empty());
    }

    #[test]
    fn zero_cap_is_rejected() {
        let mut config = Config::default();
        config.spam.max_score = 0;
        assert!(config.validate().is_err());
    }
}

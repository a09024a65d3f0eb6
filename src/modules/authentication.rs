use crate::config::AuthConfig;
use crate::modules::{Evaluator, ModuleResult};
use crate::normalizer::{extract_domain, HeaderMap, StructuredEmail};
use regex::Regex;

pub const NAME: &str = "Authentication & Impersonation";

const SPF_FAIL_SCORE: u32 = 8;
const DKIM_FAIL_SCORE: u32 = 8;
const DMARC_FAIL_SCORE: u32 = 10;
const AUTH_HEADER_CEILING: u32 = 15;
const DISPLAY_NAME_SPOOF_SCORE: u32 = 8;
const EXEC_SUSPICIOUS_DOMAIN_SCORE: u32 = 16;
const EXEC_MALFORMED_ADDRESS_SCORE: u32 = 12;
const EXEC_EXTERNAL_SCORE: u32 = 8;
const VENDOR_SPOOFED_PATTERN_SCORE: u32 = 14;
const VENDOR_EXTERNAL_DOMAIN_SCORE: u32 = 10;
const DOMAIN_MISMATCH_SCORE: u32 = 4;
const REPLY_TO_REDIRECT_SCORE: u32 = 6;
const MISSING_HEADER_SCORE: u32 = 2;
const BAD_ADDRESS_SHAPE_SCORE: u32 = 3;
const REPUTATION_CEILING: u32 = 8;

/// Header-level authentication results plus the impersonation heuristics:
/// display-name spoofing, executive-title abuse, vendor mimicry, and
/// From/Return-Path/Reply-To inconsistencies.
pub struct AuthenticationEvaluator {
    cfg: AuthConfig,
    email_token: Regex,
    address_shape: Regex,
}

impl AuthenticationEvaluator {
    pub fn new(cfg: AuthConfig) -> anyhow::Result<Self> {
        Ok(AuthenticationEvaluator {
            cfg,
            email_token: Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")?,
            address_shape: Regex::new(r"^[^@]+@[^@]+\.[a-z]{2,}$")?,
        })
    }

    /// `Authentication-Results` is matched permissively as substrings, not
    /// parsed against the RFC grammar.
    fn check_authentication_results(&self, headers: &HeaderMap) -> u32 {
        let auth_results = headers
            .get("Authentication-Results")
            .unwrap_or_default()
            .to_lowercase();

        let mut score = 0;
        if auth_results.contains("spf=fail") || auth_results.contains("spf=softfail") {
            score += SPF_FAIL_SCORE;
        }
        if auth_results.contains("dkim=fail") {
            score += DKIM_FAIL_SCORE;
        }
        if auth_results.contains("dmarc=fail") {
            score += DMARC_FAIL_SCORE;
        }
        score.min(AUTH_HEADER_CEILING)
    }

    /// Split a From value into display name and angle-bracket address.
    fn split_from(from_header: &str) -> Option<(String, String)> {
        let start = from_header.find('<')?;
        let end = from_header.rfind('>')?;
        if end <= start {
            return None;
        }
        let address = from_header[start + 1..end].trim().to_lowercase();
        let display = from_header[..start].trim().trim_matches('"').to_string();
        Some((display, address))
    }

    /// Email-looking tokens inside the display name that differ from the
    /// actual sending address are a classic reader deception.
    fn check_display_name_spoofing(&self, from_header: &str) -> (u32, Vec<String>) {
        let Some((display, address)) = Self::split_from(from_header) else {
            return (0, Vec::new());
        };
        let display_lower = display.to_lowercase();

        let mut score = 0;
        let mut findings = Vec::new();
        for token in self.email_token.find_iter(&display_lower) {
            if token.as_str() != address {
                score += DISPLAY_NAME_SPOOF_SCORE;
                findings.push(format!(
                    "Display name spoofing: '{}' shown but actual sender is '{}'",
                    token.as_str(),
                    address
                ));
            }
        }
        (score, findings)
    }

    fn is_suspicious_domain(&self, domain: &str) -> bool {
        domain.ends_with(".tk")
            || domain.ends_with(".ml")
            || (domain.contains('-') && domain.split('-').count() > 3)
            || domain.matches('-').count() > 2
            || domain.len() > 30
            || self
                .cfg
                .suspicious_domain_prefixes
                .iter()
                .any(|p| domain.starts_with(p.as_str()))
    }

    /// Only the first matching executive keyword counts.
    fn check_executive_impersonation(&self, from_header: &str) -> (u32, Option<String>) {
        let Some((display, address)) = Self::split_from(from_header) else {
            return (0, None);
        };
        let display_lower = display.to_lowercase();

        for keyword in &self.cfg.executive_keywords {
            if !display_lower.contains(keyword.as_str()) {
                continue;
            }
            return match address.split('@').nth(1) {
                Some(domain) if self.is_suspicious_domain(domain) => (
                    EXEC_SUSPICIOUS_DOMAIN_SCORE,
                    Some(format!(
                        "Executive impersonation: '{display}' with suspicious domain '{domain}'"
                    )),
                ),
                None => (
                    EXEC_MALFORMED_ADDRESS_SCORE,
                    Some("Invalid sender format masquerading as executive".to_string()),
                ),
                Some(_) => (
                    EXEC_EXTERNAL_SCORE,
                    Some(format!(
                        "Potential executive impersonation: {keyword} from external domain"
                    )),
                ),
            };
        }
        (0, None)
    }

    /// Body mentions a vendor's product keywords while the sender does not
    /// belong to that vendor. First matching vendor wins.
    fn check_vendor_impersonation(&self, from_header: &str, body: &str) -> (u32, Option<String>) {
        let from_lower = from_header.to_lowercase();
        let body_lower = body.to_lowercase();

        for cluster in &self.cfg.vendors {
            let mentioned = cluster
                .keywords
                .iter()
                .any(|kw| body_lower.contains(kw.as_str()));
            if !mentioned {
                continue;
            }
            // Sender naming the vendor is most likely the vendor itself.
            if from_lower.contains(cluster.vendor.as_str()) {
                continue;
            }

            if self
                .cfg
                .spoofed_prefixes
                .iter()
                .any(|p| from_lower.contains(p.as_str()))
            {
                return (
                    VENDOR_SPOOFED_PATTERN_SCORE,
                    Some(format!(
                        "Impersonates {}: spoofed sender pattern in From header",
                        cluster.vendor
                    )),
                );
            }
            if let Some(domain) = extract_domain(from_header) {
                let vendor_compact = cluster.vendor.replace(' ', "");
                if !domain.starts_with(&vendor_compact) {
                    return (
                        VENDOR_EXTERNAL_DOMAIN_SCORE,
                        Some(format!(
                            "Mentions {} but sent from '{}'",
                            cluster.vendor, domain
                        )),
                    );
                }
            }
        }
        (0, None)
    }

    fn check_domain_consistency(&self, headers: &HeaderMap) -> u32 {
        let from = headers.get("From").and_then(extract_domain);
        let return_path = headers.get("Return-Path").and_then(extract_domain);
        let reply_to = headers.get("Reply-To").and_then(extract_domain);

        let mut mismatches = 0;
        if let (Some(f), Some(r)) = (&from, &return_path) {
            if f != r {
                mismatches += 1;
            }
        }
        if let (Some(f), Some(r)) = (&from, &reply_to) {
            if f != r {
                mismatches += 1;
            }
        }
        mismatches * DOMAIN_MISMATCH_SCORE
    }

    fn check_reply_to_redirection(&self, headers: &HeaderMap) -> u32 {
        let (Some(from), Some(reply_to)) = (headers.get("From"), headers.get("Reply-To")) else {
            return 0;
        };
        if from.eq_ignore_ascii_case(reply_to) {
            return 0;
        }
        match (extract_domain(from), extract_domain(reply_to)) {
            (Some(f), Some(r)) if f != r => REPLY_TO_REDIRECT_SCORE,
            _ => 0,
        }
    }

    fn check_reputation_anomalies(&self, headers: &HeaderMap, sender_address: &str) -> u32 {
        let mut score = 0;
        if !headers.contains("Message-ID") {
            score += MISSING_HEADER_SCORE;
        }
        if !headers.contains("Date") {
            score += MISSING_HEADER_SCORE;
        }
        if !headers.contains("Subject") {
            score += MISSING_HEADER_SCORE;
        }
        if !self.address_shape.is_match(sender_address) {
            score += BAD_ADDRESS_SHAPE_SCORE;
        }
        score.min(REPUTATION_CEILING)
    }
}

impl Evaluator for AuthenticationEvaluator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn max_score(&self) -> u32 {
        self.cfg.max_score
    }

    fn evaluate(&self, email: &StructuredEmail) -> ModuleResult {
        let mut score = 0;
        let mut findings = Vec::new();

        let auth_score = self.check_authentication_results(&email.headers);
        score += auth_score;
        if auth_score > 0 {
            findings.push(format!("Authentication failed: {auth_score} points"));
        }

        let (spoof_score, spoof_findings) = self.check_display_name_spoofing(&email.sender);
        score += spoof_score;
        findings.extend(spoof_findings);

        let (exec_score, exec_finding) = self.check_executive_impersonation(&email.sender);
        score += exec_score;
        findings.extend(exec_finding);

        let (vendor_score, vendor_finding) =
            self.check_vendor_impersonation(&email.sender, email.analysis_text());
        score += vendor_score;
        findings.extend(vendor_finding);

        let consistency_score = self.check_domain_consistency(&email.headers);
        score += consistency_score;
        if consistency_score > 0 {
            findings.push(format!(
                "Domain inconsistency detected: {consistency_score} points"
            ));
        }

        let reply_to_score = self.check_reply_to_redirection(&email.headers);
        score += reply_to_score;
        if reply_to_score > 0 {
            findings.push("Reply-To address differs from sender (redirection risk)".to_string());
        }

        let sender_address = crate::normalizer::extract_address(&email.sender);
        let reputation_score = self.check_reputation_anomalies(&email.headers, sender_address);
        score += reputation_score;
        if reputation_score > 0 {
            findings.push(format!("Sender reputation issues: {reputation_score} points"));
        }

        ModuleResult::new(NAME, score.min(self.cfg.max_score), findings)
    }
}

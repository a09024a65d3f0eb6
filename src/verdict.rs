use serde::Serialize;

/// Phishing severity derived from the aggregated module score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhishingLevel {
    Critical,
    High,
    Medium,
    Low,
    Minimal,
}

impl PhishingLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 70 => PhishingLevel::Critical,
            s if s >= 50 => PhishingLevel::High,
            s if s >= 30 => PhishingLevel::Medium,
            s if s >= 10 => PhishingLevel::Low,
            _ => PhishingLevel::Minimal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpamLevel {
    LikelySpam,
    Suspicious,
    LowRisk,
    NotSpam,
}

impl SpamLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 80 => SpamLevel::LikelySpam,
            s if s >= 50 => SpamLevel::Suspicious,
            s if s >= 30 => SpamLevel::LowRisk,
            _ => SpamLevel::NotSpam,
        }
    }
}

/// Final categorical verdict. Phishing outranks spam: a message scoring into
/// both buckets is handled as phishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    MaliciousPhishing,
    SuspiciousPhishing,
    LikelySpam,
    SuspiciousSpam,
    Legitimate,
}

pub fn classify(phishing_score: u32, spam_score: u32) -> Classification {
    if phishing_score >= 70 {
        Classification::MaliciousPhishing
    } else if phishing_score >= 40 {
        Classification::SuspiciousPhishing
    } else if spam_score >= 80 {
        Classification::LikelySpam
    } else if spam_score >= 50 {
        Classification::SuspiciousSpam
    } else {
        Classification::Legitimate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendedAction {
    Block,
    Verify,
    Quarantine,
    Review,
    Accept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub action: RecommendedAction,
    pub reason: &'static str,
    pub severity: Severity,
}

impl Classification {
    pub fn recommendation(self) -> Recommendation {
        match self {
            Classification::MaliciousPhishing => Recommendation {
                action: RecommendedAction::Block,
                reason: "High confidence phishing attempt detected",
                severity: Severity::Critical,
            },
            Classification::SuspiciousPhishing => Recommendation {
                action: RecommendedAction::Verify,
                reason: "Phishing indicators detected - verify sender out-of-band",
                severity: Severity::High,
            },
            Classification::LikelySpam => Recommendation {
                action: RecommendedAction::Quarantine,
                reason: "High probability of unsolicited marketing or spam",
                severity: Severity::Medium,
            },
            Classification::SuspiciousSpam => Recommendation {
                action: RecommendedAction::Review,
                reason: "Possible spam - review before trusting",
                severity: Severity::Medium,
            },
            Classification::Legitimate => Recommendation {
                action: RecommendedAction::Accept,
                reason: "No significant security concerns detected",
                severity: Severity::Low,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PhishingSummary {
    pub score: u32,
    pub level: PhishingLevel,
    pub findings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpamSummary {
    pub score: u32,
    pub level: SpamLevel,
    pub probability: f64,
    pub findings: Vec<String>,
}

impl SpamSummary {
    pub fn from_score(score: u32, findings: Vec<String>) -> Self {
        SpamSummary {
            score,
            level: SpamLevel::from_score(score),
            probability: (score as f64 / 100.0 * 100.0).round() / 100.0,
            findings,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub classification: Classification,
    pub phishing: PhishingSummary,
    pub spam: SpamSummary,
    pub recommendation: Recommendation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phishing_level_thresholds_are_inclusive() {
        assert_eq!(PhishingLevel::from_score(70), PhishingLevel::Critical);
        assert_eq!(PhishingLevel::from_score(69), PhishingLevel::High);
        assert_eq!(PhishingLevel::from_score(50), PhishingLevel::High);
        assert_eq!(PhishingLevel::from_score(49), PhishingLevel::Medium);
        assert_eq!(PhishingLevel::from_score(30), PhishingLevel::Medium);
        assert_eq!(PhishingLevel::from_score(10), PhishingLevel::Low);
        assert_eq!(PhishingLevel::from_score(9), PhishingLevel::Minimal);
        assert_eq!(PhishingLevel::from_score(0), PhishingLevel::Minimal);
    }

    #[test]
    fn spam_level_thresholds() {
        assert_eq!(SpamLevel::from_score(80), SpamLevel::LikelySpam);
        assert_eq!(SpamLevel::from_score(79), SpamLevel::Suspicious);
        assert_eq!(SpamLevel::from_score(50), SpamLevel::Suspicious);
        assert_eq!(SpamLevel::from_score(30), SpamLevel::LowRisk);
        assert_eq!(SpamLevel::from_score(29), SpamLevel::NotSpam);
    }

    #[test]
    fn classification_gives_phishing_priority() {
        assert_eq!(classify(70, 0), Classification::MaliciousPhishing);
        assert_eq!(classify(69, 0), Classification::SuspiciousPhishing);
        assert_eq!(classify(40, 95), Classification::SuspiciousPhishing);
        assert_eq!(classify(39, 80), Classification::LikelySpam);
        assert_eq!(classify(0, 79), Classification::SuspiciousSpam);
        assert_eq!(classify(0, 50), Classification::SuspiciousSpam);
        assert_eq!(classify(0, 49), Classification::Legitimate);
        assert_eq!(classify(0, 0), Classification::Legitimate);
    }

    #[test]
    fn recommendations_match_classification() {
        assert_eq!(
            Classification::MaliciousPhishing.recommendation().action,
            RecommendedAction::Block
        );
        assert_eq!(
            Classification::SuspiciousPhishing.recommendation().action,
            RecommendedAction::Verify
        );
        assert_eq!(
            Classification::LikelySpam.recommendation().action,
            RecommendedAction::Quarantine
        );
        assert_eq!(
            Classification::SuspiciousSpam.recommendation().action,
            RecommendedAction::Review
        );
        assert_eq!(
            Classification::Legitimate.recommendation().action,
            RecommendedAction::Accept
        );
    }

    #[test]
    fn spam_probability_is_score_over_one_hundred() {
        assert_eq!(SpamSummary::from_score(0, Vec::new()).probability, 0.0);
        assert_eq!(SpamSummary::from_score(37, Vec::new()).probability, 0.37);
        assert_eq!(SpamSummary::from_score(100, Vec::new()).probability, 1.0);
    }

    #[test]
    fn levels_serialize_in_wire_format() {
        assert_eq!(
            serde_json::to_string(&Classification::MaliciousPhishing).unwrap(),
            "\"MALICIOUS_PHISHING\""
        );
        assert_eq!(
            serde_json::to_string(&SpamLevel::LikelySpam).unwrap(),
            "\"LIKELY_SPAM\""
        );
        assert_eq!(
            serde_json::to_string(&RecommendedAction::Block).unwrap(),
            "\"BLOCK\""
        );
    }
}

use crate::config::ContentConfig;
use crate::modules::{keyword_hits, Evaluator, ModuleResult};
use crate::normalizer::StructuredEmail;
use regex::Regex;

pub const NAME: &str = "Content & Social Engineering";

const URGENCY_HIGH: u32 = 15;
const URGENCY_MEDIUM: u32 = 8;
const FINANCIAL_HIGH: u32 = 12;
const FINANCIAL_LOW: u32 = 8;
const CREDENTIAL_HIGH: u32 = 18;
const CREDENTIAL_LOW: u32 = 12;
const AUTHORITY_HIGH: u32 = 16;
const AUTHORITY_LOW: u32 = 8;
const PERSONALIZATION_SCORE: u32 = 10;
const QUID_PRO_QUO_SCORE: u32 = 12;
const SCAREWARE_HIGH: u32 = 14;
const SCAREWARE_LOW: u32 = 6;
const COMPOSITE_SCORE: u32 = 5;
const TYPO_HIGH: u32 = 8;
const TYPO_LOW: u32 = 3;
const EMOJI_HIGH: u32 = 6;
const EMOJI_LOW: u32 = 2;

/// Social-engineering language over subject and body: categorized keyword
/// dictionaries with tiered thresholds, an urgency amplification bonus,
/// a misspelling scan, and an emoji-density scan.
pub struct ContentEvaluator {
    cfg: ContentConfig,
    emoji: Regex,
}

impl ContentEvaluator {
    pub fn new(cfg: ContentConfig) -> anyhow::Result<Self> {
        Ok(ContentEvaluator {
            cfg,
            emoji: Regex::new(r"[\x{1F300}-\x{1F9FF}\x{2600}-\x{27BF}]")?,
        })
    }

    fn misspelling_score(&self, text: &str) -> u32 {
        let hits = keyword_hits(text, &self.cfg.misspellings);
        if hits >= 3 {
            TYPO_HIGH
        } else if hits >= 1 {
            TYPO_LOW
        } else {
            0
        }
    }

    fn emoji_score(&self, text: &str) -> u32 {
        let count = self.emoji.find_iter(text).count();
        if count > 10 {
            EMOJI_HIGH
        } else if count > 5 {
            EMOJI_LOW
        } else {
            0
        }
    }
}

impl Evaluator for ContentEvaluator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn max_score(&self) -> u32 {
        self.cfg.max_score
    }

    fn evaluate(&self, email: &StructuredEmail) -> ModuleResult {
        let body = email.analysis_text();
        let text = format!("{} {}", email.subject, body).to_lowercase();

        let mut score = 0;
        let mut findings = Vec::new();

        let urgency = keyword_hits(&text, &self.cfg.urgency_keywords);
        if urgency >= 3 {
            score += URGENCY_HIGH;
            findings.push(format!("Extreme urgency language ({urgency} keywords)"));
        } else if urgency == 2 {
            score += URGENCY_MEDIUM;
            findings.push("Multiple urgency keywords detected".to_string());
        }

        let financial = keyword_hits(&text, &self.cfg.financial_keywords);
        if financial >= 2 {
            score += FINANCIAL_HIGH;
            findings.push(format!(
                "Multiple financial transaction indicators ({financial} keywords)"
            ));
        } else if financial == 1 {
            score += FINANCIAL_LOW;
            findings.push("Financial transaction request detected".to_string());
        }

        let credential = keyword_hits(&text, &self.cfg.credential_keywords);
        if credential >= 2 {
            score += CREDENTIAL_HIGH;
            findings.push(format!(
                "Credential harvesting attack detected ({credential} keywords)"
            ));
        } else if credential == 1 {
            score += CREDENTIAL_LOW;
            findings.push("Login/credential verification request".to_string());
        }

        let authority = keyword_hits(&text, &self.cfg.authority_keywords);
        if authority >= 2 {
            score += AUTHORITY_HIGH;
            findings.push(format!(
                "Authority impersonation (agencies, courts): {authority} keywords"
            ));
        } else if authority == 1 {
            score += AUTHORITY_LOW;
            findings.push("Impersonates authority figure".to_string());
        }

        let personal = keyword_hits(&text, &self.cfg.personal_identifiers);
        if personal >= 3 {
            score += PERSONALIZATION_SCORE;
            findings.push(format!(
                "Attempts to appear personalized with {personal} personal identifiers"
            ));
        }

        let quid_pro_quo = keyword_hits(&text, &self.cfg.quid_pro_quo_keywords);
        if quid_pro_quo >= 3 && urgency >= 1 {
            score += QUID_PRO_QUO_SCORE;
            findings.push("Quid pro quo pattern: offers benefit in exchange for action".to_string());
        }

        let scareware = keyword_hits(&text, &self.cfg.scareware_keywords);
        if scareware >= 2 {
            score += SCAREWARE_HIGH;
            findings.push(format!(
                "Scareware/fear-based manipulation ({scareware} keywords)"
            ));
        } else if scareware == 1 {
            score += SCAREWARE_LOW;
            findings.push("Uses fear/security threat language".to_string());
        }

        // Urgency alone is weak; combined with a money or credential ask it
        // is the classic pressure pattern.
        if urgency > 0 && (financial > 0 || credential > 0 || authority > 0) {
            score += COMPOSITE_SCORE;
            findings.push("Combines urgency with suspicious request pattern".to_string());
        }

        let typo_score = self.misspelling_score(&text);
        if typo_score > 0 {
            score += typo_score;
            findings.push("Poor spelling typical of template phishing".to_string());
        }

        let emoji_score = self.emoji_score(body);
        if emoji_score > 0 {
            score += emoji_score;
            findings.push("Excessive emoji/unicode characters".to_string());
        }

        ModuleResult::new(NAME, score.min(self.cfg.max_score), findings)
    }
}

use crate::config::{Config, ReputationConfig};
use crate::history::SenderHistory;
use crate::modules::{
    anomaly::AnomalyEvaluator, attachments::AttachmentEvaluator,
    authentication::AuthenticationEvaluator, content::ContentEvaluator,
    sender_history::SenderHistoryEvaluator, spam::SpamEvaluator,
    url_reputation::UrlReputationEvaluator, Evaluator, ModuleResult,
};
use crate::normalizer::StructuredEmail;
use crate::reputation::{ReputationLookup, VirusTotalClient};
use crate::verdict::{classify, PhishingLevel, PhishingSummary, SpamSummary, Verdict};
use serde::Serialize;
use std::sync::Arc;

const MAX_PHISHING_SCORE: u32 = 100;
const MAX_PHISHING_FINDINGS: usize = 20;

/// Message facts reported alongside the verdict. Never includes body
/// content.
#[derive(Debug, Clone, Serialize)]
pub struct MessageMetadata {
    pub sender: String,
    pub subject: String,
    pub has_attachments: bool,
    pub attachment_count: usize,
    pub url_count: usize,
}

/// Verdict plus the per-module breakdown for one analyzed message.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub classification: crate::verdict::Classification,
    pub phishing: PhishingSummary,
    pub spam: SpamSummary,
    pub recommendation: crate::verdict::Recommendation,
    pub metadata: MessageMetadata,
    pub modules: Vec<ModuleResult>,
}

impl AnalysisReport {
    pub fn verdict(&self) -> Verdict {
        Verdict {
            classification: self.classification,
            phishing: self.phishing.clone(),
            spam: self.spam.clone(),
            recommendation: self.recommendation.clone(),
        }
    }
}

/// Fan-out over the scoring modules and fan-in to one verdict.
///
/// Module order is fixed at construction; findings concatenate in that order
/// so reports are reproducible run to run.
pub struct AnalysisEngine {
    authentication: AuthenticationEvaluator,
    url_reputation: UrlReputationEvaluator,
    content: ContentEvaluator,
    attachments: AttachmentEvaluator,
    sender_history: SenderHistoryEvaluator,
    anomaly: AnomalyEvaluator,
    spam: SpamEvaluator,
    reputation: Option<Arc<dyn ReputationLookup>>,
    reputation_cfg: ReputationConfig,
}

impl AnalysisEngine {
    pub fn new(config: &Config, store: Arc<dyn SenderHistory>) -> anyhow::Result<Self> {
        let reputation: Option<Arc<dyn ReputationLookup>> = match &config.reputation.api_key {
            Some(key) if !key.is_empty() => {
                log::info!("external URL reputation lookups enabled");
                Some(Arc::new(VirusTotalClient::new(
                    &config.reputation,
                    key.clone(),
                )?))
            }
            _ => None,
        };

        Ok(AnalysisEngine {
            authentication: AuthenticationEvaluator::new(config.auth.clone())?,
            url_reputation: UrlReputationEvaluator::new(config.url.clone())?,
            content: ContentEvaluator::new(config.content.clone())?,
            attachments: AttachmentEvaluator::new(config.attachments.clone()),
            sender_history: SenderHistoryEvaluator::new(config.sender_history.clone(), store),
            anomaly: AnomalyEvaluator::new(config.anomaly.clone())?,
            spam: SpamEvaluator::new(config.spam.clone())?,
            reputation,
            reputation_cfg: config.reputation.clone(),
        })
    }

    /// Swap the reputation backend; tests install fakes through this.
    pub fn with_reputation(mut self, lookup: Arc<dyn ReputationLookup>) -> Self {
        self.reputation = Some(lookup);
        self
    }

    fn phishing_evaluators(&self) -> [&dyn Evaluator; 6] {
        [
            &self.authentication,
            &self.url_reputation,
            &self.content,
            &self.attachments,
            &self.sender_history,
            &self.anomaly,
        ]
    }

    pub async fn analyze(&self, email: &StructuredEmail) -> AnalysisReport {
        let mut results: Vec<ModuleResult> = self
            .phishing_evaluators()
            .iter()
            .map(|evaluator| {
                let result = evaluator.evaluate(email);
                log::debug!("{}: {} points", result.module, result.score);
                result
            })
            .collect();

        // External reputation runs last, after the cheap local checks, and
        // only while the URL module still has headroom under its cap.
        if self.reputation.is_some() {
            self.augment_url_reputation(email, &mut results).await;
        }

        let phishing_score = results
            .iter()
            .map(|r| r.score)
            .sum::<u32>()
            .min(MAX_PHISHING_SCORE);
        let phishing_findings: Vec<String> = results
            .iter()
            .flat_map(|r| r.findings.iter().cloned())
            .take(MAX_PHISHING_FINDINGS)
            .collect();

        let spam_result = self.spam.evaluate(email);
        let spam = SpamSummary::from_score(spam_result.score, spam_result.findings.clone());

        let classification = classify(phishing_score, spam.score);
        let recommendation = classification.recommendation();
        log::info!(
            "analysis complete: {:?} (phishing {}, spam {})",
            classification,
            phishing_score,
            spam.score
        );

        let metadata = MessageMetadata {
            sender: email.sender.clone(),
            subject: email.subject.clone(),
            has_attachments: !email.attachments.is_empty(),
            attachment_count: email.attachments.len(),
            url_count: email.urls.len(),
        };

        results.push(spam_result);
        AnalysisReport {
            classification,
            phishing: PhishingSummary {
                score: phishing_score,
                level: PhishingLevel::from_score(phishing_score),
                findings: phishing_findings,
            },
            spam,
            recommendation,
            metadata,
            modules: results,
        }
    }

    async fn augment_url_reputation(&self, email: &StructuredEmail, results: &mut [ModuleResult]) {
        let Some(lookup) = &self.reputation else {
            return;
        };
        let Some(url_result) = results
            .iter_mut()
            .find(|r| r.module == crate::modules::url_reputation::NAME)
        else {
            return;
        };
        let cap = self.url_reputation.max_score();
        if url_result.score >= cap {
            return;
        }

        let candidates = self.url_reputation.extract(email.analysis_text());
        let max_lookups = self.reputation_cfg.max_lookups.min(candidates.len());
        for (index, url) in candidates.iter().take(max_lookups).enumerate() {
            match lookup.is_malicious(url).await {
                Ok(true) => {
                    url_result.score = (url_result.score + self.reputation_cfg.hit_score).min(cap);
                    url_result
                        .findings
                        .push(format!("Reputation provider flagged URL: {url}"));
                    break;
                }
                Ok(false) => {}
                Err(e) => {
                    // No signal is acceptable; a failed lookup never fails
                    // the analysis.
                    log::warn!("reputation lookup degraded to no-op: {e}");
                }
            }
            if index + 1 < max_lookups && self.reputation_cfg.lookup_delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(
                    self.reputation_cfg.lookup_delay_ms,
                ))
                .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::history::InMemorySenderHistory;
    use crate::normalizer::parse_message;
    use crate::verdict::{Classification, RecommendedAction};
    use async_trait::async_trait;

    fn engine() -> AnalysisEngine {
        let mut config = Config::default();
        config.reputation.lookup_delay_ms = 0;
        AnalysisEngine::new(&config, Arc::new(InMemorySenderHistory::new())).unwrap()
    }

    fn clean_email() -> StructuredEmail {
        parse_message(
            concat!(
                "From: Alice Smith <alice@example.com>\r\n",
                "To: bob@example.com\r\n",
                "Subject: Meeting notes\r\n",
                "Date: Tue, 5 Aug 2025 14:30:00 +0000\r\n",
                "Message-ID: <m1@example.com>\r\n",
                "\r\n",
                "Hi Bob, here are the notes from Tuesday. Talk soon.\r\n",
            )
            .as_bytes(),
        )
        .unwrap()
    }

    fn phishing_email() -> StructuredEmail {
        parse_message(
            concat!(
                "From: \"CEO Jane Doe\" <ceo@secure-verify-pay.tk>\r\n",
                "To: finance@victim.example\r\n",
                "Subject: URGENT: verify your account immediately\r\n",
                "Date: Tue, 5 Aug 2025 14:00:00 +0000\r\n",
                "Message-ID: <x1@secure-verify-pay.tk>\r\n",
                "\r\n",
                "Please verify your account immediately and confirm the wire transfer today.\r\n",
                "This is urgent, act immediately to avoid account suspension.\r\n",
                "Sign in here to proceed.\r\n",
            )
            .as_bytes(),
        )
        .unwrap()
    }

    fn marketing_email() -> StructuredEmail {
        parse_message(
            concat!(
                "From: Promotions Team <promo@gmail.com>\r\n",
                "To: customer@example.com\r\n",
                "Subject: Exclusive offer just for you\r\n",
                "Date: Tue, 5 Aug 2025 10:30:00 +0000\r\n",
                "Message-ID: <p1@gmail.com>\r\n",
                "\r\n",
                "Dear customer,\r\n",
                "\r\n",
                "Big discount deal this week. Use our special promotion and buy now to\r\n",
                "save $99 (regular price $199). Act now, click here for the offer, order\r\n",
                "now while stocks last. This exclusive offer ends soon.\r\n",
                "\r\n",
                "To stop receiving these emails, unsubscribe here:\r\n",
                "http://news.example.com/unsubscribe\r\n",
            )
            .as_bytes(),
        )
        .unwrap()
    }

    struct AlwaysMalicious;

    #[async_trait]
    impl crate::reputation::ReputationLookup for AlwaysMalicious {
        async fn is_malicious(&self, _url: &str) -> Result<bool, AnalysisError> {
            Ok(true)
        }
    }

    struct AlwaysFailing;

    #[async_trait]
    impl crate::reputation::ReputationLookup for AlwaysFailing {
        async fn is_malicious(&self, _url: &str) -> Result<bool, AnalysisError> {
            Err(AnalysisError::ExternalLookupFailure("timeout".to_string()))
        }
    }

    #[tokio::test]
    async fn clean_email_is_legitimate_with_accept() {
        let engine = engine();
        let report = engine.analyze(&clean_email()).await;

        assert_eq!(report.classification, Classification::Legitimate);
        assert_eq!(report.recommendation.action, RecommendedAction::Accept);
        // Only the first-time-sender signal contributes.
        assert_eq!(report.phishing.score, 5);
        assert!(report.spam.score < 30);
        assert!(!report.metadata.has_attachments);
        assert_eq!(report.metadata.url_count, 0);
    }

    #[tokio::test]
    async fn executive_impersonation_scenario_is_blocked() {
        let engine = engine();
        let report = engine.analyze(&phishing_email()).await;

        assert!(report.phishing.score >= 70);
        assert_eq!(report.classification, Classification::MaliciousPhishing);
        assert_eq!(report.recommendation.action, RecommendedAction::Block);
        assert!(report
            .phishing
            .findings
            .iter()
            .any(|f| f.contains("Executive impersonation")));
        assert!(report
            .phishing
            .findings
            .iter()
            .any(|f| f.contains("urgency")));
    }

    #[tokio::test]
    async fn marketing_email_is_suspicious_spam() {
        let engine = engine();
        let report = engine.analyze(&marketing_email()).await;

        assert!(report.phishing.score < 40);
        assert!(report.spam.score >= 50 && report.spam.score <= 60);
        assert_eq!(report.classification, Classification::SuspiciousSpam);
        assert_eq!(report.recommendation.action, RecommendedAction::Review);
        assert_eq!(
            report.spam.probability,
            report.spam.score as f64 / 100.0
        );
    }

    #[tokio::test]
    async fn first_time_sender_signal_disappears_on_repeat() {
        let engine = engine();
        let email = clean_email();

        let first = engine.analyze(&email).await;
        let second = engine.analyze(&email).await;
        assert_eq!(first.phishing.score, 5);
        assert_eq!(second.phishing.score, 0);
        assert_eq!(second.classification, Classification::Legitimate);
    }

    #[tokio::test]
    async fn all_scores_stay_within_bounds() {
        let engine = engine();
        for email in [clean_email(), phishing_email(), marketing_email()] {
            let report = engine.analyze(&email).await;
            assert!(report.phishing.score <= 100);
            assert!(report.spam.score <= 100);
            for module in &report.modules {
                let cap = match module.module.as_str() {
                    "Authentication & Impersonation" => 50,
                    "URL Reputation" => 45,
                    "Content & Social Engineering" => 40,
                    "Attachment Risk" => 15,
                    "Sender History" => 10,
                    "Statistical Anomaly" => 30,
                    "Spam" => 100,
                    other => panic!("unexpected module {other}"),
                };
                assert!(module.score <= cap, "{} over cap", module.module);
            }
            assert!(report.phishing.findings.len() <= 20);
            assert!(report.spam.findings.len() <= 10);
        }
    }

    #[tokio::test]
    async fn reputation_hit_raises_url_score_up_to_cap() {
        let email = parse_message(
            concat!(
                "From: a@b.example\r\n",
                "To: c@d.example\r\n",
                "Subject: link\r\n",
                "Date: Tue, 5 Aug 2025 14:00:00 +0000\r\n",
                "Message-ID: <l1@b.example>\r\n",
                "\r\n",
                "Check http://innocent-looking.example/download today.\r\n",
            )
            .as_bytes(),
        )
        .unwrap();

        let without = engine().analyze(&email).await;
        let with_hit = engine()
            .with_reputation(Arc::new(AlwaysMalicious))
            .analyze(&email)
            .await;

        let url_score = |report: &AnalysisReport| {
            report
                .modules
                .iter()
                .find(|m| m.module == "URL Reputation")
                .map(|m| m.score)
                .unwrap()
        };
        assert_eq!(url_score(&without), 0);
        assert_eq!(url_score(&with_hit), 25);
        assert!(with_hit
            .phishing
            .findings
            .iter()
            .any(|f| f.contains("Reputation provider flagged")));
    }

    #[tokio::test]
    async fn reputation_failure_degrades_to_no_signal() {
        let email = parse_message(
            b"From: a@b.example\r\nTo: c@d.example\r\nSubject: link\r\nDate: Tue, 5 Aug 2025 14:00:00 +0000\r\nMessage-ID: <l2@b.example>\r\n\r\nSee http://site.example/page for details.\r\n",
        )
        .unwrap();

        let report = engine()
            .with_reputation(Arc::new(AlwaysFailing))
            .analyze(&email)
            .await;
        let url_module = report
            .modules
            .iter()
            .find(|m| m.module == "URL Reputation")
            .unwrap();
        assert_eq!(url_module.score, 0);
        assert_eq!(report.classification, Classification::Legitimate);
    }

    #[tokio::test]
    async fn identical_input_yields_identical_verdict() {
        let engine = engine();
        let email = marketing_email();
        let first = engine.analyze(&email).await;
        let second = engine.analyze(&email).await;
        // Sender history scored once; everything else is pure.
        assert_eq!(first.spam.score, second.spam.score);
        assert_eq!(first.classification, second.classification);
        assert_eq!(first.spam.findings, second.spam.findings);
    }
}

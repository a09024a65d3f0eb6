use crate::config::SpamConfig;
use crate::modules::{keyword_occurrences, Evaluator, ModuleResult};
use crate::normalizer::{extract_domain, StructuredEmail};
use regex::Regex;

pub const NAME: &str = "Spam";

const SUBJECT_KEYWORD_SCORE: u32 = 3;
const SUBJECT_CAPS_SCORE: u32 = 5;
const SUBJECT_URGENCY_SCORE: u32 = 8;
const SUBJECT_QUESTIONS_SCORE: u32 = 3;
const BODY_DENSITY_CEILING: u32 = 25;
const GENERIC_GREETING_SCORE: u32 = 5;
const MONEY_REFERENCE_SCORE: u32 = 4;
const LINK_DENSITY_SCORE: u32 = 8;
const HTML_HEAVY_SCORE: u32 = 5;
const REPETITION_SCORE: u32 = 4;
const NO_UNSUBSCRIBE_SCORE: u32 = 3;
const FREE_MAIL_SCORE: u32 = 3;
const SPAM_TLD_SCORE: u32 = 5;
const GENERIC_SENDER_SCORE: u32 = 2;
const MISSING_FROM_SCORE: u32 = 5;
const MISSING_TO_SCORE: u32 = 3;
const MASS_MAIL_SCORE: u32 = 8;
const DANGEROUS_ATTACHMENT_SCORE: u32 = 10;
const FINANCIAL_ATTACHMENT_SCORE: u32 = 3;
const MISSING_REPLY_TO_SCORE: u32 = 2;
const LINK_SPAM_TLD_SCORE: u32 = 4;
const LINK_SHORTENER_SCORE: u32 = 3;
const MAX_RECIPIENT_SEPARATORS: usize = 10;
const MAX_FINDINGS: usize = 10;
const MAX_LINKS_CHECKED: usize = 10;
const MIN_BODY_LEN: usize = 10;
const MIN_WORDS_FOR_RATIOS: usize = 20;
const HTML_TAG_THRESHOLD: usize = 30;
const URGENCY_TOKENS: [&str; 5] = ["!!!", "URGENT", "ACT NOW", "IMMEDIATELY", "ASAP"];

/// Bulk-mail and unsolicited-marketing detection: an independent pipeline
/// over the same record with its own 0-100 scale, level table, and
/// probability output.
pub struct SpamEvaluator {
    cfg: SpamConfig,
    excessive_caps: Regex,
    money: Regex,
    html_tag: Regex,
    link: Regex,
    spam_tld: Regex,
    domain_tld: Regex,
}

impl SpamEvaluator {
    pub fn new(cfg: SpamConfig) -> anyhow::Result<Self> {
        Ok(SpamEvaluator {
            cfg,
            excessive_caps: Regex::new(r"[A-Z]{10,}")?,
            money: Regex::new(r"\$\d+[\d,]*(?:\.\d+)?|usd|gbp|eur")?,
            html_tag: Regex::new(r"<[^>]+>")?,
            link: Regex::new(r"https?://\S+")?,
            spam_tld: Regex::new(r"[a-zA-Z0-9\-.]+\.(?:tk|ml|ga|cf|click|download|top|win)\b")?,
            domain_tld: Regex::new(r"\.(?:tk|ml|ga|cf|click|download|top|win)$")?,
        })
    }

    fn analyze_subject(&self, subject: &str) -> (u32, Vec<String>) {
        if subject.is_empty() {
            return (0, vec!["No subject line (suspicious)".to_string()]);
        }

        let mut score = 0;
        let mut findings = Vec::new();
        let subject_lower = subject.to_lowercase();

        for category in &self.cfg.categories {
            let matches: Vec<&str> = category
                .keywords
                .iter()
                .filter(|kw| subject_lower.contains(kw.as_str()))
                .map(|kw| kw.as_str())
                .collect();
            if !matches.is_empty() {
                score += SUBJECT_KEYWORD_SCORE * matches.len() as u32;
                findings.push(format!(
                    "Subject contains {} keywords: {}",
                    category.name,
                    matches[..matches.len().min(3)].join(", ")
                ));
                break;
            }
        }

        if self.excessive_caps.is_match(subject) {
            score += SUBJECT_CAPS_SCORE;
            findings.push("Subject line uses excessive capitals".to_string());
        }

        let upper = subject.to_uppercase();
        if URGENCY_TOKENS.iter().any(|t| upper.contains(t)) {
            score += SUBJECT_URGENCY_SCORE;
            findings.push("Subject uses urgency manipulation tactics".to_string());
        }

        if subject.matches('?').count() > 2 {
            score += SUBJECT_QUESTIONS_SCORE;
            findings.push("Subject contains excessive question marks".to_string());
        }

        (score, findings)
    }

    fn analyze_body(&self, body: &str) -> (u32, Vec<String>) {
        if body.len() < MIN_BODY_LEN {
            return (0, Vec::new());
        }

        let mut score = 0;
        let mut findings = Vec::new();
        let body_lower = body.to_lowercase();
        let word_count = body.split_whitespace().count();

        // Dominant category by raw occurrence count; earlier categories win
        // ties so the outcome is order-stable.
        let mut dominant: Option<(&str, usize)> = None;
        for category in &self.cfg.categories {
            let occurrences = keyword_occurrences(&body_lower, &category.keywords);
            if occurrences > 0 && occurrences > dominant.map_or(0, |(_, n)| n) {
                dominant = Some((&category.name, occurrences));
            }
        }
        if let Some((name, occurrences)) = dominant {
            score += (2 * occurrences as u32).min(BODY_DENSITY_CEILING);
            findings.push(format!(
                "High density of {name} keywords ({occurrences} occurrences)"
            ));
        }

        if self
            .cfg
            .generic_greetings
            .iter()
            .any(|g| body_lower.contains(g.as_str()))
        {
            score += GENERIC_GREETING_SCORE;
            findings.push("Uses generic greeting instead of personalization".to_string());
        }

        let money_refs = self.money.find_iter(&body_lower).count();
        if money_refs > 0 {
            score += MONEY_REFERENCE_SCORE * money_refs as u32;
            findings.push(format!("Contains {money_refs} financial references"));
        }

        let links = self.link.find_iter(body).count();
        if word_count > MIN_WORDS_FOR_RATIOS && links > 0 {
            // More than one link per two hundred words of text.
            if links * 200 > word_count {
                score += LINK_DENSITY_SCORE;
                findings.push(format!(
                    "High link density ({links} links for {word_count} words)"
                ));
            }
        }

        let html_tags = self.html_tag.find_iter(body).count();
        if html_tags > HTML_TAG_THRESHOLD {
            score += HTML_HEAVY_SCORE;
            findings.push(format!(
                "Heavy HTML formatting ({html_tags} tags) - typical of marketing"
            ));
        }

        let words: Vec<&str> = body_lower.split_whitespace().collect();
        if words.len() > MIN_WORDS_FOR_RATIOS {
            let mut counts = std::collections::HashMap::new();
            for word in &words {
                *counts.entry(*word).or_insert(0usize) += 1;
            }
            if let Some((word, count)) = counts
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            {
                if count * 100 > words.len() * 15 {
                    score += REPETITION_SCORE;
                    findings.push(format!("Repetitive language ('{word}' used {count} times)"));
                }
            }
        }

        let any_spam_keyword = self
            .cfg
            .categories
            .iter()
            .flat_map(|c| c.keywords.iter())
            .any(|kw| body_lower.contains(kw.as_str()));
        if any_spam_keyword
            && !body_lower.contains("unsubscribe")
            && !body_lower.contains("opt-out")
        {
            score += NO_UNSUBSCRIBE_SCORE;
            findings.push("Marketing content without unsubscribe link".to_string());
        }

        (score, findings)
    }

    fn analyze_sender(&self, sender: &str) -> (u32, Vec<String>) {
        if sender.is_empty() {
            return (0, Vec::new());
        }

        let mut score = 0;
        let mut findings = Vec::new();
        let sender_lower = sender.to_lowercase();

        if let Some(domain) = extract_domain(sender) {
            if self.cfg.free_mail_domains.iter().any(|d| d == &domain) {
                score += FREE_MAIL_SCORE;
                findings.push(format!("Sender uses free email domain: {domain}"));
            }
            if self.domain_tld.is_match(&domain) {
                score += SPAM_TLD_SCORE;
                findings.push(format!("Sender uses suspicious TLD: {domain}"));
            }
            if self
                .cfg
                .generic_sender_names
                .iter()
                .any(|n| sender_lower.contains(n.as_str()))
            {
                score += GENERIC_SENDER_SCORE;
                findings.push("Generic sender identity".to_string());
            }
        }

        (score, findings)
    }

    fn analyze_structure(&self, email: &StructuredEmail) -> (u32, Vec<String>) {
        let mut score = 0;
        let mut findings = Vec::new();

        if email.sender.is_empty() {
            score += MISSING_FROM_SCORE;
            findings.push("Missing From header".to_string());
        }
        if email.recipients.is_empty() {
            score += MISSING_TO_SCORE;
            findings.push("BCC'd or missing recipient header".to_string());
        } else if email.recipients.matches(',').count() > MAX_RECIPIENT_SEPARATORS
            || email.recipients.matches(';').count() > MAX_RECIPIENT_SEPARATORS
        {
            score += MASS_MAIL_SCORE;
            findings.push("Sent to many recipients (mass mailing)".to_string());
        }

        for attachment in &email.attachments {
            let filename = attachment.filename.to_lowercase();
            if self
                .cfg
                .dangerous_extensions
                .iter()
                .any(|ext| filename.ends_with(ext.as_str()))
            {
                score += DANGEROUS_ATTACHMENT_SCORE;
                findings.push("Suspicious executable attachment".to_string());
            }
            if self
                .cfg
                .financial_filename_words
                .iter()
                .any(|w| filename.contains(w.as_str()))
            {
                score += FINANCIAL_ATTACHMENT_SCORE;
                findings.push(format!("Financial document attachment: {filename}"));
            }
        }

        if !email.headers.contains("Reply-To") {
            score += MISSING_REPLY_TO_SCORE;
            findings.push("No Reply-To header".to_string());
        }

        (score, findings)
    }

    fn analyze_links(&self, urls: &[String]) -> (u32, Vec<String>) {
        let mut score = 0;
        let mut findings = Vec::new();

        for url in urls.iter().take(MAX_LINKS_CHECKED) {
            let url_lower = url.to_lowercase();
            if self.spam_tld.is_match(&url_lower) {
                score += LINK_SPAM_TLD_SCORE;
                findings.push("URL uses suspicious TLD".to_string());
            }
            if self
                .cfg
                .shorteners
                .iter()
                .any(|s| url_lower.contains(s.as_str()))
            {
                score += LINK_SHORTENER_SCORE;
                findings.push("Shortened URL detected".to_string());
            }
        }

        (score, findings)
    }
}

impl Evaluator for SpamEvaluator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn max_score(&self) -> u32 {
        self.cfg.max_score
    }

    fn evaluate(&self, email: &StructuredEmail) -> ModuleResult {
        let mut score = 0;
        let mut findings = Vec::new();

        let (subject_score, subject_findings) = self.analyze_subject(&email.subject);
        score += subject_score;
        findings.extend(subject_findings);

        let (body_score, body_findings) = self.analyze_body(email.analysis_text());
        score += body_score;
        findings.extend(body_findings);

        let (sender_score, sender_findings) = self.analyze_sender(&email.sender);
        score += sender_score;
        findings.extend(sender_findings);

        let (structure_score, structure_findings) = self.analyze_structure(email);
        score += structure_score;
        findings.extend(structure_findings);

        let (link_score, link_findings) = self.analyze_links(&email.urls);
        score += link_score;
        findings.extend(link_findings);

        findings.truncate(MAX_FINDINGS);
        ModuleResult::new(NAME, score.min(self.cfg.max_score), findings)
    }
}

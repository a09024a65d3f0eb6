use crate::config::AnomalyConfig;
use crate::modules::{Evaluator, ModuleResult};
use crate::normalizer::StructuredEmail;
use regex::Regex;

pub const NAME: &str = "Statistical Anomaly";

const LATE_HOUR_SCORE: u32 = 3;
const SUBJECT_HEAVY_SCORE: u32 = 2;
const URL_DENSITY_SCORE: u32 = 4;
const ENCODING_SCORE: u32 = 2;
const MISSING_HEADER_SCORE: u32 = 2;
const MISSING_HEADER_CEILING: u32 = 8;
const CRITICAL_HEADERS: [&str; 4] = ["From", "To", "Subject", "Date"];
const MIN_WORDS_FOR_DENSITY: usize = 20;

/// Structural oddities that no single content rule covers: late-night send
/// times, lopsided subject/body ratios, encoding obfuscation, and missing
/// critical headers.
pub struct AnomalyEvaluator {
    cfg: AnomalyConfig,
    hour: Regex,
    url: Regex,
    base64_run: Regex,
    html_entities: Regex,
    percent_hex: Regex,
}

impl AnomalyEvaluator {
    pub fn new(cfg: AnomalyConfig) -> anyhow::Result<Self> {
        Ok(AnomalyEvaluator {
            cfg,
            hour: Regex::new(r"(\d{1,2}):")?,
            url: Regex::new(r"https?://")?,
            base64_run: Regex::new(r"[A-Za-z0-9+/]{20,}={0,2}")?,
            html_entities: Regex::new(r"&#\d{3,};")?,
            percent_hex: Regex::new(r"%[0-9a-fA-F]{2}")?,
        })
    }

    fn timing_score(&self, date: &str) -> u32 {
        let Some(capture) = self.hour.captures(date) else {
            return 0;
        };
        match capture[1].parse::<u32>() {
            Ok(hour) if hour >= self.cfg.late_hour_start && hour <= self.cfg.late_hour_end => {
                LATE_HOUR_SCORE
            }
            _ => 0,
        }
    }

    fn density_score(&self, subject: &str, body: &str) -> u32 {
        let mut score = 0;

        if !subject.is_empty() && !body.is_empty() && subject.len() * 10 > body.len() * 8 {
            score += SUBJECT_HEAVY_SCORE;
        }

        let urls = self.url.find_iter(body).count();
        let words = body.split_whitespace().count();
        if words > MIN_WORDS_FOR_DENSITY && urls * 5 > words {
            score += URL_DENSITY_SCORE;
        }
        score
    }

    fn encoding_score(&self, body: &str) -> u32 {
        let mut score = 0;
        if self.base64_run.is_match(body) {
            score += ENCODING_SCORE;
        }
        if self.html_entities.is_match(body) {
            score += ENCODING_SCORE;
        }
        if self.percent_hex.is_match(body) {
            score += ENCODING_SCORE;
        }
        score
    }

    fn header_score(&self, email: &StructuredEmail) -> u32 {
        let missing = CRITICAL_HEADERS
            .iter()
            .filter(|name| !email.headers.contains(name))
            .count() as u32;
        (missing * MISSING_HEADER_SCORE).min(MISSING_HEADER_CEILING)
    }
}

impl Evaluator for AnomalyEvaluator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn max_score(&self) -> u32 {
        self.cfg.max_score
    }

    fn evaluate(&self, email: &StructuredEmail) -> ModuleResult {
        let body = email.analysis_text();
        let mut score = 0;
        let mut findings = Vec::new();

        let timing = self.timing_score(&email.date);
        score += timing;
        if timing > 0 {
            findings.push(format!("Suspicious send time detected: {timing} points"));
        }

        let density = self.density_score(&email.subject, body);
        score += density;
        if density > 0 {
            findings.push(format!("Abnormal content distribution: {density} points"));
        }

        let encoding = self.encoding_score(body);
        score += encoding;
        if encoding > 0 {
            findings.push("Unusual character encoding detected".to_string());
        }

        let headers = self.header_score(email);
        score += headers;
        if headers > 0 {
            findings.push(format!("Malformed headers: {headers} points"));
        }

        ModuleResult::new(NAME, score.min(self.cfg.max_score), findings)
    }
}

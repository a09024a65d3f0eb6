pub mod anomaly;
pub mod attachments;
pub mod authentication;
pub mod content;
pub mod sender_history;
pub mod spam;
pub mod url_reputation;

use crate::normalizer::StructuredEmail;
use serde::Serialize;

/// Outcome of one evaluator over one message.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleResult {
    pub module: String,
    pub score: u32,
    pub findings: Vec<String>,
}

impl ModuleResult {
    pub fn new(module: &str, score: u32, findings: Vec<String>) -> Self {
        ModuleResult {
            module: module.to_string(),
            score,
            findings,
        }
    }
}

/// A scoring module. Evaluators are stateless functions of the structured
/// record (sender history being the one exception, behind its repository)
/// and never exceed their declared cap.
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &'static str;
    fn max_score(&self) -> u32;
    fn evaluate(&self, email: &StructuredEmail) -> ModuleResult;
}

/// Substring-hit count: how many of `keywords` occur in `text` at least once.
pub(crate) fn keyword_hits(text: &str, keywords: &[String]) -> usize {
    keywords.iter().filter(|kw| text.contains(kw.as_str())).count()
}

/// Total non-overlapping occurrences of every keyword in `text`.
pub(crate) fn keyword_occurrences(text: &str, keywords: &[String]) -> usize {
    keywords.iter().map(|kw| text.matches(kw.as_str()).count()).sum()
}

use crate::config::AttachmentConfig;
use crate::modules::{Evaluator, ModuleResult};
use crate::normalizer::StructuredEmail;

pub const NAME: &str = "Attachment Risk";

const DANGEROUS_SCORE: u32 = 15;
const MACRO_SCORE: u32 = 12;
const DOUBLE_EXTENSION_SCORE: u32 = 10;

/// Extension-based attachment screening over metadata only; payload bytes
/// are never inspected here.
pub struct AttachmentEvaluator {
    cfg: AttachmentConfig,
}

impl AttachmentEvaluator {
    pub fn new(cfg: AttachmentConfig) -> Self {
        AttachmentEvaluator { cfg }
    }
}

/// `invoice.pdf.exe` -> (`invoice.pdf`, `.exe`)
fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => (&filename[..idx], &filename[idx..]),
        _ => (filename, ""),
    }
}

impl Evaluator for AttachmentEvaluator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn max_score(&self) -> u32 {
        self.cfg.max_score
    }

    fn evaluate(&self, email: &StructuredEmail) -> ModuleResult {
        let mut score = 0;
        let mut findings = Vec::new();

        for attachment in &email.attachments {
            let filename = attachment.filename.to_lowercase();
            if filename.is_empty() {
                continue;
            }

            let (stem, extension) = split_extension(&filename);
            if self
                .cfg
                .dangerous_extensions
                .iter()
                .any(|e| e == extension)
            {
                score += DANGEROUS_SCORE;
                findings.push(format!("Dangerous file extension detected: {filename}"));
            }
            if self.cfg.macro_extensions.iter().any(|e| e == extension) {
                score += MACRO_SCORE;
                findings.push(format!("Macro-enabled Office file detected: {filename}"));
            }

            // A benign-looking extension hidden in front of the real one.
            let (_, inner_extension) = split_extension(stem);
            if self
                .cfg
                .benign_inner_extensions
                .iter()
                .any(|e| e == inner_extension)
            {
                score += DOUBLE_EXTENSION_SCORE;
                findings.push(format!("Double extension evasion detected: {filename}"));
            }
        }

        ModuleResult::new(NAME, score.min(self.cfg.max_score), findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttachmentConfig;
    use crate::normalizer::AttachmentMeta;

    fn email_with(filenames: &[&str]) -> StructuredEmail {
        StructuredEmail {
            attachments: filenames
                .iter()
                .map(|name| AttachmentMeta {
                    filename: name.to_string(),
                    content_type: "application/octet-stream".to_string(),
                    size_bytes: 1024,
                })
                .collect(),
            ..Default::default()
        }
    }

    fn evaluator() -> AttachmentEvaluator {
        AttachmentEvaluator::new(AttachmentConfig::default())
    }

    #[test]
    fn no_attachments_scores_zero() {
        let result = evaluator().evaluate(&StructuredEmail::default());
        assert_eq!(result.score, 0);
        assert!(result.findings.is_empty());
    }

    #[test]
    fn benign_document_scores_zero() {
        let result = evaluator().evaluate(&email_with(&["report.pdf"]));
        assert_eq!(result.score, 0);
    }

    #[test]
    fn executable_attachment_is_dangerous() {
        let result = evaluator().evaluate(&email_with(&["setup.exe"]));
        assert_eq!(result.score, 15);
        assert!(result.findings[0].contains("setup.exe"));
    }

    #[test]
    fn macro_enabled_office_file() {
        let result = evaluator().evaluate(&email_with(&["q3-budget.xlsm"]));
        assert_eq!(result.score, 12);
        assert!(result.findings[0].contains("Macro-enabled"));
    }

    #[test]
    fn double_extension_flags_both_checks() {
        let result = evaluator().evaluate(&email_with(&["invoice.pdf.exe"]));
        // Dangerous extension and double-extension evasion both fire, then
        // the total caps at the module maximum.
        assert_eq!(result.findings.len(), 2);
        assert!(result.findings[0].contains("Dangerous file extension"));
        assert!(result.findings[1].contains("Double extension"));
        assert_eq!(result.score, 15);
    }

    #[test]
    fn scores_sum_across_attachments_up_to_cap() {
        let result = evaluator().evaluate(&email_with(&["a.exe", "b.docm", "notes.txt"]));
        assert_eq!(result.score, 15);
        assert_eq!(result.findings.len(), 2);
    }

    #[test]
    fn case_is_ignored() {
        let result = evaluator().evaluate(&email_with(&["Invoice.PDF.EXE"]));
        assert_eq!(result.findings.len(), 2);
    }
}

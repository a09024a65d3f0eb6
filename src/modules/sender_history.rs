use crate::config::SenderHistoryConfig;
use crate::history::SenderHistory;
use crate::modules::{Evaluator, ModuleResult};
use crate::normalizer::{extract_address, StructuredEmail};
use chrono::Utc;
use std::sync::Arc;

pub const NAME: &str = "Sender History";

/// The one stateful module: records every sighting of a sender address and
/// scores only the very first one. Count and timestamps are tracked for
/// future velocity scoring but do not contribute today.
pub struct SenderHistoryEvaluator {
    cfg: SenderHistoryConfig,
    store: Arc<dyn SenderHistory>,
}

impl SenderHistoryEvaluator {
    pub fn new(cfg: SenderHistoryConfig, store: Arc<dyn SenderHistory>) -> Self {
        SenderHistoryEvaluator { cfg, store }
    }
}

impl Evaluator for SenderHistoryEvaluator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn max_score(&self) -> u32 {
        self.cfg.max_score
    }

    fn evaluate(&self, email: &StructuredEmail) -> ModuleResult {
        let address = extract_address(&email.sender).to_lowercase();
        if address.is_empty() {
            return ModuleResult::new(NAME, 0, Vec::new());
        }

        match self.store.upsert(&address, Utc::now()) {
            Ok(observation) if observation.first_sighting => ModuleResult::new(
                NAME,
                self.cfg.first_time_score.min(self.cfg.max_score),
                vec![format!("First-time sender detected: {address}")],
            ),
            Ok(_) => ModuleResult::new(NAME, 0, Vec::new()),
            Err(e) => {
                // A missing risk signal is safer than failing the scan.
                log::warn!("sender history unavailable, scoring without it: {e}");
                ModuleResult::new(NAME, 0, Vec::new())
            }
        }
    }
}

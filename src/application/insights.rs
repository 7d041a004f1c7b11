use crate::domain::report::{ReportSections, SectionSplitCache};
use crate::infrastructure::backend_client::InsightsBackendClient;
use crate::infrastructure::error::InfraError;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LogAnalysis {
    pub report: String,
    pub sections: ReportSections,
}

/// Runs a session log through the backend analysis function and splits the
/// returned report into its labeled sections.
pub struct InsightsService<B: InsightsBackendClient> {
    backend: Arc<B>,
    sections: SectionSplitCache,
}

impl<B: InsightsBackendClient> InsightsService<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            sections: SectionSplitCache::default(),
        }
    }

    pub async fn analyze_log(
        &self,
        access_token: &str,
        log_content: &str,
    ) -> Result<LogAnalysis, InfraError> {
        let report = self.backend.analyze_log(access_token, log_content).await?;
        let sections = self.sections.sections(&report);
        Ok(LogAnalysis { report, sections })
    }
}

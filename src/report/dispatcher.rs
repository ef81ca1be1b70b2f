use std::sync::Arc;

use tracing::{info, warn};

use crate::db::{DispatchKind, DispatchLog};
use crate::engine::stats::RunStatistics;
use crate::report::format::{announcement_text, summary_text};
use crate::sources::Publisher;
use crate::types::PredictionRecord;

/// Renders reports and hands them to the publisher.
///
/// Publishing never fails the caller: errors are logged (and written to the
/// dispatch log when one is attached) and the lifecycle carries on.
#[derive(Clone)]
pub struct ReportDispatcher {
    publisher: Arc<dyn Publisher>,
    log: Option<DispatchLog>,
}

impl ReportDispatcher {
    pub fn new(publisher: Arc<dyn Publisher>, log: Option<DispatchLog>) -> Self {
        Self { publisher, log }
    }

    /// Publish the accuracy summary for one reconciliation pass.
    /// Returns the text that was sent, or `None` when the pass resolved nothing.
    pub async fn dispatch_summary(&self, stats: &RunStatistics) -> Option<String> {
        let Some(text) = summary_text(stats) else {
            info!("Nothing reconciled this pass, no summary to publish");
            return None;
        };
        self.dispatch(DispatchKind::Summary, None, &text).await;
        Some(text)
    }

    /// Publish the pre-game pick for one record.
    pub async fn announce(&self, record: &PredictionRecord) -> String {
        let text = announcement_text(record);
        self.dispatch(DispatchKind::Announcement, Some(record.game_id), &text).await;
        text
    }

    async fn dispatch(&self, kind: DispatchKind, game_id: Option<u64>, text: &str) {
        let outcome = self.publisher.publish(text).await;
        let error = match &outcome {
            Ok(()) => {
                info!(kind = %kind, game_id, "Published: {text}");
                None
            }
            Err(e) => {
                warn!(kind = %kind, game_id, op = "publish", "Publish failed: {e}");
                Some(e.to_string())
            }
        };

        if let Some(log) = &self.log {
            if let Err(e) = log.record(kind, game_id, text, error.as_deref()).await {
                warn!(kind = %kind, "Failed to write dispatch log: {e}");
            }
        }
    }
}

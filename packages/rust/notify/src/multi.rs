//! Fan-out to several notifiers.

use std::sync::Arc;

use async_trait::async_trait;
use logsweep_shared::{LogsweepError, Notifier, Report, Result};
use tracing::warn;

/// Delivers to every notifier in order. Fails if any failed, after trying all.
#[derive(Clone)]
pub struct MultiNotifier {
    targets: Vec<Arc<dyn Notifier>>,
}

impl MultiNotifier {
    pub fn new(targets: Vec<Arc<dyn Notifier>>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl Notifier for MultiNotifier {
    async fn deliver(&self, report: &Report) -> Result<()> {
        let mut failures = Vec::new();
        for target in &self.targets {
            if let Err(e) = target.deliver(report).await {
                warn!(error = %e, "notifier failed");
                failures.push(e.to_string());
            }
        }
        match failures.len() {
            0 => Ok(()),
            1 => Err(LogsweepError::Delivery(failures.remove(0))),
            n => Err(LogsweepError::Delivery(format!(
                "{n} notifiers failed: {}",
                failures.join("; ")
            ))),
        }
    }
}

//! Terminal delivery.

use std::io::Write;

use async_trait::async_trait;
use logsweep_shared::{LogsweepError, Notifier, Report, Result};

use crate::render;

/// Prints the plain-text summary to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn deliver(&self, report: &Report) -> Result<()> {
        let text = render::render_text(report);
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(text.as_bytes())
            .and_then(|()| stdout.flush())
            .map_err(|e| LogsweepError::Delivery(format!("failed to write summary: {e}")))
    }
}

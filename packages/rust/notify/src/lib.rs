//! Report delivery for logsweep.
//!
//! - [`SlackNotifier`]: Block Kit messages through `chat.postMessage`
//! - [`ConsoleNotifier`]: plain-text summary on stdout
//! - [`MultiNotifier`]: fan-out to several of the above

mod console;
mod multi;
pub mod render;
mod slack;

pub use console::ConsoleNotifier;
pub use multi::MultiNotifier;
pub use render::RenderOptions;
pub use slack::{DEFAULT_MIN_INTERVAL, DEFAULT_SLACK_API, SlackNotifier, SlackOptions};

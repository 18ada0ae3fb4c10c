//! Access log monitoring for blue/green pool failover and error rates
//!
//! - Tailing the nginx access log
//! - Parsing pool and upstream status per line
//! - Rolling error-rate window and per-kind alert cooldowns
//! - Slack webhook notifications

pub mod alert;
pub mod alert_gate;
pub mod log_parser;
pub mod poll;
pub mod slack_alert;
pub mod sliding_window;
pub mod tail_reader;
pub mod watcher;

pub use alert::{Alert, AlertKind, AlertSink};
pub use alert_gate::AlertGate;
pub use log_parser::{LineParser, LogOutcome, PoolHint};
pub use poll::{Clock, PollRetry, Sleeper, SystemClock, TokioSleeper};
pub use slack_alert::SlackAlert;
pub use sliding_window::SlidingWindow;
pub use tail_reader::TailReader;
pub use watcher::{LineDisposition, Watcher, WatcherState};

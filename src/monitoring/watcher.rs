//! Tailing loop: log lines in, failover and error-rate alerts out
//!
//! Per line:
//! 1. Skip the first `skip_on_startup` lines read
//! 2. Drop blank lines
//! 3. Parse; count consecutive failures, warn every
//!    [`PARSE_FAILURE_WARN_THRESHOLD`] in a row
//! 4. Failover check against the last seen pool
//! 5. Error-rate check, only once the window is full

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::monitoring::alert::{Alert, AlertKind, AlertSink};
use crate::monitoring::alert_gate::AlertGate;
use crate::monitoring::log_parser::{LineParser, LogOutcome};
use crate::monitoring::poll::{Clock, PollRetry};
use crate::monitoring::sliding_window::SlidingWindow;
use crate::monitoring::tail_reader::TailReader;
use crate::utils::AppError;

/// Consecutive parse failures that trigger a warning (and a counter reset)
pub const PARSE_FAILURE_WARN_THRESHOLD: u32 = 10;

/// Mutable state of one watcher run, owned by the main loop
#[derive(Debug, Clone)]
pub struct WatcherState {
    pub last_seen_pool: String,
    pub window: SlidingWindow,
    pub cooldowns: AlertGate,
    pub consecutive_parse_failures: u32,
    pub lines_processed: u64,
}

impl WatcherState {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        Ok(Self {
            last_seen_pool: config.active_pool.clone(),
            window: SlidingWindow::new(config.window_size)?,
            cooldowns: AlertGate::new(config.alert_cooldown),
            consecutive_parse_failures: 0,
            lines_processed: 0,
        })
    }
}

/// What happened to one raw line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineDisposition {
    /// Within the startup skip
    Skipped,
    Blank,
    ParseFailed,
    /// Parsed and evaluated; lists the alerts that passed their cooldown
    Processed { alerts_fired: Vec<AlertKind> },
}

pub struct Watcher<S: AlertSink> {
    config: AppConfig,
    parser: LineParser,
    state: WatcherState,
    sink: S,
    clock: Arc<dyn Clock>,
}

impl<S: AlertSink> Watcher<S> {
    pub fn new(config: AppConfig, sink: S, clock: Arc<dyn Clock>) -> Result<Self, AppError> {
        let state = WatcherState::new(&config)?;
        let parser = LineParser::new(config.pool_hints.clone());

        info!(
            active_pool = %config.active_pool,
            threshold_percent = config.error_rate_threshold_percent(),
            window_size = config.window_size,
            cooldown_secs = config.alert_cooldown.as_secs(),
            skip_on_startup = config.skip_on_startup,
            "Watcher initialized"
        );

        Ok(Self {
            config,
            parser,
            state,
            sink,
            clock,
        })
    }

    pub fn state(&self) -> &WatcherState {
        &self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Tail `reader` until `shutdown` resolves.
    ///
    /// Returns `Ok(())` on shutdown and `Err` on any fault the loop cannot
    /// recover from. Alert delivery failures are not such faults.
    pub async fn run<F>(
        &mut self,
        reader: &mut TailReader,
        retry: &PollRetry,
        shutdown: F,
    ) -> Result<(), AppError>
    where
        F: Future<Output = ()>,
    {
        info!(log_file = %reader.path().display(), "Starting to tail");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(lines_processed = self.state.lines_processed, "Watcher stopped");
                    return Ok(());
                }
                line = reader.next_line(retry) => {
                    self.handle_line(&line?).await;
                }
            }
        }
    }

    /// Run one raw line through the state machine
    pub async fn handle_line(&mut self, raw: &str) -> LineDisposition {
        self.state.lines_processed += 1;

        if self.state.lines_processed <= self.config.skip_on_startup {
            if self.state.lines_processed == 1 {
                info!(skip = self.config.skip_on_startup, "Skipping startup lines");
            }
            return LineDisposition::Skipped;
        }

        let line = raw.trim();
        if line.is_empty() {
            return LineDisposition::Blank;
        }

        let Some(outcome) = self.parser.parse(line) else {
            self.record_parse_failure();
            return LineDisposition::ParseFailed;
        };

        self.state.consecutive_parse_failures = 0;
        self.state.window.push(outcome.clone());

        let mut alerts_fired = Vec::new();
        if self.check_failover(&outcome).await {
            alerts_fired.push(AlertKind::Failover);
        }
        if self.check_error_rate(&outcome).await {
            alerts_fired.push(AlertKind::ErrorRate);
        }

        LineDisposition::Processed { alerts_fired }
    }

    fn record_parse_failure(&mut self) {
        self.state.consecutive_parse_failures += 1;
        if self.state.consecutive_parse_failures >= PARSE_FAILURE_WARN_THRESHOLD {
            warn!(
                consecutive_failures = self.state.consecutive_parse_failures,
                "Consecutive parse failures"
            );
            self.state.consecutive_parse_failures = 0;
        }
    }

    /// Returns whether a failover alert passed the gate
    async fn check_failover(&mut self, outcome: &LogOutcome) -> bool {
        if outcome.pool == self.state.last_seen_pool {
            return false;
        }

        info!(
            from = %self.state.last_seen_pool,
            to = %outcome.pool,
            "Pool change detected"
        );

        let fired = self
            .state
            .cooldowns
            .try_acquire(AlertKind::Failover, self.clock.now());
        if fired {
            let alert = Alert::failover(
                &self.state.last_seen_pool,
                &outcome.pool,
                self.state.window.len(),
            );
            self.deliver(&alert).await;
        }

        // Updated whether or not the alert fired
        self.state.last_seen_pool = outcome.pool.clone();
        fired
    }

    /// Returns whether an error-rate alert passed the gate
    async fn check_error_rate(&mut self, outcome: &LogOutcome) -> bool {
        let window = &self.state.window;
        if !window.is_full() {
            return false;
        }

        let error_count = window.error_count();
        let error_rate = window.error_rate();
        let window_len = window.len();

        if error_count > 0 {
            info!(
                error_rate_percent = %format!("{:.1}", error_rate * 100.0),
                error_count = error_count,
                window_len = window_len,
                pool = %outcome.pool,
                "Error rate"
            );
        }

        if error_rate <= self.config.error_rate_threshold {
            return false;
        }

        if !self
            .state
            .cooldowns
            .try_acquire(AlertKind::ErrorRate, self.clock.now())
        {
            return false;
        }

        let alert = Alert::error_rate(
            error_rate,
            error_count,
            window_len,
            &outcome.pool,
            self.config.error_rate_threshold_percent(),
        );
        self.deliver(&alert).await;
        true
    }

    /// Delivery failures are logged and swallowed
    async fn deliver(&self, alert: &Alert) {
        match self.sink.send(alert).await {
            Ok(()) => debug!(alert = %alert.kind, "Alert delivered"),
            Err(e) => warn!(
                alert = %alert.kind,
                error = %e,
                error_code = e.error_code(),
                "Alert delivery failed"
            ),
        }
    }
}

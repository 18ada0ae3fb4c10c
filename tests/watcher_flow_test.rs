use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::env::temp_dir;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use pool_watcher::config::AppConfig;
use pool_watcher::monitoring::{
    Alert, AlertKind, AlertSink, Clock, LineDisposition, PollRetry, TailReader, Watcher,
};
use pool_watcher::utils::AppError;

// ===== Helpers =====

struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn new() -> Self {
        Self(Mutex::new(
            Utc.timestamp_opt(1_700_000_000, 0)
                .single()
                .expect("valid timestamp"),
        ))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock lock")
    }
}

#[derive(Clone, Default)]
struct SharedSink {
    sent: Arc<Mutex<Vec<Alert>>>,
}

impl SharedSink {
    fn sent(&self) -> Vec<Alert> {
        self.sent.lock().expect("sink lock").clone()
    }
}

#[async_trait]
impl AlertSink for SharedSink {
    async fn send(&self, alert: &Alert) -> Result<(), AppError> {
        self.sent.lock().expect("sink lock").push(alert.clone());
        Ok(())
    }
}

fn test_log_file() -> PathBuf {
    let dir = temp_dir().join(format!("test_watcher_flow_{}", Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("Failed to create test dir");
    dir.join("access_file.log")
}

fn append_lines(path: &Path, lines: &[String]) {
    let mut file = fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .expect("Failed to open log for append");
    for line in lines {
        writeln!(file, "{}", line).expect("Failed to append line");
    }
}

fn access_line(pool: &str, status: u16) -> String {
    format!(
        r#"172.18.0.1 - - [31/Jan/2026:14:50:00 +0000] "GET / HTTP/1.1" {status} 12 pool="{pool}" release="{pool}-v1.0.0" upstream="172.18.0.9:3000" upstream_status={status} request_time=0.004"#
    )
}

fn config_for(path: &Path, window_size: usize, threshold: f64) -> AppConfig {
    AppConfig {
        log_file: path.to_path_buf(),
        window_size,
        error_rate_threshold: threshold,
        skip_on_startup: 0,
        ..AppConfig::default()
    }
}

async fn drain(reader: &mut TailReader, watcher: &mut Watcher<SharedSink>) -> Vec<LineDisposition> {
    let mut dispositions = Vec::new();
    while let Some(line) = reader.read_line().await.expect("read") {
        dispositions.push(watcher.handle_line(&line).await);
    }
    dispositions
}

// ===== Scenarios =====

#[tokio::test]
async fn should_not_replay_history_when_restarted_mid_file() {
    // Arrange: history that would alert if it were replayed
    let path = test_log_file();
    append_lines(
        &path,
        &[access_line("green", 502), access_line("green", 503)],
    );
    let sink = SharedSink::default();
    let mut watcher = Watcher::new(
        config_for(&path, 2, 0.02),
        sink.clone(),
        Arc::new(ManualClock::new()),
    )
    .expect("watcher");
    let retry = PollRetry::new(Duration::from_millis(10));

    // Act
    let mut reader = TailReader::open(&path, &retry).await.expect("open");
    let dispositions = drain(&mut reader, &mut watcher).await;

    // Assert
    assert!(reader.is_seekable());
    assert!(dispositions.is_empty());
    assert!(sink.sent().is_empty());
    assert_eq!(watcher.state().lines_processed, 0);
}

#[tokio::test]
async fn should_alert_single_failover_for_blue_blue_green_green() {
    // Arrange
    let path = test_log_file();
    append_lines(&path, &[]);
    let sink = SharedSink::default();
    let mut watcher = Watcher::new(
        config_for(&path, 200, 0.02),
        sink.clone(),
        Arc::new(ManualClock::new()),
    )
    .expect("watcher");
    let mut reader = TailReader::open(&path, &PollRetry::new(Duration::from_millis(10)))
        .await
        .expect("open");

    // Act
    append_lines(
        &path,
        &[
            access_line("blue", 200),
            access_line("blue", 200),
            access_line("green", 200),
            access_line("green", 200),
        ],
    );
    let dispositions = drain(&mut reader, &mut watcher).await;

    // Assert
    assert_eq!(dispositions.len(), 4);
    assert_eq!(
        dispositions[2],
        LineDisposition::Processed {
            alerts_fired: vec![AlertKind::Failover]
        }
    );
    let sent = sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, AlertKind::Failover);
    assert!(sent[0].body.contains("from *BLUE* to *GREEN*"));
}

#[tokio::test]
async fn should_skip_startup_lines_and_tolerate_noise() {
    // Arrange
    let path = test_log_file();
    append_lines(&path, &[]);
    let sink = SharedSink::default();
    let config = AppConfig {
        skip_on_startup: 3,
        ..config_for(&path, 4, 0.5)
    };
    let mut watcher =
        Watcher::new(config, sink.clone(), Arc::new(ManualClock::new())).expect("watcher");
    let mut reader = TailReader::open(&path, &PollRetry::new(Duration::from_millis(10)))
        .await
        .expect("open");

    // Act: three startup lines, then noise, then a failing window
    append_lines(
        &path,
        &[
            access_line("green", 500),
            access_line("green", 500),
            access_line("green", 500),
            String::new(),
            "upstream timed out".to_string(),
            access_line("blue", 500),
            access_line("blue", 502),
            access_line("blue", 200),
            access_line("blue", 504),
        ],
    );
    let dispositions = drain(&mut reader, &mut watcher).await;

    // Assert
    assert!(dispositions[..3]
        .iter()
        .all(|d| *d == LineDisposition::Skipped));
    assert_eq!(dispositions[3], LineDisposition::Blank);
    assert_eq!(dispositions[4], LineDisposition::ParseFailed);
    assert_eq!(
        dispositions[8],
        LineDisposition::Processed {
            alerts_fired: vec![AlertKind::ErrorRate]
        }
    );
    let sent = sink.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("*75.0%*"));
    assert!(sent[0].body.contains("3 errors in last 4 requests"));
}

#[tokio::test]
async fn should_stop_run_loop_on_shutdown() {
    // Arrange
    let path = test_log_file();
    append_lines(&path, &[]);
    let sink = SharedSink::default();
    let mut watcher = Watcher::new(
        config_for(&path, 200, 0.02),
        sink.clone(),
        Arc::new(ManualClock::new()),
    )
    .expect("watcher");
    let retry = PollRetry::new(Duration::from_millis(10));
    let mut reader = TailReader::open(&path, &retry).await.expect("open");

    append_lines(&path, &[access_line("green", 200)]);

    // Shut down once the failover alert has been delivered
    let observed = sink.clone();
    let shutdown = async move {
        while observed.sent().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };

    // Act
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        watcher.run(&mut reader, &retry, shutdown),
    )
    .await
    .expect("run loop should stop on shutdown");

    // Assert
    assert!(result.is_ok());
    assert_eq!(sink.sent().len(), 1);
    assert_eq!(watcher.state().last_seen_pool, "green");
}

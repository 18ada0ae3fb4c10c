use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use pool_watcher::config::AppConfig;
use pool_watcher::monitoring::{PollRetry, SlackAlert, SystemClock, TailReader, Watcher};
use pool_watcher::shutdown::shutdown_signal;
use pool_watcher::utils::{logging::init_logging, AppError};

/// Sleep between wake-ups in the idle terminal state
const IDLE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // 1. 환경변수 로드
    dotenvy::dotenv().ok();

    // 2. 로깅 초기화
    let _guard = init_logging();
    info!("Log watcher starting");

    // 3. 워처 실행
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    match run(&mut shutdown).await {
        Ok(()) => info!("Watcher stopped by signal"),
        Err(e) => {
            // Terminal state: stay up until signalled
            error!(
                error = %e,
                error_code = e.error_code(),
                "Critical error, watcher idling until shutdown"
            );
            idle_until(&mut shutdown).await;
        }
    }
}

async fn run<F>(shutdown: &mut F) -> Result<(), AppError>
where
    F: Future<Output = ()> + Unpin,
{
    let config = AppConfig::from_env()?;

    info!(
        log_file = %config.log_file.display(),
        active_pool = %config.active_pool,
        threshold_percent = config.error_rate_threshold_percent(),
        window_size = config.window_size,
        cooldown_secs = config.alert_cooldown.as_secs(),
        file_wait_max_attempts = ?config.file_wait_max_attempts,
        slack = if config.slack_webhook_url.is_some() { "configured" } else { "missing" },
        "Config loaded"
    );

    let sink = SlackAlert::new(config.slack_webhook_url.clone(), config.webhook_timeout)?;
    let file_retry = match config.file_wait_max_attempts {
        Some(max_attempts) => {
            PollRetry::new(config.file_wait_interval).with_max_attempts(max_attempts)
        }
        None => PollRetry::new(config.file_wait_interval),
    };
    let line_retry = PollRetry::new(config.line_poll_interval);
    let log_file = config.log_file.clone();

    let mut watcher = Watcher::new(config, sink, Arc::new(SystemClock))?;

    let mut reader = tokio::select! {
        _ = &mut *shutdown => return Ok(()),
        reader = TailReader::open(&log_file, &file_retry) => reader?,
    };

    watcher.run(&mut reader, &line_retry, shutdown).await
}

async fn idle_until<F>(shutdown: &mut F)
where
    F: Future<Output = ()> + Unpin,
{
    loop {
        tokio::select! {
            _ = &mut *shutdown => {
                info!("Shutdown received while idle");
                return;
            }
            _ = tokio::time::sleep(IDLE_INTERVAL) => {
                debug!("Still idling after critical error");
            }
        }
    }
}

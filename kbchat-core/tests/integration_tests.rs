//! Integration tests for kbchat-core infrastructure

use async_trait::async_trait;
use kbchat_core::{
    config_error, init_logging, not_found_error, retry_with_policy, storage_error,
    validation_error, with_timeout, ErrorContext, KbChatConfig, KbChatError, KbChatResult,
    LogFormat, LoggingConfig, NoopSleeper, RetryPolicy, Sleeper,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

/// Records every requested pause instead of waiting
#[derive(Default)]
struct RecordingSleeper {
    pauses: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}

fn transient() -> KbChatError {
    KbChatError::Network {
        message: "connection reset".to_string(),
        source: None,
        context: ErrorContext::new("test"),
    }
}

#[tokio::test]
async fn test_error_handling() {
    let error = storage_error!("Test storage error", "test_component");

    match &error {
        KbChatError::Storage {
            message, context, ..
        } => {
            assert_eq!(message, "Test storage error");
            assert_eq!(context.component, "test_component");
            assert!(!context.error_id.is_empty());
        }
        _ => panic!("Expected Storage error"),
    }

    // Logging an error never panics
    error.log();

    let network_error = transient();
    assert!(network_error.is_recoverable());

    let config_error = config_error!("Invalid config", "test");
    assert!(!config_error.is_recoverable());

    let validation = validation_error!("missing", "messages", "test");
    assert!(validation.is_client_error());
    assert!(!validation.is_recoverable());

    let missing = not_found_error!("company-acme", "test");
    assert!(!missing.is_recoverable());
    assert_eq!(missing.to_string(), "Resource not found: company-acme");
}

#[tokio::test]
async fn test_logging_initialization() {
    let config = LoggingConfig {
        level: "debug".to_string(),
        format: LogFormat::Compact,
        include_location: false,
        include_thread: false,
        log_to_file: false,
        log_file_path: None,
        enable_performance_monitoring: false,
        filter_directives: vec!["kbchat_core=debug".to_string()],
    };

    // A subscriber may already be installed by another test in this binary
    let _ = init_logging(&config);
}

#[tokio::test]
async fn test_file_logging_requires_path() {
    let config = LoggingConfig {
        log_to_file: true,
        log_file_path: None,
        ..LoggingConfig::default()
    };

    assert!(init_logging(&config).is_err());
}

#[tokio::test]
async fn test_retry_recovers_after_transient_failures() {
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let sleeper = RecordingSleeper::default();
    let policy = RetryPolicy::new(2, Duration::from_millis(250));

    let result = retry_with_policy(&policy, &sleeper, "test_operation", || {
        let count = attempt_count.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if count < 3 {
                Err(transient())
            } else {
                Ok("Success")
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), "Success");
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    assert_eq!(sleeper.pauses.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_retry_gives_up_after_three_attempts_with_fixed_delay() {
    let attempt_count = AtomicUsize::new(0);
    let sleeper = RecordingSleeper::default();
    let policy = RetryPolicy::new(2, Duration::from_millis(400));

    let result: KbChatResult<()> = retry_with_policy(&policy, &sleeper, "always_failing", || {
        attempt_count.fetch_add(1, Ordering::SeqCst);
        async { Err(transient()) }
    })
    .await;

    assert!(matches!(result, Err(KbChatError::Network { .. })));
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);

    let pauses = sleeper.pauses.lock().unwrap().clone();
    assert_eq!(
        pauses,
        vec![Duration::from_millis(400), Duration::from_millis(400)]
    );
}

#[tokio::test]
async fn test_retry_with_noop_sleeper_succeeds_first_time() {
    let policy = RetryPolicy::default();
    let result = retry_with_policy(&policy, &NoopSleeper, "ok", || async { Ok(42) }).await;
    assert_eq!(result.unwrap(), 42);
}

#[tokio::test]
async fn test_timeout_mechanism() {
    let quick_operation = async {
        sleep(Duration::from_millis(10)).await;
        Ok("Success")
    };

    let result = with_timeout(quick_operation, 100, "quick_test").await;
    assert_eq!(result.unwrap(), "Success");

    let slow_operation = async {
        sleep(Duration::from_millis(200)).await;
        Ok("Should not reach here")
    };

    let result = with_timeout(slow_operation, 50, "slow_test").await;
    match result {
        Err(KbChatError::Timeout {
            operation,
            duration_ms,
            ..
        }) => {
            assert_eq!(operation, "slow_test");
            assert_eq!(duration_ms, 50);
        }
        other => panic!("Expected Timeout error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kbchat.toml");

    let mut config = KbChatConfig::default();
    config.retrieval.top_k = 4;
    config.retry.delay_ms = 10;
    config.save_to_file(&path).unwrap();

    let loaded = KbChatConfig::from_file(&path).unwrap();
    assert_eq!(loaded.retrieval.top_k, 4);
    assert_eq!(loaded.retry.delay_ms, 10);
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_config_missing_file_is_config_error() {
    let result = KbChatConfig::from_file("/definitely/not/here/kbchat.toml");
    match result {
        Err(KbChatError::Config { context, .. }) => {
            assert_eq!(context.operation.as_deref(), Some("read_file"));
        }
        _ => panic!("Expected Config error"),
    }
}

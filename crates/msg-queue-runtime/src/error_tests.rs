//! Tests for error types.

use super::*;

#[test]
fn test_error_transience() {
    assert!(QueueError::Timeout {
        duration: Duration::seconds(30),
    }
    .is_transient());

    assert!(!QueueError::QueueNotFound {
        queue_name: "test".to_string(),
    }
    .is_transient());

    assert!(QueueError::ConnectionFailed {
        message: "network error".to_string(),
    }
    .is_transient());

    assert!(!QueueError::MessageTooLarge {
        size: 1000,
        max_size: 500
    }
    .is_transient());

    assert!(!QueueError::ClientClosed.is_transient());
    assert!(!QueueError::MessageHandlerFailed {
        message: "boom".to_string(),
    }
    .is_transient());
}

#[test]
fn test_should_retry_follows_transience() {
    let errors = [
        QueueError::ConnectionFailed {
            message: "reset".to_string(),
        },
        QueueError::ClientClosed,
        QueueError::QueueNotFound {
            queue_name: "test".to_string(),
        },
        QueueError::Timeout {
            duration: Duration::seconds(1),
        },
    ];

    for error in &errors {
        assert_eq!(error.should_retry(), error.is_transient(), "{}", error);
    }
    assert!(errors[0].should_retry());
    assert!(!errors[1].should_retry());
}

#[test]
fn test_retry_suggestions() {
    let connection = QueueError::ConnectionFailed {
        message: "reset".to_string(),
    };
    assert_eq!(connection.retry_after(), Some(Duration::seconds(5)));

    let throttled = QueueError::ProviderError {
        provider: "AzureServiceBus".to_string(),
        code: "429".to_string(),
        message: "Too many requests".to_string(),
    };
    assert_eq!(throttled.retry_after(), Some(Duration::seconds(10)));

    let not_found = QueueError::QueueNotFound {
        queue_name: "test".to_string(),
    };
    assert_eq!(not_found.retry_after(), None);
}

#[test]
fn test_nested_errors_convert_into_queue_error() {
    let err: QueueError = ValidationError::Required {
        field: "queue_name".to_string(),
    }
    .into();
    assert!(matches!(err, QueueError::ValidationError(_)));
    assert_eq!(
        err.to_string(),
        "Validation error: Required field missing: queue_name"
    );

    let err: QueueError = ConfigurationError::Missing {
        key: "Endpoint".to_string(),
    }
    .into();
    assert!(!err.is_transient());
}

#[test]
fn test_unsupported_provider_error() {
    let err = ConfigurationError::UnsupportedProvider {
        provider: "AwsSqs".to_string(),
        message: "not available in this build".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Unsupported provider AwsSqs: not available in this build"
    );

    let err: QueueError = err.into();
    assert!(matches!(
        err,
        QueueError::ConfigurationError(ConfigurationError::UnsupportedProvider { .. })
    ));
    assert!(!err.should_retry());
}

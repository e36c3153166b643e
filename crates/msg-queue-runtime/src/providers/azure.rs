//! Azure Service Bus provider implementation.
//!
//! Talks to the Service Bus REST data plane with `reqwest`, authenticating
//! every request with a shared access signature (see [`crate::auth`]).
//!
//! | Operation          | Request                                                |
//! |--------------------|--------------------------------------------------------|
//! | send               | `POST {namespace}/{queue}/messages`                    |
//! | peek-lock receive  | `POST {namespace}/{queue}/messages/head?timeout=N`     |
//! | complete           | `DELETE {namespace}/{queue}/messages/{id}/{lock}`      |
//! | abandon            | `PUT {namespace}/{queue}/messages/{id}/{lock}`         |
//! | renew lock         | `POST {namespace}/{queue}/messages/{id}/{lock}`        |
//!
//! System properties travel in the `BrokerProperties` JSON header. Each
//! application property is a separate header whose value is a JSON literal:
//! integers and booleans bare, strings quoted.
//!
//! HTTP header names are case-insensitive and are sent lowercased, so the
//! broker stores `MessageNumber` as `messagenumber`. [`ReceivedMessage::property`]
//! ignores case, but consumers on other client libraries that look properties
//! up case-sensitively will not find the original spelling.
//!
//! ## Example
//!
//! ```no_run
//! use msg_queue_runtime::{
//!     AzureServiceBusConfig, ProviderConfig, QueueClientFactory, QueueConfig,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = QueueConfig {
//!     provider: ProviderConfig::AzureServiceBus(AzureServiceBusConfig::new(
//!         "Endpoint=sb://my-ns.servicebus.windows.net/;SharedAccessKeyName=send;SharedAccessKey=...",
//!     )),
//! };
//!
//! let client = QueueClientFactory::create_client(config).await?;
//! # Ok(())
//! # }
//! ```

use crate::auth::SasTokenProvider;
use crate::client::QueueProvider;
use crate::connection_string::ServiceBusConnectionString;
use crate::error::{ConfigurationError, QueueError, SerializationError};
use crate::message::{
    Message, MessageId, PropertyValue, QueueName, ReceiptHandle, ReceivedMessage, Timestamp,
};
use crate::provider::{AzureServiceBusConfig, ProviderType};
use async_trait::async_trait;
use chrono::Duration;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client as HttpClient, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use url::Url;

#[cfg(test)]
#[path = "azure_tests.rs"]
mod tests;

const BROKER_PROPERTIES: &str = "brokerproperties";

/// Content type sent when the message does not specify one
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Queue lock duration assumed when the service omits `LockedUntilUtc`
const DEFAULT_LOCK_DURATION_SECONDS: i64 = 60;

/// Response headers that are never application properties
const RESERVED_HEADERS: &[&str] = &[
    BROKER_PROPERTIES,
    "content-type",
    "content-length",
    "date",
    "server",
    "location",
    "transfer-encoding",
    "strict-transport-security",
    "connection",
    "expires",
    "cache-control",
    "pragma",
    "vary",
];

// ============================================================================
// Error Types
// ============================================================================

/// Azure Service Bus specific errors
#[derive(Debug, thiserror::Error)]
pub enum AzureError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Message lock lost: {0}")]
    MessageLockLost(String),

    #[error("Message rejected as too large ({size} bytes)")]
    MessageTooLarge { size: usize },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Service Bus returned {status}: {message}")]
    ServiceBusError { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid configuration: {0}")]
    ConfigurationError(#[from] ConfigurationError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] SerializationError),
}

impl AzureError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::NetworkError(_) => true,
            Self::ServiceBusError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Map Azure error to QueueError
    pub fn to_queue_error(self) -> QueueError {
        match self {
            Self::AuthenticationError(msg) => QueueError::AuthenticationFailed { message: msg },
            Self::PermissionDenied(operation) => QueueError::PermissionDenied { operation },
            Self::QueueNotFound(queue_name) => QueueError::QueueNotFound { queue_name },
            Self::MessageLockLost(receipt) => QueueError::MessageNotFound { receipt },
            Self::MessageTooLarge { size } => QueueError::MessageTooLarge {
                size,
                max_size: ProviderType::AzureServiceBus.max_message_size(),
            },
            Self::Timeout(duration) => QueueError::Timeout { duration },
            Self::ServiceBusError { status, message } => QueueError::ProviderError {
                provider: ProviderType::AzureServiceBus.to_string(),
                code: status.to_string(),
                message,
            },
            Self::NetworkError(msg) => QueueError::ConnectionFailed { message: msg },
            Self::ConfigurationError(e) => QueueError::ConfigurationError(e),
            Self::SerializationError(e) => QueueError::SerializationError(e),
        }
    }
}

impl From<AzureError> for QueueError {
    fn from(error: AzureError) -> Self {
        error.to_queue_error()
    }
}

// ============================================================================
// Wire Types
// ============================================================================

/// System properties carried in the `BrokerProperties` header
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BrokerProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_to_live: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lock_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delivery_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enqueued_time_utc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    locked_until_utc: Option<String>,
}

impl BrokerProperties {
    fn from_headers(headers: &HeaderMap) -> Result<Option<Self>, AzureError> {
        let Some(raw) = headers.get(BROKER_PROPERTIES) else {
            return Ok(None);
        };
        let raw = raw.to_str().map_err(|_| SerializationError::InvalidAttribute {
            key: "BrokerProperties".to_string(),
        })?;
        let properties = serde_json::from_str(raw).map_err(SerializationError::from)?;
        Ok(Some(properties))
    }

    fn locked_until(&self) -> Timestamp {
        self.locked_until_utc
            .as_deref()
            .and_then(|value| value.parse().ok())
            .unwrap_or_else(|| Timestamp::after(Duration::seconds(DEFAULT_LOCK_DURATION_SECONDS)))
    }
}

/// What a failed request was addressing, for status code mapping
enum Target<'a> {
    Queue(&'a QueueName),
    Lock(&'a ReceiptHandle),
}

// ============================================================================
// Azure Service Bus Provider
// ============================================================================

/// Azure Service Bus queue provider implementation
///
/// The provider is cheap to share behind an `Arc`; the HTTP connection pool
/// and the cached SAS token are reused by every call.
pub struct AzureServiceBusProvider {
    http_client: HttpClient,
    base_url: Url,
    tokens: SasTokenProvider,
    request_timeout: Duration,
    entity_path: Option<String>,
}

impl AzureServiceBusProvider {
    /// Create new Azure Service Bus provider
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The connection string is malformed or lacks credentials
    /// - The token lifetime is too short
    /// - The HTTP client cannot be built
    pub fn new(config: AzureServiceBusConfig) -> Result<Self, AzureError> {
        let connection = ServiceBusConnectionString::parse(&config.connection_string)?;
        let tokens = SasTokenProvider::new(&connection, config.token_ttl)?;

        let http_client = HttpClient::builder()
            .build()
            .map_err(|e| AzureError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = connection.http_base_url();
        tracing::debug!(namespace = %base_url, "Created Service Bus provider");

        Ok(Self {
            http_client,
            base_url,
            tokens,
            request_timeout: config.request_timeout,
            entity_path: connection.entity_path().map(str::to_string),
        })
    }

    /// REST base URL of the namespace
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn messages_url(&self, queue: &QueueName) -> String {
        format!("{}{}/messages", self.base_url, queue)
    }

    fn lock_url(&self, receipt: &ReceiptHandle) -> String {
        format!(
            "{}{}/messages/{}/{}",
            self.base_url,
            receipt.queue(),
            urlencoding::encode(receipt.message_id().as_str()),
            urlencoding::encode(receipt.lock_token())
        )
    }

    /// Authorized request with the given total timeout
    async fn request(&self, method: Method, url: &str, timeout: Duration) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header(AUTHORIZATION, self.tokens.token().await)
            .timeout(timeout.to_std().unwrap_or_default())
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        timeout: Duration,
        target: Target<'_>,
    ) -> Result<Response, AzureError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AzureError::Timeout(timeout)
            } else if e.is_connect() {
                AzureError::NetworkError(format!("Connection failed: {}", e))
            } else {
                AzureError::NetworkError(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_status(status, body, timeout, target))
    }

    /// Issue a settlement request against a message lock
    async fn settle(
        &self,
        method: Method,
        receipt: &ReceiptHandle,
    ) -> Result<Response, AzureError> {
        let request = self
            .request(method, &self.lock_url(receipt), self.request_timeout)
            .await;
        self.execute(request, self.request_timeout, Target::Lock(receipt))
            .await
    }

    fn build_send_headers(
        &self,
        message: &Message,
        message_id: &MessageId,
    ) -> Result<HeaderMap, AzureError> {
        let broker = BrokerProperties {
            message_id: Some(message_id.to_string()),
            correlation_id: message.correlation_id.clone(),
            time_to_live: message
                .time_to_live
                .map(|ttl| ttl.num_milliseconds() as f64 / 1000.0),
            ..Default::default()
        };
        let broker = serde_json::to_string(&broker).map_err(SerializationError::from)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(BROKER_PROPERTIES),
            header_value("BrokerProperties", &broker)?,
        );
        headers.insert(
            CONTENT_TYPE,
            header_value(
                "ContentType",
                message.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE),
            )?,
        );

        for (key, value) in &message.application_properties {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| SerializationError::InvalidAttribute { key: key.clone() })?;
            if RESERVED_HEADERS.contains(&name.as_str()) {
                return Err(SerializationError::InvalidAttribute { key: key.clone() }.into());
            }
            headers.insert(name, header_value(key, &value.to_wire(key)?)?);
        }

        Ok(headers)
    }

    fn parse_received(
        &self,
        queue: &QueueName,
        headers: &HeaderMap,
        body: bytes::Bytes,
    ) -> Result<ReceivedMessage, AzureError> {
        let broker = BrokerProperties::from_headers(headers)?.ok_or_else(|| {
            SerializationError::InvalidAttribute {
                key: "BrokerProperties".to_string(),
            }
        })?;

        let message_id: MessageId = broker
            .message_id
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(|_| SerializationError::InvalidAttribute {
                key: "MessageId".to_string(),
            })?;
        let lock_token = broker.lock_token.clone().ok_or_else(|| {
            SerializationError::InvalidAttribute {
                key: "LockToken".to_string(),
            }
        })?;

        let enqueued_at = broker
            .enqueued_time_utc
            .as_deref()
            .and_then(|value| value.parse().ok())
            .unwrap_or_else(Timestamp::now);

        let application_properties = headers
            .iter()
            .filter(|(name, _)| !is_reserved_header(name.as_str()))
            .filter_map(|(name, value)| {
                let value = PropertyValue::from_wire(value.to_str().ok()?)?;
                Some((name.as_str().to_string(), value))
            })
            .collect::<HashMap<_, _>>();

        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Ok(ReceivedMessage {
            message_id: message_id.clone(),
            body,
            application_properties,
            correlation_id: broker.correlation_id.clone(),
            content_type,
            sequence_number: broker.sequence_number.unwrap_or_default(),
            delivery_count: broker.delivery_count.unwrap_or(1),
            enqueued_at,
            receipt_handle: ReceiptHandle::new(
                queue.clone(),
                message_id,
                lock_token,
                broker.locked_until(),
                ProviderType::AzureServiceBus,
            ),
        })
    }
}

impl fmt::Debug for AzureServiceBusProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureServiceBusProvider")
            .field("base_url", &self.base_url.as_str())
            .field("tokens", &self.tokens)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

fn header_value(key: &str, value: &str) -> Result<HeaderValue, SerializationError> {
    HeaderValue::from_str(value).map_err(|_| SerializationError::InvalidAttribute {
        key: key.to_string(),
    })
}

fn is_reserved_header(name: &str) -> bool {
    RESERVED_HEADERS.contains(&name) || name.starts_with("x-ms-")
}

fn map_status(
    status: StatusCode,
    body: String,
    timeout: Duration,
    target: Target<'_>,
) -> AzureError {
    match (status.as_u16(), &target) {
        (401, _) => AzureError::AuthenticationError(body),
        (403, Target::Queue(queue)) => {
            AzureError::PermissionDenied(format!("send/receive on '{}'", queue))
        }
        (403, Target::Lock(receipt)) => {
            AzureError::PermissionDenied(format!("settle message on '{}'", receipt.queue()))
        }
        (404, Target::Queue(queue)) => AzureError::QueueNotFound(queue.to_string()),
        (404 | 410, Target::Lock(receipt)) => AzureError::MessageLockLost(receipt.to_string()),
        (408, _) => AzureError::Timeout(timeout),
        (413, _) => AzureError::MessageTooLarge { size: 0 },
        (code, _) => AzureError::ServiceBusError {
            status: code,
            message: if body.is_empty() {
                status.canonical_reason().unwrap_or("Unknown error").to_string()
            } else {
                body
            },
        },
    }
}

#[async_trait]
impl QueueProvider for AzureServiceBusProvider {
    async fn send_message(
        &self,
        queue: &QueueName,
        message: &Message,
    ) -> Result<MessageId, QueueError> {
        let message_id = message.message_id.clone().unwrap_or_default();
        let headers = self.build_send_headers(message, &message_id)?;

        let request = self
            .request(Method::POST, &self.messages_url(queue), self.request_timeout)
            .await
            .headers(headers)
            .body(message.body.clone());

        self.execute(request, self.request_timeout, Target::Queue(queue))
            .await
            .map_err(|e| match e {
                AzureError::MessageTooLarge { .. } => AzureError::MessageTooLarge {
                    size: message.body.len(),
                },
                other => other,
            })?;

        tracing::debug!(queue = %queue, message_id = %message_id, "Message sent");
        Ok(message_id)
    }

    async fn receive_message(
        &self,
        queue: &QueueName,
        timeout: Duration,
    ) -> Result<Option<ReceivedMessage>, QueueError> {
        let wait_seconds = (timeout.num_milliseconds().max(0) + 999) / 1000;
        let url = format!("{}/head?timeout={}", self.messages_url(queue), wait_seconds);
        let total_timeout = Duration::seconds(wait_seconds) + self.request_timeout;

        let request = self.request(Method::POST, &url, total_timeout).await;
        let response = self
            .execute(request, total_timeout, Target::Queue(queue))
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| AzureError::NetworkError(format!("Failed to read message body: {}", e)))?;

        let received = self.parse_received(queue, &headers, body)?;
        tracing::debug!(
            queue = %queue,
            message_id = %received.message_id,
            delivery_count = received.delivery_count,
            "Message received"
        );
        Ok(Some(received))
    }

    async fn complete_message(&self, receipt: &ReceiptHandle) -> Result<(), QueueError> {
        self.settle(Method::DELETE, receipt).await?;
        Ok(())
    }

    async fn abandon_message(&self, receipt: &ReceiptHandle) -> Result<(), QueueError> {
        self.settle(Method::PUT, receipt).await?;
        Ok(())
    }

    async fn renew_message_lock(&self, receipt: &ReceiptHandle) -> Result<Timestamp, QueueError> {
        let response = self.settle(Method::POST, receipt).await?;
        let locked_until = BrokerProperties::from_headers(response.headers())?
            .map(|broker| broker.locked_until())
            .unwrap_or_else(|| Timestamp::after(Duration::seconds(DEFAULT_LOCK_DURATION_SECONDS)));
        Ok(locked_until)
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::AzureServiceBus
    }

    fn entity_path(&self) -> Option<&str> {
        self.entity_path.as_deref()
    }
}

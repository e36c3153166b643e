//! Message types for queue operations including core domain identifiers.

use crate::error::{SerializationError, ValidationError};
use crate::provider::ProviderType;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Validated queue name with length and character restrictions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueName(String);

impl QueueName {
    /// Create new queue name with validation
    ///
    /// Service Bus entity names may contain letters, digits, periods, hyphens,
    /// underscores and forward slashes, and must start and end with a letter or
    /// digit.
    pub fn new(name: String) -> Result<Self, ValidationError> {
        if name.is_empty() || name.len() > 260 {
            return Err(ValidationError::OutOfRange {
                field: "queue_name".to_string(),
                message: "must be 1-260 characters".to_string(),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
        {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "only ASCII alphanumeric, '-', '_', '.' and '/' allowed".to_string(),
            });
        }

        let starts_ok = name.starts_with(|c: char| c.is_ascii_alphanumeric());
        let ends_ok = name.ends_with(|c: char| c.is_ascii_alphanumeric());
        if !starts_ok || !ends_ok {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "must start and end with a letter or digit".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// Unique identifier for messages within the queue system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        Self(id.to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// Timestamp wrapper for consistent time handling
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current time
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create timestamp from DateTime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Timestamp `duration` from now
    pub fn after(duration: Duration) -> Self {
        Self(Utc::now() + duration)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

impl FromStr for Timestamp {
    type Err = chrono::ParseError;

    /// Accepts RFC 3339 and the RFC 1123 form used in HTTP headers
    /// (`Wed, 02 Jul 2014 01:47:33 GMT`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => Ok(Self(dt.with_timezone(&Utc))),
            Err(_) => {
                let dt = DateTime::parse_from_rfc2822(s)?;
                Ok(Self(dt.with_timezone(&Utc)))
            }
        }
    }
}

// ============================================================================
// Application Properties
// ============================================================================

/// Value of a user-defined application property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl PropertyValue {
    /// Integer value, if this is an integer property
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// String value, if this is a string property
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Encode as the JSON literal carried in a property header.
    ///
    /// Strings are quoted, numbers and booleans are bare.
    pub fn to_wire(&self, key: &str) -> Result<String, SerializationError> {
        if let Self::Double(value) = self {
            if !value.is_finite() {
                return Err(SerializationError::InvalidAttribute {
                    key: key.to_string(),
                });
            }
        }
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a property header value; `None` when it is not a JSON scalar.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match serde_json::from_str::<serde_json::Value>(raw.trim()).ok()? {
            serde_json::Value::Bool(value) => Some(Self::Bool(value)),
            serde_json::Value::Number(number) => number
                .as_i64()
                .map(Self::Int)
                .or_else(|| number.as_f64().map(Self::Double)),
            serde_json::Value::String(value) => Some(Self::String(value)),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{}", value),
            Self::Int(value) => write!(f, "{}", value),
            Self::Double(value) => write!(f, "{}", value),
            Self::String(value) => write!(f, "{}", value),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// A message to be sent through the queue system
#[derive(Debug, Clone)]
pub struct Message {
    pub body: Bytes,
    pub application_properties: HashMap<String, PropertyValue>,
    pub message_id: Option<MessageId>,
    pub correlation_id: Option<String>,
    pub content_type: Option<String>,
    pub time_to_live: Option<Duration>,
}

impl Message {
    /// Create new message with body
    pub fn new(body: Bytes) -> Self {
        Self {
            body,
            application_properties: HashMap::new(),
            message_id: None,
            correlation_id: None,
            content_type: None,
            time_to_live: None,
        }
    }

    /// Add or replace an application property
    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.application_properties.insert(key.into(), value.into());
        self
    }

    /// Set an explicit message ID instead of letting the provider assign one
    pub fn with_message_id(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }

    /// Add correlation ID for tracking
    pub fn with_correlation_id(mut self, correlation_id: String) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Set the body content type
    pub fn with_content_type(mut self, content_type: String) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Add time-to-live for message expiration
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }
}

impl From<&str> for Message {
    fn from(body: &str) -> Self {
        Self::new(Bytes::from(body.to_string()))
    }
}

/// A message received under a peek-lock, with delivery metadata
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: MessageId,
    pub body: Bytes,
    pub application_properties: HashMap<String, PropertyValue>,
    pub correlation_id: Option<String>,
    pub content_type: Option<String>,
    pub sequence_number: i64,
    pub delivery_count: u32,
    pub enqueued_at: Timestamp,
    pub receipt_handle: ReceiptHandle,
}

impl ReceivedMessage {
    /// Look up an application property, ignoring ASCII case.
    ///
    /// Header-based transports do not preserve the casing of property names.
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.application_properties.get(name).or_else(|| {
            self.application_properties
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
    }

    /// Body decoded as UTF-8
    pub fn body_as_str(&self) -> Result<&str, SerializationError> {
        std::str::from_utf8(&self.body).map_err(|_| SerializationError::InvalidUtf8)
    }

    /// Time until which the message is locked to this receiver
    pub fn locked_until(&self) -> &Timestamp {
        self.receipt_handle.expires_at()
    }
}

/// Opaque token for settling a message received under a peek-lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptHandle {
    queue: QueueName,
    message_id: MessageId,
    lock_token: String,
    expires_at: Timestamp,
    provider_type: ProviderType,
}

impl ReceiptHandle {
    /// Create new receipt handle
    pub fn new(
        queue: QueueName,
        message_id: MessageId,
        lock_token: String,
        expires_at: Timestamp,
        provider_type: ProviderType,
    ) -> Self {
        Self {
            queue,
            message_id,
            lock_token,
            expires_at,
            provider_type,
        }
    }

    /// Queue the message was received from
    pub fn queue(&self) -> &QueueName {
        &self.queue
    }

    /// ID of the locked message
    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    /// Lock token issued by the provider
    pub fn lock_token(&self) -> &str {
        &self.lock_token
    }

    /// Lock expiry
    pub fn expires_at(&self) -> &Timestamp {
        &self.expires_at
    }

    /// Same receipt with a renewed lock expiry
    pub fn with_expiry(&self, expires_at: Timestamp) -> Self {
        Self {
            expires_at,
            ..self.clone()
        }
    }

    /// Check if the lock has expired
    pub fn is_expired(&self) -> bool {
        Timestamp::now() >= self.expires_at
    }

    /// Get time until expiry
    pub fn time_until_expiry(&self) -> Duration {
        let now = Timestamp::now();
        if now >= self.expires_at {
            Duration::zero()
        } else {
            self.expires_at.as_datetime() - now.as_datetime()
        }
    }

    /// Get provider type
    pub fn provider_type(&self) -> ProviderType {
        self.provider_type
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.queue, self.message_id, self.lock_token)
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;

//! Azure Service Bus connection string parsing.
//!
//! A connection string is a `;`-separated list of `Key=Value` pairs:
//!
//! ```text
//! Endpoint=sb://my-namespace.servicebus.windows.net/;SharedAccessKeyName=RootManageSharedAccessKey;SharedAccessKey=<base64>
//! ```
//!
//! Keys are matched case-insensitively. Values may themselves contain `=`
//! (shared access keys are base64), so each pair is split on its first `=`.

use crate::error::ConfigurationError;
use std::fmt;
use std::str::FromStr;
use url::Url;

#[cfg(test)]
#[path = "connection_string_tests.rs"]
mod tests;

const ENDPOINT: &str = "endpoint";
const SHARED_ACCESS_KEY_NAME: &str = "sharedaccesskeyname";
const SHARED_ACCESS_KEY: &str = "sharedaccesskey";
const SHARED_ACCESS_SIGNATURE: &str = "sharedaccesssignature";
const ENTITY_PATH: &str = "entitypath";
const USE_DEVELOPMENT_EMULATOR: &str = "usedevelopmentemulator";

/// Parsed Service Bus connection string
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceBusConnectionString {
    endpoint: Url,
    shared_access_key_name: Option<String>,
    shared_access_key: Option<String>,
    shared_access_signature: Option<String>,
    entity_path: Option<String>,
    use_development_emulator: bool,
}

impl ServiceBusConnectionString {
    /// Parse and validate a connection string
    pub fn parse(value: &str) -> Result<Self, ConfigurationError> {
        let mut endpoint = None;
        let mut shared_access_key_name = None;
        let mut shared_access_key = None;
        let mut shared_access_signature = None;
        let mut entity_path = None;
        let mut use_development_emulator = false;

        for segment in value.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, val) = segment.split_once('=').ok_or_else(|| {
                ConfigurationError::Parsing {
                    message: format!(
                        "connection string segment '{}' is not a Key=Value pair",
                        segment_name(segment)
                    ),
                }
            })?;
            let val = val.trim().to_string();

            match key.trim().to_ascii_lowercase().as_str() {
                ENDPOINT => endpoint = Some(val),
                SHARED_ACCESS_KEY_NAME => shared_access_key_name = Some(val),
                SHARED_ACCESS_KEY => shared_access_key = Some(val),
                SHARED_ACCESS_SIGNATURE => shared_access_signature = Some(val),
                ENTITY_PATH => entity_path = Some(val),
                USE_DEVELOPMENT_EMULATOR => {
                    use_development_emulator = val.eq_ignore_ascii_case("true")
                }
                // Unknown keys are ignored, matching the service SDKs
                _ => {}
            }
        }

        let endpoint = endpoint.ok_or_else(|| ConfigurationError::Missing {
            key: "Endpoint".to_string(),
        })?;
        let endpoint = Url::parse(&endpoint).map_err(|e| ConfigurationError::Invalid {
            message: format!("Endpoint is not a valid URL: {}", e),
        })?;

        if !matches!(endpoint.scheme(), "sb" | "https" | "http") {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "Endpoint scheme '{}' is not supported; expected sb, https or http",
                    endpoint.scheme()
                ),
            });
        }

        if endpoint.host_str().map_or(true, str::is_empty) {
            return Err(ConfigurationError::Invalid {
                message: "Endpoint must include a host name".to_string(),
            });
        }

        let has_key = shared_access_key_name.is_some() && shared_access_key.is_some();
        if !has_key && shared_access_signature.is_none() {
            return Err(ConfigurationError::Missing {
                key: "SharedAccessKeyName and SharedAccessKey, or SharedAccessSignature"
                    .to_string(),
            });
        }

        Ok(Self {
            endpoint,
            shared_access_key_name,
            shared_access_key,
            shared_access_signature,
            entity_path,
            use_development_emulator,
        })
    }

    /// Endpoint as written in the connection string
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fully qualified namespace host, e.g. `my-ns.servicebus.windows.net`
    pub fn fully_qualified_namespace(&self) -> &str {
        self.endpoint.host_str().unwrap_or_default()
    }

    /// Base URL of the REST data plane, always ending in `/`
    ///
    /// `sb://` endpoints map to `https://`, or `http://` when the connection
    /// string targets the local development emulator.
    pub fn http_base_url(&self) -> Url {
        let scheme = match self.endpoint.scheme() {
            "sb" if self.use_development_emulator => "http",
            "sb" => "https",
            other => other,
        };

        let mut base = format!("{}://{}", scheme, self.fully_qualified_namespace());
        if let Some(port) = self.endpoint.port() {
            base.push_str(&format!(":{}", port));
        }
        base.push('/');

        // The host was validated in parse(), so this cannot fail in practice
        Url::parse(&base).unwrap_or_else(|_| self.endpoint.clone())
    }

    pub fn shared_access_key_name(&self) -> Option<&str> {
        self.shared_access_key_name.as_deref()
    }

    pub fn shared_access_key(&self) -> Option<&str> {
        self.shared_access_key.as_deref()
    }

    pub fn shared_access_signature(&self) -> Option<&str> {
        self.shared_access_signature.as_deref()
    }

    /// Queue (or topic) the connection string is scoped to, if any
    pub fn entity_path(&self) -> Option<&str> {
        self.entity_path.as_deref()
    }

    pub fn use_development_emulator(&self) -> bool {
        self.use_development_emulator
    }
}

/// Key portion of a malformed segment; never echoes a secret value
fn segment_name(segment: &str) -> &str {
    segment.split('=').next().unwrap_or_default()
}

impl FromStr for ServiceBusConnectionString {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for ServiceBusConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBusConnectionString")
            .field("endpoint", &self.endpoint.as_str())
            .field("shared_access_key_name", &self.shared_access_key_name)
            .field(
                "shared_access_key",
                if self.shared_access_key.is_some() {
                    &"<REDACTED>"
                } else {
                    &"None"
                },
            )
            .field(
                "shared_access_signature",
                if self.shared_access_signature.is_some() {
                    &"<REDACTED>"
                } else {
                    &"None"
                },
            )
            .field("entity_path", &self.entity_path)
            .field("use_development_emulator", &self.use_development_emulator)
            .finish()
    }
}

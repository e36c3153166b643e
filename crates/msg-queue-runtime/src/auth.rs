//! Shared access signature (SAS) authentication for Service Bus.
//!
//! Every REST call carries an `Authorization` header holding a SAS token:
//!
//! ```text
//! SharedAccessSignature sr=<uri>&sig=<signature>&se=<expiry>&skn=<key name>
//! ```
//!
//! The signature is `base64(HMAC-SHA256(key, url_encode(uri) + "\n" + expiry))`.
//! Tokens are cached and regenerated shortly before they expire.

use crate::connection_string::ServiceBusConnectionString;
use crate::error::ConfigurationError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use tokio::sync::RwLock;

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;

type HmacSha256 = Hmac<Sha256>;

/// Tokens are regenerated once they are this close to expiry
const REFRESH_MARGIN_SECONDS: i64 = 5 * 60;

/// Build a SAS token for `resource_uri` valid until `expiry_unix`
pub fn generate_sas_token(
    resource_uri: &str,
    key_name: &str,
    key: &str,
    expiry_unix: i64,
) -> String {
    let encoded_uri = urlencoding::encode(resource_uri);
    let string_to_sign = format!("{}\n{}", encoded_uri, expiry_unix);

    // The key is used as its UTF-8 text, not base64-decoded
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(string_to_sign.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    format!(
        "SharedAccessSignature sr={}&sig={}&se={}&skn={}",
        encoded_uri,
        urlencoding::encode(&signature),
        expiry_unix,
        key_name
    )
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at_unix: i64,
}

enum Credential {
    SharedKey { key_name: String, key: String },
    Signature(String),
}

/// Issues SAS tokens for one namespace, caching the current token
pub struct SasTokenProvider {
    resource_uri: String,
    credential: Credential,
    token_ttl: Duration,
    cache: RwLock<Option<CachedToken>>,
}

impl SasTokenProvider {
    /// Token provider for the namespace of `connection`
    ///
    /// Tokens are scoped to the entity when the connection string names one.
    pub fn new(
        connection: &ServiceBusConnectionString,
        token_ttl: Duration,
    ) -> Result<Self, ConfigurationError> {
        if token_ttl <= Duration::seconds(REFRESH_MARGIN_SECONDS) {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "token TTL must be longer than {} seconds",
                    REFRESH_MARGIN_SECONDS
                ),
            });
        }

        let credential = match (
            connection.shared_access_signature(),
            connection.shared_access_key_name(),
            connection.shared_access_key(),
        ) {
            (Some(signature), _, _) => Credential::Signature(signature.to_string()),
            (None, Some(key_name), Some(key)) => Credential::SharedKey {
                key_name: key_name.to_string(),
                key: key.to_string(),
            },
            _ => {
                return Err(ConfigurationError::Missing {
                    key: "SharedAccessKey".to_string(),
                })
            }
        };

        let resource_uri = match connection.entity_path() {
            Some(entity) => format!("{}{}", connection.http_base_url(), entity),
            None => connection.http_base_url().to_string(),
        };

        Ok(Self {
            resource_uri,
            credential,
            token_ttl,
            cache: RwLock::new(None),
        })
    }

    /// Resource URI tokens are scoped to
    pub fn resource_uri(&self) -> &str {
        &self.resource_uri
    }

    /// Current token, regenerating it when it is missing or near expiry
    pub async fn token(&self) -> String {
        let (key_name, key) = match &self.credential {
            Credential::Signature(signature) => return signature.clone(),
            Credential::SharedKey { key_name, key } => (key_name, key),
        };

        let now = Utc::now().timestamp();

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at_unix - now > REFRESH_MARGIN_SECONDS {
                    return cached.token.clone();
                }
            }
        }

        let mut cache = self.cache.write().await;

        // Double-check after acquiring write lock
        if let Some(cached) = cache.as_ref() {
            if cached.expires_at_unix - now > REFRESH_MARGIN_SECONDS {
                return cached.token.clone();
            }
        }

        let expires_at_unix = now + self.token_ttl.num_seconds();
        let token = generate_sas_token(&self.resource_uri, key_name, key, expires_at_unix);
        tracing::debug!(
            resource_uri = %self.resource_uri,
            expires_at_unix,
            "Generated shared access signature"
        );

        *cache = Some(CachedToken {
            token: token.clone(),
            expires_at_unix,
        });

        token
    }
}

impl fmt::Debug for SasTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let credential = match &self.credential {
            Credential::SharedKey { key_name, .. } => format!("SharedKey({})", key_name),
            Credential::Signature(_) => "Signature(<REDACTED>)".to_string(),
        };
        f.debug_struct("SasTokenProvider")
            .field("resource_uri", &self.resource_uri)
            .field("credential", &credential)
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

use crate::error::EventHubError;
use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::Sha256;
use std::convert::TryFrom;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_SAS_TOKEN_TTL_SECS: u64 = 3600;

/// Characters left untouched when a value is placed in the token.
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// A Shared Access Signature token for an Event Hubs resource.
#[derive(Clone, PartialEq)]
pub struct SharedAccessSignature {
    encoded_resource_uri: String,
    encoded_signature: String,
    expiry: i64,
    key_name: String,
}

impl SharedAccessSignature {
    /// Signs `"{encoded resource uri}\n{expiry}"` with the shared access key.
    /// The key is used as is, it is not base64 decoded.
    pub fn generate(
        resource_uri: &str,
        key_name: &str,
        key: &str,
        expiry: i64,
    ) -> Result<SharedAccessSignature, EventHubError> {
        let encoded_resource_uri = encode(resource_uri);
        let string_to_sign = format!("{}\n{}", encoded_resource_uri, expiry);

        let mut mac = HmacSha256::new_from_slice(key.as_bytes()).map_err(|err| {
            EventHubError::ConfigurationError {
                message: format!("Cannot use the shared access key to sign the token. Err: {}", err),
            }
        })?;
        mac.update(string_to_sign.as_bytes());
        let signature = base64.encode(mac.finalize().into_bytes());

        Ok(SharedAccessSignature {
            encoded_resource_uri,
            encoded_signature: encode(&signature),
            expiry,
            key_name: key_name.to_owned(),
        })
    }

    pub fn expiry(&self) -> i64 {
        self.expiry
    }
}

impl fmt::Display for SharedAccessSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SharedAccessSignature sr={}&sig={}&se={}&skn={}",
            self.encoded_resource_uri, self.encoded_signature, self.expiry, self.key_name
        )
    }
}

impl fmt::Debug for SharedAccessSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedAccessSignature")
            .field("resource_uri", &self.encoded_resource_uri)
            .field("expiry", &self.expiry)
            .field("key_name", &self.key_name)
            .finish()
    }
}

/// Returns the unix timestamp, in seconds, `ttl_secs` seconds from now.
pub fn expiry_from_now(ttl_secs: u64) -> Result<i64, EventHubError> {
    i64::try_from(ttl_secs)
        .ok()
        .and_then(|ttl_secs| chrono::Utc::now().timestamp().checked_add(ttl_secs))
        .ok_or_else(|| EventHubError::ConfigurationError {
            message: format!("The SAS token time to live of {} seconds is too large", ttl_secs),
        })
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, URL_COMPONENT).to_string()
}

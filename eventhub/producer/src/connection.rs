use crate::error::EventHubError;
use log::*;
use std::fmt;

const ENDPOINT_KEY: &str = "endpoint";
const SHARED_ACCESS_KEY_NAME_KEY: &str = "sharedaccesskeyname";
const SHARED_ACCESS_KEY_KEY: &str = "sharedaccesskey";
const SHARED_ACCESS_SIGNATURE_KEY: &str = "sharedaccesssignature";
const ENTITY_PATH_KEY: &str = "entitypath";

const SERVICE_BUS_SCHEME: &str = "sb://";
const HTTPS_SCHEME: &str = "https://";
const HTTP_SCHEME: &str = "http://";

/// The parsed form of an Event Hubs connection string, e.g.
/// `Endpoint=sb://<namespace>.servicebus.windows.net/;SharedAccessKeyName=<name>;SharedAccessKey=<key>;EntityPath=<hub>`
#[derive(Clone, PartialEq)]
pub struct ConnectionString {
    pub endpoint: String,
    pub shared_access_key_name: Option<String>,
    pub shared_access_key: Option<String>,
    pub shared_access_signature: Option<String>,
    pub entity_path: Option<String>,
}

impl ConnectionString {
    pub fn parse(connection_string: &str) -> Result<ConnectionString, EventHubError> {
        let mut endpoint = None;
        let mut shared_access_key_name = None;
        let mut shared_access_key = None;
        let mut shared_access_signature = None;
        let mut entity_path = None;

        for token in connection_string.split(';').map(str::trim).filter(|token| !token.is_empty()) {
            let (key, value) = token.split_once('=').ok_or_else(|| {
                EventHubError::ConnectionStringError {
                    message: format!("The connection string segment [{}] is not in the key=value form", redacted_segment(token)),
                }
            })?;
            let value = value.trim();
            if value.is_empty() {
                return Err(EventHubError::ConnectionStringError {
                    message: format!("The connection string key [{}] has an empty value", key.trim()),
                });
            }
            let value = Some(value.to_owned());

            match key.trim().to_lowercase().as_str() {
                ENDPOINT_KEY => endpoint = value,
                SHARED_ACCESS_KEY_NAME_KEY => shared_access_key_name = value,
                SHARED_ACCESS_KEY_KEY => shared_access_key = value,
                SHARED_ACCESS_SIGNATURE_KEY => shared_access_signature = value,
                ENTITY_PATH_KEY => entity_path = value,
                other => {
                    debug!("ConnectionString - ignoring unknown connection string key [{}]", other)
                }
            }
        }

        let endpoint = endpoint.ok_or_else(|| EventHubError::ConnectionStringError {
            message: "The connection string must contain an Endpoint".to_owned(),
        })?;

        let has_shared_key = shared_access_key_name.is_some() && shared_access_key.is_some();
        if !has_shared_key && shared_access_signature.is_none() {
            return Err(EventHubError::ConnectionStringError {
                message: "The connection string must contain either SharedAccessKeyName and SharedAccessKey, or SharedAccessSignature".to_owned(),
            });
        }

        Ok(ConnectionString {
            endpoint,
            shared_access_key_name,
            shared_access_key,
            shared_access_signature,
            entity_path,
        })
    }

    /// Returns the host of the namespace, e.g. `my-namespace.servicebus.windows.net`.
    pub fn host(&self) -> &str {
        strip_scheme(&self.endpoint).trim_end_matches('/')
    }

    /// Returns the base URL used by the REST API.
    /// The `sb://` scheme is mapped to `https://`, while explicit `http://` and `https://` endpoints are kept.
    pub fn http_base_url(&self) -> String {
        let endpoint = self.endpoint.trim_end_matches('/');
        if endpoint.starts_with(HTTP_SCHEME) || endpoint.starts_with(HTTPS_SCHEME) {
            endpoint.to_owned()
        } else {
            format!("{}{}", HTTPS_SCHEME, self.host())
        }
    }

    /// Resolves the name of the event hub to publish to.
    /// When both the connection string `EntityPath` and an explicit name are present, they must match.
    pub fn resolve_event_hub_name(
        &self,
        event_hub_name: Option<&str>,
    ) -> Result<String, EventHubError> {
        match (self.entity_path.as_deref(), event_hub_name) {
            (Some(entity_path), Some(name)) if entity_path != name => {
                Err(EventHubError::ConnectionStringError {
                    message: format!(
                        "The event hub name [{}] does not match the connection string EntityPath [{}]",
                        name, entity_path
                    ),
                })
            }
            (Some(entity_path), _) => Ok(entity_path.to_owned()),
            (None, Some(name)) => Ok(name.to_owned()),
            (None, None) => Err(EventHubError::ConnectionStringError {
                message: "The event hub name must be provided either in the connection string EntityPath or explicitly".to_owned(),
            }),
        }
    }
}

fn strip_scheme(endpoint: &str) -> &str {
    [SERVICE_BUS_SCHEME, HTTPS_SCHEME, HTTP_SCHEME]
        .iter()
        .find_map(|scheme| endpoint.strip_prefix(scheme))
        .unwrap_or(endpoint)
}

// The segment may hold a secret: only its first characters are reported
fn redacted_segment(token: &str) -> String {
    token.chars().take(16).collect::<String>() + "..."
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("endpoint", &self.endpoint)
            .field("shared_access_key_name", &self.shared_access_key_name)
            .field("shared_access_key", &self.shared_access_key.as_ref().map(|_| "***"))
            .field("shared_access_signature", &self.shared_access_signature.as_ref().map(|_| "***"))
            .field("entity_path", &self.entity_path)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const CONNECTION_STRING: &str = "Endpoint=sb://metering-standard.servicebus.windows.net/;SharedAccessKeyName=Producer;SharedAccessKey=c2VjcmV0LWtleQ+/u5=;EntityPath=2022-04-11-demo";

    #[test]
    fn should_parse_a_connection_string() {
        let connection = ConnectionString::parse(CONNECTION_STRING).unwrap();

        assert_eq!("sb://metering-standard.servicebus.windows.net/", connection.endpoint);
        assert_eq!(Some("Producer".to_owned()), connection.shared_access_key_name);
        assert_eq!(Some("c2VjcmV0LWtleQ+/u5=".to_owned()), connection.shared_access_key);
        assert_eq!(None, connection.shared_access_signature);
        assert_eq!(Some("2022-04-11-demo".to_owned()), connection.entity_path);
    }

    #[test]
    fn should_parse_keys_case_insensitive_and_ignore_empty_segments() {
        let connection = ConnectionString::parse(
            " endpoint=sb://ns.servicebus.windows.net;;SHAREDACCESSSIGNATURE=SharedAccessSignature sr=a&sig=b&se=1&skn=c; ",
        )
        .unwrap();

        assert_eq!("sb://ns.servicebus.windows.net", connection.endpoint);
        assert_eq!(
            Some("SharedAccessSignature sr=a&sig=b&se=1&skn=c".to_owned()),
            connection.shared_access_signature
        );
        assert_eq!(None, connection.entity_path);
    }

    #[test]
    fn should_fail_without_endpoint() {
        let result = ConnectionString::parse("SharedAccessKeyName=Producer;SharedAccessKey=abc");
        assert!(matches!(result, Err(EventHubError::ConnectionStringError { .. })));
    }

    #[test]
    fn should_fail_without_credentials() {
        assert!(ConnectionString::parse("Endpoint=sb://ns.servicebus.windows.net/").is_err());
        assert!(ConnectionString::parse(
            "Endpoint=sb://ns.servicebus.windows.net/;SharedAccessKeyName=Producer"
        )
        .is_err());
    }

    #[test]
    fn should_fail_on_malformed_segments() {
        assert!(ConnectionString::parse("Endpoint=sb://ns/;SharedAccessKey").is_err());
        assert!(ConnectionString::parse("Endpoint=;SharedAccessKeyName=a;SharedAccessKey=b").is_err());
    }

    #[test]
    fn should_build_the_http_base_url() {
        let connection = ConnectionString::parse(CONNECTION_STRING).unwrap();
        assert_eq!("metering-standard.servicebus.windows.net", connection.host());
        assert_eq!("https://metering-standard.servicebus.windows.net", connection.http_base_url());

        let connection = ConnectionString::parse(
            "Endpoint=http://127.0.0.1:8080/;SharedAccessKeyName=a;SharedAccessKey=b",
        )
        .unwrap();
        assert_eq!("127.0.0.1:8080", connection.host());
        assert_eq!("http://127.0.0.1:8080", connection.http_base_url());
    }

    #[test]
    fn should_resolve_the_event_hub_name() {
        let connection = ConnectionString::parse(CONNECTION_STRING).unwrap();
        assert_eq!("2022-04-11-demo", connection.resolve_event_hub_name(None).unwrap());
        assert_eq!(
            "2022-04-11-demo",
            connection.resolve_event_hub_name(Some("2022-04-11-demo")).unwrap()
        );
        assert!(connection.resolve_event_hub_name(Some("another_hub")).is_err());

        let connection = ConnectionString::parse(
            "Endpoint=sb://ns.servicebus.windows.net/;SharedAccessKeyName=a;SharedAccessKey=b",
        )
        .unwrap();
        assert_eq!("my_hub", connection.resolve_event_hub_name(Some("my_hub")).unwrap());
        assert!(connection.resolve_event_hub_name(None).is_err());
    }

    #[test]
    fn debug_output_should_not_contain_secrets() {
        let connection = ConnectionString::parse(CONNECTION_STRING).unwrap();
        let debug = format!("{:?}", connection);

        assert!(debug.contains("metering-standard.servicebus.windows.net"));
        assert!(debug.contains("Producer"));
        assert!(!debug.contains("c2VjcmV0LWtleQ"));
    }
}

use crate::batch::{CreateBatchOptions, EventDataBatch, DEFAULT_MAX_BATCH_SIZE_BYTES};
use crate::config::EventHubClientConfig;
use crate::connection::ConnectionString;
use crate::error::EventHubError;
use crate::sas::{expiry_from_now, SharedAccessSignature, DEFAULT_SAS_TOKEN_TTL_SECS};
use crate::EventProducer;
use log::*;
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::instrument;

pub const REST_API_VERSION: &str = "2014-01";
pub const BATCH_CONTENT_TYPE: &str = "application/vnd.microsoft.servicebus.json";
/// The operation timeout the service applies to a send, passed in the `timeout` query parameter.
pub const SERVER_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Publishes batches through the Event Hubs REST API.
pub struct HttpProducerClient {
    connection: ConnectionString,
    event_hub_name: String,
    base_url: String,
    max_batch_size_bytes: usize,
    sas_token_ttl_secs: u64,
    client: Client,
    closed: AtomicBool,
}

impl HttpProducerClient {
    pub fn new(config: &EventHubClientConfig) -> Result<HttpProducerClient, EventHubError> {
        let connection = ConnectionString::parse(&config.connection_string)?;
        let event_hub_name = connection.resolve_event_hub_name(config.event_hub_name.as_deref())?;
        let timeout_secs = config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);

        let client = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|err| EventHubError::ConfigurationError {
                message: format!("Error while building the HttpProducerClient. Err: {:?}", err),
            })?;

        let base_url = connection.http_base_url();

        info!(
            "HttpProducerClient - created client for event hub [{}] in namespace [{}]",
            event_hub_name,
            connection.host()
        );

        Ok(HttpProducerClient {
            connection,
            event_hub_name,
            base_url,
            max_batch_size_bytes: config.max_batch_size_bytes.unwrap_or(DEFAULT_MAX_BATCH_SIZE_BYTES),
            sas_token_ttl_secs: config.sas_token_ttl_secs.unwrap_or(DEFAULT_SAS_TOKEN_TTL_SECS),
            client,
            closed: AtomicBool::new(false),
        })
    }

    pub fn from_connection_string(
        connection_string: &str,
        event_hub_name: Option<&str>,
    ) -> Result<HttpProducerClient, EventHubError> {
        HttpProducerClient::new(&EventHubClientConfig {
            connection_string: connection_string.to_owned(),
            event_hub_name: event_hub_name.map(ToOwned::to_owned),
            timeout_secs: None,
            max_batch_size_bytes: None,
            sas_token_ttl_secs: None,
        })
    }

    pub fn event_hub_name(&self) -> &str {
        &self.event_hub_name
    }

    pub fn fully_qualified_namespace(&self) -> &str {
        self.connection.host()
    }

    fn messages_url(&self, options: &CreateBatchOptions) -> String {
        let path = match &options.partition_id {
            Some(partition_id) => {
                format!("{}/partitions/{}/messages", self.event_hub_name, partition_id)
            }
            None => format!("{}/messages", self.event_hub_name),
        };
        format!(
            "{}/{}?api-version={}&timeout={}",
            self.base_url, path, REST_API_VERSION, SERVER_TIMEOUT_SECS
        )
    }

    fn authorization(&self) -> Result<String, EventHubError> {
        if let Some(signature) = &self.connection.shared_access_signature {
            return Ok(signature.clone());
        }
        match (&self.connection.shared_access_key_name, &self.connection.shared_access_key) {
            (Some(key_name), Some(key)) => {
                let resource_uri = format!("{}/{}", self.base_url, self.event_hub_name);
                let sas = SharedAccessSignature::generate(
                    &resource_uri,
                    key_name,
                    key,
                    expiry_from_now(self.sas_token_ttl_secs)?,
                )?;
                trace!("HttpProducerClient - generated SAS token {:?}", sas);
                Ok(sas.to_string())
            }
            _ => Err(EventHubError::ConfigurationError {
                message: "No credential available to authorize the request".to_owned(),
            }),
        }
    }

    fn ensure_open(&self) -> Result<(), EventHubError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(EventHubError::ClientClosed)
        } else {
            Ok(())
        }
    }

    #[instrument(level = "debug", name = "SendBatch", err, skip_all, fields(event_hub = %self.event_hub_name, events = batch.len()))]
    async fn post_batch(&self, batch: &EventDataBatch) -> Result<(), EventHubError> {
        let url = self.messages_url(batch.options());
        let body = batch.to_json()?;

        trace!("HttpProducerClient - HTTP POST - url: {}", url);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, BATCH_CONTENT_TYPE)
            .header(reqwest::header::AUTHORIZATION, self.authorization()?)
            .body(body)
            .send()
            .await
            .map_err(|err| EventHubError::SendError {
                message: format!("HttpProducerClient - Connection failed. Err: {:?}", err),
                can_retry: true,
                status: None,
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(
                "HttpProducerClient - batch of {} event(s) accepted with status {}",
                batch.len(),
                status
            );
            return Ok(());
        }

        let response_body = response.text().await.unwrap_or_default();
        Err(EventHubError::SendError {
            message: format!(
                "HttpProducerClient - Event Hubs returned an error. Response status: {}. Response body: {}",
                status, response_body
            ),
            can_retry: is_retryable(status),
            status: Some(status.as_u16()),
        })
    }
}

fn is_retryable(status: StatusCode) -> bool {
    !matches!(
        status,
        StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::NOT_FOUND
            | StatusCode::PAYLOAD_TOO_LARGE
    )
}

#[async_trait::async_trait]
impl EventProducer for HttpProducerClient {
    async fn create_batch(
        &self,
        options: CreateBatchOptions,
    ) -> Result<EventDataBatch, EventHubError> {
        self.ensure_open()?;
        EventDataBatch::new(options, self.max_batch_size_bytes)
    }

    async fn send_batch(&self, batch: EventDataBatch) -> Result<(), EventHubError> {
        self.ensure_open()?;
        if batch.is_empty() {
            debug!("HttpProducerClient - the batch is empty, nothing to send");
            return Ok(());
        }
        self.post_batch(&batch).await
    }

    async fn close(&self) -> Result<(), EventHubError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("HttpProducerClient - client for event hub [{}] closed", self.event_hub_name);
        }
        Ok(())
    }
}

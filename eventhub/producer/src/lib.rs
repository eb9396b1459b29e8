pub mod batch;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod sas;

pub use batch::{CreateBatchOptions, EventData, EventDataBatch};
pub use client::HttpProducerClient;
pub use config::EventHubClientConfig;
pub use error::EventHubError;

/// A producer publishes batches of events to an event hub.
/// A batch is obtained from `create_batch`, filled with `EventDataBatch::try_add` and
/// handed back to `send_batch`.
#[async_trait::async_trait]
pub trait EventProducer: Send + Sync {
    /// Creates an empty batch sized for the target event hub.
    async fn create_batch(
        &self,
        options: CreateBatchOptions,
    ) -> Result<EventDataBatch, EventHubError>;

    /// Submits all the events of the batch with a single operation.
    async fn send_batch(&self, batch: EventDataBatch) -> Result<(), EventHubError>;

    /// Releases the client. Any later call fails with `EventHubError::ClientClosed`.
    async fn close(&self) -> Result<(), EventHubError>;
}

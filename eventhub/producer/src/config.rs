use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, PartialEq)]
pub struct EventHubClientConfig {
    /// The connection string of the Event Hubs namespace or of the event hub itself
    pub connection_string: String,

    /// The name of the event hub. Optional if the connection string contains the EntityPath.
    pub event_hub_name: Option<String>,

    /// The call timeout in seconds. Default is 10 seconds
    pub timeout_secs: Option<u64>,

    /// The maximum size of a batch in bytes. Default is 1 MiB
    pub max_batch_size_bytes: Option<usize>,

    /// How long a generated SAS token is valid, in seconds. Default is one hour
    pub sas_token_ttl_secs: Option<u64>,
}

impl std::fmt::Debug for EventHubClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHubClientConfig")
            .field("connection_string", &"***")
            .field("event_hub_name", &self.event_hub_name)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_batch_size_bytes", &self.max_batch_size_bytes)
            .field("sas_token_ttl_secs", &self.sas_token_ttl_secs)
            .finish()
    }
}

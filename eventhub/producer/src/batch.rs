use crate::error::EventHubError;
use log::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// The default maximum size of a batch, in bytes, accepted by a Standard tier namespace.
pub const DEFAULT_MAX_BATCH_SIZE_BYTES: usize = 1_048_576;

// The opening and closing brackets of the JSON array
const BATCH_ENVELOPE_SIZE_BYTES: usize = 2;
const EVENT_SEPARATOR_SIZE_BYTES: usize = 1;

/// A single event to be published.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventData {
    pub body: String,
    pub properties: BTreeMap<String, String>,
}

impl EventData {
    pub fn new<S: Into<String>>(body: S) -> EventData {
        EventData { body: body.into(), properties: BTreeMap::new() }
    }

    pub fn with_property<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateBatchOptions {
    /// All events of the batch are assigned to the partition selected by hashing this key
    pub partition_key: Option<String>,
    /// All events of the batch are sent to this partition
    pub partition_id: Option<String>,
}

impl CreateBatchOptions {
    pub fn with_partition_key<S: Into<String>>(partition_key: S) -> Self {
        CreateBatchOptions { partition_key: Some(partition_key.into()), partition_id: None }
    }

    pub fn validate(&self) -> Result<(), EventHubError> {
        if self.partition_key.is_some() && self.partition_id.is_some() {
            return Err(EventHubError::ConfigurationError {
                message: "A batch cannot have both a partition key and a partition id".to_owned(),
            });
        }
        Ok(())
    }
}

/// A size-bounded set of events sent with a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDataBatch {
    options: CreateBatchOptions,
    events: Vec<EventData>,
    size_in_bytes: usize,
    max_size_in_bytes: usize,
}

impl EventDataBatch {
    pub fn new(
        options: CreateBatchOptions,
        max_size_in_bytes: usize,
    ) -> Result<EventDataBatch, EventHubError> {
        options.validate()?;
        if max_size_in_bytes <= BATCH_ENVELOPE_SIZE_BYTES {
            return Err(EventHubError::ConfigurationError {
                message: format!(
                    "The maximum batch size must be greater than {} bytes",
                    BATCH_ENVELOPE_SIZE_BYTES
                ),
            });
        }
        Ok(EventDataBatch {
            options,
            events: vec![],
            size_in_bytes: BATCH_ENVELOPE_SIZE_BYTES,
            max_size_in_bytes,
        })
    }

    /// Adds the event if it fits.
    /// Returns `Ok(false)` if the batch is full, and an error if the event
    /// is too large to fit even into an empty batch.
    pub fn try_add(&mut self, event: EventData) -> Result<bool, EventHubError> {
        Ok(self.try_push(event)?.is_none())
    }

    /// Like [`EventDataBatch::try_add`], but hands the event back when the batch is full,
    /// so it can be moved into the next batch.
    pub fn try_push(&mut self, event: EventData) -> Result<Option<EventData>, EventHubError> {
        let event_size = self.encoded_size(&event)?;
        let separator_size = if self.events.is_empty() { 0 } else { EVENT_SEPARATOR_SIZE_BYTES };

        if BATCH_ENVELOPE_SIZE_BYTES + event_size > self.max_size_in_bytes {
            return Err(EventHubError::EventTooLarge {
                size: event_size,
                max_size: self.max_size_in_bytes - BATCH_ENVELOPE_SIZE_BYTES,
            });
        }

        let new_size = self.size_in_bytes + separator_size + event_size;
        if new_size > self.max_size_in_bytes {
            trace!(
                "EventDataBatch - batch full with {} event(s) and {} bytes",
                self.events.len(),
                self.size_in_bytes
            );
            return Ok(Some(event));
        }

        self.size_in_bytes = new_size;
        self.events.push(event);
        Ok(None)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    pub fn max_size_in_bytes(&self) -> usize {
        self.max_size_in_bytes
    }

    pub fn options(&self) -> &CreateBatchOptions {
        &self.options
    }

    pub fn events(&self) -> &[EventData] {
        &self.events
    }

    /// Returns the batch in the JSON form expected by the REST API.
    pub fn to_json(&self) -> Result<Vec<u8>, EventHubError> {
        let wire_events = self
            .events
            .iter()
            .map(|event| WireEvent::new(event, &self.options))
            .collect::<Vec<_>>();
        Ok(serde_json::to_vec(&wire_events)?)
    }

    fn encoded_size(&self, event: &EventData) -> Result<usize, EventHubError> {
        Ok(serde_json::to_vec(&WireEvent::new(event, &self.options))?.len())
    }
}

#[derive(Serialize)]
struct WireEvent<'a> {
    #[serde(rename = "Body")]
    body: &'a str,
    #[serde(rename = "UserProperties", skip_serializing_if = "Option::is_none")]
    user_properties: Option<&'a BTreeMap<String, String>>,
    #[serde(rename = "BrokerProperties", skip_serializing_if = "Option::is_none")]
    broker_properties: Option<BrokerProperties<'a>>,
}

#[derive(Serialize)]
struct BrokerProperties<'a> {
    #[serde(rename = "PartitionKey")]
    partition_key: &'a str,
}

impl<'a> WireEvent<'a> {
    fn new(event: &'a EventData, options: &'a CreateBatchOptions) -> Self {
        WireEvent {
            body: &event.body,
            user_properties: if event.properties.is_empty() { None } else { Some(&event.properties) },
            broker_properties: options
                .partition_key
                .as_deref()
                .map(|partition_key| BrokerProperties { partition_key }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_add_events_until_the_batch_is_full() {
        // Arrange
        // Each event is encoded as {"Body":"aaaaaaaaaa"} = 21 bytes
        let mut batch = EventDataBatch::new(CreateBatchOptions::default(), 2 + 21 + 1 + 21).unwrap();

        // Act & Assert
        assert!(batch.try_add(EventData::new("aaaaaaaaaa")).unwrap());
        assert_eq!(23, batch.size_in_bytes());
        assert!(batch.try_add(EventData::new("bbbbbbbbbb")).unwrap());
        assert_eq!(45, batch.size_in_bytes());
        assert!(!batch.try_add(EventData::new("c")).unwrap());
        assert_eq!(2, batch.len());
    }

    #[test]
    fn should_hand_back_the_event_that_does_not_fit() {
        let mut batch = EventDataBatch::new(CreateBatchOptions::default(), 2 + 21).unwrap();

        assert_eq!(None, batch.try_push(EventData::new("aaaaaaaaaa")).unwrap());

        let rejected = EventData::new("bbbbbbbbbb").with_property("kind", "usage");
        assert_eq!(Some(rejected.clone()), batch.try_push(rejected).unwrap());
        assert_eq!(1, batch.len());
        assert_eq!(23, batch.size_in_bytes());
    }

    #[test]
    fn should_reject_an_event_larger_than_an_empty_batch() {
        let mut batch = EventDataBatch::new(CreateBatchOptions::default(), 20).unwrap();

        let result = batch.try_add(EventData::new("aaaaaaaaaa"));

        assert_eq!(Err(EventHubError::EventTooLarge { size: 21, max_size: 18 }), result);
        assert!(batch.is_empty());
    }

    #[test]
    fn size_in_bytes_should_match_the_json_length() {
        let mut batch = EventDataBatch::new(
            CreateBatchOptions::with_partition_key("6787b636-d6a2-4e30-d671-f7ca570507ef"),
            DEFAULT_MAX_BATCH_SIZE_BYTES,
        )
        .unwrap();
        batch.try_add(EventData::new("{\n \"quantity\": 12\n} ")).unwrap();
        batch.try_add(EventData::new("first").with_property("source", "metering")).unwrap();
        batch.try_add(EventData::new("ünïcödé")).unwrap();

        assert_eq!(batch.to_json().unwrap().len(), batch.size_in_bytes());
    }

    #[test]
    fn should_encode_the_rest_api_batch_format() {
        let mut batch = EventDataBatch::new(
            CreateBatchOptions::with_partition_key("resource-1"),
            DEFAULT_MAX_BATCH_SIZE_BYTES,
        )
        .unwrap();
        batch.try_add(EventData::new("plain")).unwrap();
        batch.try_add(EventData::new("{\"a\":1}").with_property("kind", "usage")).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&batch.to_json().unwrap()).unwrap();

        assert_eq!(
            json!([
                { "Body": "plain", "BrokerProperties": { "PartitionKey": "resource-1" } },
                {
                    "Body": "{\"a\":1}",
                    "UserProperties": { "kind": "usage" },
                    "BrokerProperties": { "PartitionKey": "resource-1" }
                }
            ]),
            json
        );
    }

    #[test]
    fn empty_batch_should_encode_to_an_empty_array() {
        let batch = EventDataBatch::new(CreateBatchOptions::default(), 100).unwrap();
        assert_eq!(b"[]".to_vec(), batch.to_json().unwrap());
        assert_eq!(2, batch.size_in_bytes());
    }

    #[test]
    fn should_reject_invalid_options() {
        let options = CreateBatchOptions {
            partition_key: Some("key".to_owned()),
            partition_id: Some("0".to_owned()),
        };
        assert!(EventDataBatch::new(options, DEFAULT_MAX_BATCH_SIZE_BYTES).is_err());
        assert!(EventDataBatch::new(CreateBatchOptions::default(), 2).is_err());
    }
}

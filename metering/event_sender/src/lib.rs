use crate::config::{Command, PartitionArgs, PurchaseArgs};
use chrono::Utc;
use log::*;
use metering_eventhub_producer::{CreateBatchOptions, EventData, EventHubError, EventProducer};
use metering_messages::demo::{SUBSCRIPTION_PURCHASED_DEMO_PAYLOAD, USAGE_REPORTED_DEMO_PAYLOAD};
use metering_messages::{MeteringEvent, MeteringEventError, Plan};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::instrument;

pub mod config;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("EventHubError: {0}")]
    EventHubError(#[from] EventHubError),
    #[error("MessageError: {0}")]
    MessageError(#[from] MeteringEventError),
    #[error("PayloadError: [{message}]")]
    PayloadError { message: String },
}

impl SenderError {
    pub fn can_retry(&self) -> bool {
        match self {
            SenderError::EventHubError(err) => err.can_retry(),
            _ => false,
        }
    }
}

/// What a command publishes: `count` copies of the same body, all in batches built with `options`.
#[derive(Debug, Clone, PartialEq)]
pub struct SendPlan {
    pub event_type: &'static str,
    pub body: String,
    pub count: usize,
    pub options: CreateBatchOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishSummary {
    pub events: usize,
    pub batches: usize,
}

pub fn build_send_plan(command: &Command) -> Result<SendPlan, SenderError> {
    match command {
        Command::Purchase(args) => match &args.resource_id {
            Some(resource_id) => {
                let event = subscription_purchased_event(resource_id, args)?;
                typed_send_plan(&event, 1, &args.partition)
            }
            None => Ok(SendPlan {
                event_type: "SubscriptionPurchased",
                body: payload_or_default(
                    args.payload_file.as_deref(),
                    SUBSCRIPTION_PURCHASED_DEMO_PAYLOAD,
                )?,
                count: 1,
                options: partition_options(&args.partition, None),
            }),
        },
        Command::Usage(args) => match (&args.resource_id, &args.meter_name, &args.quantity) {
            (Some(resource_id), Some(meter_name), Some(quantity)) => {
                let event = MeteringEvent::usage_reported(
                    resource_id.as_str(),
                    meter_name.as_str(),
                    *quantity,
                    Utc::now(),
                );
                typed_send_plan(&event, args.count, &args.partition)
            }
            (None, None, None) => Ok(SendPlan {
                event_type: "UsageReported",
                body: payload_or_default(args.payload_file.as_deref(), USAGE_REPORTED_DEMO_PAYLOAD)?,
                count: args.count,
                options: partition_options(&args.partition, None),
            }),
            _ => Err(SenderError::PayloadError {
                message: "A usage event needs the resource id, the meter name and the quantity"
                    .to_owned(),
            }),
        },
        Command::Delete { resource_id } => typed_send_plan(
            &MeteringEvent::subscription_deleted(resource_id.as_str()),
            1,
            &PartitionArgs::default(),
        ),
    }
}

/// Executes the command against the producer.
pub async fn run<P: EventProducer + ?Sized>(
    producer: &P,
    command: &Command,
) -> Result<PublishSummary, SenderError> {
    let SendPlan { event_type, body, count, options } = build_send_plan(command)?;
    info!("Publishing {} {} event(s)", count, event_type);
    let events = std::iter::repeat_with(|| EventData::new(body.as_str())).take(count);
    publish(producer, options, events).await
}

/// Adds the events to batches and sends each batch once it is full.
/// Returns after the last batch is sent; the first failure stops the publishing.
#[instrument(level = "debug", name = "Publish", err, skip_all)]
pub async fn publish<P, I>(
    producer: &P,
    options: CreateBatchOptions,
    events: I,
) -> Result<PublishSummary, SenderError>
where
    P: EventProducer + ?Sized,
    I: IntoIterator<Item = EventData>,
{
    let mut summary = PublishSummary::default();
    let mut batch = producer.create_batch(options.clone()).await?;

    for event in events {
        let event = match batch.try_push(event)? {
            None => continue,
            Some(rejected) => rejected,
        };

        let full_batch =
            std::mem::replace(&mut batch, producer.create_batch(options.clone()).await?);
        debug!(
            "Batch full with {} event(s) and {} bytes, sending it",
            full_batch.len(),
            full_batch.size_in_bytes()
        );
        summary.events += full_batch.len();
        producer.send_batch(full_batch).await?;
        summary.batches += 1;

        if !batch.try_add(event)? {
            return Err(SenderError::PayloadError {
                message: "The event does not fit into an empty batch".to_owned(),
            });
        }
    }

    if !batch.is_empty() {
        summary.events += batch.len();
        producer.send_batch(batch).await?;
        summary.batches += 1;
    }

    Ok(summary)
}

fn typed_send_plan(
    event: &MeteringEvent,
    count: usize,
    partition: &PartitionArgs,
) -> Result<SendPlan, SenderError> {
    Ok(SendPlan {
        event_type: event.event_type(),
        body: event.to_json()?,
        count,
        options: partition_options(partition, Some(event.resource_id())),
    })
}

// An explicit partition id disables the default partition key
fn partition_options(partition: &PartitionArgs, default_key: Option<&str>) -> CreateBatchOptions {
    let partition_key = match &partition.partition_id {
        Some(_) => partition.partition_key.clone(),
        None => partition.partition_key.clone().or_else(|| default_key.map(ToOwned::to_owned)),
    };
    CreateBatchOptions { partition_key, partition_id: partition.partition_id.clone() }
}

fn subscription_purchased_event(
    resource_id: &str,
    args: &PurchaseArgs,
) -> Result<MeteringEvent, SenderError> {
    let (plan_file, mapping_file) = match (&args.plan_file, &args.mapping_file) {
        (Some(plan_file), Some(mapping_file)) => (plan_file, mapping_file),
        _ => {
            return Err(SenderError::PayloadError {
                message: "A subscription purchase needs the plan file and the mapping file"
                    .to_owned(),
            })
        }
    };
    let plan: Plan = read_json(plan_file)?;
    let meters_mapping: BTreeMap<String, String> = read_json(mapping_file)?;
    Ok(MeteringEvent::subscription_purchased(
        resource_id,
        plan,
        meters_mapping,
        args.subscription_start.unwrap_or_else(Utc::now),
    ))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, SenderError> {
    let content = read_file(path)?;
    serde_json::from_str(&content).map_err(|err| SenderError::PayloadError {
        message: format!("The file [{}] is not valid JSON. Err: {}", path.display(), err),
    })
}

fn read_file(path: &Path) -> Result<String, SenderError> {
    fs::read_to_string(path).map_err(|err| SenderError::PayloadError {
        message: format!("Unable to read the file [{}]. Err: {}", path.display(), err),
    })
}

fn payload_or_default(payload_file: Option<&Path>, default: &str) -> Result<String, SenderError> {
    match payload_file {
        Some(path) => {
            info!("Loading event payload from file: [{}]", path.display());
            let payload = read_file(path)?;
            trace!("Event payload: \n{}", payload);
            Ok(payload)
        }
        None => Ok(default.to_owned()),
    }
}

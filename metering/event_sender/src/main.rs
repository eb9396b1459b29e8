use log::*;
use metering_common_logger::setup_logger;
use metering_event_sender::config;
use metering_event_sender::run;
use metering_eventhub_producer::{EventProducer, HttpProducerClient};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let conf = config::Conf::build();

    let sender_config = config::build_config(
        &conf.config_dir,
        conf.connection_string.as_deref(),
        conf.event_hub_name.as_deref(),
    )?;

    // Setup logger
    let _guard = setup_logger(&sender_config.logger)?;

    info!("Starting Metering Event Sender");

    let producer = HttpProducerClient::new(&sender_config.event_hub)?;
    info!(
        "Connected producer to event hub [{}] in namespace [{}]",
        producer.event_hub_name(),
        producer.fully_qualified_namespace()
    );

    let result = run(&producer, &conf.command).await;
    producer.close().await?;

    match result {
        Ok(summary) => {
            info!(
                "Completed sending {} event(s) in {} batch(es)",
                summary.events, summary.batches
            );
            Ok(())
        }
        Err(err) => {
            error!("Metering Event Sender failed. can_retry: {}. Err: {}", err.can_retry(), err);
            Err(err.into())
        }
    }
}

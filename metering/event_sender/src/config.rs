use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use config_rs::{Config, ConfigError, Environment, File};
use metering_common_logger::{LoggerConfig, DEFAULT_LOGGER_LEVEL};
use metering_eventhub_producer::EventHubClientConfig;
use metering_messages::demo::USAGE_REPORTED_DEMO_COUNT;
use metering_messages::event::timestamp;
use metering_messages::Quantity;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const CONFIG_DIR_DEFAULT: Option<&'static str> =
    option_env!("METERING_EVENT_SENDER_CONFIG_DIR_DEFAULT");

pub const CONFIG_FILE_NAME: &str = "metering_event_sender.toml";

/// Prefix of the environment variables overriding the configuration file,
/// e.g. `METERING_EVENT_SENDER_EVENT_HUB__TIMEOUT_SECS=30`
pub const ENV_PREFIX: &str = "METERING_EVENT_SENDER";

#[derive(Debug, Parser)]
#[clap(name = "metering_event_sender", rename_all = "kebab-case")]
pub struct Conf {
    /// The filesystem folder where the Metering Event Sender configuration is saved
    #[clap(long, default_value = CONFIG_DIR_DEFAULT.unwrap_or("/etc/metering_event_sender"))]
    pub config_dir: String,

    /// The connection string of the Event Hubs namespace.
    /// It overrides the value of the configuration file.
    #[clap(long, env = "METERING_EVENTHUB_CONNECTION_STRING", hide_env_values = true)]
    pub connection_string: Option<String>,

    /// The name of the event hub; required if the connection string has no EntityPath
    #[clap(long)]
    pub event_hub_name: Option<String>,

    #[clap(subcommand)]
    pub command: Command,
}

impl Conf {
    pub fn build() -> Self {
        Conf::parse()
    }
}

// Argument ids are the kebab-case names of the fields, e.g. `resource-id`
#[derive(Debug, Clone, PartialEq, Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Publishes a single SubscriptionPurchased event
    Purchase(PurchaseArgs),
    /// Publishes a series of identical UsageReported events
    Usage(UsageArgs),
    /// Publishes a SubscriptionDeleted event
    Delete {
        /// The internal resource id of the deleted subscription
        #[clap(long)]
        resource_id: String,
    },
}

// Where the events of a command are sent.
// Without both, typed events are partitioned by their resource id.
#[derive(Debug, Clone, PartialEq, Default, Args)]
pub struct PartitionArgs {
    /// The partition key assigned to the events
    #[clap(long, conflicts_with = "partition-id")]
    pub partition_key: Option<String>,

    /// The id of the partition the events are sent to
    #[clap(long)]
    pub partition_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Args)]
pub struct PurchaseArgs {
    /// A file whose content is sent verbatim instead of the demo purchase event
    #[clap(long, parse(from_os_str), conflicts_with = "resource-id")]
    pub payload_file: Option<PathBuf>,

    /// Builds a monthly subscription for this internal resource id
    #[clap(long, requires_all = &["plan-file", "mapping-file"])]
    pub resource_id: Option<String>,

    /// The JSON file with the plan of the built subscription
    #[clap(long, parse(from_os_str), requires = "resource-id")]
    pub plan_file: Option<PathBuf>,

    /// The JSON file mapping the application internal meter names to the plan dimensions
    #[clap(long, parse(from_os_str), requires = "resource-id")]
    pub mapping_file: Option<PathBuf>,

    /// The start of the built subscription, e.g. 2022-06-02T23:37:34. Defaults to now
    #[clap(long, parse(try_from_str = timestamp::parse), requires = "resource-id")]
    pub subscription_start: Option<DateTime<Utc>>,

    #[clap(flatten)]
    pub partition: PartitionArgs,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct UsageArgs {
    /// How many events are sent
    #[clap(long, default_value_t = USAGE_REPORTED_DEMO_COUNT)]
    pub count: usize,

    /// A file whose content is sent verbatim instead of the demo usage event
    #[clap(long, parse(from_os_str), conflicts_with = "resource-id")]
    pub payload_file: Option<PathBuf>,

    /// Builds the event for this internal resource id, stamped with the current time
    #[clap(long, requires_all = &["meter-name", "quantity"])]
    pub resource_id: Option<String>,

    /// The application internal meter name of the built event
    #[clap(long, requires = "resource-id")]
    pub meter_name: Option<String>,

    /// The consumed quantity of the built event
    #[clap(long, requires = "resource-id")]
    pub quantity: Option<Quantity>,

    #[clap(flatten)]
    pub partition: PartitionArgs,
}

impl Default for UsageArgs {
    fn default() -> Self {
        UsageArgs {
            count: USAGE_REPORTED_DEMO_COUNT,
            payload_file: None,
            resource_id: None,
            meter_name: None,
            quantity: None,
            partition: PartitionArgs::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SenderConfig {
    /// The logger configuration
    pub logger: LoggerConfig,
    pub event_hub: EventHubClientConfig,
}

/// Builds the configuration from, in increasing order of priority:
/// the defaults, the optional configuration file, the environment and the command line values.
pub fn build_config(
    config_dir: &str,
    connection_string: Option<&str>,
    event_hub_name: Option<&str>,
) -> Result<SenderConfig, ConfigError> {
    let config_file_path = format!("{}/{}", config_dir, CONFIG_FILE_NAME);

    let mut s = Config::new();
    s.set_default("logger.level", DEFAULT_LOGGER_LEVEL)?;
    s.set_default("logger.stdout_output", true)?;

    s.merge(File::with_name(&config_file_path).required(false))?;
    s.merge(Environment::with_prefix(ENV_PREFIX).separator("__"))?;

    if let Some(connection_string) = connection_string {
        s.set("event_hub.connection_string", connection_string)?;
    }
    if let Some(event_hub_name) = event_hub_name {
        s.set("event_hub.event_hub_name", event_hub_name)?;
    }

    s.try_into()
}

use crate::MeteringEventError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A message understood by the metering aggregator.
/// It is encoded as `{"type": "<variant>", "value": <content>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum MeteringEvent {
    SubscriptionPurchased(SubscriptionCreationInformation),
    UsageReported(InternalUsageEvent),
    /// Carries the internal resource id of the deleted subscription
    SubscriptionDeleted(String),
}

impl MeteringEvent {
    /// A monthly subscription to `plan` for the resource, starting at `subscription_start`.
    pub fn subscription_purchased<R: Into<String>>(
        internal_resource_id: R,
        plan: Plan,
        meters_mapping: BTreeMap<String, String>,
        subscription_start: DateTime<Utc>,
    ) -> MeteringEvent {
        MeteringEvent::SubscriptionPurchased(SubscriptionCreationInformation {
            subscription: Subscription {
                scope: internal_resource_id.into(),
                subscription_start,
                renewal_interval: RenewalInterval::Monthly,
                plan,
            },
            meters_mapping,
        })
    }

    pub fn usage_reported<R: Into<String>, M: Into<String>>(
        internal_resource_id: R,
        meter_name: M,
        quantity: Quantity,
        timestamp: DateTime<Utc>,
    ) -> MeteringEvent {
        MeteringEvent::UsageReported(InternalUsageEvent {
            internal_resource_id: internal_resource_id.into(),
            timestamp,
            meter_name: meter_name.into(),
            quantity,
        })
    }

    pub fn subscription_deleted<R: Into<String>>(internal_resource_id: R) -> MeteringEvent {
        MeteringEvent::SubscriptionDeleted(internal_resource_id.into())
    }

    /// The internal resource id the event refers to.
    /// Events of the same resource share it as partition key, so they are kept in order.
    pub fn resource_id(&self) -> &str {
        match self {
            MeteringEvent::SubscriptionPurchased(info) => &info.subscription.scope,
            MeteringEvent::UsageReported(usage) => &usage.internal_resource_id,
            MeteringEvent::SubscriptionDeleted(resource_id) => resource_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            MeteringEvent::SubscriptionPurchased(_) => "SubscriptionPurchased",
            MeteringEvent::UsageReported(_) => "UsageReported",
            MeteringEvent::SubscriptionDeleted(_) => "SubscriptionDeleted",
        }
    }

    pub fn to_json(&self) -> Result<String, MeteringEventError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCreationInformation {
    pub subscription: Subscription,
    /// Maps each application internal meter name to a billing dimension of the plan
    pub meters_mapping: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub scope: String,
    #[serde(with = "timestamp")]
    pub subscription_start: DateTime<Utc>,
    pub renewal_interval: RenewalInterval,
    pub plan: Plan,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RenewalInterval {
    Monthly,
    Annually,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub plan_id: String,
    pub billing_dimensions: BTreeMap<String, IncludedQuantity>,
}

/// The quantity of a dimension included in the plan price for each renewal interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IncludedQuantity {
    #[serde(default)]
    pub monthly: u64,
    #[serde(default)]
    pub annually: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalUsageEvent {
    pub internal_resource_id: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub meter_name: String,
    pub quantity: Quantity,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Integer(u64),
    Float(f64),
}

impl FromStr for Quantity {
    type Err = MeteringEventError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if let Ok(quantity) = value.parse::<u64>() {
            return Ok(Quantity::Integer(quantity));
        }
        match value.parse::<f64>() {
            Ok(quantity) if quantity.is_finite() && quantity >= 0.0 => Ok(Quantity::Float(quantity)),
            _ => Err(MeteringEventError::InvalidQuantity {
                message: format!(
                    "[{}] is not a valid quantity. A quantity must be a non negative number",
                    value
                ),
            }),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Integer(quantity) => write!(f, "{}", quantity),
            Quantity::Float(quantity) => write!(f, "{}", quantity),
        }
    }
}

/// Timestamps are exchanged as RFC 3339 UTC strings with second precision, e.g. `2022-01-27T09:57:29Z`.
pub mod timestamp {
    use crate::MeteringEventError;
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const LOCAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn format(timestamp: &DateTime<Utc>) -> String {
        timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Parses an RFC 3339 timestamp. A timestamp without offset, e.g. `2022-06-02T23:37:34`, is read as UTC.
    pub fn parse(value: &str) -> Result<DateTime<Utc>, MeteringEventError> {
        let value = value.trim();
        if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
            return Ok(timestamp.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(value, LOCAL_FORMAT)
            .map(|timestamp| Utc.from_utc_datetime(&timestamp))
            .map_err(|err| MeteringEventError::InvalidTimestamp {
                message: format!("[{}] is not a valid timestamp. Err: {}", value, err),
            })
    }

    pub fn serialize<S: Serializer>(
        timestamp: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(timestamp))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let value = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&value)
            .map(|timestamp| timestamp.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use maplit::*;
    use serde_json::json;

    fn purchase() -> MeteringEvent {
        MeteringEvent::SubscriptionPurchased(SubscriptionCreationInformation {
            subscription: Subscription {
                scope: "6787b636-d6a2-4e30-d671-f7ca570507ef".to_owned(),
                subscription_start: Utc.with_ymd_and_hms(2022, 4, 11, 16, 12, 26).unwrap(),
                renewal_interval: RenewalInterval::Monthly,
                plan: Plan {
                    plan_id: "gold_plan_id".to_owned(),
                    billing_dimensions: btreemap! {
                        "user_id".to_owned() => IncludedQuantity { monthly: 100, annually: 0 },
                    },
                },
            },
            meters_mapping: btreemap! {
                "user_id".to_owned() => "user_id".to_owned(),
            },
        })
    }

    #[test]
    fn should_serialize_a_subscription_purchase() {
        let json: serde_json::Value = serde_json::from_str(&purchase().to_json().unwrap()).unwrap();

        assert_eq!(
            json!({
                "type": "SubscriptionPurchased",
                "value": {
                    "subscription": {
                        "scope": "6787b636-d6a2-4e30-d671-f7ca570507ef",
                        "subscriptionStart": "2022-04-11T16:12:26Z",
                        "renewalInterval": "Monthly",
                        "plan": {
                            "planId": "gold_plan_id",
                            "billingDimensions": {
                                "user_id": { "monthly": 100, "annually": 0 }
                            }
                        }
                    },
                    "metersMapping": { "user_id": "user_id" }
                }
            }),
            json
        );
    }

    #[test]
    fn should_serialize_a_usage_report_with_second_precision() {
        let timestamp = Utc.timestamp_opt(1_643_277_449, 123_456_789).unwrap();
        let event = MeteringEvent::usage_reported(
            "6787b636-d6a2-4e30-d671-f7ca570507ef",
            "user_id",
            Quantity::Integer(12),
            timestamp,
        );

        assert_eq!(
            r#"{"type":"UsageReported","value":{"internalResourceId":"6787b636-d6a2-4e30-d671-f7ca570507ef","timestamp":"2022-01-27T09:57:29Z","meterName":"user_id","quantity":12}}"#,
            event.to_json().unwrap()
        );
    }

    #[test]
    fn should_serialize_a_subscription_deletion() {
        let event = MeteringEvent::subscription_deleted("fdc778a6-1281-40e4-cade-4a5fc11f5440");
        assert_eq!(
            r#"{"type":"SubscriptionDeleted","value":"fdc778a6-1281-40e4-cade-4a5fc11f5440"}"#,
            event.to_json().unwrap()
        );
        assert_eq!("fdc778a6-1281-40e4-cade-4a5fc11f5440", event.resource_id());
        assert_eq!("SubscriptionDeleted", event.event_type());
    }

    #[test]
    fn should_deserialize_what_was_serialized() {
        let event = purchase();
        let parsed: MeteringEvent = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(event, parsed);
        assert_eq!("6787b636-d6a2-4e30-d671-f7ca570507ef", parsed.resource_id());
    }

    #[test]
    fn should_build_a_monthly_subscription_purchase() {
        let expected = purchase();
        let start = Utc.with_ymd_and_hms(2022, 4, 11, 16, 12, 26).unwrap();
        let plan = match &expected {
            MeteringEvent::SubscriptionPurchased(info) => info.subscription.plan.clone(),
            _ => unreachable!(),
        };

        let event = MeteringEvent::subscription_purchased(
            "6787b636-d6a2-4e30-d671-f7ca570507ef",
            plan,
            btreemap! { "user_id".to_owned() => "user_id".to_owned() },
            start,
        );

        assert_eq!(expected, event);
        assert_eq!("SubscriptionPurchased", event.event_type());
    }

    #[test]
    fn should_parse_timestamps_with_and_without_offset() {
        let expected = Utc.with_ymd_and_hms(2022, 6, 2, 23, 37, 34).unwrap();

        assert_eq!(Ok(expected), timestamp::parse("2022-06-02T23:37:34"));
        assert_eq!(Ok(expected), timestamp::parse("2022-06-02T23:37:34Z"));
        assert_eq!(Ok(expected), timestamp::parse("2022-06-03T01:37:34+02:00"));
        assert!(matches!(
            timestamp::parse("yesterday"),
            Err(MeteringEventError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn should_parse_quantities() {
        assert_eq!(Ok(Quantity::Integer(12)), "12".parse());
        assert_eq!(Ok(Quantity::Float(0.5)), " 0.5 ".parse());
        assert!("-1".parse::<Quantity>().is_err());
        assert!("NaN".parse::<Quantity>().is_err());
        assert!("inf".parse::<Quantity>().is_err());
        assert!("twelve".parse::<Quantity>().is_err());
    }

    #[test]
    fn should_deserialize_integer_and_float_quantities() {
        assert_eq!(Quantity::Integer(3), serde_json::from_str::<Quantity>("3").unwrap());
        assert_eq!(Quantity::Float(2.5), serde_json::from_str::<Quantity>("2.5").unwrap());
        assert_eq!("2.5", Quantity::Float(2.5).to_string());
    }

    #[test]
    fn included_quantities_should_default_to_zero() {
        let quantity: IncludedQuantity = serde_json::from_str(r#"{ "monthly": 10 }"#).unwrap();
        assert_eq!(IncludedQuantity { monthly: 10, annually: 0 }, quantity);
    }
}

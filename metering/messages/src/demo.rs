/// The demo `SubscriptionPurchased` event, sent verbatim.
/// The trailing comma in `billingDimensions` is part of the payload.
pub const SUBSCRIPTION_PURCHASED_DEMO_PAYLOAD: &str = r#"{
                                            "type":"SubscriptionPurchased",
                                            "value":{
                                                "subscription":{
                                                "scope":"6787b636-d6a2-4e30-d671-f7ca570507ef",
                                                "subscriptionStart":"2022-04-11T16:12:26Z",
                                                "renewalInterval":"Monthly",
                                                "plan":{
                                                    "planId":"gold_plan_id",
                                                    "billingDimensions": {
                                                    "user_id":    { "monthly": 100, "annually": 0 },
                                                
                                                    }
                                                }
                                                },
                                                "metersMapping":{
                                                "user_id": "user_id"
                                                }
                                            }
                                            } "#;

/// The demo `UsageReported` event, sent verbatim.
pub const USAGE_REPORTED_DEMO_PAYLOAD: &str = r#"{
                                                "type": "UsageReported",
                                                "value": {
                                                    "internalResourceId": "6787b636-d6a2-4e30-d671-f7ca570507ef",
                                                    "timestamp":          "2022-01-27T09:57:29Z",
                                                    "meterName":          "user_id",
                                                    "quantity":           12
                                                }
                                            } "#;

/// How many usage events the demo publishes.
pub const USAGE_REPORTED_DEMO_COUNT: usize = 999;

/// The resource both demo payloads refer to.
pub const DEMO_INTERNAL_RESOURCE_ID: &str = "6787b636-d6a2-4e30-d671-f7ca570507ef";

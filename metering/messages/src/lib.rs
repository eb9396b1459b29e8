pub mod demo;
pub mod event;

pub use event::{
    IncludedQuantity, InternalUsageEvent, MeteringEvent, Plan, Quantity, RenewalInterval,
    Subscription, SubscriptionCreationInformation,
};

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum MeteringEventError {
    #[error("InvalidQuantity: [{message}]")]
    InvalidQuantity { message: String },
    #[error("InvalidTimestamp: [{message}]")]
    InvalidTimestamp { message: String },
    #[error("SerializationError: [{message}]")]
    SerializationError { message: String },
}

impl From<serde_json::Error> for MeteringEventError {
    fn from(error: serde_json::Error) -> Self {
        MeteringEventError::SerializationError { message: format!("{}", error) }
    }
}

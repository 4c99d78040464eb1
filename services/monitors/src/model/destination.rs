//! Notification destination referenced by monitor actions.
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct Destination {
    pub name: String,
    /// Type tag checked against the destination allow-list, e.g. `slack`.
    #[serde(rename = "type")]
    pub destination_type: String,
}

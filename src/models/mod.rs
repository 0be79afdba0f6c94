//! Data models

mod audit;
mod tenant;
mod user;

pub use audit::*;
pub use tenant::*;
pub use user::*;

use serde::{Deserialize, Deserializer};

/// Identifiers arrive from the data layer as strings or integers and are
/// carried through the service as opaque strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Integer(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Integer(n) => n.to_string(),
        }
    }
}

pub(crate) fn deserialize_opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

pub(crate) fn deserialize_optional_opaque_id<'de, D>(
    deserializer: D,
) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawId>::deserialize(deserializer).map(|raw| raw.map(String::from))
}

use derive_more::{Deref, From, Into};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A JSON object holding the configuration of a codec.
#[derive(Serialize, Deserialize, Clone, Default, Eq, PartialEq, Debug, Deref, From, Into)]
#[serde(transparent)]
pub struct Configuration(serde_json::Map<String, serde_json::Value>);

impl Configuration {
    /// Try and convert the configuration to a specific serializable configuration.
    ///
    /// # Errors
    /// Returns a [`serde_json`] error if the configuration does not match `TConfiguration`.
    pub fn to_typed<TConfiguration: DeserializeOwned>(
        &self,
    ) -> Result<TConfiguration, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(self.0.clone()))
    }
}

impl TryFrom<serde_json::Value> for Configuration {
    type Error = serde_json::Value;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

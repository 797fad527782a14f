//! Data structures used throughout the map generator.
//!
//! Container and alias records are decoded from the metadata service
//! with [`serde`](https://serde.rs/).  They are fetched fresh on every
//! poll cycle and never merged with a previous cycle.  The derived
//! backend groups and domain map use ordered maps so that rendering
//! them is a sorted walk by construction.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Deserializer, Serialize};

/// One container as reported by the metadata service.
///
/// Every field tolerates `null` or absence; a missing `primary_ip`
/// decodes as an empty string, meaning the container has not been
/// assigned an address yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    #[serde(default, deserialize_with = "nullable")]
    pub stack_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub service_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub uuid: String,
    #[serde(default, deserialize_with = "nullable")]
    pub primary_ip: String,
    #[serde(default, deserialize_with = "nullable")]
    pub state: String,
    #[serde(default, deserialize_with = "nullable")]
    pub labels: HashMap<String, String>,
}

impl ContainerRecord {
    /// Key that identifies this instance inside its stack's backend group.
    pub fn identity_key(&self) -> String {
        format!("{}-{}", self.service_name, self.uuid)
    }
}

/// Stack name → alias hostnames (without the domain suffix).
pub type Aliases = BTreeMap<String, BTreeSet<String>>;

/// A routable endpoint inside a backend group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    pub address: String,
    pub port: String,
}

/// Stack name → identity key → endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendGroups(pub BTreeMap<String, BTreeMap<String, Backend>>);

impl BackendGroups {
    /// Insert an endpoint, creating the stack's group on first use.
    pub fn insert(&mut self, stack: &str, identity: String, backend: Backend) {
        self.0
            .entry(stack.to_string())
            .or_default()
            .insert(identity, backend);
    }
}

/// Fully-qualified hostname → stack name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainMap(pub BTreeMap<String, String>);

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

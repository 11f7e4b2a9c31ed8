// src/enrichment.rs
//
// Context handed to the model next to the raw facts. Only the address is
// parsed today; `mls` and `poi` stay empty until a data provider is wired in.

use serde::Serialize;

use crate::generation::Property;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct NormalizedLocation {
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PropertyContext {
    pub normalized: NormalizedLocation,
    pub mls: Option<serde_json::Value>,
    pub poi: Vec<serde_json::Value>,
}

pub fn property_context(property: &Property) -> PropertyContext {
    let address = property.address.as_deref();
    PropertyContext {
        normalized: NormalizedLocation {
            city: address.and_then(guess_city),
            state: address.and_then(guess_state),
        },
        mls: None,
        poi: Vec::new(),
    }
}

fn address_parts(address: &str) -> Vec<&str> {
    address.split(',').map(str::trim).collect()
}

/// "123 Lakeview Dr, Bridgton, ME 04009" -> "Bridgton"
fn guess_city(address: &str) -> Option<String> {
    address_parts(address)
        .get(1)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// "123 Lakeview Dr, Bridgton, ME 04009" -> "ME"
fn guess_state(address: &str) -> Option<String> {
    address_parts(address)
        .get(2)
        .and_then(|s| s.split_whitespace().next())
        .map(str::to_string)
}

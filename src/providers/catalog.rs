use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::models::{Route, Stop};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read route catalog: {0}")]
    ReadError(String),
    #[error("Failed to parse route catalog: {0}")]
    ParseError(String),
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    stops: Vec<CatalogStop>,
}

#[derive(Debug, Deserialize)]
struct CatalogStop {
    name: String,
    lat: f64,
    lng: f64,
}

/// Static route catalog: bus id -> ordered list of named geographic points.
/// Loaded once; routes are never mutated, only re-derived per orientation.
pub struct RouteCatalog {
    routes: HashMap<String, CatalogEntry>,
}

impl RouteCatalog {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CatalogError::ReadError(e.to_string()))?;

        let routes = serde_yaml::from_str(&content)
            .map_err(|e| CatalogError::ParseError(e.to_string()))?;

        Ok(Self { routes })
    }

    /// Look up the route for a bus id. `None` for an unknown id; downstream
    /// renders "route unavailable" instead of crashing.
    pub fn route(&self, bus_id: &str) -> Option<Route> {
        self.routes.get(bus_id).map(|entry| Route {
            bus_id: bus_id.to_string(),
            stops: entry
                .stops
                .iter()
                .map(|s| Stop::new(s.name.clone(), s.lat, s.lng))
                .collect(),
        })
    }
}

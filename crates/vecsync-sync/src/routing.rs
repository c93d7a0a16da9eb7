//! Topic to collection routing
//!
//! The entity kind of every route is resolved once, when the table is built.

use std::collections::{BTreeSet, HashMap};
use vecsync_core::{EntityKind, Result, RouteConfig, VecsyncError};

/// Where events from one topic go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub collection: String,
    pub entity: EntityKind,
}

/// Immutable topic → route map
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, Route>,
}

impl RouteTable {
    /// Build from configuration. Routes whose entity can't be resolved are
    /// rejected.
    pub fn from_config(routes: &[RouteConfig]) -> Result<Self> {
        let mut table = HashMap::with_capacity(routes.len());

        for route in routes {
            let entity = route.entity_kind().ok_or_else(|| {
                VecsyncError::ConfigError(format!(
                    "Cannot infer entity kind for topic {}; set `entity` explicitly",
                    route.topic
                ))
            })?;

            let previous = table.insert(
                route.topic.clone(),
                Route {
                    collection: route.collection.clone(),
                    entity,
                },
            );
            if previous.is_some() {
                return Err(VecsyncError::ConfigError(format!(
                    "Duplicate route for topic {}",
                    route.topic
                )));
            }
        }

        Ok(Self { routes: table })
    }

    pub fn resolve(&self, topic: &str) -> Option<&Route> {
        self.routes.get(topic)
    }

    /// Subscribed topics, sorted
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        topics.sort_unstable();
        topics
    }

    /// Distinct target collections, sorted
    pub fn collections(&self) -> Vec<String> {
        self.routes
            .values()
            .map(|r| r.collection.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

//! Schema registry for solar, wind and combined telemetry
//!
//! Declares, for every domain × granularity pair, the required numeric columns
//! with their reduction and the anchored timestamp pattern. The registry is
//! built once per process and shared read-only by every pipeline run.

use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::app::models::{Domain, FieldSpec, Granularity, Schema};
use crate::constants::{COLUMN_ALIASES, fields, timestamp_patterns};
use crate::{Error, Result};

static SHARED_REGISTRY: LazyLock<Arc<SchemaRegistry>> =
    LazyLock::new(|| Arc::new(SchemaRegistry::builtin()));

/// Process-wide registry holding the built-in schemas
pub fn shared() -> Arc<SchemaRegistry> {
    Arc::clone(&SHARED_REGISTRY)
}

const SOLAR_FIELDS: &[FieldSpec] = &[
    FieldSpec::sum(fields::SOLAR_POWER),
    FieldSpec::sum(fields::DHI),
    FieldSpec::sum(fields::DNI),
    FieldSpec::sum(fields::GHI),
    FieldSpec::mean(fields::TEMPERATURE),
    FieldSpec::mean(fields::RELATIVE_HUMIDITY),
    FieldSpec::mean(fields::SOLAR_ZENITH_ANGLE),
];

const WIND_FIELDS: &[FieldSpec] = &[
    FieldSpec::sum(fields::WIND_POWER),
    FieldSpec::mean(fields::WIND_SPEED),
    FieldSpec::mean(fields::DEW_POINT),
];

/// Immutable lookup table of schemas
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<(Domain, Granularity), Schema>,
}

impl SchemaRegistry {
    /// Build the registry with all nine domain × granularity schemas
    pub fn builtin() -> Self {
        let mut schemas = Vec::new();
        for granularity in Granularity::ALL {
            let time_regex = timestamp_regex(granularity);
            for domain in Domain::ALL {
                schemas.push(Schema {
                    domain,
                    granularity,
                    time_field: granularity.time_field(),
                    time_regex: time_regex.clone(),
                    fields: domain_fields(domain),
                });
            }
        }

        debug!("Built schema registry with {} schemas", schemas.len());
        Self::from_schemas(schemas)
    }

    /// Build a registry from explicit schemas; later entries replace earlier ones
    pub fn from_schemas(schemas: impl IntoIterator<Item = Schema>) -> Self {
        let schemas = schemas
            .into_iter()
            .map(|schema| ((schema.domain, schema.granularity), schema))
            .collect();
        Self { schemas }
    }

    /// Schema for a domain and granularity
    pub fn lookup(&self, domain: Domain, granularity: Granularity) -> Result<&Schema> {
        self.schemas
            .get(&(domain, granularity))
            .ok_or_else(|| Error::unknown_schema(domain, granularity))
    }

    /// All schemas ordered by domain, then granularity
    pub fn schemas(&self) -> Vec<&Schema> {
        let mut schemas: Vec<&Schema> = self.schemas.values().collect();
        schemas.sort_by_key(|schema| (schema.domain, schema.granularity));
        schemas
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn domain_fields(domain: Domain) -> Vec<FieldSpec> {
    match domain {
        Domain::Solar => SOLAR_FIELDS.to_vec(),
        Domain::Wind => WIND_FIELDS.to_vec(),
        Domain::Combined => SOLAR_FIELDS.iter().chain(WIND_FIELDS).copied().collect(),
    }
}

fn timestamp_regex(granularity: Granularity) -> Regex {
    let pattern = match granularity {
        Granularity::Hourly => timestamp_patterns::HOURLY,
        Granularity::Daily => timestamp_patterns::DAILY,
        Granularity::Weekly => timestamp_patterns::WEEKLY,
    };
    Regex::new(pattern).expect("built-in timestamp pattern is valid")
}

/// Map a header title onto its canonical column name
///
/// Titles are lowercased and runs of whitespace or dashes become a single
/// underscore before the alias table is consulted. Telemetry aliases and the
/// time columns resolve to canonical names; anything else is left unchanged.
pub fn canonical_column(title: &str) -> String {
    let normalized = title
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .to_ascii_lowercase();

    if let Some((_, canonical)) = COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
    {
        return (*canonical).to_string();
    }

    if crate::constants::TIME_COLUMNS.contains(&normalized.as_str()) {
        return normalized;
    }

    title.to_string()
}

//! Schema command implementation
//!
//! Lists the registered domain × granularity schemas with their time column,
//! timestamp pattern and reduced fields.

use colored::Colorize;
use serde::Serialize;

use crate::app::models::{Domain, Granularity, Reduction, Schema, TimeField};
use crate::app::services::schema_registry;
use crate::cli::args::{OutputFormat, SchemaArgs};
use crate::cli::commands::shared::{ProcessingStats, setup_logging};
use crate::{Error, Result};

/// Serializable view of one schema
#[derive(Debug, Serialize)]
struct SchemaView<'a> {
    domain: Domain,
    granularity: Granularity,
    time_field: TimeField,
    timestamp_pattern: &'a str,
    example: &'a str,
    fields: Vec<FieldView>,
}

#[derive(Debug, Serialize)]
struct FieldView {
    name: &'static str,
    reduction: Reduction,
}

impl<'a> From<&'a Schema> for SchemaView<'a> {
    fn from(schema: &'a Schema) -> Self {
        Self {
            domain: schema.domain,
            granularity: schema.granularity,
            time_field: schema.time_field,
            timestamp_pattern: schema.time_regex.as_str(),
            example: schema.expected_example(),
            fields: schema
                .fields
                .iter()
                .map(|field| FieldView {
                    name: field.name,
                    reduction: field.reduction,
                })
                .collect(),
        }
    }
}

/// Run the schema command
pub fn run_schema(args: SchemaArgs) -> Result<ProcessingStats> {
    setup_logging(args.get_log_level(), true);

    let registry = schema_registry::shared();
    let schemas: Vec<SchemaView> = registry
        .schemas()
        .into_iter()
        .filter(|schema| args.domain.is_none_or(|domain| domain == schema.domain))
        .map(SchemaView::from)
        .collect();

    match args.output_format {
        OutputFormat::Human => print_human(&schemas),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&schemas)
                .map_err(|e| Error::serialization("Failed to serialize schemas", e))?;
            println!("{}", json);
        }
    }

    Ok(ProcessingStats::default())
}

fn print_human(schemas: &[SchemaView]) {
    for schema in schemas {
        println!(
            "{} {} {}",
            schema.domain.to_string().bright_cyan().bold(),
            schema.granularity.to_string().bright_yellow(),
            format!("({} like {})", schema.time_field, schema.example).bright_black()
        );
        for field in &schema.fields {
            let reduction = match field.reduction {
                Reduction::Sum => "sum",
                Reduction::Mean => "mean",
            };
            println!("   • {:<20} {}", field.name, reduction);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_view_serializes_fields_in_order() {
        let registry = schema_registry::shared();
        let schema = registry.lookup(Domain::Wind, Granularity::Weekly).unwrap();
        let json = serde_json::to_value(SchemaView::from(schema)).unwrap();

        assert_eq!(json["domain"], "wind");
        assert_eq!(json["time_field"], "week");
        assert_eq!(json["timestamp_pattern"], r"^\d{4}-W\d{2}$");
        assert_eq!(json["fields"][0]["name"], "wind_power");
        assert_eq!(json["fields"][1]["name"], "wind_speed");
    }
}

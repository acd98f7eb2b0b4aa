//! Integration tests for loading catalog definitions through the DDL gate

use tether_options::{
    resolve_options, CatalogLookup, InMemoryCatalog, OptionContext, OptionsError,
};

const DEFINITION: &str = r#"{
    "servers": [
        { "name": "app", "options": [{ "name": "database", "value": "/tmp/app.db" }] }
    ],
    "tables": [
        {
            "name": "events",
            "server": "app",
            "columns": [
                { "name": "id", "type": "integer" },
                { "name": "kind", "type": "text" }
            ],
            "options": [{ "name": "table", "value": "events" }]
        }
    ]
}"#;

#[test]
fn test_definition_loads_and_resolves() {
    let catalog = InMemoryCatalog::from_json(DEFINITION).unwrap();
    let table_id = catalog.table_id("events").unwrap();

    let table = catalog.foreign_table(table_id).unwrap();
    assert_eq!(table.columns.len(), 2);
    assert_eq!(table.columns[0].data_type, "integer");

    let config = resolve_options(&catalog, table_id).unwrap();
    assert_eq!(config.database.as_deref(), Some("/tmp/app.db"));
    assert_eq!(config.table.as_deref(), Some("events"));
}

#[test]
fn test_definition_with_misplaced_option_is_rejected() {
    let json = r#"{
        "servers": [
            { "name": "app", "options": [{ "name": "table", "value": "events" }] }
        ]
    }"#;
    let err = InMemoryCatalog::from_json(json).unwrap_err();
    match &err {
        OptionsError::InvalidOptionName { name, context, .. } => {
            assert_eq!(name, "table");
            assert_eq!(*context, OptionContext::Server);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        err.hint().as_deref(),
        Some("Valid options in this context are: database")
    );
}

#[test]
fn test_definition_with_redundant_option_is_rejected() {
    let json = r#"{
        "servers": [{ "name": "app", "options": [] }],
        "tables": [{
            "name": "events",
            "server": "app",
            "options": [
                { "name": "table", "value": "events" },
                { "name": "table", "value": "events" }
            ]
        }]
    }"#;
    let err = InMemoryCatalog::from_json(json).unwrap_err();
    assert_eq!(err.to_string(), "redundant options: table (events)");
}

#[test]
fn test_malformed_definition() {
    let err = InMemoryCatalog::from_json("{ \"servers\": 3 }").unwrap_err();
    assert!(matches!(err, OptionsError::InvalidDefinition(_)));
}

#[test]
fn test_table_without_options_fails_resolution() {
    let json = r#"{
        "servers": [{ "name": "app" }],
        "tables": [{ "name": "events", "server": "app" }]
    }"#;
    let catalog = InMemoryCatalog::from_json(json).unwrap();
    let table_id = catalog.table_id("events").unwrap();
    let err = resolve_options(&catalog, table_id).unwrap_err();
    assert!(matches!(err, OptionsError::MissingOptions));
}

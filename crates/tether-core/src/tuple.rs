//! Host-side tuple building: text rows into Arrow record batches typed by
//! the foreign table's declared columns.

use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array,
    RecordBatch, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use thiserror::Error;
use tracing::debug;

use tether_options::ColumnDef;

use crate::row::Row;

#[derive(Debug, Error)]
pub enum TupleError {
    #[error("row has {actual} values but the table declares {expected} columns")]
    ColumnCount { expected: usize, actual: usize },

    #[error("invalid input syntax for type {data_type}: \"{value}\"")]
    InvalidInput { data_type: DataType, value: String },

    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

/// Map a declared column type name to an Arrow type. Unknown names read as
/// text.
pub fn declared_type_to_arrow(type_name: &str) -> DataType {
    let normalized = type_name.trim().to_lowercase();
    match normalized.as_str() {
        "smallint" | "int2" => DataType::Int16,
        "integer" | "int" | "int4" => DataType::Int32,
        "bigint" | "int8" => DataType::Int64,
        "real" | "float4" => DataType::Float32,
        "double precision" | "float" | "float8" => DataType::Float64,
        // Arbitrary precision; kept as the store's exact text.
        "numeric" | "decimal" => DataType::Utf8,
        "boolean" | "bool" => DataType::Boolean,
        "text" | "varchar" | "character varying" | "character" | "char" | "name" => DataType::Utf8,
        other => {
            debug!("Unknown column type '{}', reading as text", other);
            DataType::Utf8
        }
    }
}

/// Arrow schema for a list of declared columns. Every column is nullable.
pub fn schema_from_columns(columns: &[ColumnDef]) -> SchemaRef {
    let fields: Vec<Field> = columns
        .iter()
        .map(|c| Field::new(&c.name, declared_type_to_arrow(&c.data_type), true))
        .collect();
    Arc::new(Schema::new(fields))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Some(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_column<T: FromStr>(
    rows: &[Row],
    index: usize,
    data_type: &DataType,
) -> Result<Vec<Option<T>>, TupleError> {
    rows.iter()
        .map(|row| match row.get(index) {
            None => Ok(None),
            Some(text) => text.trim().parse::<T>().map(Some).map_err(|_| TupleError::InvalidInput {
                data_type: data_type.clone(),
                value: text.to_string(),
            }),
        })
        .collect()
}

/// Build a record batch from text rows. Every row must have exactly as many
/// values as the schema has fields.
pub fn rows_to_record_batch(rows: &[Row], schema: SchemaRef) -> Result<RecordBatch, TupleError> {
    let expected = schema.fields().len();
    if let Some(row) = rows.iter().find(|r| r.len() != expected) {
        return Err(TupleError::ColumnCount {
            expected,
            actual: row.len(),
        });
    }

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(expected);

    for (i, field) in schema.fields().iter().enumerate() {
        let data_type = field.data_type();
        let array: ArrayRef = match data_type {
            DataType::Int16 => Arc::new(Int16Array::from(parse_column::<i16>(rows, i, data_type)?)),
            DataType::Int32 => Arc::new(Int32Array::from(parse_column::<i32>(rows, i, data_type)?)),
            DataType::Int64 => Arc::new(Int64Array::from(parse_column::<i64>(rows, i, data_type)?)),
            DataType::Float32 => {
                Arc::new(Float32Array::from(parse_column::<f32>(rows, i, data_type)?))
            }
            DataType::Float64 => {
                Arc::new(Float64Array::from(parse_column::<f64>(rows, i, data_type)?))
            }
            DataType::Boolean => {
                let values = rows
                    .iter()
                    .map(|row| match row.get(i) {
                        None => Ok(None),
                        Some(text) => parse_bool(text).map(Some).ok_or_else(|| {
                            TupleError::InvalidInput {
                                data_type: DataType::Boolean,
                                value: text.to_string(),
                            }
                        }),
                    })
                    .collect::<Result<Vec<Option<bool>>, TupleError>>()?;
                Arc::new(BooleanArray::from(values))
            }
            _ => {
                let values: Vec<Option<&str>> = rows.iter().map(|row| row.get(i)).collect();
                Arc::new(StringArray::from(values))
            }
        };
        columns.push(array);
    }

    Ok(RecordBatch::try_new(schema, columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;

    fn row(values: &[Option<&str>]) -> Row {
        Row::new(values.iter().map(|v| v.map(str::to_string)).collect())
    }

    fn schema() -> SchemaRef {
        schema_from_columns(&[
            ColumnDef::new("id", "integer"),
            ColumnDef::new("kind", "text"),
            ColumnDef::new("score", "double precision"),
            ColumnDef::new("active", "boolean"),
        ])
    }

    #[test]
    fn test_declared_type_to_arrow() {
        assert_eq!(declared_type_to_arrow("integer"), DataType::Int32);
        assert_eq!(declared_type_to_arrow("BIGINT"), DataType::Int64);
        assert_eq!(declared_type_to_arrow("smallint"), DataType::Int16);
        assert_eq!(declared_type_to_arrow("real"), DataType::Float32);
        assert_eq!(declared_type_to_arrow("double precision"), DataType::Float64);
        assert_eq!(declared_type_to_arrow("numeric"), DataType::Utf8);
        assert_eq!(declared_type_to_arrow("DECIMAL"), DataType::Utf8);
        assert_eq!(declared_type_to_arrow("boolean"), DataType::Boolean);
        assert_eq!(declared_type_to_arrow("character varying"), DataType::Utf8);
        assert_eq!(declared_type_to_arrow("timestamp"), DataType::Utf8);
    }

    #[test]
    fn test_rows_to_record_batch() {
        let rows = vec![
            row(&[Some("1"), Some("login"), Some("0.5"), Some("1")]),
            row(&[Some("2"), None, None, Some("f")]),
        ];
        let batch = rows_to_record_batch(&rows, schema()).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 4);

        let ids = batch.column(0).as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(ids.value(1), 2);
        let kinds = batch.column(1).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(kinds.value(0), "login");
        assert!(kinds.is_null(1));
        let scores = batch.column(2).as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(scores.value(0), 0.5);
        assert!(scores.is_null(1));
        let active = batch.column(3).as_any().downcast_ref::<BooleanArray>().unwrap();
        assert!(active.value(0));
        assert!(!active.value(1));
    }

    #[test]
    fn test_numeric_keeps_exact_text() {
        let schema = schema_from_columns(&[ColumnDef::new("amount", "numeric")]);
        let exact = "12345678901234567890.123456789";
        let rows = vec![row(&[Some(exact)]), row(&[Some("0.1")])];
        let batch = rows_to_record_batch(&rows, schema).unwrap();
        let amounts = batch.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(amounts.value(0), exact);
        assert_eq!(amounts.value(1), "0.1");
    }

    #[test]
    fn test_invalid_input() {
        let rows = vec![row(&[Some("one"), Some("x"), Some("1"), Some("t")])];
        let err = rows_to_record_batch(&rows, schema()).unwrap_err();
        assert_eq!(err.to_string(), "invalid input syntax for type Int32: \"one\"");
    }

    #[test]
    fn test_invalid_boolean() {
        let rows = vec![row(&[Some("1"), Some("x"), Some("1"), Some("maybe")])];
        let err = rows_to_record_batch(&rows, schema()).unwrap_err();
        assert!(matches!(err, TupleError::InvalidInput { data_type: DataType::Boolean, .. }));
    }

    #[test]
    fn test_column_count_mismatch() {
        let rows = vec![row(&[Some("1"), Some("x")])];
        let err = rows_to_record_batch(&rows, schema()).unwrap_err();
        assert!(matches!(err, TupleError::ColumnCount { expected: 4, actual: 2 }));
    }

    #[test]
    fn test_empty_rows() {
        let batch = rows_to_record_batch(&[], schema()).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 4);
    }
}

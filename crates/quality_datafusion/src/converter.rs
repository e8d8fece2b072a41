//! Conversion from Arrow arrays to engine values.

use crate::SourceError;
use arrow_array::array::*;
use arrow_array::RecordBatch;
use arrow_array::types::{
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType,
};
use arrow_schema::{DataType, TimeUnit};
use quality_core::{DataValue, SemanticType};
use quality_validator::DataRow;

/// Maps an Arrow type to the semantic type reported in dataset schemas.
pub fn semantic_type(data_type: &DataType) -> Option<SemanticType> {
    let semantic = match data_type {
        DataType::Boolean => SemanticType::Boolean,
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => SemanticType::Integer,
        DataType::Float32 | DataType::Float64 | DataType::Decimal128(_, _) => {
            SemanticType::Decimal
        }
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => SemanticType::Text,
        DataType::Date32 | DataType::Date64 => SemanticType::Date,
        DataType::Timestamp(_, _) => SemanticType::Timestamp,
        // CSV columns that are entirely empty are inferred as Null
        DataType::Null => SemanticType::Text,
        _ => return None,
    };
    Some(semantic)
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, name: &str) -> Result<&'a T, SourceError> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| SourceError::TypeConversionError(format!("Failed to downcast to {name}")))
}

/// Converts one Arrow value to a `DataValue`.
///
/// Timestamps with a time zone are converted to UTC and stored without it.
pub fn arrow_value_to_data_value(array: &ArrayRef, row: usize) -> Result<DataValue, SourceError> {
    if array.is_null(row) {
        return Ok(DataValue::Null);
    }

    let value = match array.data_type() {
        DataType::Null => DataValue::Null,
        DataType::Boolean => DataValue::Bool(downcast::<BooleanArray>(array, "BooleanArray")?.value(row)),
        DataType::Int8 => DataValue::Int(downcast::<Int8Array>(array, "Int8Array")?.value(row) as i64),
        DataType::Int16 => DataValue::Int(downcast::<Int16Array>(array, "Int16Array")?.value(row) as i64),
        DataType::Int32 => DataValue::Int(downcast::<Int32Array>(array, "Int32Array")?.value(row) as i64),
        DataType::Int64 => DataValue::Int(downcast::<Int64Array>(array, "Int64Array")?.value(row)),
        DataType::UInt8 => DataValue::Int(downcast::<UInt8Array>(array, "UInt8Array")?.value(row) as i64),
        DataType::UInt16 => DataValue::Int(downcast::<UInt16Array>(array, "UInt16Array")?.value(row) as i64),
        DataType::UInt32 => DataValue::Int(downcast::<UInt32Array>(array, "UInt32Array")?.value(row) as i64),
        DataType::UInt64 => {
            let v = downcast::<UInt64Array>(array, "UInt64Array")?.value(row);
            i64::try_from(v)
                .map(DataValue::Int)
                .unwrap_or(DataValue::Float(v as f64))
        }
        DataType::Float32 => DataValue::Float(downcast::<Float32Array>(array, "Float32Array")?.value(row) as f64),
        DataType::Float64 => DataValue::Float(downcast::<Float64Array>(array, "Float64Array")?.value(row)),
        DataType::Decimal128(_, scale) => {
            let raw = downcast::<Decimal128Array>(array, "Decimal128Array")?.value(row);
            DataValue::Float(raw as f64 / 10f64.powi(*scale as i32))
        }
        DataType::Utf8 => DataValue::String(downcast::<StringArray>(array, "StringArray")?.value(row).to_string()),
        DataType::LargeUtf8 => DataValue::String(
            downcast::<LargeStringArray>(array, "LargeStringArray")?
                .value(row)
                .to_string(),
        ),
        DataType::Utf8View => DataValue::String(
            downcast::<StringViewArray>(array, "StringViewArray")?
                .value(row)
                .to_string(),
        ),
        DataType::Date32 => date(downcast::<Date32Array>(array, "Date32Array")?.value_as_date(row))?,
        DataType::Date64 => date(downcast::<Date64Array>(array, "Date64Array")?.value_as_date(row))?,
        DataType::Timestamp(unit, _) => {
            let ts = match unit {
                TimeUnit::Second => downcast::<PrimitiveArray<TimestampSecondType>>(array, "TimestampSecondArray")?
                    .value_as_datetime(row),
                TimeUnit::Millisecond => downcast::<PrimitiveArray<TimestampMillisecondType>>(array, "TimestampMillisecondArray")?
                    .value_as_datetime(row),
                TimeUnit::Microsecond => downcast::<PrimitiveArray<TimestampMicrosecondType>>(array, "TimestampMicrosecondArray")?
                    .value_as_datetime(row),
                TimeUnit::Nanosecond => downcast::<PrimitiveArray<TimestampNanosecondType>>(array, "TimestampNanosecondArray")?
                    .value_as_datetime(row),
            };
            ts.map(DataValue::Timestamp).ok_or_else(|| {
                SourceError::TypeConversionError("Invalid timestamp value".to_string())
            })?
        }
        other => {
            return Err(SourceError::TypeConversionError(format!(
                "Unsupported Arrow type {other}"
            )));
        }
    };

    Ok(value)
}

fn date(value: Option<chrono::NaiveDate>) -> Result<DataValue, SourceError> {
    value
        .map(DataValue::Date)
        .ok_or_else(|| SourceError::TypeConversionError("Invalid date value".to_string()))
}

/// Converts every row of a record batch.
pub fn batch_to_rows(batch: &RecordBatch) -> Result<Vec<DataRow>, SourceError> {
    let schema = batch.schema();
    let mut rows = Vec::with_capacity(batch.num_rows());

    for row_idx in 0..batch.num_rows() {
        let mut row = DataRow::with_capacity(schema.fields().len());
        for (col_idx, field) in schema.fields().iter().enumerate() {
            let value = arrow_value_to_data_value(batch.column(col_idx), row_idx)?;
            row.insert(field.name().clone(), value);
        }
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_schema::{Field, Schema};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_semantic_types() {
        assert_eq!(semantic_type(&DataType::Int64), Some(SemanticType::Integer));
        assert_eq!(semantic_type(&DataType::Decimal128(10, 2)), Some(SemanticType::Decimal));
        assert_eq!(semantic_type(&DataType::Utf8View), Some(SemanticType::Text));
        assert_eq!(
            semantic_type(&DataType::Timestamp(TimeUnit::Microsecond, None)),
            Some(SemanticType::Timestamp)
        );
        assert_eq!(semantic_type(&DataType::Binary), None);
    }

    #[test]
    fn test_scalar_conversion() {
        let ints: ArrayRef = Arc::new(Int32Array::from(vec![Some(42), None]));
        assert_eq!(arrow_value_to_data_value(&ints, 0).unwrap(), DataValue::Int(42));
        assert_eq!(arrow_value_to_data_value(&ints, 1).unwrap(), DataValue::Null);

        let text: ArrayRef = Arc::new(StringArray::from(vec![" Germany"]));
        assert_eq!(arrow_value_to_data_value(&text, 0).unwrap(), DataValue::from(" Germany"));

        let flags: ArrayRef = Arc::new(BooleanArray::from(vec![false]));
        assert_eq!(arrow_value_to_data_value(&flags, 0).unwrap(), DataValue::Bool(false));

        let big: ArrayRef = Arc::new(UInt64Array::from(vec![u64::MAX]));
        assert!(matches!(arrow_value_to_data_value(&big, 0).unwrap(), DataValue::Float(_)));
    }

    #[test]
    fn test_decimal_conversion() {
        let prices: ArrayRef = Arc::new(
            Decimal128Array::from(vec![12345_i128])
                .with_precision_and_scale(10, 2)
                .unwrap(),
        );
        assert_eq!(arrow_value_to_data_value(&prices, 0).unwrap(), DataValue::Float(123.45));
    }

    #[test]
    fn test_temporal_conversion() {
        // 2024-05-01 is 19844 days after the epoch
        let dates: ArrayRef = Arc::new(Date32Array::from(vec![19844]));
        assert_eq!(
            arrow_value_to_data_value(&dates, 0).unwrap(),
            DataValue::Date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
        );

        let stamps: ArrayRef = Arc::new(TimestampMicrosecondArray::from(vec![1_714_521_600_000_000]));
        assert_eq!(
            arrow_value_to_data_value(&stamps, 0).unwrap(),
            DataValue::Timestamp(
                NaiveDate::from_ymd_opt(2024, 5, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            )
        );
    }

    #[test]
    fn test_unsupported_type_is_an_error() {
        let blobs: ArrayRef = Arc::new(BinaryArray::from(vec![b"\x00".as_ref()]));
        assert!(arrow_value_to_data_value(&blobs, 0).is_err());
    }

    #[test]
    fn test_batch_to_rows() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("cid", DataType::Utf8, false),
            Field::new("cntry", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["AW00011000", "AW00011001"])),
                Arc::new(StringArray::from(vec![Some("DE"), None])),
            ],
        )
        .unwrap();

        let rows = batch_to_rows(&batch).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["cntry"], DataValue::from("DE"));
        assert_eq!(rows[1]["cntry"], DataValue::Null);
    }
}

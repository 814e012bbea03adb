//! Purpose: Render one typed column value as display text.
//! Exports: `ColumnView`, `CellFormatter`, `format_general`, `NULL_CELL`, `UNSUPPORTED_CELL`.
//! Role: Leaf of the read path; the façade builds one formatter per column of a batch.
//! Invariants: Dispatch is by physical Arrow type only; nested/logical types are not inspected.
//! Invariants: Never fails; nulls render as `NULL`, unknown types as `UNSUPPORTED`.
//! Notes: Lossy and display-oriented; not a round-trippable serialization.
use arrow_array::cast::AsArray;
use arrow_array::types::{
    Date32Type, Date64Type, Float32Type, Float64Type, Int32Type, Int64Type,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType,
};
use arrow_array::{
    Array, BinaryArray, BooleanArray, Date32Array, Date64Array, Float32Array, Float64Array,
    Int32Array, Int64Array, LargeBinaryArray, LargeStringArray, StringArray,
};
use arrow_schema::{DataType, TimeUnit};
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

pub const NULL_CELL: &str = "NULL";
pub const UNSUPPORTED_CELL: &str = "UNSUPPORTED";

const GENERAL_PRECISION: i32 = 6;
const SECONDS_PER_DAY: i64 = 86_400;

const DATE_TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Typed view over one column array, resolved once per column.
#[derive(Clone, Copy, Debug)]
pub enum ColumnView<'a> {
    Utf8(&'a StringArray),
    LargeUtf8(&'a LargeStringArray),
    Binary(&'a BinaryArray),
    LargeBinary(&'a LargeBinaryArray),
    Int32(&'a Int32Array),
    Int64(&'a Int64Array),
    Float32(&'a Float32Array),
    Float64(&'a Float64Array),
    Boolean(&'a BooleanArray),
    Timestamp { values: &'a [i64], unit: TimeUnit },
    Date32(&'a Date32Array),
    Date64(&'a Date64Array),
    Unsupported,
}

impl<'a> ColumnView<'a> {
    pub fn new(array: &'a dyn Array) -> Self {
        match array.data_type() {
            DataType::Utf8 => ColumnView::Utf8(array.as_string::<i32>()),
            DataType::LargeUtf8 => ColumnView::LargeUtf8(array.as_string::<i64>()),
            DataType::Binary => ColumnView::Binary(array.as_binary::<i32>()),
            DataType::LargeBinary => ColumnView::LargeBinary(array.as_binary::<i64>()),
            DataType::Int32 => ColumnView::Int32(array.as_primitive::<Int32Type>()),
            DataType::Int64 => ColumnView::Int64(array.as_primitive::<Int64Type>()),
            DataType::Float32 => ColumnView::Float32(array.as_primitive::<Float32Type>()),
            DataType::Float64 => ColumnView::Float64(array.as_primitive::<Float64Type>()),
            DataType::Boolean => ColumnView::Boolean(array.as_boolean()),
            DataType::Timestamp(unit, _) => {
                let values: &'a [i64] = match unit {
                    TimeUnit::Second => &array.as_primitive::<TimestampSecondType>().values()[..],
                    TimeUnit::Millisecond => {
                        &array.as_primitive::<TimestampMillisecondType>().values()[..]
                    }
                    TimeUnit::Microsecond => {
                        &array.as_primitive::<TimestampMicrosecondType>().values()[..]
                    }
                    TimeUnit::Nanosecond => {
                        &array.as_primitive::<TimestampNanosecondType>().values()[..]
                    }
                };
                ColumnView::Timestamp {
                    values,
                    unit: *unit,
                }
            }
            DataType::Date32 => ColumnView::Date32(array.as_primitive::<Date32Type>()),
            DataType::Date64 => ColumnView::Date64(array.as_primitive::<Date64Type>()),
            _ => ColumnView::Unsupported,
        }
    }

    /// Formats a non-null value.
    fn value(&self, row: usize) -> String {
        match self {
            ColumnView::Utf8(array) => array.value(row).to_string(),
            ColumnView::LargeUtf8(array) => array.value(row).to_string(),
            ColumnView::Binary(array) => String::from_utf8_lossy(array.value(row)).into_owned(),
            ColumnView::LargeBinary(array) => {
                String::from_utf8_lossy(array.value(row)).into_owned()
            }
            ColumnView::Int32(array) => array.value(row).to_string(),
            ColumnView::Int64(array) => array.value(row).to_string(),
            ColumnView::Float32(array) => format_general(f64::from(array.value(row))),
            ColumnView::Float64(array) => format_general(array.value(row)),
            ColumnView::Boolean(array) => {
                if array.value(row) {
                    "true".to_string()
                } else {
                    "false".to_string()
                }
            }
            ColumnView::Timestamp { values, unit } => {
                format_timestamp(values[row], *unit).unwrap_or_else(unsupported)
            }
            ColumnView::Date32(array) => {
                format_days(array.value(row)).unwrap_or_else(unsupported)
            }
            ColumnView::Date64(array) => {
                format_date_millis(array.value(row)).unwrap_or_else(unsupported)
            }
            ColumnView::Unsupported => unsupported(),
        }
    }
}

/// Null-aware formatter for one column array.
pub struct CellFormatter<'a> {
    array: &'a dyn Array,
    view: ColumnView<'a>,
}

impl<'a> CellFormatter<'a> {
    pub fn new(array: &'a dyn Array) -> Self {
        Self {
            array,
            view: ColumnView::new(array),
        }
    }

    pub fn view(&self) -> &ColumnView<'a> {
        &self.view
    }

    pub fn format(&self, row: usize) -> String {
        if self.array.is_null(row) || self.array.data_type() == &DataType::Null {
            return NULL_CELL.to_string();
        }
        self.view.value(row)
    }
}

fn unsupported() -> String {
    UNSUPPORTED_CELL.to_string()
}

fn format_timestamp(value: i64, unit: TimeUnit) -> Option<String> {
    let per_unit: i128 = match unit {
        TimeUnit::Second => 1_000_000_000,
        TimeUnit::Millisecond => 1_000_000,
        TimeUnit::Microsecond => 1_000,
        TimeUnit::Nanosecond => 1,
    };
    let ts = OffsetDateTime::from_unix_timestamp_nanos(i128::from(value) * per_unit).ok()?;
    ts.format(DATE_TIME_FORMAT).ok()
}

fn format_days(days: i32) -> Option<String> {
    let ts = OffsetDateTime::from_unix_timestamp(i64::from(days) * SECONDS_PER_DAY).ok()?;
    ts.format(DATE_FORMAT).ok()
}

fn format_date_millis(millis: i64) -> Option<String> {
    let ts = OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()?;
    ts.format(DATE_FORMAT).ok()
}

/// Formats like C's `%.6g`: six significant digits, trailing zeros removed,
/// exponent form when the decimal exponent is below -4 or at least 6.
pub fn format_general(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let scientific = format!("{:.*e}", (GENERAL_PRECISION - 1) as usize, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };

    if exponent < -4 || exponent >= GENERAL_PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (GENERAL_PRECISION - 1 - exponent) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

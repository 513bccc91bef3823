//! # tally-core
//!
//! Core data structures for the tally formula engine.
//!
//! This crate provides the fundamental types used throughout tally:
//! - [`Value`] - Scalar values (numbers, strings, booleans, timestamps, null)
//! - [`Record`] - One row of input data
//! - [`TypeTag`] and [`coerce`] - Conversion of raw field values to declared input types
//!
//! ## Example
//!
//! ```rust
//! use tally_core::{coerce, Record, TypeTag, Value};
//!
//! let record = Record::from([("id", Value::from(1)), ("price", Value::from("$1,250.00"))]);
//! let price = coerce(record.get("price").unwrap(), TypeTag::Currency).unwrap();
//! assert_eq!(price, Value::Number(1250.0));
//! ```

pub mod coerce;
pub mod datetime;
pub mod error;
pub mod record;
pub mod value;

// Re-exports for convenience
pub use coerce::{coerce, coerce_as, parse_currency, TypeDef, TypeRegistry, TypeTag};
pub use error::{CoerceResult, CoercionError};
pub use record::{FieldMap, Record, ID_FIELD};
pub use value::Value;

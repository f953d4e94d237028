pub mod converter;
pub mod error;
pub mod field;
pub mod overflow;
pub mod record;
pub mod value;

pub use morph_api_derive::Record;

pub use converter::{FieldConverter, FieldValidator};
pub use error::ConvertError;
pub use field::FieldValue;
pub use overflow::Overflow;
pub use record::Record;
pub use value::Value;

// Derive output names `::morph_api`; this keeps it resolvable from inside the crate.
extern crate self as morph_api;

use std::sync::Arc;

use crate::error::ConvertError;
use crate::value::Value;

/// Field-level value converter.
///
/// Receives the source member encoded as a [`Value`] and returns the value to
/// store into the destination member. `Ok(None)` means "reset the destination
/// to its zero value". If no converter is registered for a field, compatible
/// types are copied directly and nothing needs to be written.
pub trait FieldConverter: Send + Sync {
    fn convert(&self, value: Value) -> Result<Option<Value>, ConvertError>;
}

impl<F> FieldConverter for F
where
    F: Fn(Value) -> Result<Option<Value>, ConvertError> + Send + Sync,
{
    fn convert(&self, value: Value) -> Result<Option<Value>, ConvertError> {
        self(value)
    }
}

/// Field-level validator, run against the value just stored in a destination
/// member. An error aborts the adaptation.
pub trait FieldValidator: Send + Sync {
    fn validate(&self, value: &Value) -> Result<(), ConvertError>;
}

impl<F> FieldValidator for F
where
    F: Fn(&Value) -> Result<(), ConvertError> + Send + Sync,
{
    fn validate(&self, value: &Value) -> Result<(), ConvertError> {
        self(value)
    }
}

/// Boxes a closure as a shareable converter.
pub fn converter<F>(f: F) -> Arc<dyn FieldConverter>
where
    F: Fn(Value) -> Result<Option<Value>, ConvertError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Chains converters left to right.
///
/// The first error stops the chain. A converter returning `None` ends it with
/// `None`, so later converters never see a missing value.
pub fn compose<I>(
    converters: I,
) -> impl Fn(Value) -> Result<Option<Value>, ConvertError> + Send + Sync + 'static
where
    I: IntoIterator<Item = Arc<dyn FieldConverter>>,
{
    let chain: Vec<Arc<dyn FieldConverter>> = converters.into_iter().collect();
    move |value| {
        let mut current = value;
        for step in &chain {
            match step.convert(current)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}

/// Applies `f` to string values; everything else passes through unchanged.
pub fn map_string<F>(f: F) -> impl Fn(Value) -> Result<Option<Value>, ConvertError> + Send + Sync + 'static
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    move |value| {
        Ok(Some(match value {
            Value::String(s) => Value::String(f(&s)),
            other => other,
        }))
    }
}

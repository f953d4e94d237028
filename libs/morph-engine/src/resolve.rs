//! Direct field resolution.

use morph_api::field::FieldValue;
use morph_api::record::{self, Record};
use morph_api::value::kind_name;

use crate::config::AdapterOptions;
use crate::error::AdaptError;
use crate::metadata::{MemberDescriptor, TypeMetadata};
use crate::registry::{ConverterRef, Registries};
use crate::scratch::Scratch;

/// State shared by the stages of one adaptation.
pub(crate) struct Pass<'a> {
    pub options: &'a AdapterOptions,
    pub registries: &'a Registries,
    pub source: &'a TypeMetadata,
    pub destination: &'a TypeMetadata,
    pub scratch: &'a mut Scratch,
}

impl<'a> Pass<'a> {
    /// Effective converter for a destination member.
    pub fn converter(&self, member: &MemberDescriptor) -> Option<&'a ConverterRef> {
        let registries: &'a Registries = self.registries;
        registries
            .converters
            .resolve(self.source.type_id(), self.destination.type_id(), member.name)
    }

    /// Runs the effective validator against the value now stored in `member`.
    pub fn validate(&self, member: &MemberDescriptor, value: &dyn FieldValue) -> Result<(), AdaptError> {
        let Some(validator) = self.registries.validators.resolve(
            self.source.type_id(),
            self.destination.type_id(),
            member.name,
        ) else {
            return Ok(());
        };
        let encoded = value.encode().map_err(AdaptError::Encode)?;
        validator.validate(&encoded).map_err(AdaptError::Validator)
    }
}

/// Copies every destination member that has a source counterpart, in
/// destination declaration order. Stops at the first error.
pub(crate) fn adapt_fields(pass: &mut Pass<'_>, dst: &mut dyn Record, src: &dyn Record) -> Result<(), AdaptError> {
    let (source, destination) = (pass.source, pass.destination);

    for (dst_index, member) in destination.members().iter().enumerate() {
        if member.is_ignored || member.is_overflow || !member.settable {
            continue;
        }
        let Some(src_index) = source.find_counterpart(member, pass.options.case_insensitive) else {
            tracing::trace!(member = member.name, "no source member");
            continue;
        };
        let origin = source.member(src_index);
        if origin.is_overflow || origin.is_ignored {
            pass.scratch.consumed[src_index] = true;
            continue;
        }
        let Some(value) = record::field_at(src, &origin.path) else {
            tracing::trace!(member = origin.name, "source member under an absent embedding");
            continue;
        };

        assign(pass, dst, member, value).map_err(|e| e.with_field(member.name))?;
        pass.scratch.consumed[src_index] = true;
        pass.scratch.set[dst_index] = true;
    }
    Ok(())
}

fn assign(
    pass: &Pass<'_>,
    dst: &mut dyn Record,
    member: &MemberDescriptor,
    value: &dyn FieldValue,
) -> Result<(), AdaptError> {
    let mut staged = member.blank();

    if let Some(converter) = pass.converter(member) {
        let input = value.encode().map_err(AdaptError::Encode)?;
        match converter.convert(input).map_err(AdaptError::Converter)? {
            None => {
                store(dst, &member.path, &*staged);
                return Ok(());
            }
            Some(output) => {
                let found = kind_name(&output);
                staged.decode(output).map_err(|_| AdaptError::TypeMismatch {
                    expected: member.type_name,
                    found,
                })?;
            }
        }
    } else if !staged.assign_from(value) && !convert_through_value(&mut *staged, value) {
        tracing::trace!(
            member = member.name,
            from = value.type_name(),
            to = member.type_name,
            "incompatible member types, skipped"
        );
        return Ok(());
    }

    store(dst, &member.path, &*staged);
    pass.validate(member, &*staged)
}

/// Writes `value` into the member at `path`.
///
/// A zero value is not written through an optional embedding that is
/// currently `None`, so the embedding stays unallocated.
pub(crate) fn store(dst: &mut dyn Record, path: &[usize], value: &dyn FieldValue) {
    if value.is_zero() && record::field_at(dst, path).is_none() {
        return;
    }
    if let Some(target) = record::field_at_mut(dst, path) {
        target.assign_from(value);
    }
}

/// Numeric widening and other shape-compatible copies.
fn convert_through_value(target: &mut dyn FieldValue, value: &dyn FieldValue) -> bool {
    value.encode().and_then(|v| target.decode(v)).is_ok()
}

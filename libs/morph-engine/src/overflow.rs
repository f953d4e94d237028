//! Overflow slot protocol: unmarshal the source's leftovers into unset
//! destination members, then marshal unconsumed source members into the
//! destination's slot.

use morph_api::overflow::Overflow;
use morph_api::record::{self, Record};
use morph_api::value::{Map, Value};

use crate::config::OverwritePolicy;
use crate::error::AdaptError;
use crate::resolve::{Pass, store};

pub(crate) fn unmarshal(pass: &mut Pass<'_>, dst: &mut dyn Record, src: &dyn Record) -> Result<(), AdaptError> {
    let (source, destination) = (pass.source, pass.destination);
    let Some(slot) = source.overflow_index() else {
        return Ok(());
    };
    if pass.options.disable_unmarshal_additional_data {
        return Ok(());
    }

    let stored = record::field_at(src, &source.member(slot).path)
        .and_then(|value| value.as_any().downcast_ref::<Overflow>())
        .and_then(Overflow::as_bytes);
    let Some(bytes) = stored else {
        return Ok(());
    };
    let Some(entries) = serde_json::from_slice::<Option<Map<String, Value>>>(bytes).map_err(AdaptError::Decode)?
    else {
        return Ok(());
    };
    let mut entries: Vec<(String, Value)> = entries.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    for (key, raw) in entries {
        let Some(dst_index) = destination.find_key(&key, pass.options.case_insensitive) else {
            tracing::trace!(key = %key, "overflow key has no destination member");
            continue;
        };
        let member = destination.member(dst_index);
        if member.is_ignored || member.is_overflow || !member.settable {
            continue;
        }
        if pass.options.overwrite_policy == OverwritePolicy::PreferFields && pass.scratch.set[dst_index] {
            tracing::trace!(key = %key, "member already set, overflow key skipped");
            continue;
        }
        let mut staged = member.blank();
        let applied = match pass.converter(member) {
            Some(converter) => match converter.convert(raw) {
                Ok(Some(output)) => staged.decode(output).map_err(|e| e.to_string()),
                Ok(None) => Err("converter returned no value".to_owned()),
                Err(e) => Err(e.message),
            },
            None => staged.decode(raw).map_err(|e| e.to_string()),
        };
        if let Err(reason) = applied {
            tracing::trace!(key = %key, reason = %reason, "overflow key dropped");
            continue;
        }

        store(dst, &member.path, &*staged);
        pass.validate(member, &*staged).map_err(|e| e.with_field(member.name))?;
        pass.scratch.set[dst_index] = true;
    }
    Ok(())
}

pub(crate) fn marshal(pass: &Pass<'_>, dst: &mut dyn Record, src: &dyn Record) -> Result<(), AdaptError> {
    let (source, destination) = (pass.source, pass.destination);
    let Some(slot) = destination.overflow_index() else {
        return Ok(());
    };
    let slot = destination.member(slot);
    if pass.options.disable_marshal_additional_data || !slot.settable {
        return Ok(());
    }

    let mut leftovers = Map::new();
    for (src_index, member) in source.members().iter().enumerate() {
        if member.is_overflow || member.is_ignored || pass.scratch.consumed[src_index] {
            continue;
        }
        let Some(value) = record::field_at(src, &member.path) else {
            continue;
        };
        if !pass.options.include_zero_values && value.is_zero() {
            continue;
        }
        let encoded = value
            .encode()
            .map_err(|e| AdaptError::Encode(e).with_field(member.name))?;
        leftovers.insert(member.name.to_owned(), encoded);
    }

    let bag = if leftovers.is_empty() {
        Overflow::none()
    } else {
        Overflow::from_map(&leftovers).map_err(AdaptError::Encode)?
    };
    store(dst, &slot.path, &bag);
    Ok(())
}

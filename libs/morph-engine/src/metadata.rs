//! Structural metadata of record types.
//!
//! A [`TypeMetadata`] is the flattened member list of one record type plus
//! the lookup indices the resolver needs. It is built once per type from the
//! derive-generated declarations and shared through [`MetadataCache`].

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use morph_api::field::FieldValue;
use morph_api::overflow::Overflow;
use morph_api::record::{DeclKind, FieldDecl, Record};
use rustc_hash::FxHashMap;

/// Conventional name of the overflow slot.
pub const OVERFLOW_FIELD: &str = "additional_data";

/// One member after flattening embedded records.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    /// Slot index per nesting level, outermost first.
    pub path: Vec<usize>,
    pub name: &'static str,
    pub alias: Option<&'static str>,
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub is_overflow: bool,
    pub is_ignored: bool,
    pub settable: bool,
    fresh: fn() -> Box<dyn FieldValue>,
}

impl MemberDescriptor {
    /// A detached zero value of the member's type.
    pub fn blank(&self) -> Box<dyn FieldValue> {
        (self.fresh)()
    }
}

type CastRef = fn(&dyn Any) -> Option<&dyn Record>;
type CastMut = fn(&mut dyn Any) -> Option<&mut dyn Record>;

pub struct TypeMetadata {
    type_id: TypeId,
    type_name: &'static str,
    members: Vec<MemberDescriptor>,
    by_name: FxHashMap<&'static str, usize>,
    by_alias: FxHashMap<&'static str, usize>,
    by_lower_name: FxHashMap<String, usize>,
    by_lower_alias: FxHashMap<String, usize>,
    overflow: Option<usize>,
    cast_ref: CastRef,
    cast_mut: CastMut,
}

impl TypeMetadata {
    pub fn build<T: Record>() -> Self {
        let type_name = std::any::type_name::<T>();
        let mut walker = Walker {
            record: type_name,
            path: Vec::new(),
            stack: vec![TypeId::of::<T>()],
            members: Vec::new(),
            tagged: Vec::new(),
        };
        walker.walk(T::declare(), false);
        let Walker { mut members, tagged, .. } = walker;

        let overflow = pick_overflow(type_name, &mut members, &tagged);

        let mut by_name = FxHashMap::default();
        let mut by_alias = FxHashMap::default();
        let mut by_lower_name = FxHashMap::default();
        let mut by_lower_alias = FxHashMap::default();
        for (index, member) in members.iter().enumerate() {
            if by_name.insert(member.name, index).is_some() {
                tracing::warn!(
                    record = type_name,
                    member = member.name,
                    "duplicate member name, the last declaration wins"
                );
            }
            by_lower_name.insert(member.name.to_lowercase(), index);
            if let Some(alias) = member.alias {
                by_alias.insert(alias, index);
                by_lower_alias.insert(alias.to_lowercase(), index);
            }
        }

        tracing::debug!(
            record = type_name,
            members = members.len(),
            overflow = ?overflow.map(|i| members[i].name),
            "record metadata built"
        );

        Self {
            type_id: TypeId::of::<T>(),
            type_name,
            members,
            by_name,
            by_alias,
            by_lower_name,
            by_lower_alias,
            overflow,
            cast_ref: cast_ref::<T>,
            cast_mut: cast_mut::<T>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    pub fn member(&self, index: usize) -> &MemberDescriptor {
        &self.members[index]
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Index of the overflow slot, if the type has one.
    pub fn overflow_index(&self) -> Option<usize> {
        self.overflow
    }

    pub fn by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn by_alias(&self, alias: &str) -> Option<usize> {
        self.by_alias.get(alias).copied()
    }

    /// Finds the member of this type matching `other` (a member of another type).
    ///
    /// Exact lookups run first: name to name, alias to alias, alias to name,
    /// name to alias. With `case_insensitive` the same four run again on
    /// lowercased keys.
    pub fn find_counterpart(&self, other: &MemberDescriptor, case_insensitive: bool) -> Option<usize> {
        let exact = self
            .by_name
            .get(other.name)
            .or_else(|| other.alias.and_then(|a| self.by_alias.get(a)))
            .or_else(|| other.alias.and_then(|a| self.by_name.get(a)))
            .or_else(|| self.by_alias.get(other.name));
        if exact.is_some() || !case_insensitive {
            return exact.copied();
        }

        let name = other.name.to_lowercase();
        let alias = other.alias.map(str::to_lowercase);
        self.by_lower_name
            .get(&name)
            .or_else(|| alias.as_ref().and_then(|a| self.by_lower_alias.get(a)))
            .or_else(|| alias.as_ref().and_then(|a| self.by_lower_name.get(a)))
            .or_else(|| self.by_lower_alias.get(&name))
            .copied()
    }

    /// Finds the member an overflow key maps to: name, then alias, then the
    /// lowercased indices when `case_insensitive` is on.
    pub fn find_key(&self, key: &str, case_insensitive: bool) -> Option<usize> {
        let exact = self.by_name.get(key).or_else(|| self.by_alias.get(key));
        if exact.is_some() || !case_insensitive {
            return exact.copied();
        }
        let lower = key.to_lowercase();
        self.by_lower_name
            .get(&lower)
            .or_else(|| self.by_lower_alias.get(&lower))
            .copied()
    }

    /// Views an erased value as this record type.
    pub fn downcast<'a>(&self, value: &'a dyn Any) -> Option<&'a dyn Record> {
        (self.cast_ref)(value)
    }

    pub fn downcast_mut<'a>(&self, value: &'a mut dyn Any) -> Option<&'a mut dyn Record> {
        (self.cast_mut)(value)
    }
}

impl fmt::Debug for TypeMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMetadata")
            .field("type_name", &self.type_name)
            .field("members", &self.members)
            .field("overflow", &self.overflow)
            .finish_non_exhaustive()
    }
}

fn cast_ref<T: Record>(value: &dyn Any) -> Option<&dyn Record> {
    value.downcast_ref::<T>().map(|r| r as &dyn Record)
}

fn cast_mut<T: Record>(value: &mut dyn Any) -> Option<&mut dyn Record> {
    value.downcast_mut::<T>().map(|r| r as &mut dyn Record)
}

struct Walker {
    record: &'static str,
    path: Vec<usize>,
    /// Embedded types currently being expanded.
    stack: Vec<TypeId>,
    members: Vec<MemberDescriptor>,
    tagged: Vec<bool>,
}

impl Walker {
    fn walk(&mut self, decls: Vec<FieldDecl>, read_only: bool) {
        for (index, decl) in decls.into_iter().enumerate() {
            self.path.push(index);
            match decl.kind {
                DeclKind::Embedded { type_id, type_name, declare, .. } => {
                    if decl.ignore {
                        tracing::trace!(record = self.record, member = decl.name, "ignored embedding not flattened");
                    } else if self.stack.contains(&type_id) {
                        tracing::warn!(
                            record = self.record,
                            member = decl.name,
                            embedded = type_name,
                            "recursive embedding not flattened"
                        );
                    } else {
                        self.stack.push(type_id);
                        self.walk(declare(), read_only || decl.read_only);
                        self.stack.pop();
                    }
                }
                DeclKind::Value { type_id, type_name, fresh } => {
                    self.members.push(MemberDescriptor {
                        path: self.path.clone(),
                        name: decl.name,
                        alias: decl.alias,
                        type_id,
                        type_name,
                        is_overflow: false,
                        is_ignored: decl.ignore,
                        settable: !(read_only || decl.read_only),
                        fresh,
                    });
                    self.tagged.push(decl.overflow);
                }
            }
            self.path.pop();
        }
    }
}

/// Marks the first qualifying member as the overflow slot.
fn pick_overflow(record: &'static str, members: &mut [MemberDescriptor], tagged: &[bool]) -> Option<usize> {
    let overflow_type = TypeId::of::<Overflow>();
    let mut chosen = None;
    for (index, member) in members.iter_mut().enumerate() {
        if tagged[index] && member.type_id != overflow_type {
            tracing::warn!(
                record,
                member = member.name,
                found = member.type_name,
                "overflow tag on a member that is not an Overflow, treated as a plain member"
            );
            continue;
        }
        let candidate = member.type_id == overflow_type
            && !member.is_ignored
            && (tagged[index] || member.name == OVERFLOW_FIELD);
        if !candidate {
            continue;
        }
        if chosen.is_none() {
            member.is_overflow = true;
            chosen = Some(index);
        } else {
            tracing::warn!(record, member = member.name, "second overflow slot treated as a plain member");
        }
    }
    chosen
}

static SHARED: LazyLock<Arc<MetadataCache>> = LazyLock::new(|| Arc::new(MetadataCache::new()));

/// Concurrent, never-evicting map from record type to its metadata.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: DashMap<TypeId, Arc<TypeMetadata>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache adapters use unless given their own.
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED)
    }

    /// Returns the metadata of `T`, building it on first use.
    ///
    /// Concurrent first calls may each build; the first stored entry wins and
    /// every caller gets that one.
    pub fn metadata_for<T: Record>(&self) -> Arc<TypeMetadata> {
        let id = TypeId::of::<T>();
        if let Some(found) = self.entries.get(&id) {
            return Arc::clone(found.value());
        }
        let built = Arc::new(TypeMetadata::build::<T>());
        Arc::clone(self.entries.entry(id).or_insert(built).value())
    }

    pub fn get(&self, type_id: TypeId) -> Option<Arc<TypeMetadata>> {
        self.entries.get(&type_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.entries.contains_key(&type_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

use std::any::{Any, TypeId};

use crate::field::FieldValue;

/// A struct the engine can adapt.
///
/// Normally produced by `#[derive(Record)]`. `declare` lists the struct's
/// fields in declaration order; `slot` and `slot_mut` return the field at the
/// same position. Embedded records show up as nested slots and are flattened
/// by the engine.
pub trait Record: Any {
    fn declare() -> Vec<FieldDecl>
    where
        Self: Sized;

    fn slot(&self, index: usize) -> Slot<'_>;

    /// Mutable access to a field. Optional embeddings are allocated with
    /// their `Default` value when reached through this accessor.
    fn slot_mut(&mut self, index: usize) -> SlotMut<'_>;
}

pub enum Slot<'a> {
    Value(&'a dyn FieldValue),
    Nested(&'a dyn Record),
    /// Out of range, or an optional embedding currently holding `None`.
    Absent,
}

pub enum SlotMut<'a> {
    Value(&'a mut dyn FieldValue),
    Nested(&'a mut dyn Record),
    Absent,
}

/// Declaration of one struct field.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: &'static str,
    pub alias: Option<&'static str>,
    pub ignore: bool,
    /// Tagged as the overflow slot regardless of its name.
    pub overflow: bool,
    pub read_only: bool,
    pub kind: DeclKind,
}

#[derive(Debug, Clone, Copy)]
pub enum DeclKind {
    Value {
        type_id: TypeId,
        type_name: &'static str,
        /// Builds a boxed zero value of the field type.
        fresh: fn() -> Box<dyn FieldValue>,
    },
    Embedded {
        type_id: TypeId,
        type_name: &'static str,
        optional: bool,
        declare: fn() -> Vec<FieldDecl>,
    },
}

impl FieldDecl {
    pub fn value<T: FieldValue + Default>(name: &'static str) -> Self {
        Self::with_kind(
            name,
            DeclKind::Value {
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                fresh: fresh::<T>,
            },
        )
    }

    pub fn embedded<R: Record>(name: &'static str, optional: bool) -> Self {
        Self::with_kind(
            name,
            DeclKind::Embedded {
                type_id: TypeId::of::<R>(),
                type_name: std::any::type_name::<R>(),
                optional,
                declare: R::declare,
            },
        )
    }

    fn with_kind(name: &'static str, kind: DeclKind) -> Self {
        Self {
            name,
            alias: None,
            ignore: false,
            overflow: false,
            read_only: false,
            kind,
        }
    }

    pub fn with_alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }

    pub fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }

    pub fn overflow(mut self) -> Self {
        self.overflow = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn type_id(&self) -> TypeId {
        match self.kind {
            DeclKind::Value { type_id, .. } | DeclKind::Embedded { type_id, .. } => type_id,
        }
    }
}

fn fresh<T: FieldValue + Default>() -> Box<dyn FieldValue> {
    Box::new(T::default())
}

/// Follows `path` (one slot index per nesting level) down to a value field.
///
/// `None` when any step is out of range, lands on the wrong kind of slot, or
/// crosses an optional embedding that is currently `None`.
pub fn field_at<'a>(record: &'a dyn Record, path: &[usize]) -> Option<&'a dyn FieldValue> {
    let (&last, prefix) = path.split_last()?;
    let mut current = record;
    for &index in prefix {
        match current.slot(index) {
            Slot::Nested(next) => current = next,
            _ => return None,
        }
    }
    match current.slot(last) {
        Slot::Value(value) => Some(value),
        _ => None,
    }
}

/// Mutable counterpart of [`field_at`]; allocates optional embeddings on the
/// way down.
pub fn field_at_mut<'a>(record: &'a mut dyn Record, path: &[usize]) -> Option<&'a mut dyn FieldValue> {
    let (&last, prefix) = path.split_last()?;
    let mut current = record;
    for &index in prefix {
        match current.slot_mut(index) {
            SlotMut::Nested(next) => current = next,
            _ => return None,
        }
    }
    match current.slot_mut(last) {
        SlotMut::Value(value) => Some(value),
        _ => None,
    }
}

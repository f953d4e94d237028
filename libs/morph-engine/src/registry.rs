//! Scoped converter and validator registries.
//!
//! Registrations are keyed by destination member name at one of three
//! scopes. The current state is an immutable [`Registries`] value behind an
//! `ArcSwap`: readers take one snapshot per adaptation, writers clone it,
//! edit only the scope tables they touch and publish with compare-and-swap.

use std::any::TypeId;
use std::sync::Arc;

use arc_swap::ArcSwap;
use morph_api::converter::{FieldConverter, FieldValidator};
use morph_api::error::ConvertError;
use morph_api::value::Value;
use rustc_hash::FxHashMap as HashMap;

pub type ConverterRef = Arc<dyn FieldConverter>;
pub type ValidatorRef = Arc<dyn FieldValidator>;

/// Where a registration applies. Narrower scopes win: pair, then
/// destination, then global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Destination(TypeId),
    Pair { source: TypeId, destination: TypeId },
}

impl Scope {
    pub fn destination<D: 'static>() -> Self {
        Scope::Destination(TypeId::of::<D>())
    }

    pub fn pair<S: 'static, D: 'static>() -> Self {
        Scope::Pair {
            source: TypeId::of::<S>(),
            destination: TypeId::of::<D>(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Destination(_) => "destination",
            Scope::Pair { .. } => "pair",
        }
    }
}

type FieldTable<F> = HashMap<Box<str>, F>;

/// Immutable registrations of one kind across all scopes.
pub struct Snapshot<F> {
    global: Arc<FieldTable<F>>,
    by_destination: Arc<HashMap<TypeId, Arc<FieldTable<F>>>>,
    by_pair: Arc<HashMap<(TypeId, TypeId), Arc<FieldTable<F>>>>,
}

impl<F> Clone for Snapshot<F> {
    fn clone(&self) -> Self {
        Self {
            global: Arc::clone(&self.global),
            by_destination: Arc::clone(&self.by_destination),
            by_pair: Arc::clone(&self.by_pair),
        }
    }
}

impl<F> Default for Snapshot<F> {
    fn default() -> Self {
        Self {
            global: Arc::default(),
            by_destination: Arc::default(),
            by_pair: Arc::default(),
        }
    }
}

impl<F: Clone> Snapshot<F> {
    /// Effective registration for `field` when adapting `source` into `destination`.
    pub fn resolve(&self, source: TypeId, destination: TypeId, field: &str) -> Option<&F> {
        self.by_pair
            .get(&(source, destination))
            .and_then(|table| table.get(field))
            .or_else(|| self.by_destination.get(&destination).and_then(|table| table.get(field)))
            .or_else(|| self.global.get(field))
    }

    pub fn len(&self) -> usize {
        self.global.len()
            + self.by_destination.values().map(|t| t.len()).sum::<usize>()
            + self.by_pair.values().map(|t| t.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, scope: Scope, field: &str, entry: F) {
        let table = match scope {
            Scope::Global => &mut self.global,
            Scope::Destination(destination) => Arc::make_mut(&mut self.by_destination)
                .entry(destination)
                .or_default(),
            Scope::Pair { source, destination } => Arc::make_mut(&mut self.by_pair)
                .entry((source, destination))
                .or_default(),
        };
        Arc::make_mut(table).insert(field.into(), entry);
    }

    fn remove(&mut self, scope: Scope, field: &str) -> bool {
        match scope {
            Scope::Global => {
                if !self.global.contains_key(field) {
                    return false;
                }
                Arc::make_mut(&mut self.global).remove(field);
            }
            Scope::Destination(destination) => {
                if !self.by_destination.get(&destination).is_some_and(|t| t.contains_key(field)) {
                    return false;
                }
                remove_scoped(Arc::make_mut(&mut self.by_destination), destination, field);
            }
            Scope::Pair { source, destination } => {
                let key = (source, destination);
                if !self.by_pair.get(&key).is_some_and(|t| t.contains_key(field)) {
                    return false;
                }
                remove_scoped(Arc::make_mut(&mut self.by_pair), key, field);
            }
        }
        true
    }
}

fn remove_scoped<K, F>(tables: &mut HashMap<K, Arc<FieldTable<F>>>, key: K, field: &str)
where
    K: std::hash::Hash + Eq,
    F: Clone,
{
    let now_empty = match tables.get_mut(&key) {
        Some(table) => {
            let table = Arc::make_mut(table);
            table.remove(field);
            table.is_empty()
        }
        None => false,
    };
    if now_empty {
        tables.remove(&key);
    }
}

/// Converters and validators published together, so one batch is one swap.
#[derive(Clone, Default)]
pub struct Registries {
    pub converters: Snapshot<ConverterRef>,
    pub validators: Snapshot<ValidatorRef>,
}

pub(crate) struct SharedRegistries {
    current: ArcSwap<Registries>,
}

impl SharedRegistries {
    pub(crate) fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Registries::default()),
        }
    }

    pub(crate) fn load(&self) -> Arc<Registries> {
        self.current.load_full()
    }

    /// Clone-edit-publish. `edit` may run more than once when writers race.
    pub(crate) fn update(&self, mut edit: impl FnMut(&mut Registries)) {
        self.current.rcu(|current| {
            let mut next = Registries::clone(current);
            edit(&mut next);
            next
        });
    }

    pub(crate) fn add_converter(&self, scope: Scope, field: &str, converter: ConverterRef) {
        self.update(|r| r.converters.insert(scope, field, Arc::clone(&converter)));
        tracing::debug!(scope = scope.kind(), field, "converter registered");
    }

    pub(crate) fn add_validator(&self, scope: Scope, field: &str, validator: ValidatorRef) {
        self.update(|r| r.validators.insert(scope, field, Arc::clone(&validator)));
        tracing::debug!(scope = scope.kind(), field, "validator registered");
    }

    pub(crate) fn remove_converter(&self, scope: Scope, field: &str) -> bool {
        let mut removed = false;
        self.update(|r| removed = r.converters.remove(scope, field));
        if removed {
            tracing::debug!(scope = scope.kind(), field, "converter removed");
        }
        removed
    }

    pub(crate) fn remove_validator(&self, scope: Scope, field: &str) -> bool {
        let mut removed = false;
        self.update(|r| removed = r.validators.remove(scope, field));
        if removed {
            tracing::debug!(scope = scope.kind(), field, "validator removed");
        }
        removed
    }

    pub(crate) fn apply(&self, batch: &RegistryBatch) {
        if batch.is_empty() {
            return;
        }
        self.update(|r| batch.apply_to(r));
        tracing::debug!(
            converters = batch.converters.len(),
            validators = batch.validators.len(),
            "registry batch published"
        );
    }
}

/// Registrations collected by [`crate::Adapter::batch`] and published in a
/// single swap.
#[derive(Default)]
pub struct RegistryBatch {
    converters: Vec<(Scope, Box<str>, ConverterRef)>,
    validators: Vec<(Scope, Box<str>, ValidatorRef)>,
}

impl RegistryBatch {
    pub fn converter(
        &mut self,
        scope: Scope,
        field: &str,
        f: impl Fn(Value) -> Result<Option<Value>, ConvertError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.converters.push((scope, field.into(), Arc::new(f)));
        self
    }

    pub fn validator(
        &mut self,
        scope: Scope,
        field: &str,
        f: impl Fn(&Value) -> Result<(), ConvertError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.validators.push((scope, field.into(), Arc::new(f)));
        self
    }

    pub fn global_converter(
        &mut self,
        field: &str,
        f: impl Fn(Value) -> Result<Option<Value>, ConvertError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.converter(Scope::Global, field, f)
    }

    pub fn converter_for<D: 'static>(
        &mut self,
        field: &str,
        f: impl Fn(Value) -> Result<Option<Value>, ConvertError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.converter(Scope::destination::<D>(), field, f)
    }

    pub fn converter_for_pair<S: 'static, D: 'static>(
        &mut self,
        field: &str,
        f: impl Fn(Value) -> Result<Option<Value>, ConvertError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.converter(Scope::pair::<S, D>(), field, f)
    }

    pub fn global_validator(
        &mut self,
        field: &str,
        f: impl Fn(&Value) -> Result<(), ConvertError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.validator(Scope::Global, field, f)
    }

    pub fn validator_for<D: 'static>(
        &mut self,
        field: &str,
        f: impl Fn(&Value) -> Result<(), ConvertError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.validator(Scope::destination::<D>(), field, f)
    }

    pub fn validator_for_pair<S: 'static, D: 'static>(
        &mut self,
        field: &str,
        f: impl Fn(&Value) -> Result<(), ConvertError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.validator(Scope::pair::<S, D>(), field, f)
    }

    pub fn len(&self) -> usize {
        self.converters.len() + self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn apply_to(&self, registries: &mut Registries) {
        for (scope, field, converter) in &self.converters {
            registries.converters.insert(*scope, field, Arc::clone(converter));
        }
        for (scope, field, validator) in &self.validators {
            registries.validators.insert(*scope, field, Arc::clone(validator));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morph_api::converter::converter;
    use serde_json::json;

    type Src = u16;
    type Dst = u32;
    type Other = u64;

    fn constant(text: &'static str) -> ConverterRef {
        converter(move |_| Ok(Some(json!(text))))
    }

    fn run(snapshot: &Snapshot<ConverterRef>, source: TypeId, destination: TypeId) -> Option<Value> {
        let converter = snapshot.resolve(source, destination, "name")?;
        converter.convert(Value::Null).unwrap()
    }

    #[test]
    fn narrower_scope_wins_and_falls_back_on_removal() {
        let shared = SharedRegistries::new();
        shared.add_converter(Scope::Global, "name", constant("global"));
        shared.add_converter(Scope::destination::<Dst>(), "name", constant("destination"));
        shared.add_converter(Scope::pair::<Src, Dst>(), "name", constant("pair"));

        let (src, dst) = (TypeId::of::<Src>(), TypeId::of::<Dst>());
        assert_eq!(run(&shared.load().converters, src, dst), Some(json!("pair")));
        assert_eq!(run(&shared.load().converters, TypeId::of::<Other>(), dst), Some(json!("destination")));
        assert_eq!(run(&shared.load().converters, src, TypeId::of::<Other>()), Some(json!("global")));

        assert!(shared.remove_converter(Scope::pair::<Src, Dst>(), "name"));
        assert_eq!(run(&shared.load().converters, src, dst), Some(json!("destination")));
        assert!(shared.remove_converter(Scope::destination::<Dst>(), "name"));
        assert_eq!(run(&shared.load().converters, src, dst), Some(json!("global")));
        assert!(!shared.remove_converter(Scope::destination::<Dst>(), "name"));
        assert_eq!(shared.load().converters.len(), 1);
    }

    #[test]
    fn published_snapshots_are_immutable() {
        let shared = SharedRegistries::new();
        shared.add_converter(Scope::Global, "name", constant("v1"));
        let before = shared.load();

        shared.add_converter(Scope::destination::<Dst>(), "name", constant("v2"));
        let after = shared.load();

        assert_eq!(before.converters.len(), 1);
        assert_eq!(after.converters.len(), 2);
        // untouched scope tables are shared, not copied
        assert!(Arc::ptr_eq(&before.converters.global, &after.converters.global));
        assert!(Arc::ptr_eq(&before.validators.global, &after.validators.global));
    }

    #[test]
    fn batch_is_one_publish() {
        let shared = SharedRegistries::new();
        let before = shared.load();

        let mut batch = RegistryBatch::default();
        batch
            .global_converter("name", |_| Ok(None))
            .converter_for::<Dst>("age", |v| Ok(Some(v)))
            .converter_for_pair::<Src, Dst>("email", |v| Ok(Some(v)))
            .validator_for::<Dst>("age", |_| Ok(()));
        assert_eq!(batch.len(), 4);
        shared.apply(&batch);

        let after = shared.load();
        assert!(before.converters.is_empty());
        assert_eq!(after.converters.len(), 3);
        assert_eq!(after.validators.len(), 1);
    }

    #[test]
    fn concurrent_writers_keep_every_registration() {
        let shared = SharedRegistries::new();
        std::thread::scope(|s| {
            for writer in 0..8 {
                let shared = &shared;
                s.spawn(move || {
                    for i in 0..50 {
                        let field = format!("f{writer}_{i}");
                        shared.add_converter(Scope::Global, &field, constant("x"));
                    }
                });
            }
        });
        assert_eq!(shared.load().converters.len(), 400);
    }
}

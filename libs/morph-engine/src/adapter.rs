use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use morph_api::error::ConvertError;
use morph_api::record::Record;
use morph_api::value::Value;

use crate::config::AdapterOptions;
use crate::error::AdaptError;
use crate::metadata::{MetadataCache, TypeMetadata};
use crate::overflow;
use crate::registry::{Registries, RegistryBatch, Scope, SharedRegistries};
use crate::resolve::{self, Pass};
use crate::scratch::ScratchPool;

/// Adapts records into records of other types.
///
/// Options are fixed at construction. Converter and validator registrations
/// may change at any time, from any thread; each adaptation sees one
/// consistent snapshot of them.
pub struct Adapter {
    options: AdapterOptions,
    cache: Arc<MetadataCache>,
    registries: SharedRegistries,
    scratch: ScratchPool,
}

impl Default for Adapter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("options", &self.options)
            .field("cached_types", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl Adapter {
    pub fn new() -> Self {
        Self::with_options(AdapterOptions::default())
    }

    pub fn with_options(options: AdapterOptions) -> Self {
        Self::with_cache(options, MetadataCache::shared())
    }

    /// Uses `cache` instead of the process-wide metadata cache.
    pub fn with_cache(options: AdapterOptions, cache: Arc<MetadataCache>) -> Self {
        Self {
            options,
            cache,
            registries: SharedRegistries::new(),
            scratch: ScratchPool::default(),
        }
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    pub fn metadata(&self) -> &MetadataCache {
        &self.cache
    }

    /// Current registrations.
    pub fn registries(&self) -> Arc<Registries> {
        self.registries.load()
    }

    pub fn register_converter(
        &self,
        scope: Scope,
        field: &str,
        f: impl Fn(Value) -> Result<Option<Value>, ConvertError> + Send + Sync + 'static,
    ) {
        self.registries.add_converter(scope, field, Arc::new(f));
    }

    pub fn register_validator(
        &self,
        scope: Scope,
        field: &str,
        f: impl Fn(&Value) -> Result<(), ConvertError> + Send + Sync + 'static,
    ) {
        self.registries.add_validator(scope, field, Arc::new(f));
    }

    /// Drops one converter registration; returns whether it existed.
    pub fn remove_converter(&self, scope: Scope, field: &str) -> bool {
        self.registries.remove_converter(scope, field)
    }

    pub fn remove_validator(&self, scope: Scope, field: &str) -> bool {
        self.registries.remove_validator(scope, field)
    }

    /// Collects registrations and publishes them all at once.
    ///
    /// ```ignore
    /// adapter.batch(|b| {
    ///     b.global_converter("name", map_string(|s| s.trim().to_owned()))
    ///         .validator_for::<PersonRow>("age", |v| check_age(v));
    /// });
    /// ```
    pub fn batch(&self, build: impl FnOnce(&mut RegistryBatch)) {
        let mut batch = RegistryBatch::default();
        build(&mut batch);
        self.registries.apply(&batch);
    }

    /// Builds and caches the metadata of `T`.
    pub fn warm_up<T: Record>(&self) -> Arc<TypeMetadata> {
        self.cache.metadata_for::<T>()
    }

    /// Copies `src` into `dst`.
    ///
    /// On error `dst` may be partially written and should be discarded.
    pub fn adapt<D: Record, S: Record>(&self, dst: &mut D, src: &S) -> Result<(), AdaptError> {
        let destination = self.cache.metadata_for::<D>();
        let source = self.cache.metadata_for::<S>();
        self.run(dst, &destination, src, &source)
    }

    /// Adapts into a fresh `D::default()`.
    pub fn make<D: Record + Default, S: Record>(&self, src: &S) -> Result<D, AdaptError> {
        let mut dst = D::default();
        self.adapt(&mut dst, src)?;
        Ok(dst)
    }

    /// Erased form of [`Adapter::adapt`].
    ///
    /// Both values must be record types already present in the metadata
    /// cache (see [`Adapter::warm_up`]); anything else is an invalid argument.
    pub fn adapt_erased(&self, dst: &mut dyn Any, src: &dyn Any) -> Result<(), AdaptError> {
        let destination = self.known((*dst).type_id(), "destination")?;
        let source = self.known((*src).type_id(), "source")?;

        let dst = destination
            .downcast_mut(dst)
            .ok_or_else(|| AdaptError::InvalidArgument("destination is not a record".into()))?;
        let src = source
            .downcast(src)
            .ok_or_else(|| AdaptError::InvalidArgument("source is not a record".into()))?;
        self.run(dst, &destination, src, &source)
    }

    fn known(&self, type_id: TypeId, role: &str) -> Result<Arc<TypeMetadata>, AdaptError> {
        self.cache
            .get(type_id)
            .ok_or_else(|| AdaptError::InvalidArgument(format!("{role} is not a known record type")))
    }

    fn run(
        &self,
        dst: &mut dyn Record,
        destination: &TypeMetadata,
        src: &dyn Record,
        source: &TypeMetadata,
    ) -> Result<(), AdaptError> {
        tracing::trace!(
            source = source.type_name(),
            destination = destination.type_name(),
            "adapting record"
        );
        let registries = self.registries.load();
        let mut scratch = self.scratch.acquire(source.len(), destination.len());
        let mut pass = Pass {
            options: &self.options,
            registries: &registries,
            source,
            destination,
            scratch: &mut *scratch,
        };

        resolve::adapt_fields(&mut pass, dst, src)?;
        overflow::unmarshal(&mut pass, dst, src).map_err(|e| e.in_stage("unmarshaling"))?;
        overflow::marshal(&pass, dst, src).map_err(|e| e.in_stage("marshaling"))?;
        Ok(())
    }
}

/// Pre-builds the metadata of several record types.
///
/// ```ignore
/// warm_up!(adapter; Person, PersonRow, Address);
/// ```
#[macro_export]
macro_rules! warm_up {
    ($adapter:expr; $($record:ty),+ $(,)?) => {{
        let adapter = &$adapter;
        $( adapter.warm_up::<$record>(); )+
    }};
}

//! Archive registry.
//!
//! Built once from the configuration. Each archive carries its tables,
//! its filter set and a cache of resolved shapes keyed by mode, so a shape
//! is resolved at most once per archive and name.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::config::{ArchiveConfig, MuninnConfig, WRITE_PROFILE};
use crate::error::CoreError;
use crate::filter::FilterSet;
use crate::pagination::PaginationConfig;
use crate::query::MODE_PARAM;
use crate::schema::ArchiveTables;
use crate::shape::{ProductShape, SerializerBase, SerializerProfile};

/// Cache key of the built-in complete shape used for writes.
const COMPLETE_SHAPE: &str = "__complete__";

#[derive(Debug)]
pub struct Archive {
    name: String,
    config: ArchiveConfig,
    tables: ArchiveTables,
    filters: FilterSet,
    shapes: RwLock<HashMap<String, Arc<ProductShape>>>,
}

impl Archive {
    pub fn new(name: &str, config: ArchiveConfig) -> Self {
        Self {
            name: name.to_string(),
            tables: ArchiveTables::new(&config.table_prefix),
            filters: FilterSet::for_archive(&config),
            config,
            shapes: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    pub fn tables(&self) -> &ArchiveTables {
        &self.tables
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn root(&self) -> Option<&Path> {
        self.config.root.as_deref()
    }

    pub fn read_only(&self) -> bool {
        self.config.read_only
    }

    /// Mode names clients may pass as `mode`.
    pub fn modes(&self) -> impl Iterator<Item = &str> {
        self.config.serializers.keys().map(String::as_str)
    }

    /// Shape for the given read mode.
    pub fn shape(&self, mode: &str) -> Result<Arc<ProductShape>, CoreError> {
        let profile = self.config.serializers.get(mode).ok_or_else(|| {
            tracing::debug!(archive = %self.name, mode, "Unknown serializer mode");
            CoreError::BadRequest(format!(
                "Invalid value for query param \"{MODE_PARAM}\": \"{mode}\""
            ))
        })?;
        Ok(self.cached(mode, || {
            ProductShape::build(&self.name, &self.config, mode, profile)
        }))
    }

    /// Shape used by every non-GET request: the `write` profile when
    /// configured, the complete shape otherwise.
    pub fn write_shape(&self) -> Arc<ProductShape> {
        match self.config.serializers.get(WRITE_PROFILE) {
            Some(profile) => self.cached(WRITE_PROFILE, || {
                ProductShape::build(&self.name, &self.config, WRITE_PROFILE, profile)
            }),
            None => self.cached(COMPLETE_SHAPE, || {
                ProductShape::build(
                    &self.name,
                    &self.config,
                    COMPLETE_SHAPE,
                    &SerializerProfile::of(SerializerBase::Complete),
                )
            }),
        }
    }

    fn cached(&self, key: &str, build: impl FnOnce() -> ProductShape) -> Arc<ProductShape> {
        {
            let shapes = self.shapes.read().unwrap_or_else(|e| e.into_inner());
            if let Some(shape) = shapes.get(key) {
                return Arc::clone(shape);
            }
        }

        let built = Arc::new(build());
        let mut shapes = self.shapes.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(shapes.entry(key.to_string()).or_insert(built))
    }
}

/// All configured archives by name.
#[derive(Debug)]
pub struct ArchiveRegistry {
    archives: BTreeMap<String, Arc<Archive>>,
    pagination: PaginationConfig,
}

impl ArchiveRegistry {
    pub fn from_config(config: MuninnConfig) -> Self {
        let archives = config
            .archives
            .into_iter()
            .map(|(name, archive)| {
                let built = Arc::new(Archive::new(&name, archive));
                (name, built)
            })
            .collect();

        Self {
            archives,
            pagination: config.pagination,
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Archive>> {
        self.archives.get(name).cloned()
    }

    pub fn archives(&self) -> impl Iterator<Item = &Arc<Archive>> {
        self.archives.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.archives.keys().map(String::as_str)
    }

    pub fn pagination(&self) -> &PaginationConfig {
        &self.pagination
    }
}

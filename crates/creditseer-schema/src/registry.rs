//! Schema registry: lookup by `(ChunkType, ExtractionStage)`

use crate::builtin::BUILTIN_SCHEMAS;
use crate::error::SchemaError;
use crate::types::{Schema, Stage1Schema, Stage2Schema};
use creditseer_domain::{ChunkType, ExtractionStage};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Result of resolving a chunk type and stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchemaRef<'a> {
    /// The Stage 1 schema for the chunk type
    Stage1(&'a Stage1Schema),
    /// The Stage 2 schema for the chunk type
    Stage2(&'a Stage2Schema),
    /// The chunk type has no Stage 2 schema; Stage 2 skips it
    NoStage2,
}

/// One loaded schema, for listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaEntry {
    /// Chunk type
    pub chunk_type: ChunkType,
    /// Stage
    pub stage: ExtractionStage,
    /// Schema identifier
    pub schema_id: String,
    /// Schema version
    pub version: String,
}

/// Index of extraction schemas
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    stage1: HashMap<ChunkType, Stage1Schema>,
    stage2: HashMap<ChunkType, Stage2Schema>,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of the schemas compiled into this crate, validated complete
    pub fn builtin() -> Result<Self, SchemaError> {
        let registry = Self::from_json_strs(
            BUILTIN_SCHEMAS
                .iter()
                .map(|(name, json)| (name.to_string(), json.to_string())),
        )?;
        registry.validate_complete()?;
        Ok(registry)
    }

    /// Load every `*.json` file in `dir`, validated complete
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let dir = dir.as_ref();
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| SchemaError::Io { path, source }
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err(dir))? {
            let path = entry.map_err(io_err(dir))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let json = std::fs::read_to_string(&path).map_err(io_err(&path))?;
            documents.push((path.display().to_string(), json));
        }

        let registry = Self::from_json_strs(documents)?;
        registry.validate_complete()?;
        info!(
            "Loaded {} schemas from {}",
            registry.len(),
            dir.display()
        );
        Ok(registry)
    }

    /// Build a registry from `(origin, json)` documents
    ///
    /// Cross-stage consistency is checked, completeness is not: call
    /// [`validate_complete`](Self::validate_complete) when every chunk type
    /// must be covered.
    pub fn from_json_strs<I>(documents: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut registry = Self::new();
        for (origin, json) in documents {
            registry.register(Schema::from_json(&origin, &json)?)?;
        }
        registry.check_stage2_value_types()?;
        Ok(registry)
    }

    /// Add one schema, rejecting a second schema for the same key
    pub fn register(&mut self, schema: Schema) -> Result<(), SchemaError> {
        let chunk_type = schema.chunk_type();
        let stage = schema.stage();
        let existing = match stage {
            ExtractionStage::Stage1 => self.stage1.get(&chunk_type).map(|s| s.schema_id.clone()),
            ExtractionStage::Stage2 => self.stage2.get(&chunk_type).map(|s| s.schema_id.clone()),
        };
        if let Some(first) = existing {
            return Err(SchemaError::Duplicate {
                chunk_type,
                stage,
                first,
                second: schema.schema_id().to_string(),
            });
        }

        debug!("Registered schema {} for {} {}", schema.schema_id(), chunk_type, stage);
        match schema {
            Schema::Stage1(s) => {
                self.stage1.insert(chunk_type, s);
            }
            Schema::Stage2(s) => {
                self.stage2.insert(chunk_type, s);
            }
        }
        Ok(())
    }

    /// Check that every chunk type has a Stage 1 schema
    pub fn validate_complete(&self) -> Result<(), SchemaError> {
        let missing: Vec<ChunkType> = ChunkType::ALL
            .iter()
            .copied()
            .filter(|t| !self.stage1.contains_key(t))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Incomplete(missing))
        }
    }

    /// Resolve the schema for a chunk type and stage
    pub fn resolve(
        &self,
        chunk_type: ChunkType,
        stage: ExtractionStage,
    ) -> Result<SchemaRef<'_>, SchemaError> {
        match stage {
            ExtractionStage::Stage1 => self.stage1(chunk_type).map(SchemaRef::Stage1),
            ExtractionStage::Stage2 => Ok(self
                .stage2(chunk_type)
                .map_or(SchemaRef::NoStage2, SchemaRef::Stage2)),
        }
    }

    /// The Stage 1 schema for a chunk type
    pub fn stage1(&self, chunk_type: ChunkType) -> Result<&Stage1Schema, SchemaError> {
        self.stage1
            .get(&chunk_type)
            .ok_or(SchemaError::MissingStage1(chunk_type))
    }

    /// The Stage 2 schema for a chunk type, if any
    pub fn stage2(&self, chunk_type: ChunkType) -> Option<&Stage2Schema> {
        self.stage2.get(&chunk_type)
    }

    /// Every loaded schema, ordered by chunk type then stage
    pub fn entries(&self) -> Vec<SchemaEntry> {
        let mut entries: Vec<SchemaEntry> = self
            .stage1
            .values()
            .map(|s| SchemaEntry {
                chunk_type: s.chunk_type,
                stage: ExtractionStage::Stage1,
                schema_id: s.schema_id.clone(),
                version: s.version.clone(),
            })
            .chain(self.stage2.values().map(|s| SchemaEntry {
                chunk_type: s.chunk_type,
                stage: ExtractionStage::Stage2,
                schema_id: s.schema_id.clone(),
                version: s.version.clone(),
            }))
            .collect();
        entries.sort_by_key(|e| (e.chunk_type, e.stage));
        entries
    }

    /// Number of loaded schemas
    pub fn len(&self) -> usize {
        self.stage1.len() + self.stage2.len()
    }

    /// Whether no schema is loaded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_stage2_value_types(&self) -> Result<(), SchemaError> {
        for (chunk_type, s2) in &self.stage2 {
            let s1 = self.stage1(*chunk_type).map_err(|_| SchemaError::Invalid {
                schema_id: s2.schema_id.clone(),
                reason: format!("no stage 1 schema for chunk type '{}'", chunk_type),
            })?;
            for value_type in s2.schemas_by_value_type.keys() {
                if !s1.declares_value_type(value_type) {
                    return Err(SchemaError::Invalid {
                        schema_id: s2.schema_id.clone(),
                        reason: format!(
                            "value type '{}' is not declared by stage 1 schema {}",
                            value_type, s1.schema_id
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

use crate::core::value::Value;
use std::{collections::HashMap, fmt, sync::Arc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("No column mapping registered for label '{label}', table '{table}'")]
    NotFound { label: String, table: String },

    #[error("Column mapping for label '{label}', table '{table}' resolved to an empty column list")]
    EmptyColumns { label: String, table: String },
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Record is missing mapped field '{field}'")]
    MissingField { field: String },
}

impl AccessError {
    pub fn missing(field: &str) -> Self {
        AccessError::MissingField {
            field: field.to_string(),
        }
    }
}

/// Identifies one resolved column mapping: which mapping variant to use
/// (label), against which connection target, for which table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappingKey {
    pub label: String,
    pub target: String,
    pub table: String,
}

impl MappingKey {
    pub fn new(label: &str, target: &str, table: &str) -> Self {
        Self {
            label: label.to_string(),
            target: target.to_string(),
            table: table.to_string(),
        }
    }
}

/// One (source field -> destination column) pairing, as registered on a
/// transfer session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPair {
    pub source_field: String,
    pub column: String,
}

type Accessor<T> = Arc<dyn Fn(&T) -> Result<Value, AccessError> + Send + Sync>;

/// Binds one record field to one destination column through a typed
/// extraction function resolved at construction time.
pub struct ColumnBinding<T> {
    source_field: String,
    column: String,
    accessor: Accessor<T>,
}

impl<T> ColumnBinding<T> {
    pub fn new(
        source_field: &str,
        column: &str,
        accessor: impl Fn(&T) -> Result<Value, AccessError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            source_field: source_field.to_string(),
            column: column.to_string(),
            accessor: Arc::new(accessor),
        }
    }

    /// Binding whose extraction cannot fail (the field always exists).
    pub fn infallible(
        source_field: &str,
        column: &str,
        accessor: impl Fn(&T) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self::new(source_field, column, move |record| Ok(accessor(record)))
    }

    pub fn pair(&self) -> ColumnPair {
        ColumnPair {
            source_field: self.source_field.clone(),
            column: self.column.clone(),
        }
    }
}

impl<T> Clone for ColumnBinding<T> {
    fn clone(&self) -> Self {
        Self {
            source_field: self.source_field.clone(),
            column: self.column.clone(),
            accessor: Arc::clone(&self.accessor),
        }
    }
}

impl<T> fmt::Debug for ColumnBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnBinding")
            .field("source_field", &self.source_field)
            .field("column", &self.column)
            .finish()
    }
}

/// Ordered accessor table for one destination table: column index ->
/// typed extraction function. Read-only after construction.
#[derive(Debug)]
pub struct AccessorTable<T> {
    bindings: Vec<ColumnBinding<T>>,
}

impl<T> AccessorTable<T> {
    pub fn new(bindings: Vec<ColumnBinding<T>>) -> Self {
        Self { bindings }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The (source field -> destination column) pairings, in destination
    /// column order, independent of row iteration.
    pub fn column_pairs(&self) -> Vec<ColumnPair> {
        self.bindings.iter().map(|b| b.pair()).collect()
    }

    /// Extracts one row from a record, values in destination column order.
    pub fn read_row(&self, record: &T) -> Result<Vec<Value>, AccessError> {
        self.bindings
            .iter()
            .map(|b| (b.accessor)(record))
            .collect()
    }
}

impl<T> Clone for AccessorTable<T> {
    fn clone(&self) -> Self {
        Self {
            bindings: self.bindings.clone(),
        }
    }
}

/// Resolves the column mapping for a (label, target, table) triple.
/// Called exactly once per stage instance, at construction.
pub trait MappingProvider<T>: Send + Sync {
    fn resolve(&self, key: &MappingKey) -> Result<AccessorTable<T>, MappingError>;
}

/// Mapping provider backed by an in-memory registry.
pub struct StaticMappingProvider<T> {
    tables: HashMap<MappingKey, AccessorTable<T>>,
}

impl<T> Default for StaticMappingProvider<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StaticMappingProvider<T> {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    pub fn register(mut self, key: MappingKey, table: AccessorTable<T>) -> Self {
        self.tables.insert(key, table);
        self
    }
}

impl<T: Send + Sync> MappingProvider<T> for StaticMappingProvider<T> {
    fn resolve(&self, key: &MappingKey) -> Result<AccessorTable<T>, MappingError> {
        self.tables
            .get(key)
            .cloned()
            .ok_or_else(|| MappingError::NotFound {
                label: key.label.clone(),
                table: key.table.clone(),
            })
    }
}

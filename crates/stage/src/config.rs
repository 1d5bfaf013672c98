use crate::error::ConfigError;
use model::mapping::MappingKey;

pub const DEFAULT_BULK_SIZE: usize = 8192;

/// Configuration for one bulk-insert stage instance.
#[derive(Clone, Debug)]
pub struct StageConfig {
    /// How many records accumulate before a batch is flushed downstream.
    pub bulk_size: usize,

    /// Destination table the stage streams into.
    pub destination_table: String,

    /// Which registered column mapping to use.
    pub destination_label: String,

    /// Connection target url for the destination.
    pub connection_target: String,

    /// Optional stage name; falls back to a table-derived default.
    pub stage_name: Option<String>,
}

impl StageConfig {
    pub fn new(destination_table: &str, destination_label: &str, connection_target: &str) -> Self {
        Self {
            bulk_size: DEFAULT_BULK_SIZE,
            destination_table: destination_table.to_string(),
            destination_label: destination_label.to_string(),
            connection_target: connection_target.to_string(),
            stage_name: None,
        }
    }

    pub fn with_bulk_size(mut self, bulk_size: usize) -> Self {
        self.bulk_size = bulk_size;
        self
    }

    pub fn with_stage_name(mut self, name: &str) -> Self {
        self.stage_name = Some(name.to_string());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bulk_size == 0 {
            return Err(ConfigError::ZeroBulkSize);
        }
        if self.destination_table.is_empty() {
            return Err(ConfigError::EmptyTable);
        }
        if self.connection_target.is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        Ok(())
    }

    /// The configured name, or the table-derived default.
    pub fn resolved_name(&self) -> String {
        self.stage_name
            .clone()
            .unwrap_or_else(|| format!("bulk-insert-{}", self.destination_table))
    }

    /// The triple the mapping provider is keyed by.
    pub fn mapping_key(&self) -> MappingKey {
        MappingKey::new(
            &self.destination_label,
            &self.connection_target,
            &self.destination_table,
        )
    }
}

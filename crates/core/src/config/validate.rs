use super::{types::Config, ConfigError};
use crate::ingest::is_valid_table_name;

/// Validate configuration
/// Currently validates:
/// - Rate limit, timeout and batch size are non-zero
/// - Debug processing limit is non-zero
/// - Store table is a plain identifier and the source tag is set
/// - Queue name is set
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.source.requests_per_second == 0 {
        return Err(ConfigError::ValidationError(
            "source.requests_per_second cannot be 0".to_string(),
        ));
    }

    if config.source.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "source.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.pipeline.batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.batch_size cannot be 0".to_string(),
        ));
    }

    if config.pipeline.debug_processing_limit == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.debug_processing_limit cannot be 0".to_string(),
        ));
    }

    if !is_valid_table_name(&config.store.table) {
        return Err(ConfigError::ValidationError(format!(
            "store.table '{}' is not a valid table name",
            config.store.table
        )));
    }

    if config.store.source_tag.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "store.source_tag cannot be empty".to_string(),
        ));
    }

    if config.queue.name.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "queue.name cannot be empty".to_string(),
        ));
    }

    Ok(())
}

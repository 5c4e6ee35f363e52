use super::{types::Config, ConfigError};

/// Validate configuration
/// Rejects:
/// - zero batch size, write concurrency, interval or poll interval
/// - a locked suffix that is empty or does not start with `.`
/// - a file pattern that does not compile
/// - identical source and archive directories
/// - HTTP port 0 when the HTTP surface is enabled
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.pipeline.batch_size == 0 {
        return Err(invalid("pipeline.batch_size must be greater than 0"));
    }
    if config.pipeline.write_concurrency == 0 {
        return Err(invalid("pipeline.write_concurrency must be greater than 0"));
    }
    if config.scheduler.interval_secs == 0 {
        return Err(invalid("scheduler.interval_secs must be greater than 0"));
    }
    if config.scheduler.poll_interval_secs == 0 {
        return Err(invalid("scheduler.poll_interval_secs must be greater than 0"));
    }

    let suffix = &config.files.locked_suffix;
    if suffix.len() < 2 || !suffix.starts_with('.') {
        return Err(invalid("files.locked_suffix must start with '.' and name an extension"));
    }
    if let Err(e) = regex_lite::Regex::new(&config.files.file_pattern) {
        return Err(ConfigError::ValidationError(format!(
            "files.file_pattern is not a valid regular expression: {e}"
        )));
    }
    if config.files.source_dir == config.files.archive_dir {
        return Err(invalid("files.source_dir and files.archive_dir must differ"));
    }

    if config.http.enabled && config.http.port == 0 {
        return Err(invalid("http.port cannot be 0"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

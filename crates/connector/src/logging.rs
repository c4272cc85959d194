//! Global `tracing` subscriber initialization (`tracing-subscriber`
//! env-filter + fmt). One process-wide subscriber installed by the
//! supervisor; everything else uses the ambient dispatcher.

use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Builds the filter from `config.log_level` (a bare level, e.g. `info`,
/// applies to every target) and writes to the configured log file if one
/// is set, otherwise stderr. File output has no size-based rotation here —
/// `log_file_max_megabytes`/`log_max_files` are accepted and validated as
/// configuration but a rotating writer would need a crate this workspace
/// does not otherwise pull in.
pub fn init(config: &Config) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.log_level)
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("the \"info\" fallback filter is always valid");

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match &config.log_file_name {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            builder.with_writer(std::sync::Mutex::new(file)).init();
        }
        None => builder.init(),
    }

    Ok(())
}

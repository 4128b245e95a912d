use crate::config::Config;
use log::{info, LevelFilter, SetLoggerError};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// HTTP stack modules muted below Trace. Matching is by module path prefix,
/// so none of these may prefix a relay crate name.
const HTTP_STACK_MODULES: &[&str] = &["tower", "tower_http", "tracing", "hyper", "h2", "axum"];

pub struct Logger {}

impl Logger {
    /// Installs the global terminal logger at the configured level.
    ///
    /// Trace shows everything, including the HTTP stack underneath every
    /// subscriber stream. Colors are off in production so log collectors get
    /// plain text.
    pub fn init_logger(config: &Config) -> Result<(), SetLoggerError> {
        let muted = Self::muted_modules(config.log_level_filter);
        let color_choice = if config.is_production() {
            ColorChoice::Never
        } else {
            ColorChoice::Auto
        };

        TermLogger::init(
            config.log_level_filter,
            Self::build_log_config(muted),
            TerminalMode::Mixed,
            color_choice,
        )?;

        info!(
            "Logging at {} ({} environment), {} dependency module(s) muted",
            config.log_level_filter,
            config.runtime_env(),
            muted.len()
        );
        Ok(())
    }

    fn muted_modules(level: LevelFilter) -> &'static [&'static str] {
        if level == LevelFilter::Trace {
            &[]
        } else {
            HTTP_STACK_MODULES
        }
    }

    fn build_log_config(muted: &[&'static str]) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();

        for module in muted {
            builder.add_filter_ignore_str(module);
        }

        builder.build()
    }
}

use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// Terminal logger for binaries and demos. Library code only uses the `log` macros.
/// A second call keeps the logger that is already installed.
pub fn init_logging(level: LevelFilter) {
    let config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Error)
        .set_location_level(LevelFilter::Off)
        .build();
    if TermLogger::init(level, config, TerminalMode::Mixed, ColorChoice::Auto).is_err() {
        log::debug!("logger already initialized");
    }
}

use ThermoReact::Examples::thermo_examples::thermo_examples;
use ThermoReact::Utils::logging::init_logging;
use ThermoReact::settings::{SETTINGS_FILE, ThermoSettings};

pub fn main() {
    let level = ThermoSettings::from_file(SETTINGS_FILE)
        .map(|s| s.log_level_filter())
        .unwrap_or(log::LevelFilter::Info);
    init_logging(level);
    let task: usize = std::env::args()
        .nth(1)
        .and_then(|a| a.parse().ok())
        .unwrap_or(1);
    thermo_examples(task);
}

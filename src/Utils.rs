/// reading of datasets and requests from JSON files
pub mod load_from_file;
pub mod logging;

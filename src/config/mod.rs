mod types;

pub use types::{config_from_vars, load_config, Config};

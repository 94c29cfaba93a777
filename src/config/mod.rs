pub mod settings;

pub use settings::{
    generate_default_config, AllocationSettings, CatalogSettings, LoggingSettings, Settings,
};

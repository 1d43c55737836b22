pub mod schema;

pub use schema::{
    ConcurrencyConfig, Config, SharedTierConfig, StoreConfig, SweepConfig, ThresholdsConfig,
};

pub mod prediction_store;

pub use prediction_store::{PredictionStore, StoreGuard};

pub mod config;
pub mod inference_config;
pub mod model_metadata;
pub mod model_storage;

pub use config::{AppConfig, DeviceType, ModelSettings, StorageSettings, SyncSettings, CONFIG_ENV_VAR};
pub use inference_config::InferenceConfig;
pub use model_metadata::ModelMetadata;
pub use model_storage::{load_metadata, load_model_with_metadata, print_metadata_info, save_model_with_metadata};

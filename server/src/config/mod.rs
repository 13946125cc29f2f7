pub mod mongo_config;
pub mod settings;

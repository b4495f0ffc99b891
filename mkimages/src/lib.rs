pub mod alias;
pub mod backend;
pub mod config;
pub mod dockerfile;
pub mod engine;
pub mod matrix;
pub mod os;
pub mod pipeline;
pub mod process;
pub mod registry;
pub mod target;
pub(crate) mod temp_path;
pub(crate) mod version;

pub mod cli;

pub(crate) type Result<T, E = Box<dyn std::error::Error + Send + Sync + 'static>> =
    std::result::Result<T, E>;

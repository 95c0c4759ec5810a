pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod resources;
pub mod roles;
pub mod session;
pub mod types;

pub use app::App;
pub use error::{ClientError, ClientResult};

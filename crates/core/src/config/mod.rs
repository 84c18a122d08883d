pub mod app_config;
pub mod credentials;
pub mod sources;
pub mod validation;

pub use app_config::*;
pub use credentials::*;
pub use sources::*;
pub use validation::*;

pub mod error;
pub mod model;

pub use error::UnetError;
pub use model::Unet;
pub use model::UnetConfig;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

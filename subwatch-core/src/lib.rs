pub mod error;
pub mod error_utils;
pub mod prompt;
pub mod settings;
pub mod types;

pub use error::*;
pub use error_utils::*;
pub use prompt::*;
pub use settings::*;
pub use types::*;

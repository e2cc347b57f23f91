pub mod errors;
pub mod id;

pub use errors::{ConfigError, DuetError};
pub use id::{new_id, MatchId};

pub type Result<T> = std::result::Result<T, DuetError>;

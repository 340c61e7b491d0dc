pub mod config;
pub mod error;
pub mod lesson;
pub mod serie;
pub mod tracking;
pub mod upload;
pub mod user;

pub use config::*;
pub use error::*;
pub use lesson::*;
pub use serie::*;
pub use tracking::*;
pub use upload::*;
pub use user::*;

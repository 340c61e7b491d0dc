pub mod cache;
pub mod lessons;
pub mod migrations;
pub mod platform;
pub mod series;
pub mod store;
pub mod tracking;
pub mod users;

pub use cache::*;
pub use migrations::*;
pub use platform::*;
pub use store::*;
pub use tracking::*;
pub use users::*;

pub mod lessons;
pub mod series;
pub mod system;
pub mod tracking;
pub mod users;

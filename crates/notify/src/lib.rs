//! Series announcements: notification topics and batched mail delivery.

pub mod mailer;
pub mod template;
pub mod topic;

pub use mailer::*;
pub use template::*;
pub use topic::*;

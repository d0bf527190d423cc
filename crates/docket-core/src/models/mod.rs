pub mod category;
pub mod counts;
pub mod item;

pub use category::{NotificationCategory, UnknownCategory};
pub use counts::NotificationCounts;
pub use item::{ItemStatus, NotificationItem};

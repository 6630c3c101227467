mod broker;
mod model;

pub use broker::{NotificationBroker, TaskHandle};
pub use model::{
    Notification, NotificationAction, NotificationKind, ProgressUpdate, Severity,
};

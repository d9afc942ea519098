mod email;
mod pg;

pub use email::EmailNotificationSender;
pub use pg::{PgSubscriptionLookup, PgWorkflowStore};

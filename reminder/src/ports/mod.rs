pub mod clock;
pub mod lookup;
pub mod sender;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use lookup::SubscriptionLookup;
pub use sender::NotificationSender;
pub use store::WorkflowStore;

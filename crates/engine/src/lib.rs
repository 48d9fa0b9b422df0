pub mod channel;
pub mod clock;
pub mod directory;
pub mod dispatch;
pub mod pool;
pub mod retention;
pub mod retry;
pub mod scheduled;
pub mod scheduler;
pub mod service;
pub mod stats;
pub mod store;
pub mod store_postgres;
pub mod sweeper;
pub mod validation;

pub use dispatch::{DispatchEngine, NotificationRequest};
pub use service::NotificationService;
pub use sweeper::SweepReport;

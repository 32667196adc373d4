// Weekly meal orders, visible to their owner only

pub mod handlers;
pub mod models;
pub mod repository;

pub use handlers::*;
pub use models::{NewWeeklyOrder, WeeklyOrder, WeeklyOrderResponse};
pub use repository::{PgWeeklyOrderRepository, WeeklyOrderRepository};

use axum::async_trait;
use sqlx::PgPool;

use crate::error::ApiError;
use crate::orders::models::{NewWeeklyOrder, WeeklyOrder};

/// Persistence contract for weekly orders
#[async_trait]
pub trait WeeklyOrderRepository: Send + Sync {
    async fn create(&self, user_id: i32, order: NewWeeklyOrder) -> Result<WeeklyOrder, ApiError>;
    /// Orders owned by `user_id` only
    async fn list_by_user(&self, user_id: i32) -> Result<Vec<WeeklyOrder>, ApiError>;
}

/// Repository for weekly order operations
#[derive(Clone)]
pub struct PgWeeklyOrderRepository {
    pool: PgPool,
}

impl PgWeeklyOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WeeklyOrderRepository for PgWeeklyOrderRepository {
    async fn create(&self, user_id: i32, order: NewWeeklyOrder) -> Result<WeeklyOrder, ApiError> {
        let order = sqlx::query_as::<_, WeeklyOrder>(
            r#"
            INSERT INTO weekly_orders (user_id, week, meal, date)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, week, meal, date
            "#,
        )
        .bind(user_id)
        .bind(&order.week)
        .bind(&order.meal)
        .bind(order.date)
        .fetch_one(&self.pool)
        .await?;

        Ok(order)
    }

    async fn list_by_user(&self, user_id: i32) -> Result<Vec<WeeklyOrder>, ApiError> {
        let orders = sqlx::query_as::<_, WeeklyOrder>(
            r#"
            SELECT id, user_id, week, meal, date
            FROM weekly_orders
            WHERE user_id = $1
            ORDER BY date, id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }
}

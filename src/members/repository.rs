use axum::async_trait;
use sqlx::PgPool;

use crate::error::ApiError;
use crate::members::models::{Member, MemberInput};

const MEMBER_COLUMNS: &str = "id, full_name, email, phone, birth_date, join_date, gender";

/// Persistence contract for Member records
#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// Every member, ordered by id
    async fn list(&self) -> Result<Vec<Member>, ApiError>;
    async fn find_by_id(&self, id: i32) -> Result<Option<Member>, ApiError>;
    /// Whether another member already uses `email`
    async fn email_taken(&self, email: &str, exclude_id: Option<i32>) -> Result<bool, ApiError>;
    async fn create(&self, input: MemberInput) -> Result<Member, ApiError>;
    async fn update(&self, id: i32, input: MemberInput) -> Result<Option<Member>, ApiError>;
    /// Remove a member, returning the deleted row
    async fn delete(&self, id: i32) -> Result<Option<Member>, ApiError>;
}

#[derive(Clone)]
pub struct PgMemberRepository {
    pool: PgPool,
}

impl PgMemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn duplicate_email(e: sqlx::Error) -> ApiError {
    ApiError::from_unique_violation(e, "A member with this email already exists")
}

#[async_trait]
impl MemberRepository for PgMemberRepository {
    async fn list(&self) -> Result<Vec<Member>, ApiError> {
        let members = sqlx::query_as::<_, Member>(&format!(
            "SELECT {} FROM members ORDER BY id",
            MEMBER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Member>, ApiError> {
        let member = sqlx::query_as::<_, Member>(&format!(
            "SELECT {} FROM members WHERE id = $1",
            MEMBER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }

    async fn email_taken(&self, email: &str, exclude_id: Option<i32>) -> Result<bool, ApiError> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM members WHERE email = $1 AND ($2::int IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    async fn create(&self, input: MemberInput) -> Result<Member, ApiError> {
        sqlx::query_as::<_, Member>(&format!(
            r#"
            INSERT INTO members (full_name, email, phone, birth_date, gender, join_date)
            VALUES ($1, $2, $3, $4, $5, CURRENT_DATE)
            RETURNING {}
            "#,
            MEMBER_COLUMNS
        ))
        .bind(&input.full_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(input.birth_date)
        .bind(&input.gender)
        .fetch_one(&self.pool)
        .await
        .map_err(duplicate_email)
    }

    async fn update(&self, id: i32, input: MemberInput) -> Result<Option<Member>, ApiError> {
        sqlx::query_as::<_, Member>(&format!(
            r#"
            UPDATE members
            SET full_name = $2, email = $3, phone = $4, birth_date = $5, gender = $6
            WHERE id = $1
            RETURNING {}
            "#,
            MEMBER_COLUMNS
        ))
        .bind(id)
        .bind(&input.full_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(input.birth_date)
        .bind(&input.gender)
        .fetch_optional(&self.pool)
        .await
        .map_err(duplicate_email)
    }

    async fn delete(&self, id: i32) -> Result<Option<Member>, ApiError> {
        let member = sqlx::query_as::<_, Member>(&format!(
            "DELETE FROM members WHERE id = $1 RETURNING {}",
            MEMBER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_test_pool, unique_suffix};

    fn input() -> MemberInput {
        MemberInput {
            full_name: "Jane Doe".to_string(),
            email: format!("member_{}@example.com", unique_suffix()),
            phone: Some("+1 555 0100".to_string()),
            birth_date: chrono::NaiveDate::from_ymd_opt(1990, 5, 17),
            gender: Some("female".to_string()),
        }
    }

    #[tokio::test]
    #[ignore = "needs a Postgres database at TEST_DATABASE_URL"]
    async fn test_member_lifecycle() {
        let repo = PgMemberRepository::new(create_test_pool().await);
        let created = repo.create(input()).await.unwrap();
        assert!(created.join_date.is_some());
        assert_eq!(created.phone.as_deref(), Some("+1 555 0100"));

        let second = repo.create(input()).await.unwrap();
        let ids: Vec<i32> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .filter(|id| *id == created.id || *id == second.id)
            .collect();
        assert_eq!(ids, vec![created.id, second.id]);

        let mut replacement = input();
        replacement.full_name = "Jane Smith".to_string();
        replacement.phone = None;
        let updated = repo.update(created.id, replacement).await.unwrap().unwrap();
        assert_eq!(updated.full_name, "Jane Smith");
        assert_eq!(updated.phone, None);
        assert_eq!(updated.join_date, created.join_date);

        let deleted = repo.delete(created.id).await.unwrap().unwrap();
        assert_eq!(deleted.id, created.id);
        assert!(repo.find_by_id(created.id).await.unwrap().is_none());
        assert!(repo.delete(created.id).await.unwrap().is_none());
        assert!(repo.update(created.id, input()).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "needs a Postgres database at TEST_DATABASE_URL"]
    async fn test_email_taken_excludes_the_member_itself() {
        let repo = PgMemberRepository::new(create_test_pool().await);
        let member = repo.create(input()).await.unwrap();

        assert!(repo.email_taken(&member.email, None).await.unwrap());
        assert!(!repo.email_taken(&member.email, Some(member.id)).await.unwrap());
        assert!(!repo
            .email_taken(&format!("free_{}@example.com", unique_suffix()), None)
            .await
            .unwrap());
    }

    #[tokio::test]
    #[ignore = "needs a Postgres database at TEST_DATABASE_URL"]
    async fn test_duplicate_email_is_a_conflict() {
        let repo = PgMemberRepository::new(create_test_pool().await);
        let member = repo.create(input()).await.unwrap();

        let mut duplicate = input();
        duplicate.email = member.email.clone();
        assert!(matches!(
            repo.create(duplicate).await,
            Err(ApiError::Conflict { .. })
        ));

        let other = repo.create(input()).await.unwrap();
        let mut clash = input();
        clash.email = member.email.clone();
        assert!(matches!(
            repo.update(other.id, clash).await,
            Err(ApiError::Conflict { .. })
        ));
    }
}

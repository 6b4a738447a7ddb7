use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::consts::DEFAULT_CALLER_ID;
use crate::db_types::{Call, User, Voice};
use crate::error::ApiError;

/// Persistence seam for the call-placement and voice-sync flows.  The pool is
/// the production implementation; tests substitute an in-memory store with
/// the same conditional-debit and upsert-by-name contracts.
#[async_trait]
pub trait Store {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, ApiError>;
    /// Debits one credit only while the balance is still positive; returns
    /// whether a debit happened.
    async fn debit_balance(&self, user_id: Uuid) -> Result<bool, ApiError>;
    async fn insert_call(&self, user_id: Uuid, record_url: &str) -> Result<(), ApiError>;
    async fn find_call(&self, id: Uuid) -> Result<Option<Call>, ApiError>;
    async fn upsert_voice(&self, name: &str, description: Option<&str>) -> Result<(), ApiError>;
    async fn list_voices(&self) -> Result<Vec<Voice>, ApiError>;
}

#[async_trait]
impl Store for Pool<Postgres> {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        find_user(self, id).await
    }

    async fn debit_balance(&self, user_id: Uuid) -> Result<bool, ApiError> {
        debit_balance(self, user_id).await
    }

    async fn insert_call(&self, user_id: Uuid, record_url: &str) -> Result<(), ApiError> {
        insert_call(self, user_id, record_url).await.map(|_| ())
    }

    async fn find_call(&self, id: Uuid) -> Result<Option<Call>, ApiError> {
        find_call(self, id).await
    }

    async fn upsert_voice(&self, name: &str, description: Option<&str>) -> Result<(), ApiError> {
        upsert_voice(self, name, description).await
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, ApiError> {
        list_voices(self).await
    }
}

pub struct NewUser {
    pub name: String,
    pub email: String,
    // Already hashed by the caller.
    pub password: String,
    pub balance: i32,
    pub role: String,
    pub phone: Option<String>,
    pub from_number: Option<String>,
}

pub async fn find_user(pool: &Pool<Postgres>, id: Uuid) -> Result<Option<User>, ApiError> {
    let user = sqlx::query_as::<_, User>(
        "select id, name, email, password, balance, role, phone, from_number \
         from users where id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_user_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, ApiError> {
    let user = sqlx::query_as::<_, User>(
        "select id, name, email, password, balance, role, phone, from_number \
         from users where email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn list_users(pool: &Pool<Postgres>) -> Result<Vec<User>, ApiError> {
    let users = sqlx::query_as::<_, User>(
        "select id, name, email, password, balance, role, phone, from_number \
         from users order by name",
    )
    .fetch_all(pool)
    .await?;
    Ok(users)
}

pub async fn insert_user(pool: &Pool<Postgres>, new_user: NewUser) -> Result<User, ApiError> {
    sqlx::query_as::<_, User>(
        "insert into users (name, email, password, balance, role, phone, from_number) \
         values ($1, $2, $3, $4, $5, $6, $7) \
         returning id, name, email, password, balance, role, phone, from_number",
    )
    .bind(new_user.name)
    .bind(new_user.email)
    .bind(new_user.password)
    .bind(new_user.balance)
    .bind(new_user.role)
    .bind(new_user.phone)
    .bind(
        new_user
            .from_number
            .unwrap_or_else(|| DEFAULT_CALLER_ID.to_string()),
    )
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("User already exists")
        } else {
            ApiError::Database(e)
        }
    })
}

/// Conditional debit: decrements only while the balance is still positive, so
/// two concurrent calls cannot both spend the last credit.  Returns whether a
/// row was actually updated.
pub async fn debit_balance(pool: &Pool<Postgres>, user_id: Uuid) -> Result<bool, ApiError> {
    let result = sqlx::query("update users set balance = balance - 1 where id = $1 and balance > 0")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert_call(
    pool: &Pool<Postgres>,
    user_id: Uuid,
    record_url: &str,
) -> Result<Call, ApiError> {
    let call = sqlx::query_as::<_, Call>(
        "insert into calls (user_id, record_url) values ($1, $2) \
         returning id, user_id, record_url, created_at",
    )
    .bind(user_id)
    .bind(record_url)
    .fetch_one(pool)
    .await?;
    Ok(call)
}

pub async fn find_call(pool: &Pool<Postgres>, id: Uuid) -> Result<Option<Call>, ApiError> {
    let call = sqlx::query_as::<_, Call>(
        "select id, user_id, record_url, created_at from calls where id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(call)
}

pub async fn calls_for_user(pool: &Pool<Postgres>, user_id: Uuid) -> Result<Vec<Call>, ApiError> {
    let calls = sqlx::query_as::<_, Call>(
        "select id, user_id, record_url, created_at from calls \
         where user_id = $1 order by created_at desc",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(calls)
}

pub async fn count_calls_for_user(pool: &Pool<Postgres>, user_id: Uuid) -> Result<i64, ApiError> {
    let count: i64 = sqlx::query_scalar("select count(*) from calls where user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn count_users(pool: &Pool<Postgres>) -> Result<i64, ApiError> {
    let count: i64 = sqlx::query_scalar("select count(*) from users")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn count_calls(pool: &Pool<Postgres>) -> Result<i64, ApiError> {
    let count: i64 = sqlx::query_scalar("select count(*) from calls")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Aggregate credits consumed, assuming every account started at the default
/// balance of 10.  Documented approximation; wrong for accounts provisioned
/// with a non-default initial balance.
pub async fn total_used_balance(pool: &Pool<Postgres>) -> Result<i64, ApiError> {
    let total: i64 =
        sqlx::query_scalar("select coalesce(sum(10 - balance), 0)::bigint from users")
            .fetch_one(pool)
            .await?;
    Ok(total)
}

/// Insert-or-replace by voice name.  Stale names from earlier syncs are kept.
pub async fn upsert_voice(
    pool: &Pool<Postgres>,
    name: &str,
    description: Option<&str>,
) -> Result<(), ApiError> {
    sqlx::query(
        "insert into voices (name, description) values ($1, $2) \
         on conflict (name) do update set description = excluded.description",
    )
    .bind(name)
    .bind(description)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_voices(pool: &Pool<Postgres>) -> Result<Vec<Voice>, ApiError> {
    let voices = sqlx::query_as::<_, Voice>(
        "select name, description, created_at from voices order by name",
    )
    .fetch_all(pool)
    .await?;
    Ok(voices)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

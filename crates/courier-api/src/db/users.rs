//! User persistence operations.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use courier_core::{Timestamp, UserId, Wallet};
use courier_engine::RepositoryError;
use courier_state::User;

use super::{classify, corrupt};

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: String,
    wallet_address: String,
    wallet_secret: String,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> Result<User, RepositoryError> {
        Ok(User {
            user_id: UserId::new(self.user_id).map_err(|e| corrupt("users", e))?,
            wallet: Wallet::new(self.wallet_address, self.wallet_secret),
            created_at: Timestamp::from_utc(self.created_at),
        })
    }
}

pub async fn insert(conn: &mut PgConnection, user: &User) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO users (user_id, wallet_address, wallet_secret, created_at)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(user.user_id.as_str())
    .bind(&user.wallet.address)
    .bind(user.wallet.secret())
    .bind(*user.created_at.as_datetime())
    .execute(conn)
    .await
    .map_err(classify)?;
    Ok(())
}

pub async fn get(conn: &mut PgConnection, id: &UserId) -> Result<Option<User>, RepositoryError> {
    sqlx::query_as::<_, UserRow>(
        "SELECT user_id, wallet_address, wallet_secret, created_at FROM users WHERE user_id = $1",
    )
    .bind(id.as_str())
    .fetch_optional(conn)
    .await
    .map_err(classify)?
    .map(UserRow::into_user)
    .transpose()
}

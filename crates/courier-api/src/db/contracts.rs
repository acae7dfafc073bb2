//! Contract persistence operations.
//!
//! Status transitions are enforced by `courier-state`; the table only
//! guards shape (award columns set together, non-negative amounts) and the
//! one-active-contract-per-sensor index.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use courier_core::{Amount, ContractId, SensorId, Timestamp, UserId};
use courier_engine::RepositoryError;
use courier_state::{Award, Contract, ContractStatus, ContractTerms, EscrowLegs};

use super::{classify, corrupt};

const COLUMNS: &str = "id, proposer_id, status, title, description, timeout, \
     required_collateral, base_price, tier1_bonus, tier2_bonus, \
     courier_id, sensor_id, award_time, escrow, \
     completion_time, confirm_completion_time, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ContractRow {
    id: Uuid,
    proposer_id: String,
    status: String,
    title: String,
    description: String,
    timeout: DateTime<Utc>,
    required_collateral: i64,
    base_price: i64,
    tier1_bonus: i64,
    tier2_bonus: i64,
    courier_id: Option<String>,
    sensor_id: Option<String>,
    award_time: Option<DateTime<Utc>>,
    escrow: Option<Json<EscrowLegs>>,
    completion_time: Option<DateTime<Utc>>,
    confirm_completion_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ContractRow {
    fn into_contract(self) -> Result<Contract, RepositoryError> {
        let bad = |e: &dyn std::fmt::Display| corrupt("contracts", format!("{}: {e}", self.id));
        let amount = |field, v| Amount::new(field, v).map_err(|e| bad(&e));

        let award = match (self.courier_id, self.sensor_id, self.award_time, self.escrow) {
            (Some(courier), Some(sensor), Some(at), Some(Json(escrow))) => Some(Award {
                courier_id: UserId::new(courier).map_err(|e| bad(&e))?,
                sensor_id: SensorId::new(sensor).map_err(|e| bad(&e))?,
                award_time: Timestamp::from_utc(at),
                escrow,
            }),
            (None, None, None, None) => None,
            _ => return Err(bad(&"award columns partially set")),
        };

        Ok(Contract {
            id: ContractId::from_uuid(self.id),
            proposer_id: UserId::new(self.proposer_id).map_err(|e| bad(&e))?,
            status: self.status.parse::<ContractStatus>().map_err(|e| bad(&e))?,
            terms: ContractTerms {
                title: self.title,
                description: self.description,
                timeout: Timestamp::from_utc(self.timeout),
                required_collateral: amount("required_collateral", self.required_collateral)?,
                base_price: amount("base_price", self.base_price)?,
                tier1_bonus: amount("tier1_bonus", self.tier1_bonus)?,
                tier2_bonus: amount("tier2_bonus", self.tier2_bonus)?,
            },
            award,
            completion_time: self.completion_time.map(Timestamp::from_utc),
            confirm_completion_time: self.confirm_completion_time.map(Timestamp::from_utc),
            created_at: Timestamp::from_utc(self.created_at),
            updated_at: Timestamp::from_utc(self.updated_at),
        })
    }
}

fn rows_into(rows: Vec<ContractRow>) -> Result<Vec<Contract>, RepositoryError> {
    rows.into_iter().map(ContractRow::into_contract).collect()
}

/// Award columns in bind order.
fn award_columns(
    c: &Contract,
) -> (
    Option<&str>,
    Option<&str>,
    Option<DateTime<Utc>>,
    Option<Json<&EscrowLegs>>,
) {
    match &c.award {
        Some(a) => (
            Some(a.courier_id.as_str()),
            Some(a.sensor_id.as_str()),
            Some(*a.award_time.as_datetime()),
            Some(Json(&a.escrow)),
        ),
        None => (None, None, None, None),
    }
}

pub async fn insert(conn: &mut PgConnection, c: &Contract) -> Result<(), RepositoryError> {
    let (courier, sensor, award_time, escrow) = award_columns(c);
    sqlx::query(&format!(
        "INSERT INTO contracts ({COLUMNS})
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"
    ))
    .bind(c.id.as_uuid())
    .bind(c.proposer_id.as_str())
    .bind(c.status.as_str())
    .bind(&c.terms.title)
    .bind(&c.terms.description)
    .bind(*c.terms.timeout.as_datetime())
    .bind(c.terms.required_collateral.as_i64())
    .bind(c.terms.base_price.as_i64())
    .bind(c.terms.tier1_bonus.as_i64())
    .bind(c.terms.tier2_bonus.as_i64())
    .bind(courier)
    .bind(sensor)
    .bind(award_time)
    .bind(escrow)
    .bind(c.completion_time.map(|t| *t.as_datetime()))
    .bind(c.confirm_completion_time.map(|t| *t.as_datetime()))
    .bind(*c.created_at.as_datetime())
    .bind(*c.updated_at.as_datetime())
    .execute(conn)
    .await
    .map_err(classify)?;
    Ok(())
}

/// Overwrite every mutable column. Returns whether the row existed.
pub async fn update(conn: &mut PgConnection, c: &Contract) -> Result<bool, RepositoryError> {
    let (courier, sensor, award_time, escrow) = award_columns(c);
    let result = sqlx::query(
        "UPDATE contracts SET
             status = $2, title = $3, description = $4, timeout = $5,
             required_collateral = $6, base_price = $7, tier1_bonus = $8, tier2_bonus = $9,
             courier_id = $10, sensor_id = $11, award_time = $12, escrow = $13,
             completion_time = $14, confirm_completion_time = $15, updated_at = $16
         WHERE id = $1",
    )
    .bind(c.id.as_uuid())
    .bind(c.status.as_str())
    .bind(&c.terms.title)
    .bind(&c.terms.description)
    .bind(*c.terms.timeout.as_datetime())
    .bind(c.terms.required_collateral.as_i64())
    .bind(c.terms.base_price.as_i64())
    .bind(c.terms.tier1_bonus.as_i64())
    .bind(c.terms.tier2_bonus.as_i64())
    .bind(courier)
    .bind(sensor)
    .bind(award_time)
    .bind(escrow)
    .bind(c.completion_time.map(|t| *t.as_datetime()))
    .bind(c.confirm_completion_time.map(|t| *t.as_datetime()))
    .bind(*c.updated_at.as_datetime())
    .execute(conn)
    .await
    .map_err(classify)?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(conn: &mut PgConnection, id: ContractId) -> Result<bool, RepositoryError> {
    let result = sqlx::query("DELETE FROM contracts WHERE id = $1")
        .bind(id.as_uuid())
        .execute(conn)
        .await
        .map_err(classify)?;
    Ok(result.rows_affected() > 0)
}

/// Fetch one contract, optionally taking a row lock for the rest of the
/// transaction.
pub async fn get(
    conn: &mut PgConnection,
    id: ContractId,
    for_update: bool,
) -> Result<Option<Contract>, RepositoryError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    sqlx::query_as::<_, ContractRow>(&format!("SELECT {COLUMNS} FROM contracts WHERE id = $1{lock}"))
        .bind(id.as_uuid())
        .fetch_optional(conn)
        .await
        .map_err(classify)?
        .map(ContractRow::into_contract)
        .transpose()
}

pub async fn active_for_sensor(
    conn: &mut PgConnection,
    sensor: &SensorId,
) -> Result<Option<Contract>, RepositoryError> {
    sqlx::query_as::<_, ContractRow>(&format!(
        "SELECT {COLUMNS} FROM contracts
         WHERE sensor_id = $1 AND status IN ('OPEN', 'FULFILLMENT')"
    ))
    .bind(sensor.as_str())
    .fetch_optional(conn)
    .await
    .map_err(classify)?
    .map(ContractRow::into_contract)
    .transpose()
}

pub async fn list_open(conn: &mut PgConnection) -> Result<Vec<Contract>, RepositoryError> {
    let rows = sqlx::query_as::<_, ContractRow>(&format!(
        "SELECT {COLUMNS} FROM contracts WHERE status = 'OPEN' ORDER BY created_at, id"
    ))
    .fetch_all(conn)
    .await
    .map_err(classify)?;
    rows_into(rows)
}

pub async fn list_for_party(
    conn: &mut PgConnection,
    user: &UserId,
) -> Result<Vec<Contract>, RepositoryError> {
    let rows = sqlx::query_as::<_, ContractRow>(&format!(
        "SELECT {COLUMNS} FROM contracts
         WHERE proposer_id = $1 OR courier_id = $1
         ORDER BY created_at, id"
    ))
    .bind(user.as_str())
    .fetch_all(conn)
    .await
    .map_err(classify)?;
    rows_into(rows)
}

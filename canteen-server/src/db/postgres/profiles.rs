use shared::models::{Profile, ProfileSummary};
use sqlx::PgPool;

use crate::db::{NewProfile, RepoResult};

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: i64,
    email: String,
    name: String,
    role: Option<String>,
    department: Option<String>,
    coins: i64,
    is_admin: bool,
    created_at: i64,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: row.id,
            email: row.email,
            name: row.name,
            role: row.role,
            department: row.department,
            coins: row.coins,
            is_admin: row.is_admin,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    #[sqlx(flatten)]
    profile: ProfileRow,
    total_orders: i64,
    unpaid_orders: i64,
}

const COLUMNS: &str = "id, email, name, role, department, coins, is_admin, created_at";

pub async fn find(pool: &PgPool, id: i64) -> RepoResult<Option<Profile>> {
    let row: Option<ProfileRow> =
        sqlx::query_as(&format!("SELECT {COLUMNS} FROM profiles WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(Profile::from))
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> RepoResult<Option<Profile>> {
    let row: Option<ProfileRow> =
        sqlx::query_as(&format!("SELECT {COLUMNS} FROM profiles WHERE email = $1"))
            .bind(email)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(Profile::from))
}

/// Unique violation on `email` surfaces as `RepoError::Duplicate`
pub async fn create(pool: &PgPool, data: &NewProfile) -> RepoResult<Profile> {
    let row: ProfileRow = sqlx::query_as(&format!(
        "INSERT INTO profiles (email, name, role, department, coins, is_admin, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {COLUMNS}"
    ))
    .bind(&data.email)
    .bind(&data.name)
    .bind(&data.role)
    .bind(&data.department)
    .bind(data.coins)
    .bind(data.is_admin)
    .bind(data.created_at)
    .fetch_one(pool)
    .await?;
    Ok(row.into())
}

pub async fn list(pool: &PgPool) -> RepoResult<Vec<ProfileSummary>> {
    let rows: Vec<SummaryRow> = sqlx::query_as(
        "SELECT p.id, p.email, p.name, p.role, p.department, p.coins, p.is_admin, p.created_at,
                COUNT(o.id) AS total_orders,
                COUNT(o.id) FILTER (WHERE NOT o.paid) AS unpaid_orders
         FROM profiles p
         LEFT JOIN orders o ON o.profile_id = p.id
         GROUP BY p.id
         ORDER BY p.name, p.id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| ProfileSummary {
            profile: row.profile.into(),
            total_orders: row.total_orders,
            unpaid_orders: row.unpaid_orders,
        })
        .collect())
}

use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    Amount, Expense, ExpenseId, Member, MemberId, MemberRole, Payment, Trip, TripId, TripStatus,
};

use super::MIGRATION_001_INITIAL;

const TRIP_COLUMNS: &str =
    "id, name, destination, start_date, end_date, currency, status, created_at";
const MEMBER_COLUMNS: &str = "id, trip_id, name, role, created_at";
const EXPENSE_COLUMNS: &str =
    "id, trip_id, payer_id, amount, participants, date, category, description, created_at";
const PAYMENT_COLUMNS: &str = "id, trip_id, from_id, to_id, amount, date, recorded_at";

/// Repository for persisting and querying trips, members, expenses and payments.
///
/// This is the ledger store behind the settlement engine: it only hands out
/// snapshots of the records, all balance math happens in memory.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        debug!("applying migration 001");
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Trip operations
    // ========================

    /// Save a new trip to the database.
    pub async fn save_trip(&self, trip: &Trip) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trips (id, name, destination, start_date, end_date, currency, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(trip.id.to_string())
        .bind(&trip.name)
        .bind(&trip.destination)
        .bind(trip.start_date.map(|d| d.to_string()))
        .bind(trip.end_date.map(|d| d.to_string()))
        .bind(&trip.currency)
        .bind(trip.status.as_str())
        .bind(trip.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save trip")?;
        Ok(())
    }

    /// Overwrite the mutable fields of an existing trip.
    pub async fn update_trip(&self, trip: &Trip) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE trips
            SET name = ?, destination = ?, start_date = ?, end_date = ?, currency = ?, status = ?
            WHERE id = ?
            "#,
        )
        .bind(&trip.name)
        .bind(&trip.destination)
        .bind(trip.start_date.map(|d| d.to_string()))
        .bind(trip.end_date.map(|d| d.to_string()))
        .bind(&trip.currency)
        .bind(trip.status.as_str())
        .bind(trip.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update trip")?;
        Ok(())
    }

    /// Get a trip by ID.
    pub async fn get_trip(&self, id: TripId) -> Result<Option<Trip>> {
        let row = sqlx::query(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch trip")?;

        row.as_ref().map(Self::row_to_trip).transpose()
    }

    /// Get a trip by name.
    pub async fn get_trip_by_name(&self, name: &str) -> Result<Option<Trip>> {
        let row = sqlx::query(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE name = ?"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch trip by name")?;

        row.as_ref().map(Self::row_to_trip).transpose()
    }

    /// List all trips (optionally including archived).
    pub async fn list_trips(&self, include_archived: bool) -> Result<Vec<Trip>> {
        let query = if include_archived {
            format!("SELECT {TRIP_COLUMNS} FROM trips ORDER BY created_at, rowid")
        } else {
            format!(
                "SELECT {TRIP_COLUMNS} FROM trips WHERE status != 'archived' ORDER BY created_at, rowid"
            )
        };

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list trips")?;

        rows.iter().map(Self::row_to_trip).collect()
    }

    fn row_to_trip(row: &sqlx::sqlite::SqliteRow) -> Result<Trip> {
        let id_str: String = row.get("id");
        let status_str: String = row.get("status");
        let start_date: Option<String> = row.get("start_date");
        let end_date: Option<String> = row.get("end_date");
        let created_at_str: String = row.get("created_at");

        Ok(Trip {
            id: Uuid::parse_str(&id_str).context("Invalid trip ID")?,
            name: row.get("name"),
            destination: row.get("destination"),
            start_date: start_date
                .map(|s| parse_date(&s))
                .transpose()
                .context("Invalid start_date")?,
            end_date: end_date
                .map(|s| parse_date(&s))
                .transpose()
                .context("Invalid end_date")?,
            currency: row.get("currency"),
            status: TripStatus::from_str(&status_str).map_err(anyhow::Error::msg)?,
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
        })
    }

    // ========================
    // Member operations
    // ========================

    /// Save a new member to the database.
    pub async fn save_member(&self, member: &Member) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO members (id, trip_id, name, role, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(member.id.to_string())
        .bind(member.trip_id.to_string())
        .bind(&member.name)
        .bind(member.role.as_str())
        .bind(member.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save member")?;
        Ok(())
    }

    /// Get a member of a trip by name.
    pub async fn get_member_by_name(&self, trip_id: TripId, name: &str) -> Result<Option<Member>> {
        let row = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE trip_id = ? AND name = ?"
        ))
        .bind(trip_id.to_string())
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch member by name")?;

        row.as_ref().map(Self::row_to_member).transpose()
    }

    /// List the members of a trip in the order they joined.
    pub async fn list_members(&self, trip_id: TripId) -> Result<Vec<Member>> {
        let rows = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE trip_id = ? ORDER BY rowid"
        ))
        .bind(trip_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list members")?;

        rows.iter().map(Self::row_to_member).collect()
    }

    /// Change a member's display name.
    pub async fn rename_member(&self, id: MemberId, name: &str) -> Result<()> {
        sqlx::query("UPDATE members SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to rename member")?;
        Ok(())
    }

    fn row_to_member(row: &sqlx::sqlite::SqliteRow) -> Result<Member> {
        let id_str: String = row.get("id");
        let trip_id_str: String = row.get("trip_id");
        let role_str: String = row.get("role");
        let created_at_str: String = row.get("created_at");

        Ok(Member {
            id: Uuid::parse_str(&id_str).context("Invalid member ID")?,
            trip_id: Uuid::parse_str(&trip_id_str).context("Invalid trip ID")?,
            name: row.get("name"),
            role: MemberRole::from_str(&role_str).map_err(anyhow::Error::msg)?,
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
        })
    }

    // ========================
    // Expense operations
    // ========================

    /// Save a new expense to the database.
    pub async fn save_expense(&self, expense: &Expense) -> Result<()> {
        let participants_json = serde_json::to_string(&expense.participants)?;

        sqlx::query(
            r#"
            INSERT INTO expenses (id, trip_id, payer_id, amount, participants, date, category, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(expense.id.to_string())
        .bind(expense.trip_id.to_string())
        .bind(expense.payer.to_string())
        .bind(expense.amount.to_string())
        .bind(&participants_json)
        .bind(expense.date.to_string())
        .bind(&expense.category)
        .bind(&expense.description)
        .bind(expense.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save expense")?;
        Ok(())
    }

    /// Replace an expense record in full.
    pub async fn update_expense(&self, expense: &Expense) -> Result<()> {
        let participants_json = serde_json::to_string(&expense.participants)?;

        sqlx::query(
            r#"
            UPDATE expenses
            SET payer_id = ?, amount = ?, participants = ?, date = ?, category = ?, description = ?
            WHERE id = ?
            "#,
        )
        .bind(expense.payer.to_string())
        .bind(expense.amount.to_string())
        .bind(&participants_json)
        .bind(expense.date.to_string())
        .bind(&expense.category)
        .bind(&expense.description)
        .bind(expense.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update expense")?;
        Ok(())
    }

    /// Delete an expense. Returns false if no such expense existed.
    pub async fn delete_expense(&self, id: ExpenseId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete expense")?;
        Ok(result.rows_affected() > 0)
    }

    /// Get an expense by ID.
    pub async fn get_expense(&self, id: ExpenseId) -> Result<Option<Expense>> {
        let row = sqlx::query(&format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch expense")?;

        row.as_ref().map(Self::row_to_expense).transpose()
    }

    /// List the expenses of a trip, oldest first.
    pub async fn list_expenses(&self, trip_id: TripId) -> Result<Vec<Expense>> {
        let rows = sqlx::query(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE trip_id = ? ORDER BY date, rowid"
        ))
        .bind(trip_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list expenses")?;

        rows.iter().map(Self::row_to_expense).collect()
    }

    fn row_to_expense(row: &sqlx::sqlite::SqliteRow) -> Result<Expense> {
        let id_str: String = row.get("id");
        let trip_id_str: String = row.get("trip_id");
        let payer_str: String = row.get("payer_id");
        let amount_str: String = row.get("amount");
        let participants_json: String = row.get("participants");
        let date_str: String = row.get("date");
        let created_at_str: String = row.get("created_at");

        Ok(Expense {
            id: Uuid::parse_str(&id_str).context("Invalid expense ID")?,
            trip_id: Uuid::parse_str(&trip_id_str).context("Invalid trip ID")?,
            payer: Uuid::parse_str(&payer_str).context("Invalid payer ID")?,
            amount: parse_stored_amount(&amount_str)?,
            participants: serde_json::from_str(&participants_json)
                .context("Invalid participants list")?,
            date: parse_date(&date_str).context("Invalid expense date")?,
            category: row.get("category"),
            description: row.get("description"),
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
        })
    }

    // ========================
    // Payment operations
    // ========================

    /// Append a payment to the ledger. Payments are never updated.
    pub async fn append_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, trip_id, from_id, to_id, amount, date, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payment.id.to_string())
        .bind(payment.trip_id.to_string())
        .bind(payment.from.to_string())
        .bind(payment.to.to_string())
        .bind(payment.amount.to_string())
        .bind(payment.date.to_string())
        .bind(payment.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save payment")?;
        Ok(())
    }

    /// List the payments of a trip, oldest first.
    pub async fn list_payments(&self, trip_id: TripId) -> Result<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE trip_id = ? ORDER BY date, rowid"
        ))
        .bind(trip_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list payments")?;

        rows.iter().map(Self::row_to_payment).collect()
    }

    fn row_to_payment(row: &sqlx::sqlite::SqliteRow) -> Result<Payment> {
        let id_str: String = row.get("id");
        let trip_id_str: String = row.get("trip_id");
        let from_str: String = row.get("from_id");
        let to_str: String = row.get("to_id");
        let amount_str: String = row.get("amount");
        let date_str: String = row.get("date");
        let recorded_at_str: String = row.get("recorded_at");

        Ok(Payment {
            id: Uuid::parse_str(&id_str).context("Invalid payment ID")?,
            trip_id: Uuid::parse_str(&trip_id_str).context("Invalid trip ID")?,
            from: Uuid::parse_str(&from_str).context("Invalid sender ID")?,
            to: Uuid::parse_str(&to_str).context("Invalid recipient ID")?,
            amount: parse_stored_amount(&amount_str)?,
            date: parse_date(&date_str).context("Invalid payment date")?,
            recorded_at: parse_timestamp(&recorded_at_str).context("Invalid recorded_at")?,
        })
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")?)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

fn parse_stored_amount(s: &str) -> Result<Amount> {
    Amount::from_str(s).with_context(|| format!("Invalid stored amount: {}", s))
}

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use crate::domain::{
    Amount, Balances, Expense, ExpenseId, Member, MemberId, MemberRole, Payment, SettlementError,
    Transfer, Trip, TripId, TripStatus, compute_balances, plan_settlement,
};
use crate::storage::Repository;

use super::{AppError, TripSummary, build_trip_summary};

/// Application service providing high-level operations for group trips.
/// This is the primary interface for any client (CLI, API, TUI, etc.).
///
/// Balances and settlement plans are never stored: every call re-reads the
/// trip's full history and recomputes from scratch.
pub struct TripService {
    repo: Repository,
}

/// Balance entry for a member
#[derive(Debug, Clone)]
pub struct MemberBalance {
    pub member: Member,
    pub balance: Amount,
}

/// Fields of a new expense
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub payer: MemberId,
    pub amount: Amount,
    pub participants: Vec<MemberId>,
    pub date: NaiveDate,
    pub category: String,
    pub description: String,
}

/// Changes to an existing expense. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ExpenseUpdate {
    pub payer: Option<MemberId>,
    pub amount: Option<Amount>,
    pub participants: Option<Vec<MemberId>>,
    pub date: Option<NaiveDate>,
    pub category: Option<String>,
    pub description: Option<String>,
}

/// Changes to an existing trip. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct TripUpdate {
    pub name: Option<String>,
    pub destination: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<TripStatus>,
}

impl TripService {
    /// Create a new trip service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        info!(database = database_path, "database initialized");
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Trip operations
    // ========================

    /// Create a new trip. If `owner` is given, they join as the trip admin.
    pub async fn create_trip(
        &self,
        name: String,
        destination: String,
        currency: String,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        owner: Option<String>,
    ) -> Result<Trip, AppError> {
        if self.repo.get_trip_by_name(&name).await?.is_some() {
            return Err(AppError::TripAlreadyExists(name));
        }

        let trip = Trip::new(name, destination, currency).with_dates(start_date, end_date);
        self.repo.save_trip(&trip).await?;
        info!(trip = %trip.name, id = %trip.id, "created trip");

        if let Some(owner) = owner {
            self.add_member(trip.id, owner, MemberRole::Admin).await?;
        }

        Ok(trip)
    }

    /// Get a trip by name.
    pub async fn get_trip(&self, name: &str) -> Result<Trip, AppError> {
        self.repo
            .get_trip_by_name(name)
            .await?
            .ok_or_else(|| AppError::TripNotFound(name.to_string()))
    }

    /// Get a trip by ID.
    pub async fn get_trip_by_id(&self, id: TripId) -> Result<Trip, AppError> {
        self.repo
            .get_trip(id)
            .await?
            .ok_or_else(|| AppError::TripNotFound(id.to_string()))
    }

    /// List all trips.
    pub async fn list_trips(&self, include_archived: bool) -> Result<Vec<Trip>, AppError> {
        Ok(self.repo.list_trips(include_archived).await?)
    }

    /// Update trip details or status.
    pub async fn update_trip(&self, name: &str, update: TripUpdate) -> Result<Trip, AppError> {
        let mut trip = self.get_trip(name).await?;

        if let Some(new_name) = update.name {
            if new_name != trip.name && self.repo.get_trip_by_name(&new_name).await?.is_some() {
                return Err(AppError::TripAlreadyExists(new_name));
            }
            trip.name = new_name;
        }
        if let Some(destination) = update.destination {
            trip.destination = destination;
        }
        if update.start_date.is_some() {
            trip.start_date = update.start_date;
        }
        if update.end_date.is_some() {
            trip.end_date = update.end_date;
        }
        if let Some(status) = update.status {
            trip.status = status;
        }

        self.repo.update_trip(&trip).await?;
        info!(trip = %trip.name, status = %trip.status, "updated trip");
        Ok(trip)
    }

    // ========================
    // Member operations
    // ========================

    /// Add a member to a trip. Names are unique within a trip.
    pub async fn add_member(
        &self,
        trip_id: TripId,
        name: String,
        role: MemberRole,
    ) -> Result<Member, AppError> {
        let trip = self.get_trip_by_id(trip_id).await?;
        if self.repo.get_member_by_name(trip.id, &name).await?.is_some() {
            return Err(AppError::MemberAlreadyExists(name));
        }

        let member = Member::new(trip.id, name, role);
        self.repo.save_member(&member).await?;
        info!(trip = %trip.name, member = %member.name, role = %member.role, "added member");
        Ok(member)
    }

    /// Get a member of a trip by name.
    pub async fn get_member(&self, trip_id: TripId, name: &str) -> Result<Member, AppError> {
        self.repo
            .get_member_by_name(trip_id, name)
            .await?
            .ok_or_else(|| AppError::MemberNotFound(name.to_string()))
    }

    /// List the members of a trip in the order they joined.
    pub async fn list_members(&self, trip_id: TripId) -> Result<Vec<Member>, AppError> {
        Ok(self.repo.list_members(trip_id).await?)
    }

    /// Rename a member of a trip.
    pub async fn rename_member(
        &self,
        trip_id: TripId,
        name: &str,
        new_name: String,
    ) -> Result<Member, AppError> {
        let mut member = self.get_member(trip_id, name).await?;
        if self
            .repo
            .get_member_by_name(trip_id, &new_name)
            .await?
            .is_some()
        {
            return Err(AppError::MemberAlreadyExists(new_name));
        }

        self.repo.rename_member(member.id, &new_name).await?;
        member.name = new_name;
        Ok(member)
    }

    /// Get a map of member IDs to names (useful for display).
    pub async fn get_member_names(
        &self,
        trip_id: TripId,
    ) -> Result<HashMap<MemberId, String>, AppError> {
        let members = self.repo.list_members(trip_id).await?;
        Ok(members.into_iter().map(|m| (m.id, m.name)).collect())
    }

    // ========================
    // Expense operations
    // ========================

    /// Record a new shared expense.
    pub async fn add_expense(&self, trip_id: TripId, new: NewExpense) -> Result<Expense, AppError> {
        let trip = self.writable_trip(trip_id).await?;
        let known = self.member_ids(trip.id).await?;

        let expense = Expense::new(trip.id, new.payer, new.amount, new.participants, new.date)
            .with_category(new.category)
            .with_description(new.description);
        check_expense(&expense, &known)?;

        self.repo.save_expense(&expense).await?;
        info!(
            trip = %trip.name,
            expense = %expense.id,
            amount = %expense.amount,
            participants = expense.participants.len(),
            "recorded expense"
        );
        Ok(expense)
    }

    /// Get an expense by ID.
    pub async fn get_expense(&self, id: ExpenseId) -> Result<Expense, AppError> {
        self.repo
            .get_expense(id)
            .await?
            .ok_or_else(|| AppError::ExpenseNotFound(id.to_string()))
    }

    /// List the expenses of a trip, oldest first.
    pub async fn list_expenses(&self, trip_id: TripId) -> Result<Vec<Expense>, AppError> {
        Ok(self.repo.list_expenses(trip_id).await?)
    }

    /// Edit an expense. Any balance or settlement computed before the edit is stale.
    pub async fn update_expense(
        &self,
        id: ExpenseId,
        update: ExpenseUpdate,
    ) -> Result<Expense, AppError> {
        let mut expense = self.get_expense(id).await?;
        let trip = self.writable_trip(expense.trip_id).await?;
        let known = self.member_ids(trip.id).await?;

        if let Some(payer) = update.payer {
            expense.payer = payer;
        }
        if let Some(amount) = update.amount {
            expense.amount = amount;
        }
        if let Some(participants) = update.participants {
            expense.participants = participants;
        }
        if let Some(date) = update.date {
            expense.date = date;
        }
        if let Some(category) = update.category {
            expense.category = category;
        }
        if let Some(description) = update.description {
            expense.description = description;
        }
        check_expense(&expense, &known)?;

        self.repo.update_expense(&expense).await?;
        info!(trip = %trip.name, expense = %expense.id, "updated expense");
        Ok(expense)
    }

    /// Delete an expense.
    pub async fn delete_expense(&self, id: ExpenseId) -> Result<Expense, AppError> {
        let expense = self.get_expense(id).await?;
        self.writable_trip(expense.trip_id).await?;

        if !self.repo.delete_expense(id).await? {
            return Err(AppError::ExpenseNotFound(id.to_string()));
        }
        info!(expense = %id, "deleted expense");
        Ok(expense)
    }

    // ========================
    // Settlement operations
    // ========================

    /// List the settlement payments recorded for a trip, oldest first.
    pub async fn list_payments(&self, trip_id: TripId) -> Result<Vec<Payment>, AppError> {
        Ok(self.repo.list_payments(trip_id).await?)
    }

    /// Compute every member's net balance from the trip's full history.
    pub async fn compute_balances(&self, trip_id: TripId) -> Result<Balances, AppError> {
        let trip = self.get_trip_by_id(trip_id).await?;
        let members = self.repo.list_members(trip.id).await?;
        let expenses = self.repo.list_expenses(trip.id).await?;
        let payments = self.repo.list_payments(trip.id).await?;

        let balances = compute_balances(&members, &expenses, &payments)?;
        debug!(
            trip = %trip.name,
            members = members.len(),
            expenses = expenses.len(),
            payments = payments.len(),
            "computed balances"
        );
        Ok(balances)
    }

    /// Balances paired with their members, in join order.
    pub async fn get_member_balances(
        &self,
        trip_id: TripId,
    ) -> Result<Vec<MemberBalance>, AppError> {
        let balances = self.compute_balances(trip_id).await?;
        let members = self.repo.list_members(trip_id).await?;

        Ok(members
            .into_iter()
            .map(|member| {
                let balance = balances.get(member.id).unwrap_or(Amount::ZERO);
                MemberBalance { member, balance }
            })
            .collect())
    }

    /// Plan the transfers that settle every balance in the trip.
    pub async fn compute_settlement(&self, trip_id: TripId) -> Result<Vec<Transfer>, AppError> {
        let balances = self.compute_balances(trip_id).await?;
        let transfers = plan_settlement(&balances);
        debug!(trip = %trip_id, transfers = transfers.len(), "planned settlement");
        Ok(transfers)
    }

    /// Record that `from` paid `to`. The next settlement computation reflects it.
    /// Allowed on archived trips too, so debts left open can still be paid off.
    pub async fn record_settlement_payment(
        &self,
        trip_id: TripId,
        from: MemberId,
        to: MemberId,
        amount: Amount,
        date: NaiveDate,
    ) -> Result<Payment, AppError> {
        let trip = self.get_trip_by_id(trip_id).await?;
        let known = self.member_ids(trip.id).await?;

        let payment = Payment::new(trip.id, from, to, amount, date);
        payment
            .check(&known)
            .map_err(|problem| SettlementError::InvalidPayment {
                id: payment.id,
                problem,
            })?;

        self.repo.append_payment(&payment).await?;
        info!(
            trip = %trip.name,
            payment = %payment.id,
            amount = %payment.amount,
            "recorded settlement payment"
        );
        Ok(payment)
    }

    // ========================
    // Reporting
    // ========================

    /// Spending overview for a trip.
    pub async fn get_trip_summary(&self, trip_id: TripId) -> Result<TripSummary, AppError> {
        let trip = self.get_trip_by_id(trip_id).await?;
        let members = self.repo.list_members(trip.id).await?;
        let expenses = self.repo.list_expenses(trip.id).await?;
        let payments = self.repo.list_payments(trip.id).await?;

        Ok(build_trip_summary(trip, &members, &expenses, &payments)?)
    }

    // ========================
    // Demo data
    // ========================

    /// Create the sample trip: three friends in Barcelona with two shared expenses.
    pub async fn seed_demo(&self) -> Result<Trip, AppError> {
        let trip = self
            .create_trip(
                DEMO_TRIP.to_string(),
                "Barcelona, España".to_string(),
                "EUR".to_string(),
                NaiveDate::from_ymd_opt(2024, 7, 1),
                NaiveDate::from_ymd_opt(2024, 7, 15),
                Some("Diego García".to_string()),
            )
            .await?;

        let first_day = trip.start_date.unwrap_or_else(|| Utc::now().date_naive());
        let second_day = first_day.succ_opt().unwrap_or(first_day);

        let diego = self.get_member(trip.id, "Diego García").await?;
        let sofia = self
            .add_member(trip.id, "Sofía Martínez".to_string(), MemberRole::Editor)
            .await?;
        let marcos = self
            .add_member(trip.id, "Marcos Ruiz".to_string(), MemberRole::Editor)
            .await?;

        self.add_expense(
            trip.id,
            NewExpense {
                payer: diego.id,
                amount: Amount::new(85500, 2),
                participants: vec![diego.id, sofia.id, marcos.id],
                date: first_day,
                category: "Comida".to_string(),
                description: "Cena de bienvenida".to_string(),
            },
        )
        .await?;

        self.add_expense(
            trip.id,
            NewExpense {
                payer: sofia.id,
                amount: Amount::new(25300, 2),
                participants: vec![diego.id, sofia.id],
                date: second_day,
                category: "Ocio".to_string(),
                description: "Bebidas playa".to_string(),
            },
        )
        .await?;

        Ok(trip)
    }

    // ========================
    // Helpers
    // ========================

    async fn writable_trip(&self, trip_id: TripId) -> Result<Trip, AppError> {
        let trip = self.get_trip_by_id(trip_id).await?;
        if trip.is_archived() {
            return Err(AppError::TripArchived(trip.name));
        }
        Ok(trip)
    }

    async fn member_ids(&self, trip_id: TripId) -> Result<HashSet<MemberId>, AppError> {
        let members = self.repo.list_members(trip_id).await?;
        Ok(members.into_iter().map(|m| m.id).collect())
    }
}

/// Name of the trip created by [`TripService::seed_demo`].
pub const DEMO_TRIP: &str = "Verano en Barcelona";

fn check_expense(expense: &Expense, known: &HashSet<MemberId>) -> Result<(), SettlementError> {
    expense
        .check(known)
        .map_err(|problem| SettlementError::InvalidExpense {
            id: expense.id,
            problem,
        })
}

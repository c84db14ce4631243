use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TripId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    /// The trip is ongoing and accepts new expenses
    Active,
    /// The trip is over; balances may still be settled
    Finished,
    /// Hidden from the default trip list. Expenses are frozen, but
    /// settlement payments can still be recorded against open debts.
    Archived,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Active => "active",
            TripStatus::Finished => "finished",
            TripStatus::Archived => "archived",
        }
    }
}

impl std::str::FromStr for TripStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(TripStatus::Active),
            "finished" => Ok(TripStatus::Finished),
            "archived" => Ok(TripStatus::Archived),
            _ => Err(format!("unknown trip status: {}", s)),
        }
    }
}

impl std::fmt::Display for TripStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub name: String,
    pub destination: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Display currency only; amounts are never converted
    pub currency: String,
    pub status: TripStatus,
    pub created_at: DateTime<Utc>,
}

impl Trip {
    pub fn new(name: String, destination: String, currency: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            destination,
            start_date: None,
            end_date: None,
            currency,
            status: TripStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn with_dates(
        mut self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Self {
        self.start_date = start_date;
        self.end_date = end_date;
        self
    }

    pub fn is_archived(&self) -> bool {
        self.status == TripStatus::Archived
    }

    /// Number of days covered by the trip, inclusive of both ends.
    pub fn duration_days(&self) -> Option<i64> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if end >= start => Some((end - start).num_days() + 1),
            _ => None,
        }
    }
}

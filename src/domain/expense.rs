use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{Amount, MemberId, TripId};

pub type ExpenseId = Uuid;

/// A cost paid by one member and shared evenly among a set of members.
/// The payer does not need to be one of the participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub trip_id: TripId,
    pub payer: MemberId,
    pub amount: Amount,
    /// Members sharing the cost, in the order they were listed
    pub participants: Vec<MemberId>,
    /// When the expense happened in the real world
    pub date: NaiveDate,
    pub category: String,
    pub description: String,
    /// When we recorded this expense in the system
    pub created_at: DateTime<Utc>,
}

/// Why an expense cannot take part in a balance computation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpenseProblem {
    #[error("amount must be positive")]
    NonPositiveAmount,

    #[error("expense has no participants")]
    NoParticipants,

    #[error("participant {0} is listed more than once")]
    DuplicateParticipant(MemberId),

    #[error("payer {0} is not a member of the trip")]
    UnknownPayer(MemberId),

    #[error("participant {0} is not a member of the trip")]
    UnknownParticipant(MemberId),
}

impl Expense {
    pub fn new(
        trip_id: TripId,
        payer: MemberId,
        amount: Amount,
        participants: Vec<MemberId>,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id,
            payer,
            amount,
            participants,
            date,
            category: String::new(),
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// The amount each participant owes. Callers must check the expense first:
    /// an expense without participants has no share.
    pub fn share(&self) -> Option<Amount> {
        if self.participants.is_empty() {
            return None;
        }
        Some(self.amount / Amount::from(self.participants.len()))
    }

    /// Check the expense against the set of known members.
    pub fn check(&self, members: &HashSet<MemberId>) -> Result<(), ExpenseProblem> {
        if self.amount <= Amount::ZERO {
            return Err(ExpenseProblem::NonPositiveAmount);
        }
        if self.participants.is_empty() {
            return Err(ExpenseProblem::NoParticipants);
        }
        if !members.contains(&self.payer) {
            return Err(ExpenseProblem::UnknownPayer(self.payer));
        }

        let mut seen = HashSet::with_capacity(self.participants.len());
        for participant in &self.participants {
            if !members.contains(participant) {
                return Err(ExpenseProblem::UnknownParticipant(*participant));
            }
            if !seen.insert(*participant) {
                return Err(ExpenseProblem::DuplicateParticipant(*participant));
            }
        }
        Ok(())
    }
}

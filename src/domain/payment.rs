use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{Amount, MemberId, TripId};

pub type PaymentId = Uuid;

/// A manual, already executed repayment between two members.
/// Payments are immutable and never split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub trip_id: TripId,
    /// Member who handed over the money
    pub from: MemberId,
    /// Member who received it
    pub to: MemberId,
    pub amount: Amount,
    /// When the money changed hands
    pub date: NaiveDate,
    pub recorded_at: DateTime<Utc>,
}

/// Why a payment cannot be recorded or used in a balance computation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentProblem {
    #[error("amount must be positive")]
    NonPositiveAmount,

    #[error("a member cannot pay themselves")]
    SelfPayment,

    #[error("sender {0} is not a member of the trip")]
    UnknownSender(MemberId),

    #[error("recipient {0} is not a member of the trip")]
    UnknownRecipient(MemberId),
}

impl Payment {
    pub fn new(
        trip_id: TripId,
        from: MemberId,
        to: MemberId,
        amount: Amount,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id,
            from,
            to,
            amount,
            date,
            recorded_at: Utc::now(),
        }
    }

    /// Check the payment against the set of known members.
    pub fn check(&self, members: &HashSet<MemberId>) -> Result<(), PaymentProblem> {
        if self.amount <= Amount::ZERO {
            return Err(PaymentProblem::NonPositiveAmount);
        }
        if self.from == self.to {
            return Err(PaymentProblem::SelfPayment);
        }
        if !members.contains(&self.from) {
            return Err(PaymentProblem::UnknownSender(self.from));
        }
        if !members.contains(&self.to) {
            return Err(PaymentProblem::UnknownRecipient(self.to));
        }
        Ok(())
    }
}

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::domain::{
    Amount, Expense, Member, MemberId, Payment, SettlementError, Trip, compute_balances,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripSummary {
    pub trip: Trip,
    pub total_spent: Amount,
    pub expense_count: usize,
    pub categories: Vec<CategorySummary>,
    pub members: Vec<MemberSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,
    pub total: Amount,
    pub count: usize,
    pub percentage: f64,
}

/// What a member put in and took out of the shared pot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSummary {
    pub member_id: MemberId,
    pub name: String,
    /// Sum of the expenses this member paid for
    pub paid: Amount,
    /// Sum of this member's shares across all expenses
    pub share: Amount,
    pub payments_sent: Amount,
    pub payments_received: Amount,
    pub balance: Amount,
}

/// Build the spending overview of a trip from its full history.
/// Categories are sorted by total spent, largest first.
pub fn build_trip_summary(
    trip: Trip,
    members: &[Member],
    expenses: &[Expense],
    payments: &[Payment],
) -> Result<TripSummary, SettlementError> {
    let balances = compute_balances(members, expenses, payments)?;
    let total_spent = expenses
        .iter()
        .try_fold(Amount::ZERO, |sum, e| add(sum, e.amount))?;

    let mut by_category: Vec<CategorySummary> = Vec::new();
    for expense in expenses {
        let category = if expense.category.is_empty() {
            "uncategorized"
        } else {
            expense.category.as_str()
        };
        match by_category.iter_mut().find(|c| c.category == category) {
            Some(summary) => {
                summary.total = add(summary.total, expense.amount)?;
                summary.count += 1;
            }
            None => by_category.push(CategorySummary {
                category: category.to_string(),
                total: expense.amount,
                count: 1,
                percentage: 0.0,
            }),
        }
    }
    for summary in &mut by_category {
        summary.percentage = percentage_of(summary.total, total_spent);
    }
    by_category.sort_by(|a, b| b.total.cmp(&a.total));

    let mut paid: HashMap<MemberId, Amount> = HashMap::new();
    let mut share: HashMap<MemberId, Amount> = HashMap::new();
    for expense in expenses {
        accumulate(&mut paid, expense.payer, expense.amount)?;
        if let Some(each) = expense.share() {
            for participant in &expense.participants {
                accumulate(&mut share, *participant, each)?;
            }
        }
    }

    let mut sent: HashMap<MemberId, Amount> = HashMap::new();
    let mut received: HashMap<MemberId, Amount> = HashMap::new();
    for payment in payments {
        accumulate(&mut sent, payment.from, payment.amount)?;
        accumulate(&mut received, payment.to, payment.amount)?;
    }

    let members = members
        .iter()
        .map(|member| MemberSummary {
            member_id: member.id,
            name: member.name.clone(),
            paid: paid.get(&member.id).copied().unwrap_or_default(),
            share: share.get(&member.id).copied().unwrap_or_default(),
            payments_sent: sent.get(&member.id).copied().unwrap_or_default(),
            payments_received: received.get(&member.id).copied().unwrap_or_default(),
            balance: balances.get(member.id).unwrap_or_default(),
        })
        .collect();

    Ok(TripSummary {
        trip,
        total_spent,
        expense_count: expenses.len(),
        categories: by_category,
        members,
    })
}

fn add(a: Amount, b: Amount) -> Result<Amount, SettlementError> {
    a.checked_add(b).ok_or(SettlementError::AmountOverflow)
}

fn accumulate(
    totals: &mut HashMap<MemberId, Amount>,
    member: MemberId,
    amount: Amount,
) -> Result<(), SettlementError> {
    let total = totals.entry(member).or_default();
    *total = add(*total, amount)?;
    Ok(())
}

fn percentage_of(part: Amount, whole: Amount) -> f64 {
    if whole.is_zero() {
        return 0.0;
    }
    (part / whole * Amount::ONE_HUNDRED).to_f64().unwrap_or(0.0)
}

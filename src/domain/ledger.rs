use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::{
    Amount, EPSILON, Expense, ExpenseId, ExpenseProblem, Member, MemberId, Payment, PaymentId,
    PaymentProblem, Transfer,
};

/// Errors raised while reducing a trip's history into balances.
/// All of them are caller errors: nothing is computed when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("Invalid expense {id}: {problem}")]
    InvalidExpense { id: ExpenseId, problem: ExpenseProblem },

    #[error("Invalid payment {id}: {problem}")]
    InvalidPayment { id: PaymentId, problem: PaymentProblem },

    #[error("Cannot compute balances without members")]
    EmptyMembers,

    #[error("Amounts are too large to add up")]
    AmountOverflow,
}

/// Signed net position of each member, in the order the members were given.
/// Positive = the member is owed money, negative = the member owes money.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Balances {
    entries: Vec<(MemberId, Amount)>,
    index: HashMap<MemberId, usize>,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of a single member, if the member is part of the computation.
    pub fn get(&self, member: MemberId) -> Option<Amount> {
        self.index.get(&member).map(|&i| self.entries[i].1)
    }

    /// Iterate over `(member, balance)` pairs in input order.
    pub fn iter(&self) -> impl Iterator<Item = (MemberId, Amount)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all balances. Zero (within rounding dust) for a closed group.
    ///
    /// Credits and debts are added alternately so the running sum stays within
    /// the magnitude of a single balance. `None` only if the result itself
    /// cannot be represented.
    pub fn total(&self) -> Option<Amount> {
        let mut credits = self.entries.iter().map(|e| e.1).filter(|b| b.is_sign_positive());
        let mut debts = self.entries.iter().map(|e| e.1).filter(|b| b.is_sign_negative());
        let mut sum = Amount::ZERO;

        loop {
            let next = if sum.is_sign_negative() {
                credits.next().or_else(|| debts.next())
            } else {
                debts.next().or_else(|| credits.next())
            };
            match next {
                Some(balance) => sum = sum.checked_add(balance)?,
                None => return Some(sum),
            }
        }
    }

    /// True if every member is within [`EPSILON`] of zero.
    pub fn is_settled(&self) -> bool {
        self.entries
            .iter()
            .all(|(_, balance)| balance.abs() < EPSILON)
    }

    /// Add `delta` to a member's balance, registering the member if unseen.
    pub fn adjust(&mut self, member: MemberId, delta: Amount) {
        match self.index.get(&member) {
            Some(&i) => self.entries[i].1 += delta,
            None => {
                self.index.insert(member, self.entries.len());
                self.entries.push((member, delta));
            }
        }
    }

    /// Like [`Balances::adjust`] for a known member, but fails instead of overflowing.
    fn credit(&mut self, member: MemberId, delta: Amount) -> Result<(), SettlementError> {
        match self.index.get(&member) {
            Some(&i) => {
                let entry = &mut self.entries[i].1;
                *entry = entry
                    .checked_add(delta)
                    .ok_or(SettlementError::AmountOverflow)?;
                Ok(())
            }
            None => {
                self.adjust(member, delta);
                Ok(())
            }
        }
    }

    /// Balances after the given transfers have been executed:
    /// each sender's debt shrinks and each receiver's credit shrinks.
    pub fn apply(&self, transfers: &[Transfer]) -> Balances {
        let mut next = self.clone();
        for transfer in transfers {
            next.adjust(transfer.from, transfer.amount);
            next.adjust(transfer.to, -transfer.amount);
        }
        next
    }
}

impl FromIterator<(MemberId, Amount)> for Balances {
    fn from_iter<T: IntoIterator<Item = (MemberId, Amount)>>(iter: T) -> Self {
        let mut balances = Balances::new();
        for (member, amount) in iter {
            balances.adjust(member, amount);
        }
        balances
    }
}

/// Compute every member's net balance from a trip's full expense and payment history.
///
/// - The payer of an expense is credited the whole amount.
/// - Each participant is debited an equal share of it.
/// - A payment credits the sender and debits the receiver, as if the sender had
///   prepaid that much of their debt.
///
/// Every record is checked against `members` before anything is summed, so a
/// single bad record fails the whole computation. A running balance that would
/// leave the `Decimal` range fails it too, with [`SettlementError::AmountOverflow`].
pub fn compute_balances(
    members: &[Member],
    expenses: &[Expense],
    payments: &[Payment],
) -> Result<Balances, SettlementError> {
    if members.is_empty() {
        return Err(SettlementError::EmptyMembers);
    }

    let known: HashSet<MemberId> = members.iter().map(|m| m.id).collect();

    for expense in expenses {
        expense
            .check(&known)
            .map_err(|problem| SettlementError::InvalidExpense {
                id: expense.id,
                problem,
            })?;
    }
    for payment in payments {
        payment
            .check(&known)
            .map_err(|problem| SettlementError::InvalidPayment {
                id: payment.id,
                problem,
            })?;
    }

    let mut balances: Balances = members.iter().map(|m| (m.id, Amount::ZERO)).collect();

    for expense in expenses {
        balances.credit(expense.payer, expense.amount)?;
        let share = expense.amount / Amount::from(expense.participants.len());
        for participant in &expense.participants {
            balances.credit(*participant, -share)?;
        }
    }

    for payment in payments {
        balances.credit(payment.from, payment.amount)?;
        balances.credit(payment.to, -payment.amount)?;
    }

    Ok(balances)
}

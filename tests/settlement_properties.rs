use chrono::NaiveDate;
use proptest::prelude::*;
use uuid::Uuid;
use wander::domain::{
    Amount, Expense, Member, MemberRole, Payment, compute_balances, is_settled, plan_settlement,
};

fn members(count: usize) -> Vec<Member> {
    let trip = Uuid::new_v4();
    (0..count)
        .map(|i| Member::new(trip, format!("member-{i}"), MemberRole::Editor))
        .collect()
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 8, 1).unwrap()
}

/// Expenses whose amount is a whole number of units per participant, so every
/// balance is an exact integer and the planner has nothing to round.
fn expenses(
    members: &[Member],
    shares: &[u64],
    payers: &[usize],
    masks: &[usize],
) -> Vec<Expense> {
    let n = members.len();
    shares
        .iter()
        .zip(payers)
        .zip(masks)
        .map(|((share, payer), mask)| {
            let mut participants: Vec<_> = (0..n)
                .filter(|i| mask & (1 << i) != 0)
                .map(|i| members[i].id)
                .collect();
            if participants.is_empty() {
                participants.push(members[mask % n].id);
            }
            let amount = Amount::from(*share) * Amount::from(participants.len());
            Expense::new(members[0].trip_id, members[payer % n].id, amount, participants, day())
        })
        .collect()
}

proptest! {
    #[test]
    fn balances_sum_to_zero(
        member_count in 1usize..=6,
        shares in prop::collection::vec(1u64..=5_000, 0..=20),
        payers in prop::collection::vec(0usize..=5, 20),
        masks in prop::collection::vec(0usize..=63, 20),
    ) {
        let members = members(member_count);
        let expenses = expenses(&members, &shares, &payers, &masks);

        let balances = compute_balances(&members, &expenses, &[]).unwrap();
        prop_assert_eq!(balances.len(), member_count);
        prop_assert_eq!(balances.total(), Some(Amount::ZERO));
    }
}

proptest! {
    #[test]
    fn settlement_clears_every_balance(
        member_count in 2usize..=6,
        shares in prop::collection::vec(1u64..=5_000, 1..=20),
        payers in prop::collection::vec(0usize..=5, 20),
        masks in prop::collection::vec(0usize..=63, 20),
    ) {
        let members = members(member_count);
        let expenses = expenses(&members, &shares, &payers, &masks);
        let balances = compute_balances(&members, &expenses, &[]).unwrap();

        let transfers = plan_settlement(&balances);

        for transfer in &transfers {
            prop_assert!(transfer.amount > Amount::ZERO);
            prop_assert_ne!(transfer.from, transfer.to);
        }

        let unsettled = balances.iter().filter(|(_, b)| !is_settled(*b)).count();
        prop_assert!(transfers.len() <= unsettled.saturating_sub(1));
        prop_assert!(balances.apply(&transfers).is_settled());
    }
}

proptest! {
    #[test]
    fn paying_the_plan_leaves_nothing_to_settle(
        member_count in 2usize..=6,
        shares in prop::collection::vec(1u64..=5_000, 1..=20),
        payers in prop::collection::vec(0usize..=5, 20),
        masks in prop::collection::vec(0usize..=63, 20),
    ) {
        let members = members(member_count);
        let expenses = expenses(&members, &shares, &payers, &masks);
        let balances = compute_balances(&members, &expenses, &[]).unwrap();

        let first = plan_settlement(&balances);
        prop_assert_eq!(&first, &plan_settlement(&balances));

        let payments: Vec<Payment> = first
            .iter()
            .map(|t| Payment::new(members[0].trip_id, t.from, t.to, t.amount, day()))
            .collect();

        let after = compute_balances(&members, &expenses, &payments).unwrap();
        prop_assert!(after.is_settled());
        prop_assert!(plan_settlement(&after).is_empty());
    }
}

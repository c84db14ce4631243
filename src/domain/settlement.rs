use serde::{Deserialize, Serialize};

use super::{Amount, Balances, EPSILON, MemberId};

/// An instruction for `from` to pay `amount` to `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: MemberId,
    pub to: MemberId,
    pub amount: Amount,
}

struct Position {
    member: MemberId,
    remaining: Amount,
}

/// Turn signed balances into a list of pairwise transfers that settles everyone.
///
/// Greedy largest-vs-largest matching: debtors and creditors are each sorted by
/// magnitude (stable, so ties keep input order), then the largest remaining
/// debtor pays the largest remaining creditor the smaller of the two amounts.
/// Parties within [`EPSILON`] of zero are treated as settled and skipped.
///
/// This usually needs few transfers but is not guaranteed to find the minimum;
/// that problem reduces to subset-sum partitioning and is not attempted.
pub fn plan_settlement(balances: &Balances) -> Vec<Transfer> {
    let mut debtors: Vec<Position> = balances
        .iter()
        .filter(|(_, balance)| *balance < -EPSILON)
        .map(|(member, balance)| Position {
            member,
            remaining: -balance,
        })
        .collect();

    let mut creditors: Vec<Position> = balances
        .iter()
        .filter(|(_, balance)| *balance > EPSILON)
        .map(|(member, balance)| Position {
            member,
            remaining: balance,
        })
        .collect();

    debtors.sort_by(|a, b| b.remaining.cmp(&a.remaining));
    creditors.sort_by(|a, b| b.remaining.cmp(&a.remaining));

    let mut transfers = Vec::with_capacity(debtors.len().max(creditors.len()));
    let (mut d, mut c) = (0, 0);

    while d < debtors.len() && c < creditors.len() {
        let debtor = &mut debtors[d];
        let creditor = &mut creditors[c];
        let amount = debtor.remaining.min(creditor.remaining);

        transfers.push(Transfer {
            from: debtor.member,
            to: creditor.member,
            amount,
        });

        debtor.remaining -= amount;
        creditor.remaining -= amount;

        if debtor.remaining < EPSILON {
            d += 1;
        }
        if creditor.remaining < EPSILON {
            c += 1;
        }
    }

    transfers
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;

    fn ids<const N: usize>() -> [MemberId; N] {
        std::array::from_fn(|_| Uuid::new_v4())
    }

    fn balances(entries: &[(MemberId, Amount)]) -> Balances {
        entries.iter().copied().collect()
    }

    #[rstest]
    #[case::one_creditor_two_debtors(
        &[dec!(60), dec!(-30), dec!(-30)],
        vec![(1, 0, dec!(30)), (2, 0, dec!(30))]
    )]
    #[case::two_people(
        &[dec!(50), dec!(-50)],
        vec![(1, 0, dec!(50))]
    )]
    #[case::already_settled(
        &[dec!(0), dec!(0), dec!(0)],
        vec![]
    )]
    #[case::dust_is_ignored(
        &[dec!(0.005), dec!(-0.005)],
        vec![]
    )]
    #[case::largest_debtor_pays_first(
        &[dec!(-10), dec!(-70), dec!(80)],
        vec![(1, 2, dec!(70)), (0, 2, dec!(10))]
    )]
    #[case::debtor_split_across_creditors(
        &[dec!(30), dec!(-100), dec!(70)],
        vec![(1, 2, dec!(70)), (1, 0, dec!(30))]
    )]
    #[case::ties_keep_input_order(
        &[dec!(-25), dec!(-25), dec!(25), dec!(25)],
        vec![(0, 2, dec!(25)), (1, 3, dec!(25))]
    )]
    fn plan_settlement_cases(
        #[case] amounts: &[Amount],
        #[case] expected: Vec<(usize, usize, Amount)>,
    ) {
        let members: Vec<MemberId> = amounts.iter().map(|_| Uuid::new_v4()).collect();
        let input: Balances = members.iter().copied().zip(amounts.iter().copied()).collect();

        let transfers = plan_settlement(&input);

        let expected: Vec<Transfer> = expected
            .into_iter()
            .map(|(from, to, amount)| Transfer {
                from: members[from],
                to: members[to],
                amount,
            })
            .collect();
        assert_eq!(transfers, expected);
    }

    #[test]
    fn test_plan_settles_everyone() {
        let [a, b, c, d] = ids::<4>();
        let input = balances(&[
            (a, dec!(45.50)),
            (b, dec!(-20.25)),
            (c, dec!(-30)),
            (d, dec!(4.75)),
        ]);

        let transfers = plan_settlement(&input);

        assert!(input.apply(&transfers).is_settled());
        assert!(transfers.iter().all(|t| t.amount > Amount::ZERO));
    }

    #[test]
    fn test_plan_is_deterministic() {
        let [a, b, c] = ids::<3>();
        let input = balances(&[(a, dec!(-10)), (b, dec!(-10)), (c, dec!(20))]);

        assert_eq!(plan_settlement(&input), plan_settlement(&input));
    }

    #[test]
    fn test_plan_handles_repeating_decimals() {
        let [a, b, c] = ids::<3>();
        let third = dec!(100) / dec!(3);
        let input = balances(&[(a, dec!(100) - third), (b, -third), (c, -third)]);

        let transfers = plan_settlement(&input);

        assert_eq!(transfers.len(), 2);
        assert!(transfers.iter().all(|t| t.to == a));
        assert!(input.apply(&transfers).is_settled());
    }

    #[test]
    fn test_empty_balances() {
        assert!(plan_settlement(&Balances::new()).is_empty());
    }
}

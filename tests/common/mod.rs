// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use tempfile::TempDir;
use wander::application::{NewExpense, TripService};
use wander::domain::{Amount, Expense, Member, MemberRole, Trip};

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(TripService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = TripService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Test fixture: a trip with the given members, in join order
#[derive(Debug)]
pub struct TripFixture {
    pub trip: Trip,
    pub members: Vec<Member>,
}

impl TripFixture {
    pub async fn create(service: &TripService, name: &str, members: &[&str]) -> Result<Self> {
        let trip = service
            .create_trip(
                name.to_string(),
                "Lisbon".to_string(),
                "EUR".to_string(),
                Some(parse_date("2024-05-01")),
                Some(parse_date("2024-05-07")),
                None,
            )
            .await?;

        let mut created = Vec::new();
        for member in members {
            created.push(
                service
                    .add_member(trip.id, member.to_string(), MemberRole::Editor)
                    .await?,
            );
        }

        Ok(Self {
            trip,
            members: created,
        })
    }

    /// Member by name; panics if the fixture has no such member
    pub fn member(&self, name: &str) -> &Member {
        self.members.iter().find(|m| m.name == name).unwrap()
    }

    /// Record an expense paid by `payer` and split between `split`
    pub async fn expense(
        &self,
        service: &TripService,
        payer: &str,
        amount: Amount,
        split: &[&str],
    ) -> Result<Expense> {
        let expense = service
            .add_expense(
                self.trip.id,
                NewExpense {
                    payer: self.member(payer).id,
                    amount,
                    participants: split.iter().map(|n| self.member(n).id).collect(),
                    date: parse_date("2024-05-02"),
                    category: String::new(),
                    description: String::new(),
                },
            )
            .await?;
        Ok(expense)
    }
}

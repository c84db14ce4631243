use std::collections::HashMap;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::TripService;
use crate::domain::{Expense, Member, MemberId, Payment, Transfer, Trip, TripId, format_amount};

/// Trip snapshot for full JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub trip: Trip,
    pub members: Vec<Member>,
    pub expenses: Vec<Expense>,
    pub payments: Vec<Payment>,
    /// Settlement plan at export time; recomputed on every export
    pub settlement: Vec<Transfer>,
}

/// Exporter for converting a trip's ledger to various formats
pub struct Exporter<'a> {
    service: &'a TripService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a TripService) -> Self {
        Self { service }
    }

    /// Export expenses to CSV format
    pub async fn export_expenses_csv<W: Write>(&self, trip_id: TripId, writer: W) -> Result<usize> {
        let expenses = self.service.list_expenses(trip_id).await?;
        let names = self.service.get_member_names(trip_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "date",
            "payer",
            "amount",
            "participants",
            "category",
            "description",
        ])?;

        for expense in &expenses {
            let participants: Vec<&str> = expense
                .participants
                .iter()
                .map(|id| name_of(&names, id))
                .collect();

            csv_writer.write_record([
                expense.id.to_string(),
                expense.date.to_string(),
                name_of(&names, &expense.payer).to_string(),
                expense.amount.to_string(),
                participants.join(";"),
                expense.category.clone(),
                expense.description.clone(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(expenses.len())
    }

    /// Export recorded payments to CSV format
    pub async fn export_payments_csv<W: Write>(&self, trip_id: TripId, writer: W) -> Result<usize> {
        let payments = self.service.list_payments(trip_id).await?;
        let names = self.service.get_member_names(trip_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "date", "from", "to", "amount"])?;

        for payment in &payments {
            csv_writer.write_record([
                payment.id.to_string(),
                payment.date.to_string(),
                name_of(&names, &payment.from).to_string(),
                name_of(&names, &payment.to).to_string(),
                payment.amount.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(payments.len())
    }

    /// Export the current settlement plan to CSV format
    pub async fn export_settlement_csv<W: Write>(
        &self,
        trip_id: TripId,
        writer: W,
    ) -> Result<usize> {
        let transfers = self.service.compute_settlement(trip_id).await?;
        let names = self.service.get_member_names(trip_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["from", "to", "amount"])?;

        for transfer in &transfers {
            csv_writer.write_record([
                name_of(&names, &transfer.from),
                name_of(&names, &transfer.to),
                &format_amount(transfer.amount),
            ])?;
        }

        csv_writer.flush()?;
        Ok(transfers.len())
    }

    /// Export the whole trip as a JSON snapshot
    pub async fn export_trip_json<W: Write>(
        &self,
        trip_id: TripId,
        mut writer: W,
    ) -> Result<TripSnapshot> {
        let trip = self.service.get_trip_by_id(trip_id).await?;
        let members = self.service.list_members(trip_id).await?;
        let expenses = self.service.list_expenses(trip_id).await?;
        let payments = self.service.list_payments(trip_id).await?;
        let settlement = self.service.compute_settlement(trip_id).await?;

        let snapshot = TripSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            trip,
            members,
            expenses,
            payments,
            settlement,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}

fn name_of<'n>(names: &'n HashMap<MemberId, String>, id: &MemberId) -> &'n str {
    names.get(id).map(String::as_str).unwrap_or("(unknown)")
}

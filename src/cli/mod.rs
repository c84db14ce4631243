use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use uuid::Uuid;

use crate::application::{DEMO_TRIP, ExpenseUpdate, NewExpense, TripService, TripUpdate};
use crate::domain::{MemberId, MemberRole, TripId, TripStatus, format_amount, parse_amount};

/// Wander - Group Trip Ledger
#[derive(Parser)]
#[command(name = "wander")]
#[command(about = "Track shared trip expenses and work out who owes whom")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "WANDER_DATABASE", default_value = "wander.db")]
    pub database: String,

    /// Enable verbose output (debug logging on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Create a sample trip with a few members and expenses
    Demo,

    /// Trip management commands
    #[command(subcommand)]
    Trip(TripCommands),

    /// Member management commands
    #[command(subcommand)]
    Member(MemberCommands),

    /// Expense management commands
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// List settlement payments recorded for a trip
    Payments {
        /// Trip name
        #[arg(short, long)]
        trip: String,
    },

    /// Show each member's net balance
    Balances {
        /// Trip name
        #[arg(short, long)]
        trip: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Work out who should pay whom to settle the trip
    Settle {
        /// Trip name
        #[arg(short, long)]
        trip: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Record that one member paid another (marks a settlement transfer as paid)
    Pay {
        /// Amount paid (e.g., "50.00" or "50")
        amount: String,

        /// Trip name
        #[arg(short, long)]
        trip: String,

        /// Member who paid
        #[arg(long)]
        from: String,

        /// Member who received the money
        #[arg(long)]
        to: String,

        /// Date of the payment (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Spending overview: totals, categories and per-member figures
    Summary {
        /// Trip name
        #[arg(short, long)]
        trip: String,
    },

    /// Export trip data to CSV or JSON
    Export {
        /// What to export
        #[arg(value_enum)]
        export_type: ExportKind,

        /// Trip name
        #[arg(short, long)]
        trip: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Export formats
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportKind {
    /// Expenses as CSV
    Expenses,
    /// Recorded payments as CSV
    Payments,
    /// Current settlement plan as CSV
    Settlement,
    /// Whole trip as a JSON snapshot
    Full,
}

#[derive(Subcommand)]
pub enum TripCommands {
    /// Create a new trip
    Create {
        /// Trip name (must be unique)
        name: String,

        /// Where the trip goes
        #[arg(long, default_value = "")]
        destination: String,

        /// Currency code used for display (e.g., EUR, USD)
        #[arg(short, long, default_value = "EUR")]
        currency: String,

        /// First day of the trip (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// Last day of the trip (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,

        /// Name of the organiser, added as the trip admin
        #[arg(long)]
        owner: Option<String>,
    },

    /// List trips
    List {
        /// Include archived trips
        #[arg(long)]
        all: bool,
    },

    /// Show trip details
    Show {
        /// Trip name
        name: String,
    },

    /// Change trip details
    Update {
        /// Trip name
        name: String,

        /// New trip name
        #[arg(long)]
        rename: Option<String>,

        /// New destination
        #[arg(long)]
        destination: Option<String>,

        /// New first day (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// New last day (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
    },

    /// Change trip status: active, finished, archived
    Status {
        /// Trip name
        name: String,

        /// New status
        status: String,
    },
}

#[derive(Subcommand)]
pub enum MemberCommands {
    /// Add a member to a trip
    Add {
        /// Member name (unique within the trip)
        name: String,

        /// Trip name
        #[arg(short, long)]
        trip: String,

        /// Role: admin, editor, viewer
        #[arg(short, long, default_value = "editor")]
        role: String,
    },

    /// List trip members
    List {
        /// Trip name
        #[arg(short, long)]
        trip: String,
    },

    /// Rename a member
    Rename {
        /// Current name
        name: String,

        /// New name
        new_name: String,

        /// Trip name
        #[arg(short, long)]
        trip: String,
    },
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record a shared expense
    Add {
        /// Amount spent (e.g., "90.00" or "90")
        amount: String,

        /// Trip name
        #[arg(short, long)]
        trip: String,

        /// Member who paid
        #[arg(short, long)]
        payer: String,

        /// Members sharing the cost, comma separated (defaults to everyone)
        #[arg(short, long, value_delimiter = ',')]
        split: Vec<String>,

        /// Category (e.g., "food", "transport")
        #[arg(short, long, default_value = "")]
        category: String,

        /// Description of the expense
        #[arg(short, long, default_value = "")]
        description: String,

        /// Date of the expense (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// List the expenses of a trip
    List {
        /// Trip name
        #[arg(short, long)]
        trip: String,
    },

    /// Edit an expense
    Edit {
        /// Expense ID
        id: String,

        /// New amount
        #[arg(short, long)]
        amount: Option<String>,

        /// New payer
        #[arg(short, long)]
        payer: Option<String>,

        /// New participants, comma separated
        #[arg(short, long, value_delimiter = ',')]
        split: Option<Vec<String>>,

        /// New category
        #[arg(short, long)]
        category: Option<String>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,

        /// New date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete an expense
    Delete {
        /// Expense ID
        id: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                TripService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Demo => {
                let service = TripService::connect(&self.database).await?;
                let trip = service.seed_demo().await?;
                println!("Created sample trip: {}", trip.name);
                println!("Try: wander settle --trip \"{}\"", DEMO_TRIP);
            }

            Commands::Trip(trip_cmd) => {
                let service = TripService::connect(&self.database).await?;
                run_trip_command(&service, trip_cmd).await?;
            }

            Commands::Member(member_cmd) => {
                let service = TripService::connect(&self.database).await?;
                run_member_command(&service, member_cmd).await?;
            }

            Commands::Expense(expense_cmd) => {
                let service = TripService::connect(&self.database).await?;
                run_expense_command(&service, expense_cmd).await?;
            }

            Commands::Payments { trip } => {
                let service = TripService::connect(&self.database).await?;
                run_payments_command(&service, &trip).await?;
            }

            Commands::Balances { trip, json } => {
                let service = TripService::connect(&self.database).await?;
                run_balances_command(&service, &trip, json).await?;
            }

            Commands::Settle { trip, json } => {
                let service = TripService::connect(&self.database).await?;
                run_settle_command(&service, &trip, json).await?;
            }

            Commands::Pay {
                amount,
                trip,
                from,
                to,
                date,
            } => {
                let service = TripService::connect(&self.database).await?;
                let trip = service.get_trip(&trip).await?;
                let amount = parse_amount(&amount)
                    .context("Invalid amount format. Use '50.00' or '50'")?;
                let from = service.get_member(trip.id, &from).await?;
                let to = service.get_member(trip.id, &to).await?;
                let date = parse_optional_date(date)?.unwrap_or_else(today);

                let payment = service
                    .record_settlement_payment(trip.id, from.id, to.id, amount, date)
                    .await?;

                println!(
                    "Recorded payment: {} {} -> {} ({})",
                    format_amount(payment.amount),
                    from.name,
                    to.name,
                    payment.id
                );
            }

            Commands::Summary { trip } => {
                let service = TripService::connect(&self.database).await?;
                run_summary_command(&service, &trip).await?;
            }

            Commands::Export {
                export_type,
                trip,
                output,
            } => {
                let service = TripService::connect(&self.database).await?;
                let trip = service.get_trip(&trip).await?;
                run_export_command(&service, trip.id, export_type, output.as_deref()).await?;
            }
        }

        Ok(())
    }
}

async fn run_trip_command(service: &TripService, cmd: TripCommands) -> Result<()> {
    match cmd {
        TripCommands::Create {
            name,
            destination,
            currency,
            start,
            end,
            owner,
        } => {
            let start = parse_optional_date(start).context("Invalid start date")?;
            let end = parse_optional_date(end).context("Invalid end date")?;

            let trip = service
                .create_trip(name, destination, currency, start, end, owner)
                .await?;
            println!("Created trip: {} ({})", trip.name, trip.currency);
        }

        TripCommands::List { all } => {
            let trips = service.list_trips(all).await?;
            if trips.is_empty() {
                println!("No trips found.");
            } else {
                println!(
                    "{:<24} {:<20} {:<10} {:<8}",
                    "NAME", "DESTINATION", "STATUS", "CURRENCY"
                );
                println!("{}", "-".repeat(65));
                for trip in trips {
                    println!(
                        "{:<24} {:<20} {:<10} {:<8}",
                        truncate(&trip.name, 24),
                        truncate(&trip.destination, 20),
                        trip.status,
                        trip.currency
                    );
                }
            }
        }

        TripCommands::Show { name } => {
            let trip = service.get_trip(&name).await?;
            let members = service.list_members(trip.id).await?;
            let expenses = service.list_expenses(trip.id).await?;

            println!("Trip: {}", trip.name);
            println!("  ID:          {}", trip.id);
            println!("  Destination: {}", trip.destination);
            println!("  Status:      {}", trip.status);
            println!("  Currency:    {}", trip.currency);
            if let Some(start) = trip.start_date {
                println!("  Starts:      {}", start);
            }
            if let Some(end) = trip.end_date {
                println!("  Ends:        {}", end);
            }
            if let Some(days) = trip.duration_days() {
                println!("  Duration:    {} days", days);
            }
            println!(
                "  Created:     {}",
                trip.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!();
            println!("  Members:     {}", members.len());
            println!("  Expenses:    {}", expenses.len());
        }

        TripCommands::Update {
            name,
            rename,
            destination,
            start,
            end,
        } => {
            let update = TripUpdate {
                name: rename,
                destination,
                start_date: parse_optional_date(start).context("Invalid start date")?,
                end_date: parse_optional_date(end).context("Invalid end date")?,
                status: None,
            };
            let trip = service.update_trip(&name, update).await?;
            println!("Updated trip: {}", trip.name);
        }

        TripCommands::Status { name, status } => {
            let status: TripStatus = status.parse().map_err(|e| {
                anyhow::anyhow!("{}. Valid statuses: active, finished, archived", e)
            })?;
            let update = TripUpdate {
                status: Some(status),
                ..TripUpdate::default()
            };
            let trip = service.update_trip(&name, update).await?;
            println!("Trip {} is now {}", trip.name, trip.status);
        }
    }
    Ok(())
}

async fn run_member_command(service: &TripService, cmd: MemberCommands) -> Result<()> {
    match cmd {
        MemberCommands::Add { name, trip, role } => {
            let trip = service.get_trip(&trip).await?;
            let role: MemberRole = role
                .parse()
                .map_err(|e| anyhow::anyhow!("{}. Valid roles: admin, editor, viewer", e))?;

            let member = service.add_member(trip.id, name, role).await?;
            println!("Added {} to {} ({})", member.name, trip.name, member.role);
        }

        MemberCommands::List { trip } => {
            let trip = service.get_trip(&trip).await?;
            let members = service.list_members(trip.id).await?;
            if members.is_empty() {
                println!("No members in {}.", trip.name);
            } else {
                println!("{:<24} {:<8}", "NAME", "ROLE");
                println!("{}", "-".repeat(33));
                for member in members {
                    println!("{:<24} {:<8}", truncate(&member.name, 24), member.role);
                }
            }
        }

        MemberCommands::Rename {
            name,
            new_name,
            trip,
        } => {
            let trip = service.get_trip(&trip).await?;
            let member = service.rename_member(trip.id, &name, new_name).await?;
            println!("Renamed {} to {}", name, member.name);
        }
    }
    Ok(())
}

async fn run_expense_command(service: &TripService, cmd: ExpenseCommands) -> Result<()> {
    match cmd {
        ExpenseCommands::Add {
            amount,
            trip,
            payer,
            split,
            category,
            description,
            date,
        } => {
            let trip = service.get_trip(&trip).await?;
            let amount =
                parse_amount(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
            let payer = service.get_member(trip.id, &payer).await?;
            let participants = if split.is_empty() {
                service
                    .list_members(trip.id)
                    .await?
                    .into_iter()
                    .map(|m| m.id)
                    .collect()
            } else {
                resolve_members(service, trip.id, &split).await?
            };
            let date = parse_optional_date(date)?.unwrap_or_else(today);

            let expense = service
                .add_expense(
                    trip.id,
                    NewExpense {
                        payer: payer.id,
                        amount,
                        participants,
                        date,
                        category,
                        description,
                    },
                )
                .await?;

            println!(
                "Recorded expense: {} paid by {}, split {} ways ({})",
                format_amount(expense.amount),
                payer.name,
                expense.participants.len(),
                expense.id
            );
        }

        ExpenseCommands::List { trip } => {
            let trip = service.get_trip(&trip).await?;
            let expenses = service.list_expenses(trip.id).await?;

            if expenses.is_empty() {
                println!("No expenses in {}.", trip.name);
            } else {
                let names = service.get_member_names(trip.id).await?;

                println!(
                    "{:<12} {:>10} {:<15} {:<12} {:<6} DESCRIPTION",
                    "DATE", "AMOUNT", "PAID BY", "CATEGORY", "SPLIT"
                );
                println!("{}", "-".repeat(80));

                for expense in &expenses {
                    let payer = names.get(&expense.payer).map(String::as_str).unwrap_or("?");
                    println!(
                        "{:<12} {:>10} {:<15} {:<12} {:<6} {}",
                        expense.date,
                        format_amount(expense.amount),
                        truncate(payer, 15),
                        truncate(&expense.category, 12),
                        expense.participants.len(),
                        truncate(&expense.description, 30)
                    );
                    println!("{:<12} id: {}", "", expense.id);
                }
            }
        }

        ExpenseCommands::Edit {
            id,
            amount,
            payer,
            split,
            category,
            description,
            date,
        } => {
            let expense_id =
                Uuid::parse_str(&id).context("Invalid expense ID format (expected UUID)")?;
            let expense = service.get_expense(expense_id).await?;
            let trip_id = expense.trip_id;

            let payer = match payer {
                Some(name) => Some(service.get_member(trip_id, &name).await?.id),
                None => None,
            };
            let participants = match split {
                Some(names) => Some(resolve_members(service, trip_id, &names).await?),
                None => None,
            };

            let update = ExpenseUpdate {
                payer,
                amount: amount
                    .map(|a| parse_amount(&a))
                    .transpose()
                    .context("Invalid amount format. Use '50.00' or '50'")?,
                participants,
                date: parse_optional_date(date)?,
                category,
                description,
            };

            let updated = service.update_expense(expense_id, update).await?;
            println!(
                "Updated expense {}: {} split {} ways",
                updated.id,
                format_amount(updated.amount),
                updated.participants.len()
            );
        }

        ExpenseCommands::Delete { id } => {
            let expense_id =
                Uuid::parse_str(&id).context("Invalid expense ID format (expected UUID)")?;
            let expense = service.delete_expense(expense_id).await?;
            println!(
                "Deleted expense: {} {}",
                format_amount(expense.amount),
                expense.description
            );
        }
    }
    Ok(())
}

async fn run_payments_command(service: &TripService, trip: &str) -> Result<()> {
    let trip = service.get_trip(trip).await?;
    let payments = service.list_payments(trip.id).await?;

    if payments.is_empty() {
        println!("No payments recorded for {}.", trip.name);
        return Ok(());
    }

    let names = service.get_member_names(trip.id).await?;
    println!("{:<12} {:>10} {:<15} {:<15}", "DATE", "AMOUNT", "FROM", "TO");
    println!("{}", "-".repeat(55));
    for payment in payments {
        let from = names.get(&payment.from).map(String::as_str).unwrap_or("?");
        let to = names.get(&payment.to).map(String::as_str).unwrap_or("?");
        println!(
            "{:<12} {:>10} {:<15} {:<15}",
            payment.date,
            format_amount(payment.amount),
            truncate(from, 15),
            truncate(to, 15)
        );
    }
    Ok(())
}

async fn run_balances_command(service: &TripService, trip: &str, as_json: bool) -> Result<()> {
    let trip = service.get_trip(trip).await?;
    let entries = service.get_member_balances(trip.id).await?;

    if as_json {
        let rows: Vec<_> = entries
            .iter()
            .map(|entry| {
                json!({
                    "member": entry.member.name,
                    "balance": format_amount(entry.balance),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:<24} {:>12} {:<8}", "MEMBER", "BALANCE", "CURRENCY");
    println!("{}", "-".repeat(46));
    for entry in entries {
        println!(
            "{:<24} {:>12} {:<8}",
            truncate(&entry.member.name, 24),
            format_amount(entry.balance),
            trip.currency
        );
    }
    Ok(())
}

async fn run_settle_command(service: &TripService, trip: &str, as_json: bool) -> Result<()> {
    let trip = service.get_trip(trip).await?;
    let transfers = service.compute_settlement(trip.id).await?;
    let names = service.get_member_names(trip.id).await?;
    let name_of = |id: &MemberId| names.get(id).map(String::as_str).unwrap_or("?");

    if as_json {
        let rows: Vec<_> = transfers
            .iter()
            .map(|t| {
                json!({
                    "from": name_of(&t.from),
                    "to": name_of(&t.to),
                    "amount": format_amount(t.amount),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if transfers.is_empty() {
        println!("Everyone in {} is settled up.", trip.name);
        return Ok(());
    }

    println!("{:<20} {:<20} {:>12}", "FROM", "TO", "AMOUNT");
    println!("{}", "-".repeat(54));
    for transfer in &transfers {
        println!(
            "{:<20} {:<20} {:>12}",
            truncate(name_of(&transfer.from), 20),
            truncate(name_of(&transfer.to), 20),
            format!("{} {}", format_amount(transfer.amount), trip.currency)
        );
    }
    Ok(())
}

async fn run_summary_command(service: &TripService, trip: &str) -> Result<()> {
    let trip = service.get_trip(trip).await?;
    let summary = service.get_trip_summary(trip.id).await?;
    let currency = &summary.trip.currency;

    println!("Trip: {} ({})", summary.trip.name, summary.trip.destination);
    println!(
        "Total spent: {} {} across {} expense(s)",
        format_amount(summary.total_spent),
        currency,
        summary.expense_count
    );

    if !summary.categories.is_empty() {
        println!();
        println!("{:<16} {:>12} {:>6} {:>7}", "CATEGORY", "TOTAL", "COUNT", "SHARE");
        println!("{}", "-".repeat(44));
        for category in &summary.categories {
            println!(
                "{:<16} {:>12} {:>6} {:>6.1}%",
                truncate(&category.category, 16),
                format_amount(category.total),
                category.count,
                category.percentage
            );
        }
    }

    println!();
    println!(
        "{:<20} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "MEMBER", "PAID", "SHARE", "SENT", "RECEIVED", "BALANCE"
    );
    println!("{}", "-".repeat(76));
    for member in &summary.members {
        println!(
            "{:<20} {:>10} {:>10} {:>10} {:>10} {:>10}",
            truncate(&member.name, 20),
            format_amount(member.paid),
            format_amount(member.share),
            format_amount(member.payments_sent),
            format_amount(member.payments_received),
            format_amount(member.balance)
        );
    }
    Ok(())
}

async fn run_export_command(
    service: &TripService,
    trip_id: TripId,
    export_type: ExportKind,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    // Determine output writer
    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        ExportKind::Expenses => {
            let count = exporter.export_expenses_csv(trip_id, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} expenses", count);
            }
        }
        ExportKind::Payments => {
            let count = exporter.export_payments_csv(trip_id, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} payments", count);
            }
        }
        ExportKind::Settlement => {
            let count = exporter.export_settlement_csv(trip_id, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} transfers", count);
            }
        }
        ExportKind::Full => {
            let snapshot = exporter.export_trip_json(trip_id, writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported trip {}: {} members, {} expenses, {} payments",
                    snapshot.trip.name,
                    snapshot.members.len(),
                    snapshot.expenses.len(),
                    snapshot.payments.len()
                );
            }
        }
    }

    Ok(())
}

async fn resolve_members(
    service: &TripService,
    trip_id: TripId,
    names: &[String],
) -> Result<Vec<MemberId>> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        ids.push(service.get_member(trip_id, name.trim()).await?.id);
    }
    Ok(ids)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))
}

fn parse_optional_date(date: Option<String>) -> Result<Option<NaiveDate>> {
    date.map(|s| parse_date(&s)).transpose()
}

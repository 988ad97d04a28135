use chrono::NaiveDate;
use clap::Subcommand;
use rust_decimal::Decimal;
use serde_json::json;

use crate::cli::utils::{output_empty_collection, output_success, output_value};
use crate::cli::OutputFormat;
use crate::client::NvlpClient;
use crate::filter::TransactionFilter;
use crate::models::{CreateTransactionRequest, Transaction, TransactionType, UpdateTransactionRequest};
use crate::token::TokenStorage;

#[derive(Subcommand)]
pub enum TransactionCommands {
    #[command(about = "List transactions in a budget")]
    List {
        #[arg(help = "Budget ID")]
        budget_id: String,
        #[arg(long, help = "Only on or after this date (YYYY-MM-DD)")]
        start_date: Option<NaiveDate>,
        #[arg(long, help = "Only on or before this date (YYYY-MM-DD)")]
        end_date: Option<NaiveDate>,
        #[arg(long = "type", help = "income, allocation, expense, transfer or debt_payment")]
        transaction_type: Option<TransactionType>,
        #[arg(long, help = "Touching this envelope on either side")]
        envelope: Option<String>,
        #[arg(long)]
        payee: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        offset: Option<i64>,
    },

    #[command(about = "Show one transaction")]
    Get {
        #[arg(help = "Transaction ID")]
        id: String,
    },

    #[command(about = "Create a transaction")]
    Create {
        #[arg(help = "Budget ID")]
        budget_id: String,
        #[arg(help = "income, allocation, expense, transfer or debt_payment")]
        transaction_type: TransactionType,
        #[arg(help = "Amount, greater than zero")]
        amount: Decimal,
        #[arg(long, help = "Defaults to today")]
        date: Option<NaiveDate>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        from_envelope: Option<String>,
        #[arg(long)]
        to_envelope: Option<String>,
        #[arg(long)]
        payee: Option<String>,
        #[arg(long)]
        income_source: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        cleared: bool,
    },

    #[command(about = "Mark a transaction cleared or reconciled")]
    Update {
        #[arg(help = "Transaction ID")]
        id: String,
        #[arg(long)]
        cleared: Option<bool>,
        #[arg(long)]
        reconciled: Option<bool>,
        #[arg(long)]
        description: Option<String>,
    },

    #[command(about = "Delete a transaction")]
    Delete {
        #[arg(help = "Transaction ID")]
        id: String,
    },
}

fn print_transaction(tx: &Transaction) {
    println!(
        "{}  {}  {:<12} {:>10}  {}",
        tx.id,
        tx.transaction_date,
        tx.transaction_type,
        tx.amount,
        tx.description.as_deref().unwrap_or("")
    );
}

pub async fn handle<S: TokenStorage>(
    client: &NvlpClient<S>,
    cmd: TransactionCommands,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    match cmd {
        TransactionCommands::List {
            budget_id,
            start_date,
            end_date,
            transaction_type,
            envelope,
            payee,
            limit,
            offset,
        } => {
            let filter = TransactionFilter {
                start_date,
                end_date,
                transaction_type,
                envelope_id: envelope,
                payee_id: payee,
                limit,
                offset,
                ..Default::default()
            };
            let page = client.list_transactions(&budget_id, &filter).await?;
            if page.transactions.is_empty() {
                return output_empty_collection(&output_format, "transactions", "No transactions found");
            }
            output_value(&output_format, &page, |page| {
                page.transactions.iter().for_each(print_transaction);
            })
        }
        TransactionCommands::Get { id } => {
            let tx = client.get_transaction(&id).await?;
            output_value(&output_format, &tx, print_transaction)
        }
        TransactionCommands::Create {
            budget_id,
            transaction_type,
            amount,
            date,
            description,
            from_envelope,
            to_envelope,
            payee,
            income_source,
            category,
            cleared,
        } => {
            let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
            let mut request = CreateTransactionRequest::new(budget_id, transaction_type, amount, date);
            request.description = description;
            request.from_envelope_id = from_envelope;
            request.to_envelope_id = to_envelope;
            request.payee_id = payee;
            request.income_source_id = income_source;
            request.category_id = category;
            request.is_cleared = Some(cleared);

            if let Err(fields) = request.validate() {
                let details: Vec<String> =
                    fields.iter().map(|(field, msg)| format!("{}: {}", field, msg)).collect();
                anyhow::bail!("Invalid transaction: {}", details.join(", "));
            }

            let tx = client.create_transaction(&request).await?;
            output_success(
                &output_format,
                &format!("Created transaction {}", tx.id),
                Some(json!({ "transaction": tx })),
            )
        }
        TransactionCommands::Update { id, cleared, reconciled, description } => {
            let changes = UpdateTransactionRequest {
                description,
                is_cleared: cleared,
                is_reconciled: reconciled,
                ..Default::default()
            };
            if changes.is_empty() {
                anyhow::bail!("Nothing to update");
            }
            let tx = client.update_transaction(&id, &changes).await?;
            output_value(&output_format, &tx, print_transaction)
        }
        TransactionCommands::Delete { id } => {
            client.delete_transaction(&id).await?;
            output_success(&output_format, &format!("Deleted transaction {}", id), Some(json!({ "id": id })))
        }
    }
}

use crate::cli::utils::{output_empty_collection, output_value};
use crate::cli::OutputFormat;
use crate::client::NvlpClient;
use crate::token::TokenStorage;

pub async fn budgets<S: TokenStorage>(
    client: &NvlpClient<S>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let budgets = client.list_budgets().await?;
    if budgets.is_empty() {
        return output_empty_collection(&output_format, "budgets", "No budgets found");
    }
    output_value(&output_format, &budgets, |budgets| {
        for budget in budgets {
            let marker = if budget.is_active { "" } else { " (inactive)" };
            println!("{}  {}{}", budget.id, budget.name, marker);
        }
    })
}

pub async fn show<S: TokenStorage>(
    client: &NvlpClient<S>,
    budget_id: &str,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let dashboard = client.dashboard(budget_id).await?;
    output_value(&output_format, &dashboard, |dashboard| {
        let summary = &dashboard.envelopes_summary;
        println!("{}", dashboard.budget.name);
        println!(
            "Envelopes: {} ({} regular, {} savings, {} debt)",
            summary.total_envelopes, summary.regular_count, summary.savings_count, summary.debt_count
        );
        println!("Total balance: {}", summary.total_balance);
        println!("Total debt:    {}", summary.total_debt);
        if summary.negative_balance_count > 0 {
            println!("Overdrawn envelopes: {}", summary.negative_balance_count);
        }
        if summary.low_balance_count > 0 {
            println!("Low balance envelopes: {}", summary.low_balance_count);
        }
        println!();
        println!("Recent transactions:");
        for tx in &dashboard.recent_transactions {
            println!("  {}  {:<12} {:>10}", tx.transaction_date, tx.transaction_type, tx.amount);
        }
    })
}

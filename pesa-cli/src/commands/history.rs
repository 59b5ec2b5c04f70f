//! History command - list recent transactions

use anyhow::Result;
use colored::Colorize;

use pesa_core::domain::format_amount;
use pesa_core::services::TransactionFilter;
use pesa_core::TransactionStatus;

use super::signed_in_context;
use crate::output;

pub async fn run(filter: &str, search: Option<&str>, json: bool) -> Result<()> {
    let filter: TransactionFilter = filter.parse()?;
    let ctx = signed_in_context().await?;
    ctx.transactions.set_filter(filter);
    if let Some(query) = search {
        ctx.transactions.set_search(query);
    }
    let visible = ctx.transactions.visible();

    if json {
        return output::json(&visible);
    }
    if visible.is_empty() {
        output::warning("No transactions found.");
        return Ok(());
    }

    let wallet_id = ctx.wallet.wallet().map(|w| w.id).unwrap_or_default();
    let mut table = output::create_table();
    table.set_header(vec!["Date", "Reference", "Counterparty", "Amount", "Status"]);
    for tx in &visible {
        let signed = tx.signed_amount(&wallet_id);
        let amount = format_amount(signed, &tx.currency);
        let amount = if signed.is_sign_negative() {
            amount.red().to_string()
        } else {
            amount.green().to_string()
        };
        let status = match tx.status {
            TransactionStatus::Completed => tx.status.to_string(),
            TransactionStatus::Pending => tx.status.to_string().yellow().to_string(),
            _ => tx.status.to_string().red().to_string(),
        };
        table.add_row(vec![
            tx.created_at.format("%Y-%m-%d %H:%M").to_string(),
            tx.reference.clone(),
            tx.counterparty_name(&wallet_id).unwrap_or("-").to_string(),
            amount,
            status,
        ]);
    }
    println!("{}", table);
    println!("{} transaction(s) ({})", visible.len(), filter);
    Ok(())
}

//! Send command - transfer money to another wallet

use anyhow::Result;
use colored::Colorize;
use dialoguer::Confirm;

use pesa_core::domain::format_amount;
use pesa_core::services::TransferRequest;

use super::{parse_amount, signed_in_context};
use crate::output;

pub async fn run(
    wallet_id: &str,
    amount: &str,
    note: Option<String>,
    yes: bool,
    json: bool,
) -> Result<()> {
    let amount = parse_amount(amount)?;
    let ctx = signed_in_context().await?;
    let wallet = ctx
        .wallet
        .wallet()
        .ok_or_else(|| anyhow::anyhow!("No wallet found for this account"))?;

    // Catch limit problems before asking for confirmation
    wallet.check_transfer(amount).map_err(pesa_core::Error::Limit)?;

    let recipient = ctx
        .wallet
        .lookup_wallet(wallet_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No wallet with ID {}", wallet_id))?;

    if !yes {
        println!(
            "Send {} to {} ({})?",
            format_amount(amount, &wallet.currency).bold(),
            recipient.owner_name.bold(),
            recipient.wallet_id
        );
        if recipient.currency != wallet.currency {
            println!("The recipient will receive {}.", recipient.currency);
        }
        if !Confirm::new().with_prompt("Confirm").default(false).interact()? {
            output::warning("Cancelled");
            return Ok(());
        }
    }

    let pb = output::spinner("Sending...");
    let result = ctx
        .transactions
        .send_money(TransferRequest {
            receiver_wallet_id: recipient.wallet_id.clone(),
            amount,
            description: note,
        })
        .await;
    pb.finish_and_clear();
    let tx = result?;

    if json {
        return output::json(&tx);
    }
    output::success(&format!(
        "Sent {} to {}",
        format_amount(tx.amount, &tx.currency),
        recipient.owner_name
    ));
    if let (Some(converted), Some(code)) = (tx.converted_amount, &tx.converted_currency) {
        println!("They received {}", format_amount(converted, code));
    }
    println!("Reference: {}", tx.reference);
    println!("New balance: {}", ctx.wallet.display_balance());
    Ok(())
}

//! Currency command - preferred display currency and conversion

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use pesa_core::domain::currency::SUPPORTED_CURRENCIES;

use super::{parse_amount, signed_in_context};
use crate::output;

#[derive(Subcommand)]
pub enum CurrencyCommands {
    /// Show the preferred currency
    Show,
    /// Change the preferred currency
    Set {
        /// ISO code, e.g. KES
        code: String,
    },
    /// List supported currencies
    List,
    /// Convert an amount at the current rate
    Convert {
        amount: String,
        from: String,
        to: String,
    },
}

pub async fn run(command: Option<CurrencyCommands>) -> Result<()> {
    match command {
        Some(CurrencyCommands::List) => {
            let mut table = output::create_table();
            table.set_header(vec!["Code", "Symbol", "Name"]);
            for c in SUPPORTED_CURRENCIES {
                table.add_row(vec![c.code, c.symbol, c.name]);
            }
            println!("{}", table);
            Ok(())
        }
        Some(CurrencyCommands::Set { code }) => {
            let ctx = signed_in_context().await?;
            ctx.currency.set_currency(&code).await?;
            output::success(&format!("Preferred currency set to {}", ctx.currency.code()));
            Ok(())
        }
        Some(CurrencyCommands::Convert { amount, from, to }) => {
            let amount = parse_amount(&amount)?;
            let ctx = signed_in_context().await?;
            let converted = ctx.currency.convert(amount, &from, &to).await?;
            println!(
                "{} = {}",
                ctx.currency.format_amount(amount, &from.to_uppercase()),
                ctx.currency.format_amount(converted, &to.to_uppercase()).bold()
            );
            Ok(())
        }
        Some(CurrencyCommands::Show) | None => {
            let ctx = signed_in_context().await?;
            println!("{}", ctx.currency.code().bold());
            Ok(())
        }
    }
}

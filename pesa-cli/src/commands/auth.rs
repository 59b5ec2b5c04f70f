//! Auth commands - login, signup, logout, password reset

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use dialoguer::{Input, Password};

use pesa_core::domain::DEFAULT_CURRENCY;
use pesa_core::services::{SignUpRequest, DEFAULT_COUNTRY};
use pesa_core::User;

use super::get_context;
use crate::output;

#[derive(Args)]
pub struct SignupArgs {
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    /// ISO country code, e.g. NG, GH, KE
    #[arg(long, default_value = DEFAULT_COUNTRY)]
    country: String,
    /// Preferred display currency
    #[arg(long, default_value = DEFAULT_CURRENCY)]
    currency: String,
    #[arg(long)]
    phone: Option<String>,
}

fn prompt(value: Option<String>, label: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => Ok(Input::new().with_prompt(label).interact_text()?),
    }
}

fn greet(user: &User) {
    output::success(&format!("Signed in as {} ({})", user.full_name(), user.email));
    if let Some(wallet_id) = &user.wallet_id {
        println!("Wallet: {}", wallet_id.bold());
    }
}

pub async fn login(
    email: Option<String>,
    google: Option<String>,
    apple: Option<String>,
    json: bool,
) -> Result<()> {
    let ctx = get_context()?;
    let user = match (google, apple) {
        (Some(token), _) => ctx.auth.sign_in_with_google(&token).await?,
        (_, Some(token)) => ctx.auth.sign_in_with_apple(&token).await?,
        (None, None) => {
            let email = prompt(email, "Email")?;
            let password = Password::new().with_prompt("Password").interact()?;
            let pb = output::spinner("Signing in...");
            let result = ctx.auth.sign_in(&email, &password).await;
            pb.finish_and_clear();
            result?
        }
    };

    if json {
        return output::json(&user);
    }
    greet(&user);
    Ok(())
}

pub async fn signup(args: SignupArgs) -> Result<()> {
    let ctx = get_context()?;
    let email = prompt(args.email, "Email")?;
    let first_name = prompt(args.first_name, "First name")?;
    let last_name = prompt(args.last_name, "Last name")?;
    let password = Password::new()
        .with_prompt("Password")
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()?;

    let pb = output::spinner("Creating account...");
    let result = ctx
        .auth
        .sign_up(SignUpRequest {
            email,
            password,
            first_name,
            last_name,
            country_code: args.country,
            preferred_currency: args.currency,
            phone_number: args.phone,
        })
        .await;
    pb.finish_and_clear();

    let user = result?;
    greet(&user);
    println!("Run 'pesa kyc verify' to verify your identity and raise your limits.");
    Ok(())
}

pub async fn logout() -> Result<()> {
    let ctx = get_context()?;
    ctx.bootstrap().await?;
    ctx.sign_out().await?;
    output::success("Signed out");
    Ok(())
}

pub async fn reset_password(email: &str) -> Result<()> {
    let ctx = get_context()?;
    ctx.auth.send_password_reset(email).await?;
    output::info(&format!("If an account exists for {}, a reset link is on its way.", email));
    Ok(())
}

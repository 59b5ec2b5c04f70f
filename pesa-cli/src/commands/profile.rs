//! Profile command - show or edit the signed-in user's details

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{ContentArrangement, Table};

use pesa_core::ports::ProfileUpdate;

use super::signed_in_context;
use crate::output;

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Show profile details
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change profile fields
    Update {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
    },
}

pub async fn run(command: Option<ProfileCommands>) -> Result<()> {
    let ctx = signed_in_context().await?;
    match command.unwrap_or(ProfileCommands::Show { json: false }) {
        ProfileCommands::Show { json } => {
            let user = ctx.auth.require_user()?;
            if json {
                return output::json(&user);
            }
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.add_row(vec!["Name".to_string(), user.full_name()]);
            table.add_row(vec!["Email".to_string(), user.email.clone()]);
            table.add_row(vec![
                "Phone".to_string(),
                user.phone_number.clone().unwrap_or_else(|| "-".to_string()),
            ]);
            table.add_row(vec!["Country".to_string(), user.country_code.clone()]);
            table.add_row(vec![
                "Member since".to_string(),
                user.created_at.format("%Y-%m-%d").to_string(),
            ]);
            println!("{}", table);
        }
        ProfileCommands::Update { first_name, last_name, phone, image_url } => {
            let update = ProfileUpdate {
                first_name,
                last_name,
                phone_number: phone,
                profile_image_url: image_url,
            };
            if update == ProfileUpdate::default() {
                anyhow::bail!("Nothing to update. Pass at least one field, e.g. --first-name");
            }
            let user = ctx.auth.update_profile(update).await?;
            output::success(&format!("Profile updated for {}", user.full_name()));
        }
    }
    Ok(())
}

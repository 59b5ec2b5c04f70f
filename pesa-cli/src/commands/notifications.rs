//! Notifications command - read and tidy the inbox

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use super::signed_in_context;
use crate::output;

#[derive(Subcommand)]
pub enum NotificationCommands {
    /// List notifications, newest first
    List {
        /// Only unread notifications
        #[arg(long)]
        unread: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark one notification as read
    Read { id: String },
    /// Mark every notification as read
    ReadAll,
    /// Delete a notification
    Delete {
        id: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

pub async fn run(command: Option<NotificationCommands>) -> Result<()> {
    let ctx = signed_in_context().await?;
    let command = command.unwrap_or(NotificationCommands::List {
        unread: false,
        json: false,
    });

    match command {
        NotificationCommands::List { unread, json } => {
            let state = ctx.notifications.state();
            let shown: Vec<_> = state
                .notifications
                .iter()
                .filter(|n| !unread || !n.is_read)
                .collect();
            if json {
                return output::json(&shown);
            }
            if shown.is_empty() {
                output::info("Inbox is empty.");
                return Ok(());
            }
            let mut table = output::create_table();
            table.set_header(vec!["", "ID", "When", "Title", "Message"]);
            for n in shown {
                let marker = if n.is_read { " ".to_string() } else { "●".cyan().to_string() };
                table.add_row(vec![
                    marker,
                    n.id.clone(),
                    n.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    n.title.clone(),
                    n.body.clone(),
                ]);
            }
            println!("{}", table);
            println!("{} unread", state.unread_count());
        }
        NotificationCommands::Read { id } => {
            ctx.notifications.mark_read(&id).await?;
            output::success("Marked as read");
        }
        NotificationCommands::ReadAll => {
            ctx.notifications.mark_all_read().await?;
            output::success("All notifications marked as read");
        }
        NotificationCommands::Delete { id, force } => {
            if !force
                && !Confirm::new()
                    .with_prompt(format!("Delete notification {}?", id))
                    .default(false)
                    .interact()?
            {
                output::warning("Cancelled");
                return Ok(());
            }
            ctx.notifications.delete(&id).await?;
            output::success("Notification deleted");
        }
    }
    Ok(())
}

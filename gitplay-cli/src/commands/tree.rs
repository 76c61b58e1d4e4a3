use super::Connection;
use crate::display::{entry_line, message_line, short_id};
use anyhow::Result;
use colored::Colorize;

pub async fn run(connection: &Connection, repo: &str, at: usize, path: &str) -> Result<()> {
    let (session, index) = connection.open_at(repo, at).await?;

    let window = session.open_window(path);
    if let Some(pending) = session.fetch_size_changes_for_open_folders(index) {
        pending.await?;
    }

    if let Some(details) = session.current_details() {
        println!(
            "{} {} {}",
            short_id(&details.id).yellow(),
            details.time.format("%Y-%m-%d %H:%M:%S"),
            message_line(&session.message_at(index))
        );
    }
    println!("{} /{}", "Listing".bold().cyan(), path.trim_matches('/'));
    println!();

    let entries = session.listing(window);
    if entries.is_empty() {
        println!("{}", "No such folder at this commit".yellow());
        return Ok(());
    }
    for entry in &entries {
        let changed = !entry.is_directory && session.changed_at_current(&entry.full_path());
        println!("{}", entry_line(entry, changed));
    }

    Ok(())
}

use super::Connection;
use crate::display::short_id;
use anyhow::Result;
use colored::Colorize;

pub async fn run(connection: &Connection, repo: &str, from: usize, limit: usize) -> Result<()> {
    let session = connection.open(repo, connection.session_config()?).await?;
    let count = session.commits_count();
    if from >= count {
        println!("{}", format!("No commits at or after {}", from).yellow());
        return Ok(());
    }
    let end = from.saturating_add(limit).min(count);

    let batch_size = session.config().batch_size;
    for start in (from / batch_size * batch_size..end).step_by(batch_size) {
        session.ensure_loaded(start).await?;
    }

    println!("{}", "Commit History".bold().cyan());
    println!();
    for record in session.records(from, end - from) {
        println!(
            "{:>6} {} {}",
            record.position.to_string().dimmed(),
            short_id(&record.id).yellow(),
            record.message.lines().next().unwrap_or("")
        );
    }

    if end < count {
        println!();
        println!(
            "{}",
            format!("... and {} more commits", count - end).dimmed()
        );
        println!("Use {} to see more", "--from N --limit N".cyan());
    }

    Ok(())
}

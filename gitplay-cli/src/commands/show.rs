use super::Connection;
use anyhow::Result;
use colored::Colorize;

pub async fn run(connection: &Connection, repo: &str, file: &str, at: usize) -> Result<()> {
    let (session, index) = connection.open_at(repo, at).await?;
    let file = file.trim_start_matches('/');

    let blob = session
        .current_details()
        .and_then(|details| details.file_tree.as_ref()?.find(file).cloned());
    let Some(blob) = blob.filter(|blob| !blob.is_directory) else {
        anyhow::bail!("No file {} at commit {}", file, index);
    };

    if let Some(pending) = session.open_file(file, &blob.object_id) {
        pending.await?;
    }
    let lines = session.lines(&blob.object_id).unwrap_or_default();

    println!("{} {}", file.bold().cyan(), format!("@ {}", index).dimmed());
    println!();
    let width = lines.len().to_string().len();
    for (number, line) in lines.iter().enumerate() {
        println!("{:>width$} {}", (number + 1).to_string().dimmed(), line, width = width);
    }

    Ok(())
}

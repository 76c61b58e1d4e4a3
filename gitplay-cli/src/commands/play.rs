use super::Connection;
use crate::display::{message_line, short_id};
use anyhow::Result;
use colored::Colorize;
use gitplay_core::{SessionEvent, Topic};
use indicatif::{ProgressBar, ProgressStyle};

pub async fn run(
    connection: &Connection,
    repo: &str,
    speed: Option<u32>,
    from: usize,
) -> Result<()> {
    let mut config = connection.session_config()?;
    if let Some(speed) = speed {
        config = config.with_initial_speed(speed);
        config.validate()?;
    }
    let session = connection.open(repo, config).await?;
    let start = session.jump_to(from).await?;

    let progress = ProgressBar::new(session.commits_count() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    progress.set_position(start as u64);

    let mut events = session.subscribe(&[Topic::Cursor, Topic::Playback, Topic::Commits]);
    println!(
        "{} at {} commits/s, {}",
        "Playing".bold().green(),
        session.cursor().speed,
        "Ctrl+C to stop".dimmed()
    );
    session.play();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::CursorMoved { index }) => {
                    progress.set_position(index as u64);
                    let commit = session.commit_id(index).unwrap_or_default();
                    progress.set_message(format!(
                        "{} {}",
                        short_id(&commit),
                        message_line(&session.message_at(index))
                    ));
                }
                Some(SessionEvent::PlaybackChanged { is_playing: false, .. }) | None => break,
                Some(_) => {}
            },
            _ = tokio::signal::ctrl_c() => {
                session.pause();
                break;
            }
        }
    }

    let cursor = session.cursor();
    progress.finish_with_message(format!("stopped at commit {}", cursor.current_index));
    if let Some(error) = session.last_error() {
        println!("{}: {}", "Last error".bold().red(), error);
    }

    Ok(())
}

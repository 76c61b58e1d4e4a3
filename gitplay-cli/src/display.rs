use colored::Colorize;
use gitplay_core::{MessageState, TreeEntry};

const SIZE_LABELS: [&str; 4] = ["B", "K", "M", "G"];

/// Human readable size: divided by 1024 until below it, two decimals at most.
pub fn smart_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut factor = 0;
    while size >= 1024.0 && factor < SIZE_LABELS.len() - 1 {
        size /= 1024.0;
        factor += 1;
    }
    let rounded = (size * 100.0).round() / 100.0;
    format!("{}{}", rounded, SIZE_LABELS[factor])
}

pub fn short_id(id: &str) -> &str {
    &id[..id.len().min(8)]
}

/// First line of a message, or a dimmed placeholder while it loads.
pub fn message_line(message: &MessageState) -> String {
    match message {
        MessageState::Loaded(text) => text.lines().next().unwrap_or("").to_string(),
        MessageState::Loading => message.as_str().dimmed().to_string(),
    }
}

pub fn entry_line(entry: &TreeEntry, changed: bool) -> String {
    if entry.is_up() {
        return format!("  {}", "..".dimmed());
    }
    let marker = if changed { "*".yellow().bold() } else { " ".normal() };
    if entry.is_directory {
        format!("{} {}/", marker, entry.name.blue().bold())
    } else {
        let size = entry.size.map(smart_size).unwrap_or_default();
        format!("{} {:<40} {:>10}", marker, entry.name, size.dimmed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smart_size() {
        assert_eq!(smart_size(0), "0B");
        assert_eq!(smart_size(1023), "1023B");
        assert_eq!(smart_size(1024), "1K");
        assert_eq!(smart_size(1536), "1.5K");
        assert_eq!(smart_size(5 * 1024 * 1024 + 1024 * 300), "5.29M");
        assert_eq!(smart_size(3 * 1024 * 1024 * 1024), "3G");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }
}

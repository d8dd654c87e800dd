//! Terminal formatting helpers.

pub fn print_separator(width: usize) {
    println!("{}", "-".repeat(width));
}

/// Shorten `text` to at most `max` characters, marking the cut with `...`.
pub fn truncate_string(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("a long prompt", 8), "a lon...");
        assert_eq!(truncate_string("ééééé", 4), "é...");
    }
}

//! Command text normalization for `exec` and `open`.

/// Trim a shell command. Returns `None` when nothing is left.
pub fn shell_command(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

/// Split command text on whitespace into an argument vector.
///
/// No quoting is interpreted. Returns `None` for empty text.
pub fn argv(text: &str) -> Option<Vec<String>> {
    let args: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    if args.is_empty() { None } else { Some(args) }
}

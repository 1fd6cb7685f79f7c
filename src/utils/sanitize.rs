//! Filename and slug helpers

/// Sanitize a name for use as a single path component
///
/// Replaces filesystem-unsafe characters with visually similar Unicode alternatives
/// that are safe to use in filenames across all major operating systems.
///
/// # Examples
///
/// ```
/// use podscribe::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Hard Fork: AI Edition"), "Hard Fork꞉ AI Edition");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' => '⧸',  // U+29F8 - Big Solidus
            '\\' => '⧹', // U+29F9 - Big Reverse Solidus
            ':' => '꞉',  // U+A789 - Modifier Letter Colon
            '*' => '⁎',  // U+204E - Low Asterisk
            '?' => '？', // U+FF1F - Fullwidth Question Mark
            '"' => '″',  // U+2033 - Double Prime
            '<' => '‹',  // U+2039 - Single Left Angle Quote
            '>' => '›',  // U+203A - Single Right Angle Quote
            '|' => '｜', // U+FF5C - Fullwidth Vertical Line
            c if c.is_control() => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        // A leading dot would hide the file on unix
        .trim_start_matches('.')
        .to_string()
}

/// Turn a slug like `hard-fork_ai` into `Hard Fork Ai`
pub fn title_case_slug(slug: &str) -> String {
    slug.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

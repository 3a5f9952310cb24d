//! Small text helpers shared by the formatters and transports.

/// Truncate a string to at most `max_chars` characters, respecting UTF-8
/// boundaries.
///
/// # Examples
///
/// ```
/// use tunebot_core::utils::truncate_str;
/// let s = "سلام دنیا";
/// assert_eq!(truncate_str(s, 4), "سلام");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Like [`truncate_str`], but marks a cut with a trailing ellipsis. The
/// result never exceeds `max_chars` characters.
#[must_use]
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut cut = truncate_str(s, max_chars - 1);
    cut.push('…');
    cut
}

/// Group the digits of `n` in threes: `4302231` becomes `4,302,231`.
#[must_use]
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i).is_multiple_of(3) {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Lower-cased extension of a file name, without the dot.
#[must_use]
pub fn file_extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_unicode() {
        let s = "Привет, мир!";
        assert_eq!(truncate_str(s, 6), "Привет");
        assert_eq!(truncate_str(s, 50), "Привет, мир!");
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("Bohemian Rhapsody", 9), "Bohemian…");
        assert_eq!(truncate_with_ellipsis("Queen", 5), "Queen");
        assert_eq!(truncate_with_ellipsis("Queen", 0), "");
        assert_eq!(truncate_with_ellipsis("Bohemian Rhapsody", 9).chars().count(), 9);
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(4_302_231), "4,302,231");
        assert_eq!(group_thousands(100_000), "100,000");
        assert_eq!(group_thousands(u64::MAX), "18,446,744,073,709,551,615");
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("song.MP3").as_deref(), Some("mp3"));
        assert_eq!(file_extension("archive.tar.flac").as_deref(), Some("flac"));
        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension(".ogg"), None);
        assert_eq!(file_extension("trailing."), None);
    }
}

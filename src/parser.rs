//! Splitting of command lines into words and handling of the trailing
//! background marker.

const BACKGROUND_MARKER: char = '&';

/// Split a command line into whitespace-separated words.
pub fn split_words(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

/// Whether the last non-whitespace character of `line` is the background marker.
pub fn is_background(line: &str) -> bool {
    line.trim_end().ends_with(BACKGROUND_MARKER)
}

/// Remove a trailing background marker and the whitespace around it.
///
/// Lines without the marker are returned with trailing whitespace trimmed.
pub fn strip_background_marker(line: &str) -> &str {
    let trimmed = line.trim_end();
    match trimmed.strip_suffix(BACKGROUND_MARKER) {
        Some(rest) => rest.trim_end(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words_collapses_whitespace() {
        assert_eq!(split_words("  kill\t-9   3 \n"), vec!["kill", "-9", "3"]);
        assert!(split_words("   ").is_empty());
    }

    #[test]
    fn test_background_detection() {
        assert!(is_background("sleep 100 &"));
        assert!(is_background("sleep 100&  \t"));
        assert!(!is_background("sleep 100"));
        assert!(!is_background("echo a & b"));
        assert!(!is_background(""));
    }

    #[test]
    fn test_strip_background_marker() {
        assert_eq!(strip_background_marker("sleep 100 &"), "sleep 100");
        assert_eq!(strip_background_marker("sleep 100&"), "sleep 100");
        assert_eq!(strip_background_marker("sleep 100   &  "), "sleep 100");
        assert_eq!(strip_background_marker("sleep 100 "), "sleep 100");
        assert_eq!(strip_background_marker("&"), "");
    }
}

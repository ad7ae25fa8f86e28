//! Conversion of remote course, folder and file names into path segments.

/// Name used when sanitizing leaves nothing usable.
pub const PLACEHOLDER: &str = "untitled";

const STRIPPED: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

const RESERVED: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Turns an arbitrary remote name into a single filesystem-safe path segment.
///
/// Separators become `-`, characters that Windows rejects and control
/// characters are dropped, whitespace runs collapse to one space and the
/// result is trimmed. Never returns an empty string.
#[must_use]
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_space = false;

    for c in name.chars() {
        let c = match c {
            '/' | '\\' => '-',
            c if c.is_control() && !c.is_whitespace() => continue,
            c if STRIPPED.contains(&c) => continue,
            c => c,
        };
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }

    let trimmed = out.trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        return PLACEHOLDER.to_string();
    }

    let (stem, rest) = trimmed.split_at(trimmed.find('.').unwrap_or(trimmed.len()));
    if RESERVED.iter().any(|r| r.eq_ignore_ascii_case(stem)) {
        return format!("{stem}_{rest}");
    }
    trimmed.to_string()
}

/// Sanitizes every segment of a remote path.
#[must_use]
pub fn sanitize_segments<I, S>(segments: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .map(|s| sanitize(s.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn strips_illegal_characters() {
        assert_eq!(sanitize("CS 101: Intro!"), "CS 101 Intro!");
        assert_eq!(sanitize("what?*<>|\"now"), "whatnow");
    }

    #[test]
    fn separators_become_dashes() {
        assert_eq!(sanitize("Lab 1/2"), "Lab 1-2");
        assert_eq!(sanitize("a\\b"), "a-b");
    }

    #[test]
    fn whitespace_is_collapsed_and_trimmed() {
        assert_eq!(sanitize("  Week \t 1  "), "Week 1");
        assert_eq!(sanitize("line\nbreak"), "line break");
    }

    #[test]
    fn control_characters_removed() {
        assert_eq!(sanitize("bell\u{7}name"), "bellname");
    }

    #[test]
    fn empty_results_use_placeholder() {
        assert_eq!(sanitize(""), PLACEHOLDER);
        assert_eq!(sanitize("   "), PLACEHOLDER);
        assert_eq!(sanitize("???"), PLACEHOLDER);
        assert_eq!(sanitize("."), PLACEHOLDER);
        assert_eq!(sanitize(".."), PLACEHOLDER);
    }

    #[test]
    fn trailing_dots_trimmed() {
        assert_eq!(sanitize("notes..."), "notes");
        assert_eq!(sanitize("report.pdf"), "report.pdf");
    }

    #[test]
    fn reserved_device_names_suffixed() {
        assert_eq!(sanitize("CON"), "CON_");
        assert_eq!(sanitize("nul.txt"), "nul_.txt");
        assert_eq!(sanitize("CONSOLE"), "CONSOLE");
    }

    #[test]
    fn unicode_preserved() {
        assert_eq!(sanitize("Física — Guía 1"), "Física — Guía 1");
    }

    #[test]
    fn course_and_folder_path_keeps_hierarchy() {
        let mut path = PathBuf::from("CanvasFiles");
        path.push(sanitize("CS 101: Intro!"));
        for segment in sanitize_segments(["Labs", "Week 1"]) {
            path.push(segment);
        }
        assert_eq!(path, PathBuf::from("CanvasFiles/CS 101 Intro!/Labs/Week 1"));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn never_empty(name in ".*") {
                prop_assert!(!sanitize(&name).is_empty());
            }

            #[test]
            fn never_contains_separators_or_illegal(name in ".*") {
                let out = sanitize(&name);
                prop_assert!(!out.contains('/'));
                prop_assert!(!out.contains('\\'));
                prop_assert!(!out.chars().any(|c| STRIPPED.contains(&c)));
                prop_assert!(!out.chars().any(char::is_control));
            }

            #[test]
            fn idempotent(name in ".*") {
                let once = sanitize(&name);
                prop_assert_eq!(sanitize(&once), once);
            }

            #[test]
            fn trimmed(name in ".*") {
                let out = sanitize(&name);
                prop_assert_eq!(out.trim(), out.as_str());
            }
        }
    }
}

//! File payload extraction from free-form AI chat text.
//!
//! Three competing wire formats are recognized, each by its own regex
//! strategy, run in a fixed priority order:
//! - tagged block: `!!!FILE_START!!!` / `!!!FILE_END!!!`
//! - fenced path: a code fence whose opening line carries `filepath:`
//! - XML-like legacy fallback: `<FILE_CONTENT path="...">...</FILE_CONTENT>`
//!
//! Results are concatenated in strategy order without deduplication; the
//! writer's ordered pass makes a later match for the same path win.

use regex::Regex;
use std::sync::LazyLock;

/// Literal marker that must appear somewhere in channel text to arm
/// payload extraction.
pub const TRIGGER_TOKEN: &str = ">>> INVOKE";

/// Start tag of the tagged-block wire format, also used by the monitor to
/// decide whether unrecognized text looks like a payload.
pub const TAG_FILE_START: &str = "!!!FILE_START!!!";

// Compile regexes once using LazyLock. All three are non-greedy and span
// newlines, so each match covers the shortest text satisfying the pattern.
static TAGGED_BLOCK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)!!!FILE_START!!!\s+([^\n]+)\n(.*?)\n!!!FILE_END!!!").unwrap()
});

static FENCED_PATH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```filepath:\s*([^\n`]+)\n(.*?)\n```").unwrap());

static XML_LEGACY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<FILE_CONTENT\s+path="([^"]+)"\s*>(.*?)</FILE_CONTENT>"#).unwrap()
});

/// One file's full replacement contents, extracted from channel text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    /// Relative path under the project root. Non-empty after trimming.
    pub path: String,
    /// Full replacement text. May be empty.
    pub content: String,
}

/// Extract all file payloads from the given text.
///
/// Pure and infallible: returns an empty vec when no strategy matches.
/// Tagged-block payloads come first, then fenced-path, then the XML-like
/// fallback. The legacy strategy trims its body of surrounding newlines but
/// takes the path verbatim from the attribute; the other two trim the path
/// and keep the body exact.
pub fn parse(text: &str) -> Vec<FilePayload> {
    let mut payloads = Vec::new();

    for cap in TAGGED_BLOCK_REGEX.captures_iter(text) {
        let path = cap[1].trim();
        if !path.is_empty() {
            payloads.push(FilePayload {
                path: path.to_string(),
                content: cap[2].to_string(),
            });
        }
    }

    for cap in FENCED_PATH_REGEX.captures_iter(text) {
        let path = cap[1].trim();
        if !path.is_empty() {
            payloads.push(FilePayload {
                path: path.to_string(),
                content: cap[2].to_string(),
            });
        }
    }

    for cap in XML_LEGACY_REGEX.captures_iter(text) {
        // Path kept verbatim here: the legacy format never trimmed it.
        let path = &cap[1];
        if !path.trim().is_empty() {
            payloads.push(FilePayload {
                path: path.to_string(),
                content: cap[2]
                    .trim_matches(|c| c == '\n' || c == '\r')
                    .to_string(),
            });
        }
    }

    payloads
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_no_delimiters_returns_empty() {
        assert!(parse("just a chat message with no payload").is_empty());
        assert!(parse("").is_empty());
        assert!(parse(">>> INVOKE but nothing else").is_empty());
    }

    #[test]
    fn test_parse_tagged_block_basic() {
        let text = ">>> INVOKE\n!!!FILE_START!!!\nfoo/bar.txt\nhello\n!!!FILE_END!!!";
        let payloads = parse(text);
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].path, "foo/bar.txt");
        assert_eq!(payloads[0].content, "hello");
    }

    #[test]
    fn test_parse_tagged_block_trims_path_not_content() {
        let text = "!!!FILE_START!!!\n  src/lib.rs  \nfn main() {}\n\n!!!FILE_END!!!";
        let payloads = parse(text);
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].path, "src/lib.rs");
        // Trailing blank line before the end tag belongs to the body.
        assert_eq!(payloads[0].content, "fn main() {}\n");
    }

    #[test]
    fn test_parse_tagged_block_multiline_content() {
        let text = "!!!FILE_START!!!\na.rs\nline one\nline two\nline three\n!!!FILE_END!!!";
        let payloads = parse(text);
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].content, "line one\nline two\nline three");
    }

    #[test]
    fn test_parse_multiple_tagged_blocks_not_greedy() {
        let text = concat!(
            "!!!FILE_START!!!\nfirst.txt\naaa\n!!!FILE_END!!!\n",
            "some prose in between\n",
            "!!!FILE_START!!!\nsecond.txt\nbbb\n!!!FILE_END!!!",
        );
        let payloads = parse(text);
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0].path, "first.txt");
        assert_eq!(payloads[0].content, "aaa");
        assert_eq!(payloads[1].path, "second.txt");
        assert_eq!(payloads[1].content, "bbb");
    }

    #[test]
    fn test_parse_unterminated_tagged_block_yields_nothing() {
        let text = "!!!FILE_START!!!\nfoo.txt\ndangling content with no end tag";
        assert!(parse(text).is_empty());
    }

    #[test]
    fn test_parse_fenced_path() {
        let text = "```filepath: src/main.rs\nfn main() {}\n```";
        let payloads = parse(text);
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].path, "src/main.rs");
        assert_eq!(payloads[0].content, "fn main() {}");
    }

    #[test]
    fn test_parse_fenced_path_no_space_after_colon() {
        let text = "```filepath:docs/readme.md\n# Title\nbody\n```";
        let payloads = parse(text);
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].path, "docs/readme.md");
        assert_eq!(payloads[0].content, "# Title\nbody");
    }

    #[test]
    fn test_parse_plain_fence_without_filepath_ignored() {
        let text = "```rust\nfn main() {}\n```";
        assert!(parse(text).is_empty());
    }

    #[test]
    fn test_parse_xml_legacy_trims_body_newlines() {
        let text = "<FILE_CONTENT path=\"a/b.txt\">\n\nhello world\n\n</FILE_CONTENT>";
        let payloads = parse(text);
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].path, "a/b.txt");
        assert_eq!(payloads[0].content, "hello world");
    }

    #[test]
    fn test_parse_xml_legacy_path_not_trimmed() {
        // The legacy strategy takes the attribute verbatim, surrounding
        // whitespace included. The other two strategies trim.
        let text = "<FILE_CONTENT path=\" padded.txt \">body</FILE_CONTENT>";
        let payloads = parse(text);
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].path, " padded.txt ");
    }

    #[test]
    fn test_parse_strategy_order_tagged_before_legacy() {
        let text = concat!(
            "<FILE_CONTENT path=\"legacy.txt\">old</FILE_CONTENT>\n",
            "!!!FILE_START!!!\ntagged.txt\nnew\n!!!FILE_END!!!",
        );
        let payloads = parse(text);
        assert_eq!(payloads.len(), 2);
        // Tagged-block results come first regardless of position in the text.
        assert_eq!(payloads[0].path, "tagged.txt");
        assert_eq!(payloads[1].path, "legacy.txt");
    }

    #[test]
    fn test_parse_same_path_from_two_strategies_kept_in_order() {
        let text = concat!(
            "<FILE_CONTENT path=\"dup.txt\">from legacy</FILE_CONTENT>\n",
            "!!!FILE_START!!!\ndup.txt\nfrom tagged\n!!!FILE_END!!!",
        );
        let payloads = parse(text);
        // No deduplication: the caller's ordered write pass makes the later
        // match win for the same path.
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0].content, "from tagged");
        assert_eq!(payloads[1].content, "from legacy");
    }

    #[test]
    fn test_parse_whitespace_only_path_skipped() {
        let text = "!!!FILE_START!!!\n   \ncontent\n!!!FILE_END!!!";
        assert!(parse(text).is_empty());
    }

    #[test]
    fn test_parse_empty_content_allowed() {
        let text = "!!!FILE_START!!!\nempty.txt\n\n!!!FILE_END!!!";
        let payloads = parse(text);
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].content, "");
    }
}

//! Code fence tracking for line-based directive scanning.
//!
//! Directive syntax inside fenced code blocks is literal code and must not be
//! rewritten.

/// Tracks whether a line-by-line scan is inside a fenced code block.
///
/// Fences use three or more backticks or tildes. The closing fence must use the
/// same character, be at least as long as the opening fence, and carry nothing
/// but whitespace after it. Fences inside block quotes are seen through their
/// `>` markers, and a fence ends with the block quote that holds it.
#[derive(Debug, Default)]
pub(crate) struct FenceTracker {
    open: Option<OpenFence>,
}

#[derive(Clone, Copy, Debug)]
struct OpenFence {
    ch: char,
    len: usize,
    /// Block quote depth of the opening line.
    depth: usize,
}

impl FenceTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whether the scan is currently inside a fenced block.
    #[cfg(test)]
    pub(crate) fn in_fence(&self) -> bool {
        self.open.is_some()
    }

    /// Feed one line. Returns `true` if the line belongs to a fenced block,
    /// opening and closing fences included.
    pub(crate) fn update(&mut self, line: &str) -> bool {
        let (depth, content) = strip_quote_markers(line);
        if let Some(open) = self.open
            && depth < open.depth
        {
            self.open = None;
        }

        if super::parser::indentation(content) >= 4 && self.open.is_none() {
            return false;
        }
        let trimmed = content.trim_start();
        let Some((ch, len)) = fence_run(trimmed) else {
            return self.open.is_some();
        };

        match self.open {
            Some(open) => {
                let closes = ch == open.ch
                    && len >= open.len
                    && depth == open.depth
                    && trimmed[len..].chars().all(char::is_whitespace);
                if closes {
                    self.open = None;
                }
                true
            }
            None => {
                // Backtick fences may not carry backticks in their info string.
                if ch == '`' && trimmed[len..].contains('`') {
                    return false;
                }
                self.open = Some(OpenFence { ch, len, depth });
                true
            }
        }
    }
}

/// Strip leading block quote markers, returning their count and the rest.
fn strip_quote_markers(line: &str) -> (usize, &str) {
    let mut depth = 0;
    let mut rest = line;
    loop {
        let trimmed = rest.trim_start_matches(' ');
        if rest.len() - trimmed.len() > 3 {
            break;
        }
        let Some(after) = trimmed.strip_prefix('>') else {
            break;
        };
        rest = after.strip_prefix(' ').unwrap_or(after);
        depth += 1;
    }
    (depth, rest)
}

/// Leading run of three or more fence characters.
fn fence_run(trimmed: &str) -> Option<(char, usize)> {
    let first = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = trimmed.chars().take_while(|&c| c == first).count();
    (len >= 3).then_some((first, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backtick_fence() {
        let mut tracker = FenceTracker::new();
        assert!(!tracker.in_fence());

        assert!(tracker.update("```rust"));
        assert!(tracker.in_fence());
        assert!(tracker.update(":::note"));
        assert!(tracker.in_fence());
        assert!(tracker.update("```"));
        assert!(!tracker.in_fence());
        assert!(!tracker.update(":::note"));
    }

    #[test]
    fn test_tilde_fence_ignores_backticks() {
        let mut tracker = FenceTracker::new();

        assert!(tracker.update("~~~python"));
        assert!(tracker.update("```"));
        assert!(tracker.in_fence());
        assert!(tracker.update("~~~~"));
        assert!(!tracker.in_fence());
    }

    #[test]
    fn test_shorter_fence_does_not_close() {
        let mut tracker = FenceTracker::new();

        assert!(tracker.update("````"));
        assert!(tracker.update("```"));
        assert!(tracker.in_fence());
        assert!(tracker.update("````"));
        assert!(!tracker.in_fence());
    }

    #[test]
    fn test_closing_fence_with_info_does_not_close() {
        let mut tracker = FenceTracker::new();

        assert!(tracker.update("```"));
        assert!(tracker.update("```rust"));
        assert!(tracker.in_fence());
    }

    #[test]
    fn test_inline_code_is_not_fence() {
        let mut tracker = FenceTracker::new();

        assert!(!tracker.update("``inline code``"));
        assert!(!tracker.update("```code``` inline"));
        assert!(!tracker.in_fence());
    }

    #[test]
    fn test_indented_code_is_not_fence() {
        let mut tracker = FenceTracker::new();

        assert!(!tracker.update("    ```"));
        assert!(!tracker.in_fence());
        assert!(tracker.update("   ```"));
        assert!(tracker.in_fence());
    }

    #[test]
    fn test_fence_inside_block_quote() {
        let mut tracker = FenceTracker::new();

        assert!(tracker.update("> ```"));
        assert!(tracker.update("> :::note"));
        assert!(tracker.in_fence());
        assert!(tracker.update(">```"));
        assert!(!tracker.in_fence());
    }

    #[test]
    fn test_block_quote_end_closes_fence() {
        let mut tracker = FenceTracker::new();

        assert!(tracker.update("> > ~~~"));
        assert!(tracker.update("> > code"));
        assert!(!tracker.update("> :::note"));
        assert!(!tracker.in_fence());
    }

    #[test]
    fn test_quoted_fence_does_not_close_outer_fence() {
        let mut tracker = FenceTracker::new();

        assert!(tracker.update("```"));
        assert!(tracker.update("> ```"));
        assert!(tracker.in_fence());
        assert!(tracker.update("```"));
        assert!(!tracker.in_fence());
    }

    #[test]
    fn test_strip_quote_markers() {
        assert_eq!(strip_quote_markers("plain"), (0, "plain"));
        assert_eq!(strip_quote_markers("> > x"), (2, "x"));
        assert_eq!(strip_quote_markers("   >x"), (1, "x"));
        assert_eq!(strip_quote_markers("    > x"), (0, "    > x"));
    }
}

//! Content formatting helpers for consumers rendering model output.

use once_cell::sync::Lazy;
use regex_lite::Regex;

#[allow(clippy::expect_used)]
static LATEX_INLINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[latex\](.*?)\[/latex\]").expect("static pattern compiles")
});

#[allow(clippy::expect_used)]
static LATEX_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\[latex-block\](.*?)\[/latex-block\]").expect("static pattern compiles")
});

/// Rewrite `[latex]…[/latex]` markers to `$…$` and
/// `[latex-block]…[/latex-block]` (across newlines) to `$$ … $$`.
pub fn ensure_latex_delimiters(content: &str) -> String {
    let content = LATEX_BLOCK.replace_all(content, "$$$$ $1 $$$$");
    LATEX_INLINE.replace_all(&content, "$$$1$$").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inline_latex_rewritten() {
        assert_eq!(
            ensure_latex_delimiters("la fórmula [latex]e=mc^2[/latex] es famosa"),
            "la fórmula $e=mc^2$ es famosa"
        );
    }

    #[test]
    fn test_block_latex_rewritten_across_newlines() {
        assert_eq!(
            ensure_latex_delimiters("[latex-block]x = 1\ny = 2[/latex-block]"),
            "$$ x = 1\ny = 2 $$"
        );
    }

    #[test]
    fn test_multiple_occurrences() {
        assert_eq!(
            ensure_latex_delimiters("[latex]a[/latex] y [latex]b[/latex]"),
            "$a$ y $b$"
        );
    }

    #[test]
    fn test_content_without_markers_unchanged() {
        assert_eq!(ensure_latex_delimiters("sin marcas"), "sin marcas");
    }
}

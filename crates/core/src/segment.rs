//! Splitting assistant responses into prose and fenced code.

use std::iter::FusedIterator;
use std::sync::LazyLock;

use regex::Regex;

/// The language assumed for fenced blocks that don't declare one.
pub const DEFAULT_LANGUAGE: &str = "python";

// An opener is three backticks, an optional language tag and a newline.
// The body is matched lazily up to the first closing fence.
static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```([A-Za-z0-9_\-]*)\n((?s:.*?))```").unwrap()
});

/// A fenced code block found in a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CodeBlock<'a> {
    language: &'a str,
    declared: bool,
    code: &'a str,
    source: &'a str,
}

impl<'a> CodeBlock<'a> {
    /// Returns the language of the block, [`DEFAULT_LANGUAGE`] if none was
    /// declared.
    #[inline]
    pub fn language(&self) -> &'a str {
        self.language
    }

    /// Returns whether the opener declared the language explicitly.
    #[inline]
    pub fn has_declared_language(&self) -> bool {
        self.declared
    }

    /// Returns the code between the fences, without the newline that
    /// precedes the closer.
    #[inline]
    pub fn code(&self) -> &'a str {
        self.code
    }
}

/// A piece of a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Segment<'a> {
    /// Text outside of any fenced block, rendered as markdown.
    Prose(&'a str),
    /// A fenced code block.
    Code(CodeBlock<'a>),
}

impl<'a> Segment<'a> {
    /// Returns the displayable content: the prose itself, or the code
    /// without its fences.
    #[inline]
    pub fn content(&self) -> &'a str {
        match self {
            Segment::Prose(text) => text,
            Segment::Code(block) => block.code,
        }
    }

    /// Returns the exact slice of the response this segment covers,
    /// fences included.
    #[inline]
    pub fn source(&self) -> &'a str {
        match self {
            Segment::Prose(text) => text,
            Segment::Code(block) => block.source,
        }
    }

    /// Returns whether this is a code segment.
    #[inline]
    pub fn is_code(&self) -> bool {
        matches!(self, Segment::Code(_))
    }
}

/// Iterator over the segments of a response, see [`segments`].
///
/// The iterator is cheap to clone, and a clone restarts from where the
/// original was.
#[derive(Clone, Debug)]
pub struct Segments<'a> {
    text: &'a str,
    pos: usize,
    // A code block that was found behind some prose, to be yielded next.
    pending: Option<CodeBlock<'a>>,
}

/// Splits an assistant response into prose and code segments.
///
/// Segments come in order and cover the whole input: concatenating their
/// [`source`](Segment::source) gives back `text`. An opener without a
/// matching closer is not a code block, and ends up in the surrounding
/// prose.
#[inline]
pub fn segments(text: &str) -> Segments<'_> {
    Segments {
        text,
        pos: 0,
        pending: None,
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(block) = self.pending.take() {
            return Some(Segment::Code(block));
        }
        if self.pos >= self.text.len() {
            return None;
        }

        let start = self.pos;
        let Some(caps) = FENCE.captures_at(self.text, start) else {
            self.pos = self.text.len();
            return Some(Segment::Prose(&self.text[start..]));
        };
        let whole = caps.get(0)?;
        let tag = caps.get(1).map_or("", |m| m.as_str());
        let body = caps.get(2).map_or("", |m| m.as_str());
        let block = CodeBlock {
            language: if tag.is_empty() { DEFAULT_LANGUAGE } else { tag },
            declared: !tag.is_empty(),
            code: body.strip_suffix('\n').unwrap_or(body),
            source: whole.as_str(),
        };
        self.pos = whole.end();

        if whole.start() > start {
            self.pending = Some(block);
            return Some(Segment::Prose(&self.text[start..whole.start()]));
        }
        Some(Segment::Code(block))
    }
}

impl FusedIterator for Segments<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(text: &str) -> Vec<Segment<'_>> {
        segments(text).collect()
    }

    #[test]
    fn test_plain_text() {
        let text = "Just some words.\nNo code here.";
        assert_eq!(collect(text), [Segment::Prose(text)]);
        assert!(collect("").is_empty());
    }

    #[test]
    fn test_single_block() {
        let text = "```python\ndef fib(n): ...\n```";
        let segs = collect(text);
        assert_eq!(segs.len(), 1);
        let Segment::Code(block) = segs[0] else {
            panic!("expected a code segment, got {:?}", segs[0]);
        };
        assert_eq!(block.language(), "python");
        assert!(block.has_declared_language());
        assert_eq!(block.code(), "def fib(n): ...");
        assert_eq!(segs[0].source(), text);
    }

    #[test]
    fn test_mixed_segments() {
        let text = "Here you go:\n```rust\nfn main() {}\n```\nAnd a shell one:\n```\nls -la\n```\nDone.";
        let segs = collect(text);
        let kinds = segs.iter().map(Segment::is_code).collect::<Vec<_>>();
        assert_eq!(kinds, [false, true, false, true, false]);
        assert_eq!(segs[0].content(), "Here you go:\n");
        assert_eq!(segs[1].content(), "fn main() {}");
        assert_eq!(segs[2].content(), "\nAnd a shell one:\n");
        assert_eq!(segs[4].content(), "\nDone.");

        let Segment::Code(untagged) = segs[3] else {
            panic!("expected a code segment");
        };
        assert_eq!(untagged.language(), DEFAULT_LANGUAGE);
        assert!(!untagged.has_declared_language());
        assert_eq!(untagged.code(), "ls -la");
    }

    #[test]
    fn test_sources_reassemble_input() {
        let inputs = [
            "```js\nconsole.log(1)\n```",
            "before\n```c-sharp\nint x;\n```after",
            "a\n```\n\n```\n```py\nx\n```\n",
            "two in a row\n```a\n1\n``````b\n2\n```",
            "no fences at all",
        ];
        for text in inputs {
            let rebuilt = segments(text).map(|s| s.source()).collect::<String>();
            assert_eq!(rebuilt, text);
        }
    }

    #[test]
    fn test_unterminated_fence_is_prose() {
        let text = "Let me write it:\n```python\ndef f():\n    return 1\n";
        assert_eq!(collect(text), [Segment::Prose(text)]);

        // A closed block followed by an open one.
        let text = "```sh\necho hi\n```\nthen\n```python\nprint(";
        let segs = collect(text);
        assert_eq!(segs.len(), 2);
        assert!(segs[0].is_code());
        assert_eq!(segs[1], Segment::Prose("\nthen\n```python\nprint("));
    }

    #[test]
    fn test_opener_needs_newline() {
        // Inline triple backticks are not a fenced block.
        let text = "Use ```x``` for that.";
        assert_eq!(collect(text), [Segment::Prose(text)]);
    }

    #[test]
    fn test_restartable() {
        let text = "intro\n```go\npackage main\n```\noutro";
        let mut iter = segments(text);
        assert_eq!(iter.next(), Some(Segment::Prose("intro\n")));
        let rest = iter.clone().collect::<Vec<_>>();
        assert_eq!(iter.collect::<Vec<_>>(), rest);
        assert_eq!(collect(text), collect(text));
    }
}

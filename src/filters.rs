//! Structural view of a screener URL
//!
//! A screener URL is treated as `&`-separated query segments, each holding a
//! comma-delimited token list after its first `=`. Splitting and rendering
//! are exact inverses, so a URL no edit touched comes back byte for byte.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    /// Everything up to and including the first `=`; empty if there is none
    head: String,
    tokens: Vec<String>,
}

impl Segment {
    fn parse(raw: &str) -> Self {
        let (head, value) = match raw.find('=') {
            Some(pos) => raw.split_at(pos + 1),
            None => ("", raw),
        };

        Segment {
            head: head.to_string(),
            tokens: value.split(',').map(str::to_string).collect(),
        }
    }

    fn is_empty_value(&self) -> bool {
        self.tokens.len() == 1 && self.tokens[0].is_empty()
    }

    fn render(&self) -> String {
        format!("{}{}", self.head, self.tokens.join(","))
    }
}

/// Screener URL split into query segments and filter tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenerUrl {
    segments: Vec<Segment>,
}

impl ScreenerUrl {
    pub fn parse(url: &str) -> Self {
        ScreenerUrl {
            segments: url.split('&').map(Segment::parse).collect(),
        }
    }

    /// Remove every filter token equal to one of `fragments`
    ///
    /// Returns the number of tokens removed. Remaining tokens keep their
    /// relative order.
    pub fn remove_tokens<S: AsRef<str>>(&mut self, fragments: &[S]) -> usize {
        let mut removed = 0;
        for segment in &mut self.segments {
            let before = segment.tokens.len();
            segment
                .tokens
                .retain(|t| !fragments.iter().any(|f| f.as_ref() == t.as_str()));
            removed += before - segment.tokens.len();
            if segment.tokens.is_empty() {
                segment.tokens.push(String::new());
            }
        }
        removed
    }

    /// Append `token` to the segment directly in front of each `marker` segment
    ///
    /// Returns the number of insertions. A marker in first position has
    /// nothing in front of it and is ignored.
    pub fn insert_before_marker(&mut self, token: &str, marker: &str) -> usize {
        let positions: Vec<usize> = self
            .segments
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, s)| s.render() == marker)
            .map(|(i, _)| i - 1)
            .collect();

        for &i in &positions {
            let segment = &mut self.segments[i];
            if segment.is_empty_value() {
                segment.tokens[0] = token.to_string();
            } else {
                segment.tokens.push(token.to_string());
            }
        }
        positions.len()
    }

    /// All filter tokens in order, across every segment
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.segments
            .iter()
            .flat_map(|s| s.tokens.iter().map(String::as_str))
    }
}

impl fmt::Display for ScreenerUrl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rendered: Vec<String> = self.segments.iter().map(Segment::render).collect();
        write!(f, "{}", rendered.join("&"))
    }
}

//! Input classification: empty input, `@` commands, or search keywords.
//!
//! Anything starting with `@` is a command, recognised or not; it never falls
//! back to a keyword search.

use crate::{codec::Format, search::Keywords};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Command(Command),
    Search(Keywords),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `@all`
    All,
    /// `@latest [N]`; `None` when N is not a positive integer
    Latest(Option<usize>),
    /// `@export [csv|json|html]`
    Export(Format),
    /// `@import`
    Import,
    /// any other `@` input
    Unknown,
}

impl Input {
    pub fn parse(text: &str) -> Input {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return Input::Empty;
        }

        if text.starts_with('@') {
            return Input::Command(Command::parse(&text));
        }

        match Keywords::parse(&text) {
            Some(keywords) => Input::Search(keywords),
            None => Input::Empty,
        }
    }
}

impl Command {
    fn parse(text: &str) -> Command {
        let words = text.split_whitespace().collect::<Vec<_>>();

        match words.as_slice() {
            ["@all"] => Command::All,
            ["@latest"] => Command::Latest(Some(1)),
            ["@latest", count] => Command::Latest(parse_count(count)),
            ["@export"] => Command::Export(Format::Csv),
            ["@export", format] => Format::from_name(format)
                .map(Command::Export)
                .unwrap_or(Command::Unknown),
            ["@import"] => Command::Import,
            _ => Command::Unknown,
        }
    }
}

fn parse_count(count: &str) -> Option<usize> {
    match count.parse::<i64>() {
        Ok(n) if n > 0 => usize::try_from(n).ok(),
        _ => None,
    }
}

//! Grammar file syntax.
//!
//! A grammar file consists of three sections separated by `%%`:
//!
//! ```text
//! # terminal definitions and options
//! NUM = Tok_NUM
//! %prefix = calc
//! %%
//! expr := NUM expr_tail
//! expr_tail :=
//! %%
//! user code, copied verbatim
//! ```

use crate::{
    grammar::{Error, Grammar, Header, ParseError, Symbol},
    types::Map,
};

pub const SECTION_DELIMITER: &str = "%%";

const SECTION_COUNT: usize = 3;

const COMMENT_MARKER: char = '#';
const OPTION_MARKER: char = '%';
const RULE_SEPARATOR: &str = ":=";

/// The raw sections of a grammar file.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Sections<'s> {
    pub header: &'s str,
    pub rules: &'s str,
    pub user_code: &'s str,
}

pub fn split(source: &str) -> Result<Sections<'_>, ParseError> {
    let sections: Vec<&str> = source.split(SECTION_DELIMITER).collect();
    match sections[..] {
        [header, rules, user_code] => Ok(Sections {
            header,
            rules,
            user_code,
        }),
        _ => Err(ParseError::Sections {
            expected: SECTION_COUNT,
            found: sections.len(),
        }),
    }
}

/// Parse a grammar file without computing any of its sets.
pub fn parse(source: &str) -> Result<Grammar, Error> {
    let span = tracing::trace_span!("parse");
    let _entered = span.enter();

    let sections = split(source)?;
    let header = parse_header(sections.header);
    let symbols = parse_rules(sections.rules);
    tracing::debug!(
        terminals = header.terminals.len(),
        options = header.options.len(),
        symbols = symbols.len(),
        "parsed grammar"
    );

    Ok(Grammar::new(
        header,
        symbols,
        sections.user_code.to_owned(),
    ))
}

/// Split the header section into terminal definitions and `%` options.
///
/// A line without `=` defines a key with an empty value. Later definitions
/// of the same key replace earlier ones.
pub fn parse_header(text: &str) -> Header {
    let mut terminals = Map::default();
    let mut options = Map::default();

    for line in processed_lines(text) {
        match line.strip_prefix(OPTION_MARKER) {
            Some(option) => {
                let (key, value) = key_value(option, "=");
                tracing::trace!("option {} = {:?}", key, value);
                options.insert(key.to_owned(), value.to_owned());
            }
            None => {
                let (key, value) = key_value(line, "=");
                tracing::trace!("terminal {} = {:?}", key, value);
                terminals.insert(key.to_owned(), value.to_owned());
            }
        }
    }

    Header::new(terminals, options)
}

/// Collect `name := token token ...` lines into symbols.
pub fn parse_rules(text: &str) -> Map<String, Symbol> {
    let mut symbols: Map<String, Symbol> = Map::default();

    for line in processed_lines(text) {
        let (name, right) = key_value(line, RULE_SEPARATOR);
        let expansion: Vec<String> = right.split_whitespace().map(str::to_owned).collect();
        tracing::trace!("rule {} := {:?}", name, expansion);
        symbols
            .entry(name.to_owned())
            .or_default()
            .add_expansion(expansion);
    }

    symbols
}

/// Non-blank lines with comments removed.
fn processed_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(|line| match line.split_once(COMMENT_MARKER) {
            Some((line, _comment)) => line.trim(),
            None => line.trim(),
        })
        .filter(|line| !line.is_empty())
}

fn key_value<'a>(line: &'a str, sep: &str) -> (&'a str, &'a str) {
    match line.split_once(sep) {
        Some((key, value)) => (key.trim(), value.trim()),
        None => (line.trim(), ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_requires_three_sections() {
        let sections = split(" %% %% ").unwrap();
        assert_eq!(sections.header, " ");
        assert_eq!(sections.user_code, " ");

        for (source, found) in [
            ("", 1),
            (" %% ", 2),
            (" %% %% %% ", 4),
            ("%%%%%%%%", 5),
        ] {
            assert_eq!(
                split(source),
                Err(ParseError::Sections { expected: 3, found }),
                "source: {:?}",
                source
            );
        }
    }

    #[test]
    fn header_lines() {
        let header = parse_header(
            "
            TOKEN = Tok_TOKEN
            FUZZBAZ
            # a comment line
            %language = c  # trailing comment
            %lexer_entry = Lex_getNextToken();

            TOKEN = Tok_OTHER
            ",
        );

        assert_eq!(header.option("language"), Some("c"));
        assert_eq!(header.option("lexer_entry"), Some("Lex_getNextToken();"));
        assert_eq!(header.terminals.len(), 2);
        assert_eq!(header.terminals["TOKEN"], "Tok_OTHER");
        assert_eq!(header.terminals["FUZZBAZ"], "");
    }

    #[test]
    fn rule_lines_accumulate() {
        let symbols = parse_rules(
            "
            list := item list   # recursion
            list :=
            item := A
            list := B
            ",
        );

        assert_eq!(symbols.len(), 2);
        let list = &symbols["list"];
        assert_eq!(list.len(), 3);
        assert_eq!(list.expansions()[0], ["item", "list"]);
        assert!(list.expansions()[1].is_empty());
        assert_eq!(list.expansions()[2], ["B"]);
        assert!(list.is_nullable());
        assert!(!symbols["item"].is_nullable());
    }

    #[test]
    fn user_code_is_verbatim() {
        let grammar = parse(
            "
            TOKEN = Tok_TOKEN
            %%
            # empty grammar section
            %%
            user_code and stuff
            ",
        )
        .unwrap();

        assert!(grammar.symbols.is_empty());
        assert_eq!(
            grammar.user_code,
            "\n            user_code and stuff\n            "
        );
    }
}

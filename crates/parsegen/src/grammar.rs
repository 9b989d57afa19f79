//! Grammar types.

use crate::{
    sets::{self, Mode},
    syntax,
    types::Map,
    util::{display_fn, join},
};
use std::{fmt, fs, io, path::Path};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TerminalID {
    raw: usize,
}

impl TerminalID {
    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> usize {
        self.raw
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NonterminalID {
    raw: usize,
}

impl NonterminalID {
    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> usize {
        self.raw
    }
}

/// A token name resolved against the terminal and symbol mappings.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
}

/// A set of terminals, used for FIRST and FOLLOW sets.
#[derive(Debug, Default, Clone)]
pub struct TerminalSet {
    inner: bit_set::BitSet,
}

impl TerminalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: TerminalID) -> bool {
        self.inner.contains(id.into_raw())
    }

    pub fn insert(&mut self, id: TerminalID) -> bool {
        self.inner.insert(id.into_raw())
    }

    /// Add every element of `other` to this set, returning whether anything was added.
    pub fn union_with(&mut self, other: &Self) -> bool {
        if other.is_subset(self) {
            return false;
        }
        self.inner.union_with(&other.inner);
        true
    }

    pub fn is_subset(&self, other: &Self) -> bool {
        self.inner.is_subset(&other.inner)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = TerminalID> + '_ {
        self.inner.iter().map(TerminalID::from_raw)
    }
}

impl FromIterator<TerminalID> for TerminalSet {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = TerminalID>,
    {
        Self {
            inner: iter.into_iter().map(TerminalID::into_raw).collect(),
        }
    }
}

/// The header section of a grammar file.
///
/// Holds the terminal definitions (name to emission value) and the
/// `%option = value` directives.
#[derive(Debug, Default, Clone)]
#[non_exhaustive]
pub struct Header {
    pub terminals: Map<String, String>,
    pub options: Map<String, String>,
}

impl Header {
    pub fn new(terminals: Map<String, String>, options: Map<String, String>) -> Self {
        Self { terminals, options }
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Look up an option, falling back to `default` when it is not set.
    pub fn option_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.option(key).unwrap_or(default)
    }

    pub fn is_terminal(&self, name: &str) -> bool {
        self.terminals.contains_key(name)
    }

    pub fn terminal_id(&self, name: &str) -> Option<TerminalID> {
        self.terminals.get_index_of(name).map(TerminalID::from_raw)
    }

    /// Return the name and the emission value of a terminal.
    pub fn terminal(&self, id: TerminalID) -> Option<(&str, &str)> {
        self.terminals
            .get_index(id.into_raw())
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn terminal_names<'h>(&'h self, set: &'h TerminalSet) -> impl Iterator<Item = &'h str> {
        set.iter()
            .filter_map(move |id| self.terminal(id).map(|(name, _)| name))
    }

    // `{A, B, C}`
    fn display_set<'h>(&'h self, set: &'h TerminalSet) -> impl fmt::Display + 'h {
        display_fn(move |f| {
            f.write_str("{")?;
            join(f, self.terminal_names(set), ", ")?;
            f.write_str("}")
        })
    }
}

/// A sequence of token names derived by one alternative of a nonterminal.
pub type Expansion = Vec<String>;

/// A nonterminal symbol and its expansions.
#[derive(Debug, Default, Clone)]
pub struct Symbol {
    expansions: Vec<Expansion>,
    nullable: bool,
    first: TerminalSet,
    follow: TerminalSet,
}

impl Symbol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expansions(&self) -> &[Expansion] {
        &self.expansions[..]
    }

    pub fn len(&self) -> usize {
        self.expansions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expansions.is_empty()
    }

    /// Append an expansion. An empty expansion marks the symbol nullable.
    pub fn add_expansion(&mut self, expansion: Expansion) {
        let is_null = expansion.is_empty();
        self.expansions.push(expansion);
        if is_null {
            self.set_nullable();
        }
    }

    /// Mark the symbol nullable, returning whether that changed anything.
    pub fn set_nullable(&mut self) -> bool {
        let changed = !self.is_nullable();
        self.nullable = true;
        changed
    }

    /// A symbol without any expansion is considered nullable.
    pub fn is_nullable(&self) -> bool {
        self.expansions.is_empty() || self.nullable
    }

    pub fn first(&self) -> &TerminalSet {
        &self.first
    }

    pub fn follow(&self) -> &TerminalSet {
        &self.follow
    }

    pub fn insert_first(&mut self, id: TerminalID) -> bool {
        self.first.insert(id)
    }

    pub fn add_first(&mut self, values: &TerminalSet) -> bool {
        self.first.union_with(values)
    }

    pub fn add_follow(&mut self, values: &TerminalSet) -> bool {
        self.follow.union_with(values)
    }
}

/// A parsed grammar file: the header, the nonterminal symbols, and the
/// user code passed through to the generated parser.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct Grammar {
    pub header: Header,
    pub symbols: Map<String, Symbol>,
    pub user_code: String,
}

impl Grammar {
    pub fn new(header: Header, symbols: Map<String, Symbol>, user_code: String) -> Self {
        Self {
            header,
            symbols,
            user_code,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Grammar, Error> {
        let source = fs::read_to_string(path)?;
        Self::from_str(&source)
    }

    /// Parse a grammar and compute its nullability and FIRST sets.
    pub fn from_str(source: &str) -> Result<Grammar, Error> {
        let mut grammar = syntax::parse(source)?;
        sets::compute(&mut grammar, Mode::default())?;
        Ok(grammar)
    }

    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn nonterminal(&self, id: NonterminalID) -> Option<(&str, &Symbol)> {
        self.symbols
            .get_index(id.into_raw())
            .map(|(name, symbol)| (name.as_str(), symbol))
    }

    /// Resolve a token name, preferring terminals.
    pub fn resolve(&self, name: &str) -> Option<SymbolID> {
        self.header
            .terminal_id(name)
            .map(SymbolID::T)
            .or_else(|| {
                self.symbols
                    .get_index_of(name)
                    .map(|raw| SymbolID::N(NonterminalID::from_raw(raw)))
            })
    }

    /// The names of the terminals in `set`.
    pub fn terminal_names<'g>(&'g self, set: &'g TerminalSet) -> impl Iterator<Item = &'g str> {
        self.header.terminal_names(set)
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## terminals:")?;
        for (name, value) in &self.header.terminals {
            writeln!(f, "{} = {}", name, value)?;
        }

        writeln!(f, "\n## options:")?;
        for (key, value) in &self.header.options {
            writeln!(f, "%{} = {}", key, value)?;
        }

        writeln!(f, "\n## nonterminals:")?;
        for (name, symbol) in &self.symbols {
            write!(f, "{}", name)?;
            if symbol.is_nullable() {
                write!(f, " (nullable)")?;
            }
            writeln!(f)?;
            writeln!(f, "  first: {}", self.header.display_set(symbol.first()))?;
            writeln!(f, "  follow: {}", self.header.display_set(symbol.follow()))?;
            for expansion in symbol.expansions() {
                write!(f, "  := ")?;
                if expansion.is_empty() {
                    write!(f, "<empty>")?;
                } else {
                    join(f, expansion, " ")?;
                }
                writeln!(f)?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Parse,
    Grammar,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parsegen: io error: {}", _0)]
    Io(#[from] io::Error),

    #[error("parsegen: parse error: {}", _0)]
    Parse(#[from] ParseError),

    #[error("parsegen: grammar error: {}", _0)]
    Grammar(#[from] GrammarError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(..) => ErrorKind::Io,
            Self::Parse(..) => ErrorKind::Parse,
            Self::Grammar(..) => ErrorKind::Grammar,
        }
    }
}

/// The grammar file could not be split into its sections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("expected {} sections but found {}", expected, found)]
    Sections { expected: usize, found: usize },
}

/// A logical error in the grammar definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error("expansion for terminal `{}'", name)]
    ExpansionForTerminal { name: String },

    #[error("`{}' is not defined as a terminal or nonterminal", name)]
    Undefined { name: String },

    #[error("unknown start symbol: `{}'", name)]
    UnknownStart { name: String },

    #[error(
        "`{}' predicts both expansion {} and expansion {} of `{}'",
        terminal,
        kept,
        shadowed,
        symbol
    )]
    Conflict {
        symbol: String,
        terminal: String,
        kept: usize,
        shadowed: usize,
    },
}

impl GrammarError {
    /// The offending symbol name.
    pub fn name(&self) -> &str {
        match self {
            Self::ExpansionForTerminal { name }
            | Self::Undefined { name }
            | Self::UnknownStart { name } => name,
            Self::Conflict { symbol, .. } => symbol,
        }
    }
}

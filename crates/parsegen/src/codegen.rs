//! Construction of the predictive dispatch routines.
//!
//! [`Codegen`] holds the structured description of the generated parser:
//! one [`Routine`] per nonterminal, each with the branches selected by the
//! next terminal. Turning it into source text is the job of a [`Render`]
//! implementation; `Codegen` itself renders through [`c::CRenderer`].

pub mod c;

use crate::{
    grammar::{Grammar, GrammarError, Header, SymbolID, TerminalSet},
    types::Map,
};
use indexmap::map::Entry;
use std::fmt;

/// What to do when two expansions of one symbol are predicted by the same terminal.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Keep the first-declared expansion silently.
    Ignore,
    /// Keep the first-declared expansion and log a warning.
    #[default]
    Warn,
    /// Fail with [`GrammarError::Conflict`].
    Deny,
}

#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct Config {
    pub conflicts: ConflictPolicy,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conflicts(mut self, policy: ConflictPolicy) -> Self {
        self.conflicts = policy;
        self
    }
}

/// Names used in the generated code, taken from the header options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub prefix: String,
    pub token_type: String,
    pub lexer_function: String,
    pub lexer_include: String,
    /// The C type of the token buffering flag and of `eat_token` results.
    pub token_flag_type: String,
    pub start: Option<String>,
}

impl Settings {
    pub fn from_header(header: &Header) -> Self {
        // an option without a value falls back to its default.
        let option = |key: &str| header.option(key).filter(|value| !value.is_empty());

        let prefix = option("prefix").unwrap_or("yy").to_owned();
        let token_type = option("token_type")
            .map_or_else(|| format!("{}_token_t", prefix), str::to_owned);
        let lexer_function = option("lexer_function")
            .or_else(|| option("lexer_entry"))
            .map_or_else(|| format!("{}_get_next_token()", prefix), str::to_owned);
        let lexer_include = option("lexer_include").unwrap_or("<lexer.h>").to_owned();
        let token_flag_type = option("token_flag_type").unwrap_or("int").to_owned();
        let start = option("start").map(str::to_owned);

        Self {
            prefix,
            token_type,
            lexer_function,
            lexer_include,
            token_flag_type,
            start,
        }
    }

    /// `<prefix>_<name>`
    pub fn prefixed(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }

    /// The routine parsing `symbol`.
    pub fn routine_name(&self, symbol: &str) -> String {
        self.prefixed(symbol)
    }

    /// The user action invoked after an expansion of `symbol` is parsed.
    pub fn action_name(&self, symbol: &str, expansion: usize) -> String {
        format!("{}_action_{}_{}", self.prefix, symbol, expansion)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Terminal<'g> {
    pub name: &'g str,
    pub value: &'g str,
}

/// One step of parsing an expansion.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Step<'g> {
    /// Consume a terminal. `index` counts the terminals of the expansion.
    Match { terminal: Terminal<'g>, index: usize },
    /// Parse a nonterminal and store the result in a node slot.
    Call {
        symbol: &'g str,
        slot: usize,
        nullable: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch<'g> {
    /// The position of the expansion within its symbol.
    pub expansion: usize,
    /// The terminals selecting this branch, shadowed ones removed.
    pub predictions: Vec<Terminal<'g>>,
    pub steps: Vec<Step<'g>>,
}

impl Branch<'_> {
    pub fn node_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, Step::Call { .. }))
            .count()
    }

    pub fn terminal_count(&self) -> usize {
        self.steps.len() - self.node_count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routine<'g> {
    pub symbol: &'g str,
    pub name: String,
    pub nullable: bool,
    /// The largest number of nonterminals in one expansion.
    pub node_count: usize,
    /// The largest number of terminals in one expansion.
    pub terminal_count: usize,
    /// Branches for the non-empty expansions, in declaration order.
    pub branches: Vec<Branch<'g>>,
    /// The first empty expansion, taken when no prediction matches.
    pub fallback: Option<usize>,
}

/// A terminal predicting more than one expansion of a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict<'g> {
    pub symbol: &'g str,
    pub terminal: &'g str,
    pub kept: usize,
    pub shadowed: usize,
}

impl From<&Conflict<'_>> for GrammarError {
    fn from(conflict: &Conflict<'_>) -> Self {
        Self::Conflict {
            symbol: conflict.symbol.to_owned(),
            terminal: conflict.terminal.to_owned(),
            kept: conflict.kept,
            shadowed: conflict.shadowed,
        }
    }
}

/// Renders a [`Codegen`] as source text.
pub trait Render {
    fn render(&self, codegen: &Codegen<'_>, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

/// A [`Codegen`] paired with a renderer.
pub struct Rendered<'a, 'g, R> {
    codegen: &'a Codegen<'g>,
    renderer: &'a R,
}

impl<R: Render> fmt::Display for Rendered<'_, '_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.renderer.render(self.codegen, f)
    }
}

/// The generated parser, before rendering.
#[derive(Debug)]
#[non_exhaustive]
pub struct Codegen<'g> {
    pub settings: Settings,
    pub terminals: Vec<Terminal<'g>>,
    pub routines: Vec<Routine<'g>>,
    /// The symbol parsed by the entry point.
    pub start: Option<&'g str>,
    pub conflicts: Vec<Conflict<'g>>,
    pub user_code: &'g str,
}

impl<'g> Codegen<'g> {
    /// Build the routines of an analyzed grammar with the settings from its header.
    pub fn new(grammar: &'g Grammar, config: &Config) -> Result<Self, GrammarError> {
        Self::with_settings(grammar, Settings::from_header(&grammar.header), config)
    }

    pub fn with_settings(
        grammar: &'g Grammar,
        settings: Settings,
        config: &Config,
    ) -> Result<Self, GrammarError> {
        let span = tracing::trace_span!("codegen");
        let _entered = span.enter();

        let start = match &settings.start {
            Some(name) => Some(
                grammar
                    .symbols
                    .get_key_value(name.as_str())
                    .map(|(name, _)| name.as_str())
                    .ok_or_else(|| GrammarError::UnknownStart { name: name.clone() })?,
            ),
            None => grammar.symbols.keys().next().map(String::as_str),
        };

        let mut conflicts = vec![];
        let mut routines = Vec::with_capacity(grammar.symbols.len());
        for name in grammar.symbols.keys() {
            routines.push(routine(grammar, &settings, name, &mut conflicts)?);
        }

        match config.conflicts {
            ConflictPolicy::Ignore => (),
            ConflictPolicy::Warn => {
                for conflict in &conflicts {
                    tracing::warn!(
                        "`{}' predicts both expansion {} and expansion {} of `{}'; keeping expansion {}",
                        conflict.terminal,
                        conflict.kept,
                        conflict.shadowed,
                        conflict.symbol,
                        conflict.kept,
                    );
                }
            }
            ConflictPolicy::Deny => {
                if let Some(conflict) = conflicts.first() {
                    return Err(conflict.into());
                }
            }
        }

        let terminals = grammar
            .header
            .terminals
            .iter()
            .map(|(name, value)| Terminal {
                name: name.as_str(),
                value: value.as_str(),
            })
            .collect();

        Ok(Self {
            settings,
            terminals,
            routines,
            start,
            conflicts,
            user_code: &grammar.user_code,
        })
    }

    pub fn routine(&self, symbol: &str) -> Option<&Routine<'g>> {
        self.routines.iter().find(|routine| routine.symbol == symbol)
    }

    /// Render with a renderer other than the default one.
    pub fn display<'a, R: Render>(&'a self, renderer: &'a R) -> Rendered<'a, 'g, R> {
        Rendered {
            codegen: self,
            renderer,
        }
    }
}

impl fmt::Display for Codegen<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        c::CRenderer.render(self, f)
    }
}

fn routine<'g>(
    grammar: &'g Grammar,
    settings: &Settings,
    symbol: &'g str,
    conflicts: &mut Vec<Conflict<'g>>,
) -> Result<Routine<'g>, GrammarError> {
    let header = &grammar.header;
    let expansions = grammar
        .symbol(symbol)
        .ok_or_else(|| GrammarError::Undefined {
            name: symbol.to_owned(),
        })?;

    // which expansion each emitted token value selects.
    let mut claimed: Map<&'g str, usize> = Map::default();
    let mut branches = vec![];
    let mut fallback = None;

    for (index, expansion) in expansions.expansions().iter().enumerate() {
        let leading = match expansion.first() {
            Some(leading) => leading,
            None => {
                if fallback.is_none() {
                    fallback = Some(index);
                } else {
                    tracing::debug!("{}: duplicate empty expansion {} ignored", symbol, index);
                }
                continue;
            }
        };

        let mut predictions = vec![];
        for terminal in predicting_set(grammar, leading)?.iter() {
            let (name, value) = match header.terminal(terminal) {
                Some(t) => t,
                None => continue,
            };
            match claimed.entry(value) {
                // another terminal of this expansion with the same value.
                Entry::Occupied(entry) if *entry.get() == index => (),
                Entry::Occupied(entry) => conflicts.push(Conflict {
                    symbol,
                    terminal: name,
                    kept: *entry.get(),
                    shadowed: index,
                }),
                Entry::Vacant(entry) => {
                    entry.insert(index);
                    predictions.push(Terminal { name, value });
                }
            }
        }

        branches.push(Branch {
            expansion: index,
            predictions,
            steps: steps(grammar, expansion)?,
        });
    }

    Ok(Routine {
        symbol,
        name: settings.routine_name(symbol),
        nullable: expansions.is_nullable(),
        node_count: branches.iter().map(Branch::node_count).max().unwrap_or(0),
        terminal_count: branches.iter().map(Branch::terminal_count).max().unwrap_or(0),
        branches,
        fallback,
    })
}

/// The terminals predicting an expansion starting with `leading`.
///
/// Only the leading token is considered, even when it is nullable.
fn predicting_set(grammar: &Grammar, leading: &str) -> Result<TerminalSet, GrammarError> {
    match grammar.resolve(leading) {
        Some(SymbolID::T(t)) => Ok(Some(t).into_iter().collect()),
        Some(SymbolID::N(n)) => Ok(grammar
            .nonterminal(n)
            .map(|(_, symbol)| symbol.first().clone())
            .unwrap_or_default()),
        None => Err(GrammarError::Undefined {
            name: leading.to_owned(),
        }),
    }
}

fn steps<'g>(grammar: &'g Grammar, expansion: &'g [String]) -> Result<Vec<Step<'g>>, GrammarError> {
    let mut steps = Vec::with_capacity(expansion.len());
    let mut terminals = 0;
    let mut slots = 0;

    for token in expansion {
        let step = match grammar.resolve(token) {
            Some(SymbolID::T(t)) => {
                let (name, value) = grammar.header.terminal(t).ok_or_else(|| {
                    GrammarError::Undefined {
                        name: token.clone(),
                    }
                })?;
                terminals += 1;
                Step::Match {
                    terminal: Terminal { name, value },
                    index: terminals - 1,
                }
            }
            Some(SymbolID::N(n)) => {
                slots += 1;
                Step::Call {
                    symbol: token.as_str(),
                    slot: slots - 1,
                    nullable: grammar
                        .nonterminal(n)
                        .map_or(false, |(_, symbol)| symbol.is_nullable()),
                }
            }
            None => {
                return Err(GrammarError::Undefined {
                    name: token.clone(),
                })
            }
        };
        steps.push(step);
    }

    Ok(steps)
}

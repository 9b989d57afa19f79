//! Calculation of nullability, FIRST and FOLLOW sets.

use crate::{
    grammar::{Grammar, GrammarError, Header, NonterminalID, Symbol, SymbolID, TerminalSet},
    types::{Map, Queue},
};

/// Which sets are computed.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Mode {
    /// Nullability and FIRST sets only. FOLLOW sets stay empty.
    ///
    /// A terminal ends the scan of an expansion without joining FIRST, so
    /// `a := b X` with a nullable `b` leaves `X` out of FIRST(a).
    #[default]
    Legacy,
    /// Also compute FOLLOW sets. A terminal reached after a nullable
    /// prefix joins FIRST before ending the scan.
    Follow,
}

/// Validate the grammar and compute the sets of every symbol in place.
///
/// On error the grammar is left untouched.
pub fn compute(grammar: &mut Grammar, mode: Mode) -> Result<(), GrammarError> {
    let span = tracing::trace_span!("compute_sets");
    let _entered = span.enter();

    let productions = Productions::resolve(&grammar.header, &grammar.symbols)?;
    productions.seed(&mut grammar.symbols);
    productions.first_sets(&mut grammar.symbols, mode);
    if mode == Mode::Follow {
        productions.follow_sets(&mut grammar.symbols);
    }

    Ok(())
}

/// The right-hand sides of the grammar with every token name resolved.
#[derive(Debug)]
struct Productions {
    /// Indexed by nonterminal, then by expansion.
    rules: Vec<Vec<Vec<SymbolID>>>,
    /// For each nonterminal, the expansions that mention it.
    users: Vec<Vec<(NonterminalID, usize)>>,
}

impl Productions {
    fn resolve(header: &Header, symbols: &Map<String, Symbol>) -> Result<Self, GrammarError> {
        let mut rules = Vec::with_capacity(symbols.len());
        let mut users = vec![vec![]; symbols.len()];

        for (raw, (name, symbol)) in symbols.iter().enumerate() {
            if header.is_terminal(name) {
                return Err(GrammarError::ExpansionForTerminal { name: name.clone() });
            }
            let owner = NonterminalID::from_raw(raw);

            let mut expansions = Vec::with_capacity(symbol.len());
            for (index, expansion) in symbol.expansions().iter().enumerate() {
                let mut right = Vec::with_capacity(expansion.len());
                for token in expansion {
                    let id = match header.terminal_id(token) {
                        Some(t) => SymbolID::T(t),
                        None => {
                            let n = symbols.get_index_of(token.as_str()).ok_or_else(|| {
                                GrammarError::Undefined {
                                    name: token.clone(),
                                }
                            })?;
                            let user = (owner, index);
                            if users[n].last() != Some(&user) {
                                users[n].push(user);
                            }
                            SymbolID::N(NonterminalID::from_raw(n))
                        }
                    };
                    right.push(id);
                }
                expansions.push(right);
            }
            rules.push(expansions);
        }

        Ok(Self { rules, users })
    }

    fn expansion(&self, owner: NonterminalID, index: usize) -> &[SymbolID] {
        &self.rules[owner.into_raw()][index][..]
    }

    /// Expansions starting with a terminal contribute it to FIRST right away.
    fn seed(&self, symbols: &mut Map<String, Symbol>) {
        for (raw, expansions) in self.rules.iter().enumerate() {
            for right in expansions {
                if let Some(SymbolID::T(t)) = right.first() {
                    symbols[raw].insert_first(*t);
                }
            }
        }
    }

    fn first_sets(&self, symbols: &mut Map<String, Symbol>, mode: Mode) {
        let mut queue: Queue<(NonterminalID, usize)> = self
            .rules
            .iter()
            .enumerate()
            .flat_map(|(raw, expansions)| {
                (0..expansions.len()).map(move |index| (NonterminalID::from_raw(raw), index))
            })
            .collect();

        let mut steps = 0usize;
        while let Some((owner, index)) = queue.pop() {
            steps += 1;
            if update_first(symbols, owner, self.expansion(owner, index), mode) {
                for &user in &self.users[owner.into_raw()] {
                    queue.push(user);
                }
            }
        }

        tracing::debug!(steps, "FIRST sets converged");
    }

    fn follow_sets(&self, symbols: &mut Map<String, Symbol>) {
        let mut passes = 0usize;
        let mut changed = true;
        while changed {
            changed = false;
            passes += 1;
            for (raw, expansions) in self.rules.iter().enumerate() {
                for right in expansions {
                    changed |= update_follow(symbols, NonterminalID::from_raw(raw), right);
                }
            }
        }

        tracing::debug!(passes, "FOLLOW sets converged");
    }
}

/// Update the owner's FIRST set and nullability from one of its expansions.
///
/// Returns whether the owner changed.
fn update_first(
    symbols: &mut Map<String, Symbol>,
    owner: NonterminalID,
    right: &[SymbolID],
    mode: Mode,
) -> bool {
    let owner = owner.into_raw();
    let mut changed = false;

    for token in right {
        match *token {
            SymbolID::T(t) => {
                // a leading terminal is already seeded.
                if mode == Mode::Follow {
                    changed |= symbols[owner].insert_first(t);
                }
                return changed;
            }
            SymbolID::N(n) => {
                let other = n.into_raw();
                if other != owner {
                    let first = symbols[other].first().clone();
                    changed |= symbols[owner].add_first(&first);
                }
                if !symbols[other].is_nullable() {
                    return changed;
                }
            }
        }
    }

    // every token can derive the empty string, and so can the owner.
    symbols[owner].set_nullable() || changed
}

/// Propagate FOLLOW sets into the nonterminals of one expansion.
fn update_follow(
    symbols: &mut Map<String, Symbol>,
    owner: NonterminalID,
    right: &[SymbolID],
) -> bool {
    let owner = owner.into_raw();
    let mut changed = false;

    for (i, token) in right.iter().enumerate() {
        let target = match token {
            SymbolID::N(n) => n.into_raw(),
            SymbolID::T(_) => continue,
        };

        let mut follow = TerminalSet::new();
        let mut rest_nullable = true;
        for next in &right[i + 1..] {
            match next {
                SymbolID::T(t) => {
                    follow.insert(*t);
                    rest_nullable = false;
                    break;
                }
                SymbolID::N(n) => {
                    let next = &symbols[n.into_raw()];
                    follow.union_with(next.first());
                    if !next.is_nullable() {
                        rest_nullable = false;
                        break;
                    }
                }
            }
        }
        if rest_nullable && target != owner {
            follow.union_with(symbols[owner].follow());
        }

        changed |= symbols[target].add_follow(&follow);
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{grammar::Error, syntax};

    const EXPANSIONS: &str = "
        %language = c
        FOO = Tok_FOO
        BAZ = Tok_BAZ
        BAR = Tok_BAR
        %%
        main := baz bar_prime BAZ
        bar  := FOO BAR
        bar_prime := bar bar_prime
        bar_prime :=
        baz := bar_prime
        baz := BAZ
        %%
        // this is a comment
    ";

    fn analyze(source: &str, mode: Mode) -> Result<Grammar, Error> {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let mut grammar = syntax::parse(source)?;
        compute(&mut grammar, mode)?;
        Ok(grammar)
    }

    fn first<'g>(grammar: &'g Grammar, name: &str) -> Vec<&'g str> {
        let mut names: Vec<_> = grammar.terminal_names(grammar.symbols[name].first()).collect();
        names.sort_unstable();
        names
    }

    fn follow<'g>(grammar: &'g Grammar, name: &str) -> Vec<&'g str> {
        let mut names: Vec<_> = grammar.terminal_names(grammar.symbols[name].follow()).collect();
        names.sort_unstable();
        names
    }

    #[test]
    fn expansion_creation() {
        let grammar = analyze(EXPANSIONS, Mode::Legacy).unwrap();
        let symbols = &grammar.symbols;

        assert_eq!(symbols.len(), 4);
        assert_eq!(symbols["main"].len(), 1);
        assert_eq!(symbols["bar"].len(), 1);
        assert_eq!(symbols["bar_prime"].len(), 2);
        assert_eq!(symbols["baz"].len(), 2);

        assert!(!symbols["main"].is_nullable());
        assert!(!symbols["bar"].is_nullable());
        assert!(symbols["bar_prime"].is_nullable());
        assert!(symbols["baz"].is_nullable());

        assert_eq!(first(&grammar, "main"), ["BAZ", "FOO"]);
        assert_eq!(first(&grammar, "bar"), ["FOO"]);
        assert_eq!(first(&grammar, "bar_prime"), ["FOO"]);
        assert_eq!(first(&grammar, "baz"), ["BAZ", "FOO"]);

        for name in ["main", "bar", "bar_prime", "baz"] {
            assert!(symbols[name].follow().is_empty(), "follow({})", name);
        }
    }

    #[test]
    fn follow_mode() {
        let grammar = analyze(EXPANSIONS, Mode::Follow).unwrap();

        assert!(follow(&grammar, "main").is_empty());
        assert_eq!(follow(&grammar, "baz"), ["BAZ", "FOO"]);
        assert_eq!(follow(&grammar, "bar_prime"), ["BAZ", "FOO"]);
        assert_eq!(follow(&grammar, "bar"), ["BAZ", "FOO"]);

        // FOLLOW does not disturb the other sets.
        assert_eq!(first(&grammar, "main"), ["BAZ", "FOO"]);
        assert!(grammar.symbols["baz"].is_nullable());
    }

    const NULLABLE_PREFIX: &str = "
        X = Tok_X
        Y = Tok_Y
        %%
        a := b c X
        b :=
        c := b
        c := Y
        d := a
        %%
    ";

    #[test]
    fn terminal_after_nullable_prefix() {
        let legacy = analyze(NULLABLE_PREFIX, Mode::Legacy).unwrap();
        assert_eq!(first(&legacy, "a"), ["Y"]);
        assert!(first(&legacy, "b").is_empty());
        assert!(legacy.symbols["c"].is_nullable());
        assert!(!legacy.symbols["a"].is_nullable());
        assert_eq!(first(&legacy, "d"), ["Y"]);

        let follow = analyze(NULLABLE_PREFIX, Mode::Follow).unwrap();
        assert_eq!(first(&follow, "a"), ["X", "Y"]);
        assert!(!follow.symbols["a"].is_nullable());
        assert_eq!(first(&follow, "d"), ["X", "Y"]);
    }

    #[test]
    fn leading_terminal_is_seeded_in_both_modes() {
        for mode in [Mode::Legacy, Mode::Follow] {
            let grammar = analyze(
                "
                X = Tok_X
                Y = Tok_Y
                %%
                s := a
                s := X
                a := b X
                b :=
                b := Y
                %%
                ",
                mode,
            )
            .unwrap();
            assert_eq!(first(&grammar, "b"), ["Y"]);
            assert_eq!(first(&grammar, "s"), ["X", "Y"]);
            match mode {
                Mode::Legacy => assert_eq!(first(&grammar, "a"), ["Y"]),
                Mode::Follow => assert_eq!(first(&grammar, "a"), ["X", "Y"]),
            }
        }
    }

    #[test]
    fn transitive_nullability_in_any_order() {
        // `top` only becomes nullable after `mid`, which is declared later.
        let grammar = analyze(
            "
            T = Tok_T
            %%
            top := mid mid
            top := T
            mid := low
            low :=
            rec := rec T
            %%
            ",
            Mode::Legacy,
        )
        .unwrap();

        assert!(grammar.symbols["top"].is_nullable());
        assert!(grammar.symbols["mid"].is_nullable());
        assert!(!grammar.symbols["rec"].is_nullable());
        assert!(first(&grammar, "rec").is_empty());
        assert_eq!(first(&grammar, "top"), ["T"]);
    }

    #[test]
    fn left_recursion_converges() {
        let grammar = analyze(
            "
            NUM = Tok_NUM
            PLUS = Tok_PLUS
            LPAREN = Tok_LPAREN
            RPAREN = Tok_RPAREN
            %%
            expr := expr PLUS term
            expr := term
            term := NUM
            term := LPAREN expr RPAREN
            %%
            ",
            Mode::Follow,
        )
        .unwrap();

        assert_eq!(first(&grammar, "expr"), ["LPAREN", "NUM"]);
        assert_eq!(follow(&grammar, "expr"), ["PLUS", "RPAREN"]);
        assert_eq!(follow(&grammar, "term"), ["PLUS", "RPAREN"]);
    }

    #[test]
    fn undefined_symbols() {
        for (source, name) in [
            (" %% main := TOKEN %% ", "TOKEN"),
            (" %% main := fdass %% ", "fdass"),
            ("A = a %% main := A b %% ", "b"),
        ] {
            match analyze(source, Mode::Legacy) {
                Err(Error::Grammar(GrammarError::Undefined { name: found })) => {
                    assert_eq!(found, name)
                }
                other => panic!("unexpected result for {:?}: {:?}", source, other),
            }
        }
    }

    #[test]
    fn expansion_for_terminal() {
        let err = analyze("TOKEN %% TOKEN := invalid \n invalid := %% ", Mode::Legacy)
            .unwrap_err();
        match err {
            Error::Grammar(GrammarError::ExpansionForTerminal { ref name }) => {
                assert_eq!(name, "TOKEN")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn failed_validation_leaves_sets_empty() {
        let mut grammar = syntax::parse("A = a %% x := A \n y := A missing %% ").unwrap();
        assert!(compute(&mut grammar, Mode::Follow).is_err());
        assert!(grammar.symbols["x"].first().is_empty());
    }
}

//! Calculation of the FIRST set function.

use crate::{
    grammar::{Grammar, NonterminalID, RuleID, SymbolID, TerminalID},
    util::{Map, Set},
};

#[derive(Debug)]
pub struct FirstSets {
    nulls: Set<NonterminalID>,
    map: Map<SymbolID, Set<TerminalID>>,
}

impl FirstSets {
    pub fn new<V>(grammar: &Grammar<V>) -> Self {
        let nulls = nulls_set(grammar);

        // terminal symbols are trivially their own FIRST set,
        // nonterminals start out empty
        let mut map: Map<SymbolID, Set<TerminalID>> = Map::default();
        for terminal in grammar.terminals.values() {
            map.insert(
                SymbolID::T(terminal.id()),
                Some(terminal.id()).into_iter().collect(),
            );
        }
        for nonterminal in grammar.nonterminals.values() {
            map.insert(SymbolID::N(nonterminal.id()), Set::default());
        }

        // Constraint extraction.
        // For a rule X := Y1 Y2 ... Yn, walk Y1, Y2, ... up to (and
        // including) the first non-nullable symbol Yk, and require
        // First(X) ⊇ First(Yi) for each visited Yi.
        struct Constraint {
            sup: SymbolID,
            sub: SymbolID,
        }
        let mut constraints = vec![];
        for rule in grammar
            .rules
            .values()
            .filter(|rule| rule.id() != RuleID::ACCEPT)
        {
            for symbol in rule.right() {
                if !matches!(symbol, SymbolID::N(n) if *n == rule.left()) {
                    constraints.push(Constraint {
                        sup: SymbolID::N(rule.left()),
                        sub: *symbol,
                    });
                }
                if !matches!(symbol, SymbolID::N(n) if nulls.contains(n)) {
                    break;
                }
            }
        }

        // Constraint resolution: add the elements of the subset to the
        // superset until nothing changes anymore.
        let mut changed = true;
        while changed {
            changed = false;

            for Constraint { sup, sub } in &constraints {
                let mut superset = map.swap_remove(sup).unwrap();
                let subset = &map[sub];
                for tok in subset {
                    if !superset.contains(tok) {
                        superset.insert(*tok);
                        changed = true;
                    }
                }
                map.insert(*sup, superset);
            }
        }

        Self { nulls, map }
    }

    /// `First(prefix · lookaheads)`
    ///
    /// Walks the prefix accumulating the FIRST set of every symbol until
    /// the first non-nullable one; if the whole prefix derives the empty
    /// string, the supplied lookahead symbols are part of the result.
    pub fn get<L>(&self, prefix: &[SymbolID], lookaheads: L) -> Set<TerminalID>
    where
        L: IntoIterator<Item = TerminalID>,
    {
        let mut res = Set::default();

        let mut is_end = false;
        for symbol in prefix {
            res.extend(self.map[symbol].iter().copied());
            if !matches!(symbol, SymbolID::N(n) if self.nulls.contains(n)) {
                is_end = true;
                break;
            }
        }

        if !is_end {
            res.extend(lookaheads);
        }

        res
    }
}

/// Calculate the set of nullable nonterminal symbols in this grammar.
fn nulls_set<V>(grammar: &Grammar<V>) -> Set<NonterminalID> {
    // symbols with an empty production are trivially nullable
    let mut nulls: Set<NonterminalID> = grammar
        .rules
        .values()
        .filter_map(|rule| rule.right().is_empty().then(|| rule.left()))
        .collect();

    // repeat until the set no longer changes
    let mut changed = true;
    while changed {
        changed = false;
        for rule in grammar.rules.values() {
            if nulls.contains(&rule.left()) {
                continue;
            }
            let is_rhs_nullable = rule
                .right()
                .iter()
                .all(|symbol| matches!(symbol, SymbolID::N(n) if nulls.contains(n)));
            if is_rhs_nullable {
                changed = true;
                nulls.insert(rule.left());
                continue;
            }
        }
    }

    nulls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::SymbolID::*;

    fn noop(_: Vec<i64>) -> i64 {
        0
    }

    #[test]
    fn nullable_prefix_propagates() {
        let grammar: Grammar<i64> = Grammar::define(|g| {
            let a = g.terminal("A", None)?;
            let b = g.terminal("B", None)?;
            let p = g.nonterminal("P")?;
            let s = g.nonterminal("S")?;
            g.start_symbol(s)?;
            g.rule(p, [], None, noop)?;
            g.rule(p, [T(b)], None, noop)?;
            g.rule(s, [N(p), T(a)], None, noop)?;
            Ok(())
        })
        .unwrap();

        let first = FirstSets::new(&grammar);
        let (a, b) = (grammar.terminals[1].id(), grammar.terminals[2].id());
        let p = grammar.nonterminals[1].id();

        // P derives the empty string, so First(P a) includes First(a)
        let set = first.get(&[N(p), T(a)], None::<TerminalID>);
        assert!(set.contains(&a));
        assert!(set.contains(&b));

        let only_a = first.get(&[T(a)], None::<TerminalID>);
        assert!(only_a.contains(&a));
        assert_eq!(only_a.len(), 1);
    }

    #[test]
    fn epsilon_only_prefix_is_transparent() {
        let grammar: Grammar<i64> = Grammar::define(|g| {
            let a = g.terminal("A", None)?;
            let p = g.nonterminal("P")?;
            let s = g.nonterminal("S")?;
            g.start_symbol(s)?;
            g.rule(p, [], None, noop)?;
            g.rule(s, [N(p), T(a)], None, noop)?;
            Ok(())
        })
        .unwrap();

        let first = FirstSets::new(&grammar);
        let a = grammar.terminals[1].id();
        let p = grammar.nonterminals[1].id();

        // First(P a) == First(a) when P := ε is the only production of P
        assert_eq!(first.get(&[N(p), T(a)], None::<TerminalID>), first.get(&[T(a)], None::<TerminalID>));
        assert_eq!(first.get(&[T(a)], None::<TerminalID>).first(), Some(&a));
    }

    #[test]
    fn empty_sequence_yields_the_lookahead() {
        let grammar: Grammar<i64> = Grammar::define(|g| {
            let a = g.terminal("A", None)?;
            let s = g.nonterminal("S")?;
            g.start_symbol(s)?;
            g.rule(s, [T(a)], None, noop)?;
            Ok(())
        })
        .unwrap();

        let first = FirstSets::new(&grammar);
        let set = first.get(&[], Some(TerminalID::EOI));
        assert_eq!(set.len(), 1);
        assert!(set.contains(&TerminalID::EOI));
    }
}

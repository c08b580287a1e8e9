//! Compilation of the LR(1) automaton into a deterministic action table.

use crate::{
    grammar::{Assoc, Grammar, NonterminalID, Precedence, RuleID, SymbolID, TerminalID},
    lr1::{NodeID, DFA},
    util::{display_fn, Map, Set},
};
use std::{cmp::Ordering, fmt};

/// The action performed in a state on a particular lookahead terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// Read the lookahead symbol and transition to the specified state.
    Shift(NodeID),

    /// Reduce to the specified production rule.
    Reduce(RuleID),

    /// The terminal reduction of the synthetic start rule: one sentence
    /// has been matched completely.
    Accept,
}

/// Build-time warnings collected while compiling the table.
///
/// None of these block table construction; an ambiguous grammar still
/// yields a working, merely imprecise, parser.
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// Shift/reduce conflicts that could not be resolved by precedence
    /// and were defaulted to shift.
    pub shift_reduce_conflicts: usize,

    /// Reduce/reduce conflicts, resolved in favor of the rule declared
    /// earliest.
    pub reduce_reduce_conflicts: usize,

    /// Terminals that drive no action in any state.
    pub unused_terminals: Vec<TerminalID>,

    /// Nonterminals that no goto transition ever targets.
    pub unreachable_nonterminals: Vec<NonterminalID>,
}

/// The compiled `(state, terminal) -> action` and
/// `(state, nonterminal) -> state` tables.
///
/// A missing action entry means a syntax error on that lookahead. The
/// table is immutable once generated and can be shared freely between
/// parser instances.
#[derive(Debug)]
pub struct ParseTable {
    actions: Map<NodeID, Map<TerminalID, Action>>,
    gotos: Map<NodeID, Map<NonterminalID, NodeID>>,
    diagnostics: Diagnostics,
}

impl ParseTable {
    pub fn generate<V>(grammar: &Grammar<V>, dfa: &DFA) -> Self {
        let mut diagnostics = Diagnostics::default();
        let mut actions: Map<NodeID, Map<TerminalID, Action>> = Map::default();
        let mut gotos: Map<NodeID, Map<NonterminalID, NodeID>> = Map::default();

        for (id, node) in dfa.nodes() {
            // Collect every proposed action into a multi-map first, then
            // resolve all of them in a second, deterministic pass.
            let mut pending: Map<TerminalID, PendingAction> = Map::default();
            let mut node_gotos: Map<NonterminalID, NodeID> = Map::default();

            for (symbol, target) in node.edges() {
                match symbol {
                    SymbolID::T(t) => {
                        pending.entry(t).or_default().shift = Some(target);
                    }
                    SymbolID::N(n) => {
                        node_gotos.insert(n, target);
                    }
                }
            }

            for (core, lookaheads) in &node.item_set {
                let rule = &grammar.rules[&core.rule];
                if core.marker < rule.right().len() {
                    continue;
                }
                for lookahead in lookaheads {
                    pending.entry(*lookahead).or_default().reduces.push(core.rule);
                }
            }

            let mut resolved: Map<TerminalID, Action> = Map::default();
            for (terminal, pending) in pending {
                match resolve_action(grammar, id, terminal, &pending, &mut diagnostics) {
                    Ok(action) => {
                        resolved.insert(terminal, action);
                    }
                    Err(ResolveError::Nonassociative) => {
                        // the entry is removed entirely; any input hitting
                        // it at run time is a syntax error
                        tracing::debug!(
                            state = %id,
                            lookahead = %grammar.terminals[&terminal],
                            "nonassociative operator, no action registered",
                        );
                    }
                    Err(ResolveError::MissingPrecedence) => {
                        unreachable!("missing precedence is resolved to shift")
                    }
                }
            }

            actions.insert(id, resolved);
            gotos.insert(id, node_gotos);
        }

        // every terminal should drive at least one action
        let used: Set<TerminalID> = actions
            .values()
            .flat_map(|entries| entries.keys().copied())
            .collect();
        for terminal in grammar.terminals.values() {
            if terminal.id() == TerminalID::EOI {
                continue;
            }
            if !used.contains(&terminal.id()) {
                tracing::warn!("unused terminal: {}", terminal);
                diagnostics.unused_terminals.push(terminal.id());
            }
        }

        // every nonterminal should be the target of some goto transition
        let reached: Set<NonterminalID> = gotos
            .values()
            .flat_map(|entries| entries.keys().copied())
            .collect();
        for nonterminal in grammar.nonterminals.values() {
            if nonterminal.id() == NonterminalID::START {
                continue;
            }
            if !reached.contains(&nonterminal.id()) {
                tracing::warn!("unreachable nonterminal: {}", nonterminal);
                diagnostics.unreachable_nonterminals.push(nonterminal.id());
            }
        }

        Self {
            actions,
            gotos,
            diagnostics,
        }
    }

    /// Return the initial state number.
    pub fn initial_state(&self) -> NodeID {
        NodeID::START
    }

    /// Return the action for the given state and lookahead terminal, if
    /// any exists.
    pub fn action(&self, state: NodeID, lookahead: TerminalID) -> Option<Action> {
        self.actions.get(&state)?.get(&lookahead).copied()
    }

    /// Return the state entered after reducing to `left` in `state`.
    pub fn goto(&self, state: NodeID, left: NonterminalID) -> Option<NodeID> {
        self.gotos.get(&state)?.get(&left).copied()
    }

    /// The terminals that have a valid action in the given state.
    pub fn expected_terminals(&self, state: NodeID) -> Vec<TerminalID> {
        self.actions
            .get(&state)
            .map(|entries| entries.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Warnings collected during table compilation.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn display<'g, V>(&'g self, g: &'g Grammar<V>) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (i, (id, entries)) in self.actions.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }

                writeln!(f, "#### State {:02}", id)?;
                writeln!(f, "## actions")?;
                for (terminal, action) in entries {
                    let terminal = &g.terminals[terminal];
                    match action {
                        Action::Shift(n) => {
                            writeln!(f, "- {} => shift({:02})", terminal, n)?;
                        }
                        Action::Reduce(rule) => {
                            let rule = &g.rules[rule];
                            writeln!(f, "- {} => reduce({})", terminal, rule.display(g))?;
                        }
                        Action::Accept => {
                            writeln!(f, "- {} => accept", terminal)?;
                        }
                    }
                }

                writeln!(f, "## gotos")?;
                for (symbol, goto) in &self.gotos[id] {
                    writeln!(f, "- {} => goto({:02})", g.nonterminals[symbol], goto)?;
                }
            }
            Ok(())
        })
    }
}

#[derive(Default)]
struct PendingAction {
    shift: Option<NodeID>,
    reduces: Vec<RuleID>,
}

// Internal control-flow signal of the resolution pass; never escapes the
// table compiler.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ResolveError {
    Nonassociative,
    MissingPrecedence,
}

enum Preference {
    Shift,
    Reduce,
}

/// Resolve the set of proposed actions for one `(state, terminal)` pair
/// into at most one action.
fn resolve_action<V>(
    g: &Grammar<V>,
    state: NodeID,
    terminal: TerminalID,
    pending: &PendingAction,
    diagnostics: &mut Diagnostics,
) -> Result<Action, ResolveError> {
    // reduce/reduce: the rule declared earliest wins; the proposals
    // arrive in declaration order because item sets are ordered by rule
    debug_assert!(pending.reduces.windows(2).all(|w| w[0] <= w[1]));
    let reduce = match &pending.reduces[..] {
        [] => None,
        [reduce] => Some(*reduce),
        [reduce, losers @ ..] => {
            diagnostics.reduce_reduce_conflicts += losers.len();
            for loser in losers {
                tracing::warn!(
                    state = %state,
                    lookahead = %g.terminals[&terminal],
                    "reduce/reduce conflict: ({}) loses to ({})",
                    g.rules[loser].display(g),
                    g.rules[reduce].display(g),
                );
            }
            Some(*reduce)
        }
    };

    match (pending.shift, reduce) {
        (Some(next), None) => Ok(Action::Shift(next)),
        (None, Some(RuleID::ACCEPT)) => Ok(Action::Accept),
        (None, Some(reduce)) => Ok(Action::Reduce(reduce)),
        (None, None) => unreachable!("no action was proposed"),

        // shift/reduce conflict
        (Some(next), Some(reduce)) => {
            let shift_prec = g.terminals[&terminal].precedence();
            let reduce_prec = g.rules[&reduce].precedence(g);

            match compare_precs(shift_prec, reduce_prec) {
                Ok(Preference::Shift) => Ok(Action::Shift(next)),
                Ok(Preference::Reduce) => Ok(Action::Reduce(reduce)),
                Err(ResolveError::Nonassociative) => Err(ResolveError::Nonassociative),
                Err(ResolveError::MissingPrecedence) => {
                    // classic yacc: shift when precedence alone cannot
                    // settle the conflict
                    diagnostics.shift_reduce_conflicts += 1;
                    tracing::warn!(
                        state = %state,
                        lookahead = %g.terminals[&terminal],
                        "shift/reduce conflict: defaulting to shift over ({})",
                        g.rules[&reduce].display(g),
                    );
                    Ok(Action::Shift(next))
                }
            }
        }
    }
}

fn compare_precs(
    shift_prec: Option<Precedence>,
    reduce_prec: Option<Precedence>,
) -> Result<Preference, ResolveError> {
    match (shift_prec, reduce_prec) {
        (Some(p1), Some(p2)) => match Ord::cmp(&p1.priority, &p2.priority) {
            Ordering::Greater => Ok(Preference::Shift),
            Ordering::Less => Ok(Preference::Reduce),
            Ordering::Equal => match p1.assoc {
                Assoc::Left => Ok(Preference::Reduce),
                Assoc::Right => Ok(Preference::Shift),
                Assoc::Nonassoc => Err(ResolveError::Nonassociative),
            },
        },
        _ => Err(ResolveError::MissingPrecedence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::SymbolID::*;

    fn noop(_: Vec<()>) {}

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn dangling_else() -> Grammar<()> {
        Grammar::define(|g| {
            let t_if = g.terminal("IF", None)?;
            let t_else = g.terminal("ELSE", None)?;
            let t_expr = g.terminal("EXPR", None)?;

            let s = g.nonterminal("STMT")?;
            g.start_symbol(s)?;

            g.rule(s, [T(t_if), N(s)], None, noop)?;
            g.rule(s, [T(t_if), N(s), T(t_else), N(s)], None, noop)?;
            g.rule(s, [T(t_expr)], None, noop)?;

            Ok(())
        })
        .unwrap()
    }

    fn compile<V>(grammar: &Grammar<V>) -> ParseTable {
        let dfa = DFA::generate(grammar);
        ParseTable::generate(grammar, &dfa)
    }

    #[test]
    fn dangling_else_defaults_to_shift() {
        init_tracing();

        let grammar = dangling_else();
        let table = compile(&grammar);

        // without precedence declarations the ambiguity is settled by the
        // shift preference, which binds each ELSE to the innermost IF
        assert_eq!(table.diagnostics().shift_reduce_conflicts, 1);
        assert_eq!(table.diagnostics().reduce_reduce_conflicts, 0);

        let t_else = grammar.terminals[2].id();
        let conflicted = table
            .actions
            .values()
            .filter_map(|entries| entries.get(&t_else))
            .filter(|action| matches!(action, Action::Shift(..)))
            .count();
        assert!(conflicted > 0);
    }

    #[test]
    fn precedence_resolves_shift_reduce() {
        let grammar: Grammar<()> = Grammar::define(|g| {
            let p_add = g.precedence(Assoc::Left);
            let p_mul = g.precedence(Assoc::Left);

            let plus = g.terminal("PLUS", Some(p_add))?;
            let star = g.terminal("STAR", Some(p_mul))?;
            let num = g.terminal("NUM", None)?;

            let e = g.nonterminal("E")?;
            g.start_symbol(e)?;

            g.rule(e, [N(e), T(plus), N(e)], None, noop)?;
            g.rule(e, [N(e), T(star), N(e)], None, noop)?;
            g.rule(e, [T(num)], None, noop)?;

            Ok(())
        })
        .unwrap();

        let table = compile(&grammar);
        // every conflict is settled by the declared precedences
        assert_eq!(table.diagnostics().shift_reduce_conflicts, 0);
        assert_eq!(table.diagnostics().reduce_reduce_conflicts, 0);
    }

    #[test]
    fn nonassociative_conflicts_drop_the_action() {
        let grammar: Grammar<()> = Grammar::define(|g| {
            let p_eq = g.precedence(Assoc::Nonassoc);
            let eq = g.terminal("EQUAL", Some(p_eq))?;
            let num = g.terminal("NUM", None)?;

            let e = g.nonterminal("E")?;
            g.start_symbol(e)?;

            g.rule(e, [N(e), T(eq), N(e)], None, noop)?;
            g.rule(e, [T(num)], None, noop)?;

            Ok(())
        })
        .unwrap();

        let table = compile(&grammar);
        let eq = grammar.terminals[1].id();

        // the state holding `E := E EQUAL E .` must reject a further EQUAL
        let rejected = table.actions.iter().any(|(id, entries)| {
            !entries.contains_key(&eq) && table.expected_terminals(*id).contains(&TerminalID::EOI)
        });
        assert!(rejected);
        assert_eq!(table.diagnostics().shift_reduce_conflicts, 0);
    }

    #[test]
    fn reduce_reduce_prefers_the_earliest_rule() {
        // two unit rules for the same input: ID can close either NAME or
        // VALUE, and NAME is declared first
        let grammar: Grammar<()> = Grammar::define(|g| {
            let id = g.terminal("ID", None)?;

            let s = g.nonterminal("S")?;
            let name = g.nonterminal("NAME")?;
            let value = g.nonterminal("VALUE")?;
            g.start_symbol(s)?;

            let r_name = g.rule(name, [T(id)], None, noop)?;
            let r_value = g.rule(value, [T(id)], None, noop)?;
            g.rule(s, [N(name)], None, noop)?;
            g.rule(s, [N(value)], None, noop)?;

            let _ = r_value;
            assert!(r_name < r_value);

            Ok(())
        })
        .unwrap();

        let table = compile(&grammar);
        assert_eq!(table.diagnostics().reduce_reduce_conflicts, 1);

        // the winning reduce is the NAME rule
        let name = grammar.nonterminals[2].id();
        let reduces: Vec<_> = table
            .actions
            .values()
            .flat_map(|entries| entries.values())
            .filter_map(|action| match action {
                Action::Reduce(rule) => Some(grammar.rules[rule].left()),
                _ => None,
            })
            .collect();
        assert!(reduces.contains(&name));
    }

    #[test]
    fn unreachable_nonterminal_is_reported() {
        let grammar: Grammar<()> = Grammar::define(|g| {
            let num = g.terminal("NUM", None)?;
            let e = g.nonterminal("E")?;
            let z = g.nonterminal("Z")?;
            g.start_symbol(e)?;
            g.rule(e, [T(num)], None, noop)?;
            let z_rule = g.rule(z, [T(num)], None, noop)?;
            let _ = z_rule;
            Ok(())
        })
        .unwrap();

        let dfa = DFA::generate(&grammar);
        let table = ParseTable::generate(&grammar, &dfa);

        let z = grammar.nonterminals[2].id();
        assert_eq!(table.diagnostics().unreachable_nonterminals, vec![z]);

        // none of Z's productions leaks into a reachable state
        let z_rules: Vec<_> = grammar
            .rules
            .values()
            .filter(|rule| rule.left() == z)
            .map(|rule| rule.id())
            .collect();
        for (_, node) in dfa.nodes() {
            for core in node.item_set.keys() {
                assert!(!z_rules.contains(&core.rule));
            }
        }
    }

    #[test]
    fn unused_terminal_is_reported() {
        let grammar: Grammar<()> = Grammar::define(|g| {
            let num = g.terminal("NUM", None)?;
            let unused = g.terminal("UNUSED", None)?;
            let e = g.nonterminal("E")?;
            g.start_symbol(e)?;
            g.rule(e, [T(num)], None, noop)?;
            let _ = unused;
            Ok(())
        })
        .unwrap();

        let table = compile(&grammar);
        let unused = grammar.terminals[2].id();
        assert_eq!(table.diagnostics().unused_terminals, vec![unused]);
    }

    #[test]
    fn generation_is_deterministic() {
        let grammar = dangling_else();

        let collect = |table: &ParseTable| {
            let actions: Vec<_> = table
                .actions
                .iter()
                .flat_map(|(id, entries)| {
                    entries
                        .iter()
                        .map(move |(terminal, action)| (*id, *terminal, *action))
                })
                .collect();
            let gotos: Vec<_> = table
                .gotos
                .iter()
                .flat_map(|(id, entries)| {
                    entries.iter().map(move |(left, goto)| (*id, *left, *goto))
                })
                .collect();
            (actions, gotos)
        };

        let fst = compile(&grammar);
        let snd = compile(&grammar);
        assert_eq!(collect(&fst), collect(&snd));
    }
}

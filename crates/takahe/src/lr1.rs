//! Canonical LR(1) automaton construction.

use crate::{
    first_sets::FirstSets,
    grammar::{Grammar, RuleID, SymbolID, TerminalID},
    util::{display_fn, Map},
};
use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    fmt,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NodeID {
    raw: u64,
}

impl NodeID {
    pub(crate) const START: Self = Self::new(0);

    const fn new(raw: u64) -> Self {
        Self { raw }
    }
}

impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

// LR(1) item core: a production rule with a marker position on its
// right-hand side. The lookahead symbols are kept apart so that the core
// can serve as an ordered map key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct LRItemCore {
    pub(crate) rule: RuleID,
    pub(crate) marker: usize,
}

impl LRItemCore {
    // `"(LHS := R1 . R2 R3)"`
    fn display<V>(self, g: &Grammar<V>) -> impl fmt::Display + '_ {
        display_fn(move |f| {
            let rule = &g.rules[&self.rule];
            write!(f, "({} :=", g.nonterminals[&rule.left()])?;
            for (i, symbol) in rule.right().iter().enumerate() {
                if i == self.marker {
                    f.write_str(" .")?;
                }
                match symbol {
                    SymbolID::T(t) => write!(f, " {}", g.terminals[t])?,
                    SymbolID::N(n) => write!(f, " {}", g.nonterminals[n])?,
                }
            }
            if self.marker == rule.right().len() {
                f.write_str(" .")?;
            }

            f.write_str(")")
        })
    }
}

// An item set maps each core to its associated lookahead terminals. The
// map itself is the canonical identity of a state: two equal item sets
// are the same state.
pub(crate) type LRItemSet = BTreeMap<LRItemCore, BTreeSet<TerminalID>>;

/// A single state of the LR(1) automaton.
#[derive(Debug)]
pub struct DFANode {
    pub(crate) item_set: LRItemSet,
    pub(crate) edges: Map<SymbolID, NodeID>,
}

impl DFANode {
    /// The transitions leaving this state, on terminal and nonterminal
    /// symbols alike.
    pub fn edges(&self) -> impl Iterator<Item = (SymbolID, NodeID)> + '_ {
        self.edges.iter().map(|(symbol, target)| (*symbol, *target))
    }
}

/// The canonical collection of LR(1) item sets with its goto relation.
#[derive(Debug)]
pub struct DFA {
    nodes: Map<NodeID, DFANode>,
}

impl DFA {
    pub fn generate<V>(grammar: &Grammar<V>) -> Self {
        let mut gen = DFAGenerator::new(grammar);
        gen.populate_nodes();
        tracing::debug!(states = gen.nodes.len(), "LR(1) automaton constructed");
        Self { nodes: gen.nodes }
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeID, &DFANode)> + '_ {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    pub fn node(&self, id: NodeID) -> &DFANode {
        &self.nodes[&id]
    }

    pub fn display<'g, V>(&'g self, g: &'g Grammar<V>) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (i, (id, node)) in self.nodes().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }

                writeln!(f, "#### State {:02}", id)?;
                writeln!(f, "## items")?;
                for (core, lookaheads) in &node.item_set {
                    write!(f, "- {}  [", core.display(g))?;
                    for (i, lookahead) in lookaheads.iter().enumerate() {
                        if i > 0 {
                            f.write_str(" ")?;
                        }
                        write!(f, "{}", g.terminals[lookahead])?;
                    }
                    f.write_str("]\n")?;
                }

                writeln!(f, "## edges")?;
                for (symbol, target) in node.edges() {
                    match symbol {
                        SymbolID::T(t) => writeln!(f, "- {} -> {:02}", g.terminals[&t], target)?,
                        SymbolID::N(n) => writeln!(f, "- {} -> {:02}", g.nonterminals[&n], target)?,
                    }
                }
            }
            Ok(())
        })
    }
}

// === DFAGenerator ===

struct DFAGenerator<'g, V> {
    grammar: &'g Grammar<V>,
    first_sets: FirstSets,
    nodes: Map<NodeID, DFANode>,
    // closed item set -> interned state
    interned: Map<LRItemSet, NodeID>,
    pending: VecDeque<(NodeID, LRItemSet)>,
    next_node_id: u64,
}

impl<'g, V> DFAGenerator<'g, V> {
    fn new(grammar: &'g Grammar<V>) -> Self {
        let mut gen = Self {
            grammar,
            first_sets: FirstSets::new(grammar),
            nodes: Map::default(),
            interned: Map::default(),
            pending: VecDeque::new(),
            next_node_id: 0,
        };

        // seed state:
        // [$start := . S] {$eoi}
        let mut item_set = LRItemSet::new();
        item_set.insert(
            LRItemCore {
                rule: RuleID::ACCEPT,
                marker: 0,
            },
            Some(TerminalID::EOI).into_iter().collect(),
        );
        gen.expand_closures(&mut item_set);
        gen.intern(item_set);

        gen
    }

    /// Look up the state holding exactly this (closed) item set, or
    /// allocate a fresh one and put it on the work queue.
    fn intern(&mut self, item_set: LRItemSet) -> NodeID {
        if let Some(&id) = self.interned.get(&item_set) {
            return id;
        }
        let id = NodeID::new(self.next_node_id);
        self.next_node_id += 1;
        self.interned.insert(item_set.clone(), id);
        self.pending.push_back((id, item_set));
        id
    }

    /// Repeat closure expansion and state registration until no new state
    /// is discovered.
    fn populate_nodes(&mut self) {
        while let Some((id, item_set)) = self.pending.pop_front() {
            let mut edges = Map::default();

            for (symbol, mut next_set) in self.extract_transitions(&item_set) {
                self.expand_closures(&mut next_set);
                let target = self.intern(next_set);
                edges.insert(symbol, target);
            }

            self.nodes.insert(id, DFANode { item_set, edges });
        }
    }

    /// Closure expansion.
    fn expand_closures(&self, items: &mut LRItemSet) {
        let mut changed = true;
        while changed {
            changed = false;

            // candidate extraction
            let mut added: Map<LRItemCore, BTreeSet<TerminalID>> = Map::default();
            for (core, lookaheads) in items.iter() {
                let rule = &self.grammar.rules[&core.rule];

                // [X := ... @ N beta]
                //  N: one nonterminal symbol
                let (n_symbol, beta) = match &rule.right()[core.marker..] {
                    [SymbolID::N(n_symbol), beta @ ..] => (n_symbol, beta),
                    _ => continue,
                };

                // With lookaheads = {x1,...,xk}, every terminal in
                //   First(beta x1) ∪ ... ∪ First(beta xk)
                // becomes a lookahead of the expanded items.
                let x = self.first_sets.get(beta, lookaheads.iter().copied());
                for rule in self.grammar.rules.values() {
                    // only rules of the form N := ...
                    if rule.left() != *n_symbol {
                        continue;
                    }

                    added
                        .entry(LRItemCore {
                            rule: rule.id(),
                            marker: 0,
                        })
                        .or_default()
                        .extend(x.iter().copied());
                }
            }

            for (core, lookaheads) in added {
                let slot = items.entry(core).or_insert_with(|| {
                    changed = true;
                    BTreeSet::new()
                });
                for l in lookaheads {
                    changed |= slot.insert(l);
                }
            }
        }
    }

    /// Extract the transition targets (not yet closed) of the given item
    /// set, grouped by the symbol right after the marker.
    fn extract_transitions(&self, items: &LRItemSet) -> Map<SymbolID, LRItemSet> {
        let mut item_sets: Map<SymbolID, LRItemSet> = Map::default();
        for (core, lookaheads) in items {
            let rule = &self.grammar.rules[&core.rule];

            // ignore items whose marker reached the end
            if core.marker >= rule.right().len() {
                continue;
            }

            let label = rule.right()[core.marker];
            item_sets
                .entry(label)
                .or_default()
                .entry(LRItemCore {
                    marker: core.marker + 1,
                    ..*core
                })
                .or_default()
                .extend(lookaheads.iter().copied());
        }
        item_sets
    }
}

//! Grammar types.

use crate::util::{display_fn, Map};
use std::{borrow::Cow, fmt};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TerminalID {
    raw: u16,
}
impl TerminalID {
    /// Reserved symbol used as a terminal symbol that means the end of input.
    pub const EOI: Self = Self::new(0);

    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }
}

#[derive(Debug)]
pub struct Terminal {
    id: TerminalID,
    name: Option<Cow<'static, str>>,
    precedence: Option<Precedence>,
}
impl Terminal {
    pub fn id(&self) -> TerminalID {
        self.id
    }
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
    pub fn precedence(&self) -> Option<Precedence> {
        self.precedence
    }
}
impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            TerminalID::EOI => f.write_str("$eoi"),
            _ => f.write_str(self.name().unwrap_or("<unknown>")),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NonterminalID {
    raw: u16,
}
impl NonterminalID {
    /// Reserved symbol used as the left side of the synthetic accept rule.
    pub const START: Self = Self::new(0);

    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }
}

#[derive(Debug)]
pub struct Nonterminal {
    id: NonterminalID,
    name: Option<Cow<'static, str>>,
}
impl Nonterminal {
    pub fn id(&self) -> NonterminalID {
        self.id
    }
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}
impl fmt::Display for Nonterminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            NonterminalID::START => f.write_str("$start"),
            _ => f.write_str(self.name().unwrap_or("<unknown>")),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RuleID {
    raw: u16,
}
impl RuleID {
    /// The synthetic rule `$start := <start symbol>` whose reduction
    /// signals the acceptance of one sentence.
    pub const ACCEPT: Self = Self::new(0);

    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }
}

/// The type that represents a production rule in the grammar.
#[derive(Debug)]
pub struct Rule {
    id: RuleID,
    left: NonterminalID,
    right: Vec<SymbolID>,
    precedence: Option<Precedence>,
}
impl Rule {
    pub fn id(&self) -> RuleID {
        self.id
    }

    /// Return the left-hand side of this production.
    pub fn left(&self) -> NonterminalID {
        self.left
    }

    /// Return the right-hand side of this production.
    pub fn right(&self) -> &[SymbolID] {
        &self.right[..]
    }

    /// The precedence used when this rule competes in a shift/reduce
    /// conflict: the explicitly attached one, or that of the rightmost
    /// terminal symbol on the right-hand side.
    pub fn precedence<V>(&self, g: &Grammar<V>) -> Option<Precedence> {
        match self.precedence {
            Some(prec) => Some(prec),
            None => {
                for symbol in self.right.iter().rev() {
                    if let SymbolID::T(t) = symbol {
                        return g.terminals[t].precedence();
                    }
                }
                None
            }
        }
    }

    // `"LHS := R1 R2 R3"`
    pub fn display<'g, V>(&'g self, g: &'g Grammar<V>) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            write!(f, "{} := ", g.nonterminals[&self.left()])?;
            for (i, symbol) in self.right().iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                match symbol {
                    SymbolID::T(t) => write!(f, "{}", g.terminals[t])?,
                    SymbolID::N(n) => write!(f, "{}", g.nonterminals[n])?,
                }
            }
            Ok(())
        })
    }
}

/// A precedence level with its associativity.
///
/// Levels are minted in declaration order by [`GrammarDef::precedence`];
/// a higher `priority` binds tighter.
#[derive(Debug, Copy, Clone, PartialEq)]
#[non_exhaustive]
pub struct Precedence {
    pub priority: u16,
    pub assoc: Assoc,
}

impl Precedence {
    pub const fn new(priority: u16, assoc: Assoc) -> Self {
        Self { priority, assoc }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
#[non_exhaustive]
pub enum Assoc {
    Left,
    Right,
    Nonassoc,
}

impl fmt::Display for Assoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
            Self::Nonassoc => write!(f, "nonassoc"),
        }
    }
}

/// The semantic action attached to a production rule, applied to the
/// values of the right-hand side symbols when the rule is reduced.
pub type ActionFn<V> = Box<dyn Fn(Vec<V>) -> V + Send + Sync>;

/// The grammar definition used to derive the parser tables.
///
/// The type parameter `V` is the semantic value produced by the rule
/// actions; the automaton and table layers never inspect it.
pub struct Grammar<V> {
    pub terminals: Map<TerminalID, Terminal>,
    pub nonterminals: Map<NonterminalID, Nonterminal>,
    pub rules: Map<RuleID, Rule>,
    pub start_symbol: NonterminalID,
    actions: Map<RuleID, ActionFn<V>>,
}

impl<V> fmt::Debug for Grammar<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("terminals", &self.terminals)
            .field("nonterminals", &self.nonterminals)
            .field("rules", &self.rules)
            .field("start_symbol", &self.start_symbol)
            .finish_non_exhaustive()
    }
}

impl<V> fmt::Display for Grammar<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## terminals:")?;
        for terminal in self.terminals.values() {
            write!(f, "{}", terminal)?;
            if let Some(prec) = terminal.precedence() {
                write!(f, " (priority={}, assoc={})", prec.priority, prec.assoc)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## nonterminals:")?;
        for nonterminal in self.nonterminals.values() {
            write!(f, "{}", nonterminal)?;
            if nonterminal.id() == self.start_symbol {
                write!(f, " (start)")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## rules:")?;
        for rule in self.rules.values() {
            write!(f, "{}", rule.display(self))?;
            if let Some(prec) = &rule.precedence {
                write!(f, " (priority={}, assoc={})", prec.priority, prec.assoc)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

impl<V> Grammar<V> {
    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarError>
    where
        F: FnOnce(&mut GrammarDef<V>) -> Result<(), GrammarError>,
    {
        let mut def = GrammarDef {
            terminals: Map::default(),
            nonterminals: Map::default(),
            rules: Map::default(),
            actions: Map::default(),
            start: None,
            next_terminal_id: TerminalID::OFFSET,
            next_nonterminal_id: NonterminalID::OFFSET,
            next_rule_id: RuleID::OFFSET,
            next_priority: 0,
        };

        def.terminals.insert(
            TerminalID::EOI,
            Terminal {
                id: TerminalID::EOI,
                name: None,
                precedence: None,
            },
        );

        def.nonterminals.insert(
            NonterminalID::START,
            Nonterminal {
                id: NonterminalID::START,
                name: None,
            },
        );

        f(&mut def)?;

        def.end()
    }

    pub(crate) fn action(&self, rule: RuleID) -> &ActionFn<V> {
        &self.actions[&rule]
    }
}

/// The contextual values for building a [`Grammar`].
pub struct GrammarDef<V> {
    terminals: Map<TerminalID, Terminal>,
    nonterminals: Map<NonterminalID, Nonterminal>,
    rules: Map<RuleID, Rule>,
    actions: Map<RuleID, ActionFn<V>>,
    start: Option<NonterminalID>,
    next_terminal_id: u16,
    next_nonterminal_id: u16,
    next_rule_id: u16,
    next_priority: u16,
}

impl<V> GrammarDef<V> {
    /// Declare a terminal symbol used in this grammar.
    pub fn terminal(
        &mut self,
        name: &str,
        precedence: Option<Precedence>,
    ) -> Result<TerminalID, GrammarError> {
        self.verify_name(name)?;

        let id = TerminalID::new(self.next_terminal_id);
        self.next_terminal_id += 1;

        self.terminals.insert(
            id,
            Terminal {
                id,
                name: Some(name.to_owned().into()),
                precedence,
            },
        );

        Ok(id)
    }

    /// Declare a nonterminal symbol used in this grammar.
    pub fn nonterminal(&mut self, name: &str) -> Result<NonterminalID, GrammarError> {
        self.verify_name(name)?;

        let id = NonterminalID::new(self.next_nonterminal_id);
        self.next_nonterminal_id += 1;

        self.nonterminals.insert(
            id,
            Nonterminal {
                id,
                name: Some(name.to_owned().into()),
            },
        );

        Ok(id)
    }

    /// Mint the next precedence level.
    ///
    /// Levels are ordered by declaration: a level declared later binds
    /// tighter than every earlier one.
    pub fn precedence(&mut self, assoc: Assoc) -> Precedence {
        let prec = Precedence::new(self.next_priority, assoc);
        self.next_priority += 1;
        prec
    }

    /// Specify a production rule of this grammar together with its
    /// semantic action.
    pub fn rule<I, F>(
        &mut self,
        left: NonterminalID,
        right: I,
        precedence: Option<Precedence>,
        action: F,
    ) -> Result<RuleID, GrammarError>
    where
        I: IntoIterator<Item = SymbolID>,
        F: Fn(Vec<V>) -> V + Send + Sync + 'static,
    {
        let right_: Vec<_> = right.into_iter().collect();
        if right_.contains(&SymbolID::T(TerminalID::EOI)) {
            return Err(GrammarError::ReservedTerminal);
        }
        for rule in self.rules.values() {
            if rule.left == left && rule.right == right_ {
                return Err(GrammarError::DuplicateRule);
            }
        }

        let id = RuleID::new(self.next_rule_id);
        self.next_rule_id += 1;
        self.rules.insert(
            id,
            Rule {
                id,
                left,
                right: right_,
                precedence,
            },
        );
        self.actions.insert(id, Box::new(action));

        Ok(id)
    }

    /// Specify the start symbol for this grammar.
    pub fn start_symbol(&mut self, symbol: NonterminalID) -> Result<(), GrammarError> {
        self.start.replace(symbol);
        Ok(())
    }

    fn verify_name(&self, name: &str) -> Result<(), GrammarError> {
        if !verify_ident(name) {
            return Err(GrammarError::InvalidIdent {
                name: name.to_owned(),
            });
        }

        // terminals and nonterminals share one name space
        let taken = self
            .terminals
            .values()
            .any(|t| matches!(t.name(), Some(n) if n == name))
            || self
                .nonterminals
                .values()
                .any(|n| matches!(n.name(), Some(n) if n == name));
        if taken {
            return Err(GrammarError::DuplicateSymbol {
                name: name.to_owned(),
            });
        }

        Ok(())
    }

    fn end(mut self) -> Result<Grammar<V>, GrammarError> {
        // if not specified, the start symbol defaults to the first
        // registered nonterminal
        let start = match self.start.take() {
            Some(start) => start,
            None => self
                .nonterminals
                .keys()
                .find(|id| **id != NonterminalID::START)
                .copied()
                .ok_or(GrammarError::EmptyGrammar)?,
        };

        // every nonterminal referenced on some right-hand side must have
        // at least one production of its own
        for rule in self.rules.values() {
            for symbol in rule.right() {
                let n = match symbol {
                    SymbolID::N(n) => *n,
                    SymbolID::T(..) => continue,
                };
                if !self.rules.values().any(|r| r.left == n) {
                    return Err(GrammarError::UndefinedNonterminal {
                        name: self.nonterminals[&n]
                            .name()
                            .unwrap_or("<unknown>")
                            .to_owned(),
                    });
                }
            }
        }

        self.rules.insert(
            RuleID::ACCEPT,
            Rule {
                id: RuleID::ACCEPT,
                left: NonterminalID::START,
                right: vec![SymbolID::N(start)],
                precedence: None,
            },
        );

        Ok(Grammar {
            terminals: self.terminals,
            nonterminals: self.nonterminals,
            rules: self.rules,
            start_symbol: start,
            actions: self.actions,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("invalid symbol name `{name}'")]
    InvalidIdent { name: String },

    #[error("the name `{name}' is already used by another symbol")]
    DuplicateSymbol { name: String },

    #[error("duplicate production rule detected")]
    DuplicateRule,

    #[error("the end-of-input terminal cannot appear in a production")]
    ReservedTerminal,

    #[error("the nonterminal `{name}' is referenced but has no production")]
    UndefinedNonterminal { name: String },

    #[error("the grammar does not define any nonterminal symbol")]
    EmptyGrammar,
}

fn verify_ident(s: &str) -> bool {
    if s.is_empty() {
        // The identifier must not be empty.
        return false;
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        // A number must not be an identifier.
        return false;
    }

    let mut chars = s.chars();
    let first = chars.next().unwrap();
    if !is_ident_start(first) {
        // The identifier must be started with XID-Start.
        return false;
    }
    if chars.any(|ch| !is_ident_continue(ch)) {
        // The identifier must be continued with XID-Continue.
        return false;
    }

    true
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || unicode_ident::is_xid_start(ch)
}

fn is_ident_continue(ch: char) -> bool {
    unicode_ident::is_xid_continue(ch)
}

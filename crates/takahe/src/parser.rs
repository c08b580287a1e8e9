//! The push-based LR(1) parser engine.

use crate::{
    grammar::{Grammar, TerminalID},
    lr1::NodeID,
    parse_table::{Action, ParseTable},
};
use std::fmt;

/// A token produced by the external lexer.
///
/// `terminal` must be one of the terminals registered with the grammar;
/// the end of input is signalled through [`Parser::feed_eoi`] (or a token
/// whose terminal is [`TerminalID::EOI`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Token<V> {
    pub terminal: TerminalID,
    pub value: V,
}

impl<V> Token<V> {
    pub fn new(terminal: TerminalID, value: V) -> Self {
        Self { terminal, value }
    }
}

/// The outcome of feeding a single token into the engine.
#[derive(Debug)]
pub enum StepOutcome<V> {
    /// The token was consumed; more input is needed.
    Continue,

    /// One sentence has been reduced completely. The engine has already
    /// reset its stacks and is ready for the next sentence.
    Accept(V),
}

/// The parser engine driving the compiled tables.
///
/// The engine owns the two run-time stacks (states and semantic values);
/// the grammar and table are borrowed read-only, so any number of engines
/// may share them.
#[derive(Debug)]
pub struct Parser<'g, V> {
    grammar: &'g Grammar<V>,
    table: &'g ParseTable,
    state_stack: Vec<NodeID>,
    value_stack: Vec<V>,
}

impl<'g, V> Parser<'g, V>
where
    V: fmt::Debug,
{
    /// Create a parser engine over the specified grammar and its compiled
    /// table.
    pub fn new(grammar: &'g Grammar<V>, table: &'g ParseTable) -> Self {
        Self {
            grammar,
            table,
            state_stack: vec![table.initial_state()],
            value_stack: vec![],
        }
    }

    /// Feed one token into the engine.
    ///
    /// All pending reductions against this lookahead are performed before
    /// the token itself is shifted; a shift consumes exactly one token,
    /// so control returns to the caller for the next one.
    pub fn feed(&mut self, token: Token<V>) -> Result<StepOutcome<V>, ParseError<V>> {
        if token.terminal == TerminalID::EOI {
            return self.step(None);
        }
        self.step(Some(token))
    }

    /// Signal the logical end of input, driving the final reductions up
    /// to the accept of the synthetic start rule.
    pub fn feed_eoi(&mut self) -> Result<StepOutcome<V>, ParseError<V>> {
        self.step(None)
    }

    fn step(&mut self, mut lookahead: Option<Token<V>>) -> Result<StepOutcome<V>, ParseError<V>> {
        loop {
            let current = *self
                .state_stack
                .last()
                .ok_or(ParseError::EmptyStateStack)?;
            let terminal = lookahead
                .as_ref()
                .map_or(TerminalID::EOI, |token| token.terminal);

            let Some(action) = self.table.action(current, terminal) else {
                let expected = self.table.expected_terminals(current);
                return Err(match lookahead {
                    Some(token) => ParseError::UnexpectedToken { token, expected },
                    None => ParseError::UnexpectedEoi { expected },
                });
            };

            match action {
                Action::Shift(next) => {
                    let token = lookahead.take().expect("the EOI token is never shifted");
                    self.state_stack.push(next);
                    self.value_stack.push(token.value);
                    return Ok(StepOutcome::Continue);
                }

                Action::Reduce(rule_id) => {
                    let rule = &self.grammar.rules[&rule_id];
                    let n = rule.right().len();
                    if self.value_stack.len() < n || self.state_stack.len() <= n {
                        return Err(ParseError::EmptyValueStack);
                    }

                    self.state_stack.truncate(self.state_stack.len() - n);
                    let args = self.value_stack.split_off(self.value_stack.len() - n);
                    let value = (self.grammar.action(rule_id))(args);

                    let current = *self
                        .state_stack
                        .last()
                        .ok_or(ParseError::EmptyStateStack)?;
                    let next = self
                        .table
                        .goto(current, rule.left())
                        .ok_or(ParseError::MissingGoto)?;
                    self.state_stack.push(next);
                    self.value_stack.push(value);

                    // re-examine the same lookahead without returning to
                    // the caller
                }

                Action::Accept => {
                    let value = self.value_stack.pop().ok_or(ParseError::EmptyValueStack)?;
                    self.reset();
                    return Ok(StepOutcome::Accept(value));
                }
            }
        }
    }

    /// Discard any partially parsed sentence and return the engine to its
    /// initial state.
    pub fn reset(&mut self) {
        self.state_stack.clear();
        self.state_stack.push(self.table.initial_state());
        self.value_stack.clear();
    }

    /// Drive a whole token sequence through the engine and return the
    /// value of the sentence it forms.
    ///
    /// The sequence must not contain the end-of-input sentinel; it is
    /// appended automatically.
    pub fn parse<I>(&mut self, tokens: I) -> Result<V, ParseError<V>>
    where
        I: IntoIterator<Item = Token<V>>,
    {
        for token in tokens {
            if let StepOutcome::Accept(value) = self.feed(token)? {
                return Ok(value);
            }
        }
        match self.feed_eoi()? {
            StepOutcome::Accept(value) => Ok(value),
            StepOutcome::Continue => unreachable!("EOI either accepts or fails"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError<V: fmt::Debug> {
    /// The token cannot be accepted in the current state. `expected`
    /// holds every terminal that has a valid action there.
    #[error("unexpected token, expecting one of {expected:?}")]
    UnexpectedToken {
        token: Token<V>,
        expected: Vec<TerminalID>,
    },

    /// The input ended although the current state expects more of it.
    #[error("unexpected end of input, expecting one of {expected:?}")]
    UnexpectedEoi { expected: Vec<TerminalID> },

    #[error("empty value stack")]
    EmptyValueStack,

    #[error("empty state stack")]
    EmptyStateStack,

    #[error("missing goto entry after reduce")]
    MissingGoto,
}

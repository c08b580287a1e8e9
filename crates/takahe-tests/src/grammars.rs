//! Grammar definitions for integration tests.
//!
//! Every grammar computes `i64` semantic values so that the tests can
//! observe which reductions actually happened.

use takahe::grammar::{Assoc, GrammarDef, GrammarError, SymbolID::*};

/// `E := E + E | E - E | E * E | NUM`, with `*` binding tighter than the
/// additive operators and everything left-associative.
pub fn g_arith(g: &mut GrammarDef<i64>) -> Result<(), GrammarError> {
    let p_add = g.precedence(Assoc::Left);
    let p_mul = g.precedence(Assoc::Left);

    let plus = g.terminal("PLUS", Some(p_add))?;
    let minus = g.terminal("MINUS", Some(p_add))?;
    let star = g.terminal("STAR", Some(p_mul))?;
    let num = g.terminal("NUM", None)?;

    let e = g.nonterminal("E")?;
    g.start_symbol(e)?;

    g.rule(e, [N(e), T(plus), N(e)], None, |args| args[0] + args[2])?;
    g.rule(e, [N(e), T(minus), N(e)], None, |args| args[0] - args[2])?;
    g.rule(e, [N(e), T(star), N(e)], None, |args| args[0] * args[2])?;
    g.rule(e, [T(num)], None, |mut args| args.remove(0))?;

    Ok(())
}

/// The layered arithmetic grammar; unambiguous without any precedence
/// declaration.
pub fn g_calc(g: &mut GrammarDef<i64>) -> Result<(), GrammarError> {
    let lparen = g.terminal("LPAREN", None)?;
    let rparen = g.terminal("RPAREN", None)?;
    let plus = g.terminal("PLUS", None)?;
    let minus = g.terminal("MINUS", None)?;
    let star = g.terminal("STAR", None)?;
    let slash = g.terminal("SLASH", None)?;
    let num = g.terminal("NUM", None)?;

    let expr = g.nonterminal("EXPR")?;
    let term = g.nonterminal("TERM")?;
    let factor = g.nonterminal("FACTOR")?;

    g.start_symbol(expr)?;

    g.rule(expr, [N(expr), T(plus), N(term)], None, |args| {
        args[0] + args[2]
    })?;
    g.rule(expr, [N(expr), T(minus), N(term)], None, |args| {
        args[0] - args[2]
    })?;
    g.rule(expr, [N(term)], None, |mut args| args.remove(0))?;

    g.rule(term, [N(term), T(star), N(factor)], None, |args| {
        args[0] * args[2]
    })?;
    g.rule(term, [N(term), T(slash), N(factor)], None, |args| {
        args[0] / args[2]
    })?;
    g.rule(term, [N(factor)], None, |mut args| args.remove(0))?;

    g.rule(factor, [T(num)], None, |mut args| args.remove(0))?;
    g.rule(factor, [T(lparen), N(expr), T(rparen)], None, |args| args[1])?;

    Ok(())
}

/// The dangling-else grammar, deliberately left without precedence
/// declarations. The semantic values encode the tree shape:
/// `EXPR` is 7, `IF s` is `100 + s`, `IF s ELSE s'` is `10 * s + s'`.
pub fn g_dangling_else(g: &mut GrammarDef<i64>) -> Result<(), GrammarError> {
    let t_if = g.terminal("IF", None)?;
    let t_else = g.terminal("ELSE", None)?;
    let t_expr = g.terminal("EXPR", None)?;

    let s = g.nonterminal("STMT")?;
    g.start_symbol(s)?;

    g.rule(s, [T(t_if), N(s)], None, |args| 100 + args[1])?;
    g.rule(s, [T(t_if), N(s), T(t_else), N(s)], None, |args| {
        10 * args[1] + args[3]
    })?;
    g.rule(s, [T(t_expr)], None, |_| 7)?;

    Ok(())
}

/// `E := E == E | NUM` with a nonassociative comparison operator:
/// chaining two comparisons is a syntax error.
pub fn g_nonassoc_cmp(g: &mut GrammarDef<i64>) -> Result<(), GrammarError> {
    let p_eq = g.precedence(Assoc::Nonassoc);
    let eq = g.terminal("EQUAL", Some(p_eq))?;
    let num = g.terminal("NUM", None)?;

    let e = g.nonterminal("E")?;
    g.start_symbol(e)?;

    g.rule(e, [N(e), T(eq), N(e)], None, |args| {
        (args[0] == args[2]) as i64
    })?;
    g.rule(e, [T(num)], None, |mut args| args.remove(0))?;

    Ok(())
}

/// `L := ε | L X`; the value counts the elements.
pub fn g_list(g: &mut GrammarDef<i64>) -> Result<(), GrammarError> {
    let x = g.terminal("X", None)?;

    let l = g.nonterminal("L")?;
    g.start_symbol(l)?;

    g.rule(l, [], None, |_| 0)?;
    g.rule(l, [N(l), T(x)], None, |args| args[0] + 1)?;

    Ok(())
}

/// A grammar whose nonterminal `Z` is defined but never reachable from
/// the start symbol.
pub fn g_unreachable(g: &mut GrammarDef<i64>) -> Result<(), GrammarError> {
    let num = g.terminal("NUM", None)?;

    let e = g.nonterminal("E")?;
    let z = g.nonterminal("Z")?;
    g.start_symbol(e)?;

    g.rule(e, [T(num)], None, |mut args| args.remove(0))?;
    g.rule(z, [T(num)], None, |mut args| args.remove(0))?;

    Ok(())
}

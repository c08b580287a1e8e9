use takahe::{
    grammar::{Grammar, GrammarDef, GrammarError},
    lr1::DFA,
    parse_table::ParseTable,
};
use takahe_tests::grammars;

fn smoketest(f: impl FnOnce(&mut GrammarDef<i64>) -> Result<(), GrammarError>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let grammar = Grammar::define(f).unwrap();
    eprintln!("grammar:\n{}", grammar);

    let dfa = DFA::generate(&grammar);
    eprintln!("DFA nodes:\n---\n{}", dfa.display(&grammar));

    let table = ParseTable::generate(&grammar, &dfa);
    eprintln!("parse table:\n---\n{}", table.display(&grammar));
}

#[test]
fn smoketest_arith() {
    smoketest(grammars::g_arith);
}

#[test]
fn smoketest_calc() {
    smoketest(grammars::g_calc);
}

#[test]
fn smoketest_dangling_else() {
    smoketest(grammars::g_dangling_else);
}

#[test]
fn smoketest_nonassoc_cmp() {
    smoketest(grammars::g_nonassoc_cmp);
}

#[test]
fn smoketest_list() {
    smoketest(grammars::g_list);
}

#[test]
fn smoketest_unreachable() {
    smoketest(grammars::g_unreachable);
}

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use takahe::{
    grammar::{Grammar, GrammarDef, GrammarError},
    lr1::DFA,
    parse_table::ParseTable,
};
use takahe_tests::grammars;

criterion_main!(benches);
criterion_group!(benches, bench_arith, bench_calc, bench_dangling_else);

fn bench_arith(c: &mut Criterion) {
    bench_table_gen(c, "arith", grammars::g_arith);
}

fn bench_calc(c: &mut Criterion) {
    bench_table_gen(c, "calc", grammars::g_calc);
}

fn bench_dangling_else(c: &mut Criterion) {
    bench_table_gen(c, "dangling_else", grammars::g_dangling_else);
}

fn bench_table_gen(
    c: &mut Criterion,
    name: &str,
    f: impl FnOnce(&mut GrammarDef<i64>) -> Result<(), GrammarError>,
) {
    let grammar = Grammar::define(f).unwrap();
    c.bench_function(name, |b| {
        b.iter(|| {
            let dfa = DFA::generate(&grammar);
            let _table = black_box(ParseTable::generate(&grammar, &dfa));
        });
    });
}

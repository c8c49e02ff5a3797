use criterion::{criterion_group, criterion_main, Criterion};
use ratlog::Session;

macro_rules! sanity_check {
    ($output:expr, $needle:expr) => {{
        let out = $output;
        assert!(out.contains($needle), "unexpected outcome: {}", out);
        out.len()
    }};
}

fn prepare_peano() -> Session {
    let mut session = Session::new();
    session
        .load_str(
            r"
nat(z).
nat(s(X)) :- nat(X).
add(X, z, X) :- nat(X).
add(X, s(Y), s(Z)) :- add(X, Y, Z).
",
        )
        .unwrap();
    session
}

fn add(session: &mut Session) -> usize {
    let out = session
        .run_query_str("add(s(s(s(s(s(z))))), s(s(s(s(s(z))))), X).")
        .unwrap();
    sanity_check!(out, "yes(s(s(s(s(s(s(s(s(s(s(z)))))))))))")
}

fn add_reverse(session: &mut Session) -> usize {
    let out = session
        .run_query_str("add(X, Y, s(s(s(s(s(s(z))))))).")
        .unwrap();
    sanity_check!(out, "yes(")
}

fn prepare_dif() -> Session {
    let mut session = Session::new();
    session
        .load_str(
            r"
eq(X, X).
color(red).
color(green).
color(blue).
pick(A, B, C) :- color(A), color(B), color(C),
    dif(A, B), dif(B, C), dif(A, C).
",
        )
        .unwrap();
    session
}

fn three_colors(session: &mut Session) -> usize {
    let out = session.run_query_str("pick(red, X, Y).").unwrap();
    sanity_check!(out, "yes(")
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut peano = prepare_peano();
    let mut dif = prepare_dif();

    c.bench_function("add", |b| b.iter(|| add(&mut peano)));
    c.bench_function("add reverse", |b| b.iter(|| add_reverse(&mut peano)));
    c.bench_function("three colors", |b| b.iter(|| three_colors(&mut dif)));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

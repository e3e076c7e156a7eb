use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use contxt_core::{Dialect, Document, DomTree, FormatContext, Formatter, formatter_for, preprocess_html, render};

const ARTICLE_URL: &str = "https://blog.example.com/posts/ownership";

fn bench_parse(c: &mut Criterion) {
    let small = std::fs::read_to_string("../../tests/fixtures/article.html").unwrap();
    let large = std::fs::read_to_string("../../tests/fixtures/deeply_nested.html").unwrap();

    let mut group = c.benchmark_group("parse");

    group.bench_with_input(BenchmarkId::new("document", "article"), &small, |b, html| {
        b.iter(|| Document::parse(black_box(html)))
    });

    group.bench_with_input(BenchmarkId::new("arena", "article"), &small, |b, html| {
        b.iter(|| DomTree::parse(black_box(html)))
    });

    group.bench_with_input(BenchmarkId::new("arena", "deeply_nested"), &large, |b, html| {
        b.iter(|| DomTree::parse(black_box(html)))
    });

    group.finish();
}

fn bench_preprocess(c: &mut Criterion) {
    let html = std::fs::read_to_string("../../tests/fixtures/article.html").unwrap();
    let config = Default::default();

    c.bench_function("preprocess", |b| b.iter(|| preprocess_html(black_box(&html), &config)));
}

fn bench_dialects(c: &mut Criterion) {
    let html = std::fs::read_to_string("../../tests/fixtures/article.html").unwrap();

    let mut group = c.benchmark_group("render");

    for dialect in Dialect::ALL {
        let cx = FormatContext::new(dialect);
        group.bench_with_input(BenchmarkId::new("article", dialect), &html, |b, html| {
            b.iter(|| render(black_box(html), Some(ARTICLE_URL), &cx))
        });
    }

    group.finish();
}

fn bench_deep_nesting(c: &mut Criterion) {
    let depth = 5_000;
    let html = format!("<main>{}{}</main>", "<div><p>Text</p>".repeat(depth), "</div>".repeat(depth));
    let tree = DomTree::parse(&html);
    let root = tree.main_content();

    let mut group = c.benchmark_group("deep_nesting");

    for dialect in Dialect::ALL {
        let cx = FormatContext::new(dialect);
        group.bench_with_input(BenchmarkId::new("convert", dialect), &tree, |b, tree| {
            b.iter(|| formatter_for(&cx).body(black_box(tree), root))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_preprocess, bench_dialects, bench_deep_nesting);
criterion_main!(benches);

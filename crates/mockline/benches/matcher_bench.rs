use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mockline::predicate::{PatternCompiler, RegexCache};
use mockline::{MatchIndex, MatchRequest, StubRule, UrlMatchType};
use std::sync::Arc;

fn equals_rules(count: usize) -> Vec<StubRule> {
    (0..count)
        .map(|i| {
            StubRule::new(format!("rule-{i}"), "GET", format!("/api/v1/endpoint{i}"))
                .with_key(format!("rule-{i}"))
        })
        .collect()
}

fn regex_rules(count: usize) -> Vec<StubRule> {
    (0..count)
        .map(|i| {
            StubRule::new(format!("rule-{i}"), "GET", format!(r"/api/v\d+/endpoint{i}"))
                .with_match_type(UrlMatchType::Regex)
                .with_key(format!("rule-{i}"))
        })
        .collect()
}

fn template_rules(count: usize) -> Vec<StubRule> {
    (0..count)
        .map(|i| {
            StubRule::new(
                format!("rule-{i}"),
                "ANY",
                format!("/tenants/{{tenant}}/resource{i}/{{id}}"),
            )
            .with_match_type(UrlMatchType::PathTemplate)
            .with_key(format!("rule-{i}"))
        })
        .collect()
}

fn build_index(rules: &[StubRule]) -> MatchIndex {
    let index = MatchIndex::new(PatternCompiler::new(Arc::new(RegexCache::new())));
    index.reload(rules);
    index
}

fn bench_equals_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("equals_lookup");

    for rule_count in [10, 100, 1000].iter() {
        let index = build_index(&equals_rules(*rule_count));
        let first = MatchRequest::new("GET", "/api/v1/endpoint0");
        let last = MatchRequest::new("GET", &format!("/api/v1/endpoint{}", rule_count - 1));
        let none = MatchRequest::new("GET", "/not/found");

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("first", rule_count), rule_count, |b, _| {
            b.iter(|| index.lookup(black_box(&first)));
        });
        group.bench_with_input(BenchmarkId::new("last", rule_count), rule_count, |b, _| {
            b.iter(|| index.lookup(black_box(&last)));
        });
        group.bench_with_input(BenchmarkId::new("none", rule_count), rule_count, |b, _| {
            b.iter(|| index.lookup(black_box(&none)));
        });
    }

    group.finish();
}

fn bench_regex_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("regex_lookup");

    for rule_count in [10, 100].iter() {
        let index = build_index(&regex_rules(*rule_count));
        let request = MatchRequest::new("GET", "/api/v2/endpoint5");

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("regex_match", rule_count),
            rule_count,
            |b, _| {
                b.iter(|| index.lookup(black_box(&request)));
            },
        );
    }

    group.finish();
}

fn bench_template_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_template_lookup");

    for rule_count in [10, 100].iter() {
        let index = build_index(&template_rules(*rule_count));
        let request = MatchRequest::new("DELETE", "/tenants/acme/resource7/42");

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("wildcard_method", rule_count),
            rule_count,
            |b, _| {
                b.iter(|| index.lookup(black_box(&request)));
            },
        );
    }

    group.finish();
}

fn bench_body_predicates(c: &mut Criterion) {
    let mut group = c.benchmark_group("body_predicates");

    let rules = vec![
        StubRule::new("json", "POST", "/orders")
            .with_key("json")
            .with_body(r#"{"equalToJson": {"status": "open", "items": [1, 2, 3]}}"#),
        StubRule::new("path", "POST", "/orders/filter")
            .with_key("path")
            .with_body(r#"{"matchesJsonPath": "$.items[?@.price > 10]"}"#),
        StubRule::new("regex", "POST", "/logs")
            .with_key("regex")
            .with_body(r#"{"matches": "ERROR.*timeout"}"#),
    ];
    let index = build_index(&rules);

    let cases = [
        (
            "equal_to_json",
            MatchRequest::new("POST", "/orders")
                .with_body(r#"{"items": [3, 2, 1], "status": "open", "extra": true}"#),
        ),
        (
            "json_path",
            MatchRequest::new("POST", "/orders/filter")
                .with_body(r#"{"items": [{"price": 5}, {"price": 25}]}"#),
        ),
        (
            "regex",
            MatchRequest::new("POST", "/logs").with_body("ERROR upstream timeout"),
        ),
    ];

    group.throughput(Throughput::Elements(1));
    for (name, request) in cases.iter() {
        group.bench_function(*name, |b| {
            b.iter(|| index.lookup(black_box(request)));
        });
    }

    group.finish();
}

fn bench_regex_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("regex_cache");

    let cache = RegexCache::new();
    let _ = cache.get_full_match(r"/api/v\d+/users/[0-9]+");

    group.throughput(Throughput::Elements(1));
    group.bench_function("hit", |b| {
        b.iter(|| cache.get_full_match(black_box(r"/api/v\d+/users/[0-9]+")));
    });
    group.bench_function("compile_uncached", |b| {
        b.iter(|| RegexCache::new().get_full_match(black_box(r"/api/v\d+/users/[0-9]+")));
    });

    group.finish();
}

fn bench_reload(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_reload");

    for rule_count in [100, 1000].iter() {
        let rules = equals_rules(*rule_count);
        let index = build_index(&rules);

        group.throughput(Throughput::Elements(*rule_count as u64));
        group.bench_with_input(
            BenchmarkId::new("reload", rule_count),
            rule_count,
            |b, _| {
                b.iter(|| index.reload(black_box(&rules)));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_equals_lookup,
    bench_regex_lookup,
    bench_template_lookup,
    bench_body_predicates,
    bench_regex_cache,
    bench_reload
);
criterion_main!(benches);

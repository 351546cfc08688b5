use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pangpt::completion::CompletionResult;
use pangpt::prompt::{build, EndpointKind, LogEvent};
use pangpt::slack::format_reply;

fn sample_event() -> LogEvent {
    [
        ("name", "fw1"),
        ("sni", "example.com"),
        ("commonname", "cn1"),
        ("root", "root1"),
        ("rootstatus", "ok"),
        ("details", "cert expired"),
        ("sourceip", "10.0.0.1"),
        ("sourceuser", "alice"),
        ("destinationip", "93.184.216.34"),
        ("application", "ssl"),
    ]
    .into_iter()
    .collect()
}

fn bench_scenarios(c: &mut Criterion) {
    let event = sample_event();
    let reply = CompletionResult {
        text: "- name: fw1\n  sni: example.com\nRecommendation: renew certificate.".into(),
    };

    c.bench_function("build_decryption_prompt", |b| {
        b.iter(|| build(black_box(EndpointKind::Decryption), black_box(&event)))
    });
    c.bench_function("build_globalprotect_prompt", |b| {
        b.iter(|| build(black_box(EndpointKind::GlobalProtect), black_box(&event)))
    });
    c.bench_function("format_decryption_reply", |b| {
        b.iter(|| format_reply(black_box(EndpointKind::Decryption), black_box(&reply)))
    });
}

criterion_group!(benches, bench_scenarios);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use synthgraph::{build_graph, merge_layers, Environment, ParseOptions};

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("build_graph(fm pair)", |b| {
        let options = ParseOptions::default();
        let def = json!({
            "id": "carrier",
            "type": "sinOsc",
            "freq": { "type": "sinOsc", "rate": "kr", "freq": 2, "mul": 110, "add": 440 },
            "mul": 0.25
        });

        b.iter(|| build_graph(black_box(def.clone()), &options))
    });

    c.bench_function("build_graph(64 voices)", |b| {
        let options = ParseOptions::default();
        let voices: Vec<_> = (0..64).map(|i| json!({ "type": "sinOsc", "freq": 110 + i * 10 })).collect();
        let def = json!(voices);

        b.iter(|| build_graph(black_box(def.clone()), &options))
    });

    c.bench_function("merge_layers(options)", |b| {
        let defaults = json!({ "interpolation": "linear", "audioSettings": { "rates": { "audio": 44100, "control": 64 } } });
        let options = json!({ "interpolation": "cubic", "audioSettings": { "rates": { "audio": 48000 } } });
        let (defaults, options) = (defaults.as_object().cloned().unwrap_or_default(), options.as_object().cloned().unwrap_or_default());

        b.iter(|| merge_layers([black_box(&defaults), black_box(&options)]))
    });

    c.bench_function("Graph::gen(synth)", |b| {
        let env = Environment::default();
        let mut synth = env
            .synth(json!({ "type": "sinOsc", "freq": { "type": "sinOsc", "freq": 3, "mul": 20, "add": 440 } }))
            .unwrap();

        b.iter(|| {
            env.clear_buses();
            synth.gen();
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

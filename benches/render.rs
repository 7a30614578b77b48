// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use drumsampler::config::SamplerConfig;
use drumsampler::sampler::{PlayMode, Sampler, NUM_VOICES};
use std::time::Duration;

fn generate_test_audio(duration_seconds: f32, sample_rate: u32) -> Vec<f32> {
    let num_samples = (duration_seconds * sample_rate as f32) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            // Decaying noise-ish hit
            let envelope = (-t * 8.0).exp();
            envelope
                * (0.5 * (2.0 * std::f32::consts::PI * 180.0 * t).sin()
                    + 0.3 * (2.0 * std::f32::consts::PI * 3100.0 * t).sin())
        })
        .collect()
}

fn benchmark_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");

    for voices in [1, 8, NUM_VOICES] {
        for block_size in [64, 256, 1024] {
            let config = SamplerConfig::default()
                .with_sample_rate(48000)
                .with_block_size(block_size);
            let (handle, mut engine) = Sampler::build(&config).unwrap();
            handle
                .publish_frames("hit", generate_test_audio(2.0, 44100), 44100)
                .unwrap();
            for index in 0..voices {
                let voice = handle.voice(index).unwrap();
                voice.set_mode(PlayMode::ForwardLoop);
                voice.speed.set(0.5 + index as f32 * 0.1);
                handle.trigger(index).unwrap();
            }

            let mut out = vec![0.0f32; block_size];
            group.bench_with_input(
                BenchmarkId::new(format!("{}_voices", voices), block_size),
                &block_size,
                |b, _| {
                    b.iter(|| {
                        out.fill(0.0);
                        engine.render(black_box(&mut out));
                        black_box(out[0])
                    })
                },
            );
        }
    }

    group.finish();
}

fn benchmark_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");
    group.measurement_time(Duration::from_secs(5));

    let (handle, _engine) = Sampler::build(&SamplerConfig::default()).unwrap();
    let audio = generate_test_audio(1.0, 44100);
    group.bench_function("1s_sample", |b| {
        b.iter(|| {
            handle
                .publish_frames("hit", black_box(audio.clone()), 44100)
                .unwrap();
            handle.collect()
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_render, benchmark_publish);
criterion_main!(benches);

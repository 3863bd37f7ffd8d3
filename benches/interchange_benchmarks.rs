use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rtsynth::config::RuntimeSettings;
use rtsynth::effects::{EffectKind, EffectMgr};
use rtsynth::instance::signals::InstanceSignals;
use rtsynth::interchange::limits::limits_for;
use rtsynth::messaging::controls::{midi, part, section};
use rtsynth::midi::event::MidiEvent;
use rtsynth::{CommandBlock, Config, Interchange, Shared, SynthEngine, create_command_channel};
use std::sync::Arc;

const SAMPLE_RATE: f32 = 48000.0;
const BUFFER_SIZE: usize = 256;

fn setup() -> (Interchange, rtsynth::Endpoints) {
    let config = Config::default();
    let shared = Shared::new(
        Arc::new(InstanceSignals::new()),
        Arc::new(RuntimeSettings::from_config(&config)),
    );
    let engine = SynthEngine::new(0, SAMPLE_RATE, BUFFER_SIZE, 512);
    Interchange::new(engine, &config, shared)
}

/// Serialized path through one byte ring
fn bench_ring_roundtrip(c: &mut Criterion) {
    let (mut tx, mut rx) = create_command_channel(1024);
    let block = CommandBlock::write(part::VOLUME, 3, 100.0);

    c.bench_function("ring_send_recv", |b| {
        b.iter(|| {
            tx.try_send(black_box(&block)).unwrap();
            black_box(rx.try_recv());
        });
    });
}

/// Range lookup, done on both sides of every write
fn bench_limits_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("limits_for");
    let blocks = [
        ("part_volume", CommandBlock::write(part::VOLUME, 0, 90.0)),
        ("midi_note", CommandBlock::write(midi::NOTE_ON, section::MIDI_IN, 100.0)),
        (
            "effect_par",
            CommandBlock::write(2, section::SYSTEM_EFFECTS, 40.0)
                .with_kit(0x81)
                .with_engine(0),
        ),
    ];
    for (name, block) in blocks {
        group.bench_with_input(BenchmarkId::from_parameter(name), &block, |b, block| {
            b.iter(|| black_box(limits_for(black_box(block))));
        });
    }
    group.finish();
}

/// Draining a full budget of writes in one callback
fn bench_mediate(c: &mut Criterion) {
    let mut group = c.benchmark_group("mediate");
    for count in [1usize, 16, 128] {
        let (mut interchange, mut ends) = setup();
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                for n in 0..count {
                    let value = (n % 128) as f32;
                    ends.gui.send(CommandBlock::write(part::PANNING, 0, value)).unwrap();
                }
                black_box(interchange.mediate());
                while ends.gui.try_reply().is_some() {}
            });
        });
    }
    group.finish();
}

/// A render cycle with MIDI notes playing
fn bench_render_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_cycle");
    for notes in [0u8, 4, 16] {
        let (mut interchange, mut ends) = setup();
        for n in 0..notes {
            let event = MidiEvent::NoteOn {
                channel: 0,
                note: 48 + n,
                velocity: 100,
            };
            ends.midi.try_send(&event.to_command()).unwrap();
        }
        let mut left = vec![0.0f32; BUFFER_SIZE];
        let mut right = vec![0.0f32; BUFFER_SIZE];
        group.bench_with_input(BenchmarkId::from_parameter(notes), &notes, |b, _| {
            b.iter(|| {
                interchange.render_cycle(&mut left, &mut right);
                black_box(left[0]);
            });
        });
    }
    group.finish();
}

/// Each effect type on a system slot
fn bench_effects(c: &mut Criterion) {
    let mut group = c.benchmark_group("effect");
    for kind in EffectKind::ALL {
        let mut mgr = EffectMgr::new(false, SAMPLE_RATE, BUFFER_SIZE);
        mgr.change_effect(kind.index());
        let input: Vec<f32> = (0..BUFFER_SIZE).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let mut left = input.clone();
        let mut right = input.clone();
        group.bench_function(BenchmarkId::from_parameter(kind.name()), |b| {
            b.iter(|| {
                left.copy_from_slice(&input);
                right.copy_from_slice(&input);
                mgr.out(&mut left, &mut right);
                black_box(left[BUFFER_SIZE - 1]);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_ring_roundtrip,
    bench_limits_lookup,
    bench_mediate,
    bench_render_cycle,
    bench_effects
);
criterion_main!(benches);

// Property tests: every stored value stays inside its control's limits

mod common;

use common::{engine, interchange};
use proptest::prelude::*;
use rtsynth::interchange::limits::limits_for;
use rtsynth::messaging::command::kind;
use rtsynth::messaging::controls::{
    add_synth, add_voice, config, effect, engine as eng, envelope, filter, insert, insert_type,
    kit, lfo, main, oscillator, part, section, sys_ins,
};
use rtsynth::{CommandBlock, Endpoints, Interchange};

/// One write per parameter group, value filled in by the test
fn targets() -> Vec<CommandBlock> {
    let add = |control: u8| CommandBlock::write(control, 1, 0.0).with_kit(0).with_engine(eng::ADD_SYNTH);
    let voice = |control: u8| {
        CommandBlock::write(control, 1, 0.0)
            .with_kit(0)
            .with_engine(eng::ADD_VOICE_1 + 1)
    };
    let echo = |control: u8| {
        CommandBlock::write(control, section::INSERT_EFFECTS, 0.0)
            .with_kit(effect::ECHO)
            .with_engine(0)
    };

    let mut blocks = vec![
        CommandBlock::write(part::VOLUME, 0, 0.0),
        CommandBlock::write(part::PANNING, 3, 0.0),
        CommandBlock::write(part::KEY_SHIFT, 1, 0.0),
        CommandBlock::write(part::VELOCITY_SENSE, 63, 0.0),
        CommandBlock::write(part::HUMANISE, 5, 0.0),
        CommandBlock::write(part::PITCH_WHEEL_RANGE, 2, 0.0),
        CommandBlock::write(part::VOLUME_RANGE, 2, 0.0),
        CommandBlock::write(part::PANNING_WIDTH, 2, 0.0),
        CommandBlock::write(main::VOLUME, section::MAIN, 0.0),
        CommandBlock::write(main::DETUNE, section::MAIN, 0.0),
        CommandBlock::write(main::KEY_SHIFT, section::MAIN, 0.0),
        CommandBlock::write(config::BUFFER_SIZE, section::CONFIG, 0.0),
        CommandBlock::write(config::ENABLE_GUI, section::CONFIG, 0.0),
        CommandBlock::write(kit::ENABLE, 1, 0.0).with_kit(1).with_insert(insert::KIT_GROUP),
        CommandBlock::write(kit::MAX_NOTE, 1, 0.0).with_kit(1).with_insert(insert::KIT_GROUP),
        add(add_synth::VOLUME),
        add(add_synth::DETUNE_FREQUENCY),
        add(add_synth::OCTAVE),
        voice(add_voice::PANNING),
        voice(add_voice::COARSE_DETUNE),
        add(filter::CENTER_FREQUENCY).with_insert(insert::FILTER_GROUP),
        add(filter::Q).with_insert(insert::FILTER_GROUP),
        add(filter::STAGES).with_insert(insert::FILTER_GROUP),
        voice(oscillator::BASE_FUNCTION_PARAMETER).with_insert(insert::OSCILLATOR_GROUP),
        voice(oscillator::HARMONIC_SHIFT).with_insert(insert::OSCILLATOR_GROUP),
        voice(3).with_insert(insert::HARMONIC_AMPLITUDE),
    ];
    for control in [lfo::SPEED, lfo::DEPTH, lfo::TYPE, lfo::STRETCH] {
        blocks.push(
            add(control)
                .with_insert(insert::LFO_GROUP)
                .with_parameter(insert_type::FREQUENCY),
        );
    }
    for control in [
        envelope::ATTACK_TIME,
        envelope::DECAY_TIME,
        envelope::SUSTAIN_LEVEL,
        envelope::RELEASE_TIME,
        envelope::STRETCH,
    ] {
        blocks.push(
            add(control)
                .with_insert(insert::ENVELOPE_GROUP)
                .with_parameter(insert_type::AMPLITUDE),
        );
    }
    blocks.extend((0..=6).map(echo));
    blocks
}

/// An interchange whose first insertion slot holds an Echo
fn prepared() -> (Interchange, Endpoints) {
    let (mut interchange, mut ends) = interchange(engine());
    let echo = (effect::ECHO - effect::NONE) as f32;
    ends.cli
        .send(CommandBlock::write(sys_ins::EFFECT_TYPE, section::INSERT_EFFECTS, echo))
        .unwrap();
    interchange.mediate();
    let reply = ends.cli.try_reply().unwrap();
    assert_eq!(reply.value, echo);
    (interchange, ends)
}

fn any_value() -> impl Strategy<Value = f32> {
    prop_oneof![
        4 => -20000.0f32..20000.0,
        1 => prop::sample::select(vec![
            f32::NAN,
            f32::INFINITY,
            f32::NEG_INFINITY,
            f32::MAX,
            f32::MIN,
            -0.0,
        ]),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn writes_stay_in_range(values in prop::collection::vec(any_value(), targets().len())) {
        let (mut interchange, mut ends) = prepared();

        for (&target, &value) in targets().iter().zip(values.iter()) {
            let block = target.with_value(value);
            let limits = limits_for(&block).unwrap();

            ends.cli.send(block).unwrap();
            interchange.mediate();
            let reply = ends.cli.try_reply().unwrap();
            prop_assert!(!reply.has_error(), "control {} part {} errored", block.control, block.part);
            prop_assert!(reply.value >= limits.min && reply.value <= limits.max,
                "control {} part {} value {} stored as {}", block.control, block.part, value, reply.value);
            if limits.integer {
                prop_assert_eq!(reply.value, reply.value.round());
            } else if limits.contains(value) {
                prop_assert_eq!(reply.value, value);
            }

            let mut read = block.with_value(0.0);
            read.kind = kind::READ;
            ends.cli.send(read).unwrap();
            interchange.mediate();
            let stored = ends.cli.try_reply().unwrap();
            prop_assert!(!stored.has_error());
            prop_assert_eq!(stored.value, reply.value);
        }
    }

    #[test]
    fn ring_writes_are_clamped_too(value in any_value()) {
        let (mut interchange, mut ends) = prepared();
        // straight into the ring, no producer-side clamping
        ends.midi.try_send(&CommandBlock::write(part::VOLUME, 2, value)).unwrap();
        ends.midi.try_send(&CommandBlock::write(main::VOLUME, section::MAIN, value)).unwrap();
        ends.midi
            .try_send(
                &CommandBlock::write(filter::CENTER_FREQUENCY, 2, value)
                    .with_kit(0)
                    .with_engine(eng::ADD_SYNTH)
                    .with_insert(insert::FILTER_GROUP),
            )
            .unwrap();
        interchange.mediate();
        interchange.mediate();
        interchange.mediate();

        let engine = interchange.engine();
        let volume = engine.parts[2].params.volume;
        prop_assert!((0.0..=127.0).contains(&volume));
        let master = engine.master.volume;
        prop_assert!((0.0..=127.0).contains(&master));
        let cutoff = engine.parts[2].kit[0].add.global.filter.center_freq;
        prop_assert!((0.0..=127.0).contains(&cutoff));
    }
}

#[test]
fn nan_write_stores_the_default() {
    let (mut interchange, mut ends) = prepared();
    ends.midi.try_send(&CommandBlock::write(part::VOLUME, 4, f32::NAN)).unwrap();
    interchange.mediate();
    assert_eq!(interchange.engine().parts[4].params.volume, 96.0);

    ends.cli.send(CommandBlock::write(main::VOLUME, section::MAIN, f32::NAN)).unwrap();
    interchange.mediate();
    let reply = ends.cli.try_reply().unwrap();
    assert!(!reply.has_error());
    assert_eq!(reply.value, 90.0);

    let mut frames_l = vec![0.0f32; 64];
    let mut frames_r = vec![0.0f32; 64];
    ends.midi
        .try_send(&CommandBlock::write(0, section::MIDI_IN, 100.0).with_kit(0).with_engine(60))
        .unwrap();
    for _ in 0..8 {
        interchange.render_cycle(&mut frames_l, &mut frames_r);
        assert!(frames_l.iter().chain(frames_r.iter()).all(|s| s.is_finite()));
    }
}

// Dispatch - apply or answer one CommandBlock against the engine
//
// Runs on the audio thread, between buffers. Every write is re-clamped
// here whatever the producer already did.

use super::address::{Address, EffectSection};
use super::limits::{adjust_write, answer_query, limits_for};
use crate::config::RuntimeSettings;
use crate::effects::{EffectKind, EffectMgr, eq};
use crate::instance::signals::InstanceSignals;
use crate::messaging::command::{CommandBlock, UNUSED, kind};
use crate::messaging::text_msg::TextMsgBuffer;
use crate::messaging::controls::{
    NUM_MIDI_CHANNELS, NUM_SYS_EFX, config, effect, kit, main, midi, part, sys_ins,
};
use crate::params::envelope::EnvelopeParams;
use crate::params::limits::ERROR_VALUE;
use crate::params::{ParamGroup, to_u8};
use crate::synth::SynthEngine;

/// Shared state a command may reach beyond the engine
pub struct DispatchContext<'a> {
    pub signals: &'a InstanceSignals,
    pub settings: &'a RuntimeSettings,
    pub text: &'a TextMsgBuffer,
}

/// Handle one block in place: the block becomes its own reply
pub fn dispatch(engine: &mut SynthEngine, ctx: &DispatchContext<'_>, block: &mut CommandBlock) {
    if block.is_limits() {
        answer_query(block);
        return;
    }
    if block.kind & kind::LEARN_REQUEST != 0 {
        match limits_for(block) {
            Some(limits) if limits.learnable => block.kind |= kind::LEARNABLE,
            _ => block.set_error(),
        }
        return;
    }

    let address = Address::decode(block);
    if block.is_write() {
        if adjust_write(block).is_none() || !write(engine, ctx, address, block) {
            block.set_error();
            return;
        }
        if address == Address::MidiIn {
            block.kind = kind::SUPPRESS;
        } else if let Some(value) = read(engine, ctx, address, block) {
            block.value = value;
        }
        return;
    }

    match read(engine, ctx, address, block) {
        Some(value) => {
            if let Some(limits) = limits_for(block) {
                block.kind |= limits.flags();
            }
            block.value = value;
        }
        None => {
            block.set_error();
            block.value = ERROR_VALUE;
        }
    }
}

fn write(
    engine: &mut SynthEngine,
    ctx: &DispatchContext<'_>,
    address: Address,
    block: &CommandBlock,
) -> bool {
    match address {
        Address::Main => write_main(engine, ctx, block),
        Address::Config => {
            if !ctx.settings.apply(block.control, block.value) {
                return false;
            }
            if block.control == config::OSCILLATOR_SIZE {
                engine.set_oscil_size(ctx.settings.oscil_size());
            }
            true
        }
        Address::MidiIn => write_midi(engine, block),
        Address::EffectRouting(section) => write_routing(engine, section, block),
        Address::Effect {
            section,
            number,
            kind,
        } => {
            let Some(slot) = installed(engine, section, number, kind) else {
                return false;
            };
            write_effect(slot, block)
        }
        Address::EffectFilter { section, number } => {
            let Some(slot) = installed(engine, section, number, Some(EffectKind::DynamicFilter))
            else {
                return false;
            };
            slot.effect_mut()
                .and_then(|efx| efx.filter_params_mut())
                .is_some_and(|filter| filter.apply(block))
        }
        Address::Part(npart) => write_part(engine, ctx, npart, block),
        Address::Controller(npart) => {
            if block.control == part::RESET_ALL_CONTROLLERS {
                engine.reset_controllers(npart);
                return true;
            }
            engine.parts[npart].ctl.apply(block)
        }
        Address::KitItem { part, kit } => {
            if !engine.parts[part].kit[kit].apply(block) {
                return false;
            }
            if block.control == kit::ENABLE {
                engine.refresh_part(part);
            }
            true
        }
        Address::AddGlobal { part, kit } => engine.parts[part].kit[kit].add.global.apply(block),
        Address::AddVoice { part, kit, voice } => {
            engine.parts[part].kit[kit].add.voices[voice].apply(block)
        }
        Address::Lfo { part, kit, group } => {
            engine.parts[part].kit[kit].add.global.lfos[group].apply(block)
        }
        Address::Filter { part, kit } => engine.parts[part].kit[kit].add.global.filter.apply(block),
        Address::Envelope { part, kit, group } => {
            engine.parts[part].kit[kit].add.global.envelopes[group].apply(block)
        }
        Address::EnvelopePoints { part, kit, group } => {
            let env = &mut engine.parts[part].kit[kit].add.global.envelopes[group];
            edit_points(env, block)
        }
        Address::EnvelopePoint { part, kit, group } => {
            let env = &mut engine.parts[part].kit[kit].add.global.envelopes[group];
            let dt = if block.offset == UNUSED {
                env.point(block.control as usize).map_or(0, |(dt, _)| dt)
            } else {
                block.offset
            };
            env.change_point(block.control as usize, dt, to_u8(block.value))
        }
        Address::Oscillator { part, kit, voice } => {
            engine.parts[part].kit[kit].add.voices[voice].oscil.apply(block)
        }
        Address::Unsupported => false,
    }
}

fn read(
    engine: &SynthEngine,
    ctx: &DispatchContext<'_>,
    address: Address,
    block: &mut CommandBlock,
) -> Option<f32> {
    match address {
        Address::Main => match block.control {
            main::READ_PART_PEAK => Some(engine.part_peak(block.kit as usize)),
            main::READ_MAIN_LR_PEAK => {
                let (l, r) = engine.main_peaks();
                Some(if block.kit == 0 { l } else { r })
            }
            _ => engine.master.read(block),
        },
        Address::Config => ctx.settings.read(block.control),
        Address::MidiIn => None,
        Address::EffectRouting(section) => read_routing(engine, section, block),
        Address::Effect {
            section,
            number,
            kind,
        } => {
            let slot = engine.effect_slot(section, number)?;
            if kind.is_none() || slot.kind() != kind {
                return None;
            }
            read_effect(slot, block)
        }
        Address::EffectFilter { section, number } => {
            let slot = engine.effect_slot(section, number)?;
            slot.effect()?.filter_params()?.read(block)
        }
        Address::Part(npart) => {
            let part = &engine.parts[npart];
            if block.control == part::INSTRUMENT_NAME {
                block.miscmsg = ctx.text.try_push(&part.params.name).ok()?;
                return Some(0.0);
            }
            if block.control == part::EFFECT_TYPE {
                let slot = part.partefx.get(part.params.effect_number as usize)?;
                return Some(slot.get_effect() as f32);
            }
            part.params.read(block)
        }
        Address::Controller(npart) => engine.parts[npart].ctl.read(block),
        Address::KitItem { part, kit } => engine.parts[part].kit[kit].read(block),
        Address::AddGlobal { part, kit } => engine.parts[part].kit[kit].add.global.read(block),
        Address::AddVoice { part, kit, voice } => {
            engine.parts[part].kit[kit].add.voices[voice].read(block)
        }
        Address::Lfo { part, kit, group } => {
            engine.parts[part].kit[kit].add.global.lfos[group].read(block)
        }
        Address::Filter { part, kit } => engine.parts[part].kit[kit].add.global.filter.read(block),
        Address::Envelope { part, kit, group } => {
            engine.parts[part].kit[kit].add.global.envelopes[group].read(block)
        }
        Address::EnvelopePoints { part, kit, group } => {
            let env = &engine.parts[part].kit[kit].add.global.envelopes[group];
            Some(env.point_count() as f32)
        }
        Address::EnvelopePoint { part, kit, group } => {
            let env = &engine.parts[part].kit[kit].add.global.envelopes[group];
            let (dt, value) = env.point(block.control as usize)?;
            block.offset = dt;
            Some(value as f32)
        }
        Address::Oscillator { part, kit, voice } => {
            engine.parts[part].kit[kit].add.voices[voice].oscil.read(block)
        }
        Address::Unsupported => None,
    }
}

fn write_main(engine: &mut SynthEngine, ctx: &DispatchContext<'_>, block: &CommandBlock) -> bool {
    match block.control {
        main::MASTER_RESET | main::MASTER_RESET_AND_MLEARN => engine.master_reset(),
        main::STOP_SOUND => engine.stop_sound(),
        main::START_INSTANCE => return ctx.signals.request_start(block.int_value() as u32),
        main::STOP_INSTANCE => return ctx.signals.request_stop(block.int_value() as u32),
        main::READ_PART_PEAK | main::READ_MAIN_LR_PEAK => return false,
        _ => return engine.master.apply(block),
    }
    true
}

fn write_midi(engine: &mut SynthEngine, block: &CommandBlock) -> bool {
    let channel = block.kit;
    if channel as usize >= NUM_MIDI_CHANNELS || block.engine > 127 {
        return false;
    }
    let value = block.byte_value();
    match block.control {
        midi::NOTE_ON => engine.note_on(channel, block.engine, value),
        midi::NOTE_OFF => engine.note_off(channel, block.engine),
        midi::CONTROLLER => engine.controller(channel, block.engine, value),
        _ => return false,
    }
    true
}

fn write_part(
    engine: &mut SynthEngine,
    ctx: &DispatchContext<'_>,
    npart: usize,
    block: &CommandBlock,
) -> bool {
    let part = &mut engine.parts[npart];
    match block.control {
        part::INSTRUMENT_NAME => ctx.text.try_fetch_into(block.miscmsg, &mut part.params.name),
        part::EFFECT_TYPE => {
            let n = part.params.effect_number as usize;
            match part.partefx.get_mut(n) {
                Some(slot) => slot.change_effect(block.byte_value()),
                None => return false,
            }
            true
        }
        part::ENABLE => {
            if !part.params.apply(block) {
                return false;
            }
            engine.refresh_part(npart);
            true
        }
        _ => part.params.apply(block),
    }
}

fn write_routing(engine: &mut SynthEngine, section: EffectSection, block: &CommandBlock) -> bool {
    let value = block.int_value();
    match (section, block.control) {
        (EffectSection::System, sys_ins::EFFECT_NUMBER) => engine.sys_efx_number = value as u8,
        (EffectSection::Insertion, sys_ins::EFFECT_NUMBER) => engine.ins_efx_number = value as u8,
        (_, sys_ins::EFFECT_TYPE) => match engine.effect_slot_mut(section, None) {
            Some(slot) => slot.change_effect(value as u8),
            None => return false,
        },
        (EffectSection::Insertion, sys_ins::EFFECT_DESTINATION) => {
            let n = engine.ins_efx_number as usize;
            match (engine.ins_dest.get_mut(n), engine.insefx.get_mut(n)) {
                (Some(dest), Some(slot)) => {
                    *dest = value as i16;
                    slot.cleanup();
                }
                _ => return false,
            }
        }
        (EffectSection::System, sys_ins::TO_EFFECT_1..=sys_ins::TO_EFFECT_3) => {
            let from = engine.sys_efx_number as usize;
            let to = block.control as usize;
            if from >= NUM_SYS_EFX || to >= NUM_SYS_EFX {
                return false;
            }
            engine.sysefx_send[from][to] = value as u8;
        }
        _ => return false,
    }
    true
}

fn read_routing(engine: &SynthEngine, section: EffectSection, block: &CommandBlock) -> Option<f32> {
    let value = match (section, block.control) {
        (EffectSection::System, sys_ins::EFFECT_NUMBER) => engine.sys_efx_number as f32,
        (EffectSection::Insertion, sys_ins::EFFECT_NUMBER) => engine.ins_efx_number as f32,
        (_, sys_ins::EFFECT_TYPE) => engine.effect_slot(section, None)?.get_effect() as f32,
        (EffectSection::Insertion, sys_ins::EFFECT_DESTINATION) => {
            *engine.ins_dest.get(engine.ins_efx_number as usize)? as f32
        }
        (EffectSection::System, sys_ins::TO_EFFECT_1..=sys_ins::TO_EFFECT_3) => {
            let sends = engine.sysefx_send.get(engine.sys_efx_number as usize)?;
            *sends.get(block.control as usize)? as f32
        }
        _ => return None,
    };
    Some(value)
}

/// The slot, if the effect installed there is the one the block names
fn installed(
    engine: &mut SynthEngine,
    section: EffectSection,
    number: Option<usize>,
    kind: Option<EffectKind>,
) -> Option<&mut EffectMgr> {
    let slot = engine.effect_slot_mut(section, number)?;
    (kind.is_some() && slot.kind() == kind).then_some(slot)
}

/// Effect parameter index addressed by the block
fn effect_par(slot: &EffectMgr, block: &CommandBlock) -> Option<i32> {
    if slot.kind() == Some(EffectKind::Eq) && block.control >= 10 {
        let band = if block.parameter == UNUSED {
            slot.get_effect_par(1)
        } else {
            block.parameter
        };
        return eq::band_par(band, block.control).map(|par| par as i32);
    }
    Some(block.control as i32)
}

fn write_effect(slot: &mut EffectMgr, block: &CommandBlock) -> bool {
    let value = block.byte_value();
    if block.control == effect::PRESET && slot.kind() != Some(EffectKind::Eq) {
        slot.change_preset(value);
        return true;
    }
    match effect_par(slot, block) {
        Some(par) => {
            slot.set_effect_par(par, value);
            true
        }
        None => false,
    }
}

fn read_effect(slot: &EffectMgr, block: &CommandBlock) -> Option<f32> {
    if block.control == effect::PRESET && slot.kind() != Some(EffectKind::Eq) {
        return Some(slot.get_preset() as f32);
    }
    let par = effect_par(slot, block)?;
    Some(slot.get_effect_par(par) as f32)
}

/// Insert a point (offset = its duration) or remove one (offset unused)
fn edit_points(env: &mut EnvelopeParams, block: &CommandBlock) -> bool {
    let index = block.control as usize;
    if block.offset == UNUSED {
        env.delete_point(index).is_some()
    } else {
        env.add_point(index, block.offset, to_u8(block.value)).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::messaging::command::LimitRequest;
    use crate::synth::engine::INS_DEST_MASTER;
    use crate::messaging::controls::{
        engine as eng, envelope, insert, insert_type, lfo, oscillator, section,
    };
    use crate::messaging::text_msg::MAX_MSG_LEN;

    struct Fixture {
        engine: SynthEngine,
        signals: InstanceSignals,
        settings: RuntimeSettings,
        text: TextMsgBuffer,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                engine: SynthEngine::new(0, 44100.0, 64, 512),
                signals: InstanceSignals::new(),
                settings: RuntimeSettings::from_config(&Config::default()),
                text: TextMsgBuffer::new(),
            }
        }

        fn send(&mut self, mut block: CommandBlock) -> CommandBlock {
            let ctx = DispatchContext {
                signals: &self.signals,
                settings: &self.settings,
                text: &self.text,
            };
            dispatch(&mut self.engine, &ctx, &mut block);
            block
        }
    }

    #[test]
    fn test_write_is_clamped_and_read_back() {
        let mut fx = Fixture::new();
        let reply = fx.send(CommandBlock::write(part::VOLUME, 0, 200.0));
        assert!(!reply.has_error());
        assert_eq!(reply.value, 127.0);
        assert_eq!(fx.engine.parts[0].params.volume, 127.0);

        let reply = fx.send(CommandBlock::read(part::VOLUME, 0));
        assert_eq!(reply.value, 127.0);
        assert!(reply.is_learnable());
    }

    #[test]
    fn test_unknown_control_sets_error() {
        let mut fx = Fixture::new();
        let reply = fx.send(CommandBlock::read(99, 0));
        assert!(reply.has_error());
        assert_eq!(reply.value, ERROR_VALUE);

        let reply = fx.send(CommandBlock::write(0, section::SCALES, 1.0));
        assert!(reply.has_error());
    }

    #[test]
    fn test_limits_query_leaves_state_alone() {
        let mut fx = Fixture::new();
        let reply = fx.send(CommandBlock::limits(part::VOLUME, 0, LimitRequest::Maximum));
        assert_eq!(reply.value, 127.0);
        assert_eq!(fx.engine.parts[0].params.volume, 96.0);
    }

    #[test]
    fn test_learn_request() {
        let mut fx = Fixture::new();
        let mut block = CommandBlock::read(part::VOLUME, 0);
        block.kind |= kind::LEARN_REQUEST;
        assert!(fx.send(block).is_learnable());

        let mut block = CommandBlock::read(part::MIDI_CHANNEL, 0);
        block.kind |= kind::LEARN_REQUEST;
        assert!(fx.send(block).has_error());
    }

    #[test]
    fn test_main_actions() {
        let mut fx = Fixture::new();
        fx.send(CommandBlock::write(main::VOLUME, section::MAIN, 30.0));
        fx.engine.note_on(0, 60, 100);
        fx.send(CommandBlock::write(main::STOP_SOUND, section::MAIN, 0.0));
        assert_eq!(fx.engine.active_voices(), 0);

        fx.send(CommandBlock::write(main::MASTER_RESET, section::MAIN, 0.0));
        assert_eq!(fx.engine.master.volume, 90.0);

        let reply = fx.send(CommandBlock::write(main::START_INSTANCE, section::MAIN, 4.0));
        assert!(!reply.has_error());
        assert_eq!(fx.signals.take_starts(), (1 << 4, 0));
        fx.send(CommandBlock::write(main::STOP_INSTANCE, section::MAIN, 4.0));
        assert_eq!(fx.signals.take_stops(), 1 << 4);

        let reply = fx.send(CommandBlock::write(main::READ_PART_PEAK, section::MAIN, 0.5));
        assert!(reply.has_error());
        let reply = fx.send(CommandBlock::read(main::READ_MAIN_LR_PEAK, section::MAIN).with_kit(1));
        assert_eq!(reply.value, 0.0);
    }

    #[test]
    fn test_available_parts_rejects_other_counts() {
        let mut fx = Fixture::new();
        let reply = fx.send(CommandBlock::write(main::AVAILABLE_PARTS, section::MAIN, 20.0));
        assert!(reply.has_error());
        let reply = fx.send(CommandBlock::write(main::AVAILABLE_PARTS, section::MAIN, 64.0));
        assert_eq!(reply.value, 64.0);
    }

    #[test]
    fn test_midi_in_is_suppressed() {
        let mut fx = Fixture::new();
        let reply = fx.send(
            CommandBlock::write(midi::NOTE_ON, section::MIDI_IN, 100.0)
                .with_kit(0)
                .with_engine(60),
        );
        assert!(reply.is_suppressed());
        assert_eq!(fx.engine.active_voices(), 1);

        let reply = fx.send(
            CommandBlock::write(midi::NOTE_ON, section::MIDI_IN, 100.0)
                .with_kit(16)
                .with_engine(60),
        );
        assert!(reply.has_error());
    }

    #[test]
    fn test_part_enable_allocates_tables() {
        let mut fx = Fixture::new();
        assert!(!fx.engine.parts[3].oscil(0, 0).unwrap().is_allocated());
        fx.send(CommandBlock::write(part::ENABLE, 3, 1.0));
        assert!(fx.engine.parts[3].oscil(0, 0).unwrap().is_allocated());

        let item = CommandBlock::write(kit::ENABLE, 3, 1.0)
            .with_kit(2)
            .with_insert(insert::KIT_GROUP);
        fx.send(item);
        assert!(fx.engine.parts[3].oscil(2, 0).unwrap().is_allocated());
    }

    #[test]
    fn test_effect_routing_and_parameters() {
        let mut fx = Fixture::new();
        fx.send(CommandBlock::write(sys_ins::EFFECT_NUMBER, section::INSERT_EFFECTS, 2.0));
        fx.send(CommandBlock::write(sys_ins::EFFECT_TYPE, section::INSERT_EFFECTS, 3.0));
        fx.send(CommandBlock::write(sys_ins::EFFECT_DESTINATION, section::INSERT_EFFECTS, -2.0));
        assert_eq!(fx.engine.insefx[2].kind(), Some(EffectKind::Chorus));
        assert_eq!(fx.engine.ins_dest[2], INS_DEST_MASTER);

        let depth = CommandBlock::write(6, section::INSERT_EFFECTS, 99.0)
            .with_kit(effect::CHORUS)
            .with_engine(2);
        assert!(!fx.send(depth).has_error());
        assert_eq!(fx.engine.insefx[2].get_effect_par(6), 99);

        // kit names a type that is not installed there
        let wrong = CommandBlock::write(6, section::INSERT_EFFECTS, 99.0)
            .with_kit(effect::ECHO)
            .with_engine(2);
        assert!(fx.send(wrong).has_error());

        let preset = CommandBlock::write(effect::PRESET, section::INSERT_EFFECTS, 3.0)
            .with_kit(effect::CHORUS);
        fx.send(preset);
        assert_eq!(fx.engine.insefx[2].get_preset(), 3);
    }

    #[test]
    fn test_system_sends() {
        let mut fx = Fixture::new();
        fx.send(CommandBlock::write(sys_ins::EFFECT_NUMBER, section::SYSTEM_EFFECTS, 1.0));
        fx.send(CommandBlock::write(sys_ins::TO_EFFECT_1 + 1, section::SYSTEM_EFFECTS, 80.0));
        assert_eq!(fx.engine.sysefx_send[1][2], 80);
        let reply = fx.send(CommandBlock::read(sys_ins::TO_EFFECT_1 + 1, section::SYSTEM_EFFECTS));
        assert_eq!(reply.value, 80.0);
    }

    #[test]
    fn test_eq_band_addressing() {
        let mut fx = Fixture::new();
        fx.send(CommandBlock::write(sys_ins::EFFECT_TYPE, section::SYSTEM_EFFECTS, 7.0));
        let gain = CommandBlock::write(12, section::SYSTEM_EFFECTS, 90.0)
            .with_kit(effect::EQ)
            .with_parameter(2);
        assert!(!fx.send(gain).has_error());
        assert_eq!(fx.engine.sysefx[0].get_effect_par(10 + 2 * 5 + 2), 90);

        // no band given: the band selected through control 1
        fx.send(CommandBlock::write(1, section::SYSTEM_EFFECTS, 4.0).with_kit(effect::EQ));
        fx.send(CommandBlock::write(11, section::SYSTEM_EFFECTS, 30.0).with_kit(effect::EQ));
        assert_eq!(fx.engine.sysefx[0].get_effect_par(10 + 4 * 5 + 1), 30);
    }

    #[test]
    fn test_part_effect_type() {
        let mut fx = Fixture::new();
        fx.send(CommandBlock::write(part::EFFECT_NUMBER, 0, 1.0));
        fx.send(CommandBlock::write(part::EFFECT_TYPE, 0, 2.0));
        assert_eq!(fx.engine.parts[0].partefx[1].kind(), Some(EffectKind::Echo));
        let reply = fx.send(CommandBlock::read(part::EFFECT_TYPE, 0));
        assert_eq!(reply.value, 2.0);
    }

    #[test]
    fn test_parameter_groups() {
        let mut fx = Fixture::new();
        let depth = CommandBlock::write(lfo::DEPTH, 0, 77.0)
            .with_kit(0)
            .with_engine(eng::ADD_SYNTH)
            .with_insert(insert::LFO_GROUP)
            .with_parameter(insert_type::FREQUENCY);
        fx.send(depth);
        assert_eq!(fx.engine.parts[0].kit[0].add.global.lfos[1].depth, 77);

        let harmonic = CommandBlock::write(4, 0, 100.0)
            .with_kit(0)
            .with_engine(eng::ADD_VOICE_1)
            .with_insert(insert::HARMONIC_AMPLITUDE);
        fx.send(harmonic);
        assert_eq!(fx.engine.parts[0].kit[0].add.voices[0].oscil.harmonic_mag[4], 100);

        let shift = CommandBlock::write(oscillator::HARMONIC_SHIFT, 0, 3.0)
            .with_kit(0)
            .with_engine(eng::ADD_VOICE_1)
            .with_insert(insert::OSCILLATOR_GROUP);
        assert!(!fx.send(shift).has_error());
    }

    #[test]
    fn test_envelope_points() {
        let mut fx = Fixture::new();
        let group = |control: u8, value: f32, ins: u8| {
            CommandBlock::write(control, 0, value)
                .with_kit(0)
                .with_engine(eng::ADD_SYNTH)
                .with_insert(ins)
                .with_parameter(insert_type::AMPLITUDE)
        };
        // points can only be added in free mode
        assert!(fx.send(group(1, 64.0, insert::ENVELOPE_POINTS).with_offset(20)).has_error());

        fx.send(group(envelope::ENABLE_FREE_MODE, 1.0, insert::ENVELOPE_GROUP));
        let before = fx.engine.parts[0].kit[0].add.global.envelopes[0].point_count();
        let reply = fx.send(group(1, 64.0, insert::ENVELOPE_POINTS).with_offset(20));
        assert_eq!(reply.value, (before + 1) as f32);

        fx.send(group(1, 100.0, insert::ENVELOPE_POINT_CHANGE).with_offset(10));
        let env = &fx.engine.parts[0].kit[0].add.global.envelopes[0];
        assert_eq!(env.point(1), Some((10, 100)));

        let reply = fx.send(group(1, 0.0, insert::ENVELOPE_POINTS));
        assert_eq!(reply.value, before as f32);
    }

    #[test]
    fn test_config_section() {
        let mut fx = Fixture::new();
        let reply = fx.send(CommandBlock::write(config::OSCILLATOR_SIZE, section::CONFIG, 2048.0));
        assert!(!reply.has_error());
        assert_eq!(fx.engine.oscil_size(), 2048);
        assert!(fx.settings.is_changed());
    }

    #[test]
    fn test_instrument_name_through_text_pool() {
        let mut fx = Fixture::new();
        let id = fx.text.push("Warm Pad").unwrap();
        let reply = fx.send(CommandBlock::write(part::INSTRUMENT_NAME, 1, 0.0).with_miscmsg(id));
        assert!(!reply.has_error());
        assert_eq!(fx.engine.parts[1].params.name, "Warm Pad");
        assert_eq!(fx.text.in_use(), 1, "read-back parks the name again");

        // the name buffer is reused in place
        let name = &fx.engine.parts[1].params.name;
        let storage = name.as_ptr();
        assert_eq!(name.capacity(), MAX_MSG_LEN);
        fx.text.clear();
        let id = fx.text.push("Glass").unwrap();
        fx.send(CommandBlock::write(part::INSTRUMENT_NAME, 1, 0.0).with_miscmsg(id));
        assert_eq!(fx.engine.parts[1].params.name, "Glass");
        assert_eq!(fx.engine.parts[1].params.name.as_ptr(), storage);
        fx.text.clear();

        let reply = fx.send(CommandBlock::read(part::INSTRUMENT_NAME, 1));
        assert_eq!(fx.text.fetch(reply.miscmsg), "Warm Pad");
    }

    #[test]
    fn test_sub_synth_unsupported() {
        let mut fx = Fixture::new();
        let block = CommandBlock::write(0, 0, 1.0).with_kit(0).with_engine(eng::SUB_SYNTH);
        assert!(fx.send(block).has_error());
    }
}

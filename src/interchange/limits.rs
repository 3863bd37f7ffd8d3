// Limits routing - the range table of any addressed control
//
// Pure functions of the block: used by the control side to answer range
// queries and pre-clamp writes, and by the audio side to re-clamp every
// write before it touches engine state.

use super::address::{Address, EffectSection};
use crate::config;
use crate::effects::{EffectKind, eq};
use crate::messaging::command::{CommandBlock, UNUSED};
use crate::messaging::controls::{NUM_INS_EFX, NUM_MIDI_PARTS, NUM_SYS_EFX, midi, sys_ins};
use crate::params::ParamGroup;
use crate::params::add::{AddGlobalParams, AddVoiceParams};
use crate::params::envelope::{EnvelopeParams, MAX_ENVELOPE_POINTS};
use crate::params::filter::FilterParams;
use crate::params::lfo::LfoParams;
use crate::params::limits::{Limits, normalise, resolve};
use crate::params::master::MasterParams;
use crate::params::oscillator::OscilParams;
use crate::params::part::{ControllerParams, KitItemParams, PartParams};

/// A write value at or above this asks for the control's default
pub const DEFAULT_REQUEST: f32 = f32::MAX / 2.0;

/// Outcome of checking a write against its limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Adjustment {
    /// Value was already valid
    InRange,
    /// Value was clamped into range
    Clamped,
    /// Default requested
    Default,
}

pub fn limits_for(block: &CommandBlock) -> Option<Limits> {
    match Address::decode(block) {
        Address::Main => MasterParams::limits(block),
        Address::Config => config::limits(block.control),
        Address::MidiIn => match block.control {
            midi::NOTE_ON | midi::NOTE_OFF | midi::CONTROLLER => {
                Some(Limits::int(0, 127, 0).fixed())
            }
            _ => None,
        },
        Address::EffectRouting(section) => routing_limits(section, block.control),
        Address::Effect { kind, .. } => effect_limits(kind?, block),
        Address::EffectFilter { .. } => FilterParams::limits(block),
        Address::Part(_) => PartParams::limits(block),
        Address::Controller(_) => ControllerParams::limits(block),
        Address::KitItem { .. } => KitItemParams::limits(block),
        Address::AddGlobal { .. } => AddGlobalParams::limits(block),
        Address::AddVoice { .. } => AddVoiceParams::limits(block),
        Address::Lfo { .. } => LfoParams::limits(block),
        Address::Filter { .. } => FilterParams::limits(block),
        Address::Envelope { .. } => EnvelopeParams::limits(block),
        Address::EnvelopePoints { .. } | Address::EnvelopePoint { .. } => {
            ((block.control as usize) < MAX_ENVELOPE_POINTS).then(|| Limits::int(0, 127, 0).fixed())
        }
        Address::Oscillator { .. } => OscilParams::limits(block),
        Address::Unsupported => None,
    }
}

fn routing_limits(section: EffectSection, control: u8) -> Option<Limits> {
    let system = section == EffectSection::System;
    let slots = if system { NUM_SYS_EFX } else { NUM_INS_EFX };
    let limits = match control {
        sys_ins::EFFECT_NUMBER => Limits::int(0, slots as i32 - 1, 0).fixed(),
        sys_ins::EFFECT_TYPE => Limits::int(0, 8, 0).fixed(),
        sys_ins::EFFECT_DESTINATION if !system => {
            Limits::int(-2, NUM_MIDI_PARTS as i32 - 1, -1).fixed()
        }
        sys_ins::TO_EFFECT_1..=sys_ins::TO_EFFECT_3 if system => Limits::int(0, 127, 0),
        _ => return None,
    };
    Some(limits)
}

fn effect_limits(kind: EffectKind, block: &CommandBlock) -> Option<Limits> {
    if kind == EffectKind::Eq && block.parameter != UNUSED {
        // band controls carry the band in `parameter`
        eq::band_par(block.parameter, block.control)?;
    }
    kind.limits(block)
}

/// Answer a limits request in place (value and reply flags)
pub fn answer_query(block: &mut CommandBlock) {
    let limits = limits_for(block);
    block.value = resolve(limits, block);
}

/// Clamp a write into range, or replace it with the default.
///
/// Returns `None` for an unknown control. The reply flags of the control
/// are added to the block.
pub fn adjust_write(block: &mut CommandBlock) -> Option<(Limits, Adjustment)> {
    let limits = limits_for(block)?;
    block.kind |= limits.flags();
    let value = block.value;
    let adjustment = if value >= DEFAULT_REQUEST {
        block.value = limits.def;
        Adjustment::Default
    } else if limits.contains(value) {
        Adjustment::InRange
    } else {
        block.value = limits.clamp(value);
        Adjustment::Clamped
    };
    block.value = normalise(&limits, block.value);
    Some((limits, adjustment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::command::{LimitRequest, kind};
    use crate::messaging::controls::{effect, main, part, section};

    #[test]
    fn test_part_volume_query() {
        let mut block = CommandBlock::limits(part::VOLUME, 0, LimitRequest::Maximum);
        answer_query(&mut block);
        assert_eq!(block.value, 127.0);
        assert!(block.is_learnable());
        assert!(!block.has_error());
    }

    #[test]
    fn test_unknown_control_is_error() {
        let mut block = CommandBlock::limits(250, section::MAIN, LimitRequest::Maximum);
        answer_query(&mut block);
        assert!(block.has_error());

        let mut block = CommandBlock::limits(0, section::SCALES, LimitRequest::Maximum);
        answer_query(&mut block);
        assert!(block.has_error());
    }

    #[test]
    fn test_adjust_write() {
        let mut block = CommandBlock::write(part::VOLUME, 0, 200.0);
        let (_, adjustment) = adjust_write(&mut block).unwrap();
        assert_eq!(adjustment, Adjustment::Clamped);
        assert_eq!(block.value, 127.0);

        let mut block = CommandBlock::write(main::VOLUME, section::MAIN, f32::MAX);
        let (_, adjustment) = adjust_write(&mut block).unwrap();
        assert_eq!(adjustment, Adjustment::Default);
        assert_eq!(block.value, 90.0);

        // integer controls are rounded half away from zero
        let mut block = CommandBlock::write(part::PANNING, 0, 20.5);
        assert_eq!(adjust_write(&mut block).unwrap().1, Adjustment::InRange);
        assert_eq!(block.value, 21.0);
        assert!(block.kind & kind::INTEGER != 0);
    }

    #[test]
    fn test_adjust_write_nan() {
        let mut block = CommandBlock::write(part::VOLUME, 0, f32::NAN);
        assert_eq!(adjust_write(&mut block).unwrap().1, Adjustment::Clamped);
        assert_eq!(block.value, 96.0);

        let mut block = CommandBlock::write(main::DETUNE, section::MAIN, f32::NAN);
        adjust_write(&mut block).unwrap();
        assert_eq!(block.value, 64.0);

        let mut block = CommandBlock::write(part::PANNING, 0, f32::NEG_INFINITY);
        assert_eq!(adjust_write(&mut block).unwrap().1, Adjustment::Clamped);
        assert_eq!(block.value, 0.0);
    }

    #[test]
    fn test_effect_routing_limits() {
        let dest = CommandBlock::limits(sys_ins::EFFECT_DESTINATION, section::INSERT_EFFECTS, LimitRequest::Minimum);
        assert_eq!(limits_for(&dest).unwrap().min, -2.0);
        // system effects have no destination
        let dest = CommandBlock::limits(sys_ins::EFFECT_DESTINATION, section::SYSTEM_EFFECTS, LimitRequest::Minimum);
        assert!(limits_for(&dest).is_none());

        let none = CommandBlock::limits(0, section::SYSTEM_EFFECTS, LimitRequest::Maximum)
            .with_kit(effect::NONE);
        assert!(limits_for(&none).is_none());
    }

    #[test]
    fn test_eq_band_limits() {
        let gain = CommandBlock::limits(12, section::SYSTEM_EFFECTS, LimitRequest::Default)
            .with_kit(effect::EQ)
            .with_parameter(3);
        assert_eq!(limits_for(&gain).unwrap().def, 64.0);
        let bad_band = gain.with_parameter(8);
        assert!(limits_for(&bad_band).is_none());
    }
}

// Module synthèse - moteur AddSynth, parties et voix

pub mod engine;
pub mod envelope;
pub mod filter;
pub mod lfo;
pub mod oscil_gen;
pub mod part;
pub mod voice;
pub mod voice_manager;

pub use engine::SynthEngine;

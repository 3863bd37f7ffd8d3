// Interchange - command drain on the audio side, ControlHandle on the producer side
//
// Producers (CLI, GUI, MIDI) each own one byte ring towards the audio
// thread. The audio callback calls `Interchange::render_cycle`, which drains
// a bounded number of blocks, applies them to the engine and routes the
// replies back over the toCLI/toGUI rings.

pub mod address;
pub mod dispatch;
pub mod limits;

use crate::config::{Config, RuntimeSettings};
use crate::instance::signals::InstanceSignals;
use crate::messaging::channels::{CommandReceiver, CommandSender, create_command_channel};
use crate::messaging::command::{CommandBlock, Origin, kind, source};
use crate::messaging::text_msg::TextMsgBuffer;
use crate::synth::SynthEngine;
use dispatch::{DispatchContext, dispatch};
use limits::{Adjustment, adjust_write, answer_query, limits_for};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

const FROM_CLI: usize = 0;
const FROM_GUI: usize = 1;
const FROM_MIDI: usize = 2;
const NUM_INPUTS: usize = 3;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    #[error("Unable to write to {0} buffer")]
    BufferFull(&'static str),
}

/// Counters written by the audio thread, reported by the duty cycle
#[derive(Debug, Default)]
pub struct InterchangeStats {
    applied: AtomicU64,
    deferred: AtomicU64,
    dropped_to_cli: AtomicU64,
    dropped_to_gui: AtomicU64,
}

impl InterchangeStats {
    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    pub fn deferred(&self) -> u64 {
        self.deferred.load(Ordering::Relaxed)
    }

    /// Replies lost since the last call: (toCLI, toGUI)
    pub fn take_dropped(&self) -> (u64, u64) {
        (
            self.dropped_to_cli.swap(0, Ordering::Relaxed),
            self.dropped_to_gui.swap(0, Ordering::Relaxed),
        )
    }
}

/// Everything shared between one instance's audio side and its producers
#[derive(Clone)]
pub struct Shared {
    pub signals: Arc<InstanceSignals>,
    pub settings: Arc<RuntimeSettings>,
    pub text: Arc<TextMsgBuffer>,
    /// The instance's run flag
    pub run: Arc<AtomicBool>,
}

impl Shared {
    pub fn new(signals: Arc<InstanceSignals>, settings: Arc<RuntimeSettings>) -> Self {
        Self {
            signals,
            settings,
            text: Arc::new(TextMsgBuffer::new()),
            run: Arc::new(AtomicBool::new(true)),
        }
    }
}

/// Producer ends handed out by `Interchange::new`
pub struct Endpoints {
    pub cli: ControlHandle,
    pub gui: ControlHandle,
    /// Raw MIDI-originated blocks (notes, controllers, learned writes)
    pub midi: CommandSender,
}

/// Where an audio client finds its instance's interchange; empty while the
/// instance is still booting
pub type InterchangeSlot = Arc<Mutex<Option<Interchange>>>;

pub struct Interchange {
    engine: SynthEngine,
    inputs: [CommandReceiver; NUM_INPUTS],
    /// Low-priority block put back for the next callback, per input
    held: [Option<CommandBlock>; NUM_INPUTS],
    to_cli: CommandSender,
    to_gui: CommandSender,
    budget: usize,
    shared: Shared,
    stats: Arc<InterchangeStats>,
}

impl Interchange {
    pub fn new(engine: SynthEngine, config: &Config, shared: Shared) -> (Self, Endpoints) {
        let (cli_tx, cli_rx) = create_command_channel(config.cli_capacity);
        let (gui_tx, gui_rx) = create_command_channel(config.gui_capacity);
        let (midi_tx, midi_rx) = create_command_channel(config.midi_capacity);
        let (to_cli_tx, to_cli_rx) = create_command_channel(config.reply_capacity);
        let (to_gui_tx, to_gui_rx) = create_command_channel(config.reply_capacity);
        let id = engine.id();

        let interchange = Self {
            engine,
            inputs: [cli_rx, gui_rx, midi_rx],
            held: [None; NUM_INPUTS],
            to_cli: to_cli_tx,
            to_gui: to_gui_tx,
            budget: config.mediate_budget.max(1),
            shared: shared.clone(),
            stats: Arc::new(InterchangeStats::default()),
        };
        let endpoints = Endpoints {
            cli: ControlHandle::new(id, Origin::Cli, cli_tx, to_cli_rx, shared.text.clone()),
            gui: ControlHandle::new(id, Origin::Gui, gui_tx, to_gui_rx, shared.text),
            midi: midi_tx,
        };
        (interchange, endpoints)
    }

    pub fn engine(&self) -> &SynthEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SynthEngine {
        &mut self.engine
    }

    pub fn stats(&self) -> Arc<InterchangeStats> {
        self.stats.clone()
    }

    pub fn run_flag(&self) -> Arc<AtomicBool> {
        self.shared.run.clone()
    }

    /// Drain the input rings, one block per input per pass.
    ///
    /// Stops after `budget` blocks or when the run flag clears. Once half
    /// the budget is spent a low-priority block is held for the next call,
    /// and its input is not read further this time. Returns the number of
    /// blocks applied.
    pub fn mediate(&mut self) -> usize {
        let mut used = 0;
        let mut blocked = [false; NUM_INPUTS];
        loop {
            let mut more = false;
            for input in 0..NUM_INPUTS {
                if blocked[input] {
                    continue;
                }
                if used >= self.budget || !self.shared.run.load(Ordering::Relaxed) {
                    return used;
                }
                let Some(block) = self.held[input]
                    .take()
                    .or_else(|| self.inputs[input].try_recv())
                else {
                    continue;
                };
                if block.is_low_priority() && used >= self.budget / 2 {
                    self.held[input] = Some(block);
                    blocked[input] = true;
                    self.stats.deferred.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                self.apply(input, block);
                used += 1;
                more |= self.inputs[input].pending() > 0;
            }
            if !more {
                return used;
            }
        }
    }

    fn apply(&mut self, input: usize, mut block: CommandBlock) {
        let ctx = DispatchContext {
            signals: &self.shared.signals,
            settings: &self.shared.settings,
            text: &self.shared.text,
        };
        let was_write = block.is_write();
        dispatch(&mut self.engine, &ctx, &mut block);
        self.stats.applied.fetch_add(1, Ordering::Relaxed);

        if block.is_suppressed() || block.source & source::ORIGIN_MASK == source::NO_ACTION {
            return;
        }
        match input {
            FROM_CLI => {
                self.reply_to_cli(&block);
                if block.source & source::LOOPBACK != 0 {
                    self.reply_to_gui(&block);
                }
            }
            FROM_GUI => self.reply_to_gui(&block),
            FROM_MIDI if was_write => self.reply_to_gui(&block),
            _ => {}
        }
    }

    fn reply_to_cli(&mut self, block: &CommandBlock) {
        if self.to_cli.try_send(block).is_err() {
            self.stats.dropped_to_cli.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn reply_to_gui(&mut self, block: &CommandBlock) {
        if self.to_gui.try_send(block).is_err() {
            self.stats.dropped_to_gui.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// One audio period: apply pending commands, then render
    pub fn render_cycle(&mut self, out_l: &mut [f32], out_r: &mut [f32]) {
        self.mediate();
        self.engine.render(out_l, out_r);
    }
}

/// Producer side of one control surface (CLI or GUI).
///
/// Range queries are answered here without touching the engine; writes are
/// pre-clamped, then queued for the audio thread.
pub struct ControlHandle {
    instance: u32,
    origin: Origin,
    to_audio: CommandSender,
    replies: CommandReceiver,
    text: Arc<TextMsgBuffer>,
}

impl ControlHandle {
    fn new(
        instance: u32,
        origin: Origin,
        to_audio: CommandSender,
        replies: CommandReceiver,
        text: Arc<TextMsgBuffer>,
    ) -> Self {
        Self {
            instance,
            origin,
            to_audio,
            replies,
            text,
        }
    }

    fn channel_name(&self) -> &'static str {
        match self.origin {
            Origin::Gui => "fromGUI",
            _ => "fromCLI",
        }
    }

    fn source_bits(&self) -> u8 {
        match self.origin {
            Origin::Gui => source::FROM_GUI,
            _ => source::FROM_CLI,
        }
    }

    /// Submit a block.
    ///
    /// Returns the reply straight away for requests answered on this side
    /// (limits queries, refused learn requests), `None` when the block went
    /// to the audio thread.
    pub fn send(&mut self, mut block: CommandBlock) -> Result<Option<CommandBlock>, SendError> {
        block.source = (block.source & !source::ORIGIN_MASK) | self.source_bits();
        if block.is_limits() {
            answer_query(&mut block);
            return Ok(Some(block));
        }
        if block.kind & kind::LEARN_REQUEST != 0 {
            if !limits_for(&block).is_some_and(|limits| limits.learnable) {
                tracing::warn!(instance = self.instance, control = block.control, "Can't learn this control");
                block.set_error();
                return Ok(Some(block));
            }
        } else if block.is_write() {
            match adjust_write(&mut block) {
                Some((_, Adjustment::Clamped)) => {
                    tracing::warn!(
                        instance = self.instance,
                        control = block.control,
                        part = block.part,
                        value = block.value,
                        "Range adjusted"
                    );
                }
                Some(_) => {}
                None => {
                    tracing::debug!(control = block.control, part = block.part, "Unknown control");
                }
            }
        }
        self.to_audio.try_send(&block).map_err(|_| {
            tracing::warn!(instance = self.instance, "Unable to write to {} buffer", self.channel_name());
            SendError::BufferFull(self.channel_name())
        })?;
        Ok(None)
    }

    /// Park `text` in the message pool and send the block carrying it
    pub fn send_text(
        &mut self,
        block: CommandBlock,
        text: &str,
    ) -> Result<Option<CommandBlock>, SendError> {
        match self.text.push(text) {
            Ok(id) => self.send(block.with_miscmsg(id)),
            Err(_) => {
                let mut block = block;
                block.set_error();
                Ok(Some(block))
            }
        }
    }

    pub fn try_reply(&mut self) -> Option<CommandBlock> {
        self.replies.try_recv()
    }

    /// Poll for a reply until `timeout`
    pub fn wait_reply(&mut self, timeout: Duration) -> Option<CommandBlock> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(reply) = self.replies.try_recv() {
                return Some(reply);
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Text parked by a reply, empty when it carries none
    pub fn reply_text(&self, reply: &CommandBlock) -> String {
        self.text.fetch(reply.miscmsg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::command::LimitRequest;
    use crate::messaging::controls::{main, midi, part, section};

    fn setup(config: &Config) -> (Interchange, Endpoints) {
        let settings = Arc::new(RuntimeSettings::from_config(config));
        let shared = Shared::new(Arc::new(InstanceSignals::new()), settings);
        let engine = SynthEngine::new(0, 44100.0, 64, 256);
        Interchange::new(engine, config, shared)
    }

    #[test]
    fn test_cli_write_and_reply() {
        let (mut interchange, mut ends) = setup(&Config::default());
        assert!(ends.cli.send(CommandBlock::write(part::VOLUME, 0, 200.0)).unwrap().is_none());
        assert_eq!(interchange.mediate(), 1);
        assert_eq!(interchange.engine().parts[0].params.volume, 127.0);

        let reply = ends.cli.try_reply().unwrap();
        assert_eq!(reply.value, 127.0);
        assert_eq!(reply.origin(), Origin::Cli);
        assert!(ends.gui.try_reply().is_none());
    }

    #[test]
    fn test_limits_answered_on_producer_side() {
        let (mut interchange, mut ends) = setup(&Config::default());
        let reply = ends
            .cli
            .send(CommandBlock::limits(main::VOLUME, section::MAIN, LimitRequest::Default))
            .unwrap()
            .unwrap();
        assert_eq!(reply.value, 90.0);
        assert_eq!(interchange.mediate(), 0);
    }

    #[test]
    fn test_refused_learn_request() {
        let (_interchange, mut ends) = setup(&Config::default());
        let mut block = CommandBlock::read(part::MIDI_CHANNEL, 0);
        block.kind |= kind::LEARN_REQUEST;
        let reply = ends.cli.send(block).unwrap().unwrap();
        assert!(reply.has_error());
    }

    #[test]
    fn test_full_input_reports_buffer_full() {
        let config = Config {
            cli_capacity: 2,
            ..Config::default()
        };
        let (_interchange, mut ends) = setup(&config);
        for _ in 0..2 {
            ends.cli.send(CommandBlock::read(part::VOLUME, 0)).unwrap();
        }
        let err = ends.cli.send(CommandBlock::read(part::VOLUME, 0)).unwrap_err();
        assert_eq!(err, SendError::BufferFull("fromCLI"));
        assert_eq!(err.to_string(), "Unable to write to fromCLI buffer");
    }

    #[test]
    fn test_budget_bounds_one_cycle() {
        let config = Config {
            mediate_budget: 4,
            ..Config::default()
        };
        let (mut interchange, mut ends) = setup(&config);
        for _ in 0..10 {
            ends.gui.send(CommandBlock::read(part::PANNING, 0)).unwrap();
        }
        assert_eq!(interchange.mediate(), 4);
        assert_eq!(interchange.mediate(), 4);
        assert_eq!(interchange.mediate(), 2);
    }

    #[test]
    fn test_low_priority_is_deferred() {
        let config = Config {
            mediate_budget: 4,
            ..Config::default()
        };
        let (mut interchange, mut ends) = setup(&config);
        for _ in 0..2 {
            ends.cli.send(CommandBlock::read(part::PANNING, 0)).unwrap();
        }
        let low = CommandBlock::write(part::PANNING, 0, 10.0).with_source(source::LOW_PRIO);
        ends.cli.send(low).unwrap();

        assert_eq!(interchange.mediate(), 2);
        assert_eq!(interchange.stats().deferred(), 1);
        assert_eq!(interchange.engine().parts[0].params.panning, 64);

        assert_eq!(interchange.mediate(), 1);
        assert_eq!(interchange.engine().parts[0].params.panning, 10);
    }

    #[test]
    fn test_midi_notes_need_no_reply() {
        let (mut interchange, mut ends) = setup(&Config::default());
        let note = CommandBlock::write(midi::NOTE_ON, section::MIDI_IN, 100.0)
            .with_kit(0)
            .with_engine(64)
            .with_source(source::FROM_MIDI);
        ends.midi.try_send(&note).unwrap();
        let learned = CommandBlock::write(part::VOLUME, 0, 50.0).with_source(source::FROM_MIDI);
        ends.midi.try_send(&learned).unwrap();

        interchange.mediate();
        assert_eq!(interchange.engine().active_voices(), 1);
        let mirrored = ends.gui.try_reply().unwrap();
        assert_eq!(mirrored.control, part::VOLUME);
        assert!(ends.gui.try_reply().is_none());
    }

    #[test]
    fn test_full_reply_ring_is_counted() {
        let config = Config {
            reply_capacity: 1,
            ..Config::default()
        };
        let (mut interchange, mut ends) = setup(&config);
        ends.cli.send(CommandBlock::read(part::VOLUME, 0)).unwrap();
        ends.cli.send(CommandBlock::read(part::PANNING, 0)).unwrap();
        interchange.mediate();
        assert_eq!(interchange.stats().take_dropped(), (1, 0));
        assert_eq!(interchange.stats().take_dropped(), (0, 0));
    }

    #[test]
    fn test_cleared_run_flag_stops_drain() {
        let (mut interchange, mut ends) = setup(&Config::default());
        ends.cli.send(CommandBlock::read(part::VOLUME, 0)).unwrap();
        interchange.run_flag().store(false, Ordering::Relaxed);
        assert_eq!(interchange.mediate(), 0);
    }

    #[test]
    fn test_instrument_name_round_trip() {
        let (mut interchange, mut ends) = setup(&Config::default());
        ends.cli
            .send_text(CommandBlock::write(part::INSTRUMENT_NAME, 2, 0.0), "Bells")
            .unwrap();
        interchange.mediate();
        let reply = ends.cli.try_reply().unwrap();
        assert_eq!(ends.cli.reply_text(&reply), "Bells");
        assert_eq!(interchange.engine().parts[2].params.name, "Bells");
    }
}

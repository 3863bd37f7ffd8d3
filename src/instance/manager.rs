// Instance manager - registry, boot and the duty cycle
//
// The registry mutex covers bookkeeping only (lookup, insert, erase, state
// change). Booting an instance, closing its clients and running the event
// pump all happen on an `Arc<Instance>` taken out of the registry first.

use super::boot::{Clients, DriverPair, open_clients};
use super::signals::InstanceSignals;
use super::state::{AtomicLifecycle, LifecycleState};
use super::{InstanceError, MAX_INSTANCES};
use crate::audio::ClientRequest;
use crate::config::{Config, RuntimeSettings};
use crate::interchange::{ControlHandle, Interchange, InterchangeSlot, InterchangeStats, Shared};
use crate::messaging::channels::{NotificationSink, notify};
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::midi::MidiSink;
use crate::synth::SynthEngine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

/// One synth engine and the clients driving it
pub struct Instance {
    id: u32,
    state: AtomicLifecycle,
    shared: Shared,
    slot: InterchangeSlot,
    midi_sink: MidiSink,
    cli: Mutex<Option<ControlHandle>>,
    gui: Mutex<Option<ControlHandle>>,
    clients: Mutex<Option<Clients>>,
    stats: OnceLock<Arc<InterchangeStats>>,
    drivers: OnceLock<DriverPair>,
}

impl Instance {
    fn new(id: u32, signals: Arc<InstanceSignals>, settings: Arc<RuntimeSettings>) -> Self {
        Self {
            id,
            state: AtomicLifecycle::default(),
            shared: Shared::new(signals, settings),
            slot: Arc::new(Mutex::new(None)),
            midi_sink: Arc::new(Mutex::new(None)),
            cli: Mutex::new(None),
            gui: Mutex::new(None),
            clients: Mutex::new(None),
            stats: OnceLock::new(),
            drivers: OnceLock::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    /// Cleared to ask the instance to shut down
    pub fn run_flag(&self) -> Arc<AtomicBool> {
        self.shared.run.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running && self.shared.run.load(Ordering::Acquire)
    }

    /// Drivers picked at boot
    pub fn drivers(&self) -> Option<DriverPair> {
        self.drivers.get().copied()
    }

    pub fn stats(&self) -> Option<Arc<InterchangeStats>> {
        self.stats.get().cloned()
    }

    /// Run `f` with the CLI control handle, `None` before boot
    pub fn with_cli<R>(&self, f: impl FnOnce(&mut ControlHandle) -> R) -> Option<R> {
        lock(&self.cli).as_mut().map(f)
    }

    /// Run `f` with the GUI control handle, `None` before boot
    pub fn with_gui<R>(&self, f: impl FnOnce(&mut ControlHandle) -> R) -> Option<R> {
        lock(&self.gui).as_mut().map(f)
    }

    /// Engine construction and client probing; state must be PENDING
    fn boot(&self, config: &Config, notifications: &NotificationSink) -> Result<(), InstanceError> {
        if !self
            .state
            .transition(LifecycleState::Pending, LifecycleState::Booting)
        {
            return Err(InstanceError::BootFailed(self.id));
        }
        let configured = (config.audio_driver, config.midi_driver);
        let request = ClientRequest {
            instance: self.id,
            sample_rate: config.sample_rate,
            buffer_size: config.buffer_size,
        };
        let clients = match open_clients(
            configured,
            request,
            config.midi_port.as_deref(),
            &self.slot,
            &self.midi_sink,
            notifications,
        ) {
            Ok(clients) => clients,
            Err(e) => {
                self.state.set(LifecycleState::Defunct);
                tracing::error!(instance = self.id, "{}", e);
                notify(
                    notifications,
                    Notification::error(NotificationCategory::Instance, e.to_string())
                        .for_instance(self.id),
                );
                return Err(e);
            }
        };

        let drivers = clients.drivers();
        if drivers != configured {
            self.shared.settings.mark_changed();
            let message = format!("Using {} for audio and {} for midi", drivers.0, drivers.1);
            tracing::info!(instance = self.id, "{}", message);
            notify(
                notifications,
                Notification::warning(NotificationCategory::Audio, message).for_instance(self.id),
            );
        }

        let engine = SynthEngine::new(
            self.id,
            clients.audio.sample_rate() as f32,
            clients.audio.buffer_size(),
            self.shared.settings.oscil_size(),
        );
        let (interchange, endpoints) = Interchange::new(engine, config, self.shared.clone());
        let _ = self.stats.set(interchange.stats());
        let _ = self.drivers.set(drivers);
        *lock(&self.cli) = Some(endpoints.cli);
        *lock(&self.gui) = Some(endpoints.gui);
        *lock(&self.midi_sink) = Some(endpoints.midi);
        *lock(&self.slot) = Some(interchange);
        *lock(&self.clients) = Some(clients);
        tracing::info!(
            instance = self.id,
            audio = %drivers.0,
            midi = %drivers.1,
            "Instance booted"
        );
        Ok(())
    }

    /// WANING: close the clients and drop the engine, then DEFUNCT
    fn shut_down(&self) {
        self.shared.run.store(false, Ordering::Release);
        self.state.set(LifecycleState::Waning);
        if let Some(clients) = lock(&self.clients).take() {
            clients.close();
        }
        lock(&self.midi_sink).take();
        lock(&self.slot).take();
        self.state.set(LifecycleState::Defunct);
        tracing::info!(instance = self.id, "Instance closed");
    }

    /// Report what the audio and MIDI threads could not log themselves
    fn report_dropped(&self) {
        if let Some(stats) = self.stats.get() {
            let (cli, gui) = stats.take_dropped();
            if cli > 0 {
                tracing::warn!(instance = self.id, dropped = cli, "Unable to write to toCLI buffer");
            }
            if gui > 0 {
                tracing::warn!(instance = self.id, dropped = gui, "Unable to write to toGUI buffer");
            }
        }
        let midi = lock(&self.clients)
            .as_ref()
            .map_or(0, |clients| clients.midi.take_dropped());
        if midi > 0 {
            tracing::warn!(instance = self.id, dropped = midi, "Unable to write to fromMIDI buffer");
        }
    }
}

/// Lock, treating a poisoned mutex as still usable
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub struct InstanceManager {
    registry: Mutex<Vec<Arc<Instance>>>,
    config: Config,
    settings: Arc<RuntimeSettings>,
    signals: Arc<InstanceSignals>,
    notifications: NotificationSink,
}

impl InstanceManager {
    pub fn new(config: Config, notifications: NotificationSink) -> Self {
        let settings = Arc::new(RuntimeSettings::from_config(&config));
        Self {
            registry: Mutex::new(Vec::with_capacity(MAX_INSTANCES)),
            config,
            settings,
            signals: Arc::new(InstanceSignals::new()),
            notifications,
        }
    }

    pub fn settings(&self) -> &Arc<RuntimeSettings> {
        &self.settings
    }

    pub fn signals(&self) -> &Arc<InstanceSignals> {
        &self.signals
    }

    pub fn get(&self, id: u32) -> Option<Arc<Instance>> {
        lock(&self.registry).iter().find(|i| i.id == id).cloned()
    }

    pub fn primary(&self) -> Option<Arc<Instance>> {
        self.get(0)
    }

    /// Registered ids, ascending
    pub fn ids(&self) -> Vec<u32> {
        lock(&self.registry).iter().map(|i| i.id).collect()
    }

    pub fn count(&self) -> usize {
        lock(&self.registry).len()
    }

    /// False once the primary's run flag is cleared
    pub fn is_running(&self) -> bool {
        self.primary()
            .is_some_and(|p| p.shared.run.load(Ordering::Acquire))
    }

    /// Register and boot instance 0 on the calling thread
    pub fn boot_primary(&self) -> Result<Arc<Instance>, InstanceError> {
        let primary = {
            let mut registry = lock(&self.registry);
            if let Some(existing) = registry.iter().find(|i| i.id == 0) {
                return Ok(existing.clone());
            }
            let primary = Arc::new(self.make_instance(0));
            registry.insert(0, primary.clone());
            primary
        };
        primary.boot(&self.config, &self.notifications)?;
        Ok(primary)
    }

    fn make_instance(&self, id: u32) -> Instance {
        Instance::new(id, self.signals.clone(), self.settings.clone())
    }

    /// Register a PENDING instance, booted later by the duty cycle.
    ///
    /// `id` is used when free, otherwise the lowest free id is taken.
    pub fn request_new_instance(&self, id: Option<u32>) -> Result<u32, InstanceError> {
        let mut registry = lock(&self.registry);
        if registry.len() >= MAX_INSTANCES {
            drop(registry);
            let e = InstanceError::LimitReached;
            tracing::error!("Can't start instance: {}", e);
            notify(
                &self.notifications,
                Notification::error(NotificationCategory::Instance, e.to_string()),
            );
            return Err(e);
        }
        let taken = |candidate: u32| registry.iter().any(|i| i.id == candidate);
        let chosen = match id {
            Some(wanted) if wanted > 0 && (wanted as usize) < MAX_INSTANCES && !taken(wanted) => {
                wanted
            }
            // non-empty: fewer than MAX_INSTANCES are registered
            _ => (1..MAX_INSTANCES as u32)
                .find(|&candidate| !taken(candidate))
                .ok_or(InstanceError::LimitReached)?,
        };
        let position = registry.partition_point(|i| i.id < chosen);
        registry.insert(position, Arc::new(self.make_instance(chosen)));
        tracing::debug!(instance = chosen, "Instance registered");
        Ok(chosen)
    }

    /// Ask a running instance to stop; the duty cycle closes it
    pub fn request_stop(&self, id: u32) -> Result<(), InstanceError> {
        let instance = self.get(id).ok_or(InstanceError::UnknownId(id))?;
        instance.shared.run.store(false, Ordering::Release);
        Ok(())
    }

    /// Queue every instance of the saved bitset, when auto-instance is on
    pub fn trigger_restore_instances(&self) -> usize {
        if !self.settings.auto_instance() {
            return 0;
        }
        let bits = self.settings.active_instances();
        (1..MAX_INSTANCES as u32)
            .filter(|id| bits & (1 << id) != 0)
            .filter(|&id| self.get(id).is_none())
            .filter(|&id| self.request_new_instance(Some(id)).is_ok())
            .count()
    }

    /// Run `f` for every RUNNING instance, outside the registry lock
    pub fn perform_while_active(&self, mut f: impl FnMut(&Instance)) {
        let active: Vec<Arc<Instance>> = lock(&self.registry)
            .iter()
            .filter(|i| i.is_running())
            .cloned()
            .collect();
        for instance in &active {
            f(instance);
        }
    }

    /// One pass of the coordinating loop.
    ///
    /// Promotes booted instances, pumps running ones, shuts down those whose
    /// run flag cleared, reclaims defunct secondaries, and boots at most one
    /// pending instance.
    pub fn duty_cycle(&self, mut event_pump: impl FnMut(&Instance)) {
        let snapshot: Vec<Arc<Instance>> = lock(&self.registry).clone();

        for instance in &snapshot {
            let running = instance.shared.run.load(Ordering::Acquire);
            match instance.state() {
                LifecycleState::Booting if running => {
                    if instance
                        .state
                        .transition(LifecycleState::Booting, LifecycleState::Running)
                    {
                        self.on_running(instance);
                    }
                }
                LifecycleState::Running if running => {
                    instance.report_dropped();
                    event_pump(instance);
                }
                LifecycleState::Booting | LifecycleState::Running => instance.shut_down(),
                _ => {}
            }
        }

        let lost = self.notifications.take_dropped();
        if lost > 0 {
            tracing::warn!(dropped = lost, "Notification channel full, messages lost");
        }

        self.service_signals();
        self.reclaim_defunct();
        self.boot_next_pending();
    }

    /// Post-boot hook
    fn on_running(&self, instance: &Instance) {
        self.settings
            .set_active_instances(self.settings.active_instances() | 1 << instance.id);
        tracing::info!(instance = instance.id, "Instance running");
        notify(
            &self.notifications,
            Notification::info(
                NotificationCategory::Instance,
                format!("Instance {} running", instance.id),
            )
            .for_instance(instance.id),
        );
    }

    fn service_signals(&self) {
        let (starts, any) = self.signals.take_starts();
        for id in (1..MAX_INSTANCES as u32).filter(|id| starts & (1 << id) != 0) {
            let _ = self.request_new_instance(Some(id));
        }
        for _ in 0..any {
            let _ = self.request_new_instance(None);
        }
        let stops = self.signals.take_stops();
        for id in (1..MAX_INSTANCES as u32).filter(|id| stops & (1 << id) != 0) {
            if self.request_stop(id).is_err() {
                tracing::warn!(instance = id, "Stop request for unknown instance");
            }
        }
    }

    fn reclaim_defunct(&self) {
        let mut registry = lock(&self.registry);
        let mut bits = self.settings.active_instances();
        registry.retain(|i| {
            let reclaim = i.id != 0 && i.state() == LifecycleState::Defunct;
            if reclaim {
                bits &= !(1 << i.id);
            }
            !reclaim
        });
        drop(registry);
        self.settings.set_active_instances(bits);
    }

    fn boot_next_pending(&self) {
        let pending = lock(&self.registry)
            .iter()
            .find(|i| i.state() == LifecycleState::Pending)
            .cloned();
        if let Some(instance) = pending {
            // failure already logged; the entry is reclaimed next cycle
            let _ = instance.boot(&self.config, &self.notifications);
        }
    }

    /// Stop everything and return the config to save
    pub fn perform_shutdown_actions(&self) -> Config {
        let instances: Vec<Arc<Instance>> = lock(&self.registry).clone();
        let running = instances
            .iter()
            .filter(|i| i.state() == LifecycleState::Running)
            .fold(1u32, |bits, i| bits | 1 << i.id);
        self.settings.set_active_instances(running);

        for instance in &instances {
            instance.shared.run.store(false, Ordering::Release);
        }
        for instance in &instances {
            if instance.state() != LifecycleState::Defunct {
                instance.shut_down();
            }
        }

        let mut config = self.config.clone();
        self.settings.store_into(&mut config);
        if let Some(drivers) = self.primary().and_then(|p| p.drivers()) {
            (config.audio_driver, config.midi_driver) = drivers;
        }
        tracing::info!(active = format!("{:#b}", running), "Instances stopped");
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AudioDriver, MidiDriver};
    use crate::messaging::channels::create_notification_channel;
    use crate::messaging::command::CommandBlock;
    use crate::messaging::controls::{main, part, section};
    use std::time::Duration;

    fn manager() -> InstanceManager {
        let config = Config {
            audio_driver: AudioDriver::None,
            midi_driver: MidiDriver::None,
            buffer_size: 64,
            ..Config::default()
        };
        let (tx, _rx) = create_notification_channel(64);
        InstanceManager::new(config, NotificationSink::new(tx))
    }

    #[test]
    fn test_primary_boots_then_runs() {
        let manager = manager();
        let primary = manager.boot_primary().unwrap();
        assert_eq!(primary.state(), LifecycleState::Booting);
        assert_eq!(primary.drivers(), Some((AudioDriver::None, MidiDriver::None)));

        manager.duty_cycle(|_| {});
        assert_eq!(primary.state(), LifecycleState::Running);
        assert!(manager.is_running());

        let mut pumped = Vec::new();
        manager.duty_cycle(|instance| pumped.push(instance.id()));
        assert_eq!(pumped, vec![0]);
    }

    #[test]
    fn test_lowest_free_id() {
        let manager = manager();
        manager.boot_primary().unwrap();
        assert_eq!(manager.request_new_instance(Some(5)), Ok(5));
        assert_eq!(manager.request_new_instance(None), Ok(1));
        // taken id falls back to the lowest free one
        assert_eq!(manager.request_new_instance(Some(5)), Ok(2));
        assert_eq!(manager.ids(), vec![0, 1, 2, 5]);
    }

    #[test]
    fn test_one_boot_per_cycle() {
        let manager = manager();
        manager.boot_primary().unwrap();
        manager.request_new_instance(None).unwrap();
        manager.request_new_instance(None).unwrap();

        manager.duty_cycle(|_| {});
        let states: Vec<_> = [1, 2].iter().map(|&id| manager.get(id).unwrap().state()).collect();
        assert_eq!(states, vec![LifecycleState::Booting, LifecycleState::Pending]);
    }

    #[test]
    fn test_stop_reclaims_secondary() {
        let manager = manager();
        manager.boot_primary().unwrap();
        let id = manager.request_new_instance(None).unwrap();
        manager.duty_cycle(|_| {}); // boot
        manager.duty_cycle(|_| {}); // running
        assert!(manager.get(id).unwrap().is_running());
        assert_eq!(manager.settings().active_instances(), 0b11);

        manager.request_stop(id).unwrap();
        manager.duty_cycle(|_| {});
        assert!(manager.get(id).is_none());
        assert_eq!(manager.settings().active_instances(), 0b1);
        assert_eq!(manager.request_stop(9), Err(InstanceError::UnknownId(9)));
    }

    #[test]
    fn test_start_instance_control() {
        let manager = manager();
        let primary = manager.boot_primary().unwrap();
        manager.duty_cycle(|_| {});

        primary
            .with_cli(|cli| cli.send(CommandBlock::write(main::START_INSTANCE, section::MAIN, 4.0)))
            .unwrap()
            .unwrap();
        primary.with_cli(|cli| cli.wait_reply(Duration::from_secs(2))).unwrap().unwrap();

        manager.duty_cycle(|_| {});
        assert_eq!(manager.get(4).map(|i| i.state()), Some(LifecycleState::Booting));
    }

    #[test]
    fn test_restore_needs_auto_instance() {
        let manager = manager();
        manager.boot_primary().unwrap();
        manager.settings().set_active_instances(0b1010_0001);
        assert_eq!(manager.trigger_restore_instances(), 0);

        manager
            .settings()
            .apply(crate::messaging::controls::config::ENABLE_AUTO_INSTANCE, 1.0);
        assert_eq!(manager.trigger_restore_instances(), 2);
        assert_eq!(manager.ids(), vec![0, 5, 7]);
    }

    #[test]
    fn test_shutdown_stores_active_instances() {
        let manager = manager();
        let primary = manager.boot_primary().unwrap();
        manager.request_new_instance(Some(3)).unwrap();
        manager.duty_cycle(|_| {});
        manager.duty_cycle(|_| {});
        primary
            .with_cli(|cli| cli.send(CommandBlock::write(part::VOLUME, 0, 10.0)))
            .unwrap()
            .unwrap();

        let config = manager.perform_shutdown_actions();
        assert_eq!(config.active_instances, 0b1001);
        assert_eq!(primary.state(), LifecycleState::Defunct);
        assert!(!manager.is_running());
    }
}

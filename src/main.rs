use clap::{Parser, ValueEnum};
use rtsynth::messaging::channels::{NotificationSink, create_notification_channel};
use rtsynth::{AudioDriver, Config, ControlContext, InstanceManager, MidiDriver};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const NOTIFICATION_RINGBUFFER_CAPACITY: usize = 256;
const DUTY_CYCLE_PERIOD: Duration = Duration::from_millis(33);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Driver {
    Jack,
    Alsa,
    None,
}

#[derive(Debug, Parser)]
#[command(name = "rtsynth", version, about = "Real-time polyphonic software synthesizer")]
struct Args {
    /// Audio driver tried first
    #[arg(long, value_enum)]
    audio: Option<Driver>,

    /// MIDI driver tried first
    #[arg(long, value_enum)]
    midi: Option<Driver>,

    #[arg(long)]
    sample_rate: Option<u32>,

    #[arg(long)]
    buffer_size: Option<usize>,

    /// Extra instances to start after the primary one
    #[arg(long, default_value_t = 0)]
    instances: usize,

    /// Config file (default: <config dir>/rtsynth/config.ron)
    #[arg(long)]
    config: Option<PathBuf>,

    /// No command line interface; run until interrupted
    #[arg(long)]
    no_cli: bool,
}

impl Args {
    /// Command line values win over the file
    fn apply(&self, config: &mut Config) {
        if let Some(driver) = self.audio {
            config.audio_driver = match driver {
                Driver::Jack => AudioDriver::Jack,
                Driver::Alsa => AudioDriver::Alsa,
                Driver::None => AudioDriver::None,
            };
        }
        if let Some(driver) = self.midi {
            config.midi_driver = match driver {
                Driver::Jack => MidiDriver::Jack,
                Driver::Alsa => MidiDriver::Alsa,
                Driver::None => MidiDriver::None,
            };
        }
        if let Some(rate) = self.sample_rate {
            config.sample_rate = rate;
        }
        if let Some(size) = self.buffer_size {
            config.buffer_size = size;
        }
        if self.no_cli {
            config.enable_cli = false;
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let path = args.config.clone().unwrap_or_else(Config::default_path);
    let loaded = Config::load_or_default(&path);
    let mut config = loaded.clone();
    args.apply(&mut config);
    let config = config.sanitized();
    let enable_cli = config.enable_cli;

    let (notification_tx, notification_rx) =
        create_notification_channel(NOTIFICATION_RINGBUFFER_CAPACITY);
    let manager = Arc::new(InstanceManager::new(config, NotificationSink::new(notification_tx)));

    let primary = match manager.boot_primary() {
        Ok(primary) => primary,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let run = primary.run_flag();
    if let Err(e) = ctrlc::set_handler(move || run.store(false, Ordering::Release)) {
        tracing::warn!("Ctrl-C handler not installed: {}", e);
    }

    for _ in 0..args.instances {
        if manager.request_new_instance(None).is_err() {
            break;
        }
    }
    manager.trigger_restore_instances();

    if enable_cli {
        let manager = manager.clone();
        let run = primary.run_flag();
        // stdin blocks: the thread is left behind at exit
        let spawned = thread::Builder::new()
            .name("rtsynth-cli".to_string())
            .spawn(move || {
                let mut context = ControlContext::new(manager).with_notifications(notification_rx);
                if let Err(e) = context.run(std::io::stdin().lock(), std::io::stdout()) {
                    tracing::error!("CLI: {}", e);
                }
                run.store(false, Ordering::Release);
            });
        if let Err(e) = spawned {
            tracing::error!("CLI thread not started: {}", e);
        }
    }

    // Duty cycle: GUI replies have no reader here, drop them
    while manager.is_running() {
        manager.duty_cycle(|instance| {
            instance.with_gui(|gui| while gui.try_reply().is_some() {});
        });
        thread::sleep(DUTY_CYCLE_PERIOD);
    }

    let config = manager.perform_shutdown_actions();
    if manager.settings().is_changed() || config.active_instances != loaded.active_instances {
        match config.save(&path) {
            Ok(()) => tracing::info!("Config saved to {}", path.display()),
            Err(e) => tracing::error!("Config not saved: {}", e),
        }
    }
}

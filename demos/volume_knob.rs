use dialup::mixer::{Pactl, VolumeKnob};
use dialup::{Config, Manager, RawEvent};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "dialup=info".into()),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path).expect("load config"),
        None => Config::default(),
    };

    let mut knob = VolumeKnob::new(Pactl::default());
    let mut manager = Manager::discover(&config).expect("open device");

    // Show the starting volume on the ring.
    match knob.current_led() {
        Ok(Some(led)) => {
            if let Err(e) = manager.writer().write(&RawEvent::from(led)) {
                eprintln!("cannot set LED: {e}");
            }
        }
        Ok(None) => println!("no running sink yet"),
        Err(e) => eprintln!("{e}"),
    }

    manager.add_gesture_handler(knob).expect("start listener");
    if let Err(e) = manager.run() {
        eprintln!("stopped: {e}");
        std::process::exit(1);
    }
}

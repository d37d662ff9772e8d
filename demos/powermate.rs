use dialup::{Config, EventLogger, GestureHandler, LedCommand, Manager, Response};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Short press toggles pulsing, rotation sets a steady brightness.
struct Example {
    pulsing: bool,
    brightness: u8,
}

impl GestureHandler for Example {
    fn short_press(&mut self) -> Response {
        self.pulsing = !self.pulsing;
        println!("Short press! pulsing={}", self.pulsing);
        let led = if self.pulsing {
            LedCommand::pulse()
        } else {
            LedCommand::brightness(self.brightness)
        };
        Ok(Some(led.into()))
    }

    fn long_press(&mut self) -> Response {
        println!("Long press!");
        Ok(None)
    }

    fn rotate(&mut self, delta: i32) -> Response {
        println!("Rotate {delta}!");
        self.brightness = (i32::from(self.brightness) + delta).clamp(0, 255) as u8;
        self.pulsing = false;
        Ok(Some(LedCommand::brightness(self.brightness).into()))
    }

    fn push_rotate(&mut self, delta: i32) -> Response {
        println!("Push rotate {delta}!");
        Ok(None)
    }
}

/// Takes a second per rotation; its queue fills and it skips input while it catches up.
struct Sluggish;

impl GestureHandler for Sluggish {
    fn rotate(&mut self, delta: i32) -> Response {
        std::thread::sleep(Duration::from_secs(1));
        println!("(sluggish) rotate {delta}");
        Ok(None)
    }
}

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

    let mut manager = Manager::discover(&config).expect("open device");
    manager
        .add_gesture_handler(Example {
            pulsing: false,
            brightness: LedCommand::max().brightness,
        })
        .expect("start listener");
    manager.add_gesture_handler(Sluggish).expect("start listener");
    manager.add_listener(EventLogger::new()).expect("start listener");

    if let Err(e) = manager.run() {
        eprintln!("stopped: {e}");
        std::process::exit(1);
    }
}

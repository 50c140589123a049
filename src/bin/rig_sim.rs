//! Controller device simulator.
//!
//! Runs the same pin sampling and gesture detection the firmware runs,
//! fed by a scripted button sequence and a synthetic skin-response
//! waveform, and emits the resulting wire lines to stdout or a serial
//! port. Useful for exercising the host without hardware attached.

use affectrig::input::{
    AnalogReader, Clock, FakeClock, GestureEngine, GestureTiming, InputSampler, PinId, PinReader,
};
use affectrig::transport::{encode_line, DeviceLine};
use affectrig::{DeviceEvent, RigConfig};
use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rig-sim")]
#[command(about = "Simulates the handheld controller device on stdout or a serial port")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "affectrig.toml")]
    config: String,

    /// Serial port to write to instead of stdout
    #[arg(short, long)]
    port: Option<String>,

    /// Emit ticks at wall-clock speed instead of as fast as possible
    #[arg(long)]
    real_time: bool,

    /// Seconds of recording to simulate between toggle presses
    #[arg(long, default_value_t = 5)]
    recording_secs: u64,
}

/// A pin whose level is flipped by the script
struct ScriptedPin(Arc<AtomicBool>);

impl PinReader for ScriptedPin {
    fn level(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Slow triangle wave over the plausible skin-response range
struct SyntheticGsr {
    value: u16,
    rising: bool,
}

impl SyntheticGsr {
    fn new() -> Self {
        Self {
            value: 20_000,
            rising: true,
        }
    }
}

impl AnalogReader for SyntheticGsr {
    fn read(&mut self) -> std::result::Result<u16, String> {
        if self.rising {
            self.value = self.value.saturating_add(137);
            if self.value > 45_000 {
                self.rising = false;
            }
        } else {
            self.value = self.value.saturating_sub(137);
            if self.value < 15_000 {
                self.rising = true;
            }
        }
        Ok(self.value)
    }
}

/// One scripted level change: at `at_ms`, drive `pin` to pressed or
/// released (levels are pull-up, pressed is low)
struct Step {
    at_ms: u64,
    pin: PinId,
    pressed: bool,
}

fn build_script(args: &Args, config: &RigConfig) -> Vec<Step> {
    let press_ms = 80;
    let rec = args.recording_secs * 1000;
    let long_press_ms = (config.input.long_press_secs * 1000.0) as u64 + 200;
    let mut script = Vec::new();
    let mut t = 1000;

    let tap = |script: &mut Vec<Step>, t: u64, pin: PinId| {
        script.push(Step {
            at_ms: t,
            pin,
            pressed: true,
        });
        script.push(Step {
            at_ms: t + press_ms,
            pin,
            pressed: false,
        });
    };

    // Start recording, move around the affect grid, drop a marker,
    // stop recording, then hold both end buttons for the long press
    tap(&mut script, t, PinId::RecordToggle);
    t += 1000;
    tap(&mut script, t, PinId::Up);
    t += 500;
    tap(&mut script, t, PinId::Up);
    t += 500;
    tap(&mut script, t, PinId::Right);
    t += rec / 2;
    tap(&mut script, t, PinId::Marker);
    t += rec / 2;
    tap(&mut script, t, PinId::Down);
    t += 500;
    tap(&mut script, t, PinId::RecordToggle);
    t += 1000;

    for pin in [PinId::Marker, PinId::RecordToggle] {
        script.push(Step {
            at_ms: t,
            pin,
            pressed: true,
        });
        script.push(Step {
            at_ms: t + long_press_ms,
            pin,
            pressed: false,
        });
    }

    script.sort_by_key(|s| s.at_ms);
    script
}

enum Sink {
    Stdout(std::io::Stdout),
    Serial(Box<dyn serialport::SerialPort>),
}

impl Sink {
    fn emit(&mut self, line: &str) -> Result<()> {
        match self {
            Sink::Stdout(out) => {
                out.write_all(line.as_bytes())?;
                out.write_all(b"\n")?;
                out.flush()?;
            }
            Sink::Serial(port) => {
                port.write_all(line.as_bytes())?;
                port.write_all(b"\n")?;
            }
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rig_sim=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = RigConfig::load_from_file(&args.config).context("loading configuration")?;

    let mut sink = match &args.port {
        Some(port) => {
            info!("Writing to serial port {}", port);
            Sink::Serial(
                serialport::new(port, config.serial.baud_rate)
                    .timeout(Duration::from_millis(config.serial.read_timeout_ms))
                    .open()
                    .with_context(|| format!("opening serial port {}", port))?,
            )
        }
        None => Sink::Stdout(std::io::stdout()),
    };

    // Shared levels the script flips and the sampler reads
    let mut levels: HashMap<PinId, Arc<AtomicBool>> = HashMap::new();
    let mut pins: Vec<(PinId, Box<dyn PinReader>)> = Vec::new();
    for pin in PinId::ALL {
        let level = Arc::new(AtomicBool::new(true));
        levels.insert(pin, Arc::clone(&level));
        pins.push((pin, Box::new(ScriptedPin(level)) as Box<dyn PinReader>));
    }

    let mut sampler = InputSampler::new(
        pins,
        Some(Box::new(SyntheticGsr::new())),
        Duration::from_millis(config.input.sensor_interval_ms),
    );
    let mut engine = GestureEngine::new(GestureTiming {
        debounce: Duration::from_millis(config.input.debounce_ms),
        long_press: Duration::from_secs_f64(config.input.long_press_secs),
    });

    let clock = FakeClock::new();
    let tick = Duration::from_millis(config.input.pin_tick_ms);
    let script = build_script(&args, &config);
    let end_ms = script.last().map(|s| s.at_ms).unwrap_or(0) + 1000;
    let mut next_step = 0;

    info!(
        "Simulating {} scripted pin changes over {:.1}s",
        script.len(),
        end_ms as f64 / 1000.0
    );

    loop {
        let now = clock.now();
        if now >= Duration::from_millis(end_ms) {
            break;
        }

        while next_step < script.len() && Duration::from_millis(script[next_step].at_ms) <= now {
            let step = &script[next_step];
            levels[&step.pin].store(!step.pressed, Ordering::Relaxed);
            next_step += 1;
        }

        let samples = sampler.scan_pins(now);
        for event in engine.update(&samples, now) {
            let line = match event {
                DeviceEvent::Edge { button, pressed } => DeviceLine::Edge { button, pressed },
                DeviceEvent::RecordToggle => DeviceLine::RecordToggle,
                DeviceEvent::SessionEnd => DeviceLine::SessionEnd,
            };
            sink.emit(&encode_line(&line))?;
        }

        if let Some(sample) = sampler.poll_sensor(now) {
            sink.emit(&encode_line(&DeviceLine::Sensor(sample.raw_value)))?;
        }

        clock.advance(tick);
        if args.real_time {
            std::thread::sleep(tick);
        }
    }

    info!("Script complete");
    Ok(())
}

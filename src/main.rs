mod config;
mod font;
mod genlock;
mod matrix;
mod present;
mod source;
mod types;

use std::error::Error;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use clap::Parser;
use pixels::{SurfaceTexture, Pixels};
use winit::event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent};
use winit::event_loop::ControlFlow;
use winit::{event_loop::EventLoop, window::WindowBuilder, dpi::PhysicalSize};
use crate::config::Args;
use crate::genlock::*;
use crate::matrix::{LedMatrix, MATRIX_HEIGHT, MATRIX_WIDTH};
use crate::source::{FormatPin, SyncGenerator, SyncSettings};

/// How much one key press changes the LED brightness.
const BRIGHTNESS_STEP: u8 = 16;

/// The emulated device: the sync source feeding the capture path, and the foreground loop
/// measuring it and drawing the matrix.
struct Device {
    clock: Arc<MonotonicClock>,
    generator: SyncGenerator,
    format_pin: FormatPin,
    monitor: Monitor<FormatPin>,
    matrix: LedMatrix,
}

impl Device {
    fn new(args: &Args) -> Result<Self, Box<dyn Error>> {
        let tunables = args.tunables();
        let clock = Arc::new(MonotonicClock::new());
        let accumulator = Arc::new(SharedAccumulator::new(tunables.min_valid_period_us));
        let format_pin = FormatPin::new(args.bi_level);

        let settings = SyncSettings {
            frame_rate: args.frame_rate,
            jitter_us: args.jitter_us,
            glitch_rate: args.glitch_rate,
        };
        let capture = EdgeCapture::new(clock.clone(), accumulator.clone());
        let generator = SyncGenerator::spawn(capture, settings, !args.no_signal)?;

        let monitor = Monitor::new(
            Aggregator::new(accumulator),
            format_pin.clone(),
            &tunables,
            clock.now_us(),
        );

        Ok(Self {
            clock,
            generator,
            format_pin,
            monitor,
            matrix: LedMatrix::new(args.brightness),
        })
    }

    /// Run whatever is due and return how long until the next deadline.
    fn poll(&mut self) -> Duration {
        let next = self.monitor.poll(self.clock.now_us(), &mut self.matrix);
        Duration::from_micros(next.saturating_sub(self.clock.now_us()))
    }

    /// Window title summarising the last measurement window.
    fn title(&self) -> String {
        let jitter_ppm = self.monitor.last_report().map_or(0.0, |report| report.stats.jitter_ppm);
        format!(
            "Genlock Whisker - {} {:.3} fps, {:.1} ppm",
            self.monitor.state(),
            self.monitor.fps(),
            jitter_ppm,
        )
    }

    fn handle_key(&mut self, key: VirtualKeyCode) {
        match key {
            VirtualKeyCode::Space => {
                let connected = self.generator.toggle_connected();
                log::info!("sync signal {}", if connected { "connected" } else { "disconnected" });
            }
            VirtualKeyCode::F => {
                let format = SyncFormat::from_level(self.format_pin.toggle());
                log::info!("format-detect pin now reports {format:?}");
            }
            VirtualKeyCode::Up => {
                self.matrix.set_brightness(self.matrix.brightness().saturating_add(BRIGHTNESS_STEP));
                log::debug!("brightness {}", self.matrix.brightness());
            }
            VirtualKeyCode::Down => {
                self.matrix.set_brightness(self.matrix.brightness().saturating_sub(BRIGHTNESS_STEP));
                log::debug!("brightness {}", self.matrix.brightness());
            }
            _ => {}
        }
    }
}

/// Run the foreground loop with no window; only the diagnostic log is visible.
fn run_headless(mut device: Device) -> ! {
    loop {
        let wait = device.poll();
        thread::sleep(wait);
    }
}

/// Genlock whisker emulator.
fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging. Diagnostic lines are logged at info, so show those by default.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut device = Device::new(&args)?;

    if args.headless {
        run_headless(device);
    }

    // Create event loop.
    let event_loop = EventLoop::new();

    // Create window.
    let scale = args.scale;
    let window = {
        let size = PhysicalSize::new(MATRIX_WIDTH * scale, MATRIX_HEIGHT * scale);

        WindowBuilder::new()
            .with_title("Genlock Whisker")
            .with_inner_size(size)
            .with_min_inner_size(size)
            .build(&event_loop)?
    };
    window.set_resizable(false);

    // Create pixel buffer, one LED per `scale` x `scale` block.
    let mut pixels = {
        let window_size = window.inner_size();
        let surface_texture = SurfaceTexture::new(window_size.width, window_size.height, &window);
        Pixels::new(MATRIX_WIDTH * scale, MATRIX_HEIGHT * scale, surface_texture)?
    };

    log::info!("space: plug/unplug sync, f: toggle format, up/down: brightness, esc: quit");
    let mut title = String::new();

    event_loop.run(move |event, _, control_flow| {
        match event {
            Event::WindowEvent { event: WindowEvent::CloseRequested, .. } => {
                *control_flow = ControlFlow::Exit;
            }
            Event::WindowEvent {
                event: WindowEvent::KeyboardInput {
                    input: KeyboardInput {
                        state: ElementState::Pressed,
                        virtual_keycode: Some(key),
                        ..
                    },
                    ..
                },
                ..
            } => {
                if key == VirtualKeyCode::Escape {
                    *control_flow = ControlFlow::Exit;
                } else {
                    device.handle_key(key);
                }
            }
            Event::RedrawRequested(_) => {
                device.matrix.blit(pixels.get_frame_mut(), scale);
                if let Err(err) = pixels.render() {
                    log::error!("failed to render pixel buffer to screen: {err}");
                    *control_flow = ControlFlow::Exit;
                }
            }
            Event::MainEventsCleared => {
                let wait = device.poll();
                let current = device.title();
                if current != title {
                    window.set_title(&current);
                    title = current;
                }
                window.request_redraw();
                if *control_flow != ControlFlow::Exit {
                    *control_flow = ControlFlow::WaitUntil(std::time::Instant::now() + wait);
                }
            }
            _ => {}
        }
    });
}

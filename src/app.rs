use std::mem;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use motormap_experiment::{
    FrameEvents, JsonLinesSink, ScreenLayout, Session, SessionError, SessionEvent, TaskConfig,
};
use motormap_input::PointerSource;
use motormap_render::{load_font, SkiaRenderer};
use motormap_timing::{CalibrationStats, HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::ThreadRng;
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

use crate::gamepad::TaskInput;

type TaskSession = Session<HighPrecisionTimer, TaskInput, JsonLinesSink, ThreadRng>;

/// Frames rendered before the display timing is reported.
const CALIBRATION_FRAMES: usize = 120;
const SLOW_RENDER: Duration = Duration::from_millis(8);

pub struct App {
    config: TaskConfig,
    timer: HighPrecisionTimer,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    session: Option<TaskSession>,
    pending: FrameEvents,
    calibration_logged: bool,
    exiting: bool,
    result: Result<()>,
}

fn log_timing(label: &str, stats: &CalibrationStats) {
    info!(
        "{label}: {} frames, mean {:.3} ms, jitter {:.3} ms, range {:.3}-{:.3} ms, {:.1} fps",
        stats.frame_count,
        stats.average_frame_time_ns / 1e6,
        stats.jitter_ns / 1e6,
        stats.min_frame_time_ns / 1e6,
        stats.max_frame_time_ns / 1e6,
        stats.effective_fps
    );
}

impl App {
    pub fn new(config: TaskConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            timer: HighPrecisionTimer::new(),
            window: None,
            pixels: None,
            renderer: None,
            session: None,
            pending: FrameEvents::default(),
            calibration_logged: false,
            exiting: false,
            result: Ok(()),
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!(
            "participant {} on {} ({}), ESC quits",
            self.config.participant_id,
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        event_loop.run_app(&mut self)?;
        mem::replace(&mut self.result, Ok(()))
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .context("no monitor available")?;
        if let Some(rate) = monitor.refresh_rate_millihertz() {
            info!("refresh rate {:.1} Hz", rate as f64 / 1000.0);
        }

        let window_attributes = Window::default_attributes()
            .with_title("Motor Mapping")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))))
            .with_resizable(false);
        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let size = window.inner_size();
        info!(
            "display {}x{} at scale {:.2}",
            size.width,
            size.height,
            window.scale_factor()
        );

        let surface_texture = SurfaceTexture::new(size.width, size.height, window.clone());
        let pixels = Pixels::new(size.width, size.height, surface_texture)?;

        let layout = ScreenLayout::new(&self.config, size.width, size.height)?;
        let font = self
            .config
            .font_path
            .as_deref()
            .map(load_font)
            .transpose()?;
        let text_px = self.config.deg_to_px(self.config.text_size_deg) as f32;
        let renderer = SkiaRenderer::new(size.width, size.height, font, text_px)?;

        let input = TaskInput::detect(
            PointerSource::new(layout.center_f64(), layout.target_dist_max)
                .with_click_guard(self.config.click_guard_ms),
        );
        let sink = JsonLinesSink::create(&self.config.output_dir)?;
        info!("writing results to {}", sink.dir().display());
        let session = Session::new(
            self.config.clone(),
            layout,
            self.timer.clone(),
            input,
            sink,
            rand::rng(),
        )?;

        window.set_cursor_visible(false);
        window.request_redraw();

        self.window = Some(window);
        self.pixels = Some(pixels);
        self.renderer = Some(renderer);
        self.session = Some(session);
        Ok(())
    }

    /// One display refresh. Returns `false` once the session is over.
    fn frame(&mut self) -> Result<bool> {
        let (Some(session), Some(pixels), Some(renderer)) = (
            self.session.as_mut(),
            self.pixels.as_mut(),
            self.renderer.as_mut(),
        ) else {
            return Ok(true);
        };

        let mut input = mem::take(&mut self.pending);
        if session.source_mut().take_button_press() {
            input.any_input = true;
        }
        let output = session.frame(&input)?;
        let stats = renderer.render(&output.scene, pixels.frame_mut(), &mut self.timer)?;
        if stats.total > SLOW_RENDER {
            debug!(
                "slow render: clear {:?}, draw {:?}, copy {:?}",
                stats.clear, stats.draw, stats.copy
            );
        }
        pixels.render()?;
        let presented_ns = session.timer().now();
        session.presented(presented_ns)?;

        for event in &output.events {
            match event {
                // a real stick recentres by itself
                SessionEvent::TrialStarted { .. } if session.source_mut().pointer_mut().is_some() => {
                    let (x, y) = session.layout().center;
                    if let Some(window) = &self.window {
                        if let Err(e) = window.set_cursor_position(PhysicalPosition::new(x, y)) {
                            warn!("cannot warp pointer to centre: {e}");
                        }
                    }
                }
                SessionEvent::BlockStarted { block_num, phase } => {
                    debug!("showing block {block_num} ({phase:?}) instructions")
                }
                _ => {}
            }
        }

        if !self.calibration_logged {
            let stats = self.timer.calibration_stats();
            if stats.frame_count >= CALIBRATION_FRAMES {
                log_timing("render timing", &stats);
                self.calibration_logged = true;
            }
        }
        Ok(!session.is_finished())
    }

    fn pointer_mut(&mut self) -> Option<&mut PointerSource> {
        self.session.as_mut()?.source_mut().pointer_mut()
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        match self.frame() {
            Ok(true) => {
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            Ok(false) => self.exit(event_loop, Ok(())),
            Err(e) => self.exit(event_loop, Err(e)),
        }
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(size.width, size.height) {
                warn!("failed to resize surface: {e}");
            }
        }
        warn!(
            "display resized to {}x{}, task layout unchanged",
            size.width, size.height
        );
    }

    fn exit(&mut self, event_loop: &ActiveEventLoop, result: Result<()>) {
        self.exiting = true;
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        log_timing("render timing", &self.timer.calibration_stats());
        if let Some(session) = &self.session {
            let summary = session.summary();
            info!(
                "{} trials written, {} responses, {} errors, {} timeouts",
                summary.trials, summary.responded, summary.errors, summary.timed_out
            );
        }
        match &result {
            Ok(()) => info!("session complete"),
            Err(e) => match e.downcast_ref::<SessionError>() {
                Some(SessionError::Aborted) => warn!("session aborted, running trial discarded"),
                _ => error!("{e:#}"),
            },
        }
        self.result = result;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() && !self.exiting {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                self.exit(event_loop, Err(e));
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if self.exiting {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                self.pending.quit = true;
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    self.pending.quit = true;
                } else {
                    self.pending.any_input = true;
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    if let Some(pointer) = self.pointer_mut() {
                        pointer.set_pressed(state.is_pressed());
                    }
                }
                if state == ElementState::Pressed {
                    self.pending.any_input = true;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(pointer) = self.pointer_mut() {
                    pointer.set_position(position.x, position.y);
                }
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            _ => {}
        }
    }
}

/// Terminal front end: a spinning mesh drawn through fixed-point matrices
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self},
};
use fxgu_core::{sprintf, Camera, FormatError, Mtx, RotationState, SineTable, Transform};
use std::io::{self, stdout, Write};
use std::time::{Duration, Instant};

pub mod mesh;
pub mod renderer;

pub use mesh::Mesh;
pub use renderer::AsciiRenderer;

/// Rotation applied per key press, 1/64 of a turn
const KEY_STEP: i16 = 0x400;

/// Main application struct for terminal 3D rendering
pub struct TerminalApp {
    mesh: Mesh,
    rotation: RotationState,
    camera: Camera,
    renderer: AsciiRenderer,
    trig: &'static SineTable,
    persp_norm: Option<u16>,
    max_frames: u32,
    running: bool,
    last_frame: Instant,
    frame_count: u32,
    fps: f32,
}

impl TerminalApp {
    /// `camera` supplies everything but the aspect ratio, which follows the
    /// terminal. `max_frames == 0` runs until the user quits.
    pub fn new(mesh: Mesh, mut camera: Camera, max_frames: u32) -> io::Result<Self> {
        let (width, height) = terminal::size()?;
        // Terminal cells are about twice as tall as they are wide
        camera.aspect = width as f32 / (2.0 * height.max(1) as f32);

        Ok(Self {
            mesh,
            rotation: RotationState::new(0x0800, 0x0800, 0),
            camera,
            renderer: AsciiRenderer::new(width as usize, height as usize),
            trig: SineTable::shared(),
            persp_norm: None,
            max_frames,
            running: true,
            last_frame: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        })
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;

        let result = self.main_loop();

        // Cleanup
        terminal::disable_raw_mode()?;
        execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    fn main_loop(&mut self) -> io::Result<()> {
        let target_frame_time = Duration::from_millis(1000 / 30); // 30 FPS target
        let mut frames = 0u32;

        while self.running {
            let frame_start = Instant::now();

            if event::poll(Duration::from_millis(0))? {
                self.handle_input()?;
            }

            self.update();
            self.render()?;

            frames += 1;
            if self.max_frames != 0 && frames >= self.max_frames {
                log::info!("stopping after {frames} frames");
                self.running = false;
            }

            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }

            let now = Instant::now();
            if (now - self.last_frame).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_frame).as_secs_f32();
                self.frame_count = 0;
                self.last_frame = now;
            }
        }

        Ok(())
    }

    fn handle_input(&mut self) -> io::Result<()> {
        if let Event::Key(KeyEvent { code, .. }) = event::read()? {
            match code {
                KeyCode::Char('q') | KeyCode::Esc => self.running = false,
                KeyCode::Char('w') | KeyCode::Up => self.rotation.rotate(KEY_STEP, 0, 0),
                KeyCode::Char('s') | KeyCode::Down => self.rotation.rotate(-KEY_STEP, 0, 0),
                KeyCode::Char('a') | KeyCode::Left => self.rotation.rotate(0, -KEY_STEP, 0),
                KeyCode::Char('d') | KeyCode::Right => self.rotation.rotate(0, KEY_STEP, 0),
                KeyCode::Char('e') => self.rotation.rotate(0, 0, KEY_STEP),
                KeyCode::Char('r') => self.rotation.rotate(0, 0, -KEY_STEP),
                _ => {}
            }
        }
        Ok(())
    }

    fn update(&mut self) {
        // Continuous slow rotation for demo effect
        self.rotation.rotate(0x40, 0x60, 0);
    }

    fn render(&mut self) -> io::Result<()> {
        let model = Transform::rotation(self.trig, &self.rotation);
        let mut view = Mtx::ZERO;
        let mut projection = Mtx::ZERO;
        self.camera.view_matrix(&mut view);
        self.persp_norm = self.camera.projection_matrix(self.trig, &mut projection);

        let model_view = model.concat(&view);
        let mvp = model_view.concat(&projection);

        self.renderer.clear();
        self.renderer
            .render_mesh(&self.mesh, &model_view, &mvp, &self.camera);

        let mut stdout = stdout();
        queue!(stdout, cursor::MoveTo(0, 0))?;
        self.renderer.draw(&mut stdout)?;

        let mut line = [0u8; 160];
        let status = hud_line(&mut line, self.fps, self.persp_norm, &self.rotation)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            SetForegroundColor(Color::Yellow),
            Print(status),
            ResetColor
        )?;

        stdout.flush()?;
        Ok(())
    }
}

/// Format the status line into `buffer`; text that does not fit is cut off
pub fn hud_line<'b>(
    buffer: &'b mut [u8],
    fps: f32,
    persp_norm: Option<u16>,
    rotation: &RotationState,
) -> Result<&'b str, FormatError> {
    let result = match persp_norm {
        Some(norm) => sprintf!(
            buffer,
            "fxgu | FPS %5.1f | persp norm %04X | rot %04X %04X %04X | WASD/Arrows=Rotate E/R=Roll Q=Quit",
            fps,
            norm,
            rotation.x,
            rotation.y,
            rotation.z
        ),
        None => sprintf!(
            buffer,
            "fxgu | FPS %5.1f | %s | rot %04X %04X %04X | WASD/Arrows=Rotate E/R=Roll Q=Quit",
            fps,
            "ortho",
            rotation.x,
            rotation.y,
            rotation.z
        ),
    };
    let len = match result {
        Ok(len) => len,
        Err(FormatError::Overflow { capacity, .. }) => capacity.saturating_sub(1),
        Err(e) => return Err(e),
    };
    // Only ASCII is ever written
    Ok(std::str::from_utf8(&buffer[..len]).unwrap_or_default())
}

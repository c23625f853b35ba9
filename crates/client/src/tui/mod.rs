mod form;
mod screens;

use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, Event, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use cubesync::SessionBackend;

use crate::app::App;

pub use form::{ConnectForm, FormAction};

const FRAME_TIME: Duration = Duration::from_millis(16);

pub struct Tui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    keyboard_enhanced: bool,
}

impl Tui {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

        // Release events make held keys exact; without them input falls back
        // to press repeats.
        let keyboard_enhanced = terminal::supports_keyboard_enhancement().unwrap_or(false)
            && execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .is_ok();
        log::debug!("Keyboard release reporting: {}", keyboard_enhanced);

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            keyboard_enhanced,
        })
    }

    pub fn run<B: SessionBackend>(&mut self, app: &mut App<B>) -> io::Result<()> {
        app.scene_mut()
            .input_mut()
            .set_reports_release(self.keyboard_enhanced);

        let mut last_frame = Instant::now();

        while !app.should_quit() {
            self.terminal.draw(|frame| screens::render(frame, &*app))?;

            let timeout = FRAME_TIME.saturating_sub(last_frame.elapsed());
            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    app.handle_key(key, Instant::now());
                }
            }

            let now = Instant::now();
            let delta = now.duration_since(last_frame).as_secs_f32();
            if delta >= FRAME_TIME.as_secs_f32() {
                app.update(delta, now);
                last_frame = now;
            }
        }

        Ok(())
    }

    pub fn restore_terminal(&mut self) -> io::Result<()> {
        if self.keyboard_enhanced {
            execute!(self.terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
            self.keyboard_enhanced = false;
        }
        terminal::disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            cursor::Show
        )?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = self.restore_terminal();
    }
}

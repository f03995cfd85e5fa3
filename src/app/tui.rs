// app/tui.rs
// Terminal User Interface logic and state

use crate::db::connection::DbKind;
use ratatui::prelude::*;
use ratatui::widgets::*;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use std::io;
pub use super::tui_export::tui_export_flow;

#[derive(Debug, Clone, PartialEq)]
pub enum TuiStep {
    Welcome,
    ChooseDbType,
    EnterHost,
    EnterPort,
    EnterDbName,
    EnterUsername,
    EnterPassword,
    EnterSchema,
    EnterOutputFile,
    Confirm,
    Progress,
    Done(String),
}

pub struct TuiState {
    pub step: TuiStep,
    pub db_type_index: usize,
    pub host: String,
    pub port: String,
    pub dbname: String,
    pub username: String,
    pub password: String,
    pub schema: String,
    pub output_file: String,
    pub input_buffer: String,
}

impl Default for TuiState {
    fn default() -> Self {
        Self {
            step: TuiStep::Welcome,
            db_type_index: 0,
            host: String::new(),
            port: String::new(),
            dbname: String::new(),
            username: String::new(),
            password: String::new(),
            schema: String::new(),
            output_file: String::new(),
            input_buffer: String::new(),
        }
    }
}

/// What a key press asks the event loop to do.
#[derive(Debug, PartialEq)]
pub enum TuiAction {
    Continue,
    Export,
    Quit,
}

pub async fn run_tui() -> io::Result<()> {
    crossterm::execute!(io::stdout(), crossterm::terminal::Clear(crossterm::terminal::ClearType::All), crossterm::cursor::MoveTo(0, 0))?;
    crossterm::terminal::enable_raw_mode()?;
    let result = event_loop().await;
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(io::stdout(), crossterm::terminal::Clear(crossterm::terminal::ClearType::All), crossterm::cursor::MoveTo(0, 0))?;
    result
}

async fn event_loop() -> io::Result<()> {
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;
    let mut state = TuiState::default();

    loop {
        terminal.draw(|f| draw(f, &state))?;

        if event::poll(std::time::Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match state.handle_key(key.code) {
                    TuiAction::Continue => {}
                    TuiAction::Quit => return Ok(()),
                    TuiAction::Export => {
                        terminal.draw(|f| draw(f, &state))?;
                        state.step = match tui_export_flow(&state).await {
                            Ok(msg) => TuiStep::Done(msg),
                            Err(e) => TuiStep::Done(format!("{}", e)),
                        };
                    }
                }
            }
        }
    }
}

fn prompt(f: &mut Frame, title: &str, text: &str) {
    let block = Block::default().title(title.to_string()).borders(Borders::ALL);
    f.render_widget(Paragraph::new(text.to_string()).block(block), f.size());
}

fn draw(f: &mut Frame, state: &TuiState) {
    let size = f.size();
    let input = state.input_buffer.as_str();
    match &state.step {
        TuiStep::Welcome => prompt(f, "DBDataExporter", "Export every table to a JSON file.\nPress any key to begin."),
        TuiStep::ChooseDbType => {
            let items: Vec<ListItem> = DbKind::ALL.iter().enumerate().map(|(i, kind)| {
                let style = if i == state.db_type_index {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(kind.to_string()).style(style)
            }).collect();
            let list = List::new(items)
                .block(Block::default().title("Select Database Type (↑/↓, Enter)").borders(Borders::ALL));
            f.render_widget(list, size);
        }
        TuiStep::EnterHost => prompt(f, "Enter Host (e.g. localhost)", input),
        TuiStep::EnterPort => {
            let title = match state.selected_kind().default_port() {
                Some(port) => format!("Enter Port (empty for {})", port),
                None => "Enter Port".to_string(),
            };
            prompt(f, &title, input)
        }
        TuiStep::EnterDbName => prompt(f, "Enter Database Name (or SQLite file path)", input),
        TuiStep::EnterUsername => prompt(f, "Enter Username", input),
        TuiStep::EnterPassword => prompt(f, "Enter Password (hidden)", &"*".repeat(input.chars().count())),
        TuiStep::EnterSchema => prompt(f, "Enter Schema (empty for default)", input),
        TuiStep::EnterOutputFile => prompt(f, "Enter Output File (empty for data.json)", input),
        TuiStep::Confirm => {
            let text = format!(
                "DB: {}\nTarget: {}\nSchema: {}\nOutput: {}\nPress Enter to Export, Esc to go back",
                state.selected_kind(),
                state.target(),
                if state.schema.is_empty() { "(default)" } else { state.schema.as_str() },
                if state.output_file.is_empty() { "data.json" } else { state.output_file.as_str() },
            );
            prompt(f, "Confirm", &text)
        }
        TuiStep::Progress => prompt(f, "Exporting...", "Please wait..."),
        TuiStep::Done(msg) => prompt(f, "Done (Enter/Esc to exit)", msg),
    }
}

impl TuiState {
    pub fn selected_kind(&self) -> DbKind {
        DbKind::ALL[self.db_type_index]
    }

    fn is_sqlite(&self) -> bool {
        self.selected_kind() == DbKind::Sqlite
    }

    fn target(&self) -> String {
        if self.is_sqlite() {
            self.dbname.clone()
        } else {
            format!("{}@{}:{}/{}", self.username, self.host, self.port, self.dbname)
        }
    }

    /// Moves the wizard along for one key press.
    pub fn handle_key(&mut self, code: KeyCode) -> TuiAction {
        match self.step.clone() {
            TuiStep::Welcome => self.step = TuiStep::ChooseDbType,
            TuiStep::ChooseDbType => match code {
                KeyCode::Up => self.db_type_index = self.db_type_index.saturating_sub(1),
                KeyCode::Down => {
                    if self.db_type_index + 1 < DbKind::ALL.len() {
                        self.db_type_index += 1;
                    }
                }
                KeyCode::Enter => {
                    self.step = if self.is_sqlite() { TuiStep::EnterDbName } else { TuiStep::EnterHost };
                    self.input_buffer.clear();
                }
                KeyCode::Esc => return TuiAction::Quit,
                _ => {}
            },
            TuiStep::Confirm => match code {
                KeyCode::Enter => {
                    self.step = TuiStep::Progress;
                    return TuiAction::Export;
                }
                KeyCode::Esc => self.step = TuiStep::EnterOutputFile,
                _ => {}
            },
            TuiStep::Done(_) => {
                if matches!(code, KeyCode::Esc | KeyCode::Enter) {
                    return TuiAction::Quit;
                }
            }
            TuiStep::Progress => {}
            step => match code {
                KeyCode::Enter => {
                    let value = std::mem::take(&mut self.input_buffer);
                    self.step = self.accept(step, value);
                }
                KeyCode::Char(c) => self.input_buffer.push(c),
                KeyCode::Backspace => { self.input_buffer.pop(); }
                KeyCode::Esc => {
                    self.input_buffer.clear();
                    self.step = self.previous(step);
                }
                _ => {}
            },
        }
        TuiAction::Continue
    }

    // Stores the typed value and returns the next step.
    fn accept(&mut self, step: TuiStep, value: String) -> TuiStep {
        let sqlite = self.is_sqlite();
        match step {
            TuiStep::EnterHost => { self.host = value; TuiStep::EnterPort }
            TuiStep::EnterPort => { self.port = value; TuiStep::EnterDbName }
            TuiStep::EnterDbName => {
                self.dbname = value;
                if sqlite { TuiStep::EnterOutputFile } else { TuiStep::EnterUsername }
            }
            TuiStep::EnterUsername => { self.username = value; TuiStep::EnterPassword }
            TuiStep::EnterPassword => { self.password = value; TuiStep::EnterSchema }
            TuiStep::EnterSchema => { self.schema = value; TuiStep::EnterOutputFile }
            TuiStep::EnterOutputFile => { self.output_file = value; TuiStep::Confirm }
            other => other,
        }
    }

    fn previous(&self, step: TuiStep) -> TuiStep {
        match step {
            TuiStep::EnterHost => TuiStep::ChooseDbType,
            TuiStep::EnterPort => TuiStep::EnterHost,
            TuiStep::EnterDbName if self.is_sqlite() => TuiStep::ChooseDbType,
            TuiStep::EnterDbName => TuiStep::EnterPort,
            TuiStep::EnterUsername => TuiStep::EnterDbName,
            TuiStep::EnterPassword => TuiStep::EnterUsername,
            TuiStep::EnterSchema => TuiStep::EnterPassword,
            TuiStep::EnterOutputFile if self.is_sqlite() => TuiStep::EnterDbName,
            TuiStep::EnterOutputFile => TuiStep::EnterSchema,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_line(state: &mut TuiState, text: &str) {
        for c in text.chars() {
            state.handle_key(KeyCode::Char(c));
        }
        state.handle_key(KeyCode::Enter);
    }

    #[test]
    fn postgres_wizard_collects_every_parameter() {
        let mut state = TuiState::default();
        state.handle_key(KeyCode::Enter);
        assert_eq!(state.step, TuiStep::ChooseDbType);
        state.handle_key(KeyCode::Enter);
        assert_eq!(state.step, TuiStep::EnterHost);

        type_line(&mut state, "localhost");
        type_line(&mut state, "5432");
        type_line(&mut state, "computer");
        type_line(&mut state, "postgres");
        type_line(&mut state, "s3cret");
        type_line(&mut state, "");
        type_line(&mut state, "out.json");
        assert_eq!(state.step, TuiStep::Confirm);
        assert_eq!(state.selected_kind(), DbKind::Postgres);
        assert_eq!((state.host.as_str(), state.port.as_str()), ("localhost", "5432"));
        assert_eq!((state.dbname.as_str(), state.username.as_str()), ("computer", "postgres"));
        assert_eq!(state.password, "s3cret");
        assert!(!state.target().contains("s3cret"));

        assert_eq!(state.handle_key(KeyCode::Enter), TuiAction::Export);
        assert_eq!(state.step, TuiStep::Progress);
    }

    #[test]
    fn sqlite_skips_network_steps_and_esc_goes_back() {
        let mut state = TuiState::default();
        state.handle_key(KeyCode::Enter);
        state.handle_key(KeyCode::Down);
        state.handle_key(KeyCode::Down);
        state.handle_key(KeyCode::Down);
        assert_eq!(state.selected_kind(), DbKind::Sqlite);
        state.handle_key(KeyCode::Enter);
        assert_eq!(state.step, TuiStep::EnterDbName);

        type_line(&mut state, "data.db");
        assert_eq!(state.step, TuiStep::EnterOutputFile);
        state.handle_key(KeyCode::Char('x'));
        state.handle_key(KeyCode::Esc);
        assert_eq!(state.step, TuiStep::EnterDbName);
        assert!(state.input_buffer.is_empty());
        state.handle_key(KeyCode::Esc);
        assert_eq!(state.step, TuiStep::ChooseDbType);
        assert_eq!(state.handle_key(KeyCode::Esc), TuiAction::Quit);
    }
}

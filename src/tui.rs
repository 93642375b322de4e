use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use futures::StreamExt;
use rag::{AnswerOutcome, AnswerSource, Assistant};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap};
use tokio::sync::mpsc;

use crate::is_exit_command;

pub async fn run(assistant: Arc<Assistant>) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(assistant);
    let res = run_app(&mut terminal, &mut app).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

struct App {
    input: String,
    cursor: usize,
    last_question: Option<String>,
    context: Option<String>,
    answer: Option<String>,
    assistant: Arc<Assistant>,
    output_focus: OutputFocus,
    context_pane: Pane,
    answer_pane: Pane,
    is_loading: bool,
    spinner_idx: usize,
    should_quit: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFocus {
    Context,
    Answer,
}

/// Scroll state of one output pane.
#[derive(Default)]
struct Pane {
    scroll: usize,
    content_len: usize,
    view_height: usize,
    reset: bool,
}

impl Pane {
    fn max_scroll(&self) -> usize {
        self.content_len.saturating_sub(self.view_height)
    }

    fn up(&mut self, by: usize) {
        self.scroll = self.scroll.saturating_sub(by);
    }

    fn down(&mut self, by: usize) {
        self.scroll = (self.scroll + by).min(self.max_scroll());
    }

    /// Records the new content size; a pending reset jumps to the top or the bottom.
    fn fit(&mut self, content_len: usize, view_height: usize, reset_to_end: bool) {
        self.content_len = content_len;
        self.view_height = view_height;
        if self.reset {
            self.scroll = if reset_to_end { self.max_scroll() } else { 0 };
            self.reset = false;
        } else {
            self.scroll = self.scroll.min(self.max_scroll());
        }
    }
}

type Response = Result<AnswerOutcome, String>;

impl App {
    fn new(assistant: Arc<Assistant>) -> Self {
        Self {
            input: String::new(),
            cursor: 0,
            last_question: None,
            context: None,
            answer: None,
            assistant,
            output_focus: OutputFocus::Answer,
            context_pane: Pane::default(),
            answer_pane: Pane::default(),
            is_loading: false,
            spinner_idx: 0,
            should_quit: false,
        }
    }

    fn focused_pane(&mut self) -> &mut Pane {
        match self.output_focus {
            OutputFocus::Context => &mut self.context_pane,
            OutputFocus::Answer => &mut self.answer_pane,
        }
    }

    fn byte_index(&self, cursor: usize) -> usize {
        self.input
            .char_indices()
            .nth(cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    fn insert_char(&mut self, c: char) {
        let idx = self.byte_index(self.cursor);
        self.input.insert(idx, c);
        self.cursor += 1;
    }

    fn delete_char(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let idx = self.byte_index(self.cursor);
        self.input.remove(idx);
    }

    fn move_left(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    fn move_right(&mut self) {
        if self.cursor < self.input.chars().count() {
            self.cursor += 1;
        }
    }

    fn submit(&mut self, tx: mpsc::UnboundedSender<Response>) {
        if self.input.trim().is_empty() || self.is_loading {
            return;
        }
        if is_exit_command(&self.input) {
            self.should_quit = true;
            return;
        }

        let question = self.input.trim().to_string();
        self.last_question = Some(question.clone());
        self.is_loading = true;
        self.context_pane.reset = true;
        self.answer_pane.reset = true;
        self.context = None;
        self.answer = None;

        let assistant = self.assistant.clone();
        tokio::task::spawn_blocking(move || {
            let result = assistant
                .answer_with_context(&question)
                .map_err(|err| err.to_string());
            let _ = tx.send(result);
        });

        self.input.clear();
        self.cursor = 0;
    }

    fn receive(&mut self, result: Response) {
        self.is_loading = false;
        match result {
            Ok(outcome) => {
                self.context = Some(format_context(&outcome));
                self.answer = Some(outcome.answer);
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to answer");
                self.context = Some(String::new());
                self.answer = Some(format!("Error: {}", err));
            }
        }
        self.context_pane.reset = true;
        self.answer_pane.reset = true;
    }
}

fn format_context(outcome: &AnswerOutcome) -> String {
    match outcome.source {
        AnswerSource::Intent => "(answered from a saved response, nothing retrieved)".to_string(),
        AnswerSource::Generated | AnswerSource::Fallback if outcome.context.is_empty() => {
            "(no context found)".to_string()
        }
        AnswerSource::Generated | AnswerSource::Fallback => outcome
            .context
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("[{}] {}", i + 1, chunk))
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

fn inner_width(area: ratatui::layout::Rect) -> usize {
    area.width.saturating_sub(2) as usize
}

fn inner_height(area: ratatui::layout::Rect) -> usize {
    area.height.saturating_sub(2) as usize
}

fn visible_window(len: usize, cursor: usize, max_width: usize) -> usize {
    if len <= max_width {
        return 0;
    }
    let cursor = cursor.min(len);
    let start = cursor.saturating_sub(max_width / 2);
    start.min(len - max_width)
}

fn truncate_input(input: &str, cursor: usize, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    let len = input.chars().count();
    let start = visible_window(len, cursor, max_width);
    input.chars().skip(start).take(max_width).collect()
}

fn cursor_x_in_view(input: &str, cursor: usize, max_width: usize) -> usize {
    if max_width == 0 {
        return 0;
    }
    let len = input.chars().count();
    let start = visible_window(len, cursor, max_width);
    cursor.min(len).saturating_sub(start).min(max_width)
}

fn line_count(text: &str) -> usize {
    let count = text.lines().count();
    if count == 0 { 1 } else { count }
}

fn draw_ui(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> io::Result<()> {
    let spinner = ["|", "/", "-", "\\"];

    terminal.draw(|frame| {
        let title_style = Style::default().fg(Color::Black).add_modifier(Modifier::BOLD);
        let info_border = Style::default().fg(Color::Black);
        let input_border = Style::default().fg(Color::DarkGray);
        let help_text_style = Style::default().fg(Color::DarkGray);
        let info_text_style = Style::default().fg(Color::Blue);
        let input_text_style = Style::default().fg(Color::DarkGray);

        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(8),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(area);
        let output_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(chunks[0]);

        let context_text = app
            .context
            .as_deref()
            .unwrap_or("Retrieved context will appear here after you ask something.")
            .to_string();
        let answer_text = if app.is_loading {
            "Thinking...".to_string()
        } else {
            match (&app.answer, &app.last_question) {
                (Some(answer), Some(question)) => format!("Q: {}\n\n{}", question, answer),
                (Some(answer), None) => answer.clone(),
                _ => "Type a question below and press Enter. Type 'quit' or 'exit' to stop."
                    .to_string(),
            }
        };

        let focus_marker = |focus: OutputFocus| if app.output_focus == focus { " *" } else { "" };
        let context_title = format!("Context{}", focus_marker(OutputFocus::Context));
        let answer_title = if app.is_loading {
            format!("Answer {}{}", spinner[app.spinner_idx], focus_marker(OutputFocus::Answer))
        } else {
            format!("Answer{}", focus_marker(OutputFocus::Answer))
        };

        let context_block = Block::bordered()
            .title(context_title)
            .title_style(title_style)
            .border_style(info_border);
        let answer_block = Block::bordered()
            .title(answer_title)
            .title_style(title_style)
            .border_style(info_border);

        app.context_pane
            .fit(line_count(&context_text), inner_height(output_chunks[0]), false);
        app.answer_pane
            .fit(line_count(&answer_text), inner_height(output_chunks[1]), true);

        let context = Paragraph::new(context_text)
            .style(info_text_style)
            .scroll((app.context_pane.scroll as u16, 0))
            .wrap(Wrap { trim: true })
            .block(context_block);
        frame.render_widget(context, output_chunks[0]);

        let mut context_scrollbar = ScrollbarState::new(app.context_pane.content_len).position(app.context_pane.scroll);
        frame.render_stateful_widget(
            scrollbar(),
            output_chunks[0].inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut context_scrollbar,
        );

        let answer = Paragraph::new(answer_text)
            .style(info_text_style)
            .scroll((app.answer_pane.scroll as u16, 0))
            .wrap(Wrap { trim: true })
            .block(answer_block);
        frame.render_widget(answer, output_chunks[1]);

        let mut answer_scrollbar = ScrollbarState::new(app.answer_pane.content_len).position(app.answer_pane.scroll);
        frame.render_stateful_widget(
            scrollbar(),
            output_chunks[1].inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut answer_scrollbar,
        );

        let input_block = Block::bordered()
            .title("Ask something")
            .title_style(title_style)
            .border_style(input_border);
        let input_view = truncate_input(&app.input, app.cursor, inner_width(chunks[1]));
        let input = Paragraph::new(input_view)
            .style(input_text_style)
            .block(input_block)
            .wrap(Wrap { trim: false });
        frame.render_widget(input, chunks[1]);

        let cursor_x = cursor_x_in_view(&app.input, app.cursor, inner_width(chunks[1]));
        let x = chunks[1].x + 1 + cursor_x as u16;
        let y = chunks[1].y + 1;
        frame.set_cursor_position((x, y));

        let help_block = Block::bordered()
            .title("Controls")
            .title_style(title_style)
            .border_style(input_border);
        let help = Paragraph::new(
            "Enter: Ask | Ctrl+O: Focus | Up/Down/PgUp/PgDn/Home/End: Scroll | quit, exit, Esc, Ctrl+C: Quit",
        )
        .style(help_text_style)
        .wrap(Wrap { trim: true })
        .block(help_block);
        frame.render_widget(help, chunks[2]);
    })?;

    Ok(())
}

fn scrollbar() -> Scrollbar<'static> {
    Scrollbar::new(ScrollbarOrientation::VerticalRight)
        .track_style(Style::default().fg(Color::DarkGray))
        .thumb_style(Style::default().fg(Color::Blue))
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> io::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Response>();
    let mut events = EventStream::new();
    let mut spinner_tick = tokio::time::interval(Duration::from_millis(100));
    spinner_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    draw_ui(terminal, app)?;

    loop {
        tokio::select! {
            _ = spinner_tick.tick() => {
                if app.is_loading {
                    app.spinner_idx = (app.spinner_idx + 1) % 4;
                    draw_ui(terminal, app)?;
                }
            }
            maybe_result = rx.recv() => {
                if let Some(result) = maybe_result {
                    app.receive(result);
                    draw_ui(terminal, app)?;
                }
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        match key.code {
                            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                            KeyCode::Esc => return Ok(()),
                            KeyCode::Enter => app.submit(tx.clone()),
                            KeyCode::Up => app.focused_pane().up(1),
                            KeyCode::Down => app.focused_pane().down(1),
                            KeyCode::PageUp => {
                                let pane = app.focused_pane();
                                pane.up(pane.view_height.max(1));
                            }
                            KeyCode::PageDown => {
                                let pane = app.focused_pane();
                                pane.down(pane.view_height.max(1));
                            }
                            KeyCode::Home => app.focused_pane().scroll = 0,
                            KeyCode::End => {
                                let pane = app.focused_pane();
                                pane.scroll = pane.max_scroll();
                            }
                            KeyCode::Char('o') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                                app.output_focus = match app.output_focus {
                                    OutputFocus::Context => OutputFocus::Answer,
                                    OutputFocus::Answer => OutputFocus::Context,
                                };
                            }
                            KeyCode::Left => app.move_left(),
                            KeyCode::Right => app.move_right(),
                            KeyCode::Backspace => app.delete_char(),
                            KeyCode::Char(ch) => app.insert_char(ch),
                            _ => {}
                        }
                        if app.should_quit {
                            return Ok(());
                        }
                        draw_ui(terminal, app)?;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) => {}
                    None => return Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_window_follows_cursor() {
        assert_eq!(truncate_input("hello", 5, 10), "hello");
        assert_eq!(truncate_input("abcdefghij", 10, 4), "ghij");
        assert_eq!(cursor_x_in_view("abcdefghij", 10, 4), 4);
        assert_eq!(truncate_input("abcdefghij", 0, 4), "abcd");
    }

    #[test]
    fn input_window_counts_chars_not_bytes() {
        assert_eq!(truncate_input("héllo wörld", 11, 5), "wörld");
    }

    #[test]
    fn pane_clamps_and_resets() {
        let mut pane = Pane::default();
        pane.fit(30, 10, false);
        pane.down(100);
        assert_eq!(pane.scroll, 20);
        pane.up(5);
        assert_eq!(pane.scroll, 15);

        pane.fit(12, 10, false);
        assert_eq!(pane.scroll, 2);

        pane.reset = true;
        pane.fit(40, 10, true);
        assert_eq!(pane.scroll, 30);
        pane.reset = true;
        pane.fit(40, 10, false);
        assert_eq!(pane.scroll, 0);
    }

    #[test]
    fn context_lists_retrieved_chunks() {
        let outcome = AnswerOutcome {
            answer: "x".to_string(),
            context: vec!["first".to_string(), "second".to_string()],
            source: AnswerSource::Generated,
        };
        assert_eq!(format_context(&outcome), "[1] first\n\n[2] second");

        let shortcut = AnswerOutcome {
            context: Vec::new(),
            source: AnswerSource::Intent,
            ..outcome
        };
        assert!(format_context(&shortcut).contains("saved response"));
    }
}

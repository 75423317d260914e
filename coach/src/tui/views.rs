//! TUI views and rendering
//!
//! All drawing lives here. Views read ChatState and only write back the
//! scroll bound measured during the draw.

use chrono::Local;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tracing::trace;

use super::state::ChatState;
use crate::prompts;
use crate::render::{ASSISTANT_AVATAR, USER_AVATAR};
use crate::session::Role;

mod colors {
    use ratatui::style::Color;

    pub const TITLE: Color = Color::Rgb(60, 179, 113); // Medium sea green
    pub const KEYBIND: Color = Color::Rgb(0, 255, 255); // Cyan
    pub const USER: Color = Color::Rgb(100, 149, 237); // Cornflower blue
    pub const ASSISTANT: Color = Color::Rgb(60, 179, 113);
    pub const HELP: Color = Color::Rgb(255, 215, 0); // Gold
    pub const DIM: Color = Color::DarkGray;
}

pub const TITLE: &str = "🌱 마음 코칭 선생님";
pub const CAPTION: &str = "편하게 이야기해보세요";
pub const TAGLINE: &str = "💚 항상 당신 곁에";

/// Main render function
pub fn render(state: &mut ChatState, frame: &mut Frame) {
    trace!(turns = state.transcript.len(), busy = state.busy, "render: called");
    let help = prompts::help_text();
    let help_height = if state.help_expanded {
        help.lines().count() as u16 + 2
    } else {
        0
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),           // Header
            Constraint::Length(help_height), // Help panel
            Constraint::Min(3),              // Transcript
            Constraint::Length(3),           // Input
            Constraint::Length(1),           // Footer
        ])
        .split(frame.area());

    render_header(state, frame, chunks[0]);
    if state.help_expanded {
        render_help_panel(help, frame, chunks[1]);
    }
    render_transcript(state, frame, chunks[2]);
    render_input(state, frame, chunks[3]);
    render_footer(frame, chunks[4]);
}

fn render_header(state: &ChatState, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(20)])
        .split(area);

    let title = Line::from(vec![Span::styled(
        TITLE,
        Style::default().fg(colors::TITLE).add_modifier(Modifier::BOLD),
    )]);
    let caption = Line::from(vec![Span::styled(CAPTION, Style::default().fg(colors::DIM))]);
    frame.render_widget(Paragraph::new(vec![title, caption]), chunks[0]);

    let session = Line::from(vec![Span::styled(
        format!("세션: {}...", state.session_label),
        Style::default().fg(colors::DIM),
    )]);
    frame.render_widget(Paragraph::new(session).alignment(Alignment::Right), chunks[1]);
}

fn render_help_panel(help: &str, frame: &mut Frame, area: Rect) {
    let lines: Vec<Line> = help.lines().map(|l| Line::from(format!("• {}", l))).collect();
    let panel = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" 💡 이용 안내 ")
                .border_style(Style::default().fg(colors::HELP)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(panel, area);
}

/// Build the styled lines for every visible turn plus the partial reply
fn transcript_lines(state: &ChatState) -> Vec<Line<'_>> {
    let mut lines: Vec<Line> = Vec::new();

    for turn in &state.transcript {
        match turn.role {
            Role::User => {
                for (i, content_line) in turn.content.lines().enumerate() {
                    let prefix = if i == 0 { format!("{} ", USER_AVATAR) } else { "   ".to_string() };
                    lines.push(Line::from(vec![
                        Span::styled(prefix, Style::default().fg(colors::USER).add_modifier(Modifier::BOLD)),
                        Span::styled(content_line, Style::default().fg(colors::USER)),
                    ]));
                }
            }
            Role::Assistant => push_assistant(&mut lines, &turn.content),
            Role::System => continue,
        }
        lines.push(Line::from(""));
    }

    if let Some(partial) = &state.streaming {
        push_assistant(&mut lines, partial);
    }

    lines
}

/// Assistant text is rendered as markdown under an avatar line
fn push_assistant<'a>(lines: &mut Vec<Line<'a>>, content: &'a str) {
    lines.push(Line::from(vec![Span::styled(
        format!("{} 코치", ASSISTANT_AVATAR),
        Style::default().fg(colors::ASSISTANT).add_modifier(Modifier::BOLD),
    )]));
    let markdown_text = tui_markdown::from_str(content);
    for line in markdown_text.lines {
        let mut spans = vec![Span::raw("   ")];
        spans.extend(line.spans);
        lines.push(Line::from(spans));
    }
}

fn render_transcript(state: &mut ChatState, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors::DIM));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = transcript_lines(state);

    // Visual line count, accounting for wrapping
    let viewport_width = inner.width as usize;
    let content_height: usize = lines
        .iter()
        .map(|line| {
            let line_width = line.width();
            if viewport_width == 0 || line_width == 0 {
                1
            } else {
                line_width.div_ceil(viewport_width)
            }
        })
        .sum();
    let max_scroll = content_height.saturating_sub(inner.height as usize);
    let scroll = state.scroll.unwrap_or(max_scroll).min(max_scroll);

    let history = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll.min(u16::MAX as usize) as u16, 0));
    frame.render_widget(history, inner);

    state.max_scroll = max_scroll;
}

fn render_input(state: &ChatState, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if state.busy { colors::DIM } else { colors::KEYBIND }));

    let mut spans = vec![Span::styled(
        "> ",
        Style::default().fg(colors::USER).add_modifier(Modifier::BOLD),
    )];

    if state.busy {
        spans.push(Span::styled("답변을 작성하고 있어요...", Style::default().fg(colors::DIM)));
    } else if state.input.is_empty() {
        spans.push(Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)));
        spans.push(Span::styled(" 메시지를 입력하세요", Style::default().fg(colors::DIM)));
    } else {
        let cursor_pos = state.cursor_pos.min(state.input.len());
        let (before, after) = state.input.split_at(cursor_pos);
        spans.push(Span::raw(before));
        let mut chars = after.chars();
        match chars.next() {
            Some(c) => {
                spans.push(Span::styled(
                    c.to_string(),
                    Style::default().fg(Color::Black).bg(Color::White),
                ));
                spans.push(Span::raw(chars.as_str()));
            }
            None => spans.push(Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK))),
        }
    }

    let input = Paragraph::new(Line::from(spans)).block(block).wrap(Wrap { trim: false });
    frame.render_widget(input, area);
}

fn key_span<'a>(key: &'a str, desc: &'a str) -> [Span<'a>; 2] {
    [
        Span::styled(key, Style::default().fg(colors::KEYBIND).add_modifier(Modifier::BOLD)),
        Span::styled(desc, Style::default().fg(colors::DIM)),
    ]
}

fn render_footer(frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(30)])
        .split(area);

    let mut left: Vec<Span> = Vec::new();
    left.extend(key_span("Ctrl+R", " 새로운 대화  "));
    left.extend(key_span("F1", " 도움말  "));
    left.extend(key_span("↑↓ PgUp PgDn", " 스크롤  "));
    left.extend(key_span("Ctrl+C", " 종료"));
    frame.render_widget(Paragraph::new(Line::from(left)), chunks[0]);

    let right = Line::from(vec![
        Span::styled(TAGLINE, Style::default().fg(colors::ASSISTANT)),
        Span::raw("  "),
        Span::styled(format!("🕐 {}", Local::now().format("%H:%M")), Style::default().fg(colors::DIM)),
    ]);
    frame.render_widget(Paragraph::new(right).alignment(Alignment::Right), chunks[1]);
}

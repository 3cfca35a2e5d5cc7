use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use crate::app::App;
use crate::config::Theme;
use crate::markdown;
use crate::message::{Message, Role};
use crate::viewer::{BUTTON_TEXT, DIALOG_DESCRIPTION, DIALOG_TITLE, HINT_TEXT};

pub const TITLE: &str = "Firefingers Bot Cultural";
const PLACEHOLDER: &str = "Type your message here...";

/// Colours for one theme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Color,
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub human: Color,
    pub assistant: Color,
    pub heading: Color,
    pub code: Color,
    pub link: Color,
    pub quote: Color,
    pub bar_bg: Color,
    pub bar_fg: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                background: Color::Reset,
                text: Color::White,
                muted: Color::DarkGray,
                accent: Color::Cyan,
                human: Color::LightBlue,
                assistant: Color::Yellow,
                heading: Color::LightMagenta,
                code: Color::LightGreen,
                link: Color::LightCyan,
                quote: Color::Gray,
                bar_bg: Color::DarkGray,
                bar_fg: Color::White,
            },
            Theme::Light => Self {
                background: Color::White,
                text: Color::Black,
                muted: Color::Gray,
                accent: Color::Blue,
                human: Color::Blue,
                assistant: Color::Magenta,
                heading: Color::Magenta,
                code: Color::Green,
                link: Color::Blue,
                quote: Color::DarkGray,
                bar_bg: Color::Gray,
                bar_fg: Color::Black,
            },
        }
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let palette = Palette::for_theme(app.theme());

    frame.render_widget(
        Block::default().style(Style::default().bg(palette.background).fg(palette.text)),
        area,
    );

    // Main layout: header, messages, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, &palette, frame, header_area);
    render_messages(app, &palette, frame, chat_area);
    render_input(app, &palette, frame, input_area);
    render_footer(app, &palette, frame, footer_area);

    if app.viewer.is_some() {
        render_viewer(app, &palette, frame, area);
    }
}

fn render_header(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let theme_label = match app.theme() {
        Theme::Dark => " ☾ dark ",
        Theme::Light => " ☀ light ",
    };

    let title = Line::from(vec![
        Span::styled(format!(" {} ", TITLE), Style::default().fg(palette.accent).bold()),
        Span::styled(theme_label, Style::default().fg(palette.bar_fg)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(palette.bar_fg),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(palette.bar_bg));
    frame.render_widget(header, area);
}

/// Lines for one message, including the role label and 3D hint.
fn message_lines(
    message: &Message,
    in_progress: bool,
    app: &App,
    palette: &Palette,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    match message.role {
        Role::Human => {
            lines.push(
                Line::from(Span::styled(
                    "Você",
                    Style::default().fg(palette.human).add_modifier(Modifier::BOLD),
                ))
                .alignment(Alignment::Right),
            );
            for line in message.content.lines() {
                lines.push(
                    Line::from(Span::styled(line.to_string(), Style::default().fg(palette.human)))
                        .alignment(Alignment::Right),
                );
            }
        }
        Role::Assistant => {
            lines.push(Line::from(Span::styled(
                "Firefingers",
                Style::default().fg(palette.assistant).add_modifier(Modifier::BOLD),
            )));
            if in_progress && message.content.is_empty() {
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("Pensando{}", dots),
                    Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC),
                )));
            } else if message.is_markdown {
                lines.extend(markdown::render(&message.content, palette));
            } else {
                lines.extend(message.content.lines().map(|l| Line::from(l.to_string())));
            }
        }
    }

    if message.resource_url.is_some() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            HINT_TEXT,
            Style::default().fg(palette.muted),
        )));
        lines.push(Line::from(vec![
            Span::styled(" Ctrl-V ", Style::default().bg(palette.bar_bg).fg(palette.bar_fg)),
            Span::styled(
                format!(" {} ", BUTTON_TEXT),
                Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
            ),
        ]));
    }

    lines.push(Line::default());
    lines
}

fn render_messages(app: &mut App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.muted));

    let inner_width = area.width.saturating_sub(2);
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);

    let mut lines: Vec<Line> = Vec::new();
    let replying = app.conversation.is_replying();
    let count = app.conversation.len();
    for (i, message) in app.conversation.messages().iter().enumerate() {
        let in_progress = replying && i + 1 == count;
        lines.extend(message_lines(message, in_progress, app, palette));
    }

    // Request sent but the reply has not started yet
    if app.loading && !replying {
        let mut waiting = Message::streaming();
        waiting.is_markdown = false;
        lines.extend(message_lines(&waiting, true, app, palette));
    }

    let chat = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });

    // Counted before the block is attached so borders are not included
    app.chat_lines = chat.line_count(inner_width).min(u16::MAX as usize) as u16;
    if app.follow_tail {
        app.scroll = app.max_scroll();
    } else {
        app.scroll = app.scroll.min(app.max_scroll());
    }

    let chat = chat.block(block).scroll((app.scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let (title, border_color) = if app.loading {
        (" Aguarde... ", palette.muted)
    } else {
        (" Mensagem (Enter para enviar) ", palette.accent)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    if app.input.is_empty() {
        let placeholder = Paragraph::new(PLACEHOLDER)
            .style(Style::default().fg(palette.muted))
            .block(block);
        frame.render_widget(placeholder, area);
        if !app.loading {
            frame.set_cursor_position((area.x + 1, area.y + 1));
        }
        return;
    }

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let text_color = if app.loading { palette.muted } else { palette.human };
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(text_color))
        .block(block);

    frame.render_widget(input, area);

    if !app.loading {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(palette.bar_bg).fg(palette.bar_fg);
    let label_style = Style::default().fg(palette.text);

    let mut spans = if app.viewer.is_some() {
        vec![
            Span::styled(" o ", key_style),
            Span::styled(" abrir ", label_style),
            Span::styled(" c ", key_style),
            Span::styled(" copiar ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" fechar ", label_style),
        ]
    } else {
        vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" enviar ", label_style),
            Span::styled(" PgUp/PgDn ", key_style),
            Span::styled(" rolar ", label_style),
            Span::styled(" Ctrl-V ", key_style),
            Span::styled(" 3D ", label_style),
            Span::styled(" Ctrl-T ", key_style),
            Span::styled(" tema ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" sair ", label_style),
        ]
    };

    if let Some(status) = &app.status {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            status.clone(),
            Style::default().fg(palette.accent).add_modifier(Modifier::ITALIC),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_viewer(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let Some(dialog) = &app.viewer else { return };

    // Calculate popup size and position (centered)
    let popup_width = (area.width * 3 / 4).max(40).min(area.width.saturating_sub(2));
    let popup_height = 11.min(area.height.saturating_sub(2));
    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .style(Style::default().bg(palette.background).fg(palette.text))
        .title(format!(" {} ", DIALOG_TITLE));

    let key_style = Style::default().bg(palette.bar_bg).fg(palette.bar_fg);
    let text = Text::from(vec![
        Line::from(Span::styled(DIALOG_DESCRIPTION, Style::default().fg(palette.muted))),
        Line::default(),
        Line::from(Span::styled(
            dialog.url.clone(),
            Style::default().fg(palette.link).add_modifier(Modifier::UNDERLINED),
        )),
        Line::default(),
        Line::from(vec![
            Span::styled(" o ", key_style),
            Span::raw(" abrir no navegador   "),
            Span::styled(" c ", key_style),
            Span::raw(" copiar link"),
        ]),
        Line::default(),
        Line::from(vec![Span::styled(" Esc ", key_style), Span::raw(" Close")])
            .alignment(Alignment::Right),
    ]);

    let body = Paragraph::new(text).block(block).wrap(Wrap { trim: false });
    frame.render_widget(body, popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChatClient;
    use crate::client::ReplyEvent;
    use crate::config::Config;
    use crate::stream::StreamUpdate;
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc;

    fn test_app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(ChatClient::new(""), Config::new(), None, tx)
    }

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for row in buffer.content.chunks(buffer.area.width as usize) {
            for cell in row {
                out.push_str(cell.symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn test_renders_greeting_and_placeholder() {
        let mut app = test_app();
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|f| render(&mut app, f)).unwrap();

        let screen = screen_text(&terminal);
        assert!(screen.contains(TITLE));
        assert!(screen.contains("Olá, em que posso ajudá-lo?"));
        assert!(screen.contains(PLACEHOLDER));
    }

    #[test]
    fn test_resource_hint_and_dialog() {
        let mut app = test_app();
        app.on_reply(ReplyEvent::Started);
        app.on_reply(ReplyEvent::Update(StreamUpdate::Content("A **Vênus**".to_string())));
        app.on_reply(ReplyEvent::Update(StreamUpdate::ResourceUrl("https://x/3d".to_string())));
        app.on_reply(ReplyEvent::Finished);

        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| render(&mut app, f)).unwrap();
        let screen = screen_text(&terminal);
        assert!(screen.contains("A Vênus"));
        assert!(screen.contains(BUTTON_TEXT));

        app.open_viewer();
        terminal.draw(|f| render(&mut app, f)).unwrap();
        let screen = screen_text(&terminal);
        assert!(screen.contains(DIALOG_TITLE));
        assert!(screen.contains("https://x/3d"));
    }

    #[test]
    fn test_follow_tail_scrolls_to_newest() {
        let mut app = test_app();
        for i in 0..30 {
            app.conversation.push(Message::human(format!("mensagem {}", i)));
        }
        let mut terminal = Terminal::new(TestBackend::new(60, 15)).unwrap();
        terminal.draw(|f| render(&mut app, f)).unwrap();

        assert!(app.scroll > 0);
        assert_eq!(app.scroll, app.max_scroll());
        assert!(screen_text(&terminal).contains("mensagem 29"));
    }

    #[test]
    fn test_follow_tail_keeps_end_of_word_wrapped_reply_visible() {
        let mut app = test_app();
        app.on_reply(ReplyEvent::Started);
        let text = format!("{}ULTIMA", "aaaaaa bbbbbb cccccc dddddd ".repeat(20));
        app.on_reply(ReplyEvent::Update(StreamUpdate::Content(text)));

        let mut terminal = Terminal::new(TestBackend::new(12, 12)).unwrap();
        terminal.draw(|f| render(&mut app, f)).unwrap();

        assert!(app.follow_tail);
        assert_eq!(app.scroll, app.max_scroll());
        assert!(screen_text(&terminal).contains("ULTIMA"));
    }
}

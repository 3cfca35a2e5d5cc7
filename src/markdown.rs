//! Markdown rendering for assistant replies.
//!
//! Parsed with pulldown-cmark and flattened into styled ratatui lines. Replies
//! are re-rendered on every stream update, so half-written markdown (an open
//! `**` or an unterminated code fence) has to render sensibly too.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use crate::ui::Palette;

pub fn render(text: &str, palette: &Palette) -> Vec<Line<'static>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut renderer = Renderer::new(palette);
    for event in Parser::new_ext(text, options) {
        renderer.event(event);
    }
    renderer.finish()
}

struct Renderer<'p> {
    palette: &'p Palette,
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    styles: Vec<Style>,
    /// One entry per open list; `Some(n)` is the next number of an ordered list.
    lists: Vec<Option<u64>>,
    item_marker: Option<String>,
    quote_depth: usize,
    in_code_block: bool,
    links: Vec<String>,
}

impl<'p> Renderer<'p> {
    fn new(palette: &'p Palette) -> Self {
        Self {
            palette,
            lines: Vec::new(),
            spans: Vec::new(),
            styles: Vec::new(),
            lists: Vec::new(),
            item_marker: None,
            quote_depth: 0,
            in_code_block: false,
            links: Vec::new(),
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, style: Style) {
        let next = self.style().patch(style);
        self.styles.push(next);
    }

    fn pop_style(&mut self) {
        self.styles.pop();
    }

    fn push_text(&mut self, text: impl Into<String>) {
        let style = self.style();
        self.spans.push(Span::styled(text.into(), style));
    }

    /// Quote bars, list indentation and the item marker (or its width in
    /// spaces on continuation lines).
    fn prefix(&mut self) -> Vec<Span<'static>> {
        let mut prefix = Vec::new();
        if self.quote_depth > 0 {
            prefix.push(Span::styled(
                "│ ".repeat(self.quote_depth),
                Style::default().fg(self.palette.quote),
            ));
        }
        if !self.lists.is_empty() {
            let indent = "  ".repeat(self.lists.len() - 1);
            match self.item_marker.take() {
                Some(marker) => {
                    prefix.push(Span::raw(indent));
                    prefix.push(Span::styled(marker, Style::default().fg(self.palette.accent)));
                }
                None => prefix.push(Span::raw(format!("{}  ", indent))),
            }
        }
        prefix
    }

    fn flush(&mut self) {
        if self.spans.is_empty() && self.item_marker.is_none() {
            return;
        }
        let mut spans = self.prefix();
        spans.append(&mut self.spans);
        self.lines.push(Line::from(spans));
    }

    fn blank_line(&mut self) {
        self.flush();
        if self.lines.last().map(|l| l.width() > 0).unwrap_or(false) {
            self.lines.push(Line::default());
        }
    }

    fn code_text(&mut self, text: &str) {
        let style = Style::default().fg(self.palette.code);
        let mut parts = text.split('\n').peekable();
        while let Some(part) = parts.next() {
            // The text of a fenced block ends with a newline; no empty line for it.
            if part.is_empty() && parts.peek().is_none() {
                break;
            }
            self.spans.push(Span::styled(format!("  {}", part), style));
            self.flush();
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if self.in_code_block {
                    self.code_text(&text);
                } else {
                    self.push_text(text.into_string());
                }
            }
            Event::Code(code) => {
                let style = self.style().fg(self.palette.code);
                self.spans.push(Span::styled(code.into_string(), style));
            }
            Event::Html(html) | Event::InlineHtml(html) => self.push_text(html.into_string()),
            Event::SoftBreak => self.push_text(" "),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(24),
                    Style::default().fg(self.palette.muted),
                )));
                self.blank_line();
            }
            Event::TaskListMarker(checked) => {
                self.push_text(if checked { "[x] " } else { "[ ] " });
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { .. } => {
                self.flush();
                self.push_style(
                    Style::default()
                        .fg(self.palette.heading)
                        .add_modifier(Modifier::BOLD),
                );
            }
            Tag::BlockQuote { .. } => {
                self.flush();
                self.quote_depth += 1;
                self.push_style(Style::default().add_modifier(Modifier::ITALIC));
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.lines.push(Line::from(Span::styled(
                            format!("  {}", lang),
                            Style::default().fg(self.palette.muted),
                        )));
                    }
                }
                self.in_code_block = true;
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.item_marker = Some(marker);
            }
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => {
                self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Tag::Link { dest_url, .. } | Tag::Image { dest_url, .. } => {
                self.push_style(
                    Style::default()
                        .fg(self.palette.link)
                        .add_modifier(Modifier::UNDERLINED),
                );
                self.links.push(dest_url.into_string());
            }
            Tag::Table(_) | Tag::TableHead | Tag::TableRow => self.flush(),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                if self.lists.is_empty() {
                    self.blank_line();
                } else {
                    self.flush();
                }
            }
            TagEnd::Heading(_) => {
                self.pop_style();
                self.blank_line();
            }
            TagEnd::BlockQuote { .. } => {
                self.flush();
                self.pop_style();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blank_line();
            }
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.blank_line();
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            TagEnd::Item => self.flush(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => self.pop_style(),
            TagEnd::Link | TagEnd::Image => {
                self.pop_style();
                let dest = self.links.pop().unwrap_or_default();
                let shown: String = self.spans.iter().map(|s| s.content.as_ref()).collect();
                if !dest.is_empty() && !shown.ends_with(&dest) {
                    self.spans.push(Span::styled(
                        format!(" ({})", dest),
                        Style::default().fg(self.palette.muted),
                    ));
                }
            }
            TagEnd::TableCell => self.push_text(" │ "),
            TagEnd::TableHead | TagEnd::TableRow => self.flush(),
            TagEnd::Table => self.blank_line(),
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().map(|l| l.width() == 0).unwrap_or(false) {
            self.lines.pop();
        }
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Theme;

    fn plain(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn render_plain(text: &str) -> Vec<String> {
        plain(&render(text, &Palette::for_theme(Theme::Dark)))
    }

    #[test]
    fn test_paragraphs_are_separated() {
        assert_eq!(render_plain("one\n\ntwo"), vec!["one", "", "two"]);
    }

    #[test]
    fn test_strong_text_is_bold() {
        let lines = render("a **b** c", &Palette::for_theme(Theme::Dark));
        assert_eq!(lines.len(), 1);
        let bold = lines[0].spans.iter().find(|s| s.content == "b").unwrap();
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_lists_get_markers() {
        assert_eq!(render_plain("- a\n- b"), vec!["• a", "• b"]);
        assert_eq!(render_plain("3. x\n4. y"), vec!["3. x", "4. y"]);
    }

    #[test]
    fn test_code_block_is_indented() {
        let out = render_plain("```rust\nfn main() {}\n```");
        assert_eq!(out, vec!["  rust", "  fn main() {}"]);
    }

    #[test]
    fn test_link_shows_destination() {
        let out = render_plain("[Vênus](https://example.org/venus)");
        assert_eq!(out, vec!["Vênus (https://example.org/venus)"]);
    }

    #[test]
    fn test_quote_is_prefixed() {
        let out = render_plain("> citação");
        assert_eq!(out, vec!["│ citação"]);
    }

    #[test]
    fn test_incomplete_markdown_does_not_panic() {
        for text in ["**open", "```\nunterminated", "- ", "[link](", "# "] {
            let _ = render_plain(text);
        }
        assert_eq!(render_plain(""), Vec::<String>::new());
    }
}

use std::path::PathBuf;

use log::{error, info, warn};
use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::client::{ChatClient, ReplyEvent};
use crate::config::{Config, Theme};
use crate::message::{Conversation, Message};
use crate::stream::StreamUpdate;
use crate::tui::AppEvent;
use crate::viewer::{self, ViewerDialog};

pub struct App {
    // Core state
    pub should_quit: bool,
    pub conversation: Conversation,

    // Input box
    pub input: String,
    pub cursor: usize,
    /// A request is in flight; input and submission are disabled.
    pub loading: bool,

    // Message pane scrolling
    pub scroll: u16,
    /// Keep the newest message in view. Cleared when the user scrolls up.
    pub follow_tail: bool,
    pub chat_height: u16,
    pub chat_lines: u16,
    pub chat_area: Option<Rect>,

    // Popups and notices
    pub viewer: Option<ViewerDialog>,
    pub status: Option<String>,

    // Appearance
    pub animation_frame: u8,

    config: Config,
    config_path: Option<PathBuf>,
    client: ChatClient,
    events: UnboundedSender<AppEvent>,
    reply_task: Option<JoinHandle<()>>,
}

impl App {
    /// `config_path` is where theme changes are persisted; `None` keeps them
    /// in memory only.
    pub fn new(
        client: ChatClient,
        config: Config,
        config_path: Option<PathBuf>,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            should_quit: false,
            conversation: Conversation::new(),
            input: String::new(),
            cursor: 0,
            loading: false,
            scroll: 0,
            follow_tail: true,
            chat_height: 0,
            chat_lines: 0,
            chat_area: None,
            viewer: None,
            status: None,
            animation_frame: 0,
            config,
            config_path,
            client,
            events,
            reply_task: None,
        }
    }

    pub fn theme(&self) -> Theme {
        self.config.theme
    }

    pub fn api_url(&self) -> &str {
        self.client.base_url()
    }

    /// Sends the typed message together with the whole history.
    ///
    /// Returns `false` without touching any state when a reply is still
    /// pending or the input is blank.
    pub fn submit(&mut self) -> bool {
        if self.loading || self.input.trim().is_empty() {
            return false;
        }

        let text = std::mem::take(&mut self.input);
        self.cursor = 0;
        self.status = None;
        self.conversation.push(Message::human(text));
        self.loading = true;
        self.follow_tail = true;

        let history = self.conversation.messages().to_vec();
        info!("Sending {} messages to {}", history.len(), self.client.endpoint());

        let tx = self.events.clone();
        let reply = self.client.stream_reply(history, move |event| {
            let _ = tx.send(AppEvent::Reply(event));
        });
        self.reply_task = Some(tokio::spawn(reply));
        true
    }

    pub fn on_reply(&mut self, event: ReplyEvent) {
        match event {
            ReplyEvent::Started => self.conversation.begin_reply(),
            ReplyEvent::Update(update) => {
                if let StreamUpdate::ResourceUrl(url) = &update {
                    info!("Reply carries a 3D resource: {}", url);
                    self.status = Some("Obra em 3D disponível: Ctrl-V para visualizar".to_string());
                }
                if let Some(message) = self.conversation.in_progress_mut() {
                    update.apply(message);
                }
            }
            ReplyEvent::Finished => {
                self.conversation.finish_reply();
                self.loading = false;
                self.reply_task = None;
            }
            ReplyEvent::Failed(e) => {
                error!("Chat request failed: {}", e);
                self.conversation.abandon_reply();
                self.conversation.push(Message::error());
                self.loading = false;
                self.reply_task = None;
            }
        }
        self.follow_tail = true;
    }

    pub fn tick_animation(&mut self) {
        if self.loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn max_scroll(&self) -> u16 {
        self.chat_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_tail = false;
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines);
        if self.scroll >= self.max_scroll() {
            self.scroll = self.max_scroll();
            self.follow_tail = true;
        }
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up((self.chat_height / 2).max(1));
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down((self.chat_height / 2).max(1));
    }

    /// Opens the 3D dialog for the newest message that links to one.
    pub fn open_viewer(&mut self) {
        let newest = self.conversation.resource_indices().last().copied();
        match newest.and_then(|i| {
            self.conversation.messages()[i]
                .resource_url
                .clone()
                .map(|url| ViewerDialog::new(url, i))
        }) {
            Some(dialog) => self.viewer = Some(dialog),
            None => self.status = Some("Nenhuma obra em 3D nesta conversa".to_string()),
        }
    }

    pub fn close_viewer(&mut self) {
        self.viewer = None;
    }

    pub fn open_viewer_in_browser(&mut self) {
        let Some(dialog) = &self.viewer else { return };
        match viewer::open_in_browser(&dialog.url) {
            Ok(()) => self.status = Some("Abrindo no navegador...".to_string()),
            Err(e) => {
                warn!("{:#}", e);
                self.status = Some(format!("Não foi possível abrir o navegador: {}", e));
            }
        }
    }

    pub fn copy_viewer_url(&mut self) {
        let Some(dialog) = &self.viewer else { return };
        match viewer::copy_to_clipboard(&dialog.url) {
            Ok(()) => self.status = Some("Link copiado".to_string()),
            Err(e) => {
                warn!("{:#}", e);
                self.status = Some(format!("Não foi possível copiar: {}", e));
            }
        }
    }

    pub fn toggle_theme(&mut self) {
        self.config.theme = self.config.theme.toggled();
        if let Some(path) = &self.config_path {
            if let Err(e) = self.config.save_to(path) {
                warn!("Could not save theme to {:?}: {:#}", path, e);
            }
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        if let Some(task) = self.reply_task.take() {
            task.abort();
        }
    }
}

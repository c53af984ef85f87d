use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::Result;
use crate::models::{Bookmark, FeedStatus};
use crate::services::{AuthClient, BookmarkGateway, ChangeFeed, FeedMessage, Session, Subscription};
use crate::store::{BookmarkStore, ProvisionalHandle, RemovalHandle};
use crate::tui::AppAction;

// Message for a completed gateway call
#[derive(Debug)]
pub enum GatewayOutcome {
    Loaded(Vec<Bookmark>),
    LoadFailed(String),
    AddDone {
        provisional_id: String,
        result: Bookmark,
    },
    AddFailed {
        provisional_id: String,
        error: String,
    },
    DeleteDone {
        id: String,
    },
    DeleteFailed {
        id: String,
        error: String,
    },
}

/// Which field of the add-bookmark form has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Url,
}

pub struct App {
    // Data
    pub session: Option<Session>,
    pub store: BookmarkStore,
    pub feed_status: FeedStatus,

    // UI State
    pub selected_index: usize,
    pub show_help: bool,
    pub form_active: bool,
    pub form_field: FormField,
    pub title_input: String,
    pub url_input: String,
    pub is_loading: bool,

    // Async state
    gateway_rx: mpsc::Receiver<GatewayOutcome>,
    gateway_tx: mpsc::Sender<GatewayOutcome>,
    subscription: Option<Subscription>,
    pending_adds: HashMap<String, ProvisionalHandle>,
    pending_removes: HashMap<String, RemovalHandle>,

    // Services
    auth: Arc<AuthClient>,
    gateway: Arc<BookmarkGateway>,
    feed: ChangeFeed,
}

impl App {
    pub fn new(config: &Config) -> Result<Self> {
        let auth = Arc::new(AuthClient::new(
            config.backend_url.clone(),
            config.anon_key.clone(),
        )?);
        let gateway = Arc::new(BookmarkGateway::new(
            config.backend_url.clone(),
            config.anon_key.clone(),
        )?);
        let feed = ChangeFeed::new(config.backend_url.clone(), config.anon_key.clone());

        let (gateway_tx, gateway_rx) = mpsc::channel(16);

        Ok(Self {
            session: None,
            store: BookmarkStore::new(),
            feed_status: FeedStatus::Disconnected,
            selected_index: 0,
            show_help: false,
            form_active: false,
            form_field: FormField::Title,
            title_input: String::new(),
            url_input: String::new(),
            is_loading: false,
            gateway_rx,
            gateway_tx,
            subscription: None,
            pending_adds: HashMap::new(),
            pending_removes: HashMap::new(),
            auth,
            gateway,
            feed,
        })
    }

    /// Authenticate, fetch the initial snapshot, and open the realtime
    /// subscription. Until this succeeds the app performs no store
    /// operations.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<()> {
        let session = self.auth.sign_in(email, password).await?;

        let items = self.gateway.list(&session).await?;
        self.store.load(items);

        self.subscription = Some(self.feed.subscribe(&session)?);
        self.feed_status = FeedStatus::Connecting;
        self.session = Some(session);

        Ok(())
    }

    pub fn selected_bookmark(&self) -> Option<&Bookmark> {
        self.store.items().get(self.selected_index)
    }

    pub async fn handle_action(&mut self, action: AppAction) -> Result<bool> {
        match action {
            AppAction::Quit => {
                self.teardown();
                return Ok(true);
            }

            AppAction::SignOut => {
                if let Some(session) = self.session.clone() {
                    self.auth.sign_out(&session).await;
                }
                self.teardown();
                return Ok(true);
            }

            AppAction::MoveUp => {
                if self.selected_index > 0 {
                    self.selected_index -= 1;
                }
            }

            AppAction::MoveDown => {
                let len = self.store.len();
                if len > 0 && self.selected_index < len - 1 {
                    self.selected_index += 1;
                }
            }

            AppAction::Refresh => {
                self.refresh();
            }

            AppAction::NewBookmark => {
                if self.session.is_some() {
                    self.form_active = true;
                    self.form_field = FormField::Title;
                    self.title_input.clear();
                    self.url_input.clear();
                }
            }

            AppAction::DeleteBookmark => {
                self.delete_selected();
            }

            AppAction::ShowHelp => {
                self.show_help = true;
            }

            AppAction::HideHelp => {
                self.show_help = false;
            }

            AppAction::FormChar(c) => match self.form_field {
                FormField::Title => self.title_input.push(c),
                FormField::Url => self.url_input.push(c),
            },

            AppAction::FormBackspace => {
                match self.form_field {
                    FormField::Title => self.title_input.pop(),
                    FormField::Url => self.url_input.pop(),
                };
            }

            AppAction::FormNextField => {
                self.form_field = match self.form_field {
                    FormField::Title => FormField::Url,
                    FormField::Url => FormField::Title,
                };
            }

            AppAction::FormConfirm => {
                self.submit_form();
            }

            AppAction::FormCancel => {
                self.form_active = false;
                self.title_input.clear();
                self.url_input.clear();
            }
        }

        Ok(false)
    }

    /// Optimistic add: the provisional row is visible before the create
    /// request is even sent.
    fn submit_form(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };

        let title = self.title_input.trim().to_string();
        let url = self.url_input.trim().to_string();
        if title.is_empty() || url.is_empty() {
            // Both fields are required; keep the form open
            return;
        }

        let handle = self.store.add_optimistic(&title, &url);
        let provisional_id = handle.id().to_string();
        self.pending_adds.insert(provisional_id.clone(), handle);

        self.form_active = false;
        self.title_input.clear();
        self.url_input.clear();

        let gateway = Arc::clone(&self.gateway);
        let tx = self.gateway_tx.clone();

        tokio::spawn(async move {
            let outcome = match gateway.create(&session, &title, &url).await {
                Ok(result) => GatewayOutcome::AddDone {
                    provisional_id,
                    result,
                },
                Err(e) => GatewayOutcome::AddFailed {
                    provisional_id,
                    error: e.to_string(),
                },
            };
            let _ = tx.send(outcome).await;
        });
    }

    /// Optimistic delete: the row disappears immediately and comes back
    /// only if the backend rejects the delete.
    fn delete_selected(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        let Some(bookmark) = self.selected_bookmark() else {
            return;
        };
        if bookmark.is_provisional() {
            // Not yet confirmed by the backend, nothing durable to delete
            return;
        }
        let id = bookmark.id.clone();

        let Some(handle) = self.store.remove_optimistic(&id) else {
            return;
        };
        self.pending_removes.insert(id.clone(), handle);
        self.clamp_selection();

        let gateway = Arc::clone(&self.gateway);
        let tx = self.gateway_tx.clone();

        tokio::spawn(async move {
            let outcome = match gateway.delete(&session, &id).await {
                Ok(()) => GatewayOutcome::DeleteDone { id },
                Err(e) => GatewayOutcome::DeleteFailed {
                    id,
                    error: e.to_string(),
                },
            };
            let _ = tx.send(outcome).await;
        });
    }

    /// Fetch a fresh authoritative snapshot in the background.
    fn refresh(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        self.is_loading = true;

        let gateway = Arc::clone(&self.gateway);
        let tx = self.gateway_tx.clone();

        tokio::spawn(async move {
            let outcome = match gateway.list(&session).await {
                Ok(items) => GatewayOutcome::Loaded(items),
                Err(e) => GatewayOutcome::LoadFailed(e.to_string()),
            };
            let _ = tx.send(outcome).await;
        });
    }

    /// Poll for completed gateway calls (non-blocking).
    pub fn poll_gateway_results(&mut self) {
        while let Ok(outcome) = self.gateway_rx.try_recv() {
            // Results that straggle in after sign-out must not touch state
            if self.session.is_none() {
                continue;
            }

            match outcome {
                GatewayOutcome::Loaded(items) => {
                    self.store.load(items);
                    self.is_loading = false;
                }
                GatewayOutcome::LoadFailed(error) => {
                    tracing::warn!("snapshot fetch failed: {}", error);
                    self.is_loading = false;
                }
                GatewayOutcome::AddDone {
                    provisional_id,
                    result,
                } => {
                    if let Some(handle) = self.pending_adds.remove(&provisional_id) {
                        self.store.confirm_add(handle, result);
                    }
                }
                GatewayOutcome::AddFailed {
                    provisional_id,
                    error,
                } => {
                    tracing::warn!("create rejected, rolling back: {}", error);
                    if let Some(handle) = self.pending_adds.remove(&provisional_id) {
                        self.store.reject_add(handle);
                    }
                }
                GatewayOutcome::DeleteDone { id } => {
                    if let Some(handle) = self.pending_removes.remove(&id) {
                        self.store.confirm_remove(handle);
                    }
                }
                GatewayOutcome::DeleteFailed { id, error } => {
                    tracing::warn!("delete rejected, restoring: {}", error);
                    if let Some(handle) = self.pending_removes.remove(&id) {
                        self.store.reject_remove(handle);
                    }
                    // The backend's verdict is uncertain; resync the whole
                    // snapshot rather than trust local state
                    self.refresh();
                }
            }

            self.clamp_selection();
        }
    }

    /// Drain pushed changes from the realtime channel (non-blocking).
    pub fn poll_feed(&mut self) {
        let Some(subscription) = self.subscription.as_mut() else {
            return;
        };
        if self.session.is_none() {
            return;
        }

        while let Some(message) = subscription.try_recv() {
            match message {
                FeedMessage::Event(event) => {
                    tracing::debug!("feed event: {:?}", event);
                    self.store.apply_feed_event(event);
                }
                FeedMessage::Status(status) => {
                    self.feed_status = status;
                }
            }
        }

        self.clamp_selection();
    }

    /// Stop the subscription and forget the session. Late gateway results
    /// and feed events become no-ops from here on.
    fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.stop();
        }
        self.feed_status = FeedStatus::Disconnected;
        self.pending_adds.clear();
        self.pending_removes.clear();
        self.session = None;

        self.store.load(Vec::new());
        self.selected_index = 0;
    }

    fn clamp_selection(&mut self) {
        let len = self.store.len();
        if len == 0 {
            self.selected_index = 0;
        } else if self.selected_index >= len {
            self.selected_index = len - 1;
        }
    }
}

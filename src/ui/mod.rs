use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use eframe::egui::{
    self, Align, Align2, Color32, CornerRadius, Frame, Layout, Margin, RichText, Stroke, Vec2,
};
use log::{debug, error, warn};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::{Mutex, mpsc};

use crate::activity::{ActivityRecorder, Severity};
use crate::engine::models::{
    Account, AccountKind, BalanceInfo, BanSource, ChatMessage, FreeStock, Product, Provider,
    Settings, current_account,
};
use crate::engine::state::UserAction;
use crate::engine::{DashboardEngine, EngineEvent};
use crate::modal::ModalController;
use crate::sync::{BALANCE_PERIOD, CHAT_PERIOD, PollerHandle, STOCK_PERIOD, SingleFlight, spawn_poller};

const TOAST_SECS: f32 = 4.0;
const RESULTS_HEIGHT: f32 = 220.0;
const CHAT_HEIGHT: f32 = 180.0;
const ACTIVITY_HEIGHT: f32 = 160.0;

#[derive(Clone, Copy)]
struct Palette {
    bg: Color32,
    panel: Color32,
    surface: Color32,
    border: Color32,
    border_strong: Color32,
    text_primary: Color32,
    text_muted: Color32,
    accent: Color32,
    accent_soft: Color32,
    info: Color32,
    success: Color32,
    warning: Color32,
    danger: Color32,
}

const PALETTE: Palette = Palette {
    bg: Color32::from_rgb(11, 14, 19),
    panel: Color32::from_rgb(17, 22, 29),
    surface: Color32::from_rgb(24, 31, 39),
    border: Color32::from_rgb(45, 57, 72),
    border_strong: Color32::from_rgb(63, 79, 97),
    text_primary: Color32::from_rgb(228, 235, 244),
    text_muted: Color32::from_rgb(167, 182, 197),
    accent: Color32::from_rgb(92, 219, 195),
    accent_soft: Color32::from_rgb(63, 140, 125),
    info: Color32::from_rgb(122, 186, 255),
    success: Color32::from_rgb(118, 219, 145),
    warning: Color32::from_rgb(246, 195, 111),
    danger: Color32::from_rgb(239, 117, 117),
};

fn tint(color: Color32, alpha: u8) -> Color32 {
    Color32::from_rgba_premultiplied(color.r(), color.g(), color.b(), alpha)
}

fn severity_color(palette: &Palette, severity: Severity) -> Color32 {
    match severity {
        Severity::Info => palette.info,
        Severity::Success => palette.success,
        Severity::Warning => palette.warning,
        Severity::Error => palette.danger,
    }
}

fn section_frame(palette: &Palette) -> Frame {
    Frame::new()
        .fill(palette.surface)
        .stroke(Stroke::new(1.0, palette.border))
        .corner_radius(CornerRadius::same(12))
        .inner_margin(Margin::same(12))
}

fn apply_theme(ctx: &egui::Context, palette: &Palette) {
    let mut visuals = egui::Visuals::dark();
    visuals.panel_fill = palette.bg;
    visuals.window_fill = palette.panel;
    visuals.window_stroke = Stroke::new(1.0, palette.border_strong);
    visuals.override_text_color = Some(palette.text_primary);
    visuals.widgets.inactive.bg_fill = palette.surface;
    visuals.widgets.hovered.bg_fill = palette.accent_soft;
    visuals.selection.bg_fill = palette.accent_soft;
    ctx.set_visuals(visuals);
}

fn build_runtime() -> Arc<Runtime> {
    match Runtime::new() {
        Ok(rt) => Arc::new(rt),
        Err(err) => {
            warn!(
                "ui: failed to create multithreaded runtime ({}); trying single-threaded runtime",
                err
            );
            match Builder::new_current_thread().enable_all().build() {
                Ok(rt) => Arc::new(rt),
                Err(fallback_err) => {
                    error!(
                        "ui: failed to create any Tokio runtime ({}); terminating dashboard",
                        fallback_err
                    );
                    std::process::exit(1);
                }
            }
        }
    }
}

struct Toast {
    message: String,
    severity: Severity,
    age: f32,
}

#[derive(Clone, Copy, Debug)]
enum PollKind {
    Stock,
    Balance,
    Chat,
}

/// Payload of the single live dialog.
pub enum ModalContent {
    FreeAccounts {
        mori: Option<FreeStock>,
        mylo: Option<FreeStock>,
    },
    Captcha {
        link: String,
        provider: Provider,
        kind: AccountKind,
    },
    AddToken {
        input: String,
    },
    DecodeToken {
        input: String,
    },
    Accounts {
        accounts: Vec<Account>,
        confirm_remove: Option<String>,
    },
    AccountInfo {
        username: String,
        info: String,
    },
    Settings {
        stock_notifications: bool,
        startup_sound: bool,
        ban_source: BanSource,
        manual_token: String,
        ban_status: Option<(Severity, String)>,
        checking: bool,
    },
    ChatSettings {
        chat_name: String,
        gemini_api_key: String,
    },
    ConfirmCheckAll {
        total: usize,
    },
}

fn modal_title(content: &ModalContent) -> &'static str {
    match content {
        ModalContent::FreeAccounts { .. } => "Free Accounts",
        ModalContent::Captcha { .. } => "Captcha Required",
        ModalContent::AddToken { .. } => "Add Custom Token",
        ModalContent::DecodeToken { .. } => "Decode Token",
        ModalContent::Accounts { .. } => "Accounts",
        ModalContent::AccountInfo { .. } => "Account Info",
        ModalContent::Settings { .. } => "Settings",
        ModalContent::ChatSettings { .. } => "Chat Settings",
        ModalContent::ConfirmCheckAll { .. } => "Check All Tokens",
    }
}

/// Deferred effects collected while the dialog renders. They are applied
/// afterwards, and only if the dialog's generation is still live.
enum ModalCommand {
    Trigger(UserAction),
    Close,
    OpenLink(String),
    ConfirmBatch,
    BeginBatch,
}

pub struct DashboardApp {
    runtime: Arc<Runtime>,
    engine: Arc<Mutex<DashboardEngine>>,
    events_rx: mpsc::UnboundedReceiver<EngineEvent>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    settings: Settings,
    accounts: Vec<Account>,
    stock: Vec<Product>,
    chat: Vec<ChatMessage>,
    balance: Option<BalanceInfo>,
    api_key_input: String,
    hypixel_key_input: String,
    hypixel_enabled_input: bool,
    purchase_kind: String,
    purchase_amount: String,
    chat_input: String,
    results_report: String,
    batch_progress: Option<(usize, usize)>,
    batch_running: bool,
    last_free_fetch: Option<(Provider, AccountKind)>,
    activity: ActivityRecorder,
    toasts: Vec<Toast>,
    modal: ModalController<ModalContent>,
    stock_gate: SingleFlight,
    balance_gate: SingleFlight,
    chat_gate: SingleFlight,
    pollers: Vec<PollerHandle>,
    chat_poller_started: bool,
}

fn spawn_engine_poller(
    runtime: &Handle,
    name: &'static str,
    period: Duration,
    gate: SingleFlight,
    engine: Arc<Mutex<DashboardEngine>>,
    tx: mpsc::UnboundedSender<EngineEvent>,
    kind: PollKind,
) -> PollerHandle {
    spawn_poller(runtime, name, period, gate, move || {
        let engine = engine.clone();
        let tx = tx.clone();
        async move {
            let mut engine = engine.lock().await;
            match kind {
                PollKind::Stock => engine.refresh_stock(&tx).await,
                PollKind::Balance => engine.refresh_balance(&tx).await,
                PollKind::Chat => engine.refresh_chat(&tx).await,
            }
        }
    })
}

impl DashboardApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, base_url: String) -> Self {
        let runtime = build_runtime();

        let engine = DashboardEngine::new(crate::gateway::ApiClient::new(base_url));
        let engine = Arc::new(Mutex::new(engine));
        let (tx, rx) = mpsc::unbounded_channel();

        let bootstrap_engine = engine.clone();
        let bootstrap_tx = tx.clone();
        runtime.spawn(async move {
            let mut locked = bootstrap_engine.lock().await;
            locked.startup(&bootstrap_tx).await;
        });

        let stock_gate = SingleFlight::new();
        let balance_gate = SingleFlight::new();
        let chat_gate = SingleFlight::new();
        let pollers = vec![
            spawn_engine_poller(
                runtime.handle(),
                "stock",
                STOCK_PERIOD,
                stock_gate.clone(),
                engine.clone(),
                tx.clone(),
                PollKind::Stock,
            ),
            spawn_engine_poller(
                runtime.handle(),
                "balance",
                BALANCE_PERIOD,
                balance_gate.clone(),
                engine.clone(),
                tx.clone(),
                PollKind::Balance,
            ),
        ];

        Self {
            runtime,
            engine,
            events_rx: rx,
            events_tx: tx,
            settings: Settings::default(),
            accounts: Vec::new(),
            stock: Vec::new(),
            chat: Vec::new(),
            balance: None,
            api_key_input: String::new(),
            hypixel_key_input: String::new(),
            hypixel_enabled_input: true,
            purchase_kind: String::new(),
            purchase_amount: "1".to_owned(),
            chat_input: String::new(),
            results_report: String::new(),
            batch_progress: None,
            batch_running: false,
            last_free_fetch: None,
            activity: ActivityRecorder::new(),
            toasts: Vec::new(),
            modal: ModalController::new(),
            stock_gate,
            balance_gate,
            chat_gate,
            pollers,
            chat_poller_started: false,
        }
    }

    fn trigger_action(&self, action: UserAction) {
        let engine = self.engine.clone();
        let tx = self.events_tx.clone();
        let rt = self.runtime.clone();
        rt.spawn(async move {
            let mut locked = engine.lock().await;
            locked.handle_action(action, &tx).await;
        });
    }

    /// Manual refresh sharing the poller's gate, so a button press while a
    /// poll is in flight is dropped instead of queued.
    fn start_gated_refresh(&self, kind: PollKind) {
        let gate = match kind {
            PollKind::Stock => &self.stock_gate,
            PollKind::Balance => &self.balance_gate,
            PollKind::Chat => &self.chat_gate,
        };
        let Some(guard) = gate.try_begin() else {
            debug!("manual {kind:?} refresh dropped: poll in flight");
            return;
        };
        let engine = self.engine.clone();
        let tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            let mut engine = engine.lock().await;
            match kind {
                PollKind::Stock => engine.refresh_stock(&tx).await,
                PollKind::Balance => engine.refresh_balance(&tx).await,
                PollKind::Chat => engine.refresh_chat(&tx).await,
            }
            drop(guard);
        });
    }

    fn start_chat_poller(&mut self) {
        if self.chat_poller_started {
            return;
        }
        self.chat_poller_started = true;
        self.pollers.push(spawn_engine_poller(
            self.runtime.handle(),
            "chat",
            CHAT_PERIOD,
            self.chat_gate.clone(),
            self.engine.clone(),
            self.events_tx.clone(),
            PollKind::Chat,
        ));
    }

    fn push_toast(&mut self, severity: Severity, message: String) {
        self.toasts.push(Toast {
            message,
            severity,
            age: 0.0,
        });
    }

    fn sync_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                EngineEvent::Settings(settings) => {
                    self.settings = settings;
                }
                EngineEvent::Config(config) => {
                    self.api_key_input = config.api_key;
                    self.hypixel_key_input = config.hypixel_key;
                    self.hypixel_enabled_input = config.hypixel_enabled;
                }
                EngineEvent::Accounts(accounts) => {
                    self.accounts = accounts;
                    if matches!(self.modal.content(), Some(ModalContent::Accounts { .. })) {
                        self.modal.refresh(ModalContent::Accounts {
                            accounts: self.accounts.clone(),
                            confirm_remove: None,
                        });
                    }
                }
                EngineEvent::Balance(balance) => {
                    self.balance = Some(balance);
                }
                EngineEvent::Stock(products) => {
                    self.stock = products;
                    if self.purchase_kind.is_empty()
                        && let Some(first) = self.stock.first()
                    {
                        self.purchase_kind = first.name.clone();
                    }
                }
                EngineEvent::Chat(messages) => {
                    self.chat = messages;
                }
                EngineEvent::FreeStock { provider, stock } => {
                    if let Some(ModalContent::FreeAccounts { mori, mylo }) =
                        self.modal.content_mut()
                    {
                        match provider {
                            Provider::Mori => *mori = Some(stock),
                            Provider::MyloAlts => *mylo = Some(stock),
                        }
                    }
                }
                EngineEvent::Toast { severity, message } => {
                    self.push_toast(severity, message);
                }
                EngineEvent::Log { severity, message } => {
                    self.activity.record(message, severity);
                }
                EngineEvent::Report(text) => {
                    self.results_report = text;
                }
                EngineEvent::ReportAppend(line) => {
                    if !self.results_report.is_empty() {
                        self.results_report.push('\n');
                    }
                    self.results_report.push_str(&line);
                }
                EngineEvent::BatchProgress { processed, total } => {
                    self.batch_progress = Some((processed, total));
                }
                EngineEvent::BatchFinished(_) => {
                    self.batch_running = false;
                    self.batch_progress = None;
                }
                EngineEvent::BanVerdict { banned, message } => {
                    if let Some(ModalContent::Settings {
                        ban_status,
                        checking,
                        ..
                    }) = self.modal.content_mut()
                    {
                        *checking = false;
                        let severity = if banned {
                            Severity::Warning
                        } else {
                            Severity::Success
                        };
                        let label = if banned { "BANNED" } else { "NOT BANNED" };
                        let text = if message.is_empty() {
                            label.to_owned()
                        } else {
                            format!("{label}: {message}")
                        };
                        *ban_status = Some((severity, text));
                    }
                }
                EngineEvent::BanCheckFailed { message } => {
                    if let Some(ModalContent::Settings {
                        ban_status,
                        checking,
                        ..
                    }) = self.modal.content_mut()
                    {
                        *checking = false;
                        *ban_status = Some((Severity::Error, format!("Check failed: {message}")));
                    }
                }
                EngineEvent::CaptchaRequired { link } => {
                    let (provider, kind) = self
                        .last_free_fetch
                        .unwrap_or((Provider::Mori, AccountKind::Unbanned));
                    self.modal.open(ModalContent::Captcha {
                        link,
                        provider,
                        kind,
                    });
                }
                EngineEvent::AccountInfo { username, info } => {
                    self.modal.open(ModalContent::AccountInfo { username, info });
                }
                EngineEvent::CloseModal => {
                    self.modal.close();
                }
                EngineEvent::ChatReady => {
                    self.start_chat_poller();
                }
            }
        }
    }

    fn open_settings_modal(&mut self) {
        self.modal.open(ModalContent::Settings {
            stock_notifications: self.settings.stock_notifications_enabled,
            startup_sound: self.settings.startup_sound_enabled,
            ban_source: BanSource::Current,
            manual_token: String::new(),
            ban_status: None,
            checking: false,
        });
    }

    fn open_free_accounts_modal(&mut self) {
        self.modal.open(ModalContent::FreeAccounts {
            mori: None,
            mylo: None,
        });
        self.trigger_action(UserAction::LoadFreeStock);
    }

    fn export_data(&self) {
        let path = std::path::PathBuf::from(format!(
            "alts-export-{}.json",
            Local::now().format("%Y%m%d-%H%M%S")
        ));
        self.trigger_action(UserAction::ExportData { path });
    }

    fn chat_configured(&self) -> bool {
        self.settings.chat_enabled && !self.settings.chat_api_url.is_empty()
    }

    fn render_top_bar(&mut self, ctx: &egui::Context, palette: &Palette) {
        egui::TopBottomPanel::top("top_bar")
            .frame(
                Frame::new()
                    .fill(palette.panel)
                    .stroke(Stroke::new(1.0, palette.border))
                    .inner_margin(Margin::symmetric(16, 12)),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.vertical(|ui| {
                        ui.heading(RichText::new("Alts Dashboard").color(palette.accent));
                        match current_account(&self.accounts) {
                            Some(account) => {
                                let mut line = format!("Current account: {}", account.username);
                                if let Some(info) = &account.server_info
                                    && info.on_server
                                {
                                    let server =
                                        info.server_name.as_deref().unwrap_or("a server");
                                    line.push_str(&format!(" (online: {server})"));
                                }
                                ui.label(RichText::new(line).color(palette.text_muted));
                            }
                            None => {
                                ui.label(
                                    RichText::new("No account selected")
                                        .color(palette.text_muted),
                                );
                            }
                        }
                    });
                    ui.allocate_ui_with_layout(
                        ui.available_size_before_wrap(),
                        Layout::right_to_left(Align::Center),
                        |ui| {
                            if ui.button("Export Data").clicked() {
                                self.export_data();
                            }
                            if ui.button("Chat Settings").clicked() {
                                self.modal.open(ModalContent::ChatSettings {
                                    chat_name: self.settings.chat_name.clone(),
                                    gemini_api_key: self.settings.gemini_api_key.clone(),
                                });
                            }
                            if ui.button("Settings").clicked() {
                                self.open_settings_modal();
                            }
                            if ui.button("Accounts").clicked() {
                                self.modal.open(ModalContent::Accounts {
                                    accounts: self.accounts.clone(),
                                    confirm_remove: None,
                                });
                            }
                        },
                    );
                });
            });
    }

    fn render_config_section(&mut self, ui: &mut egui::Ui, palette: &Palette) {
        section_frame(palette).show(ui, |ui| {
            ui.label(RichText::new("Configuration").strong().color(palette.accent));
            ui.add_space(6.0);
            egui::Grid::new("config_grid").num_columns(2).show(ui, |ui| {
                ui.label("API key");
                ui.add(
                    egui::TextEdit::singleline(&mut self.api_key_input)
                        .password(true)
                        .desired_width(280.0),
                );
                ui.end_row();
                ui.label("Hypixel key");
                ui.add(
                    egui::TextEdit::singleline(&mut self.hypixel_key_input)
                        .password(true)
                        .desired_width(280.0),
                );
                ui.end_row();
            });
            ui.checkbox(&mut self.hypixel_enabled_input, "Hypixel integration");
            ui.add_space(4.0);
            if ui.button("Save configuration").clicked() {
                self.trigger_action(UserAction::SaveConfig {
                    api_key: self.api_key_input.clone(),
                    hypixel_key: self.hypixel_key_input.clone(),
                    hypixel_enabled: self.hypixel_enabled_input,
                });
            }
        });
    }

    fn render_balance_section(&mut self, ui: &mut egui::Ui, palette: &Palette) {
        section_frame(palette).show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.label(RichText::new("Balance").strong().color(palette.accent));
                if ui.button("Refresh").clicked() {
                    self.start_gated_refresh(PollKind::Balance);
                }
            });
            match &self.balance {
                Some(balance) => {
                    let color = if balance.out_of_credits {
                        palette.danger
                    } else {
                        palette.text_primary
                    };
                    ui.label(
                        RichText::new(format!("{} credits", balance.balance))
                            .size(22.0)
                            .color(color),
                    );
                    if balance.out_of_credits {
                        ui.label(RichText::new("Out of credits").color(palette.danger));
                    }
                }
                None => {
                    ui.label(RichText::new("Not loaded yet").color(palette.text_muted));
                }
            }
        });
    }

    fn render_stock_section(&mut self, ui: &mut egui::Ui, palette: &Palette) {
        section_frame(palette).show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.label(RichText::new("Stock").strong().color(palette.accent));
                if ui.button("Refresh").clicked() {
                    self.start_gated_refresh(PollKind::Stock);
                }
            });
            if self.stock.is_empty() {
                ui.label(RichText::new("No products loaded").color(palette.text_muted));
                return;
            }
            egui::Grid::new("stock_grid")
                .num_columns(4)
                .striped(true)
                .show(ui, |ui| {
                    ui.label(RichText::new("Product").color(palette.text_muted));
                    ui.label(RichText::new("Price").color(palette.text_muted));
                    ui.label(RichText::new("Stock").color(palette.text_muted));
                    ui.label(RichText::new("Status").color(palette.text_muted));
                    ui.end_row();
                    for product in &self.stock {
                        ui.label(&product.name);
                        ui.label(format!("{} credits", product.price));
                        ui.label(product.stock.to_string());
                        if product.in_stock {
                            ui.label(RichText::new("in stock").color(palette.success));
                        } else {
                            ui.label(RichText::new("sold out").color(palette.danger));
                        }
                        ui.end_row();
                    }
                });
        });
    }

    fn render_purchase_section(&mut self, ui: &mut egui::Ui, palette: &Palette) {
        section_frame(palette).show(ui, |ui| {
            ui.label(RichText::new("Purchase").strong().color(palette.accent));
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                egui::ComboBox::from_id_salt("purchase_kind")
                    .selected_text(if self.purchase_kind.is_empty() {
                        "select product"
                    } else {
                        self.purchase_kind.as_str()
                    })
                    .show_ui(ui, |ui| {
                        for product in &self.stock {
                            ui.selectable_value(
                                &mut self.purchase_kind,
                                product.name.clone(),
                                product.name.as_str(),
                            );
                        }
                    });
                ui.add(
                    egui::TextEdit::singleline(&mut self.purchase_amount)
                        .desired_width(60.0)
                        .hint_text("amount"),
                );
                if ui.button("Buy").clicked() {
                    match parse_purchase_amount(&self.purchase_amount) {
                        Some(amount) if !self.purchase_kind.is_empty() => {
                            self.trigger_action(UserAction::Purchase {
                                kind: self.purchase_kind.clone(),
                                amount,
                            });
                        }
                        Some(_) => {
                            self.push_toast(Severity::Error, "Select a product first".into());
                        }
                        None => {
                            self.push_toast(Severity::Error, "Amount must be at least 1".into());
                        }
                    }
                }
            });
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                if ui.button("Free accounts").clicked() {
                    self.open_free_accounts_modal();
                }
                if ui.button("Add token").clicked() {
                    self.modal.open(ModalContent::AddToken {
                        input: String::new(),
                    });
                }
                if ui.button("Decode token").clicked() {
                    self.modal.open(ModalContent::DecodeToken {
                        input: String::new(),
                    });
                }
            });
        });
    }

    fn render_results_section(&mut self, ui: &mut egui::Ui, palette: &Palette) {
        if self.results_report.is_empty() && !self.batch_running {
            return;
        }
        section_frame(palette).show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.label(RichText::new("Results").strong().color(palette.accent));
                if !self.batch_running && ui.button("Clear").clicked() {
                    self.results_report.clear();
                }
            });
            if let Some((processed, total)) = self.batch_progress {
                let fraction = if total == 0 {
                    0.0
                } else {
                    processed as f32 / total as f32
                };
                ui.add(
                    egui::ProgressBar::new(fraction)
                        .text(format!("Checking {processed}/{total}")),
                );
            }
            egui::ScrollArea::vertical()
                .id_salt("results_scroll")
                .max_height(RESULTS_HEIGHT)
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    ui.monospace(&self.results_report);
                });
        });
    }

    fn render_chat_section(&mut self, ui: &mut egui::Ui, palette: &Palette) {
        if !self.chat_configured() {
            return;
        }
        section_frame(palette).show(ui, |ui| {
            ui.label(RichText::new("Chat").strong().color(palette.accent));
            egui::ScrollArea::vertical()
                .id_salt("chat_scroll")
                .max_height(CHAT_HEIGHT)
                .show(ui, |ui| {
                    // Most recent message first.
                    for message in self.chat.iter().rev() {
                        ui.horizontal_wrapped(|ui| {
                            ui.label(
                                RichText::new(format!("[{}]", message.timestamp))
                                    .color(palette.text_muted),
                            );
                            ui.label(
                                RichText::new(format!("{}:", message.username))
                                    .color(palette.accent),
                            );
                            ui.label(&message.message);
                        });
                    }
                });
            ui.horizontal(|ui| {
                let response = ui.add(
                    egui::TextEdit::singleline(&mut self.chat_input)
                        .desired_width(ui.available_width() - 70.0)
                        .hint_text("Say something"),
                );
                let submitted =
                    response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                if (ui.button("Send").clicked() || submitted)
                    && !self.chat_input.trim().is_empty()
                {
                    self.trigger_action(UserAction::SendChat {
                        message: self.chat_input.clone(),
                    });
                    self.chat_input.clear();
                }
            });
        });
    }

    fn render_activity_section(&mut self, ui: &mut egui::Ui, palette: &Palette) {
        section_frame(palette).show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.label(RichText::new("Activity").strong().color(palette.accent));
                if ui.button("Clear log").clicked() {
                    self.activity.clear();
                }
            });
            egui::ScrollArea::vertical()
                .id_salt("activity_scroll")
                .max_height(ACTIVITY_HEIGHT)
                .show(ui, |ui| {
                    for entry in self.activity.entries() {
                        ui.horizontal_wrapped(|ui| {
                            ui.label(
                                RichText::new(entry.timestamp.format("%H:%M:%S").to_string())
                                    .color(palette.text_muted),
                            );
                            ui.label(
                                RichText::new(entry.severity.label())
                                    .color(severity_color(palette, entry.severity)),
                            );
                            ui.label(&entry.message);
                        });
                    }
                });
        });
    }

    fn render_toasts(&self, ctx: &egui::Context, palette: &Palette) {
        if self.toasts.is_empty() {
            return;
        }
        egui::Area::new(egui::Id::new("toasts"))
            .anchor(Align2::RIGHT_TOP, Vec2::new(-16.0, 56.0))
            .show(ctx, |ui| {
                for toast in &self.toasts {
                    let color = severity_color(palette, toast.severity);
                    Frame::new()
                        .fill(tint(color, 36))
                        .stroke(Stroke::new(1.0, color))
                        .corner_radius(CornerRadius::same(8))
                        .inner_margin(Margin::symmetric(12, 8))
                        .show(ui, |ui| {
                            ui.label(RichText::new(&toast.message).color(palette.text_primary));
                        });
                    ui.add_space(6.0);
                }
            });
    }

    fn render_modal(&mut self, ctx: &egui::Context, palette: &Palette) {
        let Some(generation) = self.modal.generation() else {
            return;
        };
        let opacity = self.modal.opacity();
        let title = self.modal.content().map(modal_title).unwrap_or_default();
        let mut commands: Vec<ModalCommand> = Vec::new();
        let mut stay_open = true;

        if let Some(content) = self.modal.content_mut() {
            egui::Window::new(title)
                .collapsible(false)
                .resizable(false)
                .anchor(Align2::CENTER_CENTER, Vec2::ZERO)
                .default_width(440.0)
                .open(&mut stay_open)
                .show(ctx, |ui| {
                    ui.set_opacity(opacity);
                    render_modal_content(ui, content, palette, &mut commands);
                });
        }
        if !stay_open {
            commands.push(ModalCommand::Close);
        }

        for command in commands {
            if !self.modal.accepts(generation) {
                break;
            }
            match command {
                ModalCommand::Trigger(action) => {
                    if let UserAction::FetchFreeAccount { provider, kind } = &action {
                        self.last_free_fetch = Some((*provider, *kind));
                    }
                    self.trigger_action(action);
                }
                ModalCommand::Close => self.modal.close(),
                ModalCommand::OpenLink(link) => {
                    if let Err(err) = open::that(&link) {
                        self.push_toast(
                            Severity::Error,
                            format!("Failed to open captcha page: {err}"),
                        );
                    }
                }
                ModalCommand::ConfirmBatch => {
                    self.modal.open(ModalContent::ConfirmCheckAll {
                        total: self.accounts.len(),
                    });
                }
                ModalCommand::BeginBatch => {
                    self.batch_running = true;
                    self.batch_progress = None;
                    self.modal.close();
                    self.trigger_action(UserAction::CheckAllTokens);
                }
            }
        }
    }
}

fn render_modal_content(
    ui: &mut egui::Ui,
    content: &mut ModalContent,
    palette: &Palette,
    commands: &mut Vec<ModalCommand>,
) {
    match content {
        ModalContent::FreeAccounts { mori, mylo } => {
            for (provider, stock) in [(Provider::Mori, &*mori), (Provider::MyloAlts, &*mylo)] {
                ui.label(
                    RichText::new(provider.display_name())
                        .strong()
                        .color(palette.accent),
                );
                match stock {
                    Some(stock) => {
                        ui.horizontal(|ui| {
                            ui.label(format!(
                                "{} unbanned, {} banned available",
                                stock.unbanned, stock.banned
                            ));
                            if ui.button("Fetch unbanned").clicked() {
                                commands.push(ModalCommand::Trigger(
                                    UserAction::FetchFreeAccount {
                                        provider,
                                        kind: AccountKind::Unbanned,
                                    },
                                ));
                            }
                            if ui.button("Fetch banned").clicked() {
                                commands.push(ModalCommand::Trigger(
                                    UserAction::FetchFreeAccount {
                                        provider,
                                        kind: AccountKind::Banned,
                                    },
                                ));
                            }
                        });
                    }
                    None => {
                        ui.label(RichText::new("Loading stock...").color(palette.text_muted));
                    }
                }
                ui.add_space(8.0);
            }
        }
        ModalContent::Captcha {
            link,
            provider,
            kind,
        } => {
            ui.label(format!(
                "A captcha must be solved before fetching from {}.",
                provider.display_name()
            ));
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                if ui.button("Open captcha page").clicked() {
                    commands.push(ModalCommand::OpenLink(link.clone()));
                }
                if ui.button("I solved it, retry").clicked() {
                    commands.push(ModalCommand::Trigger(UserAction::FetchFreeAccount {
                        provider: *provider,
                        kind: *kind,
                    }));
                }
                if ui.button("Cancel").clicked() {
                    commands.push(ModalCommand::Close);
                }
            });
        }
        ModalContent::AddToken { input } => {
            ui.label("Paste a token, email:password | token, or Accesstoken:... line.");
            ui.add(
                egui::TextEdit::multiline(input)
                    .desired_rows(3)
                    .desired_width(400.0),
            );
            ui.horizontal(|ui| {
                if ui.button("Add").clicked() {
                    commands.push(ModalCommand::Trigger(UserAction::AddCustomToken {
                        raw: input.clone(),
                    }));
                }
                if ui.button("Cancel").clicked() {
                    commands.push(ModalCommand::Close);
                }
            });
        }
        ModalContent::DecodeToken { input } => {
            ui.label("Paste the token to decode.");
            ui.add(
                egui::TextEdit::multiline(input)
                    .desired_rows(3)
                    .desired_width(400.0),
            );
            ui.horizontal(|ui| {
                if ui.button("Decode").clicked() {
                    commands.push(ModalCommand::Trigger(UserAction::DecodeToken {
                        raw: input.clone(),
                    }));
                }
                if ui.button("Cancel").clicked() {
                    commands.push(ModalCommand::Close);
                }
            });
        }
        ModalContent::Accounts {
            accounts,
            confirm_remove,
        } => {
            if accounts.is_empty() {
                ui.label(RichText::new("No accounts stored").color(palette.text_muted));
            }
            let mut request_remove: Option<String> = None;
            egui::ScrollArea::vertical()
                .id_salt("accounts_scroll")
                .max_height(320.0)
                .show(ui, |ui| {
                    for account in accounts.iter() {
                        ui.horizontal(|ui| {
                            let name = if account.current {
                                RichText::new(&account.username).color(palette.accent)
                            } else {
                                RichText::new(&account.username)
                            };
                            ui.label(name);
                            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                                if ui.button("Remove").clicked() {
                                    request_remove = Some(account.username.clone());
                                }
                                if ui.button("Info").clicked() {
                                    commands.push(ModalCommand::Trigger(
                                        UserAction::ViewAccountInfo {
                                            username: account.username.clone(),
                                            token: account.token.clone(),
                                        },
                                    ));
                                }
                                if !account.current && ui.button("Switch").clicked() {
                                    commands.push(ModalCommand::Trigger(
                                        UserAction::SwitchAccount {
                                            username: account.username.clone(),
                                        },
                                    ));
                                }
                            });
                        });
                        ui.separator();
                    }
                });
            if let Some(username) = request_remove {
                *confirm_remove = Some(username);
            }
            if let Some(username) = confirm_remove.clone() {
                ui.label(
                    RichText::new(format!("Remove {username}? This cannot be undone."))
                        .color(palette.warning),
                );
                ui.horizontal(|ui| {
                    if ui.button("Yes, remove").clicked() {
                        commands.push(ModalCommand::Trigger(UserAction::RemoveAccount {
                            username,
                        }));
                        *confirm_remove = None;
                    } else if ui.button("No").clicked() {
                        *confirm_remove = None;
                    }
                });
            }
        }
        ModalContent::AccountInfo { username, info } => {
            ui.label(RichText::new(&*username).strong().color(palette.accent));
            egui::ScrollArea::vertical()
                .id_salt("account_info_scroll")
                .max_height(320.0)
                .show(ui, |ui| {
                    ui.monospace(&*info);
                });
            if ui.button("Close").clicked() {
                commands.push(ModalCommand::Close);
            }
        }
        ModalContent::Settings {
            stock_notifications,
            startup_sound,
            ban_source,
            manual_token,
            ban_status,
            checking,
        } => {
            ui.checkbox(stock_notifications, "Restock notifications");
            ui.checkbox(startup_sound, "Startup sound");
            if ui.button("Save").clicked() {
                commands.push(ModalCommand::Trigger(UserAction::SaveSettings {
                    stock_notifications: *stock_notifications,
                    startup_sound: *startup_sound,
                }));
            }
            ui.separator();
            ui.label(RichText::new("Ban check").strong().color(palette.accent));
            egui::ComboBox::from_id_salt("ban_source")
                .selected_text(ban_source.label())
                .show_ui(ui, |ui| {
                    for source in [BanSource::Current, BanSource::Purchased, BanSource::Manual] {
                        ui.selectable_value(ban_source, source, source.label());
                    }
                });
            if *ban_source == BanSource::Manual {
                ui.add(
                    egui::TextEdit::singleline(manual_token)
                        .hint_text("token")
                        .desired_width(380.0),
                );
            }
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(!*checking, egui::Button::new("Check ban"))
                    .clicked()
                {
                    *checking = true;
                    *ban_status = None;
                    let token = (*ban_source == BanSource::Manual)
                        .then(|| manual_token.clone());
                    commands.push(ModalCommand::Trigger(UserAction::CheckBan {
                        source: *ban_source,
                        token,
                    }));
                }
                if ui.button("Check all tokens").clicked() {
                    commands.push(ModalCommand::ConfirmBatch);
                }
            });
            if *checking {
                ui.label(RichText::new("Checking...").color(palette.text_muted));
            }
            if let Some((severity, message)) = ban_status {
                ui.label(RichText::new(&*message).color(severity_color(palette, *severity)));
            }
        }
        ModalContent::ChatSettings {
            chat_name,
            gemini_api_key,
        } => {
            egui::Grid::new("chat_settings_grid")
                .num_columns(2)
                .show(ui, |ui| {
                    ui.label("Display name");
                    ui.add(egui::TextEdit::singleline(chat_name).desired_width(260.0));
                    ui.end_row();
                    ui.label("Gemini API key");
                    ui.add(
                        egui::TextEdit::singleline(gemini_api_key)
                            .password(true)
                            .desired_width(260.0),
                    );
                    ui.end_row();
                });
            ui.horizontal(|ui| {
                if ui.button("Save").clicked() {
                    commands.push(ModalCommand::Trigger(UserAction::SaveChatSettings {
                        chat_name: chat_name.clone(),
                        gemini_api_key: gemini_api_key.clone(),
                    }));
                }
                if ui.button("Cancel").clicked() {
                    commands.push(ModalCommand::Close);
                }
            });
        }
        ModalContent::ConfirmCheckAll { total } => {
            ui.label(format!(
                "This will check all {total} stored accounts one at a time."
            ));
            ui.label(
                RichText::new("It may take a while and cannot be cancelled once started.")
                    .color(palette.warning),
            );
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                if ui.button("Run check").clicked() {
                    commands.push(ModalCommand::BeginBatch);
                }
                if ui.button("Cancel").clicked() {
                    commands.push(ModalCommand::Close);
                }
            });
        }
    }
}

fn parse_purchase_amount(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|amount| *amount >= 1)
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &eframe::egui::Context, _frame: &mut eframe::Frame) {
        self.sync_events();

        let dt = ctx.input(|i| i.stable_dt).min(0.1);
        self.modal.tick(dt);
        for toast in &mut self.toasts {
            toast.age += dt;
        }
        self.toasts.retain(|toast| toast.age < TOAST_SECS);

        let palette = PALETTE;
        apply_theme(ctx, &palette);

        self.render_top_bar(ctx, &palette);
        egui::CentralPanel::default()
            .frame(Frame::new().fill(palette.bg).inner_margin(Margin::same(16)))
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.render_config_section(ui, &palette);
                    ui.add_space(10.0);
                    self.render_balance_section(ui, &palette);
                    ui.add_space(10.0);
                    self.render_stock_section(ui, &palette);
                    ui.add_space(10.0);
                    self.render_purchase_section(ui, &palette);
                    ui.add_space(10.0);
                    self.render_results_section(ui, &palette);
                    ui.add_space(10.0);
                    self.render_chat_section(ui, &palette);
                    ui.add_space(10.0);
                    self.render_activity_section(ui, &palette);
                });
            });

        self.render_toasts(ctx, &palette);
        self.render_modal(ctx, &palette);

        if self.modal.animating() || !self.toasts.is_empty() || self.batch_running {
            ctx.request_repaint();
        }
        // Background polls deliver events without any user input.
        ctx.request_repaint_after(Duration::from_millis(500));
    }
}

impl Drop for DashboardApp {
    fn drop(&mut self) {
        for poller in &self.pollers {
            poller.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_purchase_amount;

    #[test]
    fn accepts_positive_amounts_with_whitespace() {
        assert_eq!(parse_purchase_amount(" 3 "), Some(3));
        assert_eq!(parse_purchase_amount("1"), Some(1));
    }

    #[test]
    fn rejects_zero_negative_and_garbage() {
        assert_eq!(parse_purchase_amount("0"), None);
        assert_eq!(parse_purchase_amount("-2"), None);
        assert_eq!(parse_purchase_amount("three"), None);
        assert_eq!(parse_purchase_amount(""), None);
    }
}

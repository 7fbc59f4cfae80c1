use chrono::Local;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::activity::Severity;
use crate::batch::{self, BatchSummary};
use crate::engine::models::{
    Account, AccountKind, BalanceInfo, BanSource, ChatMessage, ConfigData, FreeStock, Product,
    Provider, PurchaseReceipt, Settings, SettingsPatch,
};
use crate::engine::state::{DashboardState, UserAction};
use crate::gateway::{ApiClient, GatewayError, Rejection};
use crate::sync::{chat_delta, restock_delta};
use crate::tokens;
use crate::util::truncate_chars;

pub mod models;
pub mod state;

const CHAT_NAME_MAX: usize = 50;

/// Everything the engine pushes back to the UI layer. Collections arrive as
/// full snapshots, mirroring the wholesale swaps applied to the state.
#[derive(Debug)]
pub enum EngineEvent {
    Settings(Settings),
    Config(ConfigData),
    Accounts(Vec<Account>),
    Balance(BalanceInfo),
    Stock(Vec<Product>),
    Chat(Vec<ChatMessage>),
    FreeStock {
        provider: Provider,
        stock: FreeStock,
    },
    Toast {
        severity: Severity,
        message: String,
    },
    Log {
        severity: Severity,
        message: String,
    },
    Report(String),
    ReportAppend(String),
    BatchProgress {
        processed: usize,
        total: usize,
    },
    BatchFinished(BatchSummary),
    BanVerdict {
        banned: bool,
        message: String,
    },
    BanCheckFailed {
        message: String,
    },
    CaptchaRequired {
        link: String,
    },
    AccountInfo {
        username: String,
        info: String,
    },
    CloseModal,
    ChatReady,
}

type Updates = mpsc::UnboundedSender<EngineEvent>;

pub struct DashboardEngine {
    gateway: ApiClient,
    pub state: DashboardState,
}

impl DashboardEngine {
    pub fn new(gateway: ApiClient) -> Self {
        Self {
            gateway,
            state: DashboardState::new(),
        }
    }

    /// Initial population: settings, config, and accounts load concurrently
    /// and write disjoint fields; balance, stock, and chat follow and may
    /// each fail without aborting startup.
    pub async fn startup(&mut self, updates: &Updates) {
        info!("startup: loading settings, config and accounts");
        let (settings, config, accounts) = tokio::join!(
            self.gateway.get_settings(),
            self.gateway.get_config(),
            self.gateway.list_accounts(),
        );

        match settings {
            Ok(settings) => {
                self.state.replace_settings(settings.clone());
                updates.send(EngineEvent::Settings(settings)).ok();
            }
            Err(err) => {
                warn!("startup: failed to load settings: {err}");
                log_entry(updates, Severity::Error, "Error loading settings");
            }
        }

        match config {
            Ok(config) => {
                self.state.apply_config(&config);
                updates.send(EngineEvent::Config(config)).ok();
                log_entry(updates, Severity::Success, "Configuration loaded");
            }
            Err(err) => {
                error!("startup: failed to load config: {err}");
                notify(updates, Severity::Error, "Error loading configuration");
            }
        }

        match accounts {
            Ok(accounts) => {
                self.state.replace_accounts(accounts.clone());
                updates.send(EngineEvent::Accounts(accounts)).ok();
            }
            Err(err) => {
                error!("startup: failed to load accounts: {err}");
                self.state.replace_accounts(Vec::new());
                updates.send(EngineEvent::Accounts(Vec::new())).ok();
                log_entry(updates, Severity::Error, "Error loading accounts");
            }
        }

        self.refresh_balance(updates).await;
        self.refresh_stock(updates).await;

        if self.state.chat_configured() {
            self.refresh_chat(updates).await;
            updates.send(EngineEvent::ChatReady).ok();
        }

        log_entry(updates, Severity::Success, "System initialized successfully");
        info!("startup: complete");
    }

    pub async fn handle_action(&mut self, action: UserAction, updates: &Updates) {
        match action {
            UserAction::SaveConfig {
                api_key,
                hypixel_key,
                hypixel_enabled,
            } => self.save_config(api_key, hypixel_key, hypixel_enabled, updates).await,
            UserAction::CheckBalance => self.refresh_balance(updates).await,
            UserAction::CheckStock => self.refresh_stock(updates).await,
            UserAction::RefreshChat => self.refresh_chat(updates).await,
            UserAction::RefreshAccounts => {
                self.reload_accounts(updates).await;
            }
            UserAction::Purchase { kind, amount } => {
                self.purchase(kind, amount, updates).await;
            }
            UserAction::LoadFreeStock => self.load_free_stock(updates).await,
            UserAction::FetchFreeAccount { provider, kind } => {
                self.fetch_free_account(provider, kind, updates).await;
            }
            UserAction::AddCustomToken { raw } => self.add_custom_token(raw, updates).await,
            UserAction::SwitchAccount { username } => {
                self.switch_account(username, updates).await;
            }
            UserAction::RemoveAccount { username } => {
                self.remove_account(username, updates).await;
            }
            UserAction::ViewAccountInfo { username, token } => {
                self.view_account_info(username, token, updates).await;
            }
            UserAction::DecodeToken { raw } => self.decode_token(raw, updates).await,
            UserAction::CheckBan { source, token } => {
                self.check_ban(source, token, updates).await;
            }
            UserAction::CheckAllTokens => {
                // The sweep runs on its own task so the engine lock frees up
                // for pollers and other actions while it grinds through.
                let gateway = self.gateway.clone();
                let accounts = self.state.accounts().to_vec();
                let updates = updates.clone();
                tokio::spawn(async move {
                    run_ban_sweep(gateway, accounts, updates).await;
                });
            }
            UserAction::SendChat { message } => self.send_chat(message, updates).await,
            UserAction::SaveSettings {
                stock_notifications,
                startup_sound,
            } => self.save_settings(stock_notifications, startup_sound, updates).await,
            UserAction::SaveChatSettings {
                chat_name,
                gemini_api_key,
            } => self.save_chat_settings(chat_name, gemini_api_key, updates).await,
            UserAction::ExportData { path } => self.export_data(path, updates).await,
        }
    }

    pub async fn refresh_balance(&mut self, updates: &Updates) {
        match self.gateway.get_balance().await {
            Ok(balance) => {
                self.state.set_balance(balance.clone());
                if balance.out_of_credits {
                    toast(
                        updates,
                        Severity::Warning,
                        "You are out of credits! Visit the store to purchase more.",
                    );
                }
                log_entry(
                    updates,
                    Severity::Success,
                    format!("Balance checked: {} credits", balance.balance),
                );
                updates.send(EngineEvent::Balance(balance)).ok();
            }
            Err(err) => {
                error!("balance refresh failed: {err}");
                notify(
                    updates,
                    Severity::Error,
                    format!("Error checking balance: {err}"),
                );
            }
        }
    }

    pub async fn refresh_stock(&mut self, updates: &Updates) {
        match self.gateway.get_stock().await {
            Ok(snapshot) => {
                let restocked = restock_delta(self.state.stock(), &snapshot.products);
                self.state.replace_stock(snapshot.products.clone());
                if self.state.settings.stock_notifications_enabled {
                    for event in &restocked {
                        toast(
                            updates,
                            Severity::Success,
                            format!("{} restocked! Stock: {}", event.name, event.stock),
                        );
                        log_entry(
                            updates,
                            Severity::Success,
                            format!("{} restocked ({} available)", event.name, event.stock),
                        );
                    }
                }
                log_entry(updates, Severity::Success, "Stock updated");
                updates.send(EngineEvent::Stock(snapshot.products)).ok();
            }
            Err(err) => {
                error!("stock refresh failed: {err}");
                log_entry(updates, Severity::Error, "Error loading stock");
            }
        }
    }

    /// One chat poll. Quiet on failure; the next tick retries anyway.
    pub async fn refresh_chat(&mut self, updates: &Updates) {
        match self.gateway.recent_chat().await {
            Ok(messages) => {
                let delta = chat_delta(self.state.chat(), &messages);
                if !delta.is_empty() {
                    self.state.append_chat(delta);
                    updates
                        .send(EngineEvent::Chat(self.state.chat().to_vec()))
                        .ok();
                }
            }
            Err(err) => {
                debug!("chat poll failed: {err}");
            }
        }
    }

    async fn reload_accounts(&mut self, updates: &Updates) {
        match self.gateway.list_accounts().await {
            Ok(accounts) => {
                self.state.replace_accounts(accounts.clone());
                updates.send(EngineEvent::Accounts(accounts)).ok();
            }
            Err(err) => {
                error!("account reload failed: {err}");
                log_entry(updates, Severity::Error, "Error loading accounts");
            }
        }
    }

    async fn save_config(
        &mut self,
        api_key: String,
        hypixel_key: String,
        hypixel_enabled: bool,
        updates: &Updates,
    ) {
        let result = self.gateway.save_config(&api_key, &hypixel_key).await;
        let settings_result = self
            .gateway
            .save_settings(&SettingsPatch {
                hypixel_enabled: Some(hypixel_enabled),
                ..Default::default()
            })
            .await;
        match result.and(settings_result) {
            Ok(()) => {
                self.state.apply_config(&ConfigData {
                    api_key,
                    hypixel_key,
                    hypixel_enabled,
                });
                notify(updates, Severity::Success, "Configuration saved");
            }
            Err(err) => {
                error!("config save failed: {err}");
                notify(updates, Severity::Error, "Error saving configuration");
            }
        }
    }

    async fn purchase(&mut self, kind: String, amount: u32, updates: &Updates) {
        if amount < 1 {
            let err = GatewayError::Invalid("Amount must be at least 1".to_owned());
            toast(updates, Severity::Error, err.to_string());
            return;
        }
        match self.gateway.purchase(&kind, amount).await {
            Ok(receipt) => {
                toast(
                    updates,
                    Severity::Success,
                    format!("Successfully purchased {} account(s)!", receipt.count),
                );
                log_entry(
                    updates,
                    Severity::Success,
                    format!("Purchased {} {} account(s)", receipt.count, kind),
                );
                updates
                    .send(EngineEvent::Report(purchase_report(&receipt, &kind)))
                    .ok();
                self.refresh_balance(updates).await;
                self.reload_accounts(updates).await;
            }
            Err(GatewayError::Rejected(Rejection::OutOfStock)) => {
                toast(updates, Severity::Warning, "Out of stock");
                log_entry(updates, Severity::Warning, "Purchase failed: Out of stock");
            }
            Err(err) => {
                notify(updates, Severity::Error, format!("Purchase failed: {err}"));
            }
        }
    }

    async fn load_free_stock(&mut self, updates: &Updates) {
        for provider in [Provider::Mori, Provider::MyloAlts] {
            match self.gateway.free_stock(provider).await {
                Ok(stock) => {
                    updates.send(EngineEvent::FreeStock { provider, stock }).ok();
                }
                Err(err) => {
                    debug!("free stock load failed for {}: {err}", provider.slug());
                }
            }
        }
    }

    async fn fetch_free_account(
        &mut self,
        provider: Provider,
        kind: AccountKind,
        updates: &Updates,
    ) {
        match self.gateway.fetch_free_account(provider, kind).await {
            Ok(fetched) => {
                toast(
                    updates,
                    Severity::Success,
                    format!(
                        "Account fetched from {}: {}",
                        provider.display_name(),
                        fetched.username
                    ),
                );
                log_entry(
                    updates,
                    Severity::Success,
                    format!(
                        "Fetched {} account from {}: {}",
                        kind.arg_value(),
                        provider.display_name(),
                        fetched.username
                    ),
                );
                self.reload_accounts(updates).await;
                updates.send(EngineEvent::CloseModal).ok();
            }
            Err(GatewayError::Rejected(Rejection::CaptchaRequired { link })) => {
                updates.send(EngineEvent::CaptchaRequired { link }).ok();
            }
            Err(GatewayError::Rejected(Rejection::Cooldown { remaining })) => {
                toast(
                    updates,
                    Severity::Warning,
                    format!("On cooldown. Please wait {remaining} seconds."),
                );
            }
            Err(err) => {
                toast(
                    updates,
                    Severity::Error,
                    format!("Failed to fetch account: {err}"),
                );
            }
        }
    }

    async fn add_custom_token(&mut self, raw: String, updates: &Updates) {
        if let Err(err) = tokens::parse(&raw) {
            toast(updates, Severity::Error, err.to_string());
            return;
        }
        match self.gateway.add_custom_token(raw.trim()).await {
            Ok(added) => {
                toast(
                    updates,
                    Severity::Success,
                    format!("Token added: {}", added.username),
                );
                log_entry(
                    updates,
                    Severity::Success,
                    format!("Added custom token: {}", added.username),
                );
                self.reload_accounts(updates).await;
                updates.send(EngineEvent::CloseModal).ok();
            }
            Err(err) => {
                toast(updates, Severity::Error, format!("Failed to add token: {err}"));
            }
        }
    }

    async fn switch_account(&mut self, username: String, updates: &Updates) {
        match self.gateway.switch_account(&username).await {
            Ok(()) => {
                toast(updates, Severity::Success, format!("Switched to {username}"));
                log_entry(
                    updates,
                    Severity::Success,
                    format!("Switched to account: {username}"),
                );
                self.reload_accounts(updates).await;
                updates.send(EngineEvent::CloseModal).ok();
            }
            Err(err) => {
                toast(
                    updates,
                    Severity::Error,
                    format!("Failed to switch account: {err}"),
                );
            }
        }
    }

    async fn remove_account(&mut self, username: String, updates: &Updates) {
        match self.gateway.remove_account(&username).await {
            Ok(()) => {
                toast(updates, Severity::Success, format!("Removed {username}"));
                log_entry(updates, Severity::Info, format!("Removed account: {username}"));
                // The accounts modal rebuilds from the fresh list.
                self.reload_accounts(updates).await;
            }
            Err(err) => {
                toast(
                    updates,
                    Severity::Error,
                    format!("Failed to remove account: {err}"),
                );
            }
        }
    }

    async fn view_account_info(&mut self, username: String, token: String, updates: &Updates) {
        match self.gateway.account_info(&token).await {
            Ok(text) => {
                updates
                    .send(EngineEvent::AccountInfo {
                        username,
                        info: text.info,
                    })
                    .ok();
            }
            Err(err) => {
                toast(
                    updates,
                    Severity::Error,
                    format!("Failed to fetch account info: {err}"),
                );
            }
        }
    }

    async fn decode_token(&mut self, raw: String, updates: &Updates) {
        if let Err(err) = tokens::parse(&raw) {
            toast(updates, Severity::Error, err.to_string());
            return;
        }
        match self.gateway.decode_token(raw.trim()).await {
            Ok(text) => {
                updates
                    .send(EngineEvent::Report(decode_report(&text.info)))
                    .ok();
                toast(updates, Severity::Success, "Token decoded successfully!");
                log_entry(updates, Severity::Success, "Token decoded successfully");
                self.reload_accounts(updates).await;
                updates.send(EngineEvent::CloseModal).ok();
            }
            Err(err) => {
                toast(
                    updates,
                    Severity::Error,
                    format!("Failed to decode token: {err}"),
                );
            }
        }
    }

    async fn check_ban(&mut self, source: BanSource, token: Option<String>, updates: &Updates) {
        let token = match source {
            BanSource::Manual => {
                let Some(token) = token.as_deref().map(str::trim).filter(|t| !t.is_empty())
                else {
                    toast(updates, Severity::Error, "Please enter a token");
                    return;
                };
                Some(token.to_owned())
            }
            BanSource::Current => {
                if self.state.current_account().is_none() {
                    toast(updates, Severity::Error, "No current account available");
                    return;
                }
                None
            }
            BanSource::Purchased => None,
        };
        match self.gateway.check_ban(source, token.as_deref()).await {
            Ok(verdict) => {
                let label = if verdict.banned { "BANNED" } else { "NOT BANNED" };
                let severity = if verdict.banned {
                    Severity::Warning
                } else {
                    Severity::Success
                };
                log_entry(updates, severity, format!("Ban check: {label}"));
                updates
                    .send(EngineEvent::BanVerdict {
                        banned: verdict.banned,
                        message: verdict.message,
                    })
                    .ok();
            }
            Err(err) => {
                updates
                    .send(EngineEvent::BanCheckFailed {
                        message: err.to_string(),
                    })
                    .ok();
            }
        }
    }

    async fn send_chat(&mut self, message: String, updates: &Updates) {
        let message = message.trim().to_owned();
        if message.is_empty() {
            return;
        }
        match self.gateway.send_chat(&message).await {
            Ok(()) => {
                // The sent message surfaces on the next poll; pull one now.
                self.refresh_chat(updates).await;
            }
            Err(err) => {
                error!("chat send failed: {err}");
                toast(updates, Severity::Error, "Failed to send message");
            }
        }
    }

    async fn save_settings(
        &mut self,
        stock_notifications: bool,
        startup_sound: bool,
        updates: &Updates,
    ) {
        let patch = SettingsPatch {
            stock_notifications_enabled: Some(stock_notifications),
            startup_sound_enabled: Some(startup_sound),
            ..Default::default()
        };
        match self.gateway.save_settings(&patch).await {
            Ok(()) => {
                self.state.settings.stock_notifications_enabled = stock_notifications;
                self.state.settings.startup_sound_enabled = startup_sound;
                toast(updates, Severity::Success, "Settings saved successfully");
                updates.send(EngineEvent::CloseModal).ok();
            }
            Err(err) => {
                error!("settings save failed: {err}");
                toast(updates, Severity::Error, "Error saving settings");
            }
        }
    }

    async fn save_chat_settings(
        &mut self,
        chat_name: String,
        gemini_api_key: String,
        updates: &Updates,
    ) {
        let chat_name = truncate_chars(chat_name.trim(), CHAT_NAME_MAX);
        let gemini_api_key = gemini_api_key.trim().to_owned();
        let patch = SettingsPatch {
            chat_name: Some(chat_name.clone()),
            gemini_api_key: Some(gemini_api_key.clone()),
            ..Default::default()
        };
        match self.gateway.save_settings(&patch).await {
            Ok(()) => {
                self.state.settings.chat_name = chat_name;
                self.state.settings.gemini_api_key = gemini_api_key;
                toast(updates, Severity::Success, "Chat settings saved successfully");
                updates.send(EngineEvent::CloseModal).ok();
            }
            Err(err) => {
                error!("chat settings save failed: {err}");
                toast(updates, Severity::Error, "Error saving chat settings");
            }
        }
    }

    async fn export_data(&mut self, path: std::path::PathBuf, updates: &Updates) {
        let bundle = serde_json::json!({
            "balance": self.state.balance,
            "stock": self.state.stock(),
            "accounts": self.state.accounts(),
            "exported_at": Local::now().to_rfc3339(),
        });
        let body = match serde_json::to_vec_pretty(&bundle) {
            Ok(body) => body,
            Err(err) => {
                error!("export serialization failed: {err}");
                toast(updates, Severity::Error, "Failed to export data");
                return;
            }
        };
        match tokio::fs::write(&path, body).await {
            Ok(()) => {
                notify(updates, Severity::Success, "Data exported successfully");
                info!("export written to {}", path.display());
            }
            Err(err) => {
                error!("export write failed: {err}");
                toast(
                    updates,
                    Severity::Error,
                    format!("Failed to export data: {err}"),
                );
            }
        }
    }
}

/// Ban-check every account in the snapshot, strictly one at a time. The UI
/// has already put the irreversible-side-effect warning in front of the
/// user; by the time we get here the batch runs to completion. Works off a
/// cloned gateway and account snapshot, never the live engine.
async fn run_ban_sweep(gateway: ApiClient, accounts: Vec<Account>, updates: Updates) {
    if accounts.is_empty() {
        toast(&updates, Severity::Warning, "No accounts to check");
        // An empty sweep still finishes, so the UI leaves its running state.
        updates
            .send(EngineEvent::BatchFinished(BatchSummary::default()))
            .ok();
        return;
    }

    updates
        .send(EngineEvent::Report(batch_report_header(accounts.len())))
        .ok();

    let (summary, _outcomes) = batch::run_sequential(
        &accounts,
        |account| {
            let gateway = gateway.clone();
            let updates = updates.clone();
            let username = account.username.clone();
            let token = account.token.clone();
            async move {
                let result = gateway.check_ban(BanSource::Manual, Some(token.as_str())).await;
                let line = match &result {
                    Ok(verdict) if verdict.banned => format!("{username}: BANNED"),
                    Ok(_) => format!("{username}: NOT BANNED"),
                    Err(err) => format!("{username}: ERROR - {err}"),
                };
                updates.send(EngineEvent::ReportAppend(line)).ok();
                result.map(|verdict| verdict.banned).map_err(|err| err.to_string())
            }
        },
        |processed, total| {
            updates
                .send(EngineEvent::BatchProgress { processed, total })
                .ok();
        },
    )
    .await;

    updates
        .send(EngineEvent::ReportAppend(batch_report_summary(&summary)))
        .ok();
    updates.send(EngineEvent::BatchFinished(summary)).ok();

    let severity = if summary.banned > 0 {
        Severity::Warning
    } else {
        Severity::Success
    };
    toast(
        &updates,
        severity,
        format!(
            "Checked {} accounts. {} banned, {} not banned.",
            summary.checked, summary.banned, summary.not_banned
        ),
    );
    log_entry(
        &updates,
        severity,
        format!(
            "Checked all tokens: {} banned, {} not banned",
            summary.banned, summary.not_banned
        ),
    );
}

fn toast(updates: &Updates, severity: Severity, message: impl Into<String>) {
    updates
        .send(EngineEvent::Toast {
            severity,
            message: message.into(),
        })
        .ok();
}

fn log_entry(updates: &Updates, severity: Severity, message: impl Into<String>) {
    updates
        .send(EngineEvent::Log {
            severity,
            message: message.into(),
        })
        .ok();
}

/// Toast and activity-log entry in one go, for transitions worth both.
fn notify(updates: &Updates, severity: Severity, message: impl Into<String>) {
    let message = message.into();
    toast(updates, severity, message.clone());
    log_entry(updates, severity, message);
}

fn purchase_report(receipt: &PurchaseReceipt, kind: &str) -> String {
    let mut report = format!(
        "Successfully purchased {} account(s)!\nTime: {}\nType: {}\n{}\n\n",
        receipt.count,
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        kind,
        "=".repeat(80),
    );
    for (index, account) in receipt.accounts.iter().enumerate() {
        report.push_str(&format!(
            "Account {}/{}\n{}\n\n",
            index + 1,
            receipt.accounts.len(),
            account.token
        ));
    }
    report
}

fn decode_report(info: &str) -> String {
    format!(
        "Manual Token Decode\nTime: {}\n\n{}\n\n{}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(80),
        info
    )
}

fn batch_report_header(total: usize) -> String {
    format!(
        "Ban Check Results - All Tokens\nTime: {}\nChecking {} accounts...\n{}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        total,
        "=".repeat(80),
    )
}

fn batch_report_summary(summary: &BatchSummary) -> String {
    format!(
        "\n{}\nSummary:\nNot Banned: {}\nBanned: {}\nErrors: {}\nTotal Checked: {}",
        "=".repeat(80),
        summary.not_banned,
        summary.banned,
        summary.errors,
        summary.checked,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchase_report_lists_every_token() {
        let receipt = PurchaseReceipt {
            count: 2,
            accounts: vec![
                Account {
                    username: "a".into(),
                    token: "tok-a".into(),
                    ..Default::default()
                },
                Account {
                    username: "b".into(),
                    token: "tok-b".into(),
                    ..Default::default()
                },
            ],
        };
        let report = purchase_report(&receipt, "nfa");
        assert!(report.contains("Successfully purchased 2 account(s)!"));
        assert!(report.contains("Type: nfa"));
        assert!(report.contains("Account 1/2\ntok-a"));
        assert!(report.contains("Account 2/2\ntok-b"));
    }

    fn stored_account(username: &str) -> Account {
        Account {
            username: username.into(),
            token: format!("tok-{username}"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn empty_ban_sweep_still_finishes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        run_ban_sweep(ApiClient::new("http://127.0.0.1:9"), Vec::new(), tx).await;

        let mut finished = None;
        let mut warned = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                EngineEvent::BatchFinished(summary) => finished = Some(summary),
                EngineEvent::Toast { severity, .. } => warned = severity == Severity::Warning,
                _ => {}
            }
        }
        assert_eq!(finished, Some(BatchSummary::default()));
        assert!(warned);
    }

    #[tokio::test]
    async fn ban_sweep_runs_outside_action_dispatch() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = DashboardEngine::new(ApiClient::new("http://127.0.0.1:9"));
        engine
            .state
            .replace_accounts(vec![stored_account("a"), stored_account("b")]);

        engine.handle_action(UserAction::CheckAllTokens, &tx).await;
        // Dispatch only hands the sweep to its own task; on this test's
        // single-threaded runtime nothing has run yet.
        assert!(rx.try_recv().is_err());

        let summary = loop {
            match rx.recv().await {
                Some(EngineEvent::BatchFinished(summary)) => break summary,
                Some(_) => {}
                None => panic!("channel closed before the sweep finished"),
            }
        };
        // Nothing listens on the target port, so every check errors out but
        // still counts as processed.
        assert_eq!(summary.checked, 2);
        assert_eq!(summary.errors, 2);
    }

    #[test]
    fn batch_summary_block_reports_all_counters() {
        let summary = BatchSummary {
            checked: 4,
            banned: 1,
            not_banned: 2,
            errors: 1,
        };
        let block = batch_report_summary(&summary);
        assert!(block.contains("Not Banned: 2"));
        assert!(block.contains("Banned: 1"));
        assert!(block.contains("Errors: 1"));
        assert!(block.contains("Total Checked: 4"));
    }
}

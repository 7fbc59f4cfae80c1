use std::path::PathBuf;

use crate::engine::models::{
    Account, AccountKind, BalanceInfo, BanSource, ChatMessage, ConfigData, Product, Provider,
    Settings, current_account,
};

/// Process-wide snapshot of everything the dashboard knows. Constructed
/// empty at startup and populated by the initial loads; afterwards every
/// mutation is a wholesale swap of one field so a concurrently scheduled
/// render task can never observe a half-updated collection.
#[derive(Default)]
pub struct DashboardState {
    pub api_key: String,
    pub hypixel_key: String,
    pub settings: Settings,
    pub balance: Option<BalanceInfo>,
    accounts: Vec<Account>,
    stock: Vec<Product>,
    chat: Vec<ChatMessage>,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_config(&mut self, config: &ConfigData) {
        self.api_key = config.api_key.clone();
        self.hypixel_key = config.hypixel_key.clone();
        self.settings.hypixel_enabled = config.hypixel_enabled;
    }

    pub fn replace_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    pub fn replace_accounts(&mut self, accounts: Vec<Account>) {
        self.accounts = accounts;
    }

    pub fn replace_stock(&mut self, products: Vec<Product>) {
        self.stock = products;
    }

    pub fn set_balance(&mut self, balance: BalanceInfo) {
        self.balance = Some(balance);
    }

    /// Append newly observed messages in server order. Seen messages are
    /// never rewritten or reordered.
    pub fn append_chat(&mut self, delta: Vec<ChatMessage>) {
        self.chat.extend(delta);
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn stock(&self) -> &[Product] {
        &self.stock
    }

    pub fn chat(&self) -> &[ChatMessage] {
        &self.chat
    }

    pub fn current_account(&self) -> Option<&Account> {
        current_account(&self.accounts)
    }

    pub fn chat_configured(&self) -> bool {
        self.settings.chat_enabled && !self.settings.chat_api_url.is_empty()
    }
}

// Actions triggered by the user from the UI layer.
#[derive(Clone, Debug)]
pub enum UserAction {
    SaveConfig {
        api_key: String,
        hypixel_key: String,
        hypixel_enabled: bool,
    },
    CheckBalance,
    CheckStock,
    RefreshChat,
    RefreshAccounts,
    Purchase {
        kind: String,
        amount: u32,
    },
    LoadFreeStock,
    FetchFreeAccount {
        provider: Provider,
        kind: AccountKind,
    },
    AddCustomToken {
        raw: String,
    },
    SwitchAccount {
        username: String,
    },
    RemoveAccount {
        username: String,
    },
    ViewAccountInfo {
        username: String,
        token: String,
    },
    DecodeToken {
        raw: String,
    },
    CheckBan {
        source: BanSource,
        token: Option<String>,
    },
    CheckAllTokens,
    SendChat {
        message: String,
    },
    SaveSettings {
        stock_notifications: bool,
        startup_sound: bool,
    },
    SaveChatSettings {
        chat_name: String,
        gemini_api_key: String,
    },
    ExportData {
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::models::ServerInfo;

    fn account(username: &str, current: bool) -> Account {
        Account {
            username: username.into(),
            token: format!("token-{username}"),
            current,
            ..Default::default()
        }
    }

    fn message(id: &str) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            timestamp: "12:00:00".into(),
            username: "steve".into(),
            message: "hi".into(),
        }
    }

    #[test]
    fn starts_empty() {
        let state = DashboardState::new();
        assert!(state.accounts().is_empty());
        assert!(state.stock().is_empty());
        assert!(state.chat().is_empty());
        assert!(state.balance.is_none());
        assert!(state.current_account().is_none());
    }

    #[test]
    fn collections_are_swapped_wholesale() {
        let mut state = DashboardState::new();
        state.replace_accounts(vec![account("a", false), account("b", false)]);
        state.replace_accounts(vec![account("c", true)]);
        assert_eq!(state.accounts().len(), 1);
        assert_eq!(state.current_account().unwrap().username, "c");
    }

    #[test]
    fn chat_appends_preserve_existing_order() {
        let mut state = DashboardState::new();
        state.append_chat(vec![message("1"), message("2")]);
        state.append_chat(vec![message("3")]);
        let ids: Vec<&str> = state.chat().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn apply_config_leaves_other_settings_untouched() {
        let mut state = DashboardState::new();
        state.replace_settings(Settings {
            chat_enabled: true,
            chat_api_url: "http://chat".into(),
            ..Default::default()
        });
        state.apply_config(&ConfigData {
            api_key: "key".into(),
            hypixel_key: "hkey".into(),
            hypixel_enabled: false,
        });
        assert_eq!(state.api_key, "key");
        assert!(!state.settings.hypixel_enabled);
        assert!(state.chat_configured());
    }

    #[test]
    fn chat_not_configured_without_url() {
        let mut state = DashboardState::new();
        state.replace_settings(Settings {
            chat_enabled: true,
            ..Default::default()
        });
        assert!(!state.chat_configured());
    }

    #[test]
    fn server_info_survives_account_swap() {
        let mut state = DashboardState::new();
        let mut online = account("a", true);
        online.server_info = Some(ServerInfo {
            on_server: true,
            server_name: Some("Hypixel".into()),
        });
        state.replace_accounts(vec![online]);
        let current = state.current_account().unwrap();
        let info = current.server_info.as_ref().unwrap();
        assert!(info.on_server);
        assert_eq!(info.server_name.as_deref(), Some("Hypixel"));
    }
}

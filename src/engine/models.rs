use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub on_server: bool,
    #[serde(default)]
    pub server_name: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub skin_url: Option<String>,
    #[serde(default)]
    pub current: bool,
    #[serde(default)]
    pub server_info: Option<ServerInfo>,
}

/// The account shown in the header: the first one flagged current, falling
/// back to the first entry. The stored flags are never touched here.
pub fn current_account(accounts: &[Account]) -> Option<&Account> {
    accounts.iter().find(|a| a.current).or_else(|| accounts.first())
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub price: i64,
    pub stock: i64,
    #[serde(default)]
    pub in_stock: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub timestamp: String,
    pub username: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub chat_enabled: bool,
    #[serde(default)]
    pub chat_name: String,
    #[serde(default)]
    pub chat_api_url: String,
    #[serde(default)]
    pub gemini_api_key: String,
    #[serde(default = "default_true")]
    pub stock_notifications_enabled: bool,
    #[serde(default = "default_true")]
    pub startup_sound_enabled: bool,
    #[serde(default = "default_true")]
    pub hypixel_enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Partial settings write; only the populated fields are sent.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_notifications_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_sound_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hypixel_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConfigData {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub hypixel_key: String,
    #[serde(default = "default_true")]
    pub hypixel_enabled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceInfo {
    pub balance: i64,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub out_of_credits: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StockSnapshot {
    pub products: Vec<Product>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PurchaseReceipt {
    pub count: usize,
    pub accounts: Vec<Account>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FetchedAccount {
    pub username: String,
    #[serde(default)]
    pub token: String,
}

/// Per-provider free account availability, split by ban state.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct FreeStock {
    #[serde(default)]
    pub unbanned: i64,
    #[serde(default)]
    pub banned: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BanVerdict {
    pub banned: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AccountInfoText {
    pub info: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    Mori,
    MyloAlts,
}

impl Provider {
    pub fn slug(self) -> &'static str {
        match self {
            Provider::Mori => "mori",
            Provider::MyloAlts => "myloalts",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Mori => "Mori",
            Provider::MyloAlts => "MyloAlts",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountKind {
    Unbanned,
    Banned,
}

impl AccountKind {
    pub fn arg_value(self) -> &'static str {
        match self {
            AccountKind::Unbanned => "unbanned",
            AccountKind::Banned => "banned",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BanSource {
    Current,
    Purchased,
    Manual,
}

impl BanSource {
    pub fn arg_value(self) -> &'static str {
        match self {
            BanSource::Current => "current",
            BanSource::Purchased => "purchased",
            BanSource::Manual => "manual",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BanSource::Current => "Use Current Account",
            BanSource::Purchased => "Use Purchased Token",
            BanSource::Manual => "Use Manual Token",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(username: &str, current: bool) -> Account {
        Account {
            username: username.into(),
            current,
            ..Default::default()
        }
    }

    #[test]
    fn current_account_prefers_flagged_entry() {
        let accounts = vec![account("a", false), account("b", true)];
        assert_eq!(current_account(&accounts).unwrap().username, "b");
    }

    #[test]
    fn current_account_falls_back_to_first_without_mutating() {
        let accounts = vec![account("a", false), account("b", false)];
        assert_eq!(current_account(&accounts).unwrap().username, "a");
        // Flags are untouched by the derivation.
        assert!(accounts.iter().all(|a| !a.current));
    }

    #[test]
    fn current_account_of_empty_list_is_none() {
        assert!(current_account(&[]).is_none());
    }

    #[test]
    fn settings_defaults_apply_to_missing_fields() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert!(!settings.chat_enabled);
        assert!(settings.stock_notifications_enabled);
        assert!(settings.hypixel_enabled);
    }

    #[test]
    fn settings_patch_skips_unset_fields() {
        let patch = SettingsPatch {
            chat_name: Some("Steve".into()),
            ..Default::default()
        };
        let body = serde_json::to_string(&patch).unwrap();
        assert_eq!(body, r#"{"chat_name":"Steve"}"#);
    }
}

use std::time::Duration;

use log::warn;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;

use crate::engine::models::{
    Account, AccountInfoText, AccountKind, BalanceInfo, BanSource, BanVerdict, ChatMessage,
    ConfigData, FetchedAccount, FreeStock, Provider, PurchaseReceipt, Settings, SettingsPatch,
    StockSnapshot,
};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";

/// A well-formed `{success: false}` response body, classified by its code.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Rejection {
    #[error("out of stock")]
    OutOfStock,
    #[error("captcha required")]
    CaptchaRequired { link: String },
    #[error("on cooldown for {remaining}s")]
    Cooldown { remaining: u64 },
    #[error("{0}")]
    Other(String),
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum GatewayError {
    /// Network failure or a response we could not make sense of.
    #[error("network error: {0}")]
    Transport(String),
    /// The backend answered and said no.
    #[error("{0}")]
    Rejected(Rejection),
    /// Local input was unusable; no request was made.
    #[error("{0}")]
    Invalid(String),
}

impl GatewayError {
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            GatewayError::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

/// Thin request/response boundary to the backend. Every remote exchange in
/// the application funnels through here; callers never see reqwest types.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|err| {
                warn!("gateway: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub async fn get_settings(&self) -> Result<Settings, GatewayError> {
        #[derive(serde::Deserialize)]
        struct Body {
            settings: Settings,
        }
        let body: Body = self.get("/settings").await?;
        Ok(body.settings)
    }

    pub async fn save_settings(&self, patch: &SettingsPatch) -> Result<(), GatewayError> {
        self.post_ack("/settings", patch).await
    }

    pub async fn get_config(&self) -> Result<ConfigData, GatewayError> {
        self.get("/config").await
    }

    pub async fn save_config(&self, api_key: &str, hypixel_key: &str) -> Result<(), GatewayError> {
        self.post_ack(
            "/config",
            &json!({ "api_key": api_key, "hypixel_key": hypixel_key }),
        )
        .await
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, GatewayError> {
        #[derive(serde::Deserialize)]
        struct Body {
            #[serde(default)]
            accounts: Vec<Account>,
        }
        let body: Body = self.get("/accounts").await?;
        Ok(body.accounts)
    }

    pub async fn get_balance(&self) -> Result<BalanceInfo, GatewayError> {
        self.get("/balance").await
    }

    pub async fn get_stock(&self) -> Result<StockSnapshot, GatewayError> {
        self.get("/stock").await
    }

    pub async fn purchase(&self, kind: &str, amount: u32) -> Result<PurchaseReceipt, GatewayError> {
        self.post("/purchase", &json!({ "type": kind, "amount": amount }))
            .await
    }

    pub async fn free_stock(&self, provider: Provider) -> Result<FreeStock, GatewayError> {
        self.get(&format!("/free-alts/{}/stock", provider.slug()))
            .await
    }

    pub async fn fetch_free_account(
        &self,
        provider: Provider,
        kind: AccountKind,
    ) -> Result<FetchedAccount, GatewayError> {
        self.post(
            &format!("/free-alts/{}/fetch", provider.slug()),
            &json!({ "type": kind.arg_value() }),
        )
        .await
    }

    pub async fn add_custom_token(&self, token: &str) -> Result<FetchedAccount, GatewayError> {
        self.post("/accounts/add-custom", &json!({ "token": token }))
            .await
    }

    pub async fn switch_account(&self, username: &str) -> Result<(), GatewayError> {
        self.post_ack("/accounts/switch", &json!({ "username": username }))
            .await
    }

    pub async fn remove_account(&self, username: &str) -> Result<(), GatewayError> {
        self.post_ack("/accounts/remove", &json!({ "username": username }))
            .await
    }

    pub async fn account_info(&self, token: &str) -> Result<AccountInfoText, GatewayError> {
        self.post("/account/info", &json!({ "token": token })).await
    }

    pub async fn decode_token(&self, token: &str) -> Result<AccountInfoText, GatewayError> {
        self.post("/decode_token", &json!({ "token": token })).await
    }

    pub async fn check_ban(
        &self,
        source: BanSource,
        token: Option<&str>,
    ) -> Result<BanVerdict, GatewayError> {
        self.post(
            "/ban/check",
            &json!({ "source": source.arg_value(), "token": token.unwrap_or_default() }),
        )
        .await
    }

    pub async fn recent_chat(&self) -> Result<Vec<ChatMessage>, GatewayError> {
        #[derive(serde::Deserialize)]
        struct Body {
            #[serde(default)]
            messages: Vec<ChatMessage>,
        }
        let body: Body = self.get("/chat/recent").await?;
        Ok(body.messages)
    }

    pub async fn send_chat(&self, message: &str) -> Result<(), GatewayError> {
        self.post_ack("/chat/send", &json!({ "message": message }))
            .await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| GatewayError::Transport(format!("GET {path} failed: {err}")))?;
        Self::read_body(path, response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| GatewayError::Transport(format!("POST {path} failed: {err}")))?;
        Self::read_body(path, response).await
    }

    async fn post_ack(&self, path: &str, body: &impl Serialize) -> Result<(), GatewayError> {
        let _: Value = self.post(path, body).await?;
        Ok(())
    }

    async fn read_body<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        let value: Value = response.json().await.map_err(|err| {
            GatewayError::Transport(format!("invalid response from {path}: {err}"))
        })?;
        decode(path, status.as_u16(), value)
    }
}

/// Decode one response body. A `success: false` envelope wins over the HTTP
/// status so rejection codes survive non-2xx transports.
fn decode<T: DeserializeOwned>(
    path: &str,
    status: u16,
    value: Value,
) -> Result<T, GatewayError> {
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(GatewayError::Rejected(classify_rejection(&value)));
    }
    if !(200..300).contains(&status) {
        return Err(GatewayError::Transport(format!(
            "{path} returned HTTP {status}"
        )));
    }
    serde_json::from_value(value)
        .map_err(|err| GatewayError::Transport(format!("malformed payload from {path}: {err}")))
}

fn classify_rejection(body: &Value) -> Rejection {
    let message = body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("request rejected")
        .to_owned();
    match body.get("code") {
        Some(code) if code.as_u64() == Some(409) => Rejection::OutOfStock,
        Some(code) if code.as_str() == Some("CAPTCHA_REQUIRED") => Rejection::CaptchaRequired {
            link: body
                .get("captcha_link")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
        },
        Some(code) if code.as_str() == Some("COOLDOWN") => Rejection::Cooldown {
            remaining: body
                .get("cooldown_remaining")
                .and_then(Value::as_u64)
                .unwrap_or_default(),
        },
        _ => Rejection::Other(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_successful_payload() {
        let body = json!({ "success": true, "balance": 42, "user_id": "u1", "out_of_credits": false });
        let balance: BalanceInfo = decode("/balance", 200, body).unwrap();
        assert_eq!(balance.balance, 42);
        assert_eq!(balance.user_id, "u1");
    }

    #[test]
    fn classifies_numeric_409_as_out_of_stock() {
        let body = json!({ "success": false, "error": "none left", "code": 409 });
        let err = decode::<Value>("/purchase", 200, body).unwrap_err();
        assert_eq!(err.rejection(), Some(&Rejection::OutOfStock));
    }

    #[test]
    fn classifies_captcha_code_with_link() {
        let body = json!({
            "success": false,
            "code": "CAPTCHA_REQUIRED",
            "captcha_link": "https://example.test/solve"
        });
        let err = decode::<Value>("/free-alts/mori/fetch", 200, body).unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&Rejection::CaptchaRequired {
                link: "https://example.test/solve".into()
            })
        );
    }

    #[test]
    fn classifies_cooldown_with_remaining_seconds() {
        let body = json!({ "success": false, "code": "COOLDOWN", "cooldown_remaining": 37 });
        let err = decode::<Value>("/free-alts/myloalts/fetch", 200, body).unwrap_err();
        assert_eq!(err.rejection(), Some(&Rejection::Cooldown { remaining: 37 }));
    }

    #[test]
    fn plain_error_body_keeps_its_message() {
        let body = json!({ "success": false, "error": "invalid api key" });
        let err = decode::<Value>("/balance", 200, body).unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&Rejection::Other("invalid api key".into()))
        );
        assert_eq!(err.to_string(), "invalid api key");
    }

    #[test]
    fn rejection_envelope_wins_over_http_status() {
        let body = json!({ "success": false, "error": "nope", "code": 409 });
        let err = decode::<Value>("/purchase", 500, body).unwrap_err();
        assert_eq!(err.rejection(), Some(&Rejection::OutOfStock));
    }

    #[test]
    fn non_success_status_without_envelope_is_transport() {
        let body = json!({ "detail": "gateway timeout" });
        let err = decode::<Value>("/stock", 502, body).unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[test]
    fn config_body_without_success_field_decodes() {
        let body = json!({ "api_key": "k", "hypixel_key": "" });
        let config: ConfigData = decode("/config", 200, body).unwrap();
        assert_eq!(config.api_key, "k");
        assert!(config.hypixel_enabled);
    }
}

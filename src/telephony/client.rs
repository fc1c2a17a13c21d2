//! Twilio REST client for outbound calls

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::{Error, Result};

const API_BASE: &str = "https://api.twilio.com/2010-04-01";

#[derive(Deserialize)]
struct CallResource {
    sid: String,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

/// Outbound call client
#[derive(Clone)]
pub struct TwilioClient {
    client: reqwest::Client,
    account_sid: String,
    auth_token: SecretString,
    from_number: String,
    api_base: String,
}

impl TwilioClient {
    /// Create a client for one account and caller ID
    ///
    /// # Errors
    ///
    /// Returns error if any credential is missing
    pub fn new(account_sid: String, auth_token: SecretString, from_number: String) -> Result<Self> {
        if account_sid.is_empty() || auth_token.expose_secret().is_empty() {
            return Err(Error::Config(
                "TWILIO_ACCOUNT_SID and TWILIO_AUTH_TOKEN are required".to_string(),
            ));
        }
        if from_number.is_empty() {
            return Err(Error::Config("TWILIO_PHONE_NUMBER is required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            account_sid,
            auth_token,
            from_number,
            api_base: API_BASE.to_string(),
        })
    }

    /// Point the client at a different API host
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn calls_url(&self) -> String {
        format!("{}/Accounts/{}/Calls.json", self.api_base, self.account_sid)
    }

    /// Place a call to `to`; the provider fetches `voice_url` when it connects
    ///
    /// Returns the new call's SID.
    ///
    /// # Errors
    ///
    /// Returns error if the provider rejects the request
    pub async fn create_call(
        &self,
        to: &str,
        voice_url: &str,
        status_callback: Option<&str>,
    ) -> Result<String> {
        let mut form = vec![
            ("To", to),
            ("From", self.from_number.as_str()),
            ("Url", voice_url),
            ("Method", "POST"),
        ];
        if let Some(callback) = status_callback {
            form.push(("StatusCallback", callback));
            form.push(("StatusCallbackMethod", "POST"));
        }

        let response = self
            .client
            .post(self.calls_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body).map_or(body, |e| match e.code {
                Some(code) => format!("{} (code {code})", e.message),
                None => e.message,
            });
            tracing::error!(status = %status, %message, "outbound call rejected");
            return Err(Error::Telephony(format!("call creation failed {status}: {message}")));
        }

        let call: CallResource = response.json().await?;
        tracing::info!(call_sid = %call.sid, to, "outbound call created");
        Ok(call.sid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TwilioClient {
        TwilioClient::new(
            "AC123".to_string(),
            SecretString::from("token".to_string()),
            "+15550001111".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_requires_credentials() {
        let missing = TwilioClient::new(
            String::new(),
            SecretString::from("token".to_string()),
            "+1555".to_string(),
        );
        assert!(matches!(missing, Err(Error::Config(_))));

        let no_from = TwilioClient::new(
            "AC123".to_string(),
            SecretString::from("token".to_string()),
            String::new(),
        );
        assert!(matches!(no_from, Err(Error::Config(_))));
    }

    #[test]
    fn test_calls_url() {
        assert_eq!(
            client().calls_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Calls.json"
        );
        assert_eq!(
            client().with_api_base("http://localhost:9000/").calls_url(),
            "http://localhost:9000/Accounts/AC123/Calls.json"
        );
    }

    #[test]
    fn test_error_body_shape() {
        let body = r#"{"code": 21211, "message": "Invalid 'To' Phone Number", "status": 400}"#;
        let parsed: ApiError = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.code, Some(21211));
    }
}

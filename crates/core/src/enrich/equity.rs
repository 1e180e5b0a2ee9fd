use crate::config::Settings;
use crate::enrich::error::LookupError;
use crate::enrich::http::{self, truncate_chars};
use crate::enrich::{EquityProfile, EquityResolver};
use serde::Deserialize;
use serde_json::Value;

const DEFAULT_FMP_BASE_URL: &str = "https://financialmodelingprep.com";
const DEFAULT_OPTIONS_BASE_URL: &str = "https://query2.finance.yahoo.com";
const DESCRIPTION_MAX_CHARS: usize = 240;

/// Equity profiles from Financial Modeling Prep, tradability from the Yahoo options chain.
#[derive(Debug, Clone)]
pub struct FmpEquityResolver {
    http: reqwest::Client,
    base_url: String,
    options_base_url: String,
    api_key: Option<String>,
}

impl FmpEquityResolver {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url =
            std::env::var("FMP_BASE_URL").unwrap_or_else(|_| DEFAULT_FMP_BASE_URL.to_string());
        let options_base_url = std::env::var("OPTIONS_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_OPTIONS_BASE_URL.to_string());

        Ok(Self {
            http: http::build_client(http::timeout_from_env())?,
            base_url,
            options_base_url,
            api_key: settings.fmp_api_key.clone(),
        })
    }
}

#[async_trait::async_trait]
impl EquityResolver for FmpEquityResolver {
    fn provider_name(&self) -> &'static str {
        "fmp"
    }

    async fn resolve_equity(&self, symbol: &str) -> Result<EquityProfile, LookupError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(LookupError::MissingCredentials("FMP_API_KEY"))?;

        let url = format!(
            "{}/api/v3/profile/{symbol}",
            self.base_url.trim_end_matches('/')
        );
        let body = http::get_json(&self.http, &url, &[("apikey", api_key.to_string())]).await?;
        parse_profile(symbol, body)
    }

    async fn is_tradable(&self, symbol: &str) -> Result<bool, LookupError> {
        let url = format!(
            "{}/v7/finance/options/{symbol}",
            self.options_base_url.trim_end_matches('/')
        );
        let body = http::get_json(&self.http, &url, &[]).await?;
        Ok(has_option_expirations(&body))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpProfile {
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    mkt_cap: Option<f64>,
    #[serde(default)]
    exchange_short_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

fn parse_profile(symbol: &str, body: Value) -> Result<EquityProfile, LookupError> {
    // FMP answers unknown symbols with an empty array, and errors with an object.
    let profiles = match body {
        Value::Array(items) => items,
        other => {
            return Err(LookupError::Parse(format!(
                "expected profile array, got {}",
                truncate_chars(&other.to_string(), 120)
            )))
        }
    };
    let Some(first) = profiles.into_iter().next() else {
        return Err(LookupError::NotFound);
    };

    let p: FmpProfile = serde_json::from_value(first)?;
    let name = p
        .company_name
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| symbol.to_string());

    Ok(EquityProfile {
        exchange: p.exchange_short_name.unwrap_or_default().trim().to_ascii_uppercase(),
        market_cap: p.mkt_cap.filter(|c| *c > 0.0),
        name,
        description: truncate_chars(p.description.unwrap_or_default().trim(), DESCRIPTION_MAX_CHARS),
    })
}

fn has_option_expirations(body: &Value) -> bool {
    body.pointer("/optionChain/result/0/expirationDates")
        .and_then(Value::as_array)
        .is_some_and(|dates| !dates.is_empty())
}

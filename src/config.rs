use std::collections::BTreeMap;

use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::Value;

use crate::{fetcher::FetcherBuilder, Error};

/// Fetcher options in a form that can be deserialized.
///
/// Collaborators like a custom HTTP client or an existing websocket client
/// can't come from configuration, add them to the builder returned by
/// [`FetcherConfig::into_builder`].
///
/// ```rust
/// # fn example() -> Result<(), graphql_fetcher::Error> {
/// let config = graphql_fetcher::FetcherConfig::from_json(
///     r#"{
///         "url": "http://localhost:8000/graphql",
///         "subscriptionUrl": "ws://localhost:8000/graphql/ws",
///         "headers": { "authorization": "Bearer abc" },
///         "enableIncrementalDelivery": false
///     }"#,
/// )?;
/// let builder = config.into_builder()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FetcherConfig {
    /// The HTTP endpoint
    pub url: String,
    /// A websocket endpoint for subscriptions
    #[serde(default)]
    pub subscription_url: Option<String>,
    /// Headers to send with every HTTP request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Whether ordinary operations should accept multipart responses
    #[serde(default)]
    pub enable_incremental_delivery: Option<bool>,
    /// The `connection_init` payload for `subscription_url` connections
    #[serde(default)]
    pub ws_connection_params: Option<Value>,
}

impl FetcherConfig {
    /// Reads a config from JSON.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|error| Error::Config(error.to_string()))
    }

    /// Turns the config into a [`FetcherBuilder`].
    pub fn into_builder(self) -> Result<FetcherBuilder, Error> {
        let FetcherConfig {
            url,
            subscription_url,
            headers,
            enable_incremental_delivery,
            ws_connection_params,
        } = self;

        let mut builder = FetcherBuilder::new(url)
            .enable_incremental_delivery(enable_incremental_delivery)
            .headers(header_map(headers)?);

        if let Some(subscription_url) = subscription_url {
            builder = builder.subscription_url(subscription_url);
        }
        if let Some(params) = ws_connection_params {
            builder = builder.ws_connection_params(params)?;
        }

        Ok(builder)
    }
}

fn header_map(headers: BTreeMap<String, String>) -> Result<HeaderMap, Error> {
    headers
        .into_iter()
        .map(|(name, value)| {
            let header_name = HeaderName::try_from(name.as_str())
                .map_err(|error| Error::Config(format!("invalid header name {name}: {error}")))?;
            let header_value = HeaderValue::try_from(value).map_err(|error| {
                Error::Config(format!("invalid value for header {name}: {error}"))
            })?;
            Ok((header_name, header_value))
        })
        .collect()
}

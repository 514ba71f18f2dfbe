//! The fetcher: one entry point that routes each operation to a transport.

use std::{fmt, sync::Arc, time::Duration};

use async_graphql_parser::types::ExecutableDocument;
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

use crate::{
    abort::{or_abort, AbortSignal},
    ambient,
    classify::{is_subscription, parse_document, INTROSPECTION_OPERATION_NAME},
    client::ClientBuilder,
    graphql::GraphqlParams,
    logging::{debug, trace, warning},
    transport::{
        Connector, FetchOutput, HttpClient, HttpTransport, SubscriptionClient, Transport,
        TransportKind, UrlTransport,
    },
    Error,
};

/// Whether ordinary operations accept incremental (multipart) responses.
///
/// Anything other than an explicit `Disabled` means enabled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IncrementalDelivery {
    /// Accept multipart responses.
    Enabled,
    /// Only ever expect a single JSON response.
    Disabled,
    /// Not configured, which behaves like `Enabled`.
    #[default]
    Unset,
}

impl IncrementalDelivery {
    /// Resolves the setting to a plain bool.
    pub fn is_enabled(self) -> bool {
        !matches!(self, IncrementalDelivery::Disabled)
    }
}

impl From<bool> for IncrementalDelivery {
    fn from(enabled: bool) -> Self {
        if enabled {
            IncrementalDelivery::Enabled
        } else {
            IncrementalDelivery::Disabled
        }
    }
}

impl From<Option<bool>> for IncrementalDelivery {
    fn from(enabled: Option<bool>) -> Self {
        enabled.map_or(IncrementalDelivery::Unset, Into::into)
    }
}

/// Per call options for [`Fetcher::fetch`].
#[derive(Debug, Default)]
pub struct FetcherOpts {
    /// An already parsed version of the query.
    ///
    /// When absent the fetcher parses the query itself to decide whether it's
    /// a subscription.
    pub document: Option<ExecutableDocument>,
    /// Aborts the call, see [`crate::AbortController`].
    pub signal: Option<AbortSignal>,
    /// Headers for this call only, taking precedence over configured ones.
    pub headers: HeaderMap,
}

impl FetcherOpts {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provides the parsed document.
    pub fn document(self, document: ExecutableDocument) -> Self {
        FetcherOpts {
            document: Some(document),
            ..self
        }
    }

    /// Provides a signal that can abort the call.
    pub fn signal(self, signal: AbortSignal) -> Self {
        FetcherOpts {
            signal: Some(signal),
            ..self
        }
    }

    /// Adds a header for this call.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Builder for a [`Fetcher`].
///
/// ```rust,no_run
/// # fn example() -> Result<(), graphql_fetcher::Error> {
/// let fetcher = graphql_fetcher::Fetcher::builder("http://localhost:8000/graphql")
///     .subscription_url("ws://localhost:8000/graphql/ws")
///     .enable_incremental_delivery(false)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub struct FetcherBuilder {
    url: String,
    fetch: Option<Arc<dyn HttpClient>>,
    subscription_url: Option<String>,
    ws_client: Option<Arc<dyn SubscriptionClient>>,
    ws_settings: ClientBuilder,
    connector: Option<Arc<dyn Connector>>,
    incremental_delivery: IncrementalDelivery,
    headers: HeaderMap,
}

impl FetcherBuilder {
    /// Creates a builder for the HTTP endpoint at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        FetcherBuilder {
            url: url.into(),
            fetch: None,
            subscription_url: None,
            ws_client: None,
            ws_settings: ClientBuilder::new(),
            connector: None,
            incremental_delivery: IncrementalDelivery::Unset,
            headers: HeaderMap::new(),
        }
    }

    /// The HTTP client to send requests with.
    ///
    /// Without one the `reqwest` feature's client is used, if enabled.
    pub fn fetch(self, client: impl HttpClient + 'static) -> Self {
        FetcherBuilder {
            fetch: Some(Arc::new(client)),
            ..self
        }
    }

    /// A websocket endpoint for subscriptions.
    ///
    /// The fetcher connects to it on the first subscription.
    pub fn subscription_url(self, url: impl Into<String>) -> Self {
        FetcherBuilder {
            subscription_url: Some(url.into()),
            ..self
        }
    }

    /// An existing client to run subscriptions on.
    ///
    /// This takes precedence over `subscription_url`.  The fetcher never
    /// opens or closes the client's connection.
    pub fn ws_client(self, client: impl SubscriptionClient + 'static) -> Self {
        FetcherBuilder {
            ws_client: Some(Arc::new(client)),
            ..self
        }
    }

    /// The `connection_init` payload for connections to `subscription_url`.
    pub fn ws_connection_params(self, params: impl Serialize) -> Result<Self, Error> {
        Ok(FetcherBuilder {
            ws_settings: self.ws_settings.connection_params(params)?,
            ..self
        })
    }

    /// Keeps connections to `subscription_url` alive with pings, see
    /// [`ClientBuilder::keep_alive`].
    pub fn ws_keep_alive(self, interval: Duration, retries: usize) -> Self {
        FetcherBuilder {
            ws_settings: self.ws_settings.keep_alive(interval, retries),
            ..self
        }
    }

    /// How to open connections to `subscription_url`.
    ///
    /// Defaults to [`crate::TokioConnector`] when the `tungstenite` feature is
    /// enabled.
    pub fn connector(self, connector: impl Connector + 'static) -> Self {
        FetcherBuilder {
            connector: Some(Arc::new(connector)),
            ..self
        }
    }

    /// Whether ordinary operations should accept multipart responses.
    pub fn enable_incremental_delivery(self, enabled: impl Into<IncrementalDelivery>) -> Self {
        FetcherBuilder {
            incremental_delivery: enabled.into(),
            ..self
        }
    }

    /// Adds a header to every HTTP request.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Adds headers to every HTTP request.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Validates the configuration and builds the fetcher.
    ///
    /// Fails with [`Error::NoHttpClient`] if no HTTP client was given and no
    /// ambient one is available.
    pub fn build(self) -> Result<Fetcher, Error> {
        self.build_with(ambient::http_client())
    }

    fn build_with(self, ambient_client: Option<Arc<dyn HttpClient>>) -> Result<Fetcher, Error> {
        let FetcherBuilder {
            url,
            fetch,
            subscription_url,
            ws_client,
            ws_settings,
            connector,
            incremental_delivery,
            headers,
        } = self;

        let Some(client) = fetch.or(ambient_client) else {
            return Err(Error::NoHttpClient);
        };

        url.parse::<http::Uri>()
            .map_err(|error| Error::Config(format!("invalid url {url}: {error}")))?;

        let http = HttpTransport::new(url.into(), headers, client);
        let simple = Transport::Simple(http.clone());
        let default = if incremental_delivery.is_enabled() {
            Transport::Multipart(http)
        } else {
            simple.clone()
        };

        let mut websocket = subscription_url.as_deref().and_then(|url| {
            let connector = connector.or_else(ambient::connector);
            match UrlTransport::new(url, ws_settings, connector) {
                Ok(transport) => Some(Transport::WebsocketUrl(transport)),
                Err(error) => {
                    #[allow(unused)]
                    let error = error;
                    warning!("subscription url can't be used: {error}");
                    None
                }
            }
        });

        if let Some(client) = ws_client {
            websocket = Some(Transport::WebsocketClient(client));
        }

        let fetcher = Fetcher {
            simple,
            default,
            websocket,
            subscription_url,
        };
        debug!("built {fetcher:?}");

        Ok(fetcher)
    }
}

impl fmt::Debug for FetcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetcherBuilder")
            .field("url", &self.url)
            .field("fetch", &self.fetch.is_some())
            .field("subscription_url", &self.subscription_url)
            .field("ws_client", &self.ws_client.is_some())
            .field("ws_settings", &self.ws_settings)
            .field("connector", &self.connector.is_some())
            .field("incremental_delivery", &self.incremental_delivery)
            .field("headers", &self.headers)
            .finish()
    }
}

/// Sends GraphQL operations over whichever transport suits them.
///
/// - Operations named `IntrospectionQuery` always use plain HTTP.
/// - Subscriptions use the websocket transport, failing if there is none.
/// - Everything else uses multipart HTTP, or plain HTTP if incremental
///   delivery was disabled.
///
/// Cloning is cheap, clones share any websocket connection.
#[derive(Clone)]
pub struct Fetcher {
    simple: Transport,
    default: Transport,
    websocket: Option<Transport>,
    subscription_url: Option<String>,
}

impl Fetcher {
    /// Creates a [`FetcherBuilder`] for the HTTP endpoint at `url`.
    pub fn builder(url: impl Into<String>) -> FetcherBuilder {
        FetcherBuilder::new(url)
    }

    /// Works out which transport an operation would be sent over.
    ///
    /// This is the routing half of [`Fetcher::fetch`] and does no I/O.
    pub fn route(
        &self,
        params: &GraphqlParams,
        document: Option<&ExecutableDocument>,
    ) -> Result<TransportKind, Error> {
        self.select(params, document).map(Transport::kind)
    }

    /// Runs an operation.
    ///
    /// Without `opts.document` the query is parsed on every call to find out
    /// whether it is a subscription, so callers that already hold a parsed
    /// document should pass it along.
    ///
    /// Aborting `opts.signal` fails the call with [`Error::Aborted`] if it is
    /// still in flight, or ends the returned stream with one.
    pub async fn fetch(
        &self,
        params: GraphqlParams,
        opts: FetcherOpts,
    ) -> Result<FetchOutput, Error> {
        let FetcherOpts {
            document,
            signal,
            headers,
        } = opts;

        let transport = self.select(&params, document.as_ref())?;
        trace!(
            "sending {} over {:?}",
            params.operation_name.as_deref().unwrap_or("anonymous operation"),
            transport.kind()
        );

        let output = or_abort(transport.execute(params, &headers), signal.as_ref()).await?;

        Ok(output.abortable(signal.as_ref()))
    }

    fn select(
        &self,
        params: &GraphqlParams,
        document: Option<&ExecutableDocument>,
    ) -> Result<&Transport, Error> {
        let operation_name = params.operation_name.as_deref();

        if operation_name == Some(INTROSPECTION_OPERATION_NAME) {
            return Ok(&self.simple);
        }

        let parsed;
        let document = match document {
            Some(document) => Some(document),
            None => {
                parsed = parse_document(&params.query);
                parsed.as_ref()
            }
        };

        if !is_subscription(document, operation_name) {
            return Ok(&self.default);
        }

        match (&self.websocket, &self.subscription_url) {
            (Some(websocket), _) => Ok(websocket),
            (None, Some(url)) => Err(Error::SubscriptionUrlFailed(url.clone())),
            (None, None) => Err(Error::SubscriptionsNotConfigured),
        }
    }
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("default", &self.default.kind())
            .field("websocket", &self.websocket.as_ref().map(Transport::kind))
            .field("subscription_url", &self.subscription_url)
            .finish()
    }
}

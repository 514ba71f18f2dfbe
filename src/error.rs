#[derive(thiserror::Error, Debug)]
/// Error type
pub enum Error {
    /// Neither an explicit nor an ambient HTTP client could be resolved
    #[error("no valid fetcher implementation available")]
    NoHttpClient,
    /// A subscription was dispatched but the configured subscription url could not be used
    #[error(
        "fetcher is not properly configured for websocket subscriptions yet. provided url {0} failed"
    )]
    SubscriptionUrlFailed(String),
    /// A subscription was dispatched but no websocket option was ever supplied
    #[error(
        "fetcher is not properly configured for websocket subscriptions yet. try providing a subscription_url or a ws_client first"
    )]
    SubscriptionsNotConfigured,
    /// Unknown error
    #[error("unknown: {0}")]
    Unknown(String),
    /// HTTP transport error
    #[error("http error: {0}")]
    Http(String),
    /// A multipart response contained something other than JSON
    #[error("expected multipart chunks to be of json type. got:\n{0}")]
    Multipart(String),
    /// Couldn't open a websocket connection
    #[error("couldn't connect to {0}, reason: {1}")]
    Connect(String, String),
    /// Unexpected close frame
    #[error("socket closed with event {0} {1}")]
    Close(u16, String),
    /// Decoding / parsing error
    #[error("message decode error, reason: {0}")]
    Decode(String),
    /// Serializing error
    #[error("couldn't serialize message, reason: {0}")]
    Serializing(String),
    /// Sending error
    #[error("message sending error, reason: {0}")]
    Send(String),
    /// Fetcher configuration couldn't be read
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The request was aborted through its `AbortSignal`
    #[error("the operation was aborted")]
    Aborted,
}

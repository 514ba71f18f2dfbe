//! Collaborators the fetcher falls back to when none are configured.
//!
//! Which ones exist depends on the enabled cargo features: `reqwest` provides
//! an HTTP client and `tungstenite` a websocket connector.

use std::sync::Arc;

use crate::transport::{Connector, HttpClient};

/// The HTTP client used when no `fetch` was configured.
pub(crate) fn http_client() -> Option<Arc<dyn HttpClient>> {
    #[cfg(feature = "reqwest")]
    {
        Some(Arc::new(ReqwestClient::default()))
    }
    #[cfg(not(feature = "reqwest"))]
    {
        None
    }
}

/// The connector used for a `subscription_url` when none was configured.
pub(crate) fn connector() -> Option<Arc<dyn Connector>> {
    #[cfg(feature = "tungstenite")]
    {
        Some(Arc::new(crate::native::TokioConnector::default()))
    }
    #[cfg(not(feature = "tungstenite"))]
    {
        None
    }
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_client::ReqwestClient;

#[cfg(feature = "reqwest")]
mod reqwest_client {
    use futures_lite::{future, StreamExt};

    use crate::{
        logging::trace,
        transport::{ByteStream, HttpClient},
        Error,
    };

    /// An [`HttpClient`] backed by `reqwest`.
    ///
    /// Response bodies are streamed, so multipart responses are decoded as
    /// they arrive.
    #[derive(Clone, Debug, Default)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        /// Wraps an existing `reqwest::Client`, keeping its settings.
        pub fn new(client: reqwest::Client) -> Self {
            ReqwestClient { client }
        }
    }

    impl From<reqwest::Client> for ReqwestClient {
        fn from(client: reqwest::Client) -> Self {
            ReqwestClient::new(client)
        }
    }

    impl HttpClient for ReqwestClient {
        fn fetch(
            &self,
            request: http::Request<Vec<u8>>,
        ) -> future::Boxed<Result<http::Response<ByteStream>, Error>> {
            let client = self.client.clone();

            Box::pin(async move {
                let request = reqwest::Request::try_from(request).map_err(http_error)?;

                trace!("sending {} {}", request.method(), request.url());

                let response = client.execute(request).await.map_err(http_error)?;

                let status = response.status();
                let version = response.version();
                let headers = response.headers().clone();

                let body = response
                    .bytes_stream()
                    .map(|chunk| chunk.map_err(http_error))
                    .boxed();

                let mut response = http::Response::new(body);
                *response.status_mut() = status;
                *response.version_mut() = version;
                *response.headers_mut() = headers;

                Ok::<_, Error>(response)
            })
        }
    }

    /// reqwest keeps the interesting part of connection failures in the
    /// error's sources, so they are spelled out too.
    fn http_error(error: reqwest::Error) -> Error {
        let mut message = error.to_string();
        let mut source = std::error::Error::source(&error);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Error::Http(message)
    }
}

//! The transports a fetcher routes operations to.
//!
//! Transports are a closed set: adding one means updating the routing policy
//! in [`crate::Fetcher`] too.  The open seams are the collaborator traits
//! ([`HttpClient`], [`SubscriptionClient`] & [`Connector`]).

use std::{fmt, sync::Arc};

use futures_lite::{stream, StreamExt};

use crate::{
    abort::{AbortSignal, Abortable},
    graphql::{ExecutionResult, GraphqlParams},
    Error,
};

mod http;
mod multipart;
mod websocket;

pub use self::{
    http::{ByteStream, HttpClient},
    websocket::{Connector, SubscriptionClient},
};

pub(crate) use self::{http::HttpTransport, websocket::UrlTransport};

/// An ordered stream of execution results.
pub type ResponseStream = stream::Boxed<Result<ExecutionResult, Error>>;

/// Identifies which transport serves an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// One request, one JSON response.
    Simple,
    /// One request, a `multipart/mixed` response of incremental results.
    Multipart,
    /// A websocket connection opened and owned by the fetcher.
    WebsocketUrl,
    /// A caller supplied [`SubscriptionClient`].
    WebsocketClient,
}

#[derive(Clone)]
pub(crate) enum Transport {
    Simple(HttpTransport),
    Multipart(HttpTransport),
    WebsocketUrl(UrlTransport),
    WebsocketClient(Arc<dyn SubscriptionClient>),
}

impl Transport {
    pub(crate) fn kind(&self) -> TransportKind {
        match self {
            Transport::Simple(_) => TransportKind::Simple,
            Transport::Multipart(_) => TransportKind::Multipart,
            Transport::WebsocketUrl(_) => TransportKind::WebsocketUrl,
            Transport::WebsocketClient(_) => TransportKind::WebsocketClient,
        }
    }

    pub(crate) async fn execute(
        &self,
        params: GraphqlParams,
        headers: &::http::HeaderMap,
    ) -> Result<FetchOutput, Error> {
        match self {
            Transport::Simple(transport) => transport
                .simple(&params, headers)
                .await
                .map(FetchOutput::Single),
            Transport::Multipart(transport) => transport
                .multipart(&params, headers)
                .await
                .map(FetchOutput::Stream),
            Transport::WebsocketUrl(transport) => {
                transport.subscribe(params).await.map(FetchOutput::Stream)
            }
            Transport::WebsocketClient(client) => {
                client.subscribe(params).await.map(FetchOutput::Stream)
            }
        }
    }
}

/// The outcome of a fetch.
///
/// Plain HTTP produces a single result, every other transport a stream.  Use
/// [`FetchOutput::into_stream`] when the difference doesn't matter.
pub enum FetchOutput {
    /// A complete result.
    Single(ExecutionResult),
    /// Results in the order the transport produced them.
    Stream(ResponseStream),
}

impl FetchOutput {
    /// True if this output is a stream.
    pub fn is_stream(&self) -> bool {
        matches!(self, FetchOutput::Stream(_))
    }

    /// Views the output as a stream, a single result becoming a one item stream.
    pub fn into_stream(self) -> ResponseStream {
        match self {
            FetchOutput::Single(result) => stream::once(Ok(result)).boxed(),
            FetchOutput::Stream(stream) => stream,
        }
    }

    pub(crate) fn abortable(self, signal: Option<&AbortSignal>) -> Self {
        match (self, signal) {
            (FetchOutput::Stream(stream), Some(signal)) => {
                FetchOutput::Stream(Abortable::new(stream, signal).boxed())
            }
            (output, _) => output,
        }
    }
}

impl fmt::Debug for FetchOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutput::Single(result) => f.debug_tuple("Single").field(result).finish(),
            FetchOutput::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

//! # graphql-fetcher
//!
//! graphql-fetcher builds a single [`Fetcher`] that sends each GraphQL
//! operation over the transport that suits it:
//!
//! - Subscriptions go over a websocket using the
//!   [graphql-transport-ws protocol][protocol], either on a connection the
//!   fetcher opens from a `subscription_url` or on an existing [`Client`].
//! - Queries & mutations go over HTTP, accepting [incremental
//!   delivery][incremental] as `multipart/mixed` responses unless that is
//!   disabled.
//! - Introspection (operations named `IntrospectionQuery`) always uses plain
//!   HTTP.
//!
//! The HTTP client and websocket library are pluggable through the
//! [`HttpClient`] & [`Connection`] traits.  Built in support is provided for:
//!
//! - [reqwest][reqwest] with the `reqwest` feature.
//! - [async-tungstenite][async-tungstenite] on [tokio][tokio] with the
//!   `tungstenite` feature.
//!
//! ```rust,no_run
//! use graphql_fetcher::{Fetcher, FetcherOpts, GraphqlParams};
//! use futures_lite::StreamExt;
//!
//! # async fn example() -> Result<(), graphql_fetcher::Error> {
//! let fetcher = Fetcher::builder("http://localhost:8000/graphql")
//!     .subscription_url("ws://localhost:8000/graphql/ws")
//!     .build()?;
//!
//! let mut results = fetcher
//!     .fetch(
//!         GraphqlParams::new("subscription { books { id } }"),
//!         FetcherOpts::new(),
//!     )
//!     .await?
//!     .into_stream();
//!
//! while let Some(result) = results.next().await {
//!     println!("{:?}", result?.data);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [protocol]: https://github.com/graphql/graphql-over-http/blob/main/rfcs/GraphQLOverWebSocket.md
//! [incremental]: https://github.com/graphql/graphql-wg/blob/main/rfcs/DeferStream.md
//! [reqwest]: https://docs.rs/reqwest
//! [async-tungstenite]: https://github.com/sdroege/async-tungstenite
//! [tokio]: https://tokio.rs/

#![warn(missing_docs)]

mod abort;
mod ambient;
mod client;
mod config;
mod error;
mod fetcher;
mod logging;
mod protocol;
mod transport;

pub mod classify;
pub mod graphql;

#[cfg(feature = "tungstenite")]
mod native;

pub use self::{
    abort::{AbortController, AbortSignal},
    classify::{is_subscription, parse_document, INTROSPECTION_OPERATION_NAME},
    client::{Client, ClientBuilder, Connection, ConnectionActor, Message, Subscription},
    config::FetcherConfig,
    error::Error,
    fetcher::{Fetcher, FetcherBuilder, FetcherOpts, IncrementalDelivery},
    graphql::{ExecutionResult, GraphqlError, GraphqlParams},
    transport::{
        ByteStream, Connector, FetchOutput, HttpClient, ResponseStream, SubscriptionClient,
        TransportKind,
    },
};

#[cfg(feature = "reqwest")]
pub use self::ambient::ReqwestClient;

#[cfg(feature = "tungstenite")]
pub use self::native::TokioConnector;

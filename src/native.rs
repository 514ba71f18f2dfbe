use std::future::IntoFuture;

use async_tungstenite::tungstenite::{
    self, client::IntoClientRequest, http::HeaderValue, protocol::CloseFrame,
};
use futures::{AsyncRead, AsyncWrite, SinkExt, StreamExt};
use futures_lite::future;
use url::Url;

use crate::{
    client::{Client, ClientBuilder, Connection, Message},
    logging::{trace, warning},
    transport::Connector,
    Error,
};

impl<T> Connection for async_tungstenite::WebSocketStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn receive(&mut self) -> Option<Message> {
        loop {
            match self.next().await? {
                Ok(tungstenite::Message::Text(text)) => return Some(Message::Text(text)),
                Ok(tungstenite::Message::Ping(_)) => return Some(Message::Ping),
                Ok(tungstenite::Message::Pong(_)) => return Some(Message::Pong),
                Ok(tungstenite::Message::Close(frame)) => {
                    return Some(Message::Close {
                        code: frame.as_ref().map(|frame| frame.code.into()),
                        reason: frame.map(|frame| frame.reason.to_string()),
                    })
                }
                Ok(tungstenite::Message::Frame(_) | tungstenite::Message::Binary(_)) => continue,
                Err(error) => {
                    #[allow(unused)]
                    let error = error;
                    warning!("error receiving message: {error:?}");
                    return None;
                }
            }
        }
    }

    async fn send(&mut self, message: Message) -> Result<(), Error> {
        <Self as SinkExt<tungstenite::Message>>::send(
            self,
            match message {
                Message::Text(text) => tungstenite::Message::Text(text),
                Message::Close { code, reason } => {
                    tungstenite::Message::Close(code.zip(reason).map(|(code, reason)| CloseFrame {
                        code: code.into(),
                        reason: reason.into(),
                    }))
                }
                Message::Ping => tungstenite::Message::Ping(vec![]),
                Message::Pong => tungstenite::Message::Pong(vec![]),
            },
        )
        .await
        .map_err(|error| Error::Send(error.to_string()))
    }
}

/// Opens graphql-transport-ws connections with `async-tungstenite` and runs
/// their [`crate::ConnectionActor`] on the current tokio runtime.
///
/// `wss://` urls are supported with the `rustls` feature, which is on by
/// default.  This is the connector used for `subscription_url` when none is
/// given explicitly.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioConnector;

impl Connector for TokioConnector {
    fn connect(&self, url: &Url, builder: ClientBuilder) -> future::Boxed<Result<Client, Error>> {
        let url = url.to_string();

        Box::pin(async move {
            let connect_error =
                |error: tungstenite::Error| Error::Connect(url.clone(), error.to_string());

            let mut request = url.as_str().into_client_request().map_err(connect_error)?;
            request.headers_mut().insert(
                "Sec-WebSocket-Protocol",
                HeaderValue::from_static("graphql-transport-ws"),
            );

            let (connection, _) = async_tungstenite::tokio::connect_async(request)
                .await
                .map_err(connect_error)?;

            trace!("connected to {url}");

            let (client, actor) = builder.build(connection).await?;
            tokio::spawn(actor.into_future());

            Ok::<_, Error>(client)
        })
    }
}

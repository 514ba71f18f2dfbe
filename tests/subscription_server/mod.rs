use std::{
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_graphql::{Context, EmptyMutation, Object, Schema, SimpleObject, Subscription, ID};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse, GraphQLSubscription};
use axum::{extract::Extension, http::HeaderMap, routing::post, Router};
use futures_lite::{Stream, StreamExt};
use tokio::sync::broadcast::Sender;
use tokio_stream::wrappers::BroadcastStream;

pub type LibrarySchema = Schema<QueryRoot, EmptyMutation, SubscriptionRoot>;

/// An async-graphql server serving HTTP on `/` and graphql-transport-ws on `/ws`.
pub struct SubscriptionServer {
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    port: u16,
    sender: Sender<BookChanged>,
    subscriber_count: Arc<AtomicUsize>,
}

impl Drop for SubscriptionServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.send(()).ok();
        }
    }
}

impl SubscriptionServer {
    pub async fn start() -> SubscriptionServer {
        let (channel, _) = tokio::sync::broadcast::channel(16);
        let subscriber_count = Arc::new(AtomicUsize::new(0));

        let schema = Schema::build(
            QueryRoot,
            EmptyMutation,
            SubscriptionRoot {
                channel: channel.clone(),
                subscriber_count: Arc::clone(&subscriber_count),
            },
        )
        .finish();

        let app = Router::new()
            .route("/", post(graphql_handler))
            .route_service("/ws", GraphQLSubscription::new(schema.clone()))
            .layer(Extension(schema));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (shutdown_sender, shutdown_receiver) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app.with_state(()))
                .with_graceful_shutdown(async move {
                    shutdown_receiver.await.ok();
                })
                .await
                .unwrap();
        });

        tokio::time::sleep(Duration::from_millis(20)).await;

        SubscriptionServer {
            port,
            shutdown: Some(shutdown_sender),
            sender: channel,
            subscriber_count,
        }
    }

    pub fn http_url(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }

    pub fn websocket_url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.port)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::Relaxed)
    }

    /// Waits until `count` subscriptions are running on the server.
    pub async fn wait_for_subscribers(&self, count: usize) {
        for _ in 0..100 {
            if self.subscriber_count() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {count} subscribers, found {}",
            self.subscriber_count()
        );
    }

    pub fn send(
        &self,
        change: BookChanged,
    ) -> Result<(), tokio::sync::broadcast::error::SendError<BookChanged>> {
        self.sender.send(change).map(|_| ())
    }
}

#[axum_macros::debug_handler]
async fn graphql_handler(
    schema: Extension<LibrarySchema>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse {
    schema.execute(req.into_inner().data(headers)).await.into()
}

#[derive(SimpleObject, Debug, Clone)]
pub struct Book {
    pub id: ID,
    pub name: String,
    pub author: String,
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    pub async fn book(&self, id: ID) -> Book {
        Book {
            name: format!("Book {}", id.0),
            author: "Anonymous".into(),
            id,
        }
    }

    /// Echoes a request header back, for checking what the client sent.
    pub async fn header(&self, ctx: &Context<'_>, name: String) -> Option<String> {
        ctx.data_opt::<HeaderMap>()?
            .get(name.as_str())?
            .to_str()
            .ok()
            .map(str::to_owned)
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct BookChanged {
    pub book: Option<Book>,
    pub id: ID,
}

pub struct SubscriptionRoot {
    channel: Sender<BookChanged>,
    subscriber_count: Arc<AtomicUsize>,
}

#[Subscription]
impl SubscriptionRoot {
    async fn books(&self) -> impl Stream<Item = BookChanged> {
        self.subscriber_count.fetch_add(1, Ordering::Relaxed);
        TrackedBroadcastStream {
            inner: BroadcastStream::new(self.channel.subscribe()).filter_map(Result::ok),
            count: Arc::clone(&self.subscriber_count),
        }
    }
}

#[pin_project::pin_project(PinnedDrop)]
pub struct TrackedBroadcastStream<T> {
    #[pin]
    inner: T,
    count: Arc<AtomicUsize>,
}

impl<T> Stream for TrackedBroadcastStream<T>
where
    T: Stream,
{
    type Item = <T as Stream>::Item;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

#[pin_project::pinned_drop]
impl<T> PinnedDrop for TrackedBroadcastStream<T> {
    fn drop(self: Pin<&mut Self>) {
        self.project().count.fetch_sub(1, Ordering::Relaxed);
    }
}

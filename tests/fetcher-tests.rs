use std::{
    future::IntoFuture,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use assert_matches::assert_matches;
use bytes::Bytes;
use futures_lite::{future, stream, StreamExt};
use graphql_fetcher::{
    AbortController, ByteStream, Client, ClientBuilder, Connection, Connector, Error,
    ExecutionResult,
    FetchOutput, Fetcher, FetcherOpts, GraphqlParams, HttpClient, Message, ResponseStream,
    SubscriptionClient, TransportKind,
};
use http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue,
};
use serde_json::{json, Value};
use url::Url;

const ENDPOINT: &str = "http://localhost:8000/graphql";

type Requests = Arc<Mutex<Vec<http::Request<Vec<u8>>>>>;

/// Records every request and answers each one with the same canned body.
#[derive(Clone)]
struct MockHttp {
    requests: Requests,
    content_type: &'static str,
    body: &'static str,
}

impl MockHttp {
    fn json(body: &'static str) -> Self {
        MockHttp {
            requests: Requests::default(),
            content_type: "application/json",
            body,
        }
    }

    fn multipart(body: &'static str) -> Self {
        MockHttp {
            content_type: "multipart/mixed; boundary=\"-\"",
            ..MockHttp::json(body)
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl HttpClient for MockHttp {
    fn fetch(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> future::Boxed<Result<http::Response<ByteStream>, Error>> {
        self.requests.lock().unwrap().push(request);

        let response = http::Response::builder()
            .header(CONTENT_TYPE, self.content_type)
            .body(stream::once(Ok::<_, Error>(Bytes::from_static(self.body.as_bytes()))).boxed())
            .map_err(|error| Error::Http(error.to_string()));

        Box::pin(future::ready(response))
    }
}

#[tokio::test]
async fn scenario_a_introspection_uses_plain_http() {
    let http = MockHttp::json(r#"{"data":{"__schema":{"queryType":{"name":"Query"}}}}"#);
    let fetcher = Fetcher::builder(ENDPOINT).fetch(http.clone()).build().unwrap();

    let output = fetcher
        .fetch(
            GraphqlParams::new("query IntrospectionQuery { __schema { queryType { name } } }")
                .operation_name("IntrospectionQuery"),
            FetcherOpts::new(),
        )
        .await
        .unwrap();

    let result = match output {
        FetchOutput::Single(result) => result,
        other => panic!("expected a single result, got {other:?}"),
    };
    assert_eq!(
        result.data,
        Some(json!({"__schema": {"queryType": {"name": "Query"}}}))
    );
    assert_eq!(http.calls(), 1);
    assert!(http.requests.lock().unwrap()[0]
        .headers()
        .get(ACCEPT)
        .is_none());
}

#[tokio::test]
async fn scenario_b_mutations_stream_incremental_results() {
    let http = MockHttp::multipart(
        "\r\n---\r\ncontent-type: application/json; charset=utf-8\r\n\r\n{\"data\":{\"addBook\":{\"id\":\"1\"}},\"hasNext\":false}\r\n-----\r\n",
    );
    let fetcher = Fetcher::builder(ENDPOINT).fetch(http.clone()).build().unwrap();

    let output = fetcher
        .fetch(
            GraphqlParams::new("mutation AddBook { addBook(name: \"Dune\") { id } }"),
            FetcherOpts::new(),
        )
        .await
        .unwrap();

    assert!(output.is_stream());
    let results = output.into_stream().collect::<Vec<_>>().await;

    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].as_ref().unwrap().data,
        Some(json!({"addBook": {"id": "1"}}))
    );
    assert_eq!(
        http.requests.lock().unwrap()[0].headers()[ACCEPT],
        "application/json, multipart/mixed"
    );
}

#[tokio::test]
async fn disabled_incremental_delivery_uses_plain_http() {
    let http = MockHttp::json(r#"{"data":{"book":{"id":"1"}}}"#);
    let fetcher = Fetcher::builder(ENDPOINT)
        .fetch(http.clone())
        .enable_incremental_delivery(false)
        .build()
        .unwrap();

    let output = fetcher
        .fetch(GraphqlParams::new("{ book { id } }"), FetcherOpts::new())
        .await
        .unwrap();

    assert_matches!(output, FetchOutput::Single(_));
}

#[tokio::test]
async fn scenario_c_subscriptions_use_the_subscription_url() {
    let http = MockHttp::json("{}");
    let connector = MockConnector::default();
    let fetcher = Fetcher::builder(ENDPOINT)
        .fetch(http.clone())
        .subscription_url("wss://x")
        .connector(connector.clone())
        .build()
        .unwrap();

    let subscription = GraphqlParams::new("subscription OnBook { books { id } }");
    assert_eq!(
        fetcher.route(&subscription, None).unwrap(),
        TransportKind::WebsocketUrl
    );

    for _ in 0..2 {
        let results = fetcher
            .fetch(subscription.clone(), FetcherOpts::new())
            .await
            .unwrap()
            .into_stream()
            .collect::<Vec<_>>()
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].as_ref().unwrap().data,
            Some(json!({"books": [{"id": "1"}]}))
        );
    }

    assert_eq!(http.calls(), 0);
    // Both subscriptions shared the one connection
    assert_eq!(connector.connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn websocket_settings_reach_the_connection() {
    let connector = MockConnector::default();
    let fetcher = Fetcher::builder(ENDPOINT)
        .fetch(MockHttp::json("{}"))
        .subscription_url("wss://x")
        .ws_connection_params(json!({"token": "abc"}))
        .unwrap()
        .ws_keep_alive(Duration::from_millis(10), 3)
        .connector(connector.clone())
        .build()
        .unwrap();

    let results = fetcher
        .fetch(
            GraphqlParams::new("subscription { books { id } }"),
            FetcherOpts::new(),
        )
        .await
        .unwrap()
        .into_stream()
        .collect::<Vec<_>>()
        .await;
    assert_eq!(results.len(), 1);

    // The idle connection is kept alive with pings
    for _ in 0..100 {
        if connector.pings.load(Ordering::SeqCst) >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(connector.pings.load(Ordering::SeqCst) >= 2);

    assert_eq!(
        *connector.init_payloads.lock().unwrap(),
        vec![json!({"token": "abc"})]
    );
}

#[tokio::test]
async fn scenario_d_subscriptions_without_websockets_fail() {
    let http = MockHttp::json("{}");
    let fetcher = Fetcher::builder(ENDPOINT).fetch(http.clone()).build().unwrap();

    let error = fetcher
        .fetch(
            GraphqlParams::new("subscription OnBook { books { id } }"),
            FetcherOpts::new(),
        )
        .await
        .unwrap_err();

    assert_matches!(error, Error::SubscriptionsNotConfigured);
    assert!(error.to_string().contains("subscription_url or a ws_client"));
    assert_eq!(http.calls(), 0);
}

#[tokio::test]
async fn ws_client_is_preferred_over_subscription_url() {
    let connector = MockConnector::default();
    let ws_client = RecordingSubscriptions::default();
    let fetcher = Fetcher::builder(ENDPOINT)
        .fetch(MockHttp::json("{}"))
        .subscription_url("wss://x")
        .connector(connector.clone())
        .ws_client(ws_client.clone())
        .build()
        .unwrap();

    let results = fetcher
        .fetch(
            GraphqlParams::new("subscription { books { id } }"),
            FetcherOpts::new(),
        )
        .await
        .unwrap()
        .into_stream()
        .collect::<Vec<_>>()
        .await;

    assert!(results.is_empty());
    assert_eq!(ws_client.calls.load(Ordering::SeqCst), 1);
    assert_eq!(connector.connections.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn per_call_headers_override_configured_ones() {
    let http = MockHttp::json("{}");
    let fetcher = Fetcher::builder(ENDPOINT)
        .fetch(http.clone())
        .enable_incremental_delivery(false)
        .header(AUTHORIZATION, HeaderValue::from_static("Bearer configured"))
        .header(
            "x-client-name".parse().unwrap(),
            HeaderValue::from_static("fetcher-tests"),
        )
        .build()
        .unwrap();

    fetcher
        .fetch(
            GraphqlParams::new("{ book { id } }"),
            FetcherOpts::new().header(AUTHORIZATION, HeaderValue::from_static("Bearer per-call")),
        )
        .await
        .unwrap();

    let requests = http.requests.lock().unwrap();
    let headers = requests[0].headers();
    assert_eq!(headers[AUTHORIZATION], "Bearer per-call");
    assert_eq!(headers["x-client-name"], "fetcher-tests");
    assert_eq!(headers[CONTENT_TYPE], "application/json");
    assert_eq!(requests[0].uri(), ENDPOINT);
}

#[tokio::test]
async fn aborted_signals_never_reach_the_transport() {
    let http = MockHttp::json("{}");
    let fetcher = Fetcher::builder(ENDPOINT).fetch(http.clone()).build().unwrap();
    let controller = AbortController::new();
    controller.abort();

    let error = fetcher
        .fetch(
            GraphqlParams::new("{ book { id } }"),
            FetcherOpts::new().signal(controller.signal()),
        )
        .await
        .unwrap_err();

    assert_matches!(error, Error::Aborted);
    assert_eq!(http.calls(), 0);
}

#[tokio::test]
async fn aborting_cancels_an_in_flight_request() {
    let hanging = |_: http::Request<Vec<u8>>| {
        future::pending::<Result<http::Response<ByteStream>, Error>>()
    };
    let fetcher = Fetcher::builder(ENDPOINT).fetch(hanging).build().unwrap();
    let controller = AbortController::new();

    let request = fetcher.fetch(
        GraphqlParams::new("{ book { id } }"),
        FetcherOpts::new().signal(controller.signal()),
    );
    let abort = async {
        tokio::task::yield_now().await;
        controller.abort();
        future::pending().await
    };

    assert_matches!(future::or(request, abort).await, Err(Error::Aborted));
}

#[tokio::test]
async fn aborting_ends_a_running_subscription() {
    let fetcher = Fetcher::builder(ENDPOINT)
        .fetch(MockHttp::json("{}"))
        .ws_client(EndlessSubscriptions)
        .build()
        .unwrap();
    let controller = AbortController::new();

    let mut results = fetcher
        .fetch(
            GraphqlParams::new("subscription { books { id } }"),
            FetcherOpts::new().signal(controller.signal()),
        )
        .await
        .unwrap()
        .into_stream();

    assert!(results.next().await.unwrap().is_ok());
    controller.abort();
    assert_matches!(results.next().await, Some(Err(Error::Aborted)));
    assert!(results.next().await.is_none());
}

#[tokio::test]
async fn configuration_without_an_http_client_needs_the_ambient_one() {
    // The integration tests run with the `reqwest` feature, which provides
    // an ambient client.
    let fetcher = Fetcher::builder(ENDPOINT).build().unwrap();

    assert_eq!(
        fetcher
            .route(&GraphqlParams::new("{ book { id } }"), None)
            .unwrap(),
        TransportKind::Multipart
    );
}

#[derive(Clone, Default)]
struct RecordingSubscriptions {
    calls: Arc<AtomicUsize>,
}

impl SubscriptionClient for RecordingSubscriptions {
    fn subscribe(&self, _: GraphqlParams) -> future::Boxed<Result<ResponseStream, Error>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok::<ResponseStream, Error>(stream::empty().boxed()) })
    }
}

struct EndlessSubscriptions;

impl SubscriptionClient for EndlessSubscriptions {
    fn subscribe(&self, _: GraphqlParams) -> future::Boxed<Result<ResponseStream, Error>> {
        Box::pin(async {
            let first = ExecutionResult {
                data: Some(json!({"books": []})),
                ..Default::default()
            };
            Ok::<ResponseStream, Error>(stream::once(Ok(first)).chain(stream::pending()).boxed())
        })
    }
}

/// Connects to an in-process server that answers every subscription with one
/// `next` followed by `complete`, and every ping with a pong.
#[derive(Clone, Default)]
struct MockConnector {
    connections: Arc<AtomicUsize>,
    init_payloads: Arc<Mutex<Vec<Value>>>,
    pings: Arc<AtomicUsize>,
}

impl Connector for MockConnector {
    fn connect(&self, url: &Url, builder: ClientBuilder) -> future::Boxed<Result<Client, Error>> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        assert_eq!(url.as_str(), "wss://x/");

        let init_payloads = Arc::clone(&self.init_payloads);
        let pings = Arc::clone(&self.pings);

        Box::pin(async move {
            let (to_client, incoming) = async_channel::unbounded();
            let (outgoing, from_client) = async_channel::unbounded();

            to_client
                .try_send(Message::Text(json!({"type": "connection_ack"}).to_string()))
                .unwrap();

            let (client, actor) = builder
                .build(ChannelConnection { incoming, outgoing })
                .await?;
            tokio::spawn(actor.into_future());

            tokio::spawn(async move {
                while let Ok(Message::Text(text)) = from_client.recv().await {
                    let message: Value = serde_json::from_str(&text).unwrap();
                    match message["type"].as_str() {
                        Some("connection_init") => {
                            init_payloads
                                .lock()
                                .unwrap()
                                .push(message["payload"].clone());
                            continue;
                        }
                        Some("ping") => {
                            pings.fetch_add(1, Ordering::SeqCst);
                            let pong = json!({"type": "pong"}).to_string();
                            to_client.send(Message::Text(pong)).await.ok();
                            continue;
                        }
                        Some("subscribe") => {}
                        _ => continue,
                    }
                    let id = &message["id"];
                    let data = json!({"books": [{"id": "1"}]});
                    let replies = [
                        json!({"type": "next", "id": id, "payload": {"data": data}}),
                        json!({"type": "complete", "id": id}),
                    ];
                    for reply in replies {
                        to_client.send(Message::Text(reply.to_string())).await.ok();
                    }
                }
            });

            Ok::<_, Error>(client)
        })
    }
}

struct ChannelConnection {
    incoming: async_channel::Receiver<Message>,
    outgoing: async_channel::Sender<Message>,
}

impl Connection for ChannelConnection {
    async fn receive(&mut self) -> Option<Message> {
        self.incoming.recv().await.ok()
    }

    async fn send(&mut self, message: Message) -> Result<(), Error> {
        self.outgoing
            .send(message)
            .await
            .map_err(|error| Error::Send(error.to_string()))
    }
}

use std::{future::Future, sync::Arc};

use bytes::Bytes;
use futures_lite::{future, stream, StreamExt};
use http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderMap, HeaderValue, Method, StatusCode,
};

use crate::{
    graphql::{ExecutionResult, GraphqlParams},
    logging::{debug, trace},
    Error,
};

use super::{multipart, ResponseStream};

/// A streamed HTTP response body.
pub type ByteStream = stream::Boxed<Result<Bytes, Error>>;

/// A fetch-like HTTP capability.
///
/// The fetcher builds complete requests (method, url, headers & a JSON body)
/// and hands them to an `HttpClient`.  Responses should be returned as soon
/// as their headers arrive, with the body streamed, so that incremental
/// delivery can hand out results early.
///
/// Any `Fn(http::Request<Vec<u8>>) -> impl Future<...>` closure can be used
/// as an `HttpClient`.  An implementation backed by `reqwest` is available
/// with the `reqwest` feature.
pub trait HttpClient: Send + Sync {
    /// Sends the request, resolving once response headers are available.
    fn fetch(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> future::Boxed<Result<http::Response<ByteStream>, Error>>;
}

impl<F, Fut> HttpClient for F
where
    F: Fn(http::Request<Vec<u8>>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<http::Response<ByteStream>, Error>> + Send + 'static,
{
    fn fetch(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> future::Boxed<Result<http::Response<ByteStream>, Error>> {
        Box::pin(self(request))
    }
}

const JSON: &str = "application/json";
const ACCEPT_INCREMENTAL: &str = "application/json, multipart/mixed";

/// Runs operations against a GraphQL-over-HTTP endpoint.
#[derive(Clone)]
pub(crate) struct HttpTransport {
    url: Arc<str>,
    headers: HeaderMap,
    client: Arc<dyn HttpClient>,
}

impl HttpTransport {
    pub(crate) fn new(url: Arc<str>, headers: HeaderMap, client: Arc<dyn HttpClient>) -> Self {
        HttpTransport {
            url,
            headers,
            client,
        }
    }

    /// Sends the operation and decodes the whole response as one result.
    pub(crate) async fn simple(
        &self,
        params: &GraphqlParams,
        headers: &HeaderMap,
    ) -> Result<ExecutionResult, Error> {
        let request = self.request(params, headers, false)?;
        let response = self.client.fetch(request).await?;
        let status = response.status();

        decode_body(&read_body(response.into_body()).await?, status)
    }

    /// Sends the operation, accepting a multipart response.
    ///
    /// The returned stream yields each increment as it arrives and finishes
    /// after the final one.
    pub(crate) async fn multipart(
        &self,
        params: &GraphqlParams,
        headers: &HeaderMap,
    ) -> Result<ResponseStream, Error> {
        let request = self.request(params, headers, true)?;
        let response = self.client.fetch(request).await?;
        let status = response.status();

        let Some(boundary) = multipart_boundary(response.headers()) else {
            debug!("response to {} is not multipart, expecting a single result", self.url);
            let body = response.into_body();
            return Ok(stream::unfold(Some(body), move |body| async move {
                let result = read_body(body?)
                    .await
                    .and_then(|body| decode_body(&body, status));
                Some((result, None))
            })
            .boxed());
        };

        trace!("reading multipart response with boundary {boundary}");

        let results = multipart::parts(response.into_body(), &boundary)
            .map(|part| part.and_then(multipart::Part::into_result))
            .boxed();

        Ok(stream::unfold((results, false), |(mut results, done)| async move {
            if done {
                return None;
            }
            let result = results.next().await?;
            let done = result.as_ref().map_or(true, ExecutionResult::is_final);
            Some((result, (results, done)))
        })
        .boxed())
    }

    fn request(
        &self,
        params: &GraphqlParams,
        headers: &HeaderMap,
        incremental: bool,
    ) -> Result<http::Request<Vec<u8>>, Error> {
        let body =
            serde_json::to_vec(params).map_err(|error| Error::Serializing(error.to_string()))?;

        let mut request = http::Request::builder()
            .method(Method::POST)
            .uri(&*self.url)
            .body(body)
            .map_err(|error| Error::Http(error.to_string()))?;

        let request_headers = request.headers_mut();
        request_headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
        if incremental {
            request_headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_INCREMENTAL));
        }
        merge_headers(request_headers, &self.headers);
        merge_headers(request_headers, headers);

        Ok(request)
    }
}

/// Copies `overrides` into `target`, replacing any values `target` already had
/// for the same header.
fn merge_headers(target: &mut HeaderMap, overrides: &HeaderMap) {
    for name in overrides.keys() {
        target.remove(name);
        for value in overrides.get_all(name) {
            target.append(name.clone(), value.clone());
        }
    }
}

fn multipart_boundary(headers: &HeaderMap) -> Option<String> {
    let mime = headers
        .get(CONTENT_TYPE)?
        .to_str()
        .ok()?
        .parse::<mime::Mime>()
        .ok()?;

    if mime.type_() != mime::MULTIPART || mime.subtype().as_str() != "mixed" {
        return None;
    }

    Some(
        mime.get_param(mime::BOUNDARY)
            .map_or(multipart::DEFAULT_BOUNDARY, |boundary| boundary.as_str())
            .to_owned(),
    )
}

async fn read_body(mut body: ByteStream) -> Result<Vec<u8>, Error> {
    let mut buffer = Vec::new();
    while let Some(chunk) = body.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer)
}

fn decode_body(body: &[u8], status: StatusCode) -> Result<ExecutionResult, Error> {
    serde_json::from_slice(body).map_err(|error| {
        if status.is_success() {
            Error::Decode(error.to_string())
        } else {
            Error::Http(format!("{status}: {}", String::from_utf8_lossy(body)))
        }
    })
}

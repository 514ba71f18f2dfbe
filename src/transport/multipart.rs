//! Reading `multipart/mixed` response bodies.
//!
//! Parts are yielded as soon as their closing delimiter has arrived, so the
//! first increments of a deferred response can be used while the rest of the
//! body is still in flight.

use bytes::Bytes;
use futures_lite::{stream, Stream};
use http::{header::CONTENT_TYPE, HeaderMap};
use multer::Multipart;

use crate::{graphql::ExecutionResult, logging::trace, Error};

use super::ByteStream;

/// The boundary used when a multipart content type doesn't name one.
pub(crate) const DEFAULT_BOUNDARY: &str = "-";

/// One part of a multipart body.
#[derive(Debug)]
pub(crate) struct Part {
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl Part {
    fn is_json(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<mime::Mime>().ok())
            .is_some_and(|mime| {
                mime.subtype() == mime::JSON
                    || mime.suffix().is_some_and(|suffix| suffix == mime::JSON)
            })
    }

    pub(crate) fn into_result(self) -> Result<ExecutionResult, Error> {
        if !self.is_json() {
            return Err(Error::Multipart(self.describe()));
        }

        serde_json::from_slice(&self.body).map_err(|error| Error::Decode(error.to_string()))
    }

    fn describe(&self) -> String {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| format!("{name}: {}", String::from_utf8_lossy(value.as_bytes())))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Headers::\n{headers}\n\nBody::\n{}",
            String::from_utf8_lossy(&self.body)
        )
    }
}

/// Splits a multipart body into its parts, in order.
///
/// The stream ends at the closing delimiter or when the body runs out, and
/// after the first error.
pub(crate) fn parts(
    body: ByteStream,
    boundary: &str,
) -> impl Stream<Item = Result<Part, Error>> + Send + 'static {
    let multipart = Multipart::new(body, boundary);

    stream::unfold(Some(multipart), |multipart| async move {
        let mut multipart = multipart?;
        match next_part(&mut multipart).await {
            Ok(Some(part)) => Some((Ok(part), Some(multipart))),
            Ok(None) => None,
            Err(error) => Some((Err(error), None)),
        }
    })
}

async fn next_part(multipart: &mut Multipart<'static>) -> Result<Option<Part>, Error> {
    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) => return Ok(None),
        Err(error) => return end_of_body(error),
    };

    let headers = field.headers().clone();
    match field.bytes().await {
        Ok(body) => Ok(Some(Part { headers, body })),
        Err(error) => end_of_body(error),
    }
}

/// A body that stops short of its closing delimiter just ends the stream,
/// dropping any partial part.
fn end_of_body(error: multer::Error) -> Result<Option<Part>, Error> {
    match error {
        multer::Error::IncompleteStream | multer::Error::IncompleteFieldData { .. } => {
            trace!("multipart body ended without a closing delimiter");
            Ok(None)
        }
        multer::Error::StreamReadFailed(source) => match source.downcast::<Error>() {
            Ok(error) => Err(*error),
            Err(source) => Err(Error::Http(source.to_string())),
        },
        error => Err(Error::Decode(format!("malformed multipart body: {error}"))),
    }
}

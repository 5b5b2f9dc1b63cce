use std::pin::Pin;
use std::task::Poll;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use futures::stream::StreamExt;
use futures::stream::select;
use mediatype::MediaType;
use mediatype::ReadParams;
use mediatype::names::BOUNDARY;
use mediatype::names::MIXED;
use mediatype::names::MULTIPART;
use serde::Deserialize;
use serde::Serialize;
use tokio_stream::once;
use tokio_stream::wrappers::IntervalStream;

use crate::graphql;

/// `content-type` of a subscription response.
pub(crate) const MULTIPART_SUBSCRIPTION_CONTENT_TYPE: &str =
    "multipart/mixed;boundary=\"graphql\";subscriptionSpec=\"1.0\"";
/// `accept` value asking an upstream for a subscription response.
pub(crate) const MULTIPART_SUBSCRIPTION_ACCEPT: &str =
    "multipart/mixed;subscriptionSpec=\"1.0\", application/json";

const FIRST_PART_HEADER: &[u8] = b"\r\n--graphql\r\ncontent-type: application/json\r\n\r\n";
const PART_HEADER: &[u8] = b"\r\ncontent-type: application/json\r\n\r\n";

#[derive(thiserror::Error, Debug)]
pub(crate) enum Error {
    #[error("serialization error")]
    SerdeError(#[from] serde_json::Error),
    #[error("invalid multipart body: {0}")]
    Multipart(#[from] multer::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SubscriptionPayload {
    #[serde(default)]
    payload: Option<graphql::Response>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    errors: Vec<graphql::Error>,
}

enum MessageKind {
    Heartbeat,
    Message(graphql::Response),
    Error(graphql::Error),
    Eof,
}

/// Encodes a subscription's results as a `multipart/mixed` body.
///
/// An error ends the body with a part carrying it.
pub(crate) struct Multipart {
    stream: Pin<Box<dyn Stream<Item = MessageKind> + Send>>,
    is_first_chunk: bool,
    is_terminated: bool,
}

impl Multipart {
    pub(crate) fn new<S>(stream: S, heartbeat_interval: Duration) -> Self
    where
        S: Stream<Item = Result<graphql::Response, graphql::Error>> + Send + 'static,
    {
        let start = tokio::time::Instant::now() + heartbeat_interval;
        let stream = select(
            stream
                .map(|result| match result {
                    Ok(response) => MessageKind::Message(response),
                    Err(error) => MessageKind::Error(error),
                })
                .chain(once(MessageKind::Eof)),
            IntervalStream::new(tokio::time::interval_at(start, heartbeat_interval))
                .map(|_| MessageKind::Heartbeat),
        )
        .boxed();

        Self {
            stream,
            is_first_chunk: true,
            is_terminated: false,
        }
    }

    fn part_header(&mut self) -> Vec<u8> {
        if self.is_first_chunk {
            self.is_first_chunk = false;
            Vec::from(FIRST_PART_HEADER)
        } else {
            Vec::from(PART_HEADER)
        }
    }
}

impl Stream for Multipart {
    type Item = Result<Bytes, Error>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        if self.is_terminated {
            return Poll::Ready(None);
        }
        match self.stream.as_mut().poll_next(cx) {
            Poll::Ready(message) => match message {
                Some(MessageKind::Heartbeat) => {
                    let mut buf = self.part_header();
                    buf.extend_from_slice(b"{}\r\n--graphql");
                    Poll::Ready(Some(Ok(buf.into())))
                }
                Some(MessageKind::Message(response)) => {
                    let mut buf = self.part_header();
                    let part = SubscriptionPayload {
                        payload: Some(response),
                        errors: Vec::new(),
                    };
                    serde_json::to_writer(&mut buf, &part)?;
                    buf.extend_from_slice(b"\r\n--graphql");
                    Poll::Ready(Some(Ok(buf.into())))
                }
                Some(MessageKind::Error(error)) => {
                    let mut buf = self.part_header();
                    let part = SubscriptionPayload {
                        payload: None,
                        errors: vec![error],
                    };
                    serde_json::to_writer(&mut buf, &part)?;
                    buf.extend_from_slice(b"\r\n--graphql--\r\n");
                    self.is_terminated = true;
                    Poll::Ready(Some(Ok(buf.into())))
                }
                Some(MessageKind::Eof) => {
                    self.is_terminated = true;
                    let buf = if self.is_first_chunk {
                        Bytes::from_static(b"\r\n--graphql--\r\n")
                    } else {
                        Bytes::from_static(b"--\r\n")
                    };
                    Poll::Ready(Some(Ok(buf)))
                }
                None => {
                    self.is_terminated = true;
                    Poll::Ready(None)
                }
            },
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A part read back from a subscription body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Part {
    Payload(graphql::Response),
    Errors(Vec<graphql::Error>),
}

/// The boundary of a `multipart/mixed` content type.
///
/// `None` for any other content type. Defaults to `graphql` when the
/// parameter is missing.
pub(crate) fn boundary(content_type: &str) -> Option<String> {
    let media_type = MediaType::parse(content_type).ok()?;
    if media_type.ty != MULTIPART || media_type.subty != MIXED {
        return None;
    }
    Some(
        media_type
            .get_param(BOUNDARY)
            .map(|boundary| boundary.unquoted_str().into_owned())
            .unwrap_or_else(|| String::from("graphql")),
    )
}

/// Read back the parts of a subscription body delimited by `boundary`.
///
/// Heartbeats are skipped. The stream ends at the closing delimiter or after
/// the first error.
pub(crate) fn decode<S, O, E>(
    body: S,
    boundary: impl Into<String>,
) -> impl Stream<Item = Result<Part, Error>> + Send + 'static
where
    S: Stream<Item = Result<O, E>> + Send + 'static,
    O: Into<Bytes> + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let multipart = multer::Multipart::new(body, boundary);
    futures::stream::unfold(Some(multipart), |state| async move {
        let mut multipart = state?;
        loop {
            let part = match multipart.next_field().await {
                Ok(Some(field)) => field.bytes().await.map_err(Error::from),
                Ok(None) => return None,
                Err(error) => Err(error.into()),
            }
            .and_then(|bytes| parse_part(&bytes));
            match part {
                Ok(Some(part)) => return Some((Ok(part), Some(multipart))),
                Ok(None) => continue,
                Err(error) => return Some((Err(error), None)),
            }
        }
    })
}

fn parse_part(body: &[u8]) -> Result<Option<Part>, Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let part: SubscriptionPayload = serde_json::from_slice(body)?;
    Ok(match (part.payload, part.errors.is_empty()) {
        (_, false) => Some(Part::Errors(part.errors)),
        (Some(payload), true) => Some(Part::Payload(payload)),
        (None, true) => None,
    })
}

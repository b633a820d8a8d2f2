//! Hyper-backed [`Transport`].
//!
//! hyper wants a complete `http::Response` from the service future, while
//! middleware may commit the head early and stream afterwards. The
//! transport therefore hands the response over a oneshot channel as soon as
//! the head is known. A body that is already complete goes out as `Full`;
//! everything else is fed through an mpsc channel that backs a
//! `StreamBody`.

use bytes::Bytes;
use futures_util::{stream, StreamExt};
use http::Response;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::ext::ReasonPhrase;
use std::io;
use strata_core::{
    BodyStream, FinishHook, FinishSlot, HeadersSent, ResponseHead, Transport, TransportError,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

/// Body type of every response the server writes.
pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

/// Type alias for the HTTP response.
pub type HttpResponse = Response<ResponseBody>;

type FrameSender = mpsc::Sender<Result<Frame<Bytes>, io::Error>>;

const BODY_CHANNEL_CAPACITY: usize = 16;

enum Phase {
    /// Nothing committed yet.
    Pending(oneshot::Sender<HttpResponse>),
    /// Head sent, body flowing through the channel.
    Streaming(FrameSender),
    /// Response ended or handed to a background pipe.
    Done,
}

/// Writes one response to a hyper connection.
pub struct HyperTransport {
    phase: Phase,
    sent: HeadersSent,
    finish: FinishSlot,
}

impl HyperTransport {
    /// Creates a transport and the receiver the service future awaits.
    #[must_use]
    pub fn new() -> (Self, oneshot::Receiver<HttpResponse>) {
        let (tx, rx) = oneshot::channel();
        let transport = Self {
            phase: Phase::Pending(tx),
            sent: HeadersSent::new(),
            finish: FinishSlot::new(),
        };
        (transport, rx)
    }

    fn build(head: ResponseHead, body: ResponseBody) -> HttpResponse {
        let ResponseHead {
            status,
            reason,
            headers,
        } = head;
        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        if let Some(phrase) = reason.and_then(|reason| ReasonPhrase::try_from(reason).ok()) {
            response.extensions_mut().insert(phrase);
        }
        response
    }

    pub(crate) fn full(chunk: Option<Bytes>) -> ResponseBody {
        Full::new(chunk.unwrap_or_default())
            .map_err(|never| match never {})
            .boxed_unsync()
    }

    fn channel_body() -> (FrameSender, ResponseBody) {
        let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        let frames = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        });
        (tx, StreamBody::new(frames).boxed_unsync())
    }

    fn deliver(
        &self,
        sender: oneshot::Sender<HttpResponse>,
        response: HttpResponse,
    ) -> Result<(), TransportError> {
        self.sent.mark();
        sender.send(response).map_err(|_| {
            debug!("client went away before the response head was delivered");
            self.finish.fire(Err(TransportError::ConnectionClosed));
            TransportError::ConnectionClosed
        })
    }

    /// Moves to streaming, sending the head if it is still pending.
    fn open_stream(&mut self, head: ResponseHead) -> Result<FrameSender, TransportError> {
        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Pending(sender) => {
                let (frames, body) = Self::channel_body();
                self.deliver(sender, Self::build(head, body))?;
                Ok(frames)
            }
            Phase::Streaming(frames) => Ok(frames),
            Phase::Done => Err(TransportError::AlreadyFinished),
        }
    }
}

impl Transport for HyperTransport {
    fn headers_sent(&self) -> HeadersSent {
        self.sent.clone()
    }

    fn is_writable(&self) -> bool {
        match &self.phase {
            Phase::Pending(sender) => !sender.is_closed(),
            Phase::Streaming(frames) => !frames.is_closed(),
            Phase::Done => false,
        }
    }

    fn send_head(&mut self, head: ResponseHead) -> Result<(), TransportError> {
        let frames = self.open_stream(head)?;
        self.phase = Phase::Streaming(frames);
        Ok(())
    }

    fn end(&mut self, head: ResponseHead, chunk: Option<Bytes>) -> Result<(), TransportError> {
        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Pending(sender) => {
                self.deliver(sender, Self::build(head, Self::full(chunk)))?;
                self.finish.fire(Ok(()));
                Ok(())
            }
            Phase::Streaming(frames) => {
                let finish = self.finish.clone();
                match chunk {
                    None => {
                        drop(frames);
                        finish.fire(Ok(()));
                    }
                    Some(chunk) => {
                        tokio::spawn(async move {
                            let result = frames
                                .send(Ok(Frame::data(chunk)))
                                .await
                                .map_err(|_| TransportError::ConnectionClosed);
                            finish.fire(result);
                        });
                    }
                }
                Ok(())
            }
            Phase::Done => Err(TransportError::AlreadyFinished),
        }
    }

    fn pipe(&mut self, head: ResponseHead, mut body: BodyStream) -> Result<(), TransportError> {
        let frames = self.open_stream(head)?;
        let finish = self.finish.clone();
        tokio::spawn(async move {
            while let Some(item) = body.next().await {
                match item {
                    Ok(chunk) => {
                        if frames.send(Ok(Frame::data(chunk))).await.is_err() {
                            finish.fire(Err(TransportError::ConnectionClosed));
                            return;
                        }
                    }
                    Err(err) => {
                        // Surfacing the error to hyper aborts the connection
                        // instead of ending a truncated body cleanly.
                        let _ = frames
                            .send(Err(io::Error::new(err.kind(), err.to_string())))
                            .await;
                        finish.fire(Err(TransportError::Stream(err)));
                        return;
                    }
                }
            }
            trace!("piped body drained");
            finish.fire(Ok(()));
        });
        Ok(())
    }

    fn on_finish(&mut self, hook: FinishHook) {
        self.finish.register(hook);
    }
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self.phase {
            Phase::Pending(_) => "pending",
            Phase::Streaming(_) => "streaming",
            Phase::Done => "done",
        };
        f.debug_struct("HyperTransport")
            .field("phase", &phase)
            .field("headers_sent", &self.sent.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_end_delivers_full_response() {
        let (mut transport, rx) = HyperTransport::new();
        let mut head = ResponseHead::new(StatusCode::OK);
        head.reason = Some("Fine".to_string());
        transport.end(head, Some(Bytes::from_static(b"hello"))).unwrap();

        let response = rx.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.extensions().get::<ReasonPhrase>().map(ReasonPhrase::as_bytes),
            Some(&b"Fine"[..])
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"hello"));
        assert!(transport.headers_sent().get());
        assert!(!transport.is_writable());
    }

    #[tokio::test]
    async fn test_flush_then_end_streams_body() {
        let (mut transport, rx) = HyperTransport::new();
        transport.send_head(ResponseHead::new(StatusCode::ACCEPTED)).unwrap();
        assert!(transport.headers_sent().get());

        let response = rx.await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        transport
            .end(ResponseHead::new(StatusCode::OK), Some(Bytes::from_static(b"late")))
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"late"));
    }

    #[tokio::test]
    async fn test_pipe_forwards_chunks_and_fires_finish() {
        let (mut transport, rx) = HyperTransport::new();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        transport.on_finish(Box::new(move |result| {
            flag.store(result.is_ok(), Ordering::SeqCst);
        }));

        let chunks = vec![Ok(Bytes::from_static(b"a")), Ok(Bytes::from_static(b"b"))];
        transport
            .pipe(ResponseHead::new(StatusCode::OK), Box::pin(stream::iter(chunks)))
            .unwrap();

        let response = rx.await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"ab"));
        tokio::task::yield_now().await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_not_writable() {
        let (mut transport, rx) = HyperTransport::new();
        drop(rx);
        assert!(!transport.is_writable());
        let err = transport
            .end(ResponseHead::new(StatusCode::OK), None)
            .unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed));
    }

    #[test]
    fn test_end_twice_fails() {
        let (mut transport, _rx) = HyperTransport::new();
        transport.end(ResponseHead::new(StatusCode::OK), None).unwrap();
        let err = transport
            .end(ResponseHead::new(StatusCode::OK), None)
            .unwrap_err();
        assert!(matches!(err, TransportError::AlreadyFinished));
    }
}

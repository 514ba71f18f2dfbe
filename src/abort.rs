//! Cancellation for in-flight fetches.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

use futures_lite::{future, FutureExt, Stream};

use crate::{logging::trace, Error};

/// Aborts the fetches that were given its [`AbortSignal`].
///
/// Dropping the controller without calling [`AbortController::abort`] does
/// not abort anything.
#[derive(Debug, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    /// Creates a controller with a fresh signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// The signal to pass in [`crate::FetcherOpts`].
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Aborts every fetch using this controller's signal.
    ///
    /// A request still in flight fails with [`Error::Aborted`], a stream that
    /// was already returned yields one `Error::Aborted` and then ends.
    pub fn abort(&self) {
        if !self.signal.inner.aborted.swap(true, Ordering::AcqRel) {
            trace!("abort requested");
            self.signal.inner.sender.close();
        }
    }
}

/// The receiving end of an [`AbortController`].
#[derive(Clone, Debug)]
pub struct AbortSignal {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    aborted: AtomicBool,
    // Nothing is ever sent: closing the channel wakes every waiter.
    sender: async_channel::Sender<()>,
    receiver: async_channel::Receiver<()>,
}

impl Default for AbortSignal {
    fn default() -> Self {
        let (sender, receiver) = async_channel::bounded(1);
        AbortSignal {
            inner: Arc::new(Inner {
                aborted: AtomicBool::new(false),
                sender,
                receiver,
            }),
        }
    }
}

impl AbortSignal {
    /// True once the controller has aborted.
    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::Acquire)
    }

    /// Resolves once the controller has aborted.
    pub async fn aborted(&self) {
        if self.is_aborted() {
            return;
        }
        self.inner.receiver.recv().await.ok();
    }
}

/// Runs `fut` unless `signal` aborts first.
pub(crate) async fn or_abort<T>(
    fut: impl Future<Output = Result<T, Error>>,
    signal: Option<&AbortSignal>,
) -> Result<T, Error> {
    let Some(signal) = signal else {
        return fut.await;
    };

    if signal.is_aborted() {
        return Err(Error::Aborted);
    }

    fut.or(async {
        signal.aborted().await;
        Err(Error::Aborted)
    })
    .await
}

/// A result stream that ends with `Error::Aborted` when its signal fires.
#[pin_project::pin_project]
pub(crate) struct Abortable<S> {
    #[pin]
    stream: S,
    aborted: Option<future::Boxed<()>>,
    done: bool,
}

impl<S> Abortable<S> {
    pub(crate) fn new(stream: S, signal: &AbortSignal) -> Self {
        let signal = signal.clone();
        Abortable {
            stream,
            aborted: Some(Box::pin(async move { signal.aborted().await })),
            done: false,
        }
    }
}

impl<S, T> Stream for Abortable<S>
where
    S: Stream<Item = Result<T, Error>>,
{
    type Item = Result<T, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        if *this.done {
            return Poll::Ready(None);
        }

        if let Some(aborted) = this.aborted.as_mut() {
            if Future::poll(aborted.as_mut(), cx).is_ready() {
                *this.aborted = None;
                *this.done = true;
                return Poll::Ready(Some(Err(Error::Aborted)));
            }
        }

        let next = this.stream.poll_next(cx);
        if let Poll::Ready(None) = next {
            *this.done = true;
        }
        next
    }
}

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures_lite::{stream, Stream};

use crate::{graphql::GraphqlOperation, Error};

/// A `futures::Stream` for a subscription.
///
/// Emits an item for each message received by the subscription.  Dropping it
/// stops the subscription on the server.
#[pin_project::pin_project(PinnedDrop)]
pub struct Subscription<Operation>
where
    Operation: GraphqlOperation,
{
    pub(super) id: usize,
    pub(super) stream: Option<stream::Boxed<Result<Operation::Response, Error>>>,
    pub(super) drop_sender: Option<async_channel::Sender<usize>>,
}

#[pin_project::pinned_drop]
impl<Operation> PinnedDrop for Subscription<Operation>
where
    Operation: GraphqlOperation,
{
    fn drop(self: Pin<&mut Self>) {
        let this = self.project();
        let Some(drop_sender) = this.drop_sender.take() else {
            return;
        };
        // The drop channel is unbounded so this only fails once the actor is gone,
        // at which point there's nothing left to stop.
        drop_sender.try_send(*this.id).ok();
    }
}

impl<Operation> Subscription<Operation>
where
    Operation: GraphqlOperation,
{
    /// Returns the identifier for this subscription.
    ///
    /// This can be used with [`crate::Client::stop`] to stop
    /// a running subscription without needing access to the `Subscription`
    /// itself.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Stops this subscription
    pub fn stop(self) {
        // Drop does the work
    }
}

impl<Operation> Stream for Subscription<Operation>
where
    Operation: GraphqlOperation,
{
    type Item = Result<Operation::Response, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.project().stream.as_mut() {
            None => Poll::Ready(None),
            Some(stream) => stream.as_mut().poll_next(cx),
        }
    }
}

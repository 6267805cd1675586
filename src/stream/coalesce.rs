//! Trailing-debounce stream combinator

use futures::Stream;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep, sleep};

use crate::config::ConfigPatch;

/// Items that can absorb a newer item of the same kind.
pub trait Coalesce {
    fn absorb(&mut self, newer: Self);
}

impl Coalesce for ConfigPatch {
    fn absorb(&mut self, newer: Self) {
        self.merge(newer);
    }
}

/// Extension trait to add trailing debounce to any stream of [`Coalesce`] items.
pub trait CoalesceExt: Stream {
    /// Merge items until the stream has been quiet for `quiet`, then emit the
    /// merged item. Pending items are flushed immediately when the source ends.
    fn coalesce(self, quiet: Duration) -> Coalesced<Self>
    where
        Self: Sized,
        Self::Item: Coalesce,
    {
        Coalesced::new(self, quiet)
    }
}

impl<T: Stream> CoalesceExt for T {}

pin_project! {
    /// Stream returned by [`CoalesceExt::coalesce`].
    pub struct Coalesced<S: Stream> {
        #[pin]
        stream: S,
        #[pin]
        deadline: Sleep,
        quiet: Duration,
        pending: Option<S::Item>,
        done: bool,
    }
}

impl<S: Stream> Coalesced<S>
where
    S::Item: Coalesce,
{
    pub fn new(stream: S, quiet: Duration) -> Self {
        Self { stream, deadline: sleep(quiet), quiet, pending: None, done: false }
    }
}

impl<S: Stream> Stream for Coalesced<S>
where
    S::Item: Coalesce,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        // Drain everything ready now; each arrival restarts the quiet period
        while !*this.done {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    match this.pending.as_mut() {
                        Some(pending) => pending.absorb(item),
                        None => *this.pending = Some(item),
                    }
                    this.deadline.as_mut().reset(Instant::now() + *this.quiet);
                }
                Poll::Ready(None) => *this.done = true,
                Poll::Pending => break,
            }
        }

        if this.pending.is_none() {
            return if *this.done { Poll::Ready(None) } else { Poll::Pending };
        }
        if *this.done {
            return Poll::Ready(this.pending.take());
        }

        match this.deadline.poll(cx) {
            Poll::Ready(()) => Poll::Ready(this.pending.take()),
            Poll::Pending => Poll::Pending,
        }
    }
}

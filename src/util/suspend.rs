use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Future that waits for `future` unless an abort request arrives first.
///
/// Resolves to `Some(output)` when `future` completes, or `None` when the dial is aborted.
/// If all abort handles are dropped, the abort channel is cleared and only `future` is awaited.
pub struct Suspend<'a, F> {
	future: F,
	abort: &'a mut Option<oneshot::Receiver<()>>,
}

impl<'a, F> Suspend<'a, F>
where
	F: Future + Unpin,
{
	pub fn new(future: F, abort: &'a mut Option<oneshot::Receiver<()>>) -> Self {
		Self { future, abort }
	}
}

impl<F> Future for Suspend<'_, F>
where
	F: Future + Unpin,
{
	type Output = Option<F::Output>;

	fn poll(self: Pin<&mut Self>, context: &mut Context) -> Poll<Self::Output> {
		let this = self.get_mut();

		if let Poll::Ready(output) = Pin::new(&mut this.future).poll(context) {
			return Poll::Ready(Some(output));
		}

		if let Some(abort) = this.abort.as_mut() {
			match Pin::new(abort).poll(context) {
				Poll::Ready(Ok(())) => return Poll::Ready(None),
				Poll::Ready(Err(_)) => *this.abort = None,
				Poll::Pending => (),
			}
		}

		Poll::Pending
	}
}

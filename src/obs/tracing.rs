// self
use crate::{_prelude::*, obs::GateOp};

/// `token_gate.op` span tagged with the operation and the call site.
pub(crate) struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	pub(crate) fn new(op: GateOp, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self { span: tracing::info_span!("token_gate.op", op = op.label(), stage) }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (op, stage);

			Self {}
		}
	}

	/// Keeps the span entered until the guard drops.
	pub(crate) fn enter(self) -> OpSpanGuard {
		#[cfg(feature = "tracing")]
		{
			OpSpanGuard { _entered: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			OpSpanGuard {}
		}
	}

	/// Runs `fut` inside the span; used for spawned tasks, where a guard cannot cross `.await`.
	pub(crate) fn wrap<F>(self, fut: F) -> impl Future<Output = F::Output>
	where
		F: Future,
	{
		#[cfg(feature = "tracing")]
		{
			tracing::Instrument::instrument(fut, self.span)
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			fut
		}
	}
}

pub(crate) struct OpSpanGuard {
	#[cfg(feature = "tracing")]
	_entered: tracing::span::EnteredSpan,
}

/// Debug event emitted after each sweep.
pub(crate) fn trace_sweep(evicted: usize, remaining: usize) {
	#[cfg(feature = "tracing")]
	tracing::debug!(evicted, remaining, "rate gate sweep finished");
	#[cfg(not(feature = "tracing"))]
	let _ = (evicted, remaining);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn spans_can_be_entered_and_dropped() {
		let _guard = OpSpan::new(GateOp::Authorize, "test").enter();

		trace_sweep(0, 0);
	}

	#[tokio::test]
	async fn wrapped_futures_keep_their_output() {
		assert_eq!(OpSpan::new(GateOp::Sweep, "test").wrap(async { 42 }).await, 42);
	}
}

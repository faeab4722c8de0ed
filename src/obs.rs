//! Feature-gated instrumentation shared by every gate operation.
//!
//! Without the `tracing` and `metrics` features every helper here compiles to nothing.

mod metrics;
mod tracing;

pub(crate) use metrics::*;
pub(crate) use tracing::*;

/// Operation label attached to spans and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum GateOp {
	Issue,
	Verify,
	Login,
	Admit,
	Authorize,
	Sweep,
}
impl GateOp {
	pub(crate) const fn label(self) -> &'static str {
		match self {
			Self::Issue => "issue",
			Self::Verify => "verify",
			Self::Login => "login",
			Self::Admit => "admit",
			Self::Authorize => "authorize",
			Self::Sweep => "sweep",
		}
	}
}

/// How an operation ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OpOutcome {
	Success,
	Failure,
	/// Completed, but the caller is held back by the rate gate.
	Rejected,
}
impl OpOutcome {
	pub(crate) const fn label(self) -> &'static str {
		match self {
			Self::Success => "success",
			Self::Failure => "failure",
			Self::Rejected => "rejected",
		}
	}

	pub(crate) fn of<T, E>(result: &Result<T, E>) -> Self {
		if result.is_ok() { Self::Success } else { Self::Failure }
	}
}

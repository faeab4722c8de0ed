// self
use crate::obs::{GateOp, OpOutcome};

/// Bumps `token_gate_op_total{op, outcome}`.
pub(crate) fn record_op(op: GateOp, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!("token_gate_op_total", "op" => op.label(), "outcome" => outcome.label())
		.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (op.label(), outcome.label());
}

/// Adds a sweep's evictions to `token_gate_sweep_evicted_total`.
pub(crate) fn record_sweep_evictions(evicted: usize) {
	#[cfg(feature = "metrics")]
	metrics::counter!("token_gate_sweep_evicted_total").increment(evicted as u64);
	#[cfg(not(feature = "metrics"))]
	let _ = evicted;
}

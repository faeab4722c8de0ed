//! Background task that periodically evicts stale rate records.

// crates.io
use tokio::{
	runtime::Handle,
	sync::watch,
	task::JoinHandle,
	time::{self, Instant, MissedTickBehavior},
};
// self
use crate::{
	_prelude::*,
	gate::GateInner,
	obs::{GateOp, OpSpan},
};

/// Handle to a running sweep task.
#[derive(Debug)]
pub(crate) struct Sweeper {
	stop: watch::Sender<bool>,
	task: JoinHandle<()>,
}
impl Sweeper {
	/// Spawns the sweep loop on `handle`, ticking every `interval`.
	///
	/// The task only holds a weak reference to the gate and exits on its own once every gate
	/// handle is gone.
	pub(crate) fn spawn(handle: &Handle, gate: Weak<GateInner>, interval: Duration) -> Self {
		let (stop, stopped) = watch::channel(false);
		let span = OpSpan::new(GateOp::Sweep, "sweep_loop");
		let task = handle.spawn(span.wrap(run(gate, interval.unsigned_abs(), stopped)));

		Self { stop, task }
	}

	/// Signals the loop to stop and waits for it to finish.
	pub(crate) async fn stop(self) {
		let _ = self.stop.send(true);
		// A panicked or already-finished task has nothing left to clean up.
		let _ = self.task.await;
	}
}

async fn run(
	gate: Weak<GateInner>,
	period: std::time::Duration,
	mut stopped: watch::Receiver<bool>,
) {
	let mut ticker = time::interval_at(Instant::now() + period, period);

	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		tokio::select! {
			_ = ticker.tick() => {
				let Some(gate) = gate.upgrade() else {
					break;
				};

				gate.sweep_at(OffsetDateTime::now_utc());
			},
			_ = stopped.changed() => break,
		}
	}
}

/// Execution classes used to label spawned work in traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Long-lived consumer loop that owns trigger ordering.
	Pipeline,
	/// One dispatched fetch/update cycle, superseded by the next.
	Cycle,
	/// Caller-supplied future isolated in its own task.
	Operation,
	/// Periodic re-trigger scheduling.
	Polling,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Pipeline => "pipeline",
			Self::Cycle => "cycle",
			Self::Operation => "operation",
			Self::Polling => "polling",
		}
	}
}

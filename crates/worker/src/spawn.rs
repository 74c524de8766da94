use std::any::Any;
use std::future::Future;
use std::sync::OnceLock;

use tokio::task::{JoinError, JoinHandle};

use crate::TaskClass;

fn runtime_handle() -> tokio::runtime::Handle {
	if let Ok(handle) = tokio::runtime::Handle::try_current() {
		return handle;
	}

	static GLOBAL_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
	let runtime = GLOBAL_RT.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.enable_all()
			.worker_threads(2)
			.thread_name("sift-worker-global")
			.build()
			.expect("failed to build sift-worker global tokio runtime")
	});
	runtime.handle().clone()
}

/// Spawns an async task on the current runtime, or on the shared fallback
/// runtime when called outside of one.
pub fn spawn<F>(class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn");
	runtime_handle().spawn(fut)
}

/// Extracts the panic payload text from a failed join.
///
/// Returns `None` when the task was cancelled rather than panicked.
pub fn panic_message(err: JoinError) -> Option<String> {
	if !err.is_panic() {
		return None;
	}
	let payload: Box<dyn Any + Send> = err.into_panic();
	Some(payload_message(payload.as_ref()))
}

/// Text of a panic payload, as caught by `catch_unwind` or a failed join.
pub fn payload_message(payload: &(dyn Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&'static str>() {
		(*s).to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"non-string panic payload".to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn extracts_static_str_payload() {
		let handle = spawn(TaskClass::Operation, async { panic!("boom-str") });
		let err = handle.await.unwrap_err();
		let msg = panic_message(err).expect("should be a panic");
		assert!(msg.contains("boom-str"), "expected 'boom-str', got: {msg}");
	}

	#[tokio::test]
	async fn extracts_string_payload() {
		let handle = spawn(TaskClass::Operation, async { panic!("{}", String::from("boom-string")) });
		let err = handle.await.unwrap_err();
		let msg = panic_message(err).expect("should be a panic");
		assert!(msg.contains("boom-string"), "expected 'boom-string', got: {msg}");
	}

	#[tokio::test]
	async fn returns_none_for_cancellation() {
		let handle = spawn(TaskClass::Cycle, async {
			tokio::time::sleep(std::time::Duration::from_secs(60)).await;
		});
		handle.abort();
		let err = handle.await.unwrap_err();
		assert!(panic_message(err).is_none(), "cancelled task should return None");
	}

	#[test]
	fn payload_message_from_catch_unwind() {
		let payload = std::panic::catch_unwind(|| panic!("caught {}", 7)).unwrap_err();
		assert_eq!(payload_message(payload.as_ref()), "caught 7");
		let payload = std::panic::catch_unwind(|| std::panic::panic_any(3u8)).unwrap_err();
		assert_eq!(payload_message(payload.as_ref()), "non-string panic payload");
	}

	#[test]
	fn spawn_outside_runtime_uses_fallback() {
		let handle = spawn(TaskClass::Polling, async { 7u32 });
		let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
		assert_eq!(rt.block_on(handle).unwrap(), 7);
	}
}

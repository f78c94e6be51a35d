use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::manager::Manager;

/// Owned by the outer program: managers register here and are shut down
/// together when the program is interrupted or quits.
#[derive(Default)]
pub struct ShutdownCoordinator {
	managers: Mutex<Vec<Arc<Manager>>>,
}

impl ShutdownCoordinator {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub async fn register(&self, manager: Arc<Manager>) {
		self.managers.lock().await.push(manager);
	}

	/// Shuts down every registered manager once. Safe to call again, and
	/// from a signal task racing a regular quit.
	pub async fn shutdown(&self) -> Result<()> {
		let managers = std::mem::take(&mut *self.managers.lock().await);
		let mut errors = Vec::new();
		for manager in managers {
			if let Err(e) = manager.shutdown().await {
				errors.push(e);
			}
		}
		Error::aggregate(errors)
	}

	/// Resolves on SIGINT or SIGTERM.
	pub async fn wait_for_signal() -> std::io::Result<()> {
		use tokio::signal::unix::{signal, SignalKind};

		let mut terminate = signal(SignalKind::terminate())?;
		tokio::select! {
			res = tokio::signal::ctrl_c() => res,
			_ = terminate.recv() => Ok(()),
		}
	}
}

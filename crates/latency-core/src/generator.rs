//! Handshake with the external load generator.
//!
//! The generator is launched as a child process and writes the request batch to a
//! file. The batch is considered ready once the file is non-empty and its size
//! holds steady across one settle interval, or once the generator has exited
//! successfully and left the file behind. Files last modified before the generator
//! started are ignored, so a previous run's batch is never picked up.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::process::{Child, Command};

/// Slack allowed between the spawn time and a file's modification time, which
/// some filesystems record with a coarse clock.
const MTIME_TOLERANCE: Duration = Duration::from_secs(1);

/// Errors that can occur while driving the load generator.
#[derive(Debug, Error)]
pub enum GeneratorError {
	#[error("Failed to start generator '{command}': {source}")]
	Spawn {
		command: String,
		#[source]
		source: std::io::Error,
	},
	#[error("Generator exited unsuccessfully: {0}")]
	Exited(ExitStatus),
	#[error("Batch not ready after {0:?}")]
	Timeout(Duration),
	#[error("Generator exited without writing {}", .0.display())]
	MissingOutput(PathBuf),
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

/// A running load generator process.
///
/// The process is killed if the handle is dropped before it exits.
pub struct LoadGenerator {
	command: String,
	child: Child,
	spawned_at: SystemTime,
	status: Option<ExitStatus>,
}

impl LoadGenerator {
	/// Starts the generator.
	pub fn spawn(command: &str, args: &[String]) -> Result<Self, GeneratorError> {
		let spawned_at = SystemTime::now();
		let child = Command::new(command)
			.args(args)
			.stdin(Stdio::null())
			.kill_on_drop(true)
			.spawn()
			.map_err(|source| GeneratorError::Spawn {
				command: command.to_string(),
				source,
			})?;

		tracing::info!(command = %command, pid = ?child.id(), "Started load generator");
		Ok(Self {
			command: command.to_string(),
			child,
			spawned_at,
			status: None,
		})
	}

	/// Waits until the generator has staged its batch in `ready_file`.
	pub async fn wait_until_ready(
		&mut self,
		ready_file: &Path,
		timeout: Duration,
		settle: Duration,
	) -> Result<(), GeneratorError> {
		tokio::time::timeout(timeout, self.poll_ready(ready_file, settle))
			.await
			.map_err(|_| GeneratorError::Timeout(timeout))?
	}

	async fn poll_ready(&mut self, ready_file: &Path, settle: Duration) -> Result<(), GeneratorError> {
		let mut previous: Option<u64> = None;

		loop {
			let exited = self.try_status()?;
			if let Some(status) = exited {
				if !status.success() {
					return Err(GeneratorError::Exited(status));
				}
			}

			let size = self.fresh_size(ready_file).await?;
			match (exited, size) {
				(Some(_), Some(_)) => break,
				(Some(_), None) => return Err(GeneratorError::MissingOutput(ready_file.to_path_buf())),
				(None, Some(size)) if size > 0 && previous == Some(size) => break,
				_ => {},
			}

			previous = size;
			tokio::time::sleep(settle).await;
		}

		tracing::info!(
			command = %self.command,
			file = %ready_file.display(),
			"Batch ready"
		);
		Ok(())
	}

	/// Waits for the generator to exit and returns its status.
	pub async fn wait(&mut self) -> Result<ExitStatus, GeneratorError> {
		if let Some(status) = self.status {
			return Ok(status);
		}
		let status = self.child.wait().await?;
		self.status = Some(status);
		Ok(status)
	}

	fn try_status(&mut self) -> Result<Option<ExitStatus>, GeneratorError> {
		if self.status.is_none() {
			self.status = self.child.try_wait()?;
		}
		Ok(self.status)
	}

	/// Size of `path` if it exists and was written after the generator started.
	async fn fresh_size(&self, path: &Path) -> Result<Option<u64>, GeneratorError> {
		let metadata = match tokio::fs::metadata(path).await {
			Ok(metadata) => metadata,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(e.into()),
		};
		let stale = metadata
			.modified()
			.map(|modified| modified + MTIME_TOLERANCE < self.spawned_at)
			.unwrap_or(false);
		if stale {
			tracing::trace!(file = %path.display(), "Ignoring file older than generator");
			return Ok(None);
		}
		Ok(Some(metadata.len()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	const SETTLE: Duration = Duration::from_millis(50);
	const TIMEOUT: Duration = Duration::from_secs(10);

	fn shell(script: String) -> LoadGenerator {
		LoadGenerator::spawn("sh", &["-c".to_string(), script]).unwrap()
	}

	#[tokio::test]
	async fn test_ready_after_successful_exit() {
		let temp_dir = TempDir::new().unwrap();
		let file = temp_dir.path().join("batch.csv");

		let mut generator = shell(format!("printf 'user_id\\nalice\\n' > {}", file.display()));
		generator.wait_until_ready(&file, TIMEOUT, SETTLE).await.unwrap();
		assert!(generator.wait().await.unwrap().success());
	}

	#[tokio::test]
	async fn test_ready_when_size_settles() {
		let temp_dir = TempDir::new().unwrap();
		let file = temp_dir.path().join("batch.csv");

		let mut generator = shell(format!("echo header > {}; sleep 30", file.display()));
		generator.wait_until_ready(&file, TIMEOUT, SETTLE).await.unwrap();
		assert!(generator.try_status().unwrap().is_none());
	}

	#[tokio::test]
	async fn test_failed_generator() {
		let temp_dir = TempDir::new().unwrap();
		let file = temp_dir.path().join("batch.csv");

		let mut generator = shell("exit 3".to_string());
		let result = generator.wait_until_ready(&file, TIMEOUT, SETTLE).await;
		match result {
			Err(GeneratorError::Exited(status)) => assert_eq!(status.code(), Some(3)),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_exit_without_output() {
		let temp_dir = TempDir::new().unwrap();
		let file = temp_dir.path().join("batch.csv");

		let mut generator = shell("true".to_string());
		let result = generator.wait_until_ready(&file, TIMEOUT, SETTLE).await;
		assert!(matches!(result, Err(GeneratorError::MissingOutput(path)) if path == file));
	}

	#[tokio::test]
	async fn test_timeout() {
		let temp_dir = TempDir::new().unwrap();
		let file = temp_dir.path().join("batch.csv");

		let mut generator = shell("sleep 30".to_string());
		let result = generator
			.wait_until_ready(&file, Duration::from_millis(200), SETTLE)
			.await;
		assert!(matches!(result, Err(GeneratorError::Timeout(_))));
	}

	#[tokio::test]
	async fn test_stale_file_is_ignored() {
		let temp_dir = TempDir::new().unwrap();
		let file = temp_dir.path().join("batch.csv");
		std::fs::write(&file, "user_id\nold\n").unwrap();
		std::fs::File::options()
			.write(true)
			.open(&file)
			.unwrap()
			.set_modified(SystemTime::now() - Duration::from_secs(60))
			.unwrap();

		let mut generator = shell("sleep 30".to_string());
		let result = generator
			.wait_until_ready(&file, Duration::from_millis(300), SETTLE)
			.await;
		assert!(matches!(result, Err(GeneratorError::Timeout(_))));
	}

	#[tokio::test]
	async fn test_spawn_failure() {
		let result = LoadGenerator::spawn("/nonexistent/generator", &[]);
		assert!(matches!(result, Err(GeneratorError::Spawn { .. })));
	}
}

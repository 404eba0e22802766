//! Multi-file configuration loading.
//!
//! A configuration file may list other files under a top-level `include` key,
//! either as one path or as an array of paths. Every file contributes whole
//! top-level sections: a section may be defined by exactly one file, and no file
//! may be read twice.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

const INCLUDE_KEY: &str = "include";

type Table = toml::map::Map<String, toml::Value>;

/// Reads a configuration file together with the files it includes.
pub struct ConfigLoader {
	/// Directory that relative paths are resolved against
	base_dir: PathBuf,
	/// Canonical paths of every file read so far
	visited: HashSet<PathBuf>,
	/// File that defined each top-level section
	owners: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_dir: impl AsRef<Path>) -> Self {
		Self {
			base_dir: base_dir.as_ref().to_path_buf(),
			visited: HashSet::new(),
			owners: HashMap::new(),
		}
	}

	/// Loads `path` and its includes into a validated [`Config`].
	pub async fn load_config(&mut self, path: impl AsRef<Path>) -> Result<Config, ConfigError> {
		let root = self.locate(path.as_ref())?;
		let mut merged = self.read_fragment(&root).await?;
		let includes = take_includes(&mut merged)?;
		self.claim_sections(&merged, &root)?;

		for include in includes {
			let file = self.locate(&include)?;
			let mut fragment = self.read_fragment(&file).await?;
			if !take_includes(&mut fragment)?.is_empty() {
				return Err(ConfigError::Validation(format!(
					"{} includes further files; only the top-level file may use '{}'",
					file.display(),
					INCLUDE_KEY
				)));
			}
			self.claim_sections(&fragment, &file)?;
			merged.extend(fragment);
		}

		let config: Config = toml::Value::Table(merged).try_into()?;
		config.validate()?;
		Ok(config)
	}

	/// Reads one file, substitutes environment variables and parses it as a table.
	async fn read_fragment(&mut self, path: &Path) -> Result<Table, ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await?;
		if !self.visited.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include: {} was already loaded",
				canonical.display()
			)));
		}

		let text = tokio::fs::read_to_string(&canonical).await?;
		let text = resolve_env_vars(&text)?;
		Ok(toml::from_str(&text)?)
	}

	/// Records `file` as the owner of each section in `fragment`.
	fn claim_sections(&mut self, fragment: &Table, file: &Path) -> Result<(), ConfigError> {
		for section in fragment.keys() {
			if let Some(owner) = self.owners.get(section) {
				return Err(ConfigError::Validation(format!(
					"Section '{}' is defined in both {} and {}",
					section,
					owner.display(),
					file.display()
				)));
			}
			self.owners.insert(section.clone(), file.to_path_buf());
		}
		Ok(())
	}

	fn locate(&self, path: &Path) -> Result<PathBuf, ConfigError> {
		let located = self.base_dir.join(path);
		if located.is_file() {
			Ok(located)
		} else {
			Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", located.display()),
			)))
		}
	}
}

/// Removes the `include` key from `table` and returns the listed paths.
fn take_includes(table: &mut Table) -> Result<Vec<PathBuf>, ConfigError> {
	match table.remove(INCLUDE_KEY) {
		None => Ok(Vec::new()),
		Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
		Some(toml::Value::Array(paths)) => paths
			.into_iter()
			.map(|entry| match entry {
				toml::Value::String(path) => Ok(PathBuf::from(path)),
				other => Err(ConfigError::Validation(format!(
					"'{}' entries must be strings, found {}",
					INCLUDE_KEY,
					other.type_str()
				))),
			})
			.collect(),
		Some(other) => Err(ConfigError::Validation(format!(
			"'{}' must be a string or an array of strings, found {}",
			INCLUDE_KEY,
			other.type_str()
		))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	const NETWORK: &str = r#"
[network]
chain_id = 31337
rpc_url = "http://localhost:8545"
"#;

	const IO: &str = r#"
[delivery]
primary = "mock"
[delivery.implementations.mock]

[input]
primary = "csv"
[input.implementations.csv]
path = "data/tx_request.csv"

[output]
primary = "csv"
[output.implementations.csv]
path = "data/tx_analysis.csv"
"#;

	fn write(dir: &TempDir, name: &str, content: &str) {
		std::fs::write(dir.path().join(name), content).unwrap();
	}

	async fn load(dir: &TempDir, name: &str) -> Result<Config, ConfigError> {
		ConfigLoader::new(dir.path()).load_config(name).await
	}

	#[tokio::test]
	async fn test_single_file() {
		let dir = TempDir::new().unwrap();
		write(&dir, "bench.toml", &format!("[bench]\nid = \"single\"\n{}{}", NETWORK, IO));

		let config = load(&dir, "bench.toml").await.unwrap();
		assert_eq!(config.bench.id, "single");
		assert_eq!(config.network.chain_id, 31337);
	}

	#[tokio::test]
	async fn test_sections_from_included_files() {
		let dir = TempDir::new().unwrap();
		write(
			&dir,
			"main.toml",
			"include = [\"network.toml\", \"io.toml\"]\n[bench]\nid = \"modular\"\nworkers = 8\n",
		);
		write(&dir, "network.toml", NETWORK);
		write(&dir, "io.toml", IO);

		let config = Config::from_file(dir.path().join("main.toml")).await.unwrap();
		assert_eq!(config.bench.id, "modular");
		assert_eq!(config.bench.workers, 8);
		assert_eq!(config.delivery.primary, "mock");
	}

	#[tokio::test]
	async fn test_section_defined_twice() {
		let dir = TempDir::new().unwrap();
		write(
			&dir,
			"main.toml",
			&format!("include = \"other.toml\"\n[bench]\nid = \"main\"\n{}{}", NETWORK, IO),
		);
		write(&dir, "other.toml", "[bench]\nid = \"other\"\n");

		let error = load(&dir, "main.toml").await.unwrap_err().to_string();
		assert!(error.contains("Section 'bench' is defined in both"));
	}

	#[tokio::test]
	async fn test_file_including_itself() {
		let dir = TempDir::new().unwrap();
		write(&dir, "self.toml", "include = [\"self.toml\"]\n[bench]\nid = \"loop\"\n");

		let error = load(&dir, "self.toml").await.unwrap_err().to_string();
		assert!(error.contains("already loaded"));
	}

	#[tokio::test]
	async fn test_nested_include_rejected() {
		let dir = TempDir::new().unwrap();
		write(&dir, "main.toml", "include = \"io.toml\"\n[bench]\nid = \"x\"\n");
		write(&dir, "io.toml", &format!("include = \"network.toml\"\n{}", IO));
		write(&dir, "network.toml", NETWORK);

		let error = load(&dir, "main.toml").await.unwrap_err().to_string();
		assert!(error.contains("includes further files"));
	}

	#[tokio::test]
	async fn test_missing_include() {
		let dir = TempDir::new().unwrap();
		write(&dir, "main.toml", "include = \"missing.toml\"\n[bench]\nid = \"x\"\n");

		let result = load(&dir, "main.toml").await;
		assert!(matches!(result, Err(ConfigError::Io(_))));
	}

	#[test]
	fn test_include_must_hold_strings() {
		let mut table: Table = toml::from_str("include = [\"a.toml\", 3]").unwrap();
		assert!(matches!(
			take_includes(&mut table),
			Err(ConfigError::Validation(message)) if message.contains("found integer")
		));
	}
}

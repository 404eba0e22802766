//! Process-wide catalogue of implementation factories.
//!
//! Every implementation compiled into the binary is registered once under its
//! configuration name. Building an engine picks the factories that the loaded
//! configuration refers to and fails on names nobody registered.

use latency_account::AccountFactory;
use latency_config::Config;
use latency_core::{BenchBuilder, BenchEngine, BenchFactories};
use latency_delivery::DeliveryFactory;
use latency_storage::{SourceFactory, WriterFactory};
use std::collections::HashMap;
use std::sync::OnceLock;

type Catalogue<F> = HashMap<&'static str, F>;

/// Factories available to this binary, keyed by implementation name.
pub struct FactoryRegistry {
	pub sources: Catalogue<SourceFactory>,
	pub writers: Catalogue<WriterFactory>,
	pub accounts: Catalogue<AccountFactory>,
	pub deliveries: Catalogue<DeliveryFactory>,
}

impl FactoryRegistry {
	fn discover() -> Self {
		Self {
			sources: catalogue("input", latency_storage::get_all_sources()),
			writers: catalogue("output", latency_storage::get_all_writers()),
			accounts: catalogue("account", latency_account::get_all_implementations()),
			deliveries: catalogue("delivery", latency_delivery::get_all_implementations()),
		}
	}
}

fn catalogue<F>(kind: &str, entries: Vec<(&'static str, F)>) -> Catalogue<F> {
	entries
		.into_iter()
		.inspect(|(name, _)| tracing::debug!(kind, name, "Registered implementation"))
		.collect()
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Returns the registry, populating it on first use.
pub fn registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(FactoryRegistry::discover)
}

/// Copies the factories for `names` out of `catalogue`.
fn select<'a, F: Copy>(
	kind: &str,
	catalogue: &Catalogue<F>,
	names: impl IntoIterator<Item = &'a String>,
) -> Result<HashMap<String, F>, String> {
	names
		.into_iter()
		.map(|name| match catalogue.get(name.as_str()) {
			Some(factory) => Ok((name.clone(), *factory)),
			None => {
				let mut known: Vec<_> = catalogue.keys().copied().collect();
				known.sort_unstable();
				Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					kind,
					name,
					known.join(", ")
				))
			},
		})
		.collect()
}

/// Builds a benchmark engine from `config` using the registered factories.
pub fn build_bench_from_config(config: Config) -> Result<BenchEngine, Box<dyn std::error::Error>> {
	let registry = registry();

	let factories = BenchFactories {
		source_factories: select("input", &registry.sources, config.input.implementations.keys())?,
		writer_factories: select("output", &registry.writers, config.output.implementations.keys())?,
		account_factories: select("account", &registry.accounts, [&config.account.primary])?,
		delivery_factories: select(
			"delivery",
			&registry.deliveries,
			config.delivery.implementations.keys(),
		)?,
	};

	Ok(BenchBuilder::new(config).build(factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use latency_config::builders::ConfigBuilder;

	fn names<F>(catalogue: &Catalogue<F>) -> Vec<&'static str> {
		let mut names: Vec<_> = catalogue.keys().copied().collect();
		names.sort_unstable();
		names
	}

	#[test]
	fn test_registry_lists_compiled_implementations() {
		let registry = registry();
		assert_eq!(names(&registry.sources), vec!["csv", "memory"]);
		assert_eq!(names(&registry.writers), vec!["csv", "memory"]);
		assert_eq!(names(&registry.accounts), vec!["local"]);
		assert_eq!(names(&registry.deliveries), vec!["evm_alloy", "mock"]);
	}

	#[tokio::test]
	async fn test_build_bench_from_config() {
		let config = ConfigBuilder::new().bench_id("registry-test").build();
		let engine = build_bench_from_config(config).unwrap();

		let summary = engine.run().await.unwrap();
		assert_eq!(summary.bench_id, "registry-test");
	}

	#[test]
	fn test_unregistered_delivery() {
		let mut config = ConfigBuilder::new().build();
		config
			.delivery
			.implementations
			.insert("websocket".to_string(), toml::Value::Table(toml::map::Map::new()));

		let error = build_bench_from_config(config).err().unwrap().to_string();
		assert!(error.contains("Unknown delivery implementation 'websocket'"));
		assert!(error.contains("Available: [evm_alloy, mock]"));
	}
}

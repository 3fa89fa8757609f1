/* src/registry.rs */

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;

/// Boxed error returned by handlers and factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Encodes and decodes payloads for one family of media types.
///
/// `arg` is the second element of a [`HandlerSpec::WithArg`] entry and lets
/// one handler serve several formats.
///
/// [`HandlerSpec::WithArg`]: crate::HandlerSpec::WithArg
pub trait Handler: Send + Sync {
	/// Encodes `data` into a response body.
	fn serialize(&self, data: &Value, arg: Option<&str>) -> Result<Vec<u8>, BoxError>;

	/// Decodes a request body.
	fn deserialize(&self, body: &[u8], arg: Option<&str>) -> Result<Value, BoxError>;
}

type Factory = Box<dyn Fn() -> Result<Arc<dyn Handler>, BoxError> + Send + Sync>;
type Slot = Arc<OnceLock<Result<Arc<dyn Handler>, LoadError>>>;

/// Why a handler could not be made available. Never leaves the crate.
#[derive(Debug, Clone, Error)]
pub(crate) enum LoadError {
	#[error("no handler registered as '{0}'")]
	Unregistered(String),

	#[error("handler '{id}' failed to initialize: {message}")]
	Init { id: String, message: String },
}

/// Table of handler factories keyed by identifier.
///
/// Factories are registered up front. Each registered identifier is loaded
/// lazily, at most once, the first time a request resolves to it; the
/// outcome, success or failure, is kept for the life of the registry.
/// Unregistered identifiers fail without taking a cache slot.
///
/// ```
/// use std::sync::Arc;
/// use conneg::{BoxError, Handler, Registry};
/// use serde_json::Value;
///
/// struct Json;
///
/// impl Handler for Json {
///     fn serialize(&self, data: &Value, _: Option<&str>) -> Result<Vec<u8>, BoxError> {
///         Ok(serde_json::to_vec(data)?)
///     }
///     fn deserialize(&self, body: &[u8], _: Option<&str>) -> Result<Value, BoxError> {
///         Ok(serde_json::from_slice(body)?)
///     }
/// }
///
/// let mut registry = Registry::new();
/// registry.register("json", || Ok(Arc::new(Json) as Arc<dyn Handler>));
/// assert!(registry.contains("json"));
/// assert!(!registry.is_loaded("json"));
/// ```
#[derive(Default)]
pub struct Registry {
	factories: HashMap<String, Factory>,
	loaded: RwLock<HashMap<String, Slot>>,
}

impl Registry {
	/// Creates an empty registry.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a factory under `id`, replacing any earlier one.
	pub fn register<F>(&mut self, id: &str, factory: F) -> &mut Self
	where
		F: Fn() -> Result<Arc<dyn Handler>, BoxError> + Send + Sync + 'static,
	{
		self.factories.insert(id.to_owned(), Box::new(factory));
		self
	}

	/// Registers a ready-made handler under `id`.
	pub fn register_handler<H>(&mut self, id: &str, handler: H) -> &mut Self
	where
		H: Handler + 'static,
	{
		let handler: Arc<dyn Handler> = Arc::new(handler);
		self.register(id, move || Ok(Arc::clone(&handler)))
	}

	/// Whether a factory exists for `id`.
	#[must_use]
	pub fn contains(&self, id: &str) -> bool {
		self.factories.contains_key(id)
	}

	/// Whether `id` has been loaded successfully.
	#[must_use]
	pub fn is_loaded(&self, id: &str) -> bool {
		self.loaded
			.read()
			.get(id)
			.is_some_and(|slot| matches!(slot.get(), Some(Ok(_))))
	}

	/// Loads the handler for `id`, running its factory on first use only.
	pub(crate) fn load(&self, id: &str) -> Result<Arc<dyn Handler>, LoadError> {
		if !self.contains(id) {
			return Err(LoadError::Unregistered(id.to_owned()));
		}
		let existing = self.loaded.read().get(id).cloned();
		let slot = match existing {
			Some(slot) => slot,
			None => Arc::clone(self.loaded.write().entry(id.to_owned()).or_default()),
		};
		slot.get_or_init(|| self.init(id)).clone()
	}

	fn init(&self, id: &str) -> Result<Arc<dyn Handler>, LoadError> {
		let Some(factory) = self.factories.get(id) else {
			return Err(LoadError::Unregistered(id.to_owned()));
		};
		match factory() {
			Ok(handler) => {
				tracing::debug!(handler = id, "loaded handler");
				Ok(handler)
			}
			Err(e) => Err(LoadError::Init {
				id: id.to_owned(),
				message: e.to_string(),
			}),
		}
	}
}

impl fmt::Debug for Registry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
		ids.sort_unstable();
		f.debug_struct("Registry").field("handlers", &ids).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct Echo;

	impl Handler for Echo {
		fn serialize(&self, data: &Value, _: Option<&str>) -> Result<Vec<u8>, BoxError> {
			Ok(data.to_string().into_bytes())
		}

		fn deserialize(&self, body: &[u8], _: Option<&str>) -> Result<Value, BoxError> {
			Ok(Value::String(String::from_utf8(body.to_vec())?))
		}
	}

	#[test]
	fn loads_registered_handler() {
		let mut registry = Registry::new();
		registry.register_handler("echo", Echo);
		assert!(!registry.is_loaded("echo"));
		assert!(registry.load("echo").is_ok());
		assert!(registry.is_loaded("echo"));
	}

	#[test]
	fn unregistered_id_fails() {
		let registry = Registry::new();
		let err = registry.load("missing").err().unwrap();
		assert!(matches!(err, LoadError::Unregistered(ref id) if id == "missing"));
		assert!(!registry.is_loaded("missing"));
		assert!(registry.loaded.read().is_empty());
	}

	#[test]
	fn factory_runs_once() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&calls);
		let mut registry = Registry::new();
		registry.register("echo", move || {
			counter.fetch_add(1, Ordering::SeqCst);
			Ok(Arc::new(Echo) as Arc<dyn Handler>)
		});
		for _ in 0..3 {
			registry.load("echo").unwrap();
		}
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn failed_load_is_cached() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&calls);
		let mut registry = Registry::new();
		registry.register("broken", move || {
			counter.fetch_add(1, Ordering::SeqCst);
			Err("missing system library".into())
		});
		let first = registry.load("broken").err().unwrap();
		assert!(first.to_string().contains("missing system library"));
		assert!(registry.load("broken").is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(!registry.is_loaded("broken"));
	}

	#[test]
	fn concurrent_first_loads_share_one_init() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&calls);
		let mut registry = Registry::new();
		registry.register("echo", move || {
			counter.fetch_add(1, Ordering::SeqCst);
			Ok(Arc::new(Echo) as Arc<dyn Handler>)
		});
		std::thread::scope(|s| {
			for _ in 0..8 {
				s.spawn(|| registry.load("echo").unwrap());
			}
		});
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn debug_lists_ids() {
		let mut registry = Registry::new();
		registry.register_handler("b", Echo).register_handler("a", Echo);
		assert_eq!(
			format!("{registry:?}"),
			"Registry { handlers: [\"a\", \"b\"], .. }"
		);
	}
}

/* src/config.rs */

use std::collections::HashMap;

use http::Method;
use serde::Deserialize;

use crate::error::Error;

/// Stash slot read by serialization when none is configured.
pub const DEFAULT_STASH_KEY: &str = "rest";

/// Which handler serves a media type.
///
/// Deserializes from either a bare identifier (`"json"`) or a two-element
/// array of identifier and argument (`["data", "yaml"]`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum HandlerSpec {
	/// A handler identifier on its own.
	Simple(String),
	/// A handler identifier plus an argument, such as a sub-format name.
	WithArg(String, String),
}

impl HandlerSpec {
	/// The handler identifier to load from the registry.
	#[must_use]
	pub fn id(&self) -> &str {
		match self {
			Self::Simple(id) | Self::WithArg(id, _) => id,
		}
	}

	/// The handler argument, if any.
	#[must_use]
	pub fn arg(&self) -> Option<&str> {
		match self {
			Self::Simple(_) => None,
			Self::WithArg(_, arg) => Some(arg),
		}
	}
}

impl From<&str> for HandlerSpec {
	fn from(id: &str) -> Self {
		Self::Simple(id.to_owned())
	}
}

impl From<(&str, &str)> for HandlerSpec {
	fn from((id, arg): (&str, &str)) -> Self {
		Self::WithArg(id.to_owned(), arg.to_owned())
	}
}

/// Per-route serializer configuration.
///
/// Built once, then shared by reference across requests. Map keys are
/// stored lowercased to line up with negotiated media types.
///
/// ```
/// use conneg::{Config, HandlerSpec};
///
/// let config = Config::builder()
///     .map("application/json", "json")
///     .map("text/x-yaml", ("data", "yaml"))
///     .default_type("application/json")
///     .build()
///     .unwrap();
/// assert_eq!(config.handler("text/x-yaml"), Some(&HandlerSpec::WithArg("data".into(), "yaml".into())));
/// assert_eq!(config.stash_key(), "rest");
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawConfig")]
pub struct Config {
	map: HashMap<String, HandlerSpec>,
	default: Option<String>,
	stash_key: String,
	deserialize_methods: Vec<Method>,
}

impl Config {
	/// Starts a builder with an empty map and default settings.
	#[must_use]
	pub fn builder() -> ConfigBuilder {
		ConfigBuilder::default()
	}

	/// The handler configured for `media_type`.
	#[must_use]
	pub fn handler(&self, media_type: &str) -> Option<&HandlerSpec> {
		self.map.get(media_type)
	}

	/// The fallback media type, if configured.
	#[must_use]
	pub fn default_type(&self) -> Option<&str> {
		self.default.as_deref()
	}

	/// Name of the stash slot holding the payload to serialize.
	#[must_use]
	pub fn stash_key(&self) -> &str {
		&self.stash_key
	}

	/// Whether request bodies are decoded for `method`.
	#[must_use]
	pub fn deserializes(&self, method: &Method) -> bool {
		self.deserialize_methods.contains(method)
	}

	/// Configured media types, in no particular order.
	pub fn media_types(&self) -> impl Iterator<Item = &str> {
		self.map.keys().map(String::as_str)
	}
}

/// Builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	map: HashMap<String, HandlerSpec>,
	default: Option<String>,
	stash_key: String,
	deserialize_methods: Vec<Method>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self {
			map: HashMap::new(),
			default: None,
			stash_key: DEFAULT_STASH_KEY.to_owned(),
			deserialize_methods: default_deserialize_methods(),
		}
	}
}

impl ConfigBuilder {
	/// Maps a media type to a handler. Later calls replace earlier ones.
	#[must_use]
	pub fn map(mut self, media_type: &str, handler: impl Into<HandlerSpec>) -> Self {
		self.map
			.insert(media_type.trim().to_ascii_lowercase(), handler.into());
		self
	}

	/// Sets the media type used when the preferred type is not mapped.
	#[must_use]
	pub fn default_type(mut self, media_type: &str) -> Self {
		self.default = Some(media_type.trim().to_ascii_lowercase());
		self
	}

	/// Sets the stash slot read by serialization.
	#[must_use]
	pub fn stash_key(mut self, key: &str) -> Self {
		key.clone_into(&mut self.stash_key);
		self
	}

	/// Replaces the methods whose request bodies get decoded.
	#[must_use]
	pub fn deserialize_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
		self.deserialize_methods = methods.into_iter().collect();
		self
	}

	/// Validates and freezes the configuration.
	///
	/// Fails when the default media type has no handler in the map.
	pub fn build(self) -> Result<Config, Error> {
		if let Some(default) = &self.default
			&& !self.map.contains_key(default)
		{
			return Err(Error::InvalidConfig(format!(
				"default media type '{default}' has no handler"
			)));
		}
		Ok(Config {
			map: self.map,
			default: self.default,
			stash_key: self.stash_key,
			deserialize_methods: self.deserialize_methods,
		})
	}
}

fn default_deserialize_methods() -> Vec<Method> {
	vec![Method::POST, Method::PUT, Method::OPTIONS, Method::DELETE]
}

#[derive(Deserialize)]
struct RawConfig {
	#[serde(default)]
	map: HashMap<String, HandlerSpec>,
	#[serde(default)]
	default: Option<String>,
	#[serde(default)]
	stash_key: Option<String>,
	#[serde(default)]
	deserialize_http_methods: Option<Vec<String>>,
}

impl TryFrom<RawConfig> for Config {
	type Error = Error;

	fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
		let mut builder = raw
			.map
			.into_iter()
			.fold(Config::builder(), |b, (media_type, spec)| b.map(&media_type, spec));
		if let Some(default) = &raw.default {
			builder = builder.default_type(default);
		}
		if let Some(key) = &raw.stash_key {
			builder = builder.stash_key(key);
		}
		if let Some(names) = raw.deserialize_http_methods {
			let methods = names
				.iter()
				.map(|name| {
					Method::from_bytes(name.to_ascii_uppercase().as_bytes())
						.map_err(|_| Error::InvalidConfig(format!("invalid HTTP method '{name}'")))
				})
				.collect::<Result<Vec<_>, _>>()?;
			builder = builder.deserialize_methods(methods);
		}
		builder.build()
	}
}

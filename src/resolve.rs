/* src/resolve.rs */

use std::fmt;
use std::sync::Arc;

use http::{HeaderMap, HeaderValue, Response, header};
use serde_json::Value;

use crate::config::{Config, HandlerSpec};
use crate::error::Error;
use crate::negotiation::Negotiation;
use crate::registry::{Handler, Registry};

/// Named payload slots shared between business logic and serialization.
pub type Stash = serde_json::Map<String, Value>;

/// Which way a resolved handler will be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	/// Encoding a response body. Resolution sets `Vary` and `Content-Type`.
	Serialize,
	/// Decoding a request body. Response headers are left alone.
	Deserialize,
}

/// A handler chosen for a request, with the media type it was chosen for.
#[derive(Clone)]
pub struct ResolvedHandler {
	content_type: String,
	spec: HandlerSpec,
	handler: Arc<dyn Handler>,
}

impl ResolvedHandler {
	/// The effective media type: the preferred type or the configured default.
	#[must_use]
	pub fn content_type(&self) -> &str {
		&self.content_type
	}

	/// The handler identifier from the configuration map.
	#[must_use]
	pub fn id(&self) -> &str {
		self.spec.id()
	}

	/// The handler argument from the configuration map.
	#[must_use]
	pub fn arg(&self) -> Option<&str> {
		self.spec.arg()
	}

	/// The loaded handler.
	#[must_use]
	pub fn handler(&self) -> &dyn Handler {
		self.handler.as_ref()
	}
}

impl fmt::Debug for ResolvedHandler {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResolvedHandler")
			.field("content_type", &self.content_type)
			.field("spec", &self.spec)
			.finish_non_exhaustive()
	}
}

/// Picks the handler for a request's preferred content type.
///
/// Falls back to the configured default when the preferred type is missing
/// or unmapped. Fails with [`Error::UnsupportedMediaType`] when neither
/// yields a map entry or the entry's handler cannot be loaded.
///
/// ```
/// use conneg::{Config, Negotiation, Registry};
/// use http::Method;
///
/// let config = Config::builder().map("application/json", "json").build().unwrap();
/// let request = Negotiation::new(Method::GET, None, None, Some("text/html"));
/// let err = conneg::resolve(&request, &config, &Registry::new()).unwrap_err();
/// assert_eq!(err.status().as_u16(), 415);
/// ```
pub fn resolve(
	negotiation: &Negotiation,
	config: &Config,
	registry: &Registry,
) -> Result<ResolvedHandler, Error> {
	let preferred = negotiation.preferred_content_type();
	let content_type = match (preferred, config.default_type()) {
		(Some(ct), _) if config.handler(ct).is_some() => ct,
		(_, Some(default)) => default,
		(_, None) => {
			tracing::debug!(preferred = ?preferred, "no handler for preferred type and no default");
			return Err(Error::UnsupportedMediaType(preferred.map(str::to_owned)));
		}
	};

	let Some(spec) = config.handler(content_type) else {
		return Err(Error::UnsupportedMediaType(Some(content_type.to_owned())));
	};

	let handler = registry.load(spec.id()).map_err(|e| {
		tracing::error!(content_type, error = %e, "could not load handler, refusing media type");
		Error::UnsupportedMediaType(Some(content_type.to_owned()))
	})?;

	tracing::debug!(content_type, handler = spec.id(), "resolved handler");
	Ok(ResolvedHandler {
		content_type: content_type.to_owned(),
		spec: spec.clone(),
		handler,
	})
}

/// Resolves a handler and, for [`Direction::Serialize`], records the
/// negotiation outcome on the response headers.
///
/// `Vary` becomes `Accept` when the `Accept` header alone drove the choice
/// and `Content-Type` otherwise; `Content-Type` becomes the resolved type.
pub fn resolve_serializer(
	direction: Direction,
	negotiation: &Negotiation,
	config: &Config,
	registry: &Registry,
	response_headers: &mut HeaderMap,
) -> Result<ResolvedHandler, Error> {
	let resolved = resolve(negotiation, config, registry)?;
	if direction == Direction::Serialize {
		let content_type = HeaderValue::from_str(resolved.content_type())
			.map_err(|_| Error::UnsupportedMediaType(Some(resolved.content_type.clone())))?;
		let vary = if negotiation.accept_only() {
			HeaderValue::from_static("Accept")
		} else {
			HeaderValue::from_static("Content-Type")
		};
		response_headers.insert(header::VARY, vary);
		response_headers.insert(header::CONTENT_TYPE, content_type);
	}
	Ok(resolved)
}

/// Encodes the stashed payload with the negotiated handler.
///
/// Reads `config.stash_key()` from `stash` (`null` when the slot is empty)
/// and returns a `200` response carrying the negotiated headers.
pub fn serialize(
	negotiation: &Negotiation,
	config: &Config,
	registry: &Registry,
	stash: &Stash,
) -> Result<Response<Vec<u8>>, Error> {
	let mut response = Response::new(Vec::new());
	let resolved = resolve_serializer(
		Direction::Serialize,
		negotiation,
		config,
		registry,
		response.headers_mut(),
	)?;

	let data = stash.get(config.stash_key()).unwrap_or(&Value::Null);
	let body = resolved
		.handler()
		.serialize(data, resolved.arg())
		.map_err(|e| {
			tracing::error!(content_type = resolved.content_type(), error = %e, "serialization failed");
			Error::Serialize {
				content_type: resolved.content_type.clone(),
				detail: e.to_string(),
			}
		})?;

	*response.body_mut() = body;
	Ok(response)
}

/// Decodes a request body with the negotiated handler.
///
/// Returns `Ok(None)` without resolving when the method does not carry a
/// body per `config` or the body is empty.
pub fn deserialize(
	negotiation: &Negotiation,
	config: &Config,
	registry: &Registry,
	body: &[u8],
) -> Result<Option<Value>, Error> {
	if !config.deserializes(negotiation.method()) || body.is_empty() {
		return Ok(None);
	}

	let mut untouched = HeaderMap::new();
	let resolved = resolve_serializer(
		Direction::Deserialize,
		negotiation,
		config,
		registry,
		&mut untouched,
	)?;

	resolved
		.handler()
		.deserialize(body, resolved.arg())
		.map(Some)
		.map_err(|e| {
			tracing::debug!(content_type = resolved.content_type(), error = %e, "request body rejected");
			Error::BadRequest {
				content_type: resolved.content_type.clone(),
				detail: e.to_string(),
			}
		})
}

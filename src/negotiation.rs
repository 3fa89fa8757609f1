/* src/negotiation.rs */

use std::sync::OnceLock;

use http::{HeaderMap, Method, header, request};

use crate::accept;

/// Name of the query parameter that overrides the content type on GET.
pub const QUERY_PARAM: &str = "content-type";

/// Per-request content negotiation state.
///
/// Holds the raw signals of one request and derives the ordered list of
/// acceptable media types from them on first access. The list is cached
/// for the lifetime of the value, so every accessor is idempotent.
///
/// Priority order, highest first:
/// 1. The request's own `Content-Type` header.
/// 2. The `content-type` query parameter, on `GET` only.
/// 3. The `Accept` header, by descending `q` weight.
///
/// ```
/// use conneg::Negotiation;
/// use http::Method;
///
/// let n = Negotiation::new(
///     Method::GET,
///     Some("application/json"),
///     None,
///     Some("text/html;q=0.9, text/plain"),
/// );
/// assert_eq!(
///     n.accepted_content_types(),
///     ["application/json", "text/plain", "text/html"]
/// );
/// assert_eq!(n.preferred_content_type(), Some("application/json"));
/// assert!(!n.accept_only());
/// ```
#[derive(Debug, Clone)]
pub struct Negotiation {
	method: Method,
	content_type: Option<String>,
	query_content_type: Option<String>,
	accept: Option<String>,
	accepted: OnceLock<Vec<String>>,
}

impl Negotiation {
	/// Creates negotiation state from already extracted request signals.
	///
	/// `content_type` and `query_content_type` are reduced to their
	/// lowercased base type; blank values count as absent. The query value
	/// is kept for every method but only consulted for `GET`.
	#[must_use]
	pub fn new(
		method: Method,
		content_type: Option<&str>,
		query_content_type: Option<&str>,
		accept: Option<&str>,
	) -> Self {
		Self {
			method,
			content_type: content_type.and_then(accept::base_type),
			query_content_type: query_content_type.and_then(accept::base_type),
			accept: accept
				.filter(|value| !value.trim().is_empty())
				.map(str::to_owned),
			accepted: OnceLock::new(),
		}
	}

	/// Reads method, headers and URI query from HTTP request parts.
	///
	/// Multiple `Accept` lines are joined in field order. Header values
	/// that are not visible ASCII are ignored. The query string is only
	/// inspected with the `query` feature enabled.
	///
	/// ```
	/// let (parts, ()) = http::Request::get("/things?content-type=text%2Fx-yaml")
	///     .header("Accept", "application/json")
	///     .body(())
	///     .unwrap()
	///     .into_parts();
	/// let n = conneg::Negotiation::from_parts(&parts);
	/// assert_eq!(n.accepted_content_types(), ["text/x-yaml", "application/json"]);
	/// ```
	#[must_use]
	pub fn from_parts(parts: &request::Parts) -> Self {
		#[cfg(feature = "query")]
		let query = parts.uri.query().and_then(|q| query_param(q, QUERY_PARAM));
		#[cfg(not(feature = "query"))]
		let query: Option<String> = None;

		Self::from_headers(parts.method.clone(), &parts.headers, query.as_deref())
	}

	/// Reads `Content-Type` and `Accept` from a header map.
	#[must_use]
	pub fn from_headers(
		method: Method,
		headers: &HeaderMap,
		query_content_type: Option<&str>,
	) -> Self {
		let content_type = headers
			.get(header::CONTENT_TYPE)
			.and_then(|v| v.to_str().ok());
		let accept: Vec<&str> = headers
			.get_all(header::ACCEPT)
			.iter()
			.filter_map(|v| v.to_str().ok())
			.collect();
		let accept = (!accept.is_empty()).then(|| accept.join(","));

		Self::new(method, content_type, query_content_type, accept.as_deref())
	}

	/// The request method.
	#[must_use]
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Ordered, deduplicated media types the client will take.
	#[must_use]
	pub fn accepted_content_types(&self) -> &[String] {
		self.accepted.get_or_init(|| self.build())
	}

	/// The most preferred media type, if the request named any.
	#[must_use]
	pub fn preferred_content_type(&self) -> Option<&str> {
		self.accepted_content_types().first().map(String::as_str)
	}

	/// Whether the `Accept` header was the only negotiation signal.
	///
	/// Responses negotiated this way should carry `Vary: Accept`, the rest
	/// `Vary: Content-Type`.
	#[must_use]
	pub fn accept_only(&self) -> bool {
		self.accept.is_some() && self.content_type.is_none() && self.query_override().is_none()
	}

	/// Whether `candidate` appears in the accepted list.
	///
	/// Matching is by exact, case-sensitive string. Stored types are
	/// lowercased on input, so pass lowercase candidates. A `*/*` or
	/// `text/*` entry does not accept `text/html` unless `text/html` is
	/// listed too.
	#[must_use]
	pub fn accepts(&self, candidate: &str) -> bool {
		self.accepted_content_types().iter().any(|t| t == candidate)
	}

	fn query_override(&self) -> Option<&str> {
		if self.method == Method::GET {
			self.query_content_type.as_deref()
		} else {
			None
		}
	}

	fn build(&self) -> Vec<String> {
		let mut types: Vec<String> = Vec::new();
		let mut push = |media_type: String| {
			if !types.contains(&media_type) {
				types.push(media_type);
			}
		};

		if let Some(ct) = &self.content_type {
			push(ct.clone());
		}
		if let Some(ct) = self.query_override() {
			push(ct.to_owned());
		}
		if let Some(accept) = &self.accept {
			for entry in accept::parse(accept) {
				push(entry.media_type);
			}
		}

		tracing::debug!(method = %self.method, accepted = ?types, "negotiated content types");
		types
	}
}

#[cfg(feature = "query")]
fn query_param(query: &str, name: &str) -> Option<String> {
	query
		.split('&')
		.filter_map(|pair| {
			let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
			(decode_component(key) == name).then(|| decode_component(value))
		})
		.find_map(|value| accept::base_type(&value))
}

#[cfg(feature = "query")]
fn decode_component(raw: &str) -> String {
	let spaced = raw.replace('+', " ");
	percent_encoding::percent_decode_str(&spaced)
		.decode_utf8_lossy()
		.into_owned()
}

#[cfg(test)]
mod tests {
	use super::*;

	const BROWSER_ACCEPT: &str = "text/xml,application/xml,application/xhtml+xml,text/html;q=0.9,text/plain;q=0.8,image/png,*/*;q=0.5";

	#[test]
	fn explicit_content_type_only() {
		let n = Negotiation::new(Method::GET, Some("text/foobar"), None, None);
		assert_eq!(n.accepted_content_types(), ["text/foobar"]);
		assert_eq!(n.preferred_content_type(), Some("text/foobar"));
		assert!(!n.accept_only());
	}

	#[test]
	fn get_query_param_follows_content_type() {
		let n = Negotiation::new(Method::GET, Some("text/foobar"), Some("text/fudge"), None);
		assert_eq!(n.accepted_content_types(), ["text/foobar", "text/fudge"]);
		assert!(n.accepts("text/fudge"));
		assert!(!n.accept_only());
	}

	#[test]
	fn post_ignores_query_param() {
		let n = Negotiation::new(Method::POST, Some("text/foobar"), Some("text/fudge"), None);
		assert_eq!(n.accepted_content_types(), ["text/foobar"]);
		assert!(!n.accepts("text/fudge"));
	}

	#[test]
	fn put_query_param_alone_is_ignored() {
		let n = Negotiation::new(Method::PUT, None, Some("text/fudge"), Some("text/html"));
		assert_eq!(n.accepted_content_types(), ["text/html"]);
		assert!(n.accept_only());
	}

	#[test]
	fn accept_header_only() {
		let n = Negotiation::new(Method::GET, None, None, Some(BROWSER_ACCEPT));
		assert_eq!(
			n.accepted_content_types(),
			[
				"text/xml",
				"application/xml",
				"application/xhtml+xml",
				"image/png",
				"text/html",
				"text/plain",
				"*/*",
			]
		);
		assert_eq!(n.preferred_content_type(), Some("text/xml"));
		assert!(n.accept_only());
	}

	#[test]
	fn accept_header_with_content_type() {
		let n = Negotiation::new(Method::GET, Some("application/json"), None, Some(BROWSER_ACCEPT));
		assert_eq!(
			n.accepted_content_types(),
			[
				"application/json",
				"text/xml",
				"application/xml",
				"application/xhtml+xml",
				"image/png",
				"text/html",
				"text/plain",
				"*/*",
			]
		);
		assert_eq!(n.preferred_content_type(), Some("application/json"));
		assert!(!n.accept_only());
	}

	#[test]
	fn duplicates_collapse_to_first() {
		let n = Negotiation::new(
			Method::GET,
			Some("text/x-json"),
			None,
			Some("text/plain,text/x-json"),
		);
		assert_eq!(n.accepted_content_types(), ["text/x-json", "text/plain"]);
	}

	#[test]
	fn query_param_before_accept() {
		let n = Negotiation::new(Method::GET, None, Some("text/x-yaml"), Some("text/x-yaml, text/html"));
		assert_eq!(n.accepted_content_types(), ["text/x-yaml", "text/html"]);
		assert!(!n.accept_only());
	}

	#[test]
	fn no_signals() {
		let n = Negotiation::new(Method::GET, None, None, None);
		assert!(n.accepted_content_types().is_empty());
		assert_eq!(n.preferred_content_type(), None);
		assert!(!n.accept_only());
	}

	#[test]
	fn blank_values_are_absent() {
		let n = Negotiation::new(Method::GET, Some("  "), Some(""), Some(" "));
		assert!(n.accepted_content_types().is_empty());
		assert!(!n.accept_only());
	}

	#[test]
	fn content_type_parameters_stripped() {
		let n = Negotiation::new(Method::POST, Some("Application/JSON; charset=utf-8"), None, None);
		assert_eq!(n.preferred_content_type(), Some("application/json"));
	}

	#[test]
	fn wildcard_does_not_expand() {
		let n = Negotiation::new(Method::GET, None, None, Some("text/html, */*;q=0.1"));
		assert!(n.accepts("*/*"));
		assert!(!n.accepts("image/svg"));
	}

	#[test]
	fn accepts_is_case_sensitive() {
		let n = Negotiation::new(Method::GET, None, Some("Text/Fudge"), None);
		assert!(n.accepts("text/fudge"));
		assert!(!n.accepts("Text/Fudge"));
	}

	#[test]
	fn repeated_access_is_stable() {
		let n = Negotiation::new(Method::GET, Some("text/foobar"), None, Some(BROWSER_ACCEPT));
		let first = n.accepted_content_types().to_vec();
		assert_eq!(n.accepted_content_types(), first.as_slice());
		assert_eq!(n.preferred_content_type(), n.preferred_content_type());
		assert!(std::ptr::eq(
			n.accepted_content_types(),
			n.accepted_content_types()
		));
	}

	#[test]
	fn from_headers_joins_accept_lines() {
		let mut headers = HeaderMap::new();
		headers.append(header::ACCEPT, "text/html;q=0.5".parse().unwrap());
		headers.append(header::ACCEPT, "application/json".parse().unwrap());
		let n = Negotiation::from_headers(Method::GET, &headers, None);
		assert_eq!(n.accepted_content_types(), ["application/json", "text/html"]);
		assert!(n.accept_only());
	}

	#[test]
	fn from_headers_reads_content_type() {
		let mut headers = HeaderMap::new();
		headers.insert(header::CONTENT_TYPE, "text/foobar".parse().unwrap());
		let n = Negotiation::from_headers(Method::POST, &headers, Some("text/fudge"));
		assert_eq!(n.accepted_content_types(), ["text/foobar"]);
	}

	#[cfg(feature = "query")]
	#[test]
	fn from_parts_decodes_query() {
		let (parts, ()) = http::Request::get("/t?x=1&content-type=text%2Fx+yaml&content-type=a/b")
			.header(header::CONTENT_TYPE, "text/foobar")
			.body(())
			.unwrap()
			.into_parts();
		let n = Negotiation::from_parts(&parts);
		assert_eq!(n.accepted_content_types(), ["text/foobar", "text/x yaml"]);
	}

	#[cfg(feature = "query")]
	#[test]
	fn from_parts_skips_blank_query_values() {
		let (parts, ()) = http::Request::get("/t?content-type=%20&content-type=text/plain")
			.body(())
			.unwrap()
			.into_parts();
		let n = Negotiation::from_parts(&parts);
		assert_eq!(n.accepted_content_types(), ["text/plain"]);
	}

	#[cfg(feature = "query")]
	#[test]
	fn from_parts_post_skips_query() {
		let (parts, ()) = http::Request::post("/t?content-type=text/fudge")
			.body(())
			.unwrap()
			.into_parts();
		let n = Negotiation::from_parts(&parts);
		assert!(n.accepted_content_types().is_empty());
	}

	#[cfg(feature = "query")]
	#[test]
	fn query_param_skips_empty_values() {
		assert_eq!(
			query_param("content-type=&content-type=text/plain", QUERY_PARAM),
			Some("text/plain".to_owned())
		);
		assert_eq!(
			query_param("content-type=%20&content-type=;x=1&content-type=text/plain", QUERY_PARAM),
			Some("text/plain".to_owned())
		);
		assert_eq!(query_param("other=1", QUERY_PARAM), None);
		assert_eq!(query_param("content-type", QUERY_PARAM), None);
	}
}

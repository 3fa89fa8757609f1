/* src/error.rs */

use http::{HeaderValue, Response, StatusCode, header};
use thiserror::Error;

/// All errors that conneg can produce.
///
/// Every variant except [`Error::InvalidConfig`] describes a finalized
/// request outcome: build the response with [`Error::into_response`] and
/// stop processing the request.
#[derive(Debug, Error)]
pub enum Error {
	/// No handler is configured or loadable for the negotiated type.
	///
	/// Carries the offending content type, or `None` when the request gave
	/// no usable type at all.
	#[error("{}", unsupported_message(.0.as_deref()))]
	UnsupportedMediaType(Option<String>),

	/// A deserialization handler rejected the request body.
	#[error("Content-Type {content_type} had a problem with your request.\r\n***ERROR***\r\n{detail}")]
	BadRequest {
		/// The content type the body was decoded as.
		content_type: String,
		/// The decoder's error message.
		detail: String,
	},

	/// A serialization handler failed to encode the response payload.
	#[error("Content-Type {content_type} failed to serialize the response.\r\n***ERROR***\r\n{detail}")]
	Serialize {
		/// The content type the payload was encoded as.
		content_type: String,
		/// The encoder's error message.
		detail: String,
	},

	/// The configuration is inconsistent.
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),
}

fn unsupported_message(content_type: Option<&str>) -> String {
	match content_type {
		Some(ct) if !ct.is_empty() => format!("Content-Type {ct} is not supported.\r\n"),
		_ => "Cannot find a Content-Type supported by your client.\r\n".to_owned(),
	}
}

impl Error {
	/// HTTP status code this error is reported with.
	///
	/// ```
	/// use conneg::Error;
	/// let err = Error::UnsupportedMediaType(Some("text/x-foo".to_owned()));
	/// assert_eq!(err.status().as_u16(), 415);
	/// ```
	#[must_use]
	pub fn status(&self) -> StatusCode {
		match self {
			Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
			Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
			Self::Serialize { .. } | Self::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Builds the finalized plain-text response for this error.
	#[must_use]
	pub fn into_response(self) -> Response<Vec<u8>> {
		let mut response = Response::new(self.to_string().into_bytes());
		*response.status_mut() = self.status();
		response
			.headers_mut()
			.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
		response
	}
}

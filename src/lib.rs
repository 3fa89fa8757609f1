/* src/lib.rs */

//! Headless HTTP content negotiation.
//!
//! [`Negotiation`] turns a request's `Content-Type`, `content-type` query
//! parameter and `Accept` header into an ordered list of media types.
//! [`resolve`] maps the preferred type onto a handler from a [`Config`] and
//! a [`Registry`]; [`serialize`] and [`deserialize`] run the whole flow.
//! Failures are [`Error`] values that render as finalized `415`/`400`
//! responses.

pub mod accept;
pub mod config;
pub mod error;
pub mod negotiation;
pub mod registry;
pub mod resolve;

pub use config::{Config, ConfigBuilder, HandlerSpec};
pub use error::Error;
pub use negotiation::Negotiation;
pub use registry::{BoxError, Handler, Registry};
pub use resolve::{
	Direction, ResolvedHandler, Stash, deserialize, resolve, resolve_serializer, serialize,
};

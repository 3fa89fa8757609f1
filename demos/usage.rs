/* demos/usage.rs */

use std::sync::Arc;

use conneg::{BoxError, Config, Handler, Negotiation, Registry, Stash};
use serde_json::{Value, json};

struct Json;

impl Handler for Json {
	fn serialize(&self, data: &Value, _: Option<&str>) -> Result<Vec<u8>, BoxError> {
		Ok(serde_json::to_vec_pretty(data)?)
	}

	fn deserialize(&self, body: &[u8], _: Option<&str>) -> Result<Value, BoxError> {
		Ok(serde_json::from_slice(body)?)
	}
}

fn main() {
	let mut registry = Registry::new();
	registry.register("json", || Ok(Arc::new(Json) as Arc<dyn Handler>));

	let config = Config::builder()
		.map("application/json", "json")
		.default_type("application/json")
		.build()
		.expect("valid configuration");

	let (parts, ()) = http::Request::get("/things?content-type=text%2Fx-yaml")
		.header("Accept", "text/html;q=0.9, application/json, */*;q=0.1")
		.body(())
		.expect("valid request")
		.into_parts();
	let negotiation = Negotiation::from_parts(&parts);

	println!("Accepted: {:?}", negotiation.accepted_content_types());
	println!("Preferred: {:?}", negotiation.preferred_content_type());
	println!("Accept only: {}", negotiation.accept_only());
	println!("Accepts text/html: {}", negotiation.accepts("text/html"));

	let mut stash = Stash::new();
	stash.insert(config.stash_key().to_owned(), json!({ "things": [1, 2, 3] }));

	let response = match conneg::serialize(&negotiation, &config, &registry, &stash) {
		Ok(response) => response,
		Err(e) => e.into_response(),
	};
	println!("Status: {}", response.status());
	for (name, value) in response.headers() {
		println!("  {name}: {value:?}");
	}
	println!("{}", String::from_utf8_lossy(response.body()));

	let strict = Config::builder()
		.map("application/json", "json")
		.build()
		.expect("valid configuration");
	let html_only = Negotiation::new(http::Method::GET, None, None, Some("text/html"));
	if let Err(e) = conneg::resolve(&html_only, &strict, &registry) {
		let response = e.into_response();
		println!(
			"Status: {} body: {:?}",
			response.status(),
			String::from_utf8_lossy(response.body())
		);
	}
}

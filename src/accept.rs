/* src/accept.rs */

use std::cmp::Ordering;

/// A media type paired with its `q` weight from an Accept header.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedMediaType {
	/// Lowercased base type, e.g. `text/html` or `*/*`.
	pub media_type: String,
	/// Quality weight in `[0.0, 1.0]`.
	pub quality: f32,
}

/// Parses an HTTP Accept header value (RFC 9110 section 12.5.1).
///
/// Entries come back ordered by descending quality. Entries with equal
/// quality keep their left-to-right order from the header. A missing or
/// unparsable `q` parameter counts as `1.0`; out-of-range values are
/// clamped into `[0.0, 1.0]`. Parameters other than `q` are dropped and
/// empty segments are skipped. Wildcards are kept as literal entries.
///
/// ```
/// let types = conneg::accept::parse("text/html;q=0.9, application/json");
/// assert_eq!(types[0].media_type, "application/json");
/// assert_eq!(types[1].media_type, "text/html");
/// assert_eq!(types[1].quality, 0.9);
/// ```
#[must_use]
pub fn parse(header: &str) -> Vec<QualifiedMediaType> {
	let mut types: Vec<QualifiedMediaType> = header.split(',').filter_map(parse_entry).collect();

	// `sort_by` is stable, so ties keep header order.
	types.sort_by(|a, b| b.quality.partial_cmp(&a.quality).unwrap_or(Ordering::Equal));
	types
}

fn parse_entry(segment: &str) -> Option<QualifiedMediaType> {
	let mut parts = segment.split(';');
	let media_type = parts.next()?.trim();
	if media_type.is_empty() {
		return None;
	}

	let quality = parts
		.filter_map(|param| param.split_once('='))
		.find(|(name, _)| name.trim().eq_ignore_ascii_case("q"))
		.map_or(1.0, |(_, value)| parse_quality(value));

	Some(QualifiedMediaType {
		media_type: media_type.to_ascii_lowercase(),
		quality,
	})
}

fn parse_quality(value: &str) -> f32 {
	match value.trim().trim_matches('"').parse::<f32>() {
		// `abs` folds `-0` into `0`.
		Ok(q) if !q.is_nan() => q.clamp(0.0, 1.0).abs(),
		_ => 1.0,
	}
}

/// Strips parameters from a Content-Type value and normalizes the base type.
///
/// Returns `None` when nothing but whitespace or parameters remain.
///
/// ```
/// assert_eq!(
///     conneg::accept::base_type(" Application/JSON; charset=utf-8"),
///     Some("application/json".to_owned())
/// );
/// assert_eq!(conneg::accept::base_type(";charset=utf-8"), None);
/// ```
#[must_use]
pub fn base_type(value: &str) -> Option<String> {
	let base = value.split(';').next().unwrap_or_default().trim();
	(!base.is_empty()).then(|| base.to_ascii_lowercase())
}

//! Helpers shared across the orderdesk crates.

/// Truncates an identifier for log output.
///
/// Shows only the first 8 characters followed by ".." for longer ids.
pub fn truncate_id(id: &str) -> String {
	if id.chars().count() <= 8 {
		id.to_string()
	} else {
		let head: String = id.chars().take(8).collect();
		format!("{}..", head)
	}
}

/// Formats an amount in cents as a dollar string, e.g. `8000` -> `"$ 80.00"`.
pub fn format_cents(cents: u64) -> String {
	format!("$ {}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("short"), "short");
		assert_eq!(truncate_id("8d7as98d7as98d7"), "8d7as98d..");
	}

	#[test]
	fn test_format_cents() {
		assert_eq!(format_cents(8000), "$ 80.00");
		assert_eq!(format_cents(4497), "$ 44.97");
		assert_eq!(format_cents(5), "$ 0.05");
	}
}

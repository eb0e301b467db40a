//! Plain-text rendering of rows, pages and details for the terminal.

use chrono::{DateTime, Utc};
use orderdesk_core::RowView;
use orderdesk_types::{format_cents, Notice, NoticeLevel, OrderDetail, OrderPage};

/// Renders "3 minutes ago" style relative times.
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
	let seconds = (now - at).num_seconds().max(0);
	let (value, unit) = match seconds {
		0..=59 => return "just now".to_string(),
		60..=3599 => (seconds / 60, "minute"),
		3600..=86_399 => (seconds / 3600, "hour"),
		_ => (seconds / 86_400, "day"),
	};
	let plural = if value == 1 { "" } else { "s" };
	format!("{} {}{} ago", value, unit, plural)
}

/// One table line per row, followed by the pagination footer.
pub fn page(page: &OrderPage, rows: &[RowView], now: DateTime<Utc>) -> String {
	let mut out = format!(
		"{:<12} {:<16} {:<12} {:<24} {:>12}  {}\n",
		"ID", "PLACED", "STATUS", "CUSTOMER", "TOTAL", "ACTIONS"
	);

	for summary in &page.orders {
		let Some(row) = rows.iter().find(|row| row.order_id == summary.order_id) else {
			continue;
		};
		let actions: Vec<String> = row
			.actions
			.iter()
			.map(|state| {
				if state.enabled {
					state.label.to_string()
				} else {
					format!("({})", state.label)
				}
			})
			.collect();

		out.push_str(&format!(
			"{:<12} {:<16} {:<12} {:<24} {:>12}  {}\n",
			summary.order_id,
			relative_time(summary.created_at, now),
			row.status_label,
			summary.customer_name,
			format_cents(summary.total_in_cents),
			actions.join(" "),
		));
	}

	let meta = &page.meta;
	out.push_str(&format!(
		"Total of {} item(s). Page {} of {}\n",
		meta.total_count,
		meta.page_index + 1,
		meta.page_count()
	));
	out
}

pub fn detail(detail: &OrderDetail, now: DateTime<Utc>) -> String {
	let mut out = format!("Order {}\n", detail.id);
	out.push_str(&format!("  Status:   {}\n", detail.status().label()));
	out.push_str(&format!("  Customer: {}\n", detail.customer.name));
	out.push_str(&format!("  Email:    {}\n", detail.customer.email));
	if let Some(phone) = &detail.customer.phone {
		out.push_str(&format!("  Phone:    {}\n", phone));
	}
	out.push_str(&format!(
		"  Placed:   {}\n",
		relative_time(detail.created_at, now)
	));
	out.push('\n');

	for item in &detail.order_items {
		out.push_str(&format!(
			"  {:<28} {:>3} x {:>10} = {:>10}\n",
			item.product.name,
			item.quantity,
			format_cents(item.price_in_cents),
			format_cents(item.subtotal_in_cents()),
		));
	}
	out.push_str(&format!(
		"  {:<28} {:>28}\n",
		"Order total",
		format_cents(detail.total_in_cents)
	));
	out
}

pub fn notice(notice: &Notice) -> String {
	let tag = match notice.level {
		NoticeLevel::Success => "ok",
		NoticeLevel::Error => "error",
	};
	format!("[{}] {}", tag, notice.message)
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{Duration, TimeZone};
	use orderdesk_types::{Customer, OrderItem, OrderStatus, Product};

	fn now() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap()
	}

	#[test]
	fn test_relative_time() {
		assert_eq!(relative_time(now(), now()), "just now");
		assert_eq!(relative_time(now() - Duration::minutes(1), now()), "1 minute ago");
		assert_eq!(relative_time(now() - Duration::minutes(45), now()), "45 minutes ago");
		assert_eq!(relative_time(now() - Duration::hours(3), now()), "3 hours ago");
		assert_eq!(relative_time(now() - Duration::days(2), now()), "2 days ago");
		assert_eq!(relative_time(now() + Duration::minutes(5), now()), "just now");
	}

	#[test]
	fn test_detail_lists_items_and_total() {
		let order = OrderDetail::new(
			"ord-1",
			OrderStatus::Delivering,
			now() - Duration::minutes(20),
			4187,
			Customer {
				name: "Ana".into(),
				email: "ana@example.com".into(),
				phone: Some("+55 11 99999-0000".into()),
			},
			vec![OrderItem {
				id: "i1".into(),
				price_in_cents: 1299,
				quantity: 2,
				product: Product {
					name: "Pizza Calabresa".into(),
				},
			}],
		);

		let text = detail(&order, now());
		assert!(text.contains("Status:   Delivering"));
		assert!(text.contains("Phone:    +55 11 99999-0000"));
		assert!(text.contains("20 minutes ago"));
		assert!(text.contains(&format_cents(2598)));
		assert!(text.contains(&format_cents(4187)));
	}

	#[test]
	fn test_notice_tags() {
		assert_eq!(
			notice(&Notice::success("o1", "Order approved successfully")),
			"[ok] Order approved successfully"
		);
		assert_eq!(notice(&Notice::error("o1", "boom")), "[error] boom");
	}
}

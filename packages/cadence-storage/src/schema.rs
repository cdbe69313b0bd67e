pub fn render_schema() -> &'static str {
	include_str!("../sql/init.sql")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn schema_creates_every_owned_table() {
		let sql = render_schema();

		for table in
			["performance_snapshots", "latest_pointers", "dimension_weights", "context_fit_records"]
		{
			assert!(
				sql.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")),
				"schema missing {table}"
			);
		}
	}

	#[test]
	fn schema_never_creates_crm_tables() {
		let sql = render_schema();

		for table in ["leads", "workflow_tasks", "listings", "transactions", "agent_profiles"] {
			assert!(
				!sql.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")),
				"schema must not own {table}"
			);
		}
	}
}

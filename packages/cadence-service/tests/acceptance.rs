//! End-to-end run against a throwaway Postgres: fixture CRM tables, a full
//! recompute, then the read paths. Tables the fixture does not create
//! (workflow_tasks, first_touch_timers, touchpoints, risk_interventions)
//! exercise the degraded-schema path at the same time.

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use cadence_config::{Config, Postgres, Scoring, Service, Storage};
use cadence_domain::FitRequestContext;
use cadence_service::{ActorRole, CadenceService, ContextFitRequest, LeaderboardParams};
use cadence_storage::db::Db;
use cadence_testkit::TestDatabase;

fn test_config(dsn: String) -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
		},
		storage: Storage { postgres: Postgres { dsn, pool_max_conns: 2 } },
		scoring: Scoring {
			model_version: "API_v1".to_string(),
			batch_size: 6,
			lookback_days: 365,
		},
	}
}

struct Fixture {
	org_id: Uuid,
	avery: Uuid,
	avery_user: Uuid,
	blake: Uuid,
	blake_user: Uuid,
}

async fn seed_crm(db: &Db) -> Fixture {
	let ddl = [
		"\
CREATE TABLE agent_profiles (
	agent_id uuid PRIMARY KEY,
	org_id uuid NOT NULL,
	user_id uuid NOT NULL,
	display_name text NOT NULL,
	office_id uuid,
	team_id uuid
)",
		"\
CREATE TABLE leads (
	org_id uuid NOT NULL,
	agent_id uuid NOT NULL,
	lead_type text NOT NULL,
	status text NOT NULL,
	created_at timestamptz NOT NULL,
	last_activity_at timestamptz,
	converted_at timestamptz
)",
		"\
CREATE TABLE listings (
	org_id uuid NOT NULL,
	agent_id uuid NOT NULL,
	status text NOT NULL,
	state text NOT NULL,
	property_type text NOT NULL,
	created_at timestamptz NOT NULL
)",
		"\
CREATE TABLE transactions (
	org_id uuid NOT NULL,
	agent_id uuid NOT NULL,
	status text NOT NULL,
	close_price double precision,
	closed_at timestamptz,
	compliance_flagged_at timestamptz
)",
	];

	for statement in ddl {
		sqlx::query(statement).execute(&db.pool).await.expect("Failed to create fixture table.");
	}

	let fixture = Fixture {
		org_id: Uuid::new_v4(),
		avery: Uuid::new_v4(),
		avery_user: Uuid::new_v4(),
		blake: Uuid::new_v4(),
		blake_user: Uuid::new_v4(),
	};

	for (agent_id, user_id, name) in [
		(fixture.avery, fixture.avery_user, "Avery Quinn"),
		(fixture.blake, fixture.blake_user, "Blake Rowe"),
	] {
		sqlx::query(
			"\
INSERT INTO agent_profiles (agent_id, org_id, user_id, display_name)
VALUES ($1, $2, $3, $4)",
		)
		.bind(agent_id)
		.bind(fixture.org_id)
		.bind(user_id)
		.bind(name)
		.execute(&db.pool)
		.await
		.expect("Failed to insert profile.");
	}

	let now = OffsetDateTime::now_utc();

	// Avery: converting buyer-heavy agent concentrated in FL single-family.
	for idx in 0..10_i64 {
		let converted =
			if idx < 3 { Some(now - Duration::days(20 + idx)) } else { None };

		sqlx::query(
			"\
INSERT INTO leads (org_id, agent_id, lead_type, status, created_at, last_activity_at, converted_at)
VALUES ($1, $2, $3, $4, $5, $6, $7)",
		)
		.bind(fixture.org_id)
		.bind(fixture.avery)
		.bind(if idx < 8 { "buyer" } else { "seller" })
		.bind(if converted.is_some() { "converted" } else { "working" })
		.bind(now - Duration::days(100 + idx))
		.bind(Some(now - Duration::days(10)))
		.bind(converted)
		.execute(&db.pool)
		.await
		.expect("Failed to insert lead.");
	}
	for _ in 0..6 {
		sqlx::query(
			"\
INSERT INTO listings (org_id, agent_id, status, state, property_type, created_at)
VALUES ($1, $2, 'active', 'FL', 'single family', $3)",
		)
		.bind(fixture.org_id)
		.bind(fixture.avery)
		.bind(now - Duration::days(120))
		.execute(&db.pool)
		.await
		.expect("Failed to insert listing.");
	}
	for price in [450_000.0_f64, 520_000.0] {
		sqlx::query(
			"\
INSERT INTO transactions (org_id, agent_id, status, close_price, closed_at)
VALUES ($1, $2, 'closed', $3, $4)",
		)
		.bind(fixture.org_id)
		.bind(fixture.avery)
		.bind(price)
		.bind(now - Duration::days(60))
		.execute(&db.pool)
		.await
		.expect("Failed to insert closing.");
	}

	// Blake has no activity at all.
	fixture
}

async fn test_service() -> Option<(TestDatabase, CadenceService, Fixture)> {
	let Some(base_dsn) = cadence_testkit::env_dsn() else {
		eprintln!("Skipping acceptance test; set CADENCE_PG_DSN to run.");

		return None;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = test_config(test_db.dsn().to_string());
	let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let fixture = seed_crm(&db).await;
	let service = CadenceService::new(cfg, db);

	Some((test_db, service, fixture))
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CADENCE_PG_DSN to run."]
async fn recompute_then_read_paths() {
	let Some((test_db, service, fixture)) = test_service().await else {
		return;
	};
	let report = service
		.recompute_organization(fixture.org_id)
		.await
		.expect("Recompute must succeed.");

	assert_eq!(report.agents_total, 2);
	assert_eq!(report.agents_scored, 2);
	assert_eq!(report.agents_failed, 0);
	assert!(!report.partial);

	let avery = service
		.latest_indicator(fixture.org_id, fixture.avery, true)
		.await
		.expect("Indicator read must succeed.")
		.expect("Avery must have an indicator.");

	assert!(avery.overall_score > 0.0 && avery.overall_score <= 1.0);
	assert!(avery.feature_summary.is_some());

	let blake = service
		.latest_indicator(fixture.org_id, fixture.blake, false)
		.await
		.expect("Indicator read must succeed.")
		.expect("Blake must have an indicator.");

	assert_eq!(blake.band, "DEVELOPING");
	assert!(blake.feature_summary.is_none());
	assert!(avery.overall_score > blake.overall_score);

	// Second generation: history grows, pointer moves.
	service
		.recompute_organization(fixture.org_id)
		.await
		.expect("Second recompute must succeed.");

	let trend = service
		.trend(fixture.org_id, fixture.avery, 30, false)
		.await
		.expect("Trend read must succeed.");

	assert_eq!(trend.points.len(), 2);
	assert!(trend.points[0].created_at <= trend.points[1].created_at);

	let page = service
		.leaderboard(fixture.org_id, LeaderboardParams { page: 1, limit: 10, ..Default::default() })
		.await
		.expect("Leaderboard must succeed.");

	assert_eq!(page.total, 2);
	assert_eq!(page.items[0].display_name, "Avery Quinn");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CADENCE_PG_DSN to run."]
async fn context_fit_caches_by_normalized_context() {
	let Some((test_db, service, fixture)) = test_service().await else {
		return;
	};
	let request = |city: &str, state: &str| ContextFitRequest {
		actor_user_id: fixture.avery_user,
		actor_role: ActorRole::Agent,
		context: FitRequestContext {
			lead_type: Some("BUYER".to_string()),
			city: Some(city.to_string()),
			state: Some(state.to_string()),
			postal_code: None,
			property_type: Some("Single Family".to_string()),
			price: Some(500_000.0),
			price_band: None,
		},
	};
	let first = service
		.context_fit(fixture.org_id, fixture.avery, request("Miami", "FL"))
		.await
		.expect("First context fit must succeed.");

	assert!(!first.cached);
	assert!(first.fit_score > 0.0 && first.fit_score <= 1.0);

	let second = service
		.context_fit(fixture.org_id, fixture.avery, request(" miami ", " fl "))
		.await
		.expect("Second context fit must succeed.");

	assert!(second.cached);
	assert_eq!(second.context_key, first.context_key);
	assert_eq!(second.fit_score, first.fit_score);

	let denied = service
		.context_fit(fixture.org_id, fixture.blake, request("Miami", "FL"))
		.await;

	assert!(matches!(denied, Err(cadence_service::Error::AccessDenied { .. })));

	let missing = service
		.context_fit(
			fixture.org_id,
			Uuid::new_v4(),
			ContextFitRequest {
				actor_user_id: fixture.avery_user,
				actor_role: ActorRole::Broker,
				context: FitRequestContext::default(),
			},
		)
		.await;

	assert!(matches!(missing, Err(cadence_service::Error::NotFound { .. })));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

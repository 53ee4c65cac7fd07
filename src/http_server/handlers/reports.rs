use crate::{
    records::{format_date, parse_date},
    reports::{ReportCache, ReportStore},
    tabulator::Tabulator,
};
use actix_web::{error, web, web::Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub accumulate: bool,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// One `time` column followed by the report columns; every row starts with
/// its date.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ReportResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl From<&Tabulator> for ReportResponse {
    fn from(report: &Tabulator) -> Self {
        let columns = std::iter::once("time".to_string())
            .chain(report.columns())
            .collect();
        let rows = report
            .rows()
            .map(|(timestamp, values)| {
                std::iter::once(Value::from(format_date(&timestamp)))
                    .chain(values.into_iter().map(Value::from))
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }
}

fn parse_bound(bound: Option<&str>) -> Result<Option<DateTime<Utc>>, actix_web::Error> {
    bound
        .map(|bound| parse_date(bound).map_err(error::ErrorBadRequest))
        .transpose()
}

pub async fn list(store: web::Data<ReportStore>) -> Json<Vec<String>> {
    Json(store.keys())
}

pub async fn get(
    store: web::Data<ReportStore>,
    cache: web::Data<ReportCache>,
    name: web::Path<String>,
    query: web::Query<ReportQuery>,
) -> Result<Json<ReportResponse>, actix_web::Error> {
    let name = name.into_inner();
    let query = query.into_inner();
    let from = parse_bound(query.from.as_deref())?;
    let to = parse_bound(query.to.as_deref())?;

    let (version, report) = store.get_versioned(&name).map_err(error::ErrorNotFound)?;
    let report = match query.accumulate {
        false => report,
        true => cache
            .maybe_generate_versioned(&format!("{name}-cumulative"), version, || async move {
                let mut cumulative = Tabulator::clone(&report);
                cumulative.accumulate();
                Ok::<_, Infallible>(cumulative)
            })
            .await
            .map_err(error::ErrorInternalServerError)?,
    };

    if from.is_none() && to.is_none() {
        return Ok(Json(ReportResponse::from(&*report)));
    }
    let mut filtered = Tabulator::clone(&report);
    filtered.filter(from, to);
    tracing::debug!(report = %name, rows = filtered.len(), "serving filtered report");
    Ok(Json(ReportResponse::from(&filtered)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        http_server::{configure_router, AppRouter},
        metrics::Metrics,
        tests::date,
    };
    use actix_web::{http::StatusCode, test, App};
    use pretty_assertions::assert_eq;
    use prometheus::Registry;
    use serde_json::json;
    use std::{sync::Arc, time::Duration};

    fn store() -> Arc<ReportStore> {
        let store = ReportStore::new();
        let mut report = Tabulator::with_columns(["Flanders", "Brussels"]);
        report.set(date("2022-01-01"), "Flanders", 10.0);
        report.set(date("2022-01-01"), "Brussels", 5.0);
        report.set(date("2022-01-02"), "Flanders", 3.0);
        report.set(date("2022-01-03"), "Brussels", 1.0);
        store.put("cases-ByRegion", report);
        store.put("cases-Total", Tabulator::with_columns(["total"]));
        Arc::new(store)
    }

    fn router(store: Arc<ReportStore>) -> AppRouter {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry).unwrap();
        let cache = Arc::new(ReportCache::new(Duration::from_secs(60), metrics));
        AppRouter::new(store, cache, registry)
    }

    async fn get_json(router: &AppRouter, uri: &str) -> (StatusCode, Option<ReportResponse>) {
        let app = test::init_service(App::new().configure(configure_router(router))).await;
        let response =
            test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        let status = response.status();
        let body = test::read_body(response).await;
        (status, serde_json::from_slice(&body).ok())
    }

    #[actix_web::test]
    async fn serves_report() {
        let router = router(store());
        let (status, body) = get_json(&router, "/api/v1/reports/cases-ByRegion").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::to_value(body.unwrap()).unwrap(),
            json!({
                "columns": ["time", "Brussels", "Flanders"],
                "rows": [
                    ["2022-01-01", 5.0, 10.0],
                    ["2022-01-02", 0.0, 3.0],
                    ["2022-01-03", 1.0, 0.0],
                ],
            })
        );
    }

    #[actix_web::test]
    async fn serves_accumulated_filtered_report() {
        let router = router(store());
        let (status, body) = get_json(
            &router,
            "/api/v1/reports/cases-ByRegion?accumulate=true&from=2022-01-02&to=2022-01-03",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body.unwrap().rows,
            vec![
                vec![json!("2022-01-02"), json!(5.0), json!(13.0)],
                vec![json!("2022-01-03"), json!(6.0), json!(13.0)],
            ]
        );

        // the stored report is not touched
        let (_, body) = get_json(&router, "/api/v1/reports/cases-ByRegion").await;
        assert_eq!(
            body.unwrap().rows[1],
            vec![json!("2022-01-02"), json!(0.0), json!(3.0)]
        );
    }

    #[actix_web::test]
    async fn accumulated_report_follows_updates() {
        let store = Arc::new(ReportStore::new());
        let router = router(store.clone());
        let mut report = Tabulator::with_columns(["total"]);
        report.set(date("2022-01-01"), "total", 1.0);
        store.put("cases-Total", report.clone());

        let uri = "/api/v1/reports/cases-Total?accumulate=true";
        let (_, body) = get_json(&router, uri).await;
        assert_eq!(body.unwrap().rows, vec![vec![json!("2022-01-01"), json!(1.0)]]);

        report.set(date("2022-01-02"), "total", 4.0);
        store.put("cases-Total", report);
        let (status, body) = get_json(&router, uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body.unwrap().rows,
            vec![
                vec![json!("2022-01-01"), json!(1.0)],
                vec![json!("2022-01-02"), json!(5.0)],
            ]
        );
    }

    #[actix_web::test]
    async fn lists_reports() {
        let router = router(store());
        let app = test::init_service(App::new().configure(configure_router(&router))).await;
        let keys: Vec<String> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/v1/reports").to_request(),
        )
        .await;
        assert_eq!(keys, vec!["cases-ByRegion", "cases-Total"]);
    }

    #[actix_web::test]
    async fn errors() {
        let router = router(store());
        let test_cases = [
            ("/api/v1/reports/unknown", StatusCode::NOT_FOUND),
            ("/api/v1/reports/unknown?accumulate=true", StatusCode::NOT_FOUND),
            ("/api/v1/reports/cases-Total?from=yesterday", StatusCode::BAD_REQUEST),
            ("/api/v1/reports/cases-Total?to=2022-13-01", StatusCode::BAD_REQUEST),
            ("/api/v1/reports/cases-Total?accumulate=maybe", StatusCode::BAD_REQUEST),
        ];
        for (uri, expected) in test_cases {
            let (status, _) = get_json(&router, uri).await;
            assert_eq!(status, expected, "{uri}");
        }
    }

    #[actix_web::test]
    async fn health_and_metrics() {
        let router = router(store());
        let app = test::init_service(App::new().configure(configure_router(&router))).await;

        let response =
            test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);

        test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/v1/reports/cases-Total?accumulate=true")
                .to_request(),
        )
        .await;
        let body = test::call_and_read_body(
            &app,
            test::TestRequest::get().uri("/metrics").to_request(),
        )
        .await;
        let body = String::from_utf8(body.to_vec()).unwrap();
        let expected = r#"covid_stats_cache_requests_total{result="miss"} 1"#;
        assert!(body.contains(expected), "body doesn't have string {expected}:\n{body}");
    }
}

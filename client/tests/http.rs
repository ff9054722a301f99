use std::time::Duration;
use telemetry_client::{ClientError, InfluxConfig, Point, QueryClient, SchemaConfig, SeriesQuery, TelemetrySource};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> QueryClient {
    let config = InfluxConfig {
        url: server.uri(),
        org: "WFR".into(),
        token: "test-token".into(),
        request_timeout_ms: 2_000,
    };
    QueryClient::new(config, SchemaConfig::default()).unwrap()
}

#[tokio::test]
async fn sends_authenticated_flux_and_parses_signal_names() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/query"))
        .and(query_param("org", "WFR"))
        .and(header("authorization", "Token test-token"))
        .and(header("content-type", "application/vnd.flux"))
        .and(header("accept", "application/csv"))
        .and(body_string_contains("distinct(column: \"signalName\")"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            ",result,table,_value\r\n,_result,0,WheelSpeedFL\r\n,_result,1,WheelSpeedFR\r\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let names = client_for(&server)
        .fetch_signal_names(Duration::from_secs(86_400))
        .await
        .unwrap();
    assert_eq!(names, vec!["WheelSpeedFL", "WheelSpeedFR"]);
}

#[tokio::test]
async fn series_goes_through_the_trait_seam() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("r[\"signalName\"] == \"INV_Motor_Temp\""))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            ",result,table,_time,_value\n\
             ,mean,0,2024-01-01T00:00:00Z,61.5\n\
             ,mean,0,2024-01-01T00:00:01Z,oops\n\
             ,mean,0,2024-01-01T00:00:02Z,62\n",
        ))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let source: &dyn TelemetrySource = &client;
    let points = source.series(&SeriesQuery::live("INV_Motor_Temp", 60)).await.unwrap();
    assert_eq!(
        points,
        vec![Point::new(1_704_067_200_000, 61.5), Point::new(1_704_067_202_000, 62.0)]
    );

    let report = client
        .fetch_series_report(&SeriesQuery::live("INV_Motor_Temp", 60))
        .await
        .unwrap();
    assert_eq!(report.rejected.len(), 1);
}

#[tokio::test]
async fn non_success_status_becomes_query_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string(r#"{"code":"unauthorized","message":"unauthorized access"}"#),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fetch_series(&SeriesQuery::live("X", 10))
        .await
        .unwrap_err();
    match err {
        ClientError::Query { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "unauthorized access");
        }
        other => panic!("expected query error, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_error_body_falls_back_to_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client_for(&server).execute("from(bucket: \"x\")").await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert!(err.to_string().contains("Service Unavailable"));
}

#[tokio::test]
async fn unreachable_store_is_a_transport_error() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    drop(server);

    let err = client.execute("from(bucket: \"x\")").await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn invalid_query_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fetch_series(&SeriesQuery::live("", 10))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Build(_)));
}

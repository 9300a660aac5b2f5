//! The web app end to end: real HTTP into `copyhub_web::app`, backed by the
//! mock backend.

use std::net::SocketAddr;
use std::path::PathBuf;

use copyhub_integration_tests::{MockBackend, PASSWORD, expired_token};
use copyhub_web::config::WebConfig;
use copyhub_web::state::AppState;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_SECURITY_POLICY, COOKIE, LOCATION, SET_COOKIE};

struct TestSite {
    url: String,
    http: reqwest::Client,
    mock: MockBackend,
    handle: tokio::task::JoinHandle<()>,
}

impl TestSite {
    async fn start() -> Self {
        let mock = MockBackend::start().await;
        let mut config = WebConfig::new("http://127.0.0.1:3000/", mock.config()).unwrap();
        config.static_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../web/static");
        let app = copyhub_web::app(AppState::new(config).unwrap());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        Self {
            url: format!("http://{addr}"),
            http,
            mock,
            handle,
        }
    }

    fn at(&self, path: &str) -> String {
        format!("{}{path}", self.url)
    }
}

impl Drop for TestSite {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok().map(ToString::to_string))
        .collect()
}

fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_health() {
    let site = TestSite::start().await;
    let response = site.http.get(site.at("/health")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_home_lists_agencies_under_csp() {
    let site = TestSite::start().await;
    let response = site.http.get(site.at("/")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let csp = response
        .headers()
        .get(CONTENT_SECURITY_POLICY)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(csp.contains("'nonce-"), "script nonce missing from {csp}");

    let body = response.text().await.unwrap();
    assert!(body.contains("Print Point"));
    assert!(body.contains("Copy Corner"));
}

#[tokio::test]
async fn test_home_survives_backend_failure() {
    let site = TestSite::start().await;
    for _ in 0..4 {
        site.mock.state.script(
            "agencies",
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "message": "boom" }),
        );
    }

    let response = site.http.get(site.at("/")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.text().await.unwrap().contains("Print Point"));
}

#[tokio::test]
async fn test_account_requires_sign_in() {
    let site = TestSite::start().await;
    let response = site.http.get(site.at("/account")).send().await.unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/auth/login?next=%2Faccount");
}

#[tokio::test]
async fn test_login_sets_token_cookies() {
    let site = TestSite::start().await;
    let response = site
        .http
        .post(site.at("/auth/login"))
        .form(&[("email", "fan@example.com"), ("password", PASSWORD), ("next", "/agencies")])
        .send()
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/agencies");
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("accessToken=") && c.contains("HttpOnly")));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=refresh-1")));
}

#[tokio::test]
async fn test_rejected_login_returns_to_form() {
    let site = TestSite::start().await;
    let response = site
        .http
        .post(site.at("/auth/login"))
        .form(&[("email", "fan@example.com"), ("password", "wrong")])
        .send()
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/auth/login?error=credentials");
    assert!(
        !set_cookies(&response).iter().any(|c| c.starts_with("accessToken=")),
        "no tokens for a failed login"
    );
}

#[tokio::test]
async fn test_lapsed_cookie_is_refreshed() {
    let site = TestSite::start().await;
    let response = site
        .http
        .get(site.at("/"))
        .header(
            COOKIE,
            format!("accessToken={}; refreshToken=refresh-0", expired_token()),
        )
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(site.mock.state.hits("refresh"), 1);
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=refresh-1")));
}

#[tokio::test]
async fn test_rejected_refresh_clears_cookies() {
    let site = TestSite::start().await;
    site.mock.state.allow_refresh(false);
    let response = site
        .http
        .get(site.at("/"))
        .header(
            COOKIE,
            format!("accessToken={}; refreshToken=stale", expired_token()),
        )
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=;")));
    assert!(cookies.iter().any(|c| c.starts_with("accessToken=;")));
}

#[tokio::test]
async fn test_checkout_landings() {
    let site = TestSite::start().await;

    let paid = site
        .http
        .get(site.at("/checkout/success?session_id=cs_test_123"))
        .send()
        .await
        .unwrap();
    assert_eq!(paid.status(), StatusCode::OK);
    assert!(paid.text().await.unwrap().contains("Payment received"));

    let canceled = site
        .http
        .get(site.at("/checkout/cancel?payment_canceled=true"))
        .send()
        .await
        .unwrap();
    assert!(canceled.text().await.unwrap().contains("Payment canceled"));
}

#[tokio::test]
async fn test_back_office_requires_staff() {
    let site = TestSite::start().await;
    let response = site.http.get(site.at("/manage/orders")).send().await.unwrap();

    assert!(response.status().is_redirection());
    assert!(location(&response).starts_with("/auth/login"));
}

#[tokio::test]
async fn test_stylesheet_is_served() {
    let site = TestSite::start().await;
    let response = site.http.get(site.at("/static/css/main.css")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains(".badge--pending"));
}

#![allow(clippy::unwrap_used)]
// Integration tests for `GpsClient` against a wiremock portal.

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use trackline_api::{Credentials, Endpoints, Error, GpsClient, Refresh, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

const ACCOUNT: &str = "4242";
const SESSION_COOKIE_HEADER: &str = "accepted_cookies=true; _iadmin=ABC123";

fn page_with_csrf(token: &str) -> String {
    format!(
        "<html><head><meta name=\"csrf-param\" content=\"authenticity_token\" />\
         <meta name=\"csrf-token\" content=\"{token}\" /></head><body></body></html>"
    )
}

fn client_for(server: &MockServer) -> GpsClient {
    let base = Url::parse(&server.uri()).unwrap();
    let http = TransportConfig::default().build_client().unwrap();
    GpsClient::with_client(
        http,
        Credentials::new("parent@example.com", "hunter2".to_string().into()),
        "",
        Endpoints::with_base(base),
    )
}

async fn setup() -> (MockServer, GpsClient) {
    let server = MockServer::start().await;
    let client = client_for(&server);
    (server, client)
}

async fn mount_login_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/auth/users/sign_in"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "_iadmin=PREAUTH; path=/; HttpOnly")
                .set_body_raw(page_with_csrf("tok-login"), "text/html"),
        )
        .mount(server)
        .await;
}

/// Login page, successful credential submit, and the account redirect.
async fn mount_login(server: &MockServer) {
    mount_login_page(server).await;

    Mock::given(method("POST"))
        .and(path("/auth/users/sign_in"))
        .and(header("cookie", "accepted_cookies=true; _iadmin=PREAUTH"))
        .and(body_string_contains("authenticity_token=tok-login"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "/")
                .insert_header("set-cookie", "_iadmin=ABC123; path=/; HttpOnly"),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("cookie", SESSION_COOKIE_HEADER))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "/users/4242/devices"),
        )
        .mount(server)
        .await;
}

fn device_list() -> serde_json::Value {
    json!([
        { "device": {
            "uuid": "0a078c6a-6433-4439-9e5e-5f9726e54f2a",
            "name": "Emma",
            "serial_number": "865000000000001",
            "status": "GPS",
            "simcard": { "tariff_type": "prepaid", "balance_cents": 1250 },
            "last_location": { "latitude": 52.0907, "longitude": 5.1214, "battery_percentage": 87 }
        }},
        { "device": {
            "uuid": "7b5d9a10-1111-4222-8333-944455556666",
            "name": "Noah",
            "last_location": { "latitude": "51.9225", "longitude": "4.4792" }
        }}
    ])
}

async fn mount_device_list(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/users/4242/devices"))
        .and(header("accept", "application/json"))
        .and(header("cookie", SESSION_COOKIE_HEADER))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_list()))
        .with_priority(1)
        .mount(server)
        .await;
}

async fn mount_device_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/users/4242/devices"))
        .and(header("cookie", SESSION_COOKIE_HEADER))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(page_with_csrf("tok-page"), "text/html"),
        )
        .with_priority(2)
        .mount(server)
        .await;
}

async fn requests(server: &MockServer) -> Vec<Request> {
    server.received_requests().await.unwrap()
}

fn count(reqs: &[Request], verb: &str, p: &str) -> usize {
    reqs.iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == p)
        .count()
}

fn body(r: &Request) -> String {
    String::from_utf8_lossy(&r.body).into_owned()
}

// ── Install / login ─────────────────────────────────────────────────

#[tokio::test]
async fn test_install_discovers_account() {
    let (server, mut client) = setup().await;
    mount_login(&server).await;

    let account = client.install().await.unwrap();

    assert_eq!(account, ACCOUNT);
    assert_eq!(client.account_id(), ACCOUNT);
    assert!(client.is_logged_in());
    assert_eq!(client.session().csrf_token(), Some("tok-login"));

    let reqs = requests(&server).await;
    let login_post = reqs
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .unwrap();
    let form = body(login_post);
    assert!(form.contains("user%5Blogin%5D=parent%40example.com"), "{form}");
    assert!(form.contains("user%5Bpassword%5D=hunter2"), "{form}");
    assert!(form.contains("gdpr=1"), "{form}");
    assert!(form.contains("user%5Bremember_me%5D=1"), "{form}");
}

#[tokio::test]
async fn test_login_captures_exact_session_cookie() {
    let (server, mut client) = setup().await;
    mount_login(&server).await;
    mount_device_list(&server).await;

    client.install().await.unwrap();
    // The device list mock only matches `_iadmin=ABC123` verbatim.
    let refresh = client.fetch_devices().await.unwrap();
    assert!(refresh.is_success(), "got {refresh:?}");
}

#[tokio::test]
async fn test_login_rejected_without_redirect() {
    let (server, mut client) = setup().await;
    mount_login_page(&server).await;

    Mock::given(method("POST"))
        .and(path("/auth/users/sign_in"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "_iadmin=NOPE; path=/")
                .set_body_raw(page_with_csrf("tok-again"), "text/html"),
        )
        .mount(&server)
        .await;

    let result = client.login().await;

    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert!(!client.is_logged_in());
    assert_eq!(client.session().csrf_token(), None);
}

#[tokio::test]
async fn test_login_redirect_without_cookie_is_rejected() {
    let (server, mut client) = setup().await;
    mount_login_page(&server).await;

    Mock::given(method("POST"))
        .and(path("/auth/users/sign_in"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/auth/users/sign_in"))
        .mount(&server)
        .await;

    let result = client.install().await;

    assert!(matches!(result, Err(Error::Authentication { .. })));
    assert!(!client.is_logged_in());
}

#[tokio::test]
async fn test_login_page_unavailable() {
    let (server, mut client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/auth/users/sign_in"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    match client.install().await {
        Err(Error::Authentication { message }) => {
            assert!(message.contains("Login page unavailable"), "got: {message}");
        }
        other => panic!("expected Authentication error, got: {other:?}"),
    }
    assert_eq!(count(&requests(&server).await, "POST", "/auth/users/sign_in"), 0);
}

#[tokio::test]
async fn test_missing_account_redirect_fails_install() {
    let (server, mut client) = setup().await;
    mount_login_page(&server).await;

    Mock::given(method("POST"))
        .and(path("/auth/users/sign_in"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "/")
                .insert_header("set-cookie", "_iadmin=ABC123; path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
        .mount(&server)
        .await;

    let result = client.install().await;

    assert!(matches!(result, Err(Error::Authentication { .. })));
    assert!(!client.is_logged_in(), "half-finished install must not keep a session");
}

#[tokio::test]
async fn test_root_redirect_to_login_page_fails_install() {
    let (server, mut client) = setup().await;
    mount_login_page(&server).await;

    Mock::given(method("POST"))
        .and(path("/auth/users/sign_in"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "/")
                .insert_header("set-cookie", "_iadmin=ABC123; path=/"),
        )
        .mount(&server)
        .await;
    // The portal did not honour the fresh cookie and bounces back to login.
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "/auth/users/sign_in"),
        )
        .mount(&server)
        .await;

    let result = client.install().await;

    assert!(matches!(result, Err(Error::Authentication { .. })), "got {result:?}");
    assert!(!client.is_logged_in());
    assert_eq!(client.account_id(), "");
}

#[tokio::test]
async fn test_unreachable_portal_is_transport_error() {
    let base = Url::parse("http://127.0.0.1:9/").unwrap();
    let mut client = GpsClient::with_client(
        TransportConfig::default().build_client().unwrap(),
        Credentials::new("parent@example.com", "hunter2".to_string().into()),
        "",
        Endpoints::with_base(base),
    );

    let err = client.install().await.unwrap_err();

    assert!(matches!(err, Error::Transport(_)), "got: {err:?}");
    assert!(err.is_transient());
}

// ── Update ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_update_unwraps_device_wrappers() {
    let (server, mut client) = setup().await;
    mount_login(&server).await;
    mount_device_list(&server).await;

    let devices = client.update().await.unwrap().into_devices();

    let wrappers = device_list();
    let expected: Vec<&str> = wrappers
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["device"]["uuid"].as_str().unwrap())
        .collect();
    let got: Vec<&str> = devices.iter().map(|d| d.uuid.as_str()).collect();
    assert_eq!(got, expected);
    assert_eq!(devices[0].last_location.battery_percentage, Some(87));
    assert_eq!(devices[1].last_location.latitude, Some(51.9225));
}

#[tokio::test]
async fn test_update_twice_reuses_session_and_is_stable() {
    let (server, mut client) = setup().await;
    mount_login(&server).await;
    mount_device_list(&server).await;

    let first = client.update().await.unwrap();
    let second = client.update().await.unwrap();

    assert_eq!(first, second);
    let reqs = requests(&server).await;
    assert_eq!(count(&reqs, "POST", "/auth/users/sign_in"), 1);
    assert_eq!(count(&reqs, "GET", "/users/4242/devices"), 2);
}

#[tokio::test]
async fn test_rejected_fetch_clears_session_and_relogs() {
    let (server, mut client) = setup().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/users/4242/devices"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_device_list(&server).await;

    let first = client.update().await.unwrap();
    assert_eq!(first, Refresh::SessionExpired { status: 401 });
    assert!(!client.is_logged_in());
    assert_eq!(client.session().csrf_token(), None);

    let second = client.update().await.unwrap();
    assert_eq!(second.into_devices().len(), 2);

    let reqs = requests(&server).await;
    assert_eq!(count(&reqs, "GET", "/auth/users/sign_in"), 2);
    assert_eq!(count(&reqs, "POST", "/auth/users/sign_in"), 2);

    // The second login happens between the two device-list fetches.
    let paths: Vec<(String, String)> = reqs
        .iter()
        .map(|r| (r.method.to_string(), r.url.path().to_owned()))
        .collect();
    let first_fetch = paths
        .iter()
        .position(|(m, p)| m == "GET" && p == "/users/4242/devices")
        .unwrap();
    let relogin = paths
        .iter()
        .skip(first_fetch)
        .position(|(m, p)| m == "POST" && p == "/auth/users/sign_in");
    assert!(relogin.is_some(), "no login after rejected fetch: {paths:?}");
}

#[tokio::test]
async fn test_forbidden_fetch_is_session_expired() {
    let (server, mut client) = setup().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/users/4242/devices"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let refresh = client.update().await.unwrap();

    assert_eq!(refresh, Refresh::SessionExpired { status: 403 });
    assert!(!client.is_logged_in());
}

#[tokio::test]
async fn test_html_instead_of_json_is_session_expired() {
    let (server, mut client) = setup().await;
    mount_login(&server).await;
    mount_device_page(&server).await;

    let refresh = client.update().await.unwrap();

    assert_eq!(refresh, Refresh::SessionExpired { status: 200 });
    assert!(!client.is_logged_in());
}

#[tokio::test]
async fn test_malformed_json_is_soft_failure() {
    let (server, mut client) = setup().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/users/4242/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("[{\"device\":", "application/json"))
        .mount(&server)
        .await;

    let refresh = client.update().await.unwrap();

    assert!(matches!(refresh, Refresh::Malformed { .. }), "got {refresh:?}");
    assert!(client.is_logged_in(), "parse errors keep the session");
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_force_locate_refreshes_csrf_then_posts() {
    let (server, mut client) = setup().await;
    mount_login(&server).await;
    mount_device_page(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/devices/0a078c6a/functions"))
        .and(header("cookie", SESSION_COOKIE_HEADER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    client.install().await.unwrap();
    let before = requests(&server).await.len();

    assert!(client.force_locate("0a078c6a").await.unwrap());

    let reqs = requests(&server).await;
    let issued = &reqs[before..];
    assert_eq!(issued.len(), 2, "expected one GET and one POST");
    assert_eq!(issued[0].method.as_str(), "GET");
    assert_eq!(issued[0].url.path(), "/users/4242/devices");
    assert_eq!(issued[1].method.as_str(), "POST");

    let form = body(&issued[1]);
    assert!(form.contains("function%5Bcode%5D=0039"), "{form}");
    assert!(form.contains("authenticity_token=tok-page"), "{form}");
    assert!(!form.contains("cmd_value"), "{form}");
    assert_eq!(client.session().csrf_token(), Some("tok-page"));
}

#[tokio::test]
async fn test_send_command_value_fields() {
    let (server, mut client) = setup().await;
    mount_login(&server).await;
    mount_device_page(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/devices/abc/functions"))
        .respond_with(ResponseTemplate::new(422).set_body_string("unprocessable"))
        .mount(&server)
        .await;

    client.install().await.unwrap();

    // Remote rejection still reports success: business errors are not interpreted.
    assert!(client.send_command("abc", "0077", Some("5"), None).await.unwrap());
    assert!(
        client
            .send_command("abc", "0078", Some("+31600000000"), Some("function[phone]"))
            .await
            .unwrap()
    );

    let reqs = requests(&server).await;
    let posts: Vec<String> = reqs
        .iter()
        .filter(|r| r.url.path() == "/api/devices/abc/functions")
        .map(body)
        .collect();
    assert_eq!(posts.len(), 2);
    assert!(posts[0].contains("function%5Bcmd_value%5D%5B%5D=5"), "{}", posts[0]);
    assert!(posts[1].contains("function%5Bphone%5D=%2B31600000000"), "{}", posts[1]);
    assert!(!posts[1].contains("cmd_value"), "{}", posts[1]);
}

#[tokio::test]
async fn test_send_message() {
    let (server, mut client) = setup().await;
    mount_login(&server).await;
    mount_device_page(&server).await;

    Mock::given(method("POST"))
        .and(path("/devices/abc/messages"))
        .and(body_string_contains("device_message%5Bmessage%5D=Come+home"))
        .and(body_string_contains("authenticity_token=tok-page"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/devices/abc"))
        .expect(1)
        .mount(&server)
        .await;

    client.install().await.unwrap();
    assert!(client.send_message("abc", "Come home").await.unwrap());
}

#[tokio::test]
async fn test_command_after_lost_session_posts_nothing() {
    let (server, mut client) = setup().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/users/4242/devices"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "/auth/users/sign_in"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/devices/0a078c6a/functions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    client.install().await.unwrap();

    for _ in 0..2 {
        let result = client.force_locate("0a078c6a").await;
        assert!(matches!(result, Err(Error::CsrfUnavailable { .. })), "got {result:?}");
    }
    assert!(!client.is_logged_in());
    assert!(client.session().csrf_token().is_none());

    let reqs = requests(&server).await;
    assert_eq!(count(&reqs, "GET", "/users/4242/devices"), 2);
    assert_eq!(count(&reqs, "POST", "/api/devices/0a078c6a/functions"), 0);
}

#[tokio::test]
async fn test_device_page_without_token_drops_spent_token() {
    let (server, mut client) = setup().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/users/4242/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    client.install().await.unwrap();
    assert_eq!(client.session().csrf_token(), Some("tok-login"));

    let result = client.send_message("abc", "Come home").await;

    assert!(matches!(result, Err(Error::CsrfUnavailable { .. })), "got {result:?}");
    assert!(client.session().csrf_token().is_none());
    assert_eq!(count(&requests(&server).await, "POST", "/devices/abc/messages"), 0);
}

// ── Close ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_close_is_idempotent_and_final() {
    let (server, mut client) = setup().await;
    mount_login(&server).await;

    client.close();
    client.close();
    assert!(client.is_closed());

    let result = client.update().await;
    assert!(matches!(result, Err(Error::Closed)), "got {result:?}");
    assert!(requests(&server).await.is_empty());
}

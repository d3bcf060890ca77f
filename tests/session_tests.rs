// 面板会话 HTTP 层测试
//
// 使用 wiremock 模拟面板，覆盖登录 cookie 拼接、重试预算与响应校验

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use panel_checker::session::CallOutcome;
use panel_checker::{PanelDescriptor, PanelKind, PanelSession};

fn panel_for(server: &MockServer) -> PanelDescriptor {
    PanelDescriptor {
        name: "Mock_Panel".to_string(),
        url: server.uri(),
        username: "admin".to_string(),
        password: "secret".to_string(),
        kind: PanelKind::Premium,
    }
}

#[tokio::test]
async fn login_joins_all_session_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("username=admin"))
        .and(body_string_contains("password=secret"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "session=abc123; Path=/; HttpOnly")
                .append_header("set-cookie", "lang=en; Max-Age=172800"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = PanelSession::new().unwrap();
    let outcome = session.login(&panel_for(&server)).await;

    // 每个 cookie 截断到第一个分号，按 "; " 拼接
    match outcome {
        CallOutcome::Success(token) => assert_eq!(token, "session=abc123; lang=en"),
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn login_without_cookie_yields_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200))
        // NoData 同样会被重试，预算为 3 次尝试
        .expect(3)
        .mount(&server)
        .await;

    let session = PanelSession::new().unwrap();
    let outcome = session.login(&panel_for(&server)).await;
    assert!(matches!(outcome, CallOutcome::NoData));
}

#[tokio::test]
async fn login_failure_exhausts_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(403))
        .expect(3)
        .mount(&server)
        .await;

    let session = PanelSession::new().unwrap();
    let outcome = session.login(&panel_for(&server)).await;
    assert!(matches!(outcome, CallOutcome::Transport(_)));
}

#[tokio::test]
async fn invoke_attaches_session_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/xui/inbound/list"))
        .and(header("cookie", "session=abc123"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "obj": [] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = PanelSession::new().unwrap();
    let outcome = session
        .invoke(&server.uri(), "session=abc123", "xui/inbound/list", None)
        .await;

    let response = outcome.into_option().expect("expected success");
    assert_eq!(response["success"], json!(true));
}

#[tokio::test]
async fn invoke_treats_success_less_body_as_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/xui/inbound/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "obj": [] })))
        .expect(3)
        .mount(&server)
        .await;

    let session = PanelSession::new().unwrap();
    let outcome = session
        .invoke(&server.uri(), "session=abc123", "xui/inbound/list", None)
        .await;
    assert!(matches!(outcome, CallOutcome::NoData));
}

#[tokio::test]
async fn invoke_forwards_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/xui/inbound/update"))
        .and(body_string_contains("\"enable\":false"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "success": true })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = PanelSession::new().unwrap();
    let body = json!({ "enable": false });
    let outcome = session
        .invoke(&server.uri(), "session=abc123", "xui/inbound/update", Some(&body))
        .await;
    assert!(outcome.is_success());
}

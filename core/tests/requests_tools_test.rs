mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{ScriptedModel, Stage};
use trellis_core::prompt::templates::REQUESTS_GET_TOOL_DESCRIPTION;
use trellis_core::tools::{
    RequestsDeleteTool, RequestsGetTool, RequestsPostTool, MAX_RESPONSE_LENGTH,
};
use trellis_core::{DeleteAuthorization, RequestsWrapper, Tool, ToolError};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn requests(server: &MockServer) -> RequestsWrapper {
    RequestsWrapper::new(
        &[("x-api-key".to_string(), "secret".to_string())],
        Duration::from_secs(5),
    )
    .unwrap()
    .with_base_url(&server.uri())
    .unwrap()
}

#[tokio::test]
async fn get_contract_round_trips_through_the_tool() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id": 7, "name": "Ada"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let contract = r#"{"url": "/user", "params": {}, "output_instructions": "return the user id"}"#;
    for key in ["\"url\"", "\"params\"", "\"output_instructions\""] {
        assert!(REQUESTS_GET_TOOL_DESCRIPTION.contains(key));
    }

    let llm = Arc::new(ScriptedModel::new().script(Stage::Extractor, &["7"]));
    let tool = RequestsGetTool::new(requests(&server), llm.clone());
    assert_eq!(tool.call(contract).await.unwrap(), "7");

    let prompts = llm.prompts(Stage::Extractor);
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(r#"{"id": 7, "name": "Ada"}"#));
    assert!(prompts[0].contains("according to these instructions: return the user id"));
}

#[tokio::test]
async fn get_sends_params_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("trending", "true"))
        .and(query_param("limit", "3"))
        .and(wiremock::matchers::header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[1, 2, 3]"))
        .expect(1)
        .mount(&server)
        .await;

    let llm = Arc::new(ScriptedModel::new().script(Stage::Extractor, &["ids 1, 2, 3"]));
    let tool = RequestsGetTool::new(requests(&server), llm);
    let out = tool
        .call("```json\n{\"url\": \"/items\", \"params\": {\"trending\": true, \"limit\": 3}, \"output_instructions\": \"item ids\"}\n```")
        .await
        .unwrap();
    assert_eq!(out, "ids 1, 2, 3");
}

#[tokio::test]
async fn post_sends_data_as_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users/7/cart"))
        .and(body_json(serde_json::json!({"items": [1, 2]})))
        .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"cart_id": 42}"#))
        .expect(1)
        .mount(&server)
        .await;

    let llm = Arc::new(ScriptedModel::new().script(Stage::Extractor, &["cart 42"]));
    let tool = RequestsPostTool::new(requests(&server), llm);
    let out = tool
        .call(r#"{"url": "/users/7/cart", "data": {"items": [1, 2]}, "output_instructions": "the cart id"}"#)
        .await
        .unwrap();
    assert_eq!(out, "cart 42");
}

#[tokio::test]
async fn error_statuses_reach_the_extractor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such user"))
        .mount(&server)
        .await;

    let llm = Arc::new(ScriptedModel::new().script(Stage::Extractor, &["The user was not found."]));
    let tool = RequestsGetTool::new(requests(&server), llm.clone());
    let out = tool
        .call(r#"{"url": "/user", "output_instructions": "the user id"}"#)
        .await
        .unwrap();
    assert_eq!(out, "The user was not found.");
    assert!(llm.prompts(Stage::Extractor)[0].contains("HTTP 404 Not Found\nno such user"));
}

#[tokio::test]
async fn long_responses_are_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(MAX_RESPONSE_LENGTH * 2)))
        .mount(&server)
        .await;

    let llm = Arc::new(ScriptedModel::new().script(Stage::Extractor, &["lots of x"]));
    let tool = RequestsGetTool::new(requests(&server), llm.clone());
    tool.call(r#"{"url": "/items", "output_instructions": "count"}"#)
        .await
        .unwrap();
    let prompt = &llm.prompts(Stage::Extractor)[0];
    assert!(prompt.contains(&"x".repeat(MAX_RESPONSE_LENGTH)));
    assert!(!prompt.contains(&"x".repeat(MAX_RESPONSE_LENGTH + 1)));
}

#[tokio::test]
async fn malformed_input_is_rejected_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tool = RequestsGetTool::new(requests(&server), Arc::new(ScriptedModel::new()));
    let err = tool.call("GET /user please").await.unwrap_err();
    assert!(matches!(err, ToolError::InvalidArguments(_)));
    let err = tool.call(r#"{"url": "/user"}"#).await.unwrap_err();
    assert!(matches!(err, ToolError::InvalidArguments(_)));
}

#[tokio::test]
async fn get_rejects_params_that_are_not_an_object() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tool = RequestsGetTool::new(requests(&server), Arc::new(ScriptedModel::new()));
    for params in [r#"["trending"]"#, r#""trending=true""#] {
        let input = format!(
            r#"{{"url": "/items", "params": {params}, "output_instructions": "item names"}}"#
        );
        let err = tool.call(&input).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)), "{params}");
    }
}

#[tokio::test]
async fn negated_request_does_not_unlock_delete() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    for request in [
        "Show my cart but do not delete anything",
        "don't remove my cart, just add a lamp",
    ] {
        let tool = RequestsDeleteTool::new(
            requests(&server),
            Arc::new(ScriptedModel::new()),
            Arc::new(DeleteAuthorization::from_request(request)),
        );
        let err = tool
            .call(r#"{"url": "/users/7/cart", "output_instructions": "confirm"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied(_)), "{request}");
    }
}

#[tokio::test]
async fn delete_is_refused_without_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let authorization = Arc::new(DeleteAuthorization::from_request("start a new cart"));
    let tool = RequestsDeleteTool::new(
        requests(&server),
        Arc::new(ScriptedModel::new()),
        authorization,
    );
    let err = tool
        .call(r#"{"url": "/users/7/cart", "output_instructions": "confirm"}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::PermissionDenied(_)));
}

#[tokio::test]
async fn delete_is_sent_once_confirmed() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/users/7/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"deleted": true}"#))
        .expect(1)
        .mount(&server)
        .await;

    let authorization = Arc::new(DeleteAuthorization::from_request("start a new cart"));
    authorization.confirm();
    let llm = Arc::new(ScriptedModel::new().script(Stage::Extractor, &["deleted"]));
    let tool = RequestsDeleteTool::new(requests(&server), llm, authorization);
    let out = tool
        .call(r#"{"url": "/users/7/cart", "output_instructions": "confirm"}"#)
        .await
        .unwrap();
    assert_eq!(out, "deleted");
}

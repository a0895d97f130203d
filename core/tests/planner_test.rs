mod common;

use std::sync::Arc;

use common::{shop_openapi, ScriptedModel, Stage};
use trellis_core::planner::StepKind;
use trellis_core::{ApiPlanner, DeleteAuthorization, Method, OperationCatalog};

const CART_PLAN_WITH_CHECK: &str = "1. GET /user to find the user's id\n2. DELETE required. Did user specify DELETE or previously authorize? Yes, proceed.\n3. DELETE /users/{id}/cart to delete the user's cart";
const CART_PLAN_BARE: &str = "1. GET /user to find the user's id\n2. DELETE /users/{id}/cart to clear the old cart\n3. POST /users/{id}/cart to create a new cart";

fn catalog() -> OperationCatalog {
    OperationCatalog::from_openapi_str(&shop_openapi("https://shop.example.com")).unwrap()
}

async fn plan_for(request: &str, reply: &str) -> trellis_core::Plan {
    let llm = Arc::new(ScriptedModel::new().script(Stage::Planner, &[reply]));
    let planner = ApiPlanner::new(llm, &catalog()).unwrap();
    planner
        .plan(request, &DeleteAuthorization::from_request(request))
        .await
        .unwrap()
}

#[tokio::test]
async fn prompt_lists_every_endpoint() {
    let llm = Arc::new(ScriptedModel::new().script(Stage::Planner, &["1. GET /user to find the user"]));
    let planner = ApiPlanner::new(llm.clone(), &catalog()).unwrap();
    planner
        .plan("who am I?", &DeleteAuthorization::new())
        .await
        .unwrap();

    let prompts = llm.prompts(Stage::Planner);
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("- GET /user Get the current user\n"));
    assert!(prompts[0].contains("- DELETE /users/{id}/cart Delete the user's cart"));
    assert!(prompts[0].contains("User query: who am I?"));
}

#[tokio::test]
async fn explicit_delete_requests_keep_deletion_without_authorization_line() {
    for request in [
        "I'd like to delete my cart",
        "Please remove everything in my cart",
        "Wipe my shopping cart",
    ] {
        let plan = plan_for(request, CART_PLAN_WITH_CHECK).await;
        assert!(
            plan.has_destructive_call(),
            "deletion step dropped for {request:?}"
        );
        assert!(
            plan.steps.iter().all(|s| !s.is_authorization_check()),
            "authorization line kept for {request:?}"
        );
        assert!(!plan.needs_confirmation());
    }
}

#[tokio::test]
async fn implicit_deletions_are_preceded_by_an_authorization_request() {
    for request in ["I want to start a new cart", "Can you reset my shopping cart?"] {
        let plan = plan_for(request, CART_PLAN_BARE).await;
        let delete_at = plan
            .steps
            .iter()
            .position(|s| s.is_destructive_call())
            .unwrap();
        assert_eq!(
            plan.steps[delete_at - 1].kind,
            StepKind::AuthorizationCheck { granted: false },
            "no authorization request before deletion for {request:?}"
        );
        assert!(plan.needs_confirmation());
    }
}

#[tokio::test]
async fn negated_or_unrelated_deletions_still_need_authorization() {
    let resources = catalog().delete_resources();
    for request in [
        "Show my cart but do not delete anything",
        "don't remove my cart, just add a lamp",
        "Remove a lamp from my cart",
    ] {
        let llm = Arc::new(ScriptedModel::new().script(Stage::Planner, &[CART_PLAN_BARE]));
        let planner = ApiPlanner::new(llm, &catalog()).unwrap();
        let authorization = DeleteAuthorization::from_request_scoped(request, &resources);
        let plan = planner.plan(request, &authorization).await.unwrap();
        assert!(
            plan.render().contains(
                "2. DELETE required. Did user specify DELETE or previously authorize? No, ask for authorization.\n3. DELETE /users/{id}/cart"
            ),
            "no authorization request for {request:?}"
        );
        assert!(plan.needs_confirmation());
    }
}

#[tokio::test]
async fn confirmed_requests_proceed() {
    let request = "I want to start a new cart";
    let llm = Arc::new(ScriptedModel::new().script(Stage::Planner, &[CART_PLAN_BARE]));
    let planner = ApiPlanner::new(llm, &catalog()).unwrap();
    let authorization = DeleteAuthorization::from_request(request);
    authorization.confirm();

    let plan = planner.plan(request, &authorization).await.unwrap();
    assert!(plan
        .render()
        .contains("2. DELETE required. Did user specify DELETE or previously authorize? Yes, proceed.\n3. DELETE /users/{id}/cart"));
    assert!(!plan.needs_confirmation());
}

#[tokio::test]
async fn out_of_domain_requests_are_refused() {
    let plan = plan_for(
        "tell me a joke",
        "Sorry, this API's domain is shopping, not comedy.",
    )
    .await;
    assert!(plan.is_refusal());
    assert_eq!(plan.calls().count(), 0);
    assert_eq!(plan.render(), "Sorry, this API's domain is shopping, not comedy.");
}

#[tokio::test]
async fn rendered_plan_names_calls_in_order() {
    let plan = plan_for(
        "add trending items to my cart",
        "Plan: 1) GET /items with params 'trending' is 'True'\n2) GET /user to get user\n3) POST /users/{id}/cart to add the items",
    )
    .await;
    let calls: Vec<_> = plan.calls().map(|(m, p)| (*m, p.to_string())).collect();
    assert_eq!(
        calls,
        vec![
            (Method::Get, "/items".to_string()),
            (Method::Get, "/user".to_string()),
            (Method::Post, "/users/{id}/cart".to_string()),
        ]
    );
    assert!(plan.render().starts_with("1. GET /items"));
}

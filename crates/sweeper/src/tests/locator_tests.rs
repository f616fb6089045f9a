use super::mock_surface::{
    chat_url, confirm_dialog, document_with_rows, kebab_id, menu_overlay, node, Mutation,
    MockSurface, MENU_BASE,
};
use crate::context::RunContext;
use crate::errors::AutomationError;
use crate::profile;
use crate::selector::Predicate;
use crate::snapshot::NodeId;
use crate::surface::{DocumentSurface, SyntheticInput};
use crate::types::EngineConfig;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

fn fast_config() -> EngineConfig {
    EngineConfig {
        step_timeout_ms: 400,
        poll_interval_ms: 20,
        retry_delay_ms: 10,
        inter_target_delay_ms: 0,
        jitter_range_ms: (0, 0),
        ..Default::default()
    }
}

async fn ctx_for(mock: &Arc<MockSurface>) -> RunContext {
    let url = Url::parse(&chat_url("abc123")).unwrap();
    let session = mock.ensure_session(&url).await.unwrap();
    RunContext {
        surface: mock.clone(),
        session,
        config: Arc::new(fast_config()),
        profile: profile::resolve(&[]),
    }
}

fn delete_item_predicate(ctx: &RunContext) -> Predicate {
    Predicate::TextPattern(&ctx.profile.menu_item)
}

#[tokio::test]
async fn invisible_candidates_are_never_returned() {
    super::init_tracing();
    let mut root = node(0, "document");
    root.bounds = (0.0, 0.0, 1280.0, 800.0);

    let mut zero_area = node(1, "button");
    zero_area.text = Some("Delete".into());
    zero_area.bounds = (10.0, 10.0, 0.0, 0.0);
    root.children.push(zero_area);

    let mut disabled = node(2, "button");
    disabled.text = Some("Delete".into());
    disabled.disabled = true;
    root.children.push(disabled);

    let mut suppressed = node(3, "button");
    suppressed.text = Some("Delete".into());
    suppressed.visibility_hidden = true;
    root.children.push(suppressed);

    let mock = Arc::new(MockSurface::new(&chat_url("abc123"), root));
    let ctx = ctx_for(&mock).await;

    let snapshot = ctx.capture().await.unwrap();
    let found = ctx
        .locator(delete_item_predicate(&ctx))
        .all_in(&snapshot);
    assert!(found.is_empty(), "matched: {found:?}");
}

#[tokio::test]
async fn non_interactive_text_is_not_a_candidate() {
    let mut root = node(0, "document");
    root.bounds = (0.0, 0.0, 1280.0, 800.0);
    let mut label = node(1, "generic");
    label.text = Some("Delete".into());
    root.children.push(label);

    let mock = Arc::new(MockSurface::new(&chat_url("abc123"), root));
    let ctx = ctx_for(&mock).await;
    let snapshot = ctx.capture().await.unwrap();
    assert!(ctx
        .locator(delete_item_predicate(&ctx))
        .all_in(&snapshot)
        .is_empty());
}

#[tokio::test]
async fn higher_stacking_order_outranks_document_order() {
    let mut root = node(0, "document");
    root.bounds = (0.0, 0.0, 1280.0, 800.0);
    // Menu first, dialog second; the dialog's layer is higher even though
    // both confirm-ish labels match.
    root.children.push(menu_overlay(MENU_BASE, "Delete"));
    root.children.push(confirm_dialog(300, "Delete"));

    let mock = Arc::new(MockSurface::new(&chat_url("abc123"), root));
    let ctx = ctx_for(&mock).await;
    let snapshot = ctx.capture().await.unwrap();

    let ranked = ctx
        .locator(Predicate::TextPattern(&ctx.profile.confirm))
        .all_in(&snapshot);
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].node, NodeId(303));
    assert_eq!(ranked[0].stacking_order, 200);
}

#[tokio::test]
async fn equal_stacking_order_prefers_later_document_order() {
    let mut root = node(0, "document");
    root.bounds = (0.0, 0.0, 1280.0, 800.0);
    root.children.push(confirm_dialog(300, "Delete"));
    root.children.push(confirm_dialog(400, "Delete"));

    let mock = Arc::new(MockSurface::new(&chat_url("abc123"), root));
    let ctx = ctx_for(&mock).await;
    let snapshot = ctx.capture().await.unwrap();

    let ranked = ctx
        .locator(Predicate::TextPattern(&ctx.profile.confirm))
        .all_in(&snapshot);
    // Same layer: the most recently mounted dialog wins.
    assert_eq!(ranked[0].node, NodeId(403));
}

#[tokio::test]
async fn search_descends_into_embedded_documents() {
    let mut root = node(0, "document");
    root.bounds = (0.0, 0.0, 1280.0, 800.0);
    let mut host = node(1, "group");
    let mut embedded = node(2, "document");
    embedded.bounds = (0.0, 0.0, 400.0, 300.0);
    let mut button = node(3, "button");
    button.text = Some("Delete".into());
    embedded.children.push(button);
    host.subdocument = Some(Box::new(embedded));
    root.children.push(host);

    let mock = Arc::new(MockSurface::new(&chat_url("abc123"), root));
    let ctx = ctx_for(&mock).await;
    let snapshot = ctx.capture().await.unwrap();

    let found = ctx
        .locator(delete_item_predicate(&ctx))
        .all_in(&snapshot);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].node, NodeId(3));
}

#[tokio::test]
async fn scoped_search_stays_inside_the_matching_row() {
    let document = document_with_rows(&[("abc123", "Quarterly notes"), ("def456", "Groceries")]);
    let mock = Arc::new(MockSurface::new(&chat_url("abc123"), document));
    let ctx = ctx_for(&mock).await;
    let snapshot = ctx.capture().await.unwrap();

    let scope = Predicate::Has(Box::new(Predicate::attr_contains("href", "/c/def456")));
    let found = ctx
        .locator(Predicate::IconShape)
        .within(scope)
        .all_in(&snapshot);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].node, kebab_id(1));
}

#[tokio::test(start_paused = true)]
async fn waiting_lookup_sees_late_mounted_overlays() {
    let document = document_with_rows(&[("abc123", "Quarterly notes")]);
    let mock = Arc::new(MockSurface::new(&chat_url("abc123"), document));
    mock.schedule(
        Duration::from_millis(120),
        Mutation::AppendOverlay(menu_overlay(MENU_BASE, "Delete")),
    );
    let ctx = ctx_for(&mock).await;

    let handle = ctx
        .locator(delete_item_predicate(&ctx))
        .first()
        .await
        .unwrap();
    assert_eq!(handle.node, NodeId(MENU_BASE + 2));
}

#[tokio::test(start_paused = true)]
async fn waiting_lookup_times_out_with_element_missing() {
    let document = document_with_rows(&[("abc123", "Quarterly notes")]);
    let mock = Arc::new(MockSurface::new(&chat_url("abc123"), document));
    let ctx = ctx_for(&mock).await;

    let started = tokio::time::Instant::now();
    let err = ctx
        .locator(delete_item_predicate(&ctx))
        .with_timeout(Duration::from_millis(200))
        .first()
        .await
        .unwrap_err();
    assert!(matches!(err, AutomationError::ElementMissing(_)));
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn dispatch_through_a_stale_handle_is_rejected() {
    let document = document_with_rows(&[("abc123", "Quarterly notes")]);
    let mock = Arc::new(MockSurface::new(&chat_url("abc123"), document));
    let ctx = ctx_for(&mock).await;

    let snapshot = ctx.capture().await.unwrap();
    let handle = ctx
        .locator(Predicate::IconShape)
        .all_in(&snapshot)
        .into_iter()
        .next()
        .unwrap();

    // The document re-renders (a fresh capture) after the handle was
    // minted: the handle must not be usable anymore.
    let _ = ctx.capture().await.unwrap();
    let err = ctx
        .surface
        .dispatch(ctx.session, handle.node_ref(), SyntheticInput::Click)
        .await
        .unwrap_err();
    assert!(matches!(err, AutomationError::StaleHandle { .. }));
}

//! Dispatch, pagination and typed operations through the manager.

mod common;

use anyhow::Result;
use common::{harness, id};
use mcpi_core::{
    Category, InspectorError, InspectorEvent, ListCategory, LoggingLevel, RequestEnvelope,
    ResponseShape, RpcError, TransportError, TypedResponse,
};
use serde_json::json;
use std::collections::BTreeMap;

#[tokio::test]
async fn test_dispatch_on_stopped_server_never_reaches_transport() -> Result<()> {
    let h = harness(&["a"]);

    let result = h
        .manager
        .dispatch(
            &id("a"),
            RequestEnvelope::new("ping", ResponseShape::Empty, Category::None),
        )
        .await;

    assert!(matches!(result, Err(InspectorError::NotConnected(_))));
    assert_eq!(h.server("a").open_count(), 0);
    assert!(h.server("a").sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_tools_listing_pages_through_cursor() -> Result<()> {
    let h = harness(&["a"]);
    h.server("a").paginate(
        "tools/list",
        "tools",
        vec![
            vec![json!({"name": "t1"}), json!({"name": "t2"})],
            vec![json!({"name": "t3"})],
        ],
    );
    h.manager.activate(&id("a")).await?;

    let first = h.manager.list_page(&id("a"), ListCategory::Tools).await?;
    assert_eq!(first.next_cursor.as_deref(), Some("c1"));
    let state = h.manager.pagination(&id("a"), ListCategory::Tools)?;
    assert_eq!(state.accumulated().len(), 2);
    assert_eq!(state.next_cursor(), Some("c1"));

    h.manager.list_page(&id("a"), ListCategory::Tools).await?;
    let state = h.manager.pagination(&id("a"), ListCategory::Tools)?;
    let names: Vec<_> = state.accumulated().iter().map(|item| item.name()).collect();
    assert_eq!(names, vec!["t1", "t2", "t3"]);
    assert_eq!(state.next_cursor(), None);
    assert_eq!(h.manager.total_tools(), 3);
    Ok(())
}

#[tokio::test]
async fn test_clear_then_list_reproduces_first_page() -> Result<()> {
    let h = harness(&["a"]);
    let server = h.server("a");
    server.paginate(
        "resources/list",
        "resources",
        vec![
            vec![json!({"uri": "file:///a", "name": "a"})],
            vec![json!({"uri": "file:///b", "name": "b"})],
        ],
    );
    server.reply("prompts/list", json!({"prompts": [{"name": "greet"}]}));
    h.manager.activate(&id("a")).await?;

    h.manager.list_page(&id("a"), ListCategory::Resources).await?;
    h.manager.list_page(&id("a"), ListCategory::Resources).await?;
    h.manager.list_page(&id("a"), ListCategory::Prompts).await?;
    h.manager.clear_list(&id("a"), ListCategory::Resources)?;

    let resources = h.manager.pagination(&id("a"), ListCategory::Resources)?;
    assert!(resources.accumulated().is_empty());
    assert!(!resources.has_more());
    // Other listings are untouched
    assert_eq!(
        h.manager
            .pagination(&id("a"), ListCategory::Prompts)?
            .accumulated()
            .len(),
        1
    );

    h.manager.list_page(&id("a"), ListCategory::Resources).await?;
    let resources = h.manager.pagination(&id("a"), ListCategory::Resources)?;
    let names: Vec<_> = resources.accumulated().iter().map(|item| item.name()).collect();
    assert_eq!(names, vec!["a"]);
    assert_eq!(resources.next_cursor(), Some("c1"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_category_failure_does_not_touch_other_categories_or_servers() -> Result<()> {
    let h = harness(&["a", "b"]);
    h.server("a").reply_error(
        "tools/list",
        TransportError::Rpc(RpcError::new(-32603, "internal error")),
    );
    h.server("a").reply("resources/list", json!({"resources": []}));
    h.server("b").reply("tools/list", json!({"tools": [{"name": "ok"}]}));
    h.manager.select_all().await?;

    let a = id("a");
    let (tools, resources) = tokio::join!(
        h.manager.list_page(&a, ListCategory::Tools),
        h.manager.list_page(&a, ListCategory::Resources),
    );
    assert!(matches!(tools, Err(InspectorError::Transport { .. })));
    assert!(resources.is_ok());

    assert!(h.manager.category_error(&id("a"), Category::Tools)?.is_some());
    assert!(h.manager.category_error(&id("a"), Category::Resources)?.is_none());

    h.manager.list_page(&id("b"), ListCategory::Tools).await?;
    assert!(h.manager.category_error(&id("b"), Category::Tools)?.is_none());
    assert_eq!(h.manager.total_tools(), 1);
    Ok(())
}

#[tokio::test]
async fn test_category_error_events_only_on_change() -> Result<()> {
    let mut h = harness(&["a"]);
    h.server("a").reply_error("prompts/list", TransportError::Io("reset".into()));
    h.manager.activate(&id("a")).await?;
    h.drain_events();

    let _ = h.manager.list_page(&id("a"), ListCategory::Prompts).await;
    let _ = h.manager.list_page(&id("a"), ListCategory::Prompts).await;

    let category_events: Vec<_> = h
        .drain_events()
        .into_iter()
        .filter(|event| matches!(event, InspectorEvent::CategoryErrorChanged { .. }))
        .collect();
    assert_eq!(category_events.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_tool_calls_carry_increasing_progress_tokens() -> Result<()> {
    let h = harness(&["a"]);
    h.server("a").reply(
        "tools/call",
        json!({"content": [{"type": "text", "text": "echo: hi"}]}),
    );
    h.manager.activate(&id("a")).await?;

    let result = h
        .manager
        .call_tool(&id("a"), "echo", json!({"message": "hi"}))
        .await?;
    assert_eq!(result.first_text(), Some("echo: hi"));
    h.manager.call_tool(&id("a"), "echo", json!({})).await?;

    let tokens: Vec<_> = h
        .server("a")
        .sent_for("tools/call")
        .iter()
        .map(|request| request.params.as_ref().unwrap()["_meta"]["progressToken"].clone())
        .collect();
    assert_eq!(tokens, vec![json!(1), json!(2)]);

    let slot = h.manager.snapshot(&id("a"))?.content.tool_result.unwrap();
    assert_eq!(slot.0, "echo");
    Ok(())
}

#[tokio::test]
async fn test_single_value_reads_overwrite_content_slots() -> Result<()> {
    let h = harness(&["a"]);
    let server = h.server("a");
    server.reply(
        "resources/read",
        json!({"contents": [{"uri": "file:///one", "text": "1"}]}),
    );
    server.reply(
        "resources/read",
        json!({"contents": [{"uri": "file:///two", "text": "2"}]}),
    );
    server.reply(
        "prompts/get",
        json!({"messages": [{"role": "user", "content": {"type": "text", "text": "Hello Ada"}}]}),
    );
    h.manager.activate(&id("a")).await?;

    h.manager.read_resource(&id("a"), "file:///one").await?;
    h.manager.read_resource(&id("a"), "file:///two").await?;
    let args = BTreeMap::from([("name".to_string(), "Ada".to_string())]);
    let prompt = h.manager.get_prompt(&id("a"), "greet", args).await?;
    assert_eq!(prompt.messages.len(), 1);

    let content = h.manager.snapshot(&id("a"))?.content;
    let (uri, resource) = content.resource.unwrap();
    assert_eq!(uri, "file:///two");
    assert_eq!(resource.contents[0]["text"], "2");
    assert_eq!(content.prompt.unwrap().0, "greet");

    let sent = server.sent_for("prompts/get");
    assert_eq!(sent[0].params.as_ref().unwrap()["arguments"]["name"], "Ada");
    Ok(())
}

#[tokio::test]
async fn test_misc_operations_send_expected_params() -> Result<()> {
    let h = harness(&["a"]);
    let server = h.server("a");
    server.reply("ping", json!({}));
    server.reply("logging/setLevel", json!({}));
    server.reply("resources/subscribe", json!({}));
    server.reply("resources/unsubscribe", json!({}));
    server.reply(
        "completion/complete",
        json!({"completion": {"values": ["Ada", "Adam"], "hasMore": false}}),
    );
    h.manager.activate(&id("a")).await?;

    h.manager.ping(&id("a")).await?;
    h.manager.set_logging_level(&id("a"), LoggingLevel::Warning).await?;
    h.manager.subscribe_resource(&id("a"), "file:///log").await?;
    h.manager.unsubscribe_resource(&id("a"), "file:///log").await?;
    let completion = h
        .manager
        .complete(&id("a"), json!({"type": "ref/prompt", "name": "greet"}), "name", "Ad")
        .await?;

    assert_eq!(completion.completion.values, vec!["Ada", "Adam"]);
    assert_eq!(
        server.sent_for("logging/setLevel")[0].params,
        Some(json!({"level": "warning"}))
    );
    assert_eq!(
        server.sent_for("completion/complete")[0].params.as_ref().unwrap()["argument"],
        json!({"name": "name", "value": "Ad"})
    );
    assert_eq!(h.manager.history().entries_for(&id("a")).len(), 5);
    Ok(())
}

#[tokio::test]
async fn test_raw_dispatch_passes_any_shape_through() -> Result<()> {
    let h = harness(&["a"]);
    h.server("a").reply("custom/echo", json!([1, 2, 3]));
    h.manager.activate(&id("a")).await?;

    let response = h
        .manager
        .dispatch(
            &id("a"),
            RequestEnvelope::new("custom/echo", ResponseShape::Any, Category::None),
        )
        .await?;
    assert_eq!(response, TypedResponse::Raw(json!([1, 2, 3])));
    Ok(())
}

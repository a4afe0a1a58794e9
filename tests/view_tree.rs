mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{user_def, Journal, MockTransport};
use pagekit::data::{Model, SetOptions};
use pagekit::events::EventBus;
use pagekit::view::{
    ActionOutcome, DomEvent, ElementRef, MemoryTemplates, Stage, Template, TemplateRegistry, View,
    ViewDef, ViewError, ViewHooks,
};
use serde_json::json;

fn inline(name: &str, template: &str) -> ViewDef {
    ViewDef::new(name).template(Template::inline(template))
}

/// Hooks that log `<label>.<hook>`.
struct Recorder {
    label: &'static str,
    journal: Journal,
    fail_after_render: bool,
}

impl Recorder {
    fn new(label: &'static str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            label,
            journal: journal.clone(),
            fail_after_render: false,
        })
    }
}

#[async_trait(?Send)]
impl ViewHooks for Recorder {
    fn on_init(&self, _view: &View) -> anyhow::Result<()> {
        self.journal.push(format!("{}.init", self.label));
        Ok(())
    }

    async fn after_render(&self, _view: &View) -> anyhow::Result<()> {
        self.journal.push(format!("{}.after_render", self.label));
        if self.fail_after_render {
            anyhow::bail!("chart library missing");
        }
        Ok(())
    }

    async fn after_mount(&self, _view: &View) -> anyhow::Result<()> {
        self.journal.push(format!("{}.after_mount", self.label));
        Ok(())
    }

    async fn before_destroy(&self, _view: &View) -> anyhow::Result<()> {
        self.journal.push(format!("{}.before_destroy", self.label));
        Ok(())
    }
}

#[tokio::test]
async fn test_resolution_precedence() {
    let transport = MockTransport::new();
    let model = Model::new(user_def(), transport, json!({ "name": "Ann", "address": { "city": "Oslo" } }));
    let view = View::new(
        ViewDef::new("profile")
            .prop("title", json!("prop title"))
            .data("title", json!("data title"))
            .state("open", json!(true))
            .computed("title", |_| Ok(json!("computed title")))
            .computed("summary", |view| {
                let name = view.get("model.name").unwrap_or_default();
                Ok(json!(format!("{} / {}", name.as_str().unwrap_or(""), view.get("state.open").unwrap_or_default())))
            }),
    );
    view.bind_model(&model, false).unwrap();

    assert_eq!(view.get("title"), Some(json!("computed title")));
    assert_eq!(view.get("data.title"), Some(json!("data title")));
    assert_eq!(view.get("state.open"), Some(json!(true)));
    assert_eq!(view.get("model.address.city"), Some(json!("Oslo")));
    assert_eq!(view.get("summary"), Some(json!("Ann / true")));
    assert_eq!(view.get("data"), Some(json!({ "title": "data title" })));
    assert_eq!(view.get("missing"), None);
}

#[test]
fn test_computed_matches_whole_key_only() {
    let view = View::new(
        ViewDef::new("v")
            .prop("stats", json!({ "count": 2 }))
            .computed("stats", |_| Ok(json!({ "count": 99 }))),
    );
    assert_eq!(view.get("stats"), Some(json!({ "count": 99 })));
    assert_eq!(view.get("stats.count"), Some(json!(2)));
}

#[tokio::test]
async fn test_render_composes_children_into_slots() {
    let parent = View::new(inline("layout", "<main><slot id=\"nav\"></slot><slot id=\"body\"></slot></main>"));
    let nav = View::new(inline("nav", "<nav>{{label}}</nav>").data("label", json!("Home")));
    let body = View::new(inline("body", "<p>{{{html}}}</p>").data("html", json!("<b>hi</b>")));
    parent.add_child(&nav, Some("nav")).unwrap();
    parent.add_child(&body, Some("body")).unwrap();

    parent.render(Some("#app")).await.unwrap();

    assert_eq!(
        parent.html(),
        "<main><slot id=\"nav\"><nav>Home</nav></slot><slot id=\"body\"><p><b>hi</b></p></slot></main>"
    );
    assert_eq!(nav.container().as_deref(), Some("nav"));
    assert_eq!(parent.child_keys(), vec!["nav", "body"]);
}

#[tokio::test]
async fn test_failing_child_does_not_block_siblings() {
    let journal = Journal::new();
    let parent = View::new(inline("layout", "<slot id=\"a\"></slot><slot id=\"b\"></slot>"));
    let broken = View::new(inline("broken", "{{#if x}}never closed"));
    let healthy = View::new(inline("healthy", "ok").hooks(Recorder::new("healthy", &journal)));
    parent.add_child(&broken, Some("a")).unwrap();
    parent.add_child(&healthy, Some("b")).unwrap();

    parent.render(None).await.unwrap();

    assert!(!broken.is_rendered());
    assert!(healthy.is_rendered());
    assert_eq!(journal.count("healthy.after_render"), 1);
}

#[tokio::test]
async fn test_lifecycle_hook_order_and_failure() {
    let journal = Journal::new();
    let view = View::new(inline("v", "x").hooks(Recorder::new("v", &journal)));
    view.render(None).await.unwrap();
    view.render(None).await.unwrap();
    view.mount().await.unwrap();
    view.mount().await.unwrap();

    assert_eq!(
        journal.entries(),
        vec!["v.init", "v.after_render", "v.after_render", "v.after_mount"]
    );

    let failing = View::new(inline("chart", "x").hooks(Arc::new(Recorder {
        label: "chart",
        journal: journal.clone(),
        fail_after_render: true,
    })));
    let err = failing.render(None).await.unwrap_err();
    match err {
        ViewError::Stage { stage, message, .. } => {
            assert_eq!(stage, Stage::AfterRender);
            assert!(message.contains("chart library missing"));
        }
        other => panic!("expected stage error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_hierarchy_and_find_by_id() {
    let root = View::new(ViewDef::new("root"));
    let mid = View::new(ViewDef::new("mid"));
    let leaf = View::new(ViewDef::new("leaf"));
    root.add_child(&mid, Some("mid")).unwrap();
    mid.add_child(&leaf, None).unwrap();

    let chain: Vec<String> = leaf.get_hierarchy().iter().map(|v| v.name().to_string()).collect();
    assert_eq!(chain, vec!["root", "mid", "leaf"]);
    assert!(root.find_by_id(leaf.id()).unwrap().ptr_eq(&leaf));
    assert!(mid.child(leaf.id()).is_some());

    // Re-parenting detaches from the old parent.
    root.add_child(&leaf, Some("leaf")).unwrap();
    assert!(mid.children().is_empty());
    assert!(leaf.parent().unwrap().ptr_eq(&root));

    let removed = root.remove_child("leaf").unwrap();
    assert!(removed.parent().is_none());
    assert!(root.find_by_id(leaf.id()).is_none());
}

#[tokio::test]
async fn test_destroy_tears_down_subtree_once() {
    let journal = Journal::new();
    let root = View::new(inline("root", "<slot id=\"c\"></slot>").hooks(Recorder::new("root", &journal)));
    let child = View::new(inline("child", "c").hooks(Recorder::new("child", &journal)));
    root.add_child(&child, Some("c")).unwrap();
    root.render(None).await.unwrap();
    root.mount().await.unwrap();
    journal.clear();

    root.destroy().await;
    root.destroy().await;
    child.destroy().await;

    assert_eq!(journal.entries(), vec!["root.before_destroy", "child.before_destroy"]);
    assert!(root.is_destroyed());
    assert!(child.is_destroyed());
    assert!(root.children().is_empty());
    assert!(root.fragment().is_empty());
}

#[tokio::test]
async fn test_bound_model_marks_stale_until_refresh() {
    let transport = MockTransport::new();
    let model = Model::new(user_def(), transport, json!({ "id": 1, "name": "Ann" }));
    let view = View::new(inline("card", "<h2>{{model.name}}</h2>"));
    view.bind_model(&model, true).unwrap();
    view.render(None).await.unwrap();
    assert_eq!(view.fragment(), "<h2>Ann</h2>");

    model.set("name", json!("Bob"), SetOptions::default());
    assert!(view.is_stale());
    assert_eq!(view.fragment(), "<h2>Ann</h2>");
    assert!(view.refresh().await.unwrap());
    assert_eq!(view.fragment(), "<h2>Bob</h2>");
    assert_eq!(view.render_count(), 2);
    assert!(!view.refresh().await.unwrap());

    view.unbind_model();
    model.set("name", json!("Cy"), SetOptions::default());
    assert!(!view.is_stale());
    assert_eq!(model.bus().listener_count("change"), 0);
}

#[tokio::test]
async fn test_binding_does_not_keep_model_alive() {
    let transport = MockTransport::new();
    let view = View::new(ViewDef::new("v"));
    {
        let model = Model::new(user_def(), transport, json!({ "id": 1 }));
        view.bind_model(&model, true).unwrap();
        assert!(view.model().is_some());
    }
    assert!(view.model().is_none());
    assert_eq!(view.get("model.id"), None);
}

#[tokio::test]
async fn test_update_state_rerenders_on_request() {
    let view = View::new(inline("toggle", "{{#if state.open}}open{{else}}closed{{/if}}"));
    view.render(None).await.unwrap();
    assert_eq!(view.fragment(), "closed");

    view.update_state(json!({ "open": true }), false).await.unwrap();
    assert_eq!(view.fragment(), "closed");
    view.update_state(json!({ "open": true }), true).await.unwrap();
    assert_eq!(view.fragment(), "open");
}

#[tokio::test]
async fn test_each_block_renders_list() {
    let view = View::new(
        inline("list", "<ul>{{#each items}}<li>{{@index}}:{{name}}</li>{{/each}}</ul>")
            .data("items", json!([{ "name": "a" }, { "name": "<b>" }])),
    );
    view.render(None).await.unwrap();
    assert_eq!(view.fragment(), "<ul><li>0:a</li><li>1:&lt;b&gt;</li></ul>");
}

#[tokio::test]
async fn test_named_template_is_loaded_once() {
    let registry = TemplateRegistry::new(Arc::new(
        MemoryTemplates::new().with("greeting", "<p>Hello {{who}}</p>"),
    ));
    let a = View::with_context(
        ViewDef::new("a").template(Template::named("greeting")).data("who", json!("A")),
        EventBus::new(),
        registry.clone(),
    );
    let b = View::with_context(
        ViewDef::new("b").template(Template::named("greeting")).data("who", json!("B")),
        EventBus::new(),
        registry.clone(),
    );

    a.render(None).await.unwrap();
    assert!(registry.is_cached("greeting"));
    b.render(None).await.unwrap();
    assert_eq!(b.fragment(), "<p>Hello B</p>");

    let missing = View::with_context(
        ViewDef::new("m").template(Template::named("nope")),
        EventBus::new(),
        registry,
    );
    assert!(matches!(missing.render(None).await, Err(ViewError::Template(_))));
}

#[tokio::test]
async fn test_template_function_receives_view_data() {
    let view = View::new(
        ViewDef::new("fn")
            .data("count", json!(3))
            .template(Template::from_fn(|data| async move {
                Ok(format!("<span>{}</span>", data["count"]))
            })),
    );
    view.render(None).await.unwrap();
    assert_eq!(view.fragment(), "<span>3</span>");
}

#[tokio::test]
async fn test_delegate_dispatches_nearest_action() {
    let journal = Journal::new();
    let recorded = journal.clone();
    let view = View::new(inline("toolbar", "<button data-action=\"save\">Save</button>").action(
        "save",
        move |view, event, element| {
            let journal = recorded.clone();
            async move {
                journal.push(format!("{}:{}:{}", view.name(), event.kind, element.tag));
                Ok(())
            }
        },
    ));
    let click = DomEvent::new(
        "click",
        vec![
            ElementRef::new("span"),
            ElementRef::new("button").attr("data-action", "save"),
            ElementRef::new("div").attr("data-action", "outer"),
        ],
    );

    // Not mounted yet: no delegation.
    assert_eq!(view.delegate(&click).await.unwrap(), None);

    view.render(None).await.unwrap();
    view.mount().await.unwrap();
    assert_eq!(view.delegate(&click).await.unwrap(), Some(ActionOutcome::Handled));
    assert_eq!(journal.entries(), vec!["toolbar:click:button"]);

    let plain = DomEvent::new("click", vec![ElementRef::new("p")]);
    assert_eq!(view.delegate(&plain).await.unwrap(), None);
}

#[tokio::test]
async fn test_unhandled_action_emits_event() {
    let journal = Journal::new();
    let view = View::new(ViewDef::new("v").action("boom", |_, _, _| async {
        Err(anyhow::anyhow!("handler exploded"))
    }));
    journal.listen(view.bus(), &["action:show-modal"]);

    let element = ElementRef::new("a").attr("data-action", "show-modal");
    let event = DomEvent::new("click", vec![element.clone()]);
    let outcome = view.handle_action("show-modal", &event, &element).await.unwrap();
    assert_eq!(outcome, ActionOutcome::Unhandled);
    assert_eq!(journal.count("action:show-modal"), 1);

    let outcome = view.handle_action("boom", &event, &element).await.unwrap();
    assert!(matches!(outcome, ActionOutcome::Failed(message) if message.contains("handler exploded")));
}

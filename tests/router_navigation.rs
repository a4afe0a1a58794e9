mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{params, Journal, RecordingPageHooks};
use parking_lot::Mutex;
use pagekit::page::{Page, PageBuilder, PageHooks};
use pagekit::router::{
    HistoryMode, Location, NavigationOutcome, ParamMode, RouteMatch, Router, RouterError, RouterHooks,
};
use pagekit::view::{Stage, Template, ViewDef};
use serde_json::Value;

fn recording_page(builder: PageBuilder, journal: &Journal, template: &str) -> Page {
    let label = builder.name().to_string();
    builder
        .view(ViewDef::new(label.clone()).template(Template::inline(template)))
        .hooks(RecordingPageHooks::new(&label, journal))
        .build()
}

/// home `/`, about `/about`, user `/users/:id` in param mode.
fn demo_router(journal: &Journal) -> Router {
    let router = Router::builder(Box::new(ParamMode::default()))
        .container("#app")
        .build();
    let j = journal.clone();
    router
        .route("/", "home", move |b| recording_page(b, &j, "<h1>Home</h1>"))
        .unwrap();
    let j = journal.clone();
    router
        .route("/about", "about", move |b| recording_page(b, &j, "<h1>About</h1>"))
        .unwrap();
    let j = journal.clone();
    router
        .named_route("user", "/users/:id", "user", move |b| {
            recording_page(b, &j, "<h1>User {{params.id}}</h1>")
        })
        .unwrap();
    router
}

fn page_name(router: &Router) -> Option<String> {
    router.current_page().map(|p| p.page_name())
}

#[tokio::test]
async fn test_page_is_created_once_per_name() {
    let runs = Arc::new(AtomicUsize::new(0));
    let router = Router::builder(Box::new(HistoryMode)).build();
    let counter = runs.clone();
    router
        .route("/settings", "settings", move |b| {
            counter.fetch_add(1, Ordering::SeqCst);
            b.build()
        })
        .unwrap();

    let first = router.get_or_create_page("settings").unwrap();
    let second = router.get_or_create_page("settings").unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(router.cached_pages(), vec!["settings"]);
    assert!(matches!(
        router.get_or_create_page("ghost"),
        Err(RouterError::UnknownPage { .. })
    ));
}

#[tokio::test]
async fn test_leaving_and_returning_restores_page_state() {
    let journal = Journal::new();
    let router = demo_router(&journal);
    let events = Journal::new();
    events.listen(
        router.bus(),
        &["route:before", "page:deactivated", "page:activated", "page:changed", "route:after"],
    );

    assert!(router.start().await.is_completed());
    let home = router.current_page().unwrap();
    assert_eq!(home.fragment(), "<h1>Home</h1>");
    assert!(home.is_mounted());
    home.set_scroll(0, 300);
    home.set_form_value("q", "rust");

    assert!(router.navigate("/about").await.is_completed());
    assert_eq!(page_name(&router).as_deref(), Some("about"));
    assert!(!home.is_active());
    assert!(journal.position("home.exit") < journal.position("about.enter"));

    assert!(router.navigate("/").await.is_completed());
    let again = router.current_page().unwrap();
    assert!(again.ptr_eq(&home));
    assert_eq!(home.scroll().y, 300);
    assert_eq!(home.form_value("q").as_deref(), Some("rust"));
    assert_eq!(home.render_count(), 1);

    assert_eq!(
        journal.entries(),
        vec![
            "home.params",
            "home.enter",
            "home.exit",
            "about.params",
            "about.enter",
            "about.exit",
            "home.params",
            "home.enter",
        ]
    );
    assert_eq!(journal.count("about.enter"), 1);
    assert_eq!(events.count("route:after"), 3);
    assert_eq!(events.count("page:deactivated"), 2);
    assert!(events.position("page:activated") < events.position("page:changed"));
}

#[tokio::test]
async fn test_same_page_navigation_skips_exit_and_enter() {
    let journal = Journal::new();
    let router = demo_router(&journal);
    router.navigate("/users/1").await;
    let user = router.current_page().unwrap();
    assert_eq!(user.fragment(), "<h1>User 1</h1>");

    router.navigate("/users/2").await;
    assert!(router.current_page().unwrap().ptr_eq(&user));
    assert_eq!(user.fragment(), "<h1>User 2</h1>");
    assert_eq!(journal.count("user.enter"), 1);
    assert_eq!(journal.count("user.exit"), 0);
    assert_eq!(journal.count("user.params"), 2);
}

#[tokio::test]
async fn test_reserved_query_key_is_stripped() {
    let journal = Journal::new();
    let router = demo_router(&journal);

    let outcome = router.navigate("/users/7?tab=posts").await;
    assert!(matches!(outcome, NavigationOutcome::Completed { ref page, ref path } if page == "user" && path == "/users/7"));

    let user = router.current_page().unwrap();
    assert_eq!(user.params(), params(&[("id", "7")]));
    assert_eq!(user.query(), params(&[("tab", "posts")]));
    assert_eq!(router.current_path(), "/users/7");
    assert!(router.location().search.contains("tab=posts"));
}

#[tokio::test]
async fn test_unknown_path_emits_notfound() {
    let journal = Journal::new();
    let router = demo_router(&journal);
    router.start().await;
    let notfound = Journal::new();
    notfound.listen(router.bus(), &["route:notfound"]);

    let outcome = router.navigate("/missing").await;
    assert!(matches!(outcome, NavigationOutcome::NotFound { ref path } if path == "/missing"));
    assert_eq!(notfound.count("route:notfound"), 1);
    assert_eq!(page_name(&router).as_deref(), Some("home"));
    assert_eq!(router.history_len(), 1);
}

struct AdminGuard {
    errors: Mutex<Vec<String>>,
}

#[async_trait(?Send)]
impl RouterHooks for AdminGuard {
    async fn on_before_route(&self, path: &str, _matched: &RouteMatch) -> anyhow::Result<bool> {
        Ok(!path.starts_with("/about"))
    }

    fn on_error(&self, error: &RouterError) {
        self.errors.lock().push(error.to_string());
    }
}

#[tokio::test]
async fn test_guard_cancels_navigation() {
    let journal = Journal::new();
    let guard = Arc::new(AdminGuard {
        errors: Mutex::new(Vec::new()),
    });
    let router = Router::builder(Box::new(ParamMode::default()))
        .hooks(guard.clone())
        .build();
    let j = journal.clone();
    router.route("/", "home", move |b| recording_page(b, &j, "home")).unwrap();
    let j = journal.clone();
    router.route("/about", "about", move |b| recording_page(b, &j, "about")).unwrap();
    router.start().await;

    let outcome = router.navigate("/about").await;
    assert!(matches!(outcome, NavigationOutcome::Cancelled));
    assert_eq!(page_name(&router).as_deref(), Some("home"));
    assert!(router.page("about").is_none());
    assert_eq!(journal.count("home.exit"), 0);
    assert_eq!(router.history_len(), 1);
    assert!(!router.is_transitioning());
    assert!(guard.errors.lock().is_empty());
}

struct BrokenEnter;

#[async_trait(?Send)]
impl PageHooks for BrokenEnter {
    async fn on_enter(&self, _page: &Page) -> anyhow::Result<()> {
        anyhow::bail!("profile service offline")
    }
}

#[tokio::test]
async fn test_failing_hook_reports_route_error() {
    let guard = Arc::new(AdminGuard {
        errors: Mutex::new(Vec::new()),
    });
    let router = Router::builder(Box::new(HistoryMode)).hooks(guard.clone()).build();
    router
        .route("/profile", "profile", |b| b.hooks(Arc::new(BrokenEnter)).build())
        .unwrap();
    let payloads: Arc<Mutex<Vec<Value>>> = Arc::default();
    let sink = payloads.clone();
    router.bus().on("route:error", move |payload| {
        sink.lock().push(payload.clone());
        Ok(())
    });

    let outcome = router.navigate("/profile").await;
    match outcome {
        NavigationOutcome::Failed(RouterError::Stage { stage, .. }) => assert_eq!(stage, Stage::Enter),
        other => panic!("expected failed navigation, got {:?}", other),
    }

    let payloads = payloads.lock();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["path"], "/profile");
    assert_eq!(payloads[0]["stage"], "enter");
    assert!(payloads[0]["message"].as_str().unwrap().contains("profile service offline"));
    assert_eq!(payloads[0]["page"], "profile");
    assert_eq!(payloads[0]["match"]["pattern"], "/profile");
    assert_eq!(payloads[0]["match"]["page"], "profile");
    assert_eq!(guard.errors.lock().len(), 1);
    assert!(!router.is_transitioning());
    assert!(router.current_page().is_none());
    assert_eq!(router.location(), Location::default());
}

/// Navigates to `target` from inside its own enter hook.
struct Redirect {
    router: Router,
    target: &'static str,
    journal: Journal,
}

#[async_trait(?Send)]
impl PageHooks for Redirect {
    async fn on_enter(&self, page: &Page) -> anyhow::Result<()> {
        self.journal.push(format!("{}.enter", page.page_name()));
        let outcome = self.router.navigate(self.target).await;
        self.journal.push(format!("{:?}", outcome));
        Ok(())
    }
}

#[tokio::test]
async fn test_navigation_during_transition_is_queued() {
    let journal = Journal::new();
    let router = Router::builder(Box::new(HistoryMode)).build();
    let (handle, j) = (router.clone(), journal.clone());
    router
        .route("/old", "old", move |b| {
            b.hooks(Arc::new(Redirect {
                router: handle.clone(),
                target: "/new",
                journal: j.clone(),
            }))
            .build()
        })
        .unwrap();
    let j = journal.clone();
    router.route("/new", "new", move |b| recording_page(b, &j, "new")).unwrap();

    let outcome = router.navigate("/old").await;
    assert!(matches!(outcome, NavigationOutcome::Completed { ref page, .. } if page == "old"));
    assert_eq!(journal.entries(), vec!["old.enter", "Queued", "new.params", "new.enter"]);
    assert_eq!(page_name(&router).as_deref(), Some("new"));
    assert_eq!(router.current_path(), "/new");
    assert_eq!(router.history_len(), 3);
}

#[tokio::test]
async fn test_back_routes_previous_entry() {
    let journal = Journal::new();
    let router = demo_router(&journal);
    router.start().await;
    router.navigate("/about").await;
    assert_eq!(router.history_len(), 2);

    let outcome = router.back().await.unwrap();
    assert!(outcome.is_completed());
    assert_eq!(page_name(&router).as_deref(), Some("home"));
    assert!(router.back().await.is_none());
}

/// Lets navigations through only while open.
struct Gate {
    open: AtomicBool,
}

#[async_trait(?Send)]
impl RouterHooks for Gate {
    async fn on_before_route(&self, _path: &str, _matched: &RouteMatch) -> anyhow::Result<bool> {
        Ok(self.open.load(Ordering::SeqCst))
    }
}

#[tokio::test]
async fn test_cancelled_back_keeps_history_cursor() {
    let gate = Arc::new(Gate {
        open: AtomicBool::new(true),
    });
    let router = Router::builder(Box::new(HistoryMode)).hooks(gate.clone()).build();
    router.route("/a", "a", |b| b.build()).unwrap();
    router.route("/b", "b", |b| b.build()).unwrap();
    router.navigate("/a").await;
    router.navigate("/b").await;

    gate.open.store(false, Ordering::SeqCst);
    let outcome = router.back().await.unwrap();
    assert!(matches!(outcome, NavigationOutcome::Cancelled));
    assert_eq!(router.current_path(), "/b");
    assert_eq!(page_name(&router).as_deref(), Some("b"));

    gate.open.store(true, Ordering::SeqCst);
    assert!(router.back().await.unwrap().is_completed());
    assert_eq!(router.current_path(), "/a");
    assert_eq!(page_name(&router).as_deref(), Some("a"));
    assert_eq!(router.history_len(), 3);
}

struct BrokenExit;

#[async_trait(?Send)]
impl PageHooks for BrokenExit {
    async fn on_exit(&self, _page: &Page) -> anyhow::Result<()> {
        anyhow::bail!("unsaved draft")
    }
}

#[tokio::test]
async fn test_failed_exit_keeps_outgoing_page_active() {
    let router = Router::builder(Box::new(HistoryMode)).build();
    router
        .route("/editor", "editor", |b| b.hooks(Arc::new(BrokenExit)).build())
        .unwrap();
    router.route("/list", "list", |b| b.build()).unwrap();
    router.navigate("/editor").await;
    let editor = router.current_page().unwrap();
    editor.set_scroll(0, 500);
    editor.set_form_value("title", "draft");

    let outcome = router.navigate("/list").await;
    match outcome {
        NavigationOutcome::Failed(RouterError::Stage { stage, .. }) => assert_eq!(stage, Stage::Exit),
        other => panic!("expected failed navigation, got {:?}", other),
    }
    assert_eq!(page_name(&router).as_deref(), Some("editor"));
    assert!(editor.is_active());
    assert_eq!(editor.scroll().y, 500);
    assert_eq!(editor.form_value("title").as_deref(), Some("draft"));
    assert!(editor.saved_state().is_none());
    assert_eq!(router.current_path(), "/editor");
}

/// Queues `/queued` from its enter hook, then stalls.
struct Stall {
    router: Router,
}

#[async_trait(?Send)]
impl PageHooks for Stall {
    async fn on_enter(&self, _page: &Page) -> anyhow::Result<()> {
        self.router.navigate("/queued").await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(())
    }
}

#[tokio::test]
async fn test_abandoned_navigation_does_not_wedge_queue() {
    let journal = Journal::new();
    let router = Router::builder(Box::new(HistoryMode)).build();
    let handle = router.clone();
    router
        .route("/slow", "slow", move |b| {
            b.hooks(Arc::new(Stall { router: handle.clone() })).build()
        })
        .unwrap();
    let j = journal.clone();
    router.route("/queued", "queued", move |b| recording_page(b, &j, "queued")).unwrap();
    let j = journal.clone();
    router.route("/fast", "fast", move |b| recording_page(b, &j, "fast")).unwrap();

    let abandoned = tokio::time::timeout(Duration::from_millis(10), router.navigate("/slow")).await;
    assert!(abandoned.is_err());
    assert!(!router.is_transitioning());

    let outcome = router.navigate("/fast").await;
    assert!(matches!(outcome, NavigationOutcome::Completed { ref page, .. } if page == "fast"));
    assert!(journal.position("queued.enter") < journal.position("fast.enter"));
    assert_eq!(page_name(&router).as_deref(), Some("fast"));
    assert_eq!(router.current_path(), "/fast");
    assert_eq!(router.history_len(), 3);

    assert!(router.navigate("/queued").await.is_completed());
}

#[tokio::test]
async fn test_replace_keeps_history_length() {
    let journal = Journal::new();
    let router = demo_router(&journal);
    router.start().await;
    router.replace("/about").await;
    assert_eq!(router.history_len(), 1);
    assert_eq!(router.current_path(), "/about");
}

#[test]
fn test_url_for_named_route() {
    let router = Router::builder(Box::new(HistoryMode)).build();
    router
        .named_route("post", "/users/:id/posts/:postId", "post", |b| b.build())
        .unwrap();

    let url = router
        .url_for("post", &params(&[("id", "3"), ("postId", "9")]))
        .unwrap();
    assert_eq!(url, "/users/3/posts/9");
    assert!(router.url_for("post", &params(&[("id", "3")])).is_err());
    assert!(matches!(
        router.url_for("nope", &params(&[])),
        Err(RouterError::UnknownRoute { .. })
    ));
    assert!(matches!(
        router.named_route("post", "/other", "other", |b| b.build()),
        Err(RouterError::DuplicateRoute { .. })
    ));
}

#[test]
fn test_first_registered_route_wins() {
    let router = Router::builder(Box::new(HistoryMode)).build();
    router.route("/users/new", "new-user", |b| b.build()).unwrap();
    router.route("/users/:id", "user", |b| b.build()).unwrap();

    assert_eq!(router.match_route("/users/new").unwrap().page, "new-user");
    let matched = router.match_route("/users/5").unwrap();
    assert_eq!(matched.page, "user");
    assert_eq!(matched.params, params(&[("id", "5")]));
}

#[tokio::test]
async fn test_teardown_destroys_cached_pages() {
    let journal = Journal::new();
    let router = demo_router(&journal);
    router.start().await;
    router.navigate("/about").await;
    let home = router.page("home").unwrap();

    router.teardown().await;
    assert!(home.is_destroyed());
    assert!(router.cached_pages().is_empty());
    assert!(router.current_page().is_none());
}

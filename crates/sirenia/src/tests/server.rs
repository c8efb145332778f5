use super::support::{FLOWCHART, FakeLoader, count_warnings, shared_registry};
use crate::*;
use futures::FutureExt;
use futures::executor::block_on;
use futures::future::join_all;

fn assert_send_sync<T: Send + Sync>(_: &T) {}
fn assert_send<T: Send>(_: &T) {}

#[test]
fn nothing_loads_before_first_use() {
    let loader = FakeLoader::new();
    let renderer = ServerRenderer::new(shared_registry(), loader.clone());
    assert_send_sync(&renderer);

    assert_eq!(renderer.load_attempts(), 0);
    assert_eq!(loader.log.loads(), 0);
    assert!(!renderer.is_ready());
}

#[test]
fn render_futures_are_send() {
    let renderer = ServerRenderer::new(shared_registry(), FakeLoader::new());
    let render = renderer.render(FLOWCHART, None);
    assert_send(&render);
    let detect = renderer.detect_type(FLOWCHART);
    assert_send(&detect);
}

#[test]
fn concurrent_first_renders_share_one_load() {
    let loader = FakeLoader::new();
    let renderer = ServerRenderer::new(shared_registry(), loader.clone());

    let results = block_on(join_all((0..8).map(|_| renderer.render(FLOWCHART, None))));

    assert_eq!(loader.log.loads(), 1);
    assert_eq!(renderer.load_attempts(), 1);
    assert!(renderer.is_ready());
    assert_eq!(loader.log.renders.load(std::sync::atomic::Ordering::SeqCst), 8);
    for artifact in results {
        let artifact = artifact.unwrap();
        assert!(artifact.svg.contains("<svg"));
        assert!(artifact.render_id.starts_with("mermaid-"));
        assert_eq!(artifact.theme, "default");
    }
}

#[test]
fn concurrent_callers_share_a_failed_load() {
    let loader = FakeLoader::new().failing_first(1);
    let renderer = ServerRenderer::new(shared_registry(), loader.clone());

    // The load settles while the later callers are still being polled for the first time.
    let results = block_on(join_all((0..5).map(|_| renderer.render(FLOWCHART, None))));

    assert_eq!(loader.log.loads(), 1);
    for result in results {
        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert!(err.message.contains("bundle unavailable"));
        assert_eq!(err.diagram.as_deref(), Some(FLOWCHART));
    }
    assert!(!renderer.is_ready());
}

#[test]
fn failed_load_is_retried_on_next_call() {
    let loader = FakeLoader::new().failing_first(1);
    let renderer = ServerRenderer::new(shared_registry(), loader.clone());

    let err = block_on(renderer.render(FLOWCHART, None)).unwrap_err();
    assert!(err.is_retryable());

    block_on(renderer.render(FLOWCHART, None)).unwrap();
    assert_eq!(renderer.load_attempts(), 2);

    block_on(renderer.render(FLOWCHART, None)).unwrap();
    assert_eq!(renderer.load_attempts(), 2);
}

#[test]
fn abandoned_caller_does_not_strand_the_load() {
    let loader = FakeLoader::new().failing_first(1);
    let renderer = ServerRenderer::new(shared_registry(), loader.clone());

    assert!(renderer.render(FLOWCHART, None).now_or_never().is_none());
    assert_eq!(renderer.load_attempts(), 1);

    // The next caller picks up the same attempt, sees it fail, and releases the guard.
    let err = block_on(renderer.render(FLOWCHART, None)).unwrap_err();
    assert!(err.message.contains("attempt 1"));
    assert_eq!(renderer.load_attempts(), 1);

    block_on(renderer.render(FLOWCHART, None)).unwrap();
    assert_eq!(renderer.load_attempts(), 2);
    assert!(renderer.is_ready());
}

#[test]
fn rejected_initialization_is_unknown() {
    let loader = FakeLoader::new().rejecting_initialize();
    let renderer = ServerRenderer::new(shared_registry(), loader.clone());

    let err = block_on(renderer.render(FLOWCHART, None)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unknown);
    assert!(err.message.contains("configuration rejected"));
    assert!(!renderer.is_ready());

    block_on(renderer.render(FLOWCHART, None)).unwrap_err();
    assert_eq!(renderer.load_attempts(), 2);
}

#[test]
fn blank_source_fails_before_loading() {
    let loader = FakeLoader::new();
    let renderer = ServerRenderer::new(shared_registry(), loader.clone());

    let err = block_on(renderer.render("  \n", None)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Parse);
    assert_eq!(loader.log.loads(), 0);
}

#[test]
fn detect_type_warms_the_engine() {
    let loader = FakeLoader::new();
    let renderer = ServerRenderer::new(shared_registry(), loader.clone());

    let ty = block_on(renderer.detect_type("classDiagram\n A <|-- B")).unwrap();
    assert_eq!(ty, DiagramType::Class);
    assert!(renderer.is_ready());

    block_on(renderer.render(FLOWCHART, None)).unwrap();
    assert_eq!(loader.log.loads(), 1);
}

#[test]
fn detect_type_stays_total_when_loading_fails() {
    let renderer = ServerRenderer::new(shared_registry(), FakeLoader::new().failing_first(3));
    let (ty, warnings) = count_warnings(|| block_on(renderer.detect_type("not a real diagram")));
    assert_eq!(ty.unwrap(), DiagramType::Unknown);
    assert_eq!(warnings, 1);
    assert!(!renderer.is_ready());
}

#[test]
fn engine_syntax_errors_are_parse_errors() {
    let renderer = ServerRenderer::new(shared_registry(), FakeLoader::new());
    let source = "graph TD\n A-->>>B";

    let err = block_on(renderer.render(source, None)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Parse);
    assert_eq!(err.user_message(), "Parse error on line 2");
    assert_eq!(err.diagram.as_deref(), Some(source));
}

#[test]
fn engine_layout_errors_are_render_errors() {
    let renderer = ServerRenderer::new(shared_registry(), FakeLoader::new());
    let err = block_on(renderer.render("graph TD\n %% explode\n A-->B", None)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Render);
    assert!(!err.is_retryable());
}

#[test]
fn output_without_svg_root_is_a_render_error() {
    let renderer =
        ServerRenderer::new(shared_registry(), FakeLoader::new().with_output("<div></div>"));
    let err = block_on(renderer.render(FLOWCHART, None)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Render);
}

#[test]
fn theme_palette_is_applied_before_render() {
    let renderer = ServerRenderer::new(shared_registry(), FakeLoader::new());
    let config = RenderConfig::with_theme("dark");
    let artifact = block_on(renderer.render(FLOWCHART, Some(&config))).unwrap();

    assert_eq!(artifact.theme, "dark");
    assert!(artifact.svg.contains(r#"data-engine-theme="base""#));
    assert!(artifact.svg.contains(r##"data-primary="#1f2020""##));
}

#[test]
fn renders_without_overrides_revert_to_site_defaults() {
    let loader = FakeLoader::new();
    let renderer = ServerRenderer::new(shared_registry(), loader.clone());

    block_on(renderer.render(FLOWCHART, None)).unwrap();
    block_on(renderer.render(FLOWCHART, None)).unwrap();
    // The site defaults applied at load serve every plain render.
    assert_eq!(loader.log.initializations().len(), 1);

    let dark = RenderConfig::with_theme("dark");
    block_on(renderer.render(FLOWCHART, Some(&dark))).unwrap();
    let plain = block_on(renderer.render(FLOWCHART, None)).unwrap();

    let applied = loader.log.initializations();
    assert_eq!(applied.len(), 3);
    let last = applied.last().unwrap();
    assert_eq!(last.get_str("theme"), Some("default"));
    assert!(last.get("themeVariables").is_none());
    assert!(plain.svg.contains(r#"data-engine-theme="default""#));
}

#[test]
fn concurrent_overridden_renders_do_not_interleave() {
    let renderer = ServerRenderer::new(shared_registry(), FakeLoader::new());
    let dark = RenderConfig::with_theme("dark");
    let forest = RenderConfig::with_theme("forest");

    let results = block_on(join_all((0..6).map(|i| {
        let config = if i % 2 == 0 { &dark } else { &forest };
        renderer.render(FLOWCHART, Some(config))
    })));

    for (i, result) in results.into_iter().enumerate() {
        let artifact = result.unwrap();
        let expected = if i % 2 == 0 { "#1f2020" } else { "#cde498" };
        assert!(
            artifact.svg.contains(&format!(r#"data-primary="{expected}""#)),
            "render {i}: {}",
            artifact.svg
        );
    }
}

#[test]
fn site_config_is_used_at_initialization() {
    let loader = FakeLoader::new();
    let mut site = EngineConfig::empty_object();
    site.set_value("flowchart.curve", serde_json::json!("linear"));
    site.set_value("securityLevel", serde_json::json!("loose"));
    let renderer = ServerRenderer::new(shared_registry(), loader.clone()).with_site_config(site);

    assert_eq!(renderer.site_config().get_str("theme"), Some("default"));
    block_on(renderer.render(FLOWCHART, None)).unwrap();

    block_on(renderer.render(FLOWCHART, None)).unwrap();
    let applied = loader.log.initializations();
    assert_eq!(applied.len(), 1);
    let first = &applied[0];
    assert_eq!(first.get_str("flowchart.curve"), Some("linear"));
    assert_eq!(first.get_str("securityLevel"), Some("loose"));
    assert_eq!(first.get("startOnLoad"), Some(&serde_json::json!(false)));
}

#[test]
fn request_options_reach_the_engine() {
    let loader = FakeLoader::new();
    let renderer = ServerRenderer::new(shared_registry(), loader.clone());
    let config = RenderConfig {
        security_level: Some(SecurityLevel::Sandbox),
        sequence: Some(serde_json::json!({ "mirrorActors": false })),
        ..RenderConfig::default()
    };

    block_on(renderer.render("sequenceDiagram\nA->>B: hi", Some(&config))).unwrap();

    let applied = loader.log.initializations();
    let last = applied.last().unwrap();
    assert_eq!(last.get_str("securityLevel"), Some("sandbox"));
    assert_eq!(last.get("sequence.mirrorActors"), Some(&serde_json::json!(false)));
}

#[test]
fn unknown_theme_falls_back_with_one_warning() {
    let loader = FakeLoader::new();
    let renderer = ServerRenderer::new(shared_registry(), loader.clone());
    let config = RenderConfig::with_theme("does-not-exist");

    let (artifact, warnings) =
        count_warnings(|| block_on(renderer.render(FLOWCHART, Some(&config))));
    let artifact = artifact.unwrap();

    assert_eq!(warnings, 1);
    assert_eq!(artifact.theme, "default");
    assert_eq!(
        loader.log.initializations().last().unwrap().get_str("theme"),
        Some("default")
    );
}

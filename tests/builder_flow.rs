//! End-to-end: configure a builder, build bundles, rebuild on change.

use hotbundle::{AssetCategory, Builder, ProjectMeta};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn write(dir: &Path, rel: &str, contents: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn scene(root: &Path) -> Builder {
    let mut b = Builder::with_root(root);
    b.set_output_path("./dist");
    b.set_project_meta(ProjectMeta {
        description: Some("Space scene".into()),
        author: Some("Ann".into()),
    });
    b
}

#[test]
fn style_bundle_has_header_then_sources_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "src/scss/a.scss", "$w: 10px;\n.a {\n  width: $w;\n}\n");
    write(tmp.path(), "src/scss/b.scss", "// comment\n.b { .c { color: blue; } }\n");

    let mut b = scene(tmp.path());
    b.bundle_css("src/scss/a.scss");
    b.bundle_css("src/scss/b.scss");
    b.bundle_css("src/scss/a.scss");

    let written = b.build_css();

    let bundle = tmp.path().join("dist/css/bundle.min.css");
    assert_eq!(written.len(), 1);
    let text = std::fs::read_to_string(&bundle).unwrap();

    let (header, body) = text.split_once(" */\r\n").unwrap();
    assert!(header.starts_with("/*!\n * @Compiled: "));
    assert!(header.contains(" * @Description: Space scene\n"));
    assert!(header.contains(" * @Author: Ann\n"));

    let chunks: Vec<&str> = body.split("\r\n\r\n").collect();
    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].starts_with("/* Source: a.css */ \r\n"));
    assert!(chunks[0].contains(".a{width:10px}"));
    assert!(chunks[1].starts_with("/* Source: b.css */ \r\n"));
    assert!(chunks[1].contains(".b .c{color:"));
    assert!(!chunks[1].contains("comment"));
}

#[test]
fn build_all_writes_every_category() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "src/site.scss", ".x { margin: 0 }");
    write(tmp.path(), "src/app.js", "window.answer = function () { return 42; };");
    write(tmp.path(), "src/part.html", "<section>hi</section>");
    write(tmp.path(), "src/logo.png", "not really a png");

    let mut b = scene(tmp.path());
    b.bundle_css("src/site.scss");
    b.bundle_js("src/app.js");
    b.bundle_html("src/part.html");
    b.bundle_img("src/logo.png");

    let written = b.build_all();

    assert_eq!(written.len(), 4);
    for rel in [
        "dist/css/bundle.min.css",
        "dist/js/bundle.min.js",
        "dist/html/bundle.min.html",
        "dist/img/logo.png",
    ] {
        assert!(tmp.path().join(rel).is_file(), "missing {rel}");
    }
    let js = std::fs::read_to_string(tmp.path().join("dist/js/bundle.min.js")).unwrap();
    assert!(js.contains("/* Source: app.js */ \r\n"));
    assert!(!js.rsplit_once("*/ \r\n").unwrap().1.contains('\n'));
}

#[test]
fn broken_style_does_not_stop_other_pipelines() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "bad.scss", ".a { color: ");
    write(tmp.path(), "page.html", "<p>ok</p>");

    let mut b = scene(tmp.path());
    b.bundle_css("bad.scss");
    b.bundle_html("page.html");

    let written = b.build_all();

    assert_eq!(written, [tmp.path().join("./dist").join("html/bundle.min.html")]);
    assert!(!tmp.path().join("dist/css").exists());
}

#[test]
fn flush_then_build_is_a_no_op() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "page.html", "<p>ok</p>");

    let mut b = scene(tmp.path());
    b.bundle_html("page.html");
    b.watch_files("*.html");
    b.flush_files();

    assert!(b.build_all().is_empty());
    assert!(b.registry().files(AssetCategory::Markup).is_empty());
    assert_eq!(b.registry().watch_list(), ["*.html"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn change_to_watched_script_rebuilds_script_bundle() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    write(&root, "src/js/app.js", "window.a = 1;");

    let mut b = scene(&root);
    b.bundle_js("src/js/app.js");
    b.watch_files("src/js/*.js");
    let b = Arc::new(b);
    let mut reloads = b.subscribe_reloads();

    let outcome = b.start().await.unwrap();
    assert!(outcome.watcher_started);
    assert!(!outcome.server_started);

    // Give the backend a moment to register before touching the file
    tokio::time::sleep(Duration::from_millis(200)).await;
    write(&root, "src/js/app.js", "window.a = 2;");

    let pushed = tokio::time::timeout(Duration::from_secs(10), reloads.recv())
        .await
        .expect("no rebuild after change")
        .unwrap();
    assert_eq!(pushed, "dist/js/bundle.min.js");

    let js = std::fs::read_to_string(root.join("dist/js/bundle.min.js")).unwrap();
    assert!(js.contains("/* Source: app.js */"));
}

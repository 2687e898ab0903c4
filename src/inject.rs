//! Live-reload client injection for HTML pages.

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, Response},
    middleware::Next,
};
use http_body_util::BodyExt;

/// Live-reload client: WebSocket listener, stylesheet hot swap and
/// cookie-based scroll restoration across full reloads.
const RELOAD_JS: &str = include_str!("livereload.js");

/// Marks an already-injected page so the client is never added twice.
const MARKER: &str = "data-hotbundle";

/// Insert the client before `</body>`, else before `</html>`, else at the end.
pub fn inject_script(html: &str) -> String {
    if html.contains(MARKER) {
        return html.to_string();
    }
    let script = format!("<script {}>\n{}\n</script>", MARKER, RELOAD_JS);

    match html.rfind("</body>").or_else(|| html.rfind("</html>")) {
        Some(pos) => format!("{}{}\n{}", &html[..pos], script, &html[pos..]),
        None => format!("{}\n{}", html, script),
    }
}

/// Only successful `text/html` responses get the client.
fn wants_client(resp: &Response<Body>) -> bool {
    resp.status().is_success()
        && resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/html"))
}

/// Axum middleware: add the client to HTML pages served by the dev server.
pub async fn inject_livereload(req: Request<Body>, next: Next) -> Response<Body> {
    let resp = next.run(req).await;
    if !wants_client(&resp) {
        return resp;
    }

    let (mut parts, body) = resp.into_parts();
    let bytes = match body.collect().await {
        Ok(c) => c.to_bytes(),
        Err(e) => {
            tracing::warn!("Could not read page body: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    // Pages in another encoding are served untouched.
    let page = match std::str::from_utf8(&bytes) {
        Ok(page) => inject_script(page),
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };

    parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(page.len()));
    Response::from_parts(parts, Body::from(page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn injects_before_closing_body() {
        let out = inject_script("<html><body><p>x</p></body></html>");
        let script = out.find("<script data-hotbundle>").unwrap();
        assert!(script < out.find("</body>").unwrap());
        assert!(out.contains("/__lr"));
    }

    #[test]
    fn falls_back_to_closing_html_then_end() {
        let out = inject_script("<html><p>x</p></html>");
        assert!(out.find("<script").unwrap() < out.find("</html>").unwrap());

        let out = inject_script("<p>fragment</p>");
        assert!(out.starts_with("<p>fragment</p>\n<script"));
    }

    #[test]
    fn injects_only_once() {
        let once = inject_script("<body></body>");
        assert_eq!(inject_script(&once), once);
    }

    fn page(status: StatusCode, content_type: &str) -> Response<Body> {
        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn only_successful_html_gets_the_client() {
        assert!(wants_client(&page(StatusCode::OK, "text/html; charset=utf-8")));
        assert!(!wants_client(&page(StatusCode::NOT_FOUND, "text/html")));
        assert!(!wants_client(&page(StatusCode::OK, "text/css")));
        assert!(!wants_client(&page(StatusCode::OK, "application/xhtml+xml")));
    }
}

//! Synthetic responses for when neither cache nor network can answer.

use swcache_core::Response;

/// Empty 504 returned for non-navigation requests.
pub fn gateway_offline() -> Response {
    Response::new(504, "").with_status_text("Offline")
}

/// Minimal HTML page returned for navigations.
pub fn offline_page(app_name: &str) -> Response {
    let title = escape(app_name);
    let html = format!(
        r#"<!doctype html>
<html lang="en">
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} (offline)</title>
<body style="margin:0;font-family:system-ui,sans-serif;display:grid;place-items:center;height:100vh">
  <main style="max-width:560px;text-align:center;padding:24px">
    <h1 style="margin:0 0 8px;font-size:22px">You are offline</h1>
    <p>Some content needs a connection. The app shell is still available; try again once you are back online.</p>
    <button onclick="location.reload()">Retry</button>
  </main>
</body>
</html>
"#
    );

    Response::new(200, html)
        .with_status_text("OK")
        .with_header("Content-Type", "text/html; charset=UTF-8")
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_offline() {
        let resp = gateway_offline();
        assert_eq!(resp.status, 504);
        assert_eq!(resp.status_text, "Offline");
        assert!(resp.body.is_empty());
    }

    #[test]
    fn test_offline_page_is_html() {
        let resp = offline_page("KeFo");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type(), Some("text/html; charset=UTF-8"));
        let body = String::from_utf8_lossy(&resp.body);
        assert!(body.contains("<title>KeFo (offline)</title>"));
    }

    #[test]
    fn test_offline_page_escapes_title() {
        let resp = offline_page("<script>");
        let body = String::from_utf8_lossy(&resp.body);
        assert!(body.contains("&lt;script&gt;"));
        assert!(!body.contains("<title><script>"));
    }
}

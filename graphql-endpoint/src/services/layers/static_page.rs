//! The interactive explorer page.

use axum::body::Body;
use http::HeaderValue;
use http::StatusCode;
use http::header::CONTENT_SECURITY_POLICY;
use http::header::CONTENT_TYPE;
use serde::Serialize;

use crate::configuration::Explorer;
use crate::graphql;
use crate::json_ext::Object;

pub(crate) const EXPLORER_CONTENT_SECURITY_POLICY: &str = "default-src 'none'; style-src 'unsafe-inline' cdnjs.cloudflare.com; script-src 'unsafe-inline' 'unsafe-eval' cdnjs.cloudflare.com; connect-src 'self'; font-src data:";

/// Values the page starts with.
#[derive(Clone, Copy, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExplorerConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) query: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) variables: Option<&'a Object>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) operation_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) response: Option<&'a graphql::Response>,
}

#[derive(Clone, Debug)]
pub(crate) struct ExplorerPage {
    title: String,
}

impl ExplorerPage {
    pub(crate) fn new(configuration: &Explorer) -> Self {
        Self {
            title: escape_html(&configuration.title),
        }
    }

    pub(crate) fn render(&self, config: &ExplorerConfig<'_>) -> Result<Vec<u8>, serde_json::Error> {
        const TEMPLATE: &str = include_str!("../../../templates/explorer_index.html");
        let config = escape_script(&serde_json::to_string(config)?);
        Ok(TEMPLATE
            .replace("{{TITLE}}", &self.title)
            .replace("{{CONFIG}}", &config)
            .into_bytes())
    }

    pub(crate) fn response(
        &self,
        status: StatusCode,
        config: &ExplorerConfig<'_>,
    ) -> Result<http::Response<Body>, crate::services::BoxError> {
        Ok(http::Response::builder()
            .status(status)
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static(mime::TEXT_HTML_UTF_8.as_ref()),
            )
            .header(
                CONTENT_SECURITY_POLICY,
                HeaderValue::from_static(EXPLORER_CONTENT_SECURITY_POLICY),
            )
            .body(Body::from(self.render(config)?))?)
    }
}

/// Keep embedded JSON from closing the `<script>` element.
fn escape_script(json: &str) -> String {
    let mut escaped = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => escaped.push_str("\\u003c"),
            '>' => escaped.push_str("\\u003e"),
            '&' => escaped.push_str("\\u0026"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    fn page() -> ExplorerPage {
        ExplorerPage::new(&Explorer::default())
    }

    #[test]
    fn embedded_json_cannot_close_the_script() {
        let page = page();
        let config = ExplorerConfig {
            query: Some("{ me } # </script><script>alert(1)</script> &"),
            ..Default::default()
        };
        let html = String::from_utf8(page.render(&config).unwrap()).unwrap();
        assert!(!html.contains("</script><script>alert(1)"));
        assert!(html.contains(
            r#"const config = {"query":"{ me } # \u003c/script\u003e\u003cscript\u003ealert(1)\u003c/script\u003e \u0026"};"#
        ));
    }

    #[test]
    fn it_embeds_the_request_and_result() {
        let variables = json!({ "id": 1 }).as_object().cloned().unwrap();
        let response = graphql::Response::builder().data(json!({ "me": null })).build();
        let config = ExplorerConfig {
            query: Some("query Me($id: ID) { me }"),
            variables: Some(&variables),
            operation_name: Some("Me"),
            response: Some(&response),
        };
        let html = String::from_utf8(page().render(&config).unwrap()).unwrap();
        assert!(html.contains(
            r#"const config = {"query":"query Me($id: ID) { me }","variables":{"id":1},"operationName":"Me","response":{"data":{"me":null}}};"#
        ));
        assert!(html.contains("<title>GraphiQL</title>"));
    }

    #[test]
    fn an_empty_shell_has_an_empty_config() {
        let html = String::from_utf8(page().render(&ExplorerConfig::default()).unwrap()).unwrap();
        assert!(html.contains("const config = {};"));
    }

    #[test]
    fn titles_are_escaped() {
        let page = ExplorerPage::new(&Explorer::builder().title("<My & API>").build());
        let html = String::from_utf8(page.render(&ExplorerConfig::default()).unwrap()).unwrap();
        assert!(html.contains("<title>&lt;My &amp; API&gt;</title>"));
    }

    #[test]
    fn responses_carry_the_security_policy() {
        let response = page()
            .response(StatusCode::OK, &ExplorerConfig::default())
            .unwrap();
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
        assert_eq!(
            response.headers().get(CONTENT_SECURITY_POLICY).unwrap(),
            EXPLORER_CONTENT_SECURITY_POLICY
        );
    }
}

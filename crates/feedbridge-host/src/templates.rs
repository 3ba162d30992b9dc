//! Request templates compiled once from configuration.

use feedbridge_core::{
    BridgeConfig, FieldLookup, HeaderTemplate, HttpMethod, RenderedRequest, Template,
    TokenResolver,
};
use tracing::{debug, warn};

/// Immutable URL, body, and header templates shared by every `process` call.
#[derive(Debug, Clone)]
pub struct RequestTemplates {
    method: HttpMethod,
    url: Template,
    body: Option<Template>,
    headers: Vec<HeaderTemplate>,
    content_type: String,
}

impl RequestTemplates {
    /// Parse every template in `config`.
    ///
    /// Header specs without a `:` are logged and left out. A body template
    /// on a GET is ignored.
    pub fn compile(config: &BridgeConfig) -> Self {
        let headers = config
            .headers
            .iter()
            .filter_map(|spec| match HeaderTemplate::parse(spec) {
                Ok(header) => Some(header),
                Err(e) => {
                    warn!(error = %e, "header ignored");
                    None
                }
            })
            .collect();

        let body = match (&config.body, config.method.has_body()) {
            (Some(raw), true) => Some(Template::parse(raw)),
            (Some(_), false) => {
                debug!(method = %config.method, "body template ignored");
                None
            }
            (None, _) => None,
        };

        Self {
            method: config.method,
            url: Template::parse(&config.url),
            body,
            headers,
            content_type: config.content_type.clone(),
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn headers(&self) -> &[HeaderTemplate] {
        &self.headers
    }

    /// Every placeholder referenced by the URL, headers, and body, first occurrence first.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        let all = self
            .url
            .placeholders()
            .chain(self.headers.iter().flat_map(HeaderTemplate::placeholders))
            .chain(self.body.iter().flat_map(Template::placeholders));
        for name in all {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Render a fresh request for one record. Headers whose name renders
    /// empty for this record are left out.
    pub fn build(&self, fields: &dyn FieldLookup, tokens: &dyn TokenResolver) -> RenderedRequest {
        let body = self.method.has_body().then(|| {
            self.body
                .as_ref()
                .map(|t| t.render(fields, tokens))
                .unwrap_or_default()
        });
        RenderedRequest {
            method: self.method,
            url: self.url.render(fields, tokens),
            headers: self
                .headers
                .iter()
                .filter_map(|h| match h.render(fields, tokens) {
                    Ok(pair) => Some(pair),
                    Err(e) => {
                        warn!(error = %e, "header left out of request");
                        None
                    }
                })
                .collect(),
            body,
            content_type: self.content_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedbridge_core::{EpochUnit, FixedClock, PollingClock, Record, TimeTokens};
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        match value {
            serde_json::Value::Object(map) => Record::from_json_object("input", map),
            _ => unreachable!(),
        }
    }

    fn config(url: &str) -> BridgeConfig {
        BridgeConfig {
            url: url.into(),
            ..Default::default()
        }
    }

    #[test]
    fn scenario_url_with_polling_token() {
        let templates = RequestTemplates::compile(&config(
            "http://host/{id}?since={$lastPollingDateTime}",
        ));
        let polling = PollingClock::new(1_000_000, EpochUnit::Seconds);
        let clock = FixedClock(5_000_000);

        let req = templates.build(
            &record(json!({"id": "42"})),
            &TimeTokens::new(&polling, &clock),
        );
        assert_eq!(req.url, "http://host/42?since=1000");
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.body, None);
    }

    #[test]
    fn malformed_header_excluded_others_kept() {
        let mut cfg = config("http://host/");
        cfg.headers = vec![
            "Accept:application/json".into(),
            "no-separator".into(),
            "X-Id:{id}".into(),
        ];
        let templates = RequestTemplates::compile(&cfg);
        assert_eq!(templates.headers().len(), 2);

        let polling = PollingClock::new(0, EpochUnit::Seconds);
        let clock = FixedClock(0);
        let req = templates.build(
            &record(json!({"id": 7})),
            &TimeTokens::new(&polling, &clock),
        );
        assert_eq!(
            req.headers,
            vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("X-Id".to_string(), "7".to_string()),
            ]
        );
    }

    #[test]
    fn header_with_empty_rendered_name_left_out() {
        let mut cfg = config("http://host/");
        cfg.headers = vec!["{vendor}:x".into(), "Accept:text/csv".into()];
        let templates = RequestTemplates::compile(&cfg);
        assert_eq!(templates.headers().len(), 2);

        let polling = PollingClock::new(0, EpochUnit::Seconds);
        let clock = FixedClock(0);
        let tokens = TimeTokens::new(&polling, &clock);

        let req = templates.build(&record(json!({"vendor": null})), &tokens);
        assert_eq!(
            req.headers,
            vec![("Accept".to_string(), "text/csv".to_string())]
        );

        let req = templates.build(&record(json!({"vendor": "X-Vendor"})), &tokens);
        assert_eq!(req.headers.len(), 2);
        assert_eq!(req.headers[0], ("X-Vendor".to_string(), "x".to_string()));
    }

    #[test]
    fn post_renders_body_and_content_type() {
        let mut cfg = config("http://host/ingest");
        cfg.method = HttpMethod::Post;
        cfg.body = Some("id={id}&at={$currentDateTime}".into());
        cfg.content_type = "application/x-www-form-urlencoded".into();
        let templates = RequestTemplates::compile(&cfg);

        let polling = PollingClock::new(0, EpochUnit::Milliseconds);
        let clock = FixedClock(1234);
        let req = templates.build(
            &record(json!({"id": 9})),
            &TimeTokens::new(&polling, &clock),
        );
        assert_eq!(req.body.as_deref(), Some("id=9&at=1234"));
        assert_eq!(req.content_type, "application/x-www-form-urlencoded");
    }

    #[test]
    fn get_ignores_body_template() {
        let mut cfg = config("http://host/");
        cfg.body = Some("ignored".into());
        let templates = RequestTemplates::compile(&cfg);

        let polling = PollingClock::new(0, EpochUnit::Seconds);
        let clock = FixedClock(0);
        let req = templates.build(&record(json!({})), &TimeTokens::new(&polling, &clock));
        assert_eq!(req.body, None);
    }

    #[test]
    fn put_without_body_template_sends_empty_body() {
        let mut cfg = config("http://host/");
        cfg.method = HttpMethod::Put;
        let templates = RequestTemplates::compile(&cfg);

        let polling = PollingClock::new(0, EpochUnit::Seconds);
        let clock = FixedClock(0);
        let req = templates.build(&record(json!({})), &TimeTokens::new(&polling, &clock));
        assert_eq!(req.body.as_deref(), Some(""));
    }

    #[test]
    fn placeholders_deduplicated_in_order() {
        let mut cfg = config("http://host/{id}/{kind}?t={$currentDateTime}");
        cfg.method = HttpMethod::Post;
        cfg.headers = vec!["X-Kind:{kind}".into()];
        cfg.body = Some("{id}-{extra}".into());
        let templates = RequestTemplates::compile(&cfg);
        assert_eq!(
            templates.placeholders(),
            ["id", "kind", "$currentDateTime", "extra"]
        );
    }
}

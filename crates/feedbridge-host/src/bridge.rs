//! The bridge facade: one record in, one request out, documents to the sink.

use std::sync::Arc;
use std::time::Duration;

use feedbridge_core::{
    BridgeConfig, Clock, FieldLookup, PollingClock, RenderedRequest, SystemClock, TimeTokens,
};
use feedbridge_dispatch::{
    DispatchConfig, DispatchStats, Dispatcher, DrainReport, OutputSink, ShutdownError,
    SubmitError, Transport,
};
use feedbridge_normalize::{DelimitedOptions, ResponseNormalizer};
use feedbridge_schema::{SchemaRegistry, SchemaResolver};
use tracing::{debug, info};

use crate::templates::RequestTemplates;

/// Renders a request per input record and hands it to the dispatch pool.
///
/// `process` holds no mutable state of its own and may be called from
/// several threads at once.
pub struct Bridge {
    templates: RequestTemplates,
    dispatcher: Dispatcher,
    polling: PollingClock,
    clock: Arc<dyn Clock>,
    resolver: Arc<SchemaResolver>,
}

impl Bridge {
    /// Start a bridge on the system clock.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start(
        config: &BridgeConfig,
        transport: Arc<dyn Transport>,
        registry: Arc<dyn SchemaRegistry>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self::start_with_clock(config, transport, registry, sink, Arc::new(SystemClock))
    }

    pub fn start_with_clock(
        config: &BridgeConfig,
        transport: Arc<dyn Transport>,
        registry: Arc<dyn SchemaRegistry>,
        sink: Arc<dyn OutputSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let templates = RequestTemplates::compile(config);
        let resolver = Arc::new(SchemaResolver::new(registry));
        let normalizer = Arc::new(ResponseNormalizer::new(
            DelimitedOptions::from_config(config),
            resolver.clone(),
        ));
        let polling =
            PollingClock::with_window(clock.as_ref(), config.polling_window_secs, config.epoch_unit);
        let dispatcher = Dispatcher::start(
            DispatchConfig::from_config(config),
            transport,
            normalizer,
            sink,
        );

        info!(
            method = %templates.method(),
            url = %config.url,
            headers = templates.headers().len(),
            format = %config.response_format,
            "bridge started"
        );
        Self {
            templates,
            dispatcher,
            polling,
            clock,
            resolver,
        }
    }

    pub fn templates(&self) -> &RequestTemplates {
        &self.templates
    }

    /// The polling instant rendered for `$lastPollingDateTime`. Advanced by the scheduler.
    pub fn polling_clock(&self) -> &PollingClock {
        &self.polling
    }

    pub fn resolver(&self) -> &Arc<SchemaResolver> {
        &self.resolver
    }

    /// Render the request `record` would trigger, without sending it.
    pub fn render(&self, record: &dyn FieldLookup) -> RenderedRequest {
        let tokens = TimeTokens::new(&self.polling, self.clock.as_ref());
        self.templates.build(record, &tokens)
    }

    /// Render and submit one request for `record`. Returns once it is queued.
    pub fn process(&self, record: &dyn FieldLookup) -> Result<(), SubmitError> {
        let request = self.render(record);
        debug!(method = %request.method, url = %request.url, "request rendered");
        self.dispatcher.submit(request)
    }

    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Drain the pool, then delete every schema this bridge created.
    pub async fn shutdown(&self, wait: Duration) -> Result<DrainReport, ShutdownError> {
        let report = self.dispatcher.shutdown(wait).await;
        if !matches!(report, Err(ShutdownError::AlreadyStopped)) {
            let purged = self.resolver.purge_created();
            info!(purged, "bridge stopped");
        }
        report
    }
}

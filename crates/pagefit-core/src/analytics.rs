#![forbid(unsafe_code)]

//! Analytics collector commands and the two sink implementations.
//!
//! The collector accepts positional command tuples such as
//! `('event', 'page_view', {...})`. It may not have loaded yet when the first
//! page view happens, so a report goes either straight to its reporting
//! function ([`DirectSink`]) or onto the queue its loader drains later
//! ([`BufferedSink`]). The choice is made once, by [`select_sink`], when the
//! tracker attaches.

use serde::Serialize;
use serde_json::{Value, json};

pub const PAGE_VIEW_EVENT: &str = "page_view";

/// Page-view parameters, serialized with the collector's field names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PageView {
    pub page_path: String,
    pub page_title: String,
    pub page_location: String,
}

/// Parameters of a `config` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConfigParams {
    /// Attach page-view fields to the collector configuration.
    PageView(PageView),
    /// Loader bootstrap; disables the collector's own automatic page view.
    Bootstrap { send_page_view: bool },
}

/// One command for the collector.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCommand {
    /// `('js', <Date>)`: loader timestamp, in milliseconds since the epoch.
    Js { timestamp_ms: f64 },
    /// `('event', <name>, <params>)`.
    Event { name: String, params: PageView },
    /// `('config', <collector id>, <params>)`.
    Config {
        collector_id: String,
        params: ConfigParams,
    },
}

impl SinkCommand {
    #[must_use]
    pub fn page_view(params: PageView) -> Self {
        Self::Event {
            name: PAGE_VIEW_EVENT.to_owned(),
            params,
        }
    }

    #[must_use]
    pub fn page_config(collector_id: &str, params: PageView) -> Self {
        Self::Config {
            collector_id: collector_id.to_owned(),
            params: ConfigParams::PageView(params),
        }
    }

    /// Loader bootstrap sequence: timestamp, then config without automatic
    /// page views.
    #[must_use]
    pub fn bootstrap(collector_id: &str, timestamp_ms: f64) -> Vec<Self> {
        vec![
            Self::Js { timestamp_ms },
            Self::Config {
                collector_id: collector_id.to_owned(),
                params: ConfigParams::Bootstrap {
                    send_page_view: false,
                },
            },
        ]
    }

    /// Command verb (first tuple element).
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Js { .. } => "js",
            Self::Event { .. } => "event",
            Self::Config { .. } => "config",
        }
    }

    /// Positional arguments as JSON values, verb first.
    ///
    /// Hosts that need a native date for `js` should special-case
    /// [`SinkCommand::Js`]; here the timestamp is a number.
    #[must_use]
    pub fn to_args(&self) -> Vec<Value> {
        match self {
            Self::Js { timestamp_ms } => vec![json!("js"), json!(timestamp_ms)],
            Self::Event { name, params } => {
                vec![json!("event"), json!(name), json!(params)]
            }
            Self::Config {
                collector_id,
                params,
            } => vec![json!("config"), json!(collector_id), json!(params)],
        }
    }

    /// The page-view fields carried by this command, if any.
    #[must_use]
    pub fn page_view_params(&self) -> Option<&PageView> {
        match self {
            Self::Event { params, .. } => Some(params),
            Self::Config {
                params: ConfigParams::PageView(params),
                ..
            } => Some(params),
            _ => None,
        }
    }
}

/// The collector's direct reporting function.
pub type CollectorFn = Box<dyn FnMut(&SinkCommand)>;

/// Append-only queue the collector drains once it has loaded.
pub trait CommandQueue {
    fn push(&mut self, command: &SinkCommand);
}

impl CommandQueue for Vec<SinkCommand> {
    fn push(&mut self, command: &SinkCommand) {
        Vec::push(self, command.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Direct,
    Buffered,
}

/// Where page-view commands go.
pub trait AnalyticsSink {
    fn kind(&self) -> SinkKind;
    fn dispatch(&mut self, command: &SinkCommand);
}

/// Calls the collector's reporting function.
pub struct DirectSink {
    report: CollectorFn,
}

impl DirectSink {
    #[must_use]
    pub fn new(report: CollectorFn) -> Self {
        Self { report }
    }
}

impl std::fmt::Debug for DirectSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectSink").finish_non_exhaustive()
    }
}

impl AnalyticsSink for DirectSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Direct
    }

    fn dispatch(&mut self, command: &SinkCommand) {
        (self.report)(command);
    }
}

/// Pushes command tuples onto the collector's queue.
pub struct BufferedSink {
    queue: Box<dyn CommandQueue>,
}

impl BufferedSink {
    #[must_use]
    pub fn new(queue: Box<dyn CommandQueue>) -> Self {
        Self { queue }
    }
}

impl std::fmt::Debug for BufferedSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedSink").finish_non_exhaustive()
    }
}

impl AnalyticsSink for BufferedSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Buffered
    }

    fn dispatch(&mut self, command: &SinkCommand) {
        self.queue.push(command);
    }
}

/// Pick the sink: the reporting function when the collector has one,
/// otherwise its queue. `None` when the host offers neither.
#[must_use]
pub fn select_sink(
    direct: Option<CollectorFn>,
    queue: Option<Box<dyn CommandQueue>>,
) -> Option<Box<dyn AnalyticsSink>> {
    match (direct, queue) {
        (Some(report), _) => Some(Box::new(DirectSink::new(report))),
        (None, Some(queue)) => Some(Box::new(BufferedSink::new(queue))),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sample() -> PageView {
        PageView {
            page_path: "/docs?x=1".into(),
            page_title: "Docs".into(),
            page_location: "https://example.org/docs?x=1".into(),
        }
    }

    struct SharedQueue(Rc<RefCell<Vec<SinkCommand>>>);

    impl CommandQueue for SharedQueue {
        fn push(&mut self, command: &SinkCommand) {
            self.0.borrow_mut().push(command.clone());
        }
    }

    #[test]
    fn event_args_match_collector_shape() {
        let args = SinkCommand::page_view(sample()).to_args();
        assert_eq!(
            args,
            vec![
                json!("event"),
                json!("page_view"),
                json!({
                    "page_path": "/docs?x=1",
                    "page_title": "Docs",
                    "page_location": "https://example.org/docs?x=1",
                }),
            ]
        );
    }

    #[test]
    fn config_args_carry_same_payload() {
        let event = SinkCommand::page_view(sample());
        let config = SinkCommand::page_config("G-1", sample());
        assert_eq!(config.verb(), "config");
        assert_eq!(config.to_args()[1], json!("G-1"));
        assert_eq!(config.to_args()[2], event.to_args()[2]);
        assert_eq!(config.page_view_params(), event.page_view_params());
    }

    #[test]
    fn bootstrap_disables_automatic_page_view() {
        let cmds = SinkCommand::bootstrap("G-1", 1_700_000_000_000.0);
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].verb(), "js");
        assert_eq!(cmds[1].to_args()[2], json!({ "send_page_view": false }));
        assert!(cmds[1].page_view_params().is_none());
    }

    #[test]
    fn select_prefers_direct() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&calls);
        let direct: CollectorFn = Box::new(move |cmd| seen.borrow_mut().push(cmd.clone()));
        let queued = Rc::new(RefCell::new(Vec::new()));
        let queue: Box<dyn CommandQueue> = Box::new(SharedQueue(Rc::clone(&queued)));

        let mut sink = select_sink(Some(direct), Some(queue)).unwrap();
        assert_eq!(sink.kind(), SinkKind::Direct);
        sink.dispatch(&SinkCommand::page_view(sample()));
        assert_eq!(calls.borrow().len(), 1);
        assert!(queued.borrow().is_empty());
    }

    #[test]
    fn select_falls_back_to_queue() {
        let queued = Rc::new(RefCell::new(Vec::new()));
        let queue: Box<dyn CommandQueue> = Box::new(SharedQueue(Rc::clone(&queued)));
        let mut sink = select_sink(None, Some(queue)).unwrap();
        assert_eq!(sink.kind(), SinkKind::Buffered);
        sink.dispatch(&SinkCommand::page_view(sample()));
        assert_eq!(queued.borrow().as_slice(), &[SinkCommand::page_view(sample())]);
    }

    #[test]
    fn select_without_any_sink_is_none() {
        assert!(select_sink(None, None).is_none());
    }

    #[test]
    fn vec_is_a_queue() {
        let mut queue: Vec<SinkCommand> = Vec::new();
        CommandQueue::push(&mut queue, &SinkCommand::page_view(sample()));
        assert_eq!(queue.len(), 1);
    }
}

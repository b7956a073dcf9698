//! Security events and the redaction gate.
//!
//! A security event is dispatched as a **pair**: the authentic payload
//! (real origin, destination, source window, and the provenance label)
//! and a concealed counterpart with every sensitive field scrubbed.  At
//! dispatch time, each listener receives whichever view its owning
//! context is entitled to under the externally supplied origin predicate.
//!
//! The pair shares a single set of dispatch flags, so
//! `stopImmediatePropagation`/`preventDefault` observed through either
//! view cannot drift apart.  Dispatch walks a registration-order
//! snapshot: listeners added during dispatch are excluded, listeners
//! removed during dispatch are skipped.  Events are non-bubbling and
//! cancelable.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::label::Label;

// ---------------------------------------------------------------------------
// SecurityEventKind — the pre-sink check events
// ---------------------------------------------------------------------------

/// The check events fired before a sensitive sink runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    CheckBeforeLoad,
    CheckCookieWrite,
    CheckCopy,
    CheckCut,
    CheckPaste,
    CheckStorageWrite,
    CheckXhrOpen,
    CheckXhrSend,
}

impl SecurityEventKind {
    pub const ALL: [Self; 8] = [
        Self::CheckBeforeLoad,
        Self::CheckCookieWrite,
        Self::CheckCopy,
        Self::CheckCut,
        Self::CheckPaste,
        Self::CheckStorageWrite,
        Self::CheckXhrOpen,
        Self::CheckXhrSend,
    ];

    /// Event type string as scripts see it.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckBeforeLoad => "checkbeforeload",
            Self::CheckCookieWrite => "checkcookiewrite",
            Self::CheckCopy => "checkcopy",
            Self::CheckCut => "checkcut",
            Self::CheckPaste => "checkpaste",
            Self::CheckStorageWrite => "checkstoragewrite",
            Self::CheckXhrOpen => "checkxhropen",
            Self::CheckXhrSend => "checkxhrsend",
        }
    }
}

impl fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// WindowId — opaque handle on the source window
// ---------------------------------------------------------------------------

/// Opaque handle on the window a security event originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowId(u64);

impl WindowId {
    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// SecurityEventPayload — one view of the event
// ---------------------------------------------------------------------------

/// The listener-observable fields of a security event.
#[derive(Debug, Clone)]
pub struct SecurityEventPayload {
    /// Origin of the data the event exposes.
    pub origin: String,
    /// Where the data was headed.
    pub destination: String,
    /// Window the flow originated from.
    pub source: Option<WindowId>,
    label: Label,
}

impl SecurityEventPayload {
    /// Provenance of the exposed data; null on the concealed view.
    pub fn label(&self) -> &Label {
        &self.label
    }

    fn concealed() -> Self {
        Self {
            origin: String::new(),
            destination: String::new(),
            source: None,
            label: Label::none(),
        }
    }
}

// ---------------------------------------------------------------------------
// SecurityEventPair — authentic + concealed views, one set of flags
// ---------------------------------------------------------------------------

/// Shared dispatch flags.  One instance per pair: a flag set through
/// either view is set for both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchFlags {
    pub immediate_propagation_stopped: bool,
    pub default_prevented: bool,
    pub dispatched: bool,
}

/// One security event: both payload views plus the shared flags.
#[derive(Debug)]
pub struct SecurityEventPair {
    kind: SecurityEventKind,
    authentic: SecurityEventPayload,
    concealed: SecurityEventPayload,
    flags: DispatchFlags,
}

impl SecurityEventPair {
    pub fn new(
        kind: SecurityEventKind,
        label: Label,
        origin: impl Into<String>,
        destination: impl Into<String>,
        source: Option<WindowId>,
    ) -> Self {
        Self {
            kind,
            authentic: SecurityEventPayload {
                origin: origin.into(),
                destination: destination.into(),
                source,
                label,
            },
            concealed: SecurityEventPayload::concealed(),
            flags: DispatchFlags::default(),
        }
    }

    /// Re-initialize an event that has not been dispatched yet.  A no-op
    /// once dispatch has started, as for any event re-init.
    pub fn init(
        &mut self,
        kind: SecurityEventKind,
        label: Label,
        origin: impl Into<String>,
        destination: impl Into<String>,
        source: Option<WindowId>,
    ) {
        if self.flags.dispatched {
            return;
        }
        *self = Self::new(kind, label, origin, destination, source);
    }

    pub fn kind(&self) -> SecurityEventKind {
        self.kind
    }

    pub fn authentic(&self) -> &SecurityEventPayload {
        &self.authentic
    }

    pub fn concealed(&self) -> &SecurityEventPayload {
        &self.concealed
    }

    pub fn flags(&self) -> DispatchFlags {
        self.flags
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// Identifier of one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// A security event listener.  Receives a read-only payload view and a
/// control handle for the shared dispatch state.
pub trait SecurityEventListener {
    fn handle_event(&mut self, event: &SecurityEventPayload, ctl: &mut DispatchControl<'_>);
}

/// Adapter turning a closure into a listener.
pub struct FnListener<F>(F);

impl<F> FnListener<F>
where
    F: FnMut(&SecurityEventPayload, &mut DispatchControl<'_>),
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> SecurityEventListener for FnListener<F>
where
    F: FnMut(&SecurityEventPayload, &mut DispatchControl<'_>),
{
    fn handle_event(&mut self, event: &SecurityEventPayload, ctl: &mut DispatchControl<'_>) {
        (self.0)(event, ctl)
    }
}

struct RegisteredListener {
    id: ListenerId,
    kind: SecurityEventKind,
    /// Origin of the listener's owning execution context.
    origin: String,
    listener: Box<dyn SecurityEventListener>,
}

/// Handle a running listener uses to affect the dispatch in progress.
pub struct DispatchControl<'a> {
    flags: &'a mut DispatchFlags,
    removed: &'a mut BTreeSet<ListenerId>,
    pending: &'a mut Vec<RegisteredListener>,
    next_listener_id: &'a mut u64,
}

impl DispatchControl<'_> {
    /// Cancel the default action.  Shared between both views.
    pub fn prevent_default(&mut self) {
        self.flags.default_prevented = true;
    }

    /// Stop this dispatch before the next listener fires.
    pub fn stop_immediate_propagation(&mut self) {
        self.flags.immediate_propagation_stopped = true;
    }

    /// Remove a listener.  Takes effect immediately: a not-yet-fired
    /// listener in the current snapshot is skipped.
    pub fn remove_listener(&mut self, id: ListenerId) {
        self.removed.insert(id);
    }

    /// Register a listener.  Deferred until this dispatch completes, so
    /// it is excluded from the current snapshot.
    pub fn add_listener(
        &mut self,
        kind: SecurityEventKind,
        origin: impl Into<String>,
        listener: Box<dyn SecurityEventListener>,
    ) -> ListenerId {
        *self.next_listener_id += 1;
        let id = ListenerId(*self.next_listener_id);
        self.pending.push(RegisteredListener {
            id,
            kind,
            origin: origin.into(),
            listener,
        });
        id
    }
}

// ---------------------------------------------------------------------------
// OriginPolicy — the external trust-boundary predicate
// ---------------------------------------------------------------------------

/// Externally supplied access predicate.  Treated as pure, synchronous,
/// and side-effect free.
pub trait OriginPolicy {
    /// Whether a listener owned by `listener_origin` may observe an
    /// authentic event associated with `event_origin`.
    fn can_access(&self, listener_origin: &str, event_origin: &str) -> bool;
}

/// Same-origin access: a listener sees the authentic event only when its
/// context origin matches the event's origin exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SameOriginPolicy;

impl OriginPolicy for SameOriginPolicy {
    fn can_access(&self, listener_origin: &str, event_origin: &str) -> bool {
        listener_origin == event_origin
    }
}

// ---------------------------------------------------------------------------
// Dispatch records
// ---------------------------------------------------------------------------

/// Which view a listener received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveredView {
    Authentic,
    Concealed,
}

/// One listener invocation during a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub listener: ListenerId,
    pub origin: String,
    pub view: DeliveredView,
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub kind: SecurityEventKind,
    /// False iff some listener prevented the default action.
    pub proceed_with_default: bool,
    /// Whether `stopImmediatePropagation` cut the snapshot short.
    pub stopped_early: bool,
    pub deliveries: Vec<DeliveryRecord>,
}

// ---------------------------------------------------------------------------
// SecurityEventTarget — the redaction gate
// ---------------------------------------------------------------------------

/// A dispatch target holding registered security event listeners.
#[derive(Default)]
pub struct SecurityEventTarget {
    listeners: Vec<RegisteredListener>,
    next_listener_id: u64,
}

impl fmt::Debug for SecurityEventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityEventTarget")
            .field("listeners", &self.listeners.len())
            .field("next_listener_id", &self.next_listener_id)
            .finish()
    }
}

impl SecurityEventTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one event kind, owned by a context with
    /// the given origin.
    pub fn add_listener(
        &mut self,
        kind: SecurityEventKind,
        origin: impl Into<String>,
        listener: Box<dyn SecurityEventListener>,
    ) -> ListenerId {
        self.next_listener_id += 1;
        let id = ListenerId(self.next_listener_id);
        self.listeners.push(RegisteredListener {
            id,
            kind,
            origin: origin.into(),
            listener,
        });
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|reg| reg.id != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Dispatch one event pair through the gate.
    ///
    /// Walks the registration-order snapshot taken at entry.  Before each
    /// listener, the shared stop flag is checked; per listener, the
    /// origin predicate picks the authentic or the concealed view.
    pub fn dispatch_event(
        &mut self,
        event: &mut SecurityEventPair,
        policy: &dyn OriginPolicy,
    ) -> DispatchSummary {
        let end = self.listeners.len();
        let mut removed: BTreeSet<ListenerId> = BTreeSet::new();
        let mut pending: Vec<RegisteredListener> = Vec::new();
        let mut deliveries: Vec<DeliveryRecord> = Vec::new();
        let mut stopped_early = false;

        let SecurityEventPair {
            kind,
            authentic,
            concealed,
            flags,
        } = event;
        let kind = *kind;
        flags.dispatched = true;

        for index in 0..end {
            if flags.immediate_propagation_stopped {
                stopped_early = true;
                break;
            }
            if self.listeners[index].kind != kind {
                continue;
            }
            let id = self.listeners[index].id;
            if removed.contains(&id) {
                continue;
            }

            let entitled = policy.can_access(&self.listeners[index].origin, &authentic.origin);
            let view = if entitled {
                DeliveredView::Authentic
            } else {
                DeliveredView::Concealed
            };
            tracing::debug!(
                listener = %id,
                event = %kind,
                view = ?view,
                "delivering security event"
            );
            deliveries.push(DeliveryRecord {
                listener: id,
                origin: self.listeners[index].origin.clone(),
                view,
            });

            let payload: &SecurityEventPayload = if entitled { authentic } else { concealed };
            let mut ctl = DispatchControl {
                flags: &mut *flags,
                removed: &mut removed,
                pending: &mut pending,
                next_listener_id: &mut self.next_listener_id,
            };
            self.listeners[index].listener.handle_event(payload, &mut ctl);
        }

        if !removed.is_empty() {
            self.listeners.retain(|reg| !removed.contains(&reg.id));
        }
        self.listeners.extend(pending);

        DispatchSummary {
            kind,
            proceed_with_default: !flags.default_prevented,
            stopped_early,
            deliveries,
        }
    }

    /// Fire the listener list and report whether the default action
    /// should proceed.
    pub fn fire_event_listeners(
        &mut self,
        event: &mut SecurityEventPair,
        policy: &dyn OriginPolicy,
    ) -> bool {
        self.dispatch_event(event, policy).proceed_with_default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::InternTable;
    use crate::tag::Tag;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Test listener that records what it observed and optionally acts on
    /// the dispatch.
    struct Probe {
        name: &'static str,
        log: Log,
        stop_immediate: bool,
        prevent_default: bool,
        remove: Option<ListenerId>,
    }

    impl Probe {
        fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                log: Rc::clone(log),
                stop_immediate: false,
                prevent_default: false,
                remove: None,
            }
        }
    }

    impl SecurityEventListener for Probe {
        fn handle_event(&mut self, event: &SecurityEventPayload, ctl: &mut DispatchControl<'_>) {
            self.log.borrow_mut().push(format!(
                "{}: origin={:?} destination={:?} source={:?} labeled={}",
                self.name,
                event.origin,
                event.destination,
                event.source.map(WindowId::as_u64),
                !event.label().is_null()
            ));
            if self.stop_immediate {
                ctl.stop_immediate_propagation();
            }
            if self.prevent_default {
                ctl.prevent_default();
            }
            if let Some(id) = self.remove {
                ctl.remove_listener(id);
            }
        }
    }

    fn labeled_event(labels: &mut InternTable) -> SecurityEventPair {
        let label = labels.singleton(Tag::mint());
        SecurityEventPair::new(
            SecurityEventKind::CheckXhrSend,
            label,
            "https://a.example",
            "https://evil.example/collect",
            Some(WindowId::from_u64(7)),
        )
    }

    // -- Kind catalog --

    #[test]
    fn kind_strings_match_event_names() {
        assert_eq!(SecurityEventKind::CheckBeforeLoad.as_str(), "checkbeforeload");
        assert_eq!(SecurityEventKind::CheckCookieWrite.as_str(), "checkcookiewrite");
        assert_eq!(SecurityEventKind::CheckXhrOpen.as_str(), "checkxhropen");
        assert_eq!(SecurityEventKind::ALL.len(), 8);
    }

    // -- Pair construction --

    #[test]
    fn concealed_view_is_scrubbed() {
        let mut labels = InternTable::new();
        let event = labeled_event(&mut labels);

        assert_eq!(event.authentic().origin, "https://a.example");
        assert!(!event.authentic().label().is_null());
        assert_eq!(event.concealed().origin, "");
        assert_eq!(event.concealed().destination, "");
        assert_eq!(event.concealed().source, None);
        assert!(event.concealed().label().is_null());
    }

    #[test]
    fn init_before_dispatch_replaces_fields() {
        let mut labels = InternTable::new();
        let mut event = labeled_event(&mut labels);
        event.init(
            SecurityEventKind::CheckCopy,
            Label::none(),
            "https://b.example",
            "",
            None,
        );
        assert_eq!(event.kind(), SecurityEventKind::CheckCopy);
        assert_eq!(event.authentic().origin, "https://b.example");
    }

    #[test]
    fn init_after_dispatch_is_a_no_op() {
        let mut labels = InternTable::new();
        let mut event = labeled_event(&mut labels);
        let mut target = SecurityEventTarget::new();
        target.dispatch_event(&mut event, &SameOriginPolicy);

        event.init(
            SecurityEventKind::CheckCopy,
            Label::none(),
            "https://b.example",
            "",
            None,
        );
        assert_eq!(event.kind(), SecurityEventKind::CheckXhrSend);
        assert_eq!(event.authentic().origin, "https://a.example");
    }

    // -- Redaction decision --

    #[test]
    fn entitled_listener_sees_authentic_other_sees_concealed() {
        let mut labels = InternTable::new();
        let mut event = labeled_event(&mut labels);
        let mut target = SecurityEventTarget::new();
        let log: Log = Log::default();

        target.add_listener(
            SecurityEventKind::CheckXhrSend,
            "https://a.example",
            Box::new(Probe::new("same", &log)),
        );
        target.add_listener(
            SecurityEventKind::CheckXhrSend,
            "https://other.example",
            Box::new(Probe::new("cross", &log)),
        );

        let summary = target.dispatch_event(&mut event, &SameOriginPolicy);
        assert!(summary.proceed_with_default);
        assert_eq!(summary.deliveries.len(), 2);
        assert_eq!(summary.deliveries[0].view, DeliveredView::Authentic);
        assert_eq!(summary.deliveries[1].view, DeliveredView::Concealed);

        let log = log.borrow();
        assert!(log[0].contains("origin=\"https://a.example\""));
        assert!(log[0].contains("source=Some(7)"));
        assert!(log[0].contains("labeled=true"));
        assert!(log[1].contains("origin=\"\""));
        assert!(log[1].contains("source=None"));
        assert!(log[1].contains("labeled=false"));
    }

    #[test]
    fn stop_immediate_propagation_halts_dispatch() {
        let mut labels = InternTable::new();
        let mut event = labeled_event(&mut labels);
        let mut target = SecurityEventTarget::new();
        let log: Log = Log::default();

        let mut first = Probe::new("first", &log);
        first.stop_immediate = true;
        target.add_listener(
            SecurityEventKind::CheckXhrSend,
            "https://a.example",
            Box::new(first),
        );
        target.add_listener(
            SecurityEventKind::CheckXhrSend,
            "https://other.example",
            Box::new(Probe::new("second", &log)),
        );

        let summary = target.dispatch_event(&mut event, &SameOriginPolicy);
        assert!(summary.stopped_early);
        assert_eq!(summary.deliveries.len(), 1);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn prevent_default_from_concealed_view_blocks_default() {
        let mut labels = InternTable::new();
        let mut event = labeled_event(&mut labels);
        let mut target = SecurityEventTarget::new();
        let log: Log = Log::default();

        let mut cross = Probe::new("cross", &log);
        cross.prevent_default = true;
        target.add_listener(
            SecurityEventKind::CheckXhrSend,
            "https://other.example",
            Box::new(cross),
        );

        let proceed = target.fire_event_listeners(&mut event, &SameOriginPolicy);
        assert!(!proceed);
        assert!(event.flags().default_prevented);
    }

    // -- Snapshot semantics --

    #[test]
    fn listener_removed_during_dispatch_is_skipped_and_unregistered() {
        let mut labels = InternTable::new();
        let mut event = labeled_event(&mut labels);
        let mut target = SecurityEventTarget::new();
        let log: Log = Log::default();

        let second_id = ListenerId(2);
        let mut first = Probe::new("first", &log);
        first.remove = Some(second_id);
        target.add_listener(
            SecurityEventKind::CheckXhrSend,
            "https://a.example",
            Box::new(first),
        );
        let actual_second = target.add_listener(
            SecurityEventKind::CheckXhrSend,
            "https://a.example",
            Box::new(Probe::new("second", &log)),
        );
        assert_eq!(actual_second, second_id);

        let summary = target.dispatch_event(&mut event, &SameOriginPolicy);
        assert_eq!(summary.deliveries.len(), 1);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(target.listener_count(), 1);
    }

    #[test]
    fn listener_added_during_dispatch_is_excluded_from_snapshot() {
        let mut labels = InternTable::new();
        let mut event = labeled_event(&mut labels);
        let mut target = SecurityEventTarget::new();
        let log: Log = Log::default();

        struct Adder {
            log: Log,
        }
        impl SecurityEventListener for Adder {
            fn handle_event(&mut self, _event: &SecurityEventPayload, ctl: &mut DispatchControl<'_>) {
                self.log.borrow_mut().push("adder".to_string());
                let probe = Probe::new("late", &self.log);
                ctl.add_listener(
                    SecurityEventKind::CheckXhrSend,
                    "https://a.example",
                    Box::new(probe),
                );
            }
        }

        target.add_listener(
            SecurityEventKind::CheckXhrSend,
            "https://a.example",
            Box::new(Adder { log: Rc::clone(&log) }),
        );

        let summary = target.dispatch_event(&mut event, &SameOriginPolicy);
        assert_eq!(summary.deliveries.len(), 1);
        assert_eq!(log.borrow().len(), 1);
        // The late listener is registered for the next dispatch.
        assert_eq!(target.listener_count(), 2);

        let mut event2 = labeled_event(&mut labels);
        let summary2 = target.dispatch_event(&mut event2, &SameOriginPolicy);
        assert_eq!(summary2.deliveries.len(), 2);
    }

    #[test]
    fn listeners_for_other_kinds_do_not_fire() {
        let mut labels = InternTable::new();
        let mut event = labeled_event(&mut labels);
        let mut target = SecurityEventTarget::new();
        let log: Log = Log::default();

        target.add_listener(
            SecurityEventKind::CheckCopy,
            "https://a.example",
            Box::new(Probe::new("copy", &log)),
        );
        let summary = target.dispatch_event(&mut event, &SameOriginPolicy);
        assert!(summary.deliveries.is_empty());
        assert!(summary.proceed_with_default);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn dispatch_with_no_listeners_proceeds() {
        let mut labels = InternTable::new();
        let mut event = labeled_event(&mut labels);
        let mut target = SecurityEventTarget::new();
        assert!(target.fire_event_listeners(&mut event, &SameOriginPolicy));
    }

    // -- Closure listeners --

    #[test]
    fn closures_are_listeners() {
        let mut labels = InternTable::new();
        let mut event = labeled_event(&mut labels);
        let mut target = SecurityEventTarget::new();

        target.add_listener(
            SecurityEventKind::CheckXhrSend,
            "https://other.example",
            Box::new(FnListener::new(|_event, ctl| ctl.prevent_default())),
        );
        assert!(!target.fire_event_listeners(&mut event, &SameOriginPolicy));
    }

    // -- Records serde --

    #[test]
    fn dispatch_summary_serialization_round_trip() {
        let summary = DispatchSummary {
            kind: SecurityEventKind::CheckPaste,
            proceed_with_default: false,
            stopped_early: true,
            deliveries: vec![DeliveryRecord {
                listener: ListenerId(3),
                origin: "https://a.example".to_string(),
                view: DeliveredView::Concealed,
            }],
        };
        let json = serde_json::to_string(&summary).expect("serialize");
        let restored: DispatchSummary = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(summary, restored);
    }
}

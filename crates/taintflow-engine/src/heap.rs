//! Heap cells and the label-carrier rule.
//!
//! Every heap cell carries one optional owning label in its header
//! (null = untainted).  Strings and objects are therefore **native**
//! carriers; a bare primitive that needs a label is boxed into a
//! `Wrapped` cell, the labeled-value wrapper.  All attach/read paths go
//! through [`LabelCarrier`] so there is exactly one place that decides
//! native-vs-boxed.
//!
//! The collector contract is deliberately boring: freeing a cell drops
//! its label handle like any other owned field.  Labels are reference
//! counted, never traced.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capability::TagCapability;
use crate::intern::InternTable;
use crate::label::Label;
use crate::value::Value;

// ---------------------------------------------------------------------------
// CellId
// ---------------------------------------------------------------------------

/// Handle referencing one heap cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(u64);

impl CellId {
    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Cell payloads
// ---------------------------------------------------------------------------

/// Ordinary object payload: named properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectData {
    pub properties: BTreeMap<String, Value>,
}

/// What a heap cell holds, beside its label header.
#[derive(Debug, Clone)]
pub enum CellPayload {
    Str(String),
    Object(ObjectData),
    /// The labeled-value wrapper: a bare primitive whose label lives in
    /// this cell's header.
    Wrapped(Value),
    /// A script-visible tag capability (`SecurityTag`).
    Capability(TagCapability),
    /// A script-visible label inspection object (`SecurityLabel`).
    LabelObject(Label),
}

/// One heap cell: label header plus payload.
#[derive(Debug, Clone)]
pub struct Cell {
    label: Label,
    payload: CellPayload,
}

impl Cell {
    pub fn label(&self) -> &Label {
        &self.label
    }

    pub fn payload(&self) -> &CellPayload {
        &self.payload
    }
}

// ---------------------------------------------------------------------------
// LabelCarrier — where a value's label lives
// ---------------------------------------------------------------------------

/// Classification of a value for label storage.  Every attach/read path
/// matches on this rather than on concrete value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelCarrier {
    /// Heap-backed value with a native header field (string, object).
    Inline(CellId),
    /// Labeled-value wrapper cell around a bare primitive.
    Boxed(CellId),
    /// Bare primitive; a label would require boxing.
    Bare,
}

impl LabelCarrier {
    pub fn of(value: Value) -> Self {
        match value {
            Value::Str(id) | Value::Object(id) => Self::Inline(id),
            Value::Labeled(id) => Self::Boxed(id),
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Int(_) => Self::Bare,
        }
    }
}

// ---------------------------------------------------------------------------
// Heap
// ---------------------------------------------------------------------------

/// Owning store of heap cells.  IDs are monotonically assigned for
/// deterministic ordering.
#[derive(Debug, Default)]
pub struct Heap {
    cells: BTreeMap<CellId, Cell>,
    next_id: u64,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, payload: CellPayload, label: Label) -> CellId {
        self.next_id += 1;
        let id = CellId(self.next_id);
        self.cells.insert(id, Cell { label, payload });
        id
    }

    /// Allocate an untainted string cell.
    pub fn alloc_str(&mut self, contents: impl Into<String>) -> Value {
        Value::Str(self.alloc(CellPayload::Str(contents.into()), Label::none()))
    }

    /// Allocate a string cell carrying `label` natively.
    pub fn alloc_str_labeled(&mut self, contents: impl Into<String>, label: Label) -> Value {
        Value::Str(self.alloc(CellPayload::Str(contents.into()), label))
    }

    /// Allocate an empty, untainted object cell.
    pub fn alloc_object(&mut self) -> Value {
        Value::Object(self.alloc(CellPayload::Object(ObjectData::default()), Label::none()))
    }

    pub(crate) fn alloc_capability(&mut self, capability: TagCapability) -> Value {
        Value::Object(self.alloc(CellPayload::Capability(capability), Label::none()))
    }

    pub(crate) fn alloc_label_object(&mut self, label: Label) -> Value {
        Value::Object(self.alloc(CellPayload::LabelObject(label), Label::none()))
    }

    /// Box a bare primitive with a non-null label.
    ///
    /// The preconditions are propagation-contract invariants, not input
    /// validation: violating one is a bug in the caller and aborts.
    pub fn wrap(&mut self, value: Value, label: &Label) -> Value {
        assert!(!label.is_null(), "a value with no taint is never wrapped");
        assert!(
            value.is_wrappable(),
            "only bare primitives are wrapped; strings and objects carry a label natively \
             and labeled values do not nest (got {})",
            value.shape_name()
        );
        Value::Labeled(self.alloc(CellPayload::Wrapped(value), label.clone()))
    }

    /// Resolve through the wrapper: the inner value for a labeled box,
    /// the value itself otherwise.  Every consumer applies this before
    /// coercion, comparison, or arithmetic.
    pub fn unwrapped(&self, value: Value) -> Value {
        match LabelCarrier::of(value) {
            LabelCarrier::Boxed(id) => match &self.cell(id).payload {
                CellPayload::Wrapped(inner) => *inner,
                other => panic!(
                    "labeled handle {id} points at a {} cell",
                    payload_kind(other)
                ),
            },
            _ => value,
        }
    }

    /// The label observable on `value`: the cell header for heap-backed
    /// values, null for bare primitives.
    pub fn label_of(&self, value: Value) -> Label {
        match LabelCarrier::of(value) {
            LabelCarrier::Inline(id) | LabelCarrier::Boxed(id) => self.cell(id).label.clone(),
            LabelCarrier::Bare => Label::none(),
        }
    }

    /// Union `label` into a cell's header.
    pub fn merge_label(&mut self, id: CellId, label: &Label, labels: &mut InternTable) {
        let cell = self.cell_mut(id);
        cell.label = labels.merge(&cell.label, label);
    }

    /// Attach `label` to `value` by the native-or-wrap rule:
    ///
    /// - null label: the value is returned untouched;
    /// - native carrier: union into the cell header;
    /// - already-wrapped value: a fresh wrapper around the same inner
    ///   value with the union label (wrappers are immutable);
    /// - bare primitive: box it.
    pub fn attach_label(&mut self, value: Value, label: &Label, labels: &mut InternTable) -> Value {
        if label.is_null() {
            return value;
        }
        match LabelCarrier::of(value) {
            LabelCarrier::Inline(id) => {
                self.merge_label(id, label, labels);
                value
            }
            LabelCarrier::Boxed(id) => {
                let inner = self.unwrapped(value);
                let merged = labels.merge(&self.cell(id).label, label);
                self.wrap(inner, &merged)
            }
            LabelCarrier::Bare => self.wrap(value, label),
        }
    }

    /// String contents, if `value` is (a wrapper cannot hold one) a
    /// string cell.
    pub fn str_contents(&self, value: Value) -> Option<&str> {
        match value {
            Value::Str(id) => match &self.cell(id).payload {
                CellPayload::Str(s) => Some(s),
                other => panic!("string handle {id} points at a {} cell", payload_kind(other)),
            },
            _ => None,
        }
    }

    pub(crate) fn capability(&self, value: Value) -> Option<&TagCapability> {
        match value {
            Value::Object(id) => match &self.cell(id).payload {
                CellPayload::Capability(capability) => Some(capability),
                _ => None,
            },
            _ => None,
        }
    }

    pub(crate) fn label_object(&self, value: Value) -> Option<&Label> {
        match value {
            Value::Object(id) => match &self.cell(id).payload {
                CellPayload::LabelObject(label) => Some(label),
                _ => None,
            },
            _ => None,
        }
    }

    /// Object properties, for plain object cells.
    pub fn object_mut(&mut self, id: CellId) -> Option<&mut ObjectData> {
        match &mut self.cell_mut(id).payload {
            CellPayload::Object(data) => Some(data),
            _ => None,
        }
    }

    pub fn object(&self, id: CellId) -> Option<&ObjectData> {
        match &self.cell(id).payload {
            CellPayload::Object(data) => Some(data),
            _ => None,
        }
    }

    /// Type name as the runtime reports it, resolving through wrappers.
    pub fn type_name(&self, value: Value) -> &'static str {
        match LabelCarrier::of(value) {
            LabelCarrier::Boxed(_) => self.unwrapped(value).shape_name(),
            _ => value.shape_name(),
        }
    }

    pub fn contains(&self, id: CellId) -> bool {
        self.cells.contains_key(&id)
    }

    pub fn get(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(&id)
    }

    /// Finalize a cell.  Its label handle drops here, decrementing the
    /// node's reference count like any other owner.
    pub fn free(&mut self, id: CellId) -> bool {
        self.cells.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn cell(&self, id: CellId) -> &Cell {
        match self.cells.get(&id) {
            Some(cell) => cell,
            None => panic!("dangling heap handle {id}"),
        }
    }

    fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        match self.cells.get_mut(&id) {
            Some(cell) => cell,
            None => panic!("dangling heap handle {id}"),
        }
    }
}

fn payload_kind(payload: &CellPayload) -> &'static str {
    match payload {
        CellPayload::Str(_) => "string",
        CellPayload::Object(_) => "object",
        CellPayload::Wrapped(_) => "wrapped",
        CellPayload::Capability(_) => "capability",
        CellPayload::LabelObject(_) => "label-object",
    }
}

//! Coercions, delegating through the labeled-value wrapper.
//!
//! The raw coercions (`to_number`, `to_boolean`, `to_primitive`,
//! `display_string`) read through the wrapper and never produce a new
//! carrier, so they live on [`Heap`].  The allocating coercions
//! (`to_string_value`, `to_object_value`) produce a fresh carrier cell
//! and re-attach the source label to it natively, never by re-wrapping,
//! so they live on [`Runtime`].
//!
//! Numbers are integers here, as in the host value model; a coercion with
//! no integer result yields `None`.

use crate::heap::{CellPayload, Heap};
use crate::runtime::Runtime;
use crate::value::Value;

impl Heap {
    /// Numeric coercion.  `None` is the not-a-number case.
    pub fn to_number(&self, value: Value) -> Option<i64> {
        let unwrapped = self.unwrapped(value);
        match unwrapped {
            Value::Undefined => None,
            Value::Null => Some(0),
            Value::Bool(b) => Some(i64::from(b)),
            Value::Int(n) => Some(n),
            Value::Str(_) => {
                let s = self.str_contents(unwrapped).unwrap_or_default().trim();
                if s.is_empty() { Some(0) } else { s.parse().ok() }
            }
            Value::Object(_) => None,
            Value::Labeled(_) => unreachable!("wrappers do not nest"),
        }
    }

    /// Boolean coercion.  Produces a bare `bool` for branching; labels do
    /// not influence control flow here.
    pub fn to_boolean(&self, value: Value) -> bool {
        let unwrapped = self.unwrapped(value);
        match unwrapped {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => b,
            Value::Int(n) => n != 0,
            Value::Str(_) => !self.str_contents(unwrapped).unwrap_or_default().is_empty(),
            Value::Object(_) => true,
            Value::Labeled(_) => unreachable!("wrappers do not nest"),
        }
    }

    /// Primitive view: the inner value for a wrapper, the value itself
    /// otherwise.
    pub fn to_primitive(&self, value: Value) -> Value {
        self.unwrapped(value)
    }

    /// Printable form, resolving through wrappers and cells.
    pub fn display_string(&self, value: Value) -> String {
        let value = self.unwrapped(value);
        match value {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Str(_) => self
                .str_contents(value)
                .unwrap_or_default()
                .to_string(),
            Value::Object(id) => match self.get(id).map(|cell| cell.payload()) {
                Some(CellPayload::Capability(_)) => "SecurityTag".to_string(),
                Some(CellPayload::LabelObject(_)) => "SecurityLabel".to_string(),
                _ => "[object Object]".to_string(),
            },
            Value::Labeled(_) => unreachable!("wrappers do not nest"),
        }
    }
}

impl Runtime {
    /// String coercion.  The result string carries the source label in
    /// its cell header; an input that is already a string comes back as
    /// the same cell.
    pub fn to_string_value(&mut self, value: Value) -> Value {
        let unwrapped = self.heap.unwrapped(value);
        if unwrapped.is_string() {
            return unwrapped;
        }
        let label = self.heap.label_of(value);
        let contents = self.heap.display_string(unwrapped);
        self.heap.alloc_str_labeled(contents, label)
    }

    /// Object coercion.  Non-objects are boxed into a one-property object
    /// (`value` holds the primitive); the source label moves onto the new
    /// cell's header.
    pub fn to_object_value(&mut self, value: Value) -> Value {
        let unwrapped = self.heap.unwrapped(value);
        if let Value::Object(_) = unwrapped {
            return unwrapped;
        }
        let label = self.heap.label_of(value);
        let object = self.heap.alloc_object();
        let Value::Object(id) = object else {
            unreachable!("alloc_object returns an object handle")
        };
        if let Some(data) = self.heap.object_mut(id) {
            data.properties.insert("value".to_string(), unwrapped);
        }
        if !label.is_null() {
            self.heap.merge_label(id, &label, &mut self.labels);
        }
        object
    }
}

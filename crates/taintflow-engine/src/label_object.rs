//! Script-visible label inspection objects (`SecurityLabel`).
//!
//! Reflection on the same label must yield the same object, so label
//! objects are interned per descriptor in a weak map: the cache holds
//! bare cell handles and revalidates them against the heap on lookup,
//! reconstructing when the cell has been collected.

use std::collections::HashMap;

use crate::error::HostError;
use crate::heap::CellId;
use crate::label::{Label, LabelDescriptor};
use crate::runtime::Runtime;
use crate::value::Value;

/// Weak map from descriptor to the live label object for that label.
/// Never keeps a cell alive: entries are revalidated on lookup.
#[derive(Debug, Default)]
pub struct LabelObjectCache {
    entries: HashMap<LabelDescriptor, CellId>,
}

impl LabelObjectCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Runtime {
    /// Lookup-or-construct the inspection object for a non-null label.
    /// The null label has no object: untainted values reflect as `Null`.
    pub fn label_object_for(&mut self, label: &Label) -> Option<Value> {
        let descriptor = label.descriptor()?.clone();
        if let Some(&id) = self.label_objects.entries.get(&descriptor) {
            if self.heap.contains(id) {
                return Some(Value::Object(id));
            }
            tracing::trace!(descriptor = %descriptor, "label object was collected; rebuilding");
        }
        let object = self.heap.alloc_label_object(label.clone());
        let Value::Object(id) = object else {
            unreachable!("alloc_label_object returns an object handle")
        };
        self.label_objects.entries.insert(descriptor, id);
        Some(object)
    }

    /// Reflect the label carried by `value`: its inspection object, or
    /// `Null` when the value is untainted.
    pub fn label_object_of(&mut self, value: Value) -> Value {
        let label = self.heap.label_of(value);
        self.label_object_for(&label).unwrap_or(Value::Null)
    }

    /// `receiver.toString()` on a label object.
    pub fn security_label_to_string(&mut self, receiver: Value) -> Result<Value, HostError> {
        if self.heap.label_object(receiver).is_none() {
            return Err(HostError::ReceiverTypeMismatch {
                operation: "toString".to_string(),
                expected: "SecurityLabel".to_string(),
                actual: self.heap.type_name(receiver).to_string(),
            });
        }
        Ok(self.heap.alloc_str("SecurityLabel"))
    }
}

//! The script-visible tag capability (`SecurityTag`).
//!
//! A capability owns one freshly minted tag and caches the singleton
//! label `{tag}` so `addTo` never re-derives it.  The host surface
//! mirrors the native-function convention: `new SecurityTag()`,
//! `tag.addTo(value)`, `tag.isOn(value)`, `tag.toString()`.  Receiver
//! mismatches are ordinary type errors; `isOn` on a value that cannot
//! carry a label answers `false` rather than failing.

use crate::error::HostError;
use crate::intern::InternTable;
use crate::label::Label;
use crate::runtime::Runtime;
use crate::tag::Tag;
use crate::value::Value;

// ---------------------------------------------------------------------------
// TagCapability
// ---------------------------------------------------------------------------

/// One mint/apply/test handle on a single tag.
#[derive(Debug, Clone)]
pub struct TagCapability {
    tag: Tag,
    /// The interned singleton `{tag}`, cached for the capability's
    /// lifetime.
    label_for_tag: Label,
}

impl TagCapability {
    /// Mint a fresh tag and cache its singleton label.
    pub fn new(labels: &mut InternTable) -> Self {
        let tag = Tag::mint();
        let label_for_tag = labels.singleton(tag);
        Self { tag, label_for_tag }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn label_for_tag(&self) -> &Label {
        &self.label_for_tag
    }
}

// ---------------------------------------------------------------------------
// Host surface
// ---------------------------------------------------------------------------

impl Runtime {
    /// `new SecurityTag()`: allocate a capability object with a fresh tag.
    pub fn construct_security_tag(&mut self) -> Value {
        let capability = TagCapability::new(&mut self.labels);
        self.heap.alloc_capability(capability)
    }

    /// `receiver.addTo(argument)`: attach the capability's singleton
    /// label to `argument` by the native-or-wrap rule, merged with
    /// whatever label `argument` already carries.
    pub fn security_tag_add_to(
        &mut self,
        receiver: Value,
        argument: Value,
    ) -> Result<Value, HostError> {
        let label_for_tag = {
            let capability = self.expect_capability(receiver, "addTo")?;
            debug_assert!(!capability.label_for_tag().is_null());
            debug_assert!(capability.label_for_tag().has_tag(capability.tag()));
            capability.label_for_tag().clone()
        };
        Ok(self.attach(argument, &label_for_tag))
    }

    /// `receiver.isOn(argument)`: whether `argument`'s label carries the
    /// capability's tag.  A value that cannot carry a label is never
    /// tagged.
    pub fn security_tag_is_on(&self, receiver: Value, argument: Value) -> Result<bool, HostError> {
        let capability = self.expect_capability(receiver, "isOn")?;
        Ok(self.heap.label_of(argument).has_tag(capability.tag()))
    }

    /// `receiver.toString()`.
    pub fn security_tag_to_string(&mut self, receiver: Value) -> Result<Value, HostError> {
        self.expect_capability(receiver, "toString")?;
        Ok(self.heap.alloc_str("SecurityTag"))
    }

    fn expect_capability(
        &self,
        receiver: Value,
        operation: &str,
    ) -> Result<&TagCapability, HostError> {
        self.heap
            .capability(receiver)
            .ok_or_else(|| HostError::ReceiverTypeMismatch {
                operation: operation.to_string(),
                expected: "SecurityTag".to_string(),
                actual: self.heap.type_name(receiver).to_string(),
            })
    }
}

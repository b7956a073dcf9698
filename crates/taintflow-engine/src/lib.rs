#![forbid(unsafe_code)]

//! Dynamic information-flow (taint) tracking for an embedded scripting
//! runtime.
//!
//! Values flowing through the runtime accumulate provenance **tags**,
//! grouped into immutable, interned **labels**.  Every value-producing
//! operation unions the labels of its operands onto its result, so taint
//! is never silently dropped.  At the trust boundary, a redaction gate
//! decides per listener whether an event is delivered authentic or
//! concealed.
//!
//! Key pieces:
//!
//! - **Tags and labels**: [`tag::Tag`] is an opaque process-unique token;
//!   [`label::Label`] is an immutable interned tag set with cached
//!   add/merge transitions.
//! - **Interning**: [`intern::InternTable`] holds one weak entry per live
//!   tag-set shape, so structurally equal labels are the same instance.
//! - **Carriers**: heap cells ([`heap::Heap`]) carry a label in their
//!   header; bare primitives are boxed into a labeled wrapper cell.
//! - **Propagation**: arithmetic, concatenation, coercion, and `typeof`
//!   re-label their results with the union of operand labels
//!   ([`propagate`]).
//! - **Capability surface**: the script-visible `SecurityTag` object
//!   ([`capability`]) mints tags and applies/tests them on values.
//! - **Redaction gate**: [`event::SecurityEventTarget`] delivers either
//!   the authentic or the concealed view of a security event to each
//!   listener, based on an externally supplied origin predicate.

pub mod capability;
pub mod coerce;
pub mod error;
pub mod event;
pub mod heap;
pub mod intern;
pub mod label;
pub mod label_object;
pub mod propagate;
pub mod runtime;
pub mod tag;
pub mod value;

pub use error::HostError;
pub use event::{OriginPolicy, SameOriginPolicy, SecurityEventKind, SecurityEventPair};
pub use heap::{CellId, Heap};
pub use intern::{InternConfig, InternTable};
pub use label::{Label, LabelDescriptor};
pub use runtime::Runtime;
pub use tag::Tag;
pub use value::Value;

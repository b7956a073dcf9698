//! Runtime values.
//!
//! The value enum mirrors the host interpreter's: bare primitives are
//! inline, strings and objects live on the heap behind a [`CellId`], and
//! `Labeled` is the boxed wrapper for a tainted bare primitive (see
//! [`heap`]).
//!
//! [`heap`]: crate::heap

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::heap::CellId;

/// Runtime value.
///
/// `Str`, `Object`, and `Labeled` reference heap cells; everything those
/// cells contain (including the label header) is owned by the [`Heap`].
///
/// [`Heap`]: crate::heap::Heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Str(CellId),
    Object(CellId),
    /// Boxed primitive carrying a label; see [`Heap::wrap`].
    ///
    /// [`Heap::wrap`]: crate::heap::Heap::wrap
    Labeled(CellId),
}

impl Value {
    /// Whether this value may be boxed into a labeled wrapper: a bare
    /// primitive with no heap cell of its own.  Strings are excluded
    /// since they carry a label natively in their cell header.
    pub fn is_wrappable(&self) -> bool {
        matches!(
            self,
            Self::Undefined | Self::Null | Self::Bool(_) | Self::Int(_)
        )
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Self::Str(_))
    }

    /// Type name of the value shape itself.  A wrapped value reports its
    /// inner type through [`Heap::type_name`], not here.
    ///
    /// [`Heap::type_name`]: crate::heap::Heap::type_name
    pub fn shape_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "number",
            Self::Str(_) => "string",
            Self::Object(_) => "object",
            Self::Labeled(_) => "labeled",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(id) => write!(f, "[string#{}]", id.as_u64()),
            Self::Object(id) => write!(f, "[object#{}]", id.as_u64()),
            Self::Labeled(id) => write!(f, "[labeled#{}]", id.as_u64()),
        }
    }
}

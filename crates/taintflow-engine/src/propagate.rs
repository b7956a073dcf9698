//! The propagation contract.
//!
//! Every value-producing operation labels its result with the union of
//! its operand labels: null union means an unlabeled result; otherwise
//! the label goes onto the result's native header when it has one
//! (string, object) and into a fresh wrapper when it does not.  An
//! operation that skips an operand's label is a taint-loss bug, so all
//! operations here funnel through [`Runtime::merge_operand_labels`] and
//! [`Runtime::attach`].
//!
//! Comparison is the deliberate exception: equality reads *through*
//! wrappers and ignores labels entirely.  Taint changes what a value
//! carries, never what it equals.

use crate::label::Label;
use crate::runtime::Runtime;
use crate::value::Value;

impl Runtime {
    /// Union of the labels of all operands, in order.
    pub fn merge_operand_labels(&mut self, operands: &[Value]) -> Label {
        let mut label = Label::none();
        for &operand in operands {
            let operand_label = self.heap.label_of(operand);
            label = self.labels.merge(&label, &operand_label);
        }
        label
    }

    /// Attach `label` to `value` by the native-or-wrap rule.
    pub fn attach(&mut self, value: Value, label: &Label) -> Value {
        self.heap.attach_label(value, label, &mut self.labels)
    }

    /// Binary `+`: string concatenation when either unwrapped operand is
    /// a string, numeric addition otherwise.  The result carries the
    /// union of both operand labels.
    pub fn add(&mut self, lhs: Value, rhs: Value) -> Value {
        let label = self.merge_operand_labels(&[lhs, rhs]);
        let ulhs = self.heap.unwrapped(lhs);
        let urhs = self.heap.unwrapped(rhs);

        if ulhs.is_string() || urhs.is_string() {
            let contents = format!(
                "{}{}",
                self.heap.display_string(ulhs),
                self.heap.display_string(urhs)
            );
            return self.heap.alloc_str_labeled(contents, label);
        }

        let result = match (self.heap.to_number(ulhs), self.heap.to_number(urhs)) {
            (Some(a), Some(b)) => Value::Int(a.wrapping_add(b)),
            _ => Value::Undefined,
        };
        self.attach(result, &label)
    }

    /// Numeric `-`.
    pub fn subtract(&mut self, lhs: Value, rhs: Value) -> Value {
        self.numeric_op(lhs, rhs, i64::wrapping_sub)
    }

    /// Numeric `*`.
    pub fn multiply(&mut self, lhs: Value, rhs: Value) -> Value {
        self.numeric_op(lhs, rhs, i64::wrapping_mul)
    }

    fn numeric_op(&mut self, lhs: Value, rhs: Value, op: fn(i64, i64) -> i64) -> Value {
        let label = self.merge_operand_labels(&[lhs, rhs]);
        let result = match (self.heap.to_number(lhs), self.heap.to_number(rhs)) {
            (Some(a), Some(b)) => Value::Int(op(a, b)),
            _ => Value::Undefined,
        };
        self.attach(result, &label)
    }

    /// String concatenation of the printable forms of both operands.
    pub fn concat(&mut self, lhs: Value, rhs: Value) -> Value {
        let label = self.merge_operand_labels(&[lhs, rhs]);
        let contents = format!(
            "{}{}",
            self.heap.display_string(lhs),
            self.heap.display_string(rhs)
        );
        self.heap.alloc_str_labeled(contents, label)
    }

    /// `typeof`: the type string of the *inner* value, carrying the
    /// operand's label on the result string.
    pub fn type_of(&mut self, value: Value) -> Value {
        let label = self.heap.label_of(value);
        let name = self.heap.type_name(value);
        self.heap.alloc_str_labeled(name, label)
    }

    /// Loose equality over unwrapped values.  Label-blind: wrappers are
    /// resolved first and labels never influence the outcome.
    pub fn loose_equals(&self, lhs: Value, rhs: Value) -> bool {
        let ulhs = self.heap.unwrapped(lhs);
        let urhs = self.heap.unwrapped(rhs);
        match (ulhs, urhs) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(_), _) | (_, Value::Bool(_))
                if !ulhs.is_object() && !urhs.is_object() =>
            {
                match (self.heap.to_number(ulhs), self.heap.to_number(urhs)) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            (Value::Str(_), Value::Str(_)) => {
                self.heap.str_contents(ulhs) == self.heap.str_contents(urhs)
            }
            (Value::Int(_), Value::Str(_)) | (Value::Str(_), Value::Int(_)) => {
                match (self.heap.to_number(ulhs), self.heap.to_number(urhs)) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }

    /// Single-character access on a string.  The extracted character (and
    /// an out-of-range miss) carries the source string's label: the
    /// result is constructed from labeled input either way.
    pub fn char_at(&mut self, value: Value, index: usize) -> Value {
        let label = self.heap.label_of(value);
        let unwrapped = self.heap.unwrapped(value);
        let extracted = match self.heap.str_contents(unwrapped) {
            Some(contents) => contents.chars().nth(index),
            None => return self.attach(Value::Undefined, &label),
        };
        match extracted {
            Some(c) => self.heap.alloc_str_labeled(c.to_string(), label),
            None => self.attach(Value::Undefined, &label),
        }
    }
}

//! Cons-cell construction and traversal.
//!
//! Pairlists are singly-linked chains of `(tag, head, tail)` triples used
//! for call forms, unevaluated argument lists, and attribute maps. A
//! well-formed chain is nil-terminated; traversal walks `tail` links until
//! nil, one cell per step. A cyclic chain is a precondition violation and
//! traversal will not terminate, matching the host runtime's own behavior.
//!
//! Cells are heap slots like any other value: a freshly consed cell must be
//! protected before the next allocation that does not already hold a
//! reference to it. Protecting the head of a chain protects the whole chain
//! transitively.

use crate::error::BridgeError;
use crate::heap::Heap;
use crate::intern::Symbol;
use crate::value::{Kind, Value, ValueData};

fn not_a_pair(op: &str, found: Kind) -> BridgeError {
    BridgeError::InvalidArgument(format!("{}: expected a pairlist cell, found {}", op, found))
}

impl Heap {
    /// Allocate a new cons cell.
    ///
    /// `tail` should be nil or another cell; like any allocation this may
    /// trigger a collection pass, so `head` and `tail` must already be
    /// reachable from a root.
    pub fn cons(&mut self, tag: Option<Symbol>, head: Value, tail: Value) -> Value {
        self.alloc_node(ValueData::Pair { tag, head, tail })
    }

    /// Head of a cell; nil's head is nil
    pub fn head(&self, cell: Value) -> Result<Value, BridgeError> {
        match &self.node(cell).data {
            ValueData::Pair { head, .. } | ValueData::Lang { head, .. } => Ok(*head),
            ValueData::Nil => Ok(Value::NIL),
            other => Err(not_a_pair("head", other.kind())),
        }
    }

    /// Tail of a cell; nil's tail is nil
    pub fn tail(&self, cell: Value) -> Result<Value, BridgeError> {
        match &self.node(cell).data {
            ValueData::Pair { tail, .. } | ValueData::Lang { tail, .. } => Ok(*tail),
            ValueData::Nil => Ok(Value::NIL),
            other => Err(not_a_pair("tail", other.kind())),
        }
    }

    /// Tag of a cell, if any
    pub fn tag(&self, cell: Value) -> Result<Option<Symbol>, BridgeError> {
        match &self.node(cell).data {
            ValueData::Pair { tag, .. } => Ok(*tag),
            ValueData::Lang { .. } | ValueData::Nil => Ok(None),
            other => Err(not_a_pair("tag", other.kind())),
        }
    }

    pub fn set_head(&mut self, cell: Value, value: Value) -> Result<(), BridgeError> {
        match &mut self.node_mut(cell).data {
            ValueData::Pair { head, .. } | ValueData::Lang { head, .. } => {
                *head = value;
                Ok(())
            }
            other => Err(not_a_pair("set_head", other.kind())),
        }
    }

    pub fn set_tail(&mut self, cell: Value, value: Value) -> Result<(), BridgeError> {
        match &mut self.node_mut(cell).data {
            ValueData::Pair { tail, .. } | ValueData::Lang { tail, .. } => {
                *tail = value;
                Ok(())
            }
            other => Err(not_a_pair("set_tail", other.kind())),
        }
    }

    pub fn set_tag(&mut self, cell: Value, new_tag: Option<Symbol>) -> Result<(), BridgeError> {
        match &mut self.node_mut(cell).data {
            ValueData::Pair { tag, .. } => {
                *tag = new_tag;
                Ok(())
            }
            other => Err(not_a_pair("set_tag", other.kind())),
        }
    }

    /// O(n) traversal to the head of the nth cell; past the end of the
    /// chain the result is nil. There is no random access by design.
    pub fn nth(&self, chain: Value, n: usize) -> Value {
        let mut cur = chain;
        let mut remaining = n;
        loop {
            match &self.node(cur).data {
                ValueData::Pair { head, tail, .. } | ValueData::Lang { head, tail } => {
                    if remaining == 0 {
                        return *head;
                    }
                    remaining -= 1;
                    cur = *tail;
                }
                _ => return Value::NIL,
            }
        }
    }

    /// Compose a call representation from an operator and a nil-terminated
    /// argument chain. The operator is typically a symbol but may be any
    /// callable value.
    pub fn to_language_form(&mut self, operator: Value, args: Value) -> Result<Value, BridgeError> {
        match self.kind_of(args) {
            Kind::Pair | Kind::Nil => {}
            other => {
                return Err(BridgeError::InvalidArgument(format!(
                    "to_language_form: argument chain must be a pairlist or nil, found {}",
                    other
                )))
            }
        }
        Ok(self.alloc_node(ValueData::Lang {
            head: operator,
            tail: args,
        }))
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Look up an attribute by symbol equality. Linear search over the
    /// attribute pairlist; attribute lists are expected to stay small.
    pub fn get_attribute(&self, v: Value, name: Symbol) -> Option<Value> {
        let mut cur = self.node(v).attrs;
        loop {
            match &self.node(cur).data {
                ValueData::Pair { tag, head, tail } => {
                    if *tag == Some(name) {
                        return Some(*head);
                    }
                    cur = *tail;
                }
                _ => return None,
            }
        }
    }

    /// Set, replace, or (when `value` is nil) remove an attribute.
    ///
    /// Appending allocates the attribute cell, so `value` must already be
    /// rooted when this is called.
    pub fn set_attribute(
        &mut self,
        v: Value,
        name: Symbol,
        value: Value,
    ) -> Result<(), BridgeError> {
        if v.is_nil() {
            return Err(BridgeError::InvalidArgument(
                "set_attribute: cannot set attributes on nil".to_string(),
            ));
        }

        if value.is_nil() {
            self.remove_attribute(v, name);
            return Ok(());
        }

        // Replace in place when the attribute already exists
        let mut cur = self.node(v).attrs;
        loop {
            match &self.node(cur).data {
                ValueData::Pair { tag, tail, .. } => {
                    if *tag == Some(name) {
                        return self.set_head(cur, value);
                    }
                    cur = *tail;
                }
                _ => break,
            }
        }

        // Prepend a new cell; the cell is attached before any further
        // allocation can run, so it needs no explicit protection
        let attrs = self.node(v).attrs;
        let cell = self.cons(Some(name), value, attrs);
        self.node_mut(v).attrs = cell;
        Ok(())
    }

    fn remove_attribute(&mut self, v: Value, name: Symbol) {
        let mut prev = Value::NIL;
        let mut cur = self.node(v).attrs;
        loop {
            let (tag, tail) = match &self.node(cur).data {
                ValueData::Pair { tag, tail, .. } => (*tag, *tail),
                _ => return,
            };
            if tag == Some(name) {
                if prev.is_nil() {
                    self.node_mut(v).attrs = tail;
                } else {
                    // prev is a cell we just traversed
                    let _ = self.set_tail(prev, tail);
                }
                return;
            }
            prev = cur;
            cur = tail;
        }
    }
}

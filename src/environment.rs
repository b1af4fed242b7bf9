//! Environment for variable bindings
//!
//! Environments form a chain of frames, each child holding a shared
//! reference to its parent. The chain always ends at the builtins frame,
//! whose contents come from the immutable registry in [`crate::builtins`].
//! Evaluation happens in a "global" frame directly above it, or in frames
//! created for function calls and `let` blocks.
//!
//! Parent links are strong, so a closure keeps alive every frame it can see.
//! A frame that binds a closure created in that same frame is a reference
//! cycle and is only freed by [`Environment::clear`]. Sessions clear their
//! global frame when they end; a function body that defines its own recursive
//! helper leaves one such cycle behind per call.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;
use rustc_hash::FxHashMap;

use crate::builtins;
use crate::error::{CarlaeError, Result};
use crate::language::{Value, is_valid_variable_name};

// ============================================================================
// Environment
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    Builtins,
    Local,
}

struct Frame {
    bindings: RefCell<FxHashMap<String, Value>>,
    parent: Option<Environment>,
    scope: Scope,
}

/// Outcome of `set!` on an environment chain.
#[derive(Debug)]
pub enum Assignment {
    /// The name was bound in some frame and now holds the new value
    Updated(Value),
    /// No frame in the chain binds the name
    Unbound,
    /// The name only resolves to a builtin, which cannot be rebound
    Builtin,
}

/// A handle to one frame of an environment chain.
///
/// Cloning is cheap (an `Rc` increment) and yields a handle to the same frame.
#[derive(Clone)]
pub struct Environment {
    frame: Rc<Frame>,
}

thread_local! {
    static BUILTINS: Environment = Environment {
        frame: Rc::new(Frame {
            bindings: RefCell::new(FxHashMap::default()),
            parent: None,
            scope: Scope::Builtins,
        }),
    };
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Create a new, empty global environment above the builtins
    pub fn new() -> Self {
        Environment::builtins().child()
    }

    /// The shared root frame holding the builtins
    pub fn builtins() -> Self {
        BUILTINS.with(Environment::clone)
    }

    /// Create an empty child frame whose parent is this one
    pub fn child(&self) -> Self {
        Environment {
            frame: Rc::new(Frame {
                bindings: RefCell::new(FxHashMap::default()),
                parent: Some(self.clone()),
                scope: Scope::Local,
            }),
        }
    }

    /// Create a child frame binding each name to the matching value
    pub fn extend(&self, names: &[String], values: Vec<Value>) -> Result<Self> {
        let env = self.child();
        for (name, value) in names.iter().zip(values) {
            env.define(name, value)?;
        }
        Ok(env)
    }

    pub fn is_builtins(&self) -> bool {
        self.frame.scope == Scope::Builtins
    }

    pub fn parent(&self) -> Option<&Environment> {
        self.frame.parent.as_ref()
    }

    pub fn same_frame(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }

    /// Bind a variable in THIS frame, replacing any existing local binding
    pub fn define(&self, name: &str, value: Value) -> Result<Value> {
        if !is_valid_variable_name(name) {
            return Err(CarlaeError::name(format!(
                "'{name}' is not a valid variable name"
            )));
        }
        if self.is_builtins() {
            return Err(CarlaeError::evaluation(format!(
                "cannot define '{name}' in the builtins environment"
            )));
        }
        debug!("define {name}");
        self.frame
            .bindings
            .borrow_mut()
            .insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Look up a variable, walking up the parent chain
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut env = self;
        loop {
            if env.is_builtins() {
                return builtins::lookup(name);
            }
            if let Some(value) = env.frame.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            env = env.parent()?;
        }
    }

    /// Rebind an existing variable in the nearest frame that has it
    pub fn assign(&self, name: &str, value: Value) -> Assignment {
        let mut env = self;
        loop {
            if env.is_builtins() {
                return match builtins::lookup(name) {
                    Some(_) => Assignment::Builtin,
                    None => Assignment::Unbound,
                };
            }
            if let Some(slot) = env.frame.bindings.borrow_mut().get_mut(name) {
                *slot = value.clone();
                return Assignment::Updated(value);
            }
            match env.parent() {
                Some(parent) => env = parent,
                None => return Assignment::Unbound,
            }
        }
    }

    /// Remove a binding from THIS frame only; parents are never touched
    pub fn delete(&self, name: &str) -> Option<Value> {
        if self.is_builtins() {
            return None;
        }
        self.frame.bindings.borrow_mut().remove(name)
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.frame.bindings.borrow().contains_key(name)
    }

    /// Drop every local binding.
    ///
    /// A frame holding a closure defined in that same frame forms an `Rc`
    /// cycle; clearing the frame at the end of a session releases it.
    pub fn clear(&self) {
        let bindings = std::mem::take(&mut *self.frame.bindings.borrow_mut());
        drop(bindings);
    }
}

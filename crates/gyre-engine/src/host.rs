//! Host interpreter interface
//!
//! The bridge needs very little from the embedding interpreter: a warning
//! channel, global variables (output references of member reads), and a way
//! to call a host function by name when a signal fires.

use std::rc::Rc;

use crate::value::HostValue;

/// A first-class host callable used as a signal target.
pub type HostClosure = Rc<dyn Fn(Vec<HostValue>) -> Result<HostValue, String>>;

/// Operations the bridge consumes from the host interpreter.
pub trait HostInterpreter {
    /// Emit a non-fatal warning
    fn warn(&self, message: &str);

    /// Read a global variable
    fn get_global(&self, name: &str) -> Option<HostValue>;

    /// Write a global variable
    fn set_global(&self, name: &str, value: HostValue);

    /// Call a host function by name with positional arguments
    fn call(&self, function: &str, args: Vec<HostValue>) -> Result<HostValue, String>;
}

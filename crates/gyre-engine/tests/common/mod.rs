//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use gyre_engine::{
    BridgeOptions, DynamicHandle, HostClosure, HostInterpreter, HostValue, Repository,
    TypeDescriptor,
};
use gyre_sdk::{Oracle, RawInfo};
use gyre_testkit::MockRepository;
use rustc_hash::FxHashMap;

/// Host that records warnings, globals and named calls
#[derive(Default)]
pub struct RecordingHost {
    warnings: RefCell<Vec<String>>,
    globals: RefCell<FxHashMap<String, HostValue>>,
    functions: RefCell<FxHashMap<String, HostClosure>>,
    calls: RefCell<Vec<(String, usize)>>,
}

impl RecordingHost {
    pub fn define(
        &self,
        name: &str,
        f: impl Fn(Vec<HostValue>) -> Result<HostValue, String> + 'static,
    ) {
        self.functions.borrow_mut().insert(name.to_string(), Rc::new(f));
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.borrow().clone()
    }

    pub fn global(&self, name: &str) -> Option<HostValue> {
        self.globals.borrow().get(name).cloned()
    }

    pub fn take_global(&self, name: &str) -> Option<HostValue> {
        self.globals.borrow_mut().remove(name)
    }

    /// Named calls as (function, argument count)
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.borrow().clone()
    }
}

impl HostInterpreter for RecordingHost {
    fn warn(&self, message: &str) {
        self.warnings.borrow_mut().push(message.to_string());
    }

    fn get_global(&self, name: &str) -> Option<HostValue> {
        self.global(name)
    }

    fn set_global(&self, name: &str, value: HostValue) {
        self.globals.borrow_mut().insert(name.to_string(), value);
    }

    fn call(&self, function: &str, args: Vec<HostValue>) -> Result<HostValue, String> {
        self.calls.borrow_mut().push((function.to_string(), args.len()));
        let target = self.functions.borrow().get(function).cloned();
        match target {
            Some(f) => f(args),
            None => Err(format!("undefined function {}", function)),
        }
    }
}

pub struct Fixture {
    pub mock: Rc<MockRepository>,
    pub host: Rc<RecordingHost>,
    pub repo: Repository,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_options(BridgeOptions::default())
    }

    pub fn with_options(options: BridgeOptions) -> Self {
        let mock = Rc::new(MockRepository::new());
        let host = Rc::new(RecordingHost::default());
        let oracle: Rc<dyn Oracle> = mock.clone();
        let repo = Repository::with_options(oracle, host.clone(), options);
        Self { mock, host, repo }
    }

    pub fn descriptor(&self, raw: RawInfo) -> TypeDescriptor {
        TypeDescriptor::retain(self.repo.oracle(), raw)
    }

    /// Unbound handle on a builder entry
    pub fn class(&self, raw: RawInfo) -> DynamicHandle {
        DynamicHandle::unbound(&self.repo, self.descriptor(raw))
    }

    /// Fresh instance of `info` wrapped in a handle; the handle holds the
    /// only reference
    pub fn instance(&self, info: RawInfo) -> DynamicHandle {
        let ptr = self.mock.new_instance(info);
        let handle = DynamicHandle::retained(&self.repo, Some(self.descriptor(info)), ptr);
        gyre_sdk::ObjectRuntime::object_unref(&*self.mock, ptr);
        handle
    }
}

pub fn handle_of(value: HostValue) -> DynamicHandle {
    match value {
        HostValue::Handle(handle) => handle,
        other => panic!("expected a handle, got {:?}", other),
    }
}

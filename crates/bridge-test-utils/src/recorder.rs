//! Records which advice ran, and in what order

use std::cell::RefCell;
use std::rc::Rc;

use bridge_spec::{AdviceResult, Spec};

/// Shared log of labels pushed by recording advice
#[derive(Debug, Clone, Default)]
pub struct AdviceRecorder {
    events: Rc<RefCell<Vec<String>>>,
}

impl AdviceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// An advice callable that records `label` each time it runs
    pub fn advice(&self, label: impl Into<String>) -> impl Fn(&mut Spec) -> AdviceResult + 'static {
        let events = Rc::clone(&self.events);
        let label = label.into();
        move |_spec: &mut Spec| {
            events.borrow_mut().push(label.clone());
            Ok(())
        }
    }

    /// Register a recording advice under `group`, labelled with the group name
    pub fn attach(&self, spec: &mut Spec, group: &str) {
        spec.add_advice(group, self.advice(group))
            .unwrap_or_else(|err| panic!("failed to attach recorder to '{group}': {err}"));
    }

    /// Attach to every group in `groups`
    pub fn attach_all(&self, spec: &mut Spec, groups: &[&str]) {
        for group in groups {
            self.attach(spec, group);
        }
    }

    /// Push a label directly, e.g. from a custom step
    pub fn record(&self, label: impl Into<String>) {
        self.events.borrow_mut().push(label.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    /// How many times `label` was recorded
    pub fn count(&self, label: &str) -> usize {
        self.events.borrow().iter().filter(|e| *e == label).count()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.count(label) > 0
    }
}

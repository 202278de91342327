//! Synchronous callback lists for UI state changes.

/// Handle returned by [`Observers::register`], used to unregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Callback<T> = Box<dyn FnMut(&T) -> anyhow::Result<()>>;

/// Ordered observer list. A failing observer is logged and skipped; the rest
/// are still notified.
pub struct Observers<T> {
    label: &'static str,
    next_id: u64,
    entries: Vec<(ObserverId, Callback<T>)>,
}

impl<T> Observers<T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn register(
        &mut self,
        callback: impl FnMut(&T) -> anyhow::Result<()> + 'static,
    ) -> ObserverId {
        self.next_id += 1;
        let id = ObserverId(self.next_id);
        self.entries.push((id, Box::new(callback)));
        id
    }

    pub fn unregister(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    /// Call every observer in registration order; returns how many failed.
    pub fn notify(&mut self, value: &T) -> usize {
        let mut failures = 0;
        for (id, callback) in &mut self.entries {
            if let Err(e) = callback(value) {
                failures += 1;
                log::error!("{} observer {:?} failed: {:#}", self.label, id, e);
            }
        }
        failures
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> std::fmt::Debug for Observers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("label", &self.label)
            .field("len", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn failing_observer_does_not_block_the_rest() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut obs = Observers::<f32>::new("radius");
        obs.register(|_| anyhow::bail!("boom"));
        let sink = seen.clone();
        obs.register(move |v| {
            sink.borrow_mut().push(*v);
            Ok(())
        });
        assert_eq!(obs.notify(&42.0), 1);
        assert_eq!(*seen.borrow(), vec![42.0]);
    }

    #[test]
    fn unregister_removes_only_that_observer() {
        let mut obs = Observers::<bool>::new("mouse output");
        let a = obs.register(|_| Ok(()));
        obs.register(|_| Ok(()));
        assert!(obs.unregister(a));
        assert!(!obs.unregister(a));
        assert_eq!(obs.len(), 1);
    }
}

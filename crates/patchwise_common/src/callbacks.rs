//! Update lifecycle hooks
//!
//! Hooks run synchronously in registration order. The first error stops the
//! remaining hooks for that event and is returned to the caller.

use crate::version::Version;
use anyhow::Result;
use tracing::debug;

/// Called after each version is applied: `(version, was_simulated)`
pub type VersionAppliedHook = Box<dyn FnMut(&Version, bool) -> Result<()> + Send>;

/// Called once after the whole plan has been applied
pub type AllFinishedHook = Box<dyn FnMut(&[Version]) -> Result<()> + Send>;

#[derive(Default)]
pub struct CallbackDispatcher {
    per_version: Vec<VersionAppliedHook>,
    all_finished: Vec<AllFinishedHook>,
}

impl CallbackDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_per_version<F>(&mut self, hook: F)
    where
        F: FnMut(&Version, bool) -> Result<()> + Send + 'static,
    {
        self.per_version.push(Box::new(hook));
    }

    pub fn register_all_finished<F>(&mut self, hook: F)
    where
        F: FnMut(&[Version]) -> Result<()> + Send + 'static,
    {
        self.all_finished.push(Box::new(hook));
    }

    pub fn fire_per_version(&mut self, version: &Version, was_simulated: bool) -> Result<()> {
        debug!(
            "Firing {} version hooks for {}",
            self.per_version.len(),
            version
        );
        for hook in self.per_version.iter_mut() {
            hook(version, was_simulated)?;
        }
        Ok(())
    }

    pub fn fire_all_finished(&mut self, applied: &[Version]) -> Result<()> {
        debug!("Firing {} completion hooks", self.all_finished.len());
        for hook in self.all_finished.iter_mut() {
            hook(applied)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for CallbackDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackDispatcher")
            .field("per_version", &self.per_version.len())
            .field("all_finished", &self.all_finished.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_hooks_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = CallbackDispatcher::new();

        for tag in ["first", "second"] {
            let log = log.clone();
            dispatcher.register_per_version(move |version, simulated| {
                log.lock()
                    .unwrap()
                    .push(format!("{}:{}:{}", tag, version, simulated));
                Ok(())
            });
        }

        dispatcher
            .fire_per_version(&Version::from("1.1"), true)
            .unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:1.1:true".to_string(), "second:1.1:true".to_string()]
        );
    }

    #[test]
    fn test_first_error_stops_dispatch() {
        let calls = Arc::new(Mutex::new(0));
        let mut dispatcher = CallbackDispatcher::new();

        dispatcher.register_all_finished(|_| anyhow::bail!("disk full"));
        let counter = calls.clone();
        dispatcher.register_all_finished(move |_| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        let err = dispatcher.fire_all_finished(&[]).unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_all_finished_receives_applied_list() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = CallbackDispatcher::new();
        let sink = seen.clone();
        dispatcher.register_all_finished(move |applied| {
            sink.lock().unwrap().extend(applied.iter().cloned());
            Ok(())
        });

        let applied = vec![Version::from("1.1"), Version::from("1.2")];
        dispatcher.fire_all_finished(&applied).unwrap();
        assert_eq!(*seen.lock().unwrap(), applied);
    }

    #[test]
    fn test_no_hooks_is_ok() {
        let mut dispatcher = CallbackDispatcher::new();
        assert!(dispatcher.fire_per_version(&Version::from("2.0"), false).is_ok());
        assert!(dispatcher.fire_all_finished(&[]).is_ok());
    }
}

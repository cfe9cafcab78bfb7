//! Name → driver constructor registry, populated at startup.

use std::collections::HashMap;
use std::fmt;

use crate::Driver;

type Factory = Box<dyn Fn() -> Box<dyn Driver> + Send + Sync>;

/// The set of games a server can host.
#[derive(Default)]
pub struct DriverRegistry {
    factories: HashMap<String, Factory>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Driver> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.insert(name.clone(), Box::new(factory)).is_some() {
            tracing::warn!(driver = %name, "driver registered twice, keeping the last one");
        }
    }

    /// Builds a fresh driver instance, or `None` for an unknown name.
    pub fn create(&self, name: &str) -> Option<Box<dyn Driver>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}

//! Module handles and loader entries.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-erased, cheaply clonable handle to a loaded module.
///
/// Clones share the same allocation, so [`ModuleHandle::ptr_eq`] identifies
/// handles that came from the same successful load.
#[derive(Clone)]
pub struct ModuleHandle {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ModuleHandle {
    pub fn new<T: Any + Send + Sync>(module: T) -> Self {
        Self {
            inner: Arc::new(module),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Borrow the module as `T`, or `None` if the handle holds another type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Whether two handles point at the same loaded module.
    pub fn ptr_eq(&self, other: &ModuleHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleHandle({})", self.type_name)
    }
}

/// Load function of a single candidate.
pub type LoaderFn = Arc<dyn Fn() -> anyhow::Result<ModuleHandle> + Send + Sync>;

/// One candidate implementation for a capability.
///
/// The try order is the order entries are passed to
/// [`ImportManager::register`](super::ImportManager::register); the manager
/// stamps each entry with its position at registration time.
#[derive(Clone)]
pub struct LoaderEntry {
    description: String,
    position: usize,
    load: LoaderFn,
}

impl LoaderEntry {
    pub fn new<F>(description: impl Into<String>, load: F) -> Self
    where
        F: Fn() -> anyhow::Result<ModuleHandle> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            position: 0,
            load: Arc::new(load),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn with_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    pub(crate) fn load_fn(&self) -> LoaderFn {
        Arc::clone(&self.load)
    }
}

impl fmt::Debug for LoaderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderEntry")
            .field("position", &self.position)
            .field("description", &self.description)
            .finish()
    }
}

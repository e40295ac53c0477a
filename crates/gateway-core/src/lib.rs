//! The Gateway (C6): loads modules in order against a `ModuleLoader`, wires
//! requested broker subscriptions straight into each module's `receive`
//! capability, and guarantees reverse-order teardown on both rollback
//! (partial failure during `create`) and normal shutdown (`Drop`).

mod error;
mod instance;

pub use error::GatewayError;

use broker::Subscriber;
use instance::ModuleInstance;
use loader::ModuleLoader;
use module::ModuleHandle;

/// Asks the Gateway to open a broker `Subscriber` on the module's behalf
/// and forward matching messages into its `receive` capability.
pub struct SubscribeSpec {
    pub address: String,
    pub topic: String,
}

/// One entry of a gateway descriptor: a module to load, its opaque
/// configuration bytes, and an optional broker wiring request.
pub struct ModuleDescriptorEntry {
    pub path: String,
    pub config: Vec<u8>,
    pub subscribe: Option<SubscribeSpec>,
}

/// An ordered set of fully-created modules. Every entry in `modules` has
/// already survived `create`; there are no half-initialized instances.
pub struct Gateway {
    modules: Vec<ModuleInstance>,
}

impl Gateway {
    /// Loads every entry in `descriptor`, in order. On the first failure,
    /// destroys every already-appended instance in reverse order (the
    /// §4.6 rollback policy) and returns the error that identifies the
    /// failing module path.
    pub fn create(
        descriptor: &[ModuleDescriptorEntry],
        loader: &dyn ModuleLoader,
    ) -> Result<Gateway, GatewayError> {
        let mut modules: Vec<ModuleInstance> = Vec::with_capacity(descriptor.len());
        for entry in descriptor {
            match Self::create_one(entry, loader) {
                Ok(instance) => modules.push(instance),
                Err(err) => {
                    while let Some(instance) = modules.pop() {
                        instance.destroy();
                    }
                    return Err(err);
                }
            }
        }
        Ok(Gateway { modules })
    }

    /// Loads and appends one module to an already-running gateway, using
    /// the same create/subscribe sequence as one iteration of `create`.
    pub fn add_module(
        &mut self,
        entry: &ModuleDescriptorEntry,
        loader: &dyn ModuleLoader,
    ) -> Result<ModuleHandle, GatewayError> {
        let instance = Self::create_one(entry, loader)?;
        let handle = instance.handle();
        self.modules.push(instance);
        Ok(handle)
    }

    /// Tears down and removes the instance with the given handle identity.
    /// A no-op if no instance matches.
    pub fn remove_module(&mut self, handle: ModuleHandle) {
        if let Some(pos) = self.modules.iter().position(|m| m.handle() == handle) {
            let instance = self.modules.remove(pos);
            instance.destroy();
        }
    }

    fn create_one(
        entry: &ModuleDescriptorEntry,
        loader: &dyn ModuleLoader,
    ) -> Result<ModuleInstance, GatewayError> {
        let library = loader.load(&entry.path).map_err(|source| GatewayError::Load {
            path: entry.path.clone(),
            source,
        })?;

        let handle =
            unsafe { (library.apis().create)(entry.config.as_ptr(), entry.config.len()) };
        if handle.is_null() {
            return Err(GatewayError::ModuleCreateFailed {
                path: entry.path.clone(),
            });
        }

        let mut instance = ModuleInstance::new(entry.path.clone(), library, handle);

        if let Some(spec) = &entry.subscribe {
            let callback = instance.deliver_callback();
            let subscriber = Subscriber::connect(&spec.address).map_err(|source| {
                GatewayError::Subscribe {
                    path: entry.path.clone(),
                    source,
                }
            })?;
            subscriber
                .subscribe(&spec.topic, callback)
                .map_err(|source| GatewayError::Subscribe {
                    path: entry.path.clone(),
                    source,
                })?;
            instance.attach_subscriber(subscriber);
        }

        tracing::debug!(path = %entry.path, "module created");
        Ok(instance)
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        while let Some(instance) = self.modules.pop() {
            instance.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loader::{LoaderError, ModuleLibrary};
    use module::ModuleApis;
    use std::sync::Mutex;

    static LOG: Mutex<Vec<String>> = Mutex::new(Vec::new());

    unsafe extern "C" fn fake_create(config: *const u8, config_len: usize) -> ModuleHandle {
        let name = std::str::from_utf8(std::slice::from_raw_parts(config, config_len))
            .unwrap()
            .to_string();
        if name == "fail" {
            return std::ptr::null_mut();
        }
        LOG.lock().unwrap().push(format!("create:{name}"));
        Box::into_raw(Box::new(name)) as ModuleHandle
    }

    unsafe extern "C" fn fake_destroy(handle: ModuleHandle) {
        let name = *Box::from_raw(handle as *mut String);
        LOG.lock().unwrap().push(format!("destroy:{name}"));
    }

    static FAKE_APIS: ModuleApis = ModuleApis {
        create: fake_create,
        destroy: fake_destroy,
        receive: None,
    };

    struct FakeLibrary;

    impl ModuleLibrary for FakeLibrary {
        fn apis(&self) -> &ModuleApis {
            &FAKE_APIS
        }
    }

    struct FakeLoader;

    impl ModuleLoader for FakeLoader {
        fn load(&self, path: &str) -> Result<Box<dyn ModuleLibrary>, LoaderError> {
            if path == "missing" {
                return Err(LoaderError::SymbolMissing {
                    path: path.to_string(),
                    symbol: module::MODULE_GETAPIS_NAME.to_string(),
                });
            }
            Ok(Box::new(FakeLibrary))
        }
    }

    fn entry(path: &str) -> ModuleDescriptorEntry {
        ModuleDescriptorEntry {
            path: path.to_string(),
            config: path.as_bytes().to_vec(),
            subscribe: None,
        }
    }

    #[test]
    fn rollback_destroys_already_created_instances_in_reverse_order() {
        LOG.lock().unwrap().clear();
        let descriptor = vec![entry("a"), entry("fail"), entry("c")];
        let err = Gateway::create(&descriptor, &FakeLoader).unwrap_err();
        assert!(matches!(err, GatewayError::ModuleCreateFailed { path } if path == "fail"));
        assert_eq!(*LOG.lock().unwrap(), vec!["create:a", "destroy:a"]);
    }

    #[test]
    fn load_failure_rolls_back_without_touching_later_entries() {
        LOG.lock().unwrap().clear();
        let descriptor = vec![entry("a"), entry("missing"), entry("c")];
        let err = Gateway::create(&descriptor, &FakeLoader).unwrap_err();
        assert!(matches!(err, GatewayError::Load { path, .. } if path == "missing"));
        assert_eq!(*LOG.lock().unwrap(), vec!["create:a", "destroy:a"]);
    }

    #[test]
    fn drop_tears_down_in_exact_reverse_of_creation_order() {
        LOG.lock().unwrap().clear();
        let descriptor = vec![entry("a"), entry("b")];
        let gateway = Gateway::create(&descriptor, &FakeLoader).unwrap();
        drop(gateway);
        assert_eq!(
            *LOG.lock().unwrap(),
            vec!["create:a", "create:b", "destroy:b", "destroy:a"]
        );
    }

    #[test]
    fn remove_module_tears_down_only_the_matching_instance() {
        LOG.lock().unwrap().clear();
        let descriptor = vec![entry("a"), entry("b")];
        let mut gateway = Gateway::create(&descriptor, &FakeLoader).unwrap();
        let b_handle = gateway.modules[1].handle();
        gateway.remove_module(b_handle);
        assert_eq!(*LOG.lock().unwrap(), vec!["create:a", "create:b", "destroy:b"]);
        assert_eq!(gateway.modules.len(), 1);
        drop(gateway);
        assert_eq!(
            *LOG.lock().unwrap(),
            vec!["create:a", "create:b", "destroy:b", "destroy:a"]
        );
    }
}

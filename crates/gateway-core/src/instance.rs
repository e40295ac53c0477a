use std::sync::Arc;

use loader::ModuleLibrary;
use message::Message;
use module::{ModuleApis, ModuleHandle, RawMessage, RawProperty};

/// A raw capability-vector pointer plus module handle, copyable and usable
/// from any thread. The module contract (§4.4) requires `destroy` and
/// `receive` to be safe to invoke from any thread, so carrying these two
/// raw pointers across a thread boundary is within the contract even
/// though neither type is `Send` on its own.
#[derive(Clone, Copy)]
struct ModuleRef {
    apis: *const ModuleApis,
    handle: ModuleHandle,
}

unsafe impl Send for ModuleRef {}
unsafe impl Sync for ModuleRef {}

impl ModuleRef {
    pub(crate) fn deliver(&self, msg: &Message) {
        let apis = unsafe { &*self.apis };
        let Some(receive) = apis.receive else {
            return;
        };

        let properties: Vec<RawProperty> = msg
            .properties()
            .iter()
            .map(|(k, v)| RawProperty {
                key: k.as_ptr(),
                key_len: k.len(),
                value: v.as_ptr(),
                value_len: v.len(),
            })
            .collect();

        let raw = RawMessage {
            content: msg.content().as_ptr(),
            content_len: msg.content().len(),
            properties: properties.as_ptr(),
            properties_len: properties.len(),
        };

        unsafe { receive(self.handle, &raw as *const RawMessage) };
    }
}

/// One hosted module, fully created: library handle, capability vector,
/// module instance handle, and (if the descriptor asked for it) the broker
/// subscription forwarding into the module's `receive` capability.
pub(crate) struct ModuleInstance {
    pub(crate) path: String,
    library: Box<dyn ModuleLibrary>,
    module_ref: ModuleRef,
    subscriber: Option<Arc<broker::Subscriber>>,
}

impl ModuleInstance {
    pub(crate) fn new(
        path: String,
        library: Box<dyn ModuleLibrary>,
        handle: ModuleHandle,
    ) -> ModuleInstance {
        let apis: *const ModuleApis = library.apis();
        ModuleInstance {
            path,
            library,
            module_ref: ModuleRef { apis, handle },
            subscriber: None,
        }
    }

    pub(crate) fn handle(&self) -> ModuleHandle {
        self.module_ref.handle
    }

    pub(crate) fn attach_subscriber(&mut self, subscriber: Arc<broker::Subscriber>) {
        self.subscriber = Some(subscriber);
    }

    /// Unsubscribe (if wired), invoke `destroy`, then unload the library.
    /// This exact sequence is the only teardown path: both
    /// `Gateway::create`'s rollback and `Drop for Gateway` call it, so the
    /// ordering invariant (never unload a library whose module still has a
    /// live thread or a live broker subscription) can't be bypassed.
    pub(crate) fn destroy(self) {
        if let Some(subscriber) = &self.subscriber {
            subscriber.unsubscribe();
        }
        let apis = unsafe { &*self.module_ref.apis };
        unsafe { (apis.destroy)(self.module_ref.handle) };
        drop(self.library);
    }

    pub(crate) fn deliver(&self, msg: &Message) {
        self.module_ref.deliver(msg);
    }

    /// A free-standing callback suitable for `broker::Subscriber::subscribe`.
    /// `ModuleRef` is `Copy`, so the closure captures the raw capability
    /// pointer and handle by value instead of borrowing `self` — the
    /// subscriber outlives the borrow-checker scope this method is called
    /// from, so a borrow would not work here anyway.
    pub(crate) fn deliver_callback(&self) -> impl Fn(Message) + Send + Sync + 'static {
        let module_ref = self.module_ref;
        move |msg| module_ref.deliver(&msg)
    }
}

//! Provider/hook dispatch for Rust.
//!
//! Providers obtain data items, either on a timer, from a blocking source on
//! a dedicated thread, or from external callers through a correlated message
//! queue, and fan each item out to their registered hooks concurrently. The
//! gathered results keep hook registration order.
//!
//! ```no_run
//! use hookwork::prelude::*;
//!
//! let mut provider = ComplexProvider::new("parity", Passthrough::<u64, bool>::new());
//! provider.add_hook(hook_fn("even", |n: &u64| Ok(n % 2 == 0)));
//! let messages = provider.message_system();
//!
//! let mut server = Server::new();
//! server.add_plugins(TracingPlugin::default());
//! server.register(provider).unwrap();
//! let handle = server.handle();
//!
//! std::thread::spawn(move || {
//!     let answer = messages.send_wait_answer_blocking(7, None).unwrap();
//!     assert_eq!(answer[0], Ok(false));
//!     handle.stop();
//! });
//! server.run().unwrap();
//! ```

pub use hookwork_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use hookwork_internal::prelude::*;
}

//! Handler trait and type erasure.
//!
//! The middleware wraps *arbitrary* downstream handlers, so it needs to hold
//! them behind one concrete type. We use trait objects (`dyn ErasedHandler`)
//! to hide the concrete handler type behind a common interface.
//!
//! The chain from user code to vtable call is:
//!
//! ```text
//! async fn get_item(req: Request) -> Result<Response, Error> { … }
//!        ↓ RequestLogger::wrap(get_item)
//! get_item.into_boxed_handler()                    ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(get_item))                    ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req)  at request time               ← one vtable dispatch
//! ```
//!
//! The only runtime cost per request is one Arc clone (atomic inc) plus one
//! virtual call — negligible compared to network I/O.
//!
//! Handlers are fallible by design: returning `Err(Error)` is how business
//! logic signals a failure to the single translation point at the boundary.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Error;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future resolving to a handler outcome.
///
/// `Pin<Box<…>>` because the runtime must be able to poll the future
/// in-place; `Send + 'static` so it may move across worker threads.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Result<Response, Error>> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
/// External crates cannot usefully interact with this trait.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
///
/// `Arc` gives cheap, thread-safe shared ownership without copying the
/// handler.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` with the signature:
///
/// ```text
/// async fn name(req: Request) -> Result<impl IntoResponse, Error>
/// ```
///
/// The trait is **sealed** (via the private `Sealed` supertrait): only the
/// blanket impl below can satisfy it. This prevents accidental misuse and
/// keeps the API surface stable across versions.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

/// The sealing module. Because `Sealed` is private, external crates cannot
/// name it and therefore cannot implement `Handler` on their own types.
mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

/// Implement `Handler` for any function with the right signature.
impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Newtype wrapper that holds a concrete handler `F` and implements
/// [`ErasedHandler`], bridging the typed world to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.map(IntoResponse::into_response) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Classification;

    async fn ok_handler(_req: Request) -> Result<&'static str, Error> {
        Ok("hello")
    }

    async fn err_handler(_req: Request) -> Result<Response, Error> {
        Err(Error::classified(Classification::NotFound))
    }

    #[tokio::test]
    async fn erased_handler_maps_into_response() {
        let handler = ok_handler.into_boxed_handler();
        let resp = handler
            .call(Request::builder().build())
            .await
            .expect("handler should succeed");
        assert_eq!(resp.body(), b"hello");
    }

    #[tokio::test]
    async fn erased_handler_propagates_errors() {
        let handler = err_handler.into_boxed_handler();
        let err = handler
            .call(Request::builder().build())
            .await
            .expect_err("handler should fail");
        assert_eq!(err.code(), "This");
    }
}

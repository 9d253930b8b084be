//! Failure boundary around the whole request chain.
//!
//! A panic anywhere below the boundary becomes a JSON error response instead of tearing down
//! the connection. Panics carrying an [`AppError`] (raised with `std::panic::panic_any`) are
//! declared failures and keep their status and message; anything else is logged with its
//! payload, origin and backtrace and answered with a generic 500.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic;

use axum::{
    body::Body,
    http::Response,
    response::IntoResponse,
};
use tower_http::catch_panic::{CatchPanicLayer, ResponseForPanic};

use crate::error::AppError;
use crate::metrics::Metrics;

thread_local! {
    // Filled by the panic hook; read back by the handler on the same thread after unwinding.
    static LAST_PANIC: RefCell<Option<PanicOrigin>> = const { RefCell::new(None) };
}

struct PanicOrigin {
    location: String,
    backtrace: Backtrace,
}

/// Records where a panic started so the boundary can log the original call stack.
///
/// Installed once at startup; chains to the previously installed hook.
pub fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "<unknown>".to_string());
        LAST_PANIC.with(|slot| {
            *slot.borrow_mut() = Some(PanicOrigin { location, backtrace: Backtrace::force_capture() });
        });
        previous(info);
    }));
}

#[derive(Clone)]
pub struct PanicResponder {
    metrics: Metrics,
}

impl ResponseForPanic for PanicResponder {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Body> {
        let origin = LAST_PANIC.with(|slot| slot.borrow_mut().take());

        let err = match err.downcast::<AppError>() {
            Ok(declared) => {
                tracing::warn!(error = %declared, "declared error raised as panic");
                return declared.into_response();
            }
            Err(other) => other,
        };

        self.metrics.inc_panics();
        let detail = panic_message(err.as_ref());
        let (location, backtrace) = match origin {
            Some(o) => (o.location, o.backtrace),
            None => ("<unknown>".to_string(), Backtrace::force_capture()),
        };
        tracing::error!(panic = %detail, %location, "request handler panicked\n{}", backtrace);

        AppError::Internal(anyhow::anyhow!("panic at {}: {}", location, detail)).into_response()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Layer to install outermost on the router.
pub fn failure_boundary(metrics: Metrics) -> CatchPanicLayer<PanicResponder> {
    CatchPanicLayer::custom(PanicResponder { metrics })
}

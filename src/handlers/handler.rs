//! # Type-erased channel handlers.
//!
//! The registry stores every handler as a [`Handler`]: a cloneable
//! `Arc<dyn Fn(&Args) -> Result<(), CallError>>`. Typed closures are adapted by
//! [`IntoHandler`], which extracts each parameter from the published [`Args`]
//! and checks the count before the closure runs.
//!
//! ## Example
//! ```rust
//! use dispatchbus::{Handler, args};
//!
//! let h = Handler::new(|a: i32, b: &'static str| {
//!     assert_eq!((a, b), (1, "x"));
//! });
//! assert!(h.call(&args![1_i32, "x"]).is_ok());
//! assert!(h.call(&args![1_i32]).is_err());
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::{ArgError, HandlerError};
use crate::handlers::value::{Args, FromArg};

/// Failure of a single handler call, before the registry attaches the channel name.
#[derive(Debug)]
pub enum CallError {
    /// Arguments did not fit the handler's parameters; the body never ran.
    Args(ArgError),
    /// The handler body returned an error.
    Failed(HandlerError),
}

impl From<ArgError> for CallError {
    fn from(e: ArgError) -> Self {
        CallError::Args(e)
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Args(e) => write!(f, "{e}"),
            CallError::Failed(e) => write!(f, "{e}"),
        }
    }
}

type ErasedFn = dyn Fn(&Args) -> Result<(), CallError> + Send + Sync + 'static;

/// Shared, type-erased handler.
///
/// Cloning is cheap (an `Arc` bump); the registry clones the handler out of the
/// table when dispatching in [`DispatchMode::Detached`](crate::DispatchMode::Detached).
#[derive(Clone)]
pub struct Handler {
    f: Arc<ErasedFn>,
    signature: &'static str,
}

impl Handler {
    /// Adapts any [`IntoHandler`] into a `Handler`.
    pub fn new<M>(h: impl IntoHandler<M>) -> Self {
        h.into_handler()
    }

    /// Wraps a closure that receives the raw argument list.
    ///
    /// Use this when a handler accepts a variable number of arguments.
    pub fn from_args<F>(f: F) -> Self
    where
        F: Fn(&Args) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Self {
            f: Arc::new(move |args: &Args| f(args).map_err(CallError::Failed)),
            signature: "fn(&Args)",
        }
    }

    /// Invokes the handler with `args`.
    #[inline]
    pub fn call(&self, args: &Args) -> Result<(), CallError> {
        (self.f)(args)
    }

    /// Signature the handler was built from (diagnostics only).
    #[inline]
    pub fn signature(&self) -> &'static str {
        self.signature
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("signature", &self.signature)
            .finish()
    }
}

/// Result types a handler may return.
///
/// `()` always succeeds; `Result<(), E>` maps `Err` into [`HandlerError`].
pub trait HandlerOutput {
    fn into_result(self) -> Result<(), HandlerError>;
}

impl HandlerOutput for () {
    #[inline]
    fn into_result(self) -> Result<(), HandlerError> {
        Ok(())
    }
}

impl<E> HandlerOutput for Result<(), E>
where
    E: Into<HandlerError>,
{
    #[inline]
    fn into_result(self) -> Result<(), HandlerError> {
        self.map_err(Into::into)
    }
}

/// Conversion into a [`Handler`].
///
/// Implemented for [`Handler`] itself and for closures `Fn(A1, .., An) -> R`
/// with up to eight parameters, where each `Ai: FromArg` and `R: HandlerOutput`.
/// The marker `M` only disambiguates the closure arities.
pub trait IntoHandler<M>: Send + Sync + 'static {
    fn into_handler(self) -> Handler;
}

/// Marker for [`Handler`] passed where an [`IntoHandler`] is expected.
#[doc(hidden)]
pub struct Erased;

impl IntoHandler<Erased> for Handler {
    #[inline]
    fn into_handler(self) -> Handler {
        self
    }
}

macro_rules! impl_into_handler {
    ($n:expr; $($idx:tt => $ty:ident $arg:ident),*) => {
        impl<F, R, $($ty,)*> IntoHandler<fn($($ty,)*) -> R> for F
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: HandlerOutput + 'static,
            $($ty: FromArg + 'static,)*
        {
            fn into_handler(self) -> Handler {
                Handler {
                    f: Arc::new(move |args: &Args| -> Result<(), CallError> {
                        args.expect_len($n)?;
                        $( let $arg = args.extract::<$ty>($idx)?; )*
                        (self)($($arg),*).into_result().map_err(CallError::Failed)
                    }),
                    signature: std::any::type_name::<fn($($ty,)*) -> R>(),
                }
            }
        }
    };
}

impl_into_handler!(0;);
impl_into_handler!(1; 0 => A1 a1);
impl_into_handler!(2; 0 => A1 a1, 1 => A2 a2);
impl_into_handler!(3; 0 => A1 a1, 1 => A2 a2, 2 => A3 a3);
impl_into_handler!(4; 0 => A1 a1, 1 => A2 a2, 2 => A3 a3, 3 => A4 a4);
impl_into_handler!(5; 0 => A1 a1, 1 => A2 a2, 2 => A3 a3, 3 => A4 a4, 4 => A5 a5);
impl_into_handler!(6; 0 => A1 a1, 1 => A2 a2, 2 => A3 a3, 3 => A4 a4, 4 => A5 a5, 5 => A6 a6);
impl_into_handler!(7; 0 => A1 a1, 1 => A2 a2, 2 => A3 a3, 3 => A4 a4, 4 => A5 a5, 5 => A6 a6, 6 => A7 a7);
impl_into_handler!(8; 0 => A1 a1, 1 => A2 a2, 2 => A3 a3, 3 => A4 a4, 4 => A5 a5, 5 => A6 a6, 6 => A7 a7, 7 => A8 a8);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use std::sync::Mutex;

    #[test]
    fn test_zero_arity() {
        let hits = Arc::new(Mutex::new(0));
        let h = {
            let hits = Arc::clone(&hits);
            Handler::new(move || *hits.lock().unwrap() += 1)
        };
        h.call(&args![]).unwrap();
        assert_eq!(*hits.lock().unwrap(), 1);
        assert!(matches!(
            h.call(&args![1_u8]),
            Err(CallError::Args(ArgError::Arity { expected: 0, got: 1 }))
        ));
    }

    #[test]
    fn test_arguments_forwarded_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let h = {
            let seen = Arc::clone(&seen);
            Handler::new(move |n: i32, s: &'static str, flag: bool| {
                seen.lock().unwrap().push(format!("{n}:{s}:{flag}"));
            })
        };
        h.call(&args![1_i32, "x", true]).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["1:x:true".to_string()]);
    }

    #[test]
    fn test_type_mismatch_does_not_run_body() {
        let h = Handler::new(|_: u64| -> () { panic!("must not run") });
        match h.call(&args![1_i32]) {
            Err(CallError::Args(ArgError::Type { index, expected, found })) => {
                assert_eq!(index, 0);
                assert_eq!(expected, "u64");
                assert_eq!(found, "i32");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_result_output_maps_error() {
        let h = Handler::new(|code: u16| -> Result<(), String> {
            if code >= 400 { Err(format!("status {code}")) } else { Ok(()) }
        });
        assert!(h.call(&args![200_u16]).is_ok());
        match h.call(&args![404_u16]) {
            Err(CallError::Failed(e)) => assert_eq!(e.to_string(), "status 404"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_raw_handler_sees_all_args() {
        let h = Handler::from_args(|args: &Args| {
            if args.len() == 3 { Ok(()) } else { Err("need three".into()) }
        });
        assert!(h.call(&args![1, 2, 3]).is_ok());
        assert!(matches!(h.call(&args![1]), Err(CallError::Failed(_))));
        assert_eq!(h.signature(), "fn(&Args)");
    }

    #[test]
    fn test_handler_into_handler_is_identity() {
        let h = Handler::new(|| ());
        let again = Handler::new(h.clone());
        assert!(Arc::ptr_eq(&h.f, &again.f));
    }
}

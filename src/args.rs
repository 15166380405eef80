//! Loosely typed positional arguments.
//!
//! [`Input`] is a plain value as the blocking forms receive it. [`Arg`]
//! additionally admits a callable, for the slots of the callback/future
//! forms; the dispatcher decides what each slot means per call.

use std::fmt;

use serde_json::Value;

use crate::error::Result;

/// Completion callback, invoked exactly once with the outcome.
pub type Callback<T> = Box<dyn FnOnce(Result<T>) + Send + 'static>;

/// A plain argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// `Value::Null` means "not supplied".
    Value(Value),
    /// NaN or an infinity. JSON has no encoding for these and serde_json
    /// would turn them into null.
    NonFinite(f64),
}

impl Input {
    pub fn null() -> Self {
        Input::Value(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Input::Value(Value::Null))
    }
}

impl Default for Input {
    fn default() -> Self {
        Input::null()
    }
}

impl From<()> for Input {
    fn from(_: ()) -> Self {
        Input::null()
    }
}

impl From<f64> for Input {
    fn from(v: f64) -> Self {
        if v.is_finite() {
            Input::Value(Value::from(v))
        } else {
            Input::NonFinite(v)
        }
    }
}

pub enum Arg<T> {
    Value(Input),
    Callback(Callback<T>),
}

impl<T> Arg<T> {
    pub fn callback<F>(f: F) -> Self
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        Arg::Callback(Box::new(f))
    }

    pub fn null() -> Self {
        Arg::Value(Input::null())
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Arg::Callback(_))
    }
}

impl<T> fmt::Debug for Arg<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Arg::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

impl<T> From<Input> for Arg<T> {
    fn from(v: Input) -> Self {
        Arg::Value(v)
    }
}

macro_rules! lift_args {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<T> From<$ty> for Arg<T> {
                fn from(v: $ty) -> Self {
                    Arg::Value(Input::from(v))
                }
            }
        )*
    };
}

macro_rules! value_args {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Input {
                fn from(v: $ty) -> Self {
                    Input::Value(Value::from(v))
                }
            }
        )*
        lift_args!($($ty),*);
    };
}

macro_rules! optional_args {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<Option<$ty>> for Input {
                fn from(v: Option<$ty>) -> Self {
                    v.map_or_else(Input::null, Input::from)
                }
            }
        )*
        lift_args!($(Option<$ty>),*);
    };
}

value_args!(Value, &str, String, bool, i32, i64, u32, u64);
optional_args!(&str, String, u32, f64);
lift_args!((), f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_is_null() {
        let arg: Arg<String> = ().into();
        assert!(matches!(arg, Arg::Value(ref v) if v.is_null()));
        assert!(Input::from(()).is_null());
    }

    #[test]
    fn none_is_null() {
        let arg: Arg<String> = None::<u32>.into();
        assert!(matches!(arg, Arg::Value(ref v) if v.is_null()));
        assert!(Input::from(None::<f64>).is_null());
    }

    #[test]
    fn non_finite_floats_stay_supplied() {
        for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let input = Input::from(v);
            assert!(!input.is_null(), "{v}");
            assert!(matches!(input, Input::NonFinite(_)));

            let arg: Arg<String> = Some(v).into();
            assert!(matches!(arg, Arg::Value(Input::NonFinite(_))));
        }
        assert_eq!(Input::from(12.0), Input::Value(Value::from(12.0)));
    }

    #[test]
    fn callbacks_are_callable() {
        let arg: Arg<bool> = Arg::callback(|_| {});
        assert!(arg.is_callable());
        assert!(!Arg::<bool>::from("x").is_callable());
        assert_eq!(format!("{arg:?}"), "Callback(..)");
    }
}

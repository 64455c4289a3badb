use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// Deterministic memoization of a user subcomputation (spec.md §4.7).
/// `cache(f)` returns a wrapped function that canonicalizes its argument
/// tuple and returns the stored result on a repeat call instead of invoking
/// `f` again.
///
/// Correctness presumes `f` is a pure function of its arguments — the same
/// caveat spec.md documents: memoizing something that reads or writes state
/// outside its argument list silently breaks inference semantics, because a
/// cached result is reused across what may be entirely different execution
/// paths (different enumeration branches, different particles).
pub struct Cache<F> {
    inner: F,
    table: RefCell<HashMap<Vec<Value>, Value>>,
}

impl<F> Cache<F>
where
    F: Fn(&[Value]) -> Value,
{
    pub fn new(inner: F) -> Self {
        Self { inner, table: RefCell::new(HashMap::new()) }
    }

    /// `cf(args...)` from spec.md §4.7: look up `args` in the table first;
    /// on a miss, evaluate the wrapped function and store the result before
    /// returning it.
    pub fn call(&self, args: &[Value]) -> Value {
        if let Some(cached) = self.table.borrow().get(args) {
            return cached.clone();
        }
        let result = (self.inner)(args);
        self.table.borrow_mut().insert(args.to_vec(), result.clone());
        result
    }

    pub fn call_count_for(&self, args: &[Value]) -> bool {
        self.table.borrow().contains_key(args)
    }
}

/// `cache(k, f)` from spec.md §6: wraps `f` and hands the caller a shared
/// handle to the memoized version, usable from inside any continuation.
pub fn cache<F>(f: F) -> Rc<Cache<F>>
where
    F: Fn(&[Value]) -> Value,
{
    Rc::new(Cache::new(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn cached_function_is_invoked_at_most_once_per_distinct_args() {
        let calls = Rc::new(Cell::new(0));
        let calls_inner = calls.clone();
        let wrapped = cache(move |args: &[Value]| {
            calls_inner.set(calls_inner.get() + 1);
            Value::Int(args.iter().map(|v| v.as_int().unwrap()).sum())
        });

        for _ in 0..5 {
            assert_eq!(wrapped.call(&[Value::Int(1), Value::Int(2)]), Value::Int(3));
        }
        for _ in 0..3 {
            assert_eq!(wrapped.call(&[Value::Int(3), Value::Int(4)]), Value::Int(7));
        }

        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn distinct_arg_tuples_are_cached_independently() {
        let wrapped = cache(|args: &[Value]| Value::Int(args[0].as_int().unwrap() * 2));
        assert_eq!(wrapped.call(&[Value::Int(1)]), Value::Int(2));
        assert_eq!(wrapped.call(&[Value::Int(2)]), Value::Int(4));
        assert!(wrapped.call_count_for(&[Value::Int(1)]));
        assert!(wrapped.call_count_for(&[Value::Int(2)]));
        assert!(!wrapped.call_count_for(&[Value::Int(3)]));
    }
}

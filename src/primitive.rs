use crate::value::Value;

/// `callPrimitive(k, f, args...)` from spec.md §4.8/§6: invoke a
/// non-suspending host function synchronously and resume with its result.
/// Since host functions here are plain Rust closures (nothing can suspend
/// inside them — there is no other `sample`/`factor`/`exit` to dispatch),
/// this collapses to a direct call with no coroutine involvement at all.
pub fn call_primitive(f: impl FnOnce(&[Value]) -> Value, args: &[Value]) -> Value {
    f(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_primitive_invokes_synchronously_and_returns_its_result() {
        let sum = call_primitive(|args| Value::Real(args.iter().map(|v| v.as_real().unwrap()).sum()), &[Value::Real(1.5), Value::Real(2.5)]);
        assert_eq!(sum, Value::Real(4.0));
    }
}

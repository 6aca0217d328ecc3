//! Closures and multicast delegates.

use std::sync::{Arc, Mutex};

use polydispatch::{
    Activation, Context, Delegate, DelegateTarget, MemberSignature, Program, Runtime,
    TypeDescriptor, TypeHash, Value, primitives,
};

fn h(name: &str) -> TypeHash {
    TypeHash::from_name(name)
}

type Log = Arc<Mutex<Vec<String>>>;

/// Static `Hooks.a/b/c` bodies that append their name to `log` and return
/// it; `Counter.bump` adds to the captured `count`; `Speaker.speak` is
/// virtual and overridden by `Loud`.
fn program(log: &Log) -> Arc<Program> {
    let mut ctx = Context::with_defaults().unwrap();
    ctx.register_type(
        TypeDescriptor::class("Hooks")
            .with_member(MemberSignature::method("a", vec![]).as_static())
            .with_member(MemberSignature::method("b", vec![]).as_static())
            .with_member(MemberSignature::method("c", vec![]).as_static()),
    )
    .unwrap();
    ctx.register_type(
        TypeDescriptor::class("Speaker")
            .with_member(MemberSignature::method("speak", vec![]).as_virtual()),
    )
    .unwrap();
    ctx.register_type(
        TypeDescriptor::class("Loud")
            .with_base(h("Speaker"))
            .with_member(MemberSignature::method("speak", vec![]).as_override()),
    )
    .unwrap();

    for name in ["a", "b", "c"] {
        let log = Arc::clone(log);
        ctx.implement(TypeHash::from_member(h("Hooks"), name, &[]), move |call| {
            log.lock().unwrap().push(name.to_string());
            call.set_return(Value::string(name));
            Ok(())
        });
    }
    ctx.implement(bump(), |call| {
        let frame = call
            .frame()
            .ok_or_else(|| polydispatch::RuntimeError::Native("no frame".into()))?;
        let by = call.arg(0)?.as_int().unwrap_or_default();
        let count = frame.get("count").and_then(|v| v.as_int()).unwrap_or_default();
        frame.set("count", Value::Int(count + by));
        call.set_return(Value::Int(count + by));
        Ok(())
    });
    ctx.implement(who(), |call| {
        let frame = call
            .frame()
            .ok_or_else(|| polydispatch::RuntimeError::Native("no frame".into()))?;
        let this = call.this()?.clone();
        assert_eq!(frame.this(), Some(this.clone()));
        call.set_return(this);
        Ok(())
    });
    ctx.implement(TypeHash::from_member(h("Speaker"), "speak", &[]), |call| {
        call.set_return(Value::string("hello"));
        Ok(())
    });
    ctx.implement(TypeHash::from_member(h("Loud"), "speak", &[]), |call| {
        call.set_return(Value::string("HELLO"));
        Ok(())
    });

    Arc::new(ctx.build().unwrap())
}

/// Identity of the `count += by` lambda body.
fn bump() -> TypeHash {
    TypeHash::from_member(h("Counter"), "<lambda>bump", &[primitives::INT])
}

/// Identity of a lambda body returning the captured `this`.
fn who() -> TypeHash {
    TypeHash::from_member(h("Counter"), "<lambda>who", &[])
}

fn hook(name: &str) -> Delegate {
    Delegate::from_static(TypeHash::from_member(h("Hooks"), name, &[]))
}

fn drain(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.lock().unwrap())
}

#[test]
fn test_combination_order_is_associative() {
    let log = Log::default();
    let mut rt = Runtime::new(program(&log));
    let (a, b, c) = (hook("a"), hook("b"), hook("c"));

    let left = a.combine(&b).combine(&c);
    let right = a.combine(&b.combine(&c));
    assert_eq!(left, right);

    rt.invoke_delegate(&left, &[]).unwrap();
    assert_eq!(drain(&log), ["a", "b", "c"]);
    rt.invoke_delegate(&right, &[]).unwrap();
    assert_eq!(drain(&log), ["a", "b", "c"]);
}

#[test]
fn test_invocation_yields_the_last_result() {
    let log = Log::default();
    let mut rt = Runtime::new(program(&log));
    let chain = hook("c").combine(&hook("a"));
    let result = rt.invoke_delegate(&chain, &[]).unwrap();
    assert_eq!(result.as_str(), Some("a"));
    assert_eq!(drain(&log), ["c", "a"]);
}

#[test]
fn test_remove_undoes_combine() {
    let log = Log::default();
    let mut rt = Runtime::new(program(&log));
    let (a, b) = (hook("a"), hook("b"));

    let combined = a.combine(&b);
    assert_eq!(combined.remove(&a), Some(b.clone()));
    assert_eq!(combined.remove(&b), Some(a.clone()));
    assert_eq!(combined.remove(&combined), None);
    assert_eq!(combined.remove(&hook("c")), Some(combined.clone()));

    let remaining = combined.remove(&a).unwrap();
    rt.invoke_delegate(&remaining, &[]).unwrap();
    assert_eq!(drain(&log), ["b"]);
}

#[test]
fn test_remove_takes_the_most_recent_match() {
    let (a, b) = (hook("a"), hook("b"));
    let chain = a.combine(&b).combine(&a);
    let removed = chain.remove(&a).unwrap();
    assert_eq!(removed, a.combine(&b));
}

#[test]
fn test_captured_local_is_shared_by_reference() {
    let log = Log::default();
    let mut rt = Runtime::new(program(&log));

    let mut activation = Activation::new();
    activation.declare("count", Value::Int(1));
    let frame = activation.capture(&["count"], false).unwrap();
    let counter = Delegate::new(DelegateTarget::Closure(Arc::clone(&frame)), bump());

    rt.invoke_delegate(&counter, &[Value::Int(2)]).unwrap();
    assert_eq!(activation.get("count").unwrap(), Value::Int(3));

    activation.set("count", Value::Int(10)).unwrap();
    let result = rt.invoke_delegate(&counter, &[Value::Int(1)]).unwrap();
    assert_eq!(result, Value::Int(11));
    assert_eq!(frame.get("count"), Some(Value::Int(11)));
}

#[test]
fn test_escaping_closure_outlives_its_activation() {
    let log = Log::default();
    let mut rt = Runtime::new(program(&log));

    let counter = {
        let mut activation = Activation::new();
        activation.declare("count", Value::Int(0));
        let frame = activation.capture(&["count"], false).unwrap();
        Delegate::new(DelegateTarget::Closure(frame), bump())
    };

    rt.invoke_delegate(&counter, &[Value::Int(4)]).unwrap();
    let result = rt.invoke_delegate(&counter, &[Value::Int(4)]).unwrap();
    assert_eq!(result, Value::Int(8));
}

#[test]
fn test_two_closures_share_one_captured_variable() {
    let log = Log::default();
    let mut rt = Runtime::new(program(&log));

    let mut activation = Activation::new();
    activation.declare("count", Value::Int(0));
    let first = activation.capture(&["count"], false).unwrap();
    let second = activation.capture(&["count"], false).unwrap();
    assert!(first.shares_slot_with(&second, "count"));

    let both = Delegate::new(DelegateTarget::Closure(first), bump())
        .combine(&Delegate::new(DelegateTarget::Closure(second), bump()));
    let result = rt.invoke_delegate(&both, &[Value::Int(5)]).unwrap();
    assert_eq!(result, Value::Int(10));
}

#[test]
fn test_captured_this_is_the_enclosing_instance() {
    let log = Log::default();
    let mut rt = Runtime::new(program(&log));
    let speaker = rt.new_object(h("Speaker")).unwrap();

    let mut activation = Activation::with_this(speaker.clone());
    let frame = activation.capture(&[], true).unwrap();
    let delegate = Delegate::new(DelegateTarget::Closure(frame), who());
    assert_eq!(rt.invoke_delegate(&delegate, &[]).unwrap(), speaker);
}

#[test]
fn test_bound_delegate_fixes_target_and_implementation() {
    let log = Log::default();
    let program = program(&log);
    let mut rt = Runtime::new(Arc::clone(&program));
    let binding = program.resolve_call(h("Speaker"), "speak", &[]).unwrap();

    let loud = rt.new_object(h("Loud")).unwrap();
    let delegate = rt.bind_delegate(Some(loud.clone()), &binding).unwrap();
    assert_eq!(
        delegate.entries()[0].target,
        DelegateTarget::Instance(loud)
    );
    assert_eq!(
        delegate.entries()[0].member,
        TypeHash::from_member(h("Loud"), "speak", &[])
    );
    assert_eq!(
        rt.invoke_delegate(&delegate, &[]).unwrap().as_str(),
        Some("HELLO")
    );

    assert!(rt.bind_delegate(None, &binding).is_err());
}

#[test]
fn test_concurrent_combination_produces_independent_delegates() {
    let base = hook("a");
    let (left, right) = std::thread::scope(|scope| {
        let l = scope.spawn(|| base.combine(&hook("b")));
        let r = scope.spawn(|| base.combine(&hook("c")));
        (l.join().unwrap(), r.join().unwrap())
    });
    assert_eq!(base.len(), 1);
    assert_eq!(left.len(), 2);
    assert_eq!(right.len(), 2);
    assert_ne!(left, right);
}

//! Execution.
//!
//! A [`Runtime`] pairs a shared [`Program`] with an object heap. It performs
//! the runtime half of every operation the program bound at build time:
//! applying argument conversions, selecting implementations through the
//! receiver's dispatch tables, boxing, casting, guarded array stores and
//! delegate invocation.

use std::sync::Arc;

use polydispatch_core::{
    DispatchError, ObjectHandle, Result, RuntimeError, TypeHash, TypeLookup, Value,
};
use polydispatch_resolver::{Binding, CallKind, Conversion, ConversionKind, DispatchTables};
use polydispatch_runtime::{
    CallContext, ClosureFrame, Delegate, DelegateTarget, HeapObject, ObjectBody, ObjectHeap,
    box_value, cast_value, check_covariant_write, convert_numeric, needs_covariance_check,
    select_implementation, unbox,
};
use tracing::trace;

use crate::program::Program;

/// Per-thread execution state over a shared program.
#[derive(Debug)]
pub struct Runtime {
    program: Arc<Program>,
    heap: ObjectHeap,
}

impl Runtime {
    /// Create a runtime with an empty heap.
    pub fn new(program: Arc<Program>) -> Self {
        Self {
            program,
            heap: ObjectHeap::new(),
        }
    }

    /// The program.
    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    /// The object heap.
    pub fn heap(&self) -> &ObjectHeap {
        &self.heap
    }

    /// The object heap, mutably.
    pub fn heap_mut(&mut self) -> &mut ObjectHeap {
        &mut self.heap
    }

    // ==========================================================================
    // Objects
    // ==========================================================================

    /// Allocate an instance of a concrete class.
    ///
    /// Creating the first instance of a generic instance type runs its
    /// specialization's static initializer.
    pub fn new_object(&mut self, type_hash: TypeHash) -> Result<Value> {
        let desc = self
            .program
            .type_descriptor(type_hash)
            .ok_or_else(|| RuntimeError::UnknownType(type_hash.to_string()))?;
        if !desc.kind.is_class() || desc.is_abstract() || desc.is_generic() {
            return Err(DispatchError::NotConcrete(desc.name.clone()).into());
        }
        if let Some(instance) = self.program.instance(type_hash) {
            instance.specialization.ensure_initialized();
        }
        let handle = self.heap.allocate(HeapObject::instance(type_hash));
        trace!(type_name = %desc.name, %handle, "allocated object");
        Ok(Value::Object(handle))
    }

    /// Runtime type of a value, `None` for null.
    pub fn type_of(&self, value: &Value) -> Result<Option<TypeHash>> {
        Ok(self.heap.type_of(value)?)
    }

    /// Read a static field of a generic instance, initializing its
    /// specialization on first use. Unset fields read as `Null`.
    pub fn static_field(&self, instance_hash: TypeHash, name: &str) -> Result<Value> {
        let instance = self
            .program
            .instance(instance_hash)
            .ok_or_else(|| RuntimeError::UnknownType(instance_hash.to_string()))?;
        let state = instance.specialization.ensure_initialized();
        Ok(state.get(name).unwrap_or_default())
    }

    /// Write a static field of a generic instance, initializing its
    /// specialization on first use.
    pub fn set_static_field(
        &self,
        instance_hash: TypeHash,
        name: &str,
        value: Value,
    ) -> Result<()> {
        let instance = self
            .program
            .instance(instance_hash)
            .ok_or_else(|| RuntimeError::UnknownType(instance_hash.to_string()))?;
        instance.specialization.ensure_initialized().set(name, value);
        Ok(())
    }

    // ==========================================================================
    // Boxing and Casts
    // ==========================================================================

    /// Box a value-kind payload into a fresh heap cell.
    pub fn box_value(&mut self, value: Value) -> Result<Value> {
        let universe = self.program.universe();
        Ok(Value::Object(box_value(&mut self.heap, value, &universe)?))
    }

    /// Copy the payload out of a boxed cell whose tag is exactly `expected`.
    pub fn unbox(&self, value: &Value, expected: TypeHash) -> Result<Value> {
        let universe = self.program.universe();
        let handle = value.as_object().ok_or_else(|| RuntimeError::InvalidCast {
            from: self.describe_value(value),
            to: universe.type_name(expected),
        })?;
        Ok(unbox(&self.heap, handle, expected, &universe)?)
    }

    /// Cast a value to `target`, checking its runtime type.
    pub fn cast(&mut self, value: Value, target: TypeHash) -> Result<Value> {
        let universe = self.program.universe();
        Ok(cast_value(&mut self.heap, value, target, &universe)?)
    }

    fn describe_value(&self, value: &Value) -> String {
        match self.heap.type_of(value) {
            Ok(Some(tag)) => self.program.type_name(tag),
            Ok(None) => "null".to_string(),
            Err(_) => "stale object".to_string(),
        }
    }

    // ==========================================================================
    // Arrays
    // ==========================================================================

    /// Allocate an array of `len` elements of `element_type`.
    ///
    /// Reference arrays start filled with null; value arrays are filled by
    /// the caller before use.
    pub fn new_array(&mut self, element_type: TypeHash, len: usize) -> Result<Value> {
        let universe = self.program.universe();
        if universe.lookup(element_type).is_none() {
            return Err(RuntimeError::UnknownType(element_type.to_string()).into());
        }
        let tag = universe.root_type().unwrap_or(element_type);
        let handle = self.heap.allocate(HeapObject::array(tag, element_type, len));
        Ok(Value::Object(handle))
    }

    fn array_handle(&self, array: &Value) -> Result<ObjectHandle> {
        let handle = array
            .as_object()
            .ok_or_else(|| RuntimeError::NotAnArray(self.describe_value(array)))?;
        Ok(handle)
    }

    /// Element type an array was created with and its length.
    fn array_shape(&self, handle: ObjectHandle) -> Result<(TypeHash, usize)> {
        match &self.heap.get(handle)?.body {
            ObjectBody::Array {
                element_type,
                elements,
            } => Ok((*element_type, elements.len())),
            _ => Err(RuntimeError::NotAnArray(handle.to_string()).into()),
        }
    }

    /// Number of elements.
    pub fn array_len(&self, array: &Value) -> Result<usize> {
        let handle = self.array_handle(array)?;
        Ok(self.array_shape(handle)?.1)
    }

    /// Read an element.
    pub fn array_load(&self, array: &Value, index: usize) -> Result<Value> {
        let handle = self.array_handle(array)?;
        match &self.heap.get(handle)?.body {
            ObjectBody::Array { elements, .. } => elements.get(index).cloned().ok_or_else(|| {
                RuntimeError::IndexOutOfBounds {
                    index,
                    len: elements.len(),
                }
                .into()
            }),
            _ => Err(RuntimeError::NotAnArray(handle.to_string()).into()),
        }
    }

    /// Store an element through a reference whose static element type is
    /// `declared_element`.
    ///
    /// Value arrays accept exactly their element type. Stores into reference
    /// arrays check the written value against the array's actual element
    /// type; with elision enabled, a sealed declared type that matches the
    /// array only needs the written value to fit the declared type. Value
    /// payloads stored into reference arrays are boxed.
    ///
    /// The array holds a reference to what it stores and releases the
    /// element it replaces.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn array_store(
        &mut self,
        array: &Value,
        declared_element: TypeHash,
        index: usize,
        value: Value,
    ) -> Result<()> {
        let handle = self.array_handle(array)?;
        let (actual, len) = self.array_shape(handle)?;
        if index >= len {
            return Err(RuntimeError::IndexOutOfBounds { index, len }.into());
        }

        let universe = self.program.universe();
        let value_array = universe.is_value_type(actual);
        let written = self.heap.type_of(&value)?;
        match written {
            None if value_array => {
                return Err(RuntimeError::InvalidCast {
                    from: "null".to_string(),
                    to: universe.type_name(actual),
                }
                .into());
            }
            None => {}
            Some(written) if value_array => {
                if written != actual {
                    return Err(RuntimeError::InvalidCast {
                        from: universe.type_name(written),
                        to: universe.type_name(actual),
                    }
                    .into());
                }
            }
            Some(written) => {
                let elide = self.program.config().elide_sealed_variance_checks
                    && !needs_covariance_check(declared_element, &universe)
                    && (declared_element == actual
                        || universe.is_reference_assignable(declared_element, actual));
                if !elide {
                    check_covariant_write(declared_element, actual, written, &universe)?;
                } else if !universe.is_assignable_to(written, declared_element) {
                    return Err(RuntimeError::InvalidCast {
                        from: universe.type_name(written),
                        to: universe.type_name(declared_element),
                    }
                    .into());
                }
            }
        }

        let value = if !value_array && value.is_value_kind() {
            Value::Object(box_value(&mut self.heap, value, &universe)?)
        } else {
            if let Some(stored) = value.as_object() {
                self.heap.add_ref(stored);
            }
            value
        };
        let previous = match &mut self.heap.get_mut(handle)?.body {
            ObjectBody::Array { elements, .. } => elements
                .get_mut(index)
                .map(|slot| std::mem::replace(slot, value)),
            _ => return Err(RuntimeError::NotAnArray(handle.to_string()).into()),
        };
        if let Some(replaced) = previous.as_ref().and_then(Value::as_object) {
            self.heap.release(replaced);
        }
        Ok(())
    }

    // ==========================================================================
    // Invocation
    // ==========================================================================

    /// Invoke a bound call.
    ///
    /// Arguments are converted as the binding prescribes; the implementation
    /// is selected through the receiver's runtime type for virtual and
    /// interface calls.
    ///
    /// Heap cells created while converting arguments belong to the call and
    /// are released when it returns. A body that keeps one must `add_ref`
    /// it; a cell returned as the result passes to the caller.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn invoke(
        &mut self,
        binding: &Binding,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value> {
        let member = &binding.member;
        if args.len() != binding.param_types.len() {
            return Err(RuntimeError::ArgumentCount {
                name: member.name.clone(),
                expected: binding.param_types.len(),
                got: args.len(),
            }
            .into());
        }

        let mut converted = Vec::with_capacity(args.len());
        let mut temporaries = Vec::new();
        let mut outcome: Result<()> = Ok(());
        for ((arg, conversion), &param) in args
            .into_iter()
            .zip(&binding.conversions)
            .zip(&binding.param_types)
        {
            let inline = arg.as_object().is_none();
            match self.apply_conversion(arg, conversion, param) {
                Ok(value) => {
                    if let Some(cell) = value.as_object().filter(|_| inline) {
                        temporaries.push(cell);
                    }
                    converted.push(value);
                }
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }

        let result = outcome.and_then(|()| self.dispatch_bound(binding, receiver, &converted));
        let returned = result.as_ref().ok().and_then(Value::as_object);
        for cell in temporaries {
            if Some(cell) != returned {
                self.heap.release(cell);
            }
        }
        result
    }

    fn dispatch_bound(
        &mut self,
        binding: &Binding,
        receiver: Option<Value>,
        args: &[Value],
    ) -> Result<Value> {
        let member = &binding.member;
        let this = if member.is_static {
            None
        } else {
            match receiver {
                Some(value) if !value.is_null() => Some(value),
                _ => return Err(RuntimeError::NullReference(member.name.clone()).into()),
            }
        };
        let tables = match &this {
            Some(value) => self.receiver_tables(value, binding)?,
            None => None,
        };

        let implementation = select_implementation(
            binding.call_kind,
            member.member_hash(),
            tables.as_deref(),
            &member.name,
        )?;
        trace!(member = %member.name, %implementation, "invoking");
        self.call_body(implementation, &member.name, this, args, None)
    }

    /// Dispatch tables of the receiver's runtime type, when the call kind
    /// needs them.
    fn receiver_tables(
        &self,
        receiver: &Value,
        binding: &Binding,
    ) -> Result<Option<Arc<DispatchTables>>> {
        if binding.call_kind == CallKind::Direct {
            return Ok(None);
        }
        let Some(tag) = self.heap.type_of(receiver)? else {
            return Ok(None);
        };
        Ok(Some(self.program.dispatch_tables(tag)?))
    }

    /// Apply one argument conversion at runtime.
    fn apply_conversion(
        &mut self,
        value: Value,
        conversion: &Conversion,
        param: TypeHash,
    ) -> Result<Value> {
        match &conversion.kind {
            ConversionKind::Identity | ConversionKind::ReferenceWidening { .. } => Ok(value),
            ConversionKind::Primitive { to, .. } => self.convert_primitive(value, *to),
            ConversionKind::Boxing { .. } => {
                if value.is_value_kind() {
                    self.box_value(value)
                } else {
                    Ok(value)
                }
            }
            ConversionKind::UserDefined { operator, from, .. } => {
                let input = match value.inline_type() {
                    Some(source) if source != *from => {
                        convert_numeric(&value, *from).unwrap_or(value)
                    }
                    _ => value,
                };
                let output = self.call_body(*operator, "conversion operator", None, &[input], None)?;
                self.fit_to_parameter(output, param)
            }
            ConversionKind::Downcast { target } | ConversionKind::Unboxing { target } => {
                self.cast(value, *target)
            }
        }
    }

    fn convert_primitive(&self, value: Value, to: TypeHash) -> Result<Value> {
        convert_numeric(&value, to).ok_or_else(|| {
            RuntimeError::InvalidCast {
                from: self.describe_value(&value),
                to: self.program.type_name(to),
            }
            .into()
        })
    }

    /// Widen an operator result to the parameter type it feeds.
    fn fit_to_parameter(&mut self, value: Value, param: TypeHash) -> Result<Value> {
        match value.inline_type() {
            Some(ty) if ty == param => Ok(value),
            Some(_) if value.is_value_kind() && !self.program.universe().is_value_type(param) => {
                self.box_value(value)
            }
            Some(_) if value.is_value_kind() => self.convert_primitive(value, param),
            _ => Ok(value),
        }
    }

    fn call_body(
        &mut self,
        member: TypeHash,
        name: &str,
        this: Option<Value>,
        args: &[Value],
        frame: Option<&Arc<ClosureFrame>>,
    ) -> Result<Value> {
        // Members of generic instances share the body of their open member.
        let natives = self.program.natives();
        let body = natives
            .get(member)
            .or_else(|| {
                self.program
                    .generics()
                    .member_origin(member)
                    .and_then(|open| natives.get(open))
            })
            .cloned()
            .ok_or_else(|| RuntimeError::MissingImplementation(name.to_string()))?;
        let mut ctx = CallContext::new(this, args, frame, &mut self.heap);
        body.call(&mut ctx)?;
        Ok(ctx.take_return())
    }

    // ==========================================================================
    // Delegates
    // ==========================================================================

    /// Build a single-entry delegate from a bound member and a target.
    ///
    /// Static members take no target. For instance members the
    /// implementation is selected through the target's runtime type now; the
    /// delegate keeps calling that implementation on that target.
    pub fn bind_delegate(&self, target: Option<Value>, binding: &Binding) -> Result<Delegate> {
        let member = &binding.member;
        if member.is_static {
            return Ok(Delegate::from_static(member.member_hash()));
        }
        let target = match target {
            Some(value) if !value.is_null() => value,
            _ => return Err(RuntimeError::NullReference(member.name.clone()).into()),
        };
        let tables = self.receiver_tables(&target, binding)?;
        let implementation = select_implementation(
            binding.call_kind,
            member.member_hash(),
            tables.as_deref(),
            &member.name,
        )?;
        Ok(Delegate::new(DelegateTarget::Instance(target), implementation))
    }

    /// Invoke every entry of a delegate in order with the same arguments.
    ///
    /// Returns the last entry's result.
    pub fn invoke_delegate(&mut self, delegate: &Delegate, args: &[Value]) -> Result<Value> {
        let mut result = Value::Null;
        for entry in delegate.entries() {
            let name = entry.member.to_string();
            let (this, frame) = match &entry.target {
                DelegateTarget::None => (None, None),
                DelegateTarget::Instance(receiver) => (Some(receiver.clone()), None),
                DelegateTarget::Closure(frame) => (frame.this(), Some(frame)),
            };
            result = self.call_body(entry.member, &name, this, args, frame)?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Context;
    use polydispatch_core::{MemberSignature, TypeDescriptor, primitives};

    fn h(name: &str) -> TypeHash {
        TypeHash::from_name(name)
    }

    fn runtime() -> Runtime {
        let mut ctx = Context::with_defaults().unwrap();
        ctx.register_type(TypeDescriptor::class("Shape").as_abstract())
            .unwrap();
        ctx.register_type(TypeDescriptor::class("Circle").with_base(h("Shape")))
            .unwrap();
        ctx.register_type(
            TypeDescriptor::class("Util")
                .with_member(
                    MemberSignature::method("twice", vec![primitives::DOUBLE])
                        .as_static()
                        .returns(primitives::DOUBLE),
                ),
        )
        .unwrap();
        let twice = TypeHash::from_member(h("Util"), "twice", &[primitives::DOUBLE]);
        ctx.implement(twice, |call| {
            let x = call.arg(0)?.as_double().unwrap_or_default();
            call.set_return(Value::Double(x * 2.0));
            Ok(())
        });
        Runtime::new(Arc::new(ctx.build().unwrap()))
    }

    #[test]
    fn abstract_types_cannot_be_allocated() {
        let mut rt = runtime();
        assert!(rt.new_object(h("Shape")).is_err());
        let circle = rt.new_object(h("Circle")).unwrap();
        assert_eq!(rt.type_of(&circle).unwrap(), Some(h("Circle")));
    }

    #[test]
    fn static_call_applies_primitive_widening() {
        let mut rt = runtime();
        let binding = rt
            .program()
            .resolve_call(h("Util"), "twice", &[primitives::INT])
            .unwrap();
        let result = rt.invoke(&binding, None, vec![Value::Int(4)]).unwrap();
        assert_eq!(result, Value::Double(8.0));
    }

    #[test]
    fn argument_count_is_checked() {
        let mut rt = runtime();
        let binding = rt
            .program()
            .resolve_call(h("Util"), "twice", &[primitives::DOUBLE])
            .unwrap();
        let err = rt.invoke(&binding, None, vec![]).unwrap_err();
        assert!(err.to_string().contains("expects 1 argument"));
    }

    #[test]
    fn array_bounds() {
        let mut rt = runtime();
        let array = rt.new_array(h("Shape"), 2).unwrap();
        assert_eq!(rt.array_len(&array).unwrap(), 2);
        assert_eq!(rt.array_load(&array, 1).unwrap(), Value::Null);
        assert!(rt.array_load(&array, 2).is_err());
        assert!(rt.array_len(&Value::Int(1)).is_err());
    }
}

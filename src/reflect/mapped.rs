//! Declarative binding of native functions to reflected overloads.
//!
//! A native function describes itself through the [`FromData`] and
//! [`IntoReturn`] impls of its signature; binding compares that description
//! against the declared [`Parameter`] list and rejects mismatches before any
//! script runs.

use std::any::TypeId;
use std::cell::RefCell;
use std::rc::Rc;

use crate::reflect::bind_error::BindError;
use crate::reflect::data::{Data, Type};
use crate::reflect::function::{Callable, Function, Overload, Parameter};
use crate::runtime::runtime_error::RuntimeError;

// =============================================================================
// Value marker
// =============================================================================

/// Marker for plain value types that can cross the native boundary.
/// Implemented for the primitives here; hosts register their own types with
/// [`native_value!`](crate::native_value).
pub trait NativeValue: std::any::Any + Clone {}

/// Mark host types as bindable by value.
#[macro_export]
macro_rules! native_value {
    ($($ty:ty),* $(,)?) => {
        $(impl $crate::reflect::mapped::NativeValue for $ty {})*
    };
}

native_value!(bool, u8, i32, u32, i64, f32, f64, char, String);

// =============================================================================
// Parameter wrappers
// =============================================================================

/// Mutable reference to script-owned storage; writes are visible to the
/// caller.
pub struct Ref<T>(Rc<RefCell<T>>);

impl<T> Ref<T> {
    pub fn borrow(&self) -> std::cell::Ref<'_, T> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> std::cell::RefMut<'_, T> {
        self.0.borrow_mut()
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.0.borrow().clone()
    }

    pub fn set(&self, value: T) {
        *self.0.borrow_mut() = value;
    }
}

impl<T> From<Rc<RefCell<T>>> for Ref<T> {
    fn from(cell: Rc<RefCell<T>>) -> Ref<T> {
        Ref(cell)
    }
}

/// Shared read-only view of script-owned storage.
pub struct ConstRef<T>(Rc<RefCell<T>>);

impl<T> ConstRef<T> {
    pub fn borrow(&self) -> std::cell::Ref<'_, T> {
        self.0.borrow()
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.0.borrow().clone()
    }
}

impl<T> From<Rc<RefCell<T>>> for ConstRef<T> {
    fn from(cell: Rc<RefCell<T>>) -> ConstRef<T> {
        ConstRef(cell)
    }
}

/// Nullable mutable reference.
pub struct Ptr<T>(Option<Rc<RefCell<T>>>);

impl<T> Ptr<T> {
    pub fn null() -> Ptr<T> {
        Ptr(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn get(&self) -> Option<Ref<T>> {
        self.0.clone().map(Ref)
    }
}

impl<T> From<Rc<RefCell<T>>> for Ptr<T> {
    fn from(cell: Rc<RefCell<T>>) -> Ptr<T> {
        Ptr(Some(cell))
    }
}

/// Nullable read-only reference.
pub struct ConstPtr<T>(Option<Rc<RefCell<T>>>);

impl<T> ConstPtr<T> {
    pub fn null() -> ConstPtr<T> {
        ConstPtr(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn get(&self) -> Option<ConstRef<T>> {
        self.0.clone().map(ConstRef)
    }
}

// =============================================================================
// Native signatures
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    Value,
    Reference,
    ConstReference,
    Pointer,
    ConstPointer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Void,
    Value,
    Reference,
    Pointer,
}

/// One parameter of a native function as the type system sees it.
#[derive(Debug, Clone, Copy)]
pub struct NativeParam {
    pub mode: ParamMode,
    pub id: TypeId,
    /// Element type when this parameter collects trailing arguments into a
    /// vector.
    pub element_id: Option<TypeId>,
}

/// Shape of a native function, derived from its parameter and return types.
pub struct NativeSignature {
    pub return_kind: ReturnKind,
    pub return_id: Option<TypeId>,
    pub params: Vec<NativeParam>,
}

/// Conversion from boxed script values into one native parameter.
pub trait FromData: Sized + 'static {
    const MODE: ParamMode;

    fn native_id() -> TypeId;

    /// Set when this type collects trailing arguments.
    fn element_id() -> Option<TypeId> {
        None
    }

    fn from_data(data: &Data) -> Result<Self, RuntimeError>;

    /// Consume arguments starting at `*idx`. `collect` is set for the
    /// parameter bound to a repeating declaration.
    fn take(
        function: &str,
        name: &str,
        args: &[Data],
        idx: &mut usize,
        collect: bool,
    ) -> Result<Self, RuntimeError> {
        let _ = collect;
        let data = args
            .get(*idx)
            .ok_or_else(|| RuntimeError::MissingParameter {
                function: function.to_owned(),
                parameter: name.to_owned(),
            })?;
        *idx += 1;
        Self::from_data(data)
    }

    fn native_param() -> NativeParam {
        NativeParam {
            mode: Self::MODE,
            id: Self::native_id(),
            element_id: Self::element_id(),
        }
    }
}

impl<T: NativeValue> FromData for T {
    const MODE: ParamMode = ParamMode::Value;

    fn native_id() -> TypeId {
        TypeId::of::<T>()
    }

    fn from_data(data: &Data) -> Result<T, RuntimeError> {
        data.get::<T>()
    }
}

impl<T: NativeValue> FromData for Ref<T> {
    const MODE: ParamMode = ParamMode::Reference;

    fn native_id() -> TypeId {
        TypeId::of::<T>()
    }

    fn from_data(data: &Data) -> Result<Ref<T>, RuntimeError> {
        if data.is_constant() {
            return Err(RuntimeError::ConstantViolation {
                name: data.ty().name().to_owned(),
            });
        }
        Ok(Ref(data.cell::<T>()?))
    }
}

impl<T: NativeValue> FromData for ConstRef<T> {
    const MODE: ParamMode = ParamMode::ConstReference;

    fn native_id() -> TypeId {
        TypeId::of::<T>()
    }

    fn from_data(data: &Data) -> Result<ConstRef<T>, RuntimeError> {
        Ok(ConstRef(data.cell::<T>()?))
    }
}

impl<T: NativeValue> FromData for Ptr<T> {
    const MODE: ParamMode = ParamMode::Pointer;

    fn native_id() -> TypeId {
        TypeId::of::<T>()
    }

    fn from_data(data: &Data) -> Result<Ptr<T>, RuntimeError> {
        if data.is_null() {
            return Ok(Ptr(None));
        }
        if data.is_constant() {
            return Err(RuntimeError::ConstantViolation {
                name: data.ty().name().to_owned(),
            });
        }
        Ok(Ptr(Some(data.cell::<T>()?)))
    }
}

impl<T: NativeValue> FromData for ConstPtr<T> {
    const MODE: ParamMode = ParamMode::ConstPointer;

    fn native_id() -> TypeId {
        TypeId::of::<T>()
    }

    fn from_data(data: &Data) -> Result<ConstPtr<T>, RuntimeError> {
        if data.is_null() {
            return Ok(ConstPtr(None));
        }
        Ok(ConstPtr(Some(data.cell::<T>()?)))
    }
}

impl<T: NativeValue> FromData for Vec<T> {
    const MODE: ParamMode = ParamMode::Value;

    fn native_id() -> TypeId {
        TypeId::of::<Vec<T>>()
    }

    fn element_id() -> Option<TypeId> {
        Some(TypeId::of::<T>())
    }

    fn from_data(data: &Data) -> Result<Vec<T>, RuntimeError> {
        data.get::<Vec<T>>()
    }

    fn take(
        function: &str,
        name: &str,
        args: &[Data],
        idx: &mut usize,
        collect: bool,
    ) -> Result<Vec<T>, RuntimeError> {
        if !collect {
            let data = args
                .get(*idx)
                .ok_or_else(|| RuntimeError::MissingParameter {
                    function: function.to_owned(),
                    parameter: name.to_owned(),
                })?;
            *idx += 1;
            return Self::from_data(data);
        }

        // a single argument already holding the whole vector passes through
        if args.len() - *idx == 1 {
            if let Ok(whole) = args[*idx].get::<Vec<T>>() {
                *idx = args.len();
                return Ok(whole);
            }
        }

        let mut out = Vec::with_capacity(args.len() - *idx);
        while *idx < args.len() {
            out.push(args[*idx].get::<T>()?);
            *idx += 1;
        }
        Ok(out)
    }
}

/// Conversion from a native return value into a boxed script value.
pub trait IntoReturn: 'static {
    const KIND: ReturnKind;

    fn native_id() -> Option<TypeId>;

    fn into_data(self, return_type: Option<&Rc<Type>>) -> Result<Option<Data>, RuntimeError>;
}

impl IntoReturn for () {
    const KIND: ReturnKind = ReturnKind::Void;

    fn native_id() -> Option<TypeId> {
        None
    }

    fn into_data(self, _return_type: Option<&Rc<Type>>) -> Result<Option<Data>, RuntimeError> {
        Ok(None)
    }
}

impl<T: NativeValue> IntoReturn for T {
    const KIND: ReturnKind = ReturnKind::Value;

    fn native_id() -> Option<TypeId> {
        Some(TypeId::of::<T>())
    }

    fn into_data(self, return_type: Option<&Rc<Type>>) -> Result<Option<Data>, RuntimeError> {
        // binding guarantees a return type when the kind is not void
        match return_type {
            Some(ty) => Ok(Some(Data::new(ty, self)?)),
            None => Ok(None),
        }
    }
}

impl<T: NativeValue> IntoReturn for Ref<T> {
    const KIND: ReturnKind = ReturnKind::Reference;

    fn native_id() -> Option<TypeId> {
        Some(TypeId::of::<T>())
    }

    fn into_data(self, return_type: Option<&Rc<Type>>) -> Result<Option<Data>, RuntimeError> {
        match return_type {
            Some(ty) => Ok(Some(Data::from_cell(ty, self.0, false)?)),
            None => Ok(None),
        }
    }
}

impl<T: NativeValue> IntoReturn for Ptr<T> {
    const KIND: ReturnKind = ReturnKind::Pointer;

    fn native_id() -> Option<TypeId> {
        Some(TypeId::of::<T>())
    }

    fn into_data(self, return_type: Option<&Rc<Type>>) -> Result<Option<Data>, RuntimeError> {
        match (return_type, self.0) {
            (Some(ty), Some(cell)) => Ok(Some(Data::from_cell(ty, cell, false)?)),
            (Some(ty), None) => Ok(Some(Data::null(ty))),
            (None, _) => Ok(None),
        }
    }
}

// =============================================================================
// Mapped functions
// =============================================================================

/// A native function that can be bound. Implemented for plain functions and
/// closures of up to six parameters whose types implement [`FromData`] and
/// whose return implements [`IntoReturn`].
pub trait MappedFn<Args>: 'static {
    fn signature() -> NativeSignature;

    fn into_callable(
        self,
        function: String,
        names: Vec<String>,
        return_type: Option<Rc<Type>>,
        defaults: Vec<Option<Data>>,
        collect_last: bool,
    ) -> Callable;
}

macro_rules! impl_mapped {
    ($($ty:ident => $arg:ident),*) => {
        impl<Fun, Ret, $($ty,)*> MappedFn<($($ty,)*)> for Fun
        where
            Fun: Fn($($ty),*) -> Ret + 'static,
            Ret: IntoReturn,
            $($ty: FromData,)*
        {
            fn signature() -> NativeSignature {
                NativeSignature {
                    return_kind: Ret::KIND,
                    return_id: Ret::native_id(),
                    params: vec![$($ty::native_param(),)*],
                }
            }

            #[allow(unused_variables, unused_mut, unused_assignments)]
            fn into_callable(
                self,
                function: String,
                names: Vec<String>,
                return_type: Option<Rc<Type>>,
                defaults: Vec<Option<Data>>,
                collect_last: bool,
            ) -> Callable {
                let total: usize = 0 $(+ { stringify!($arg); 1 })*;

                Box::new(move |_ctx, args| {
                    // pad omitted trailing arguments with declared defaults
                    let mut padded;
                    let args = if args.len() < defaults.len() {
                        padded = args.to_vec();
                        for default in defaults.iter().skip(args.len()) {
                            match default {
                                Some(value) => padded.push(value.clone()),
                                None => break,
                            }
                        }
                        &padded[..]
                    } else {
                        args
                    };

                    let mut idx = 0;
                    let mut position = 0;
                    $(
                        let collect = collect_last && position + 1 == total;
                        let name = names.get(position).map(String::as_str).unwrap_or("");
                        let $arg = <$ty as FromData>::take(&function, name, args, &mut idx, collect)?;
                        position += 1;
                    )*

                    if idx < args.len() {
                        return Err(RuntimeError::TooManyParameters {
                            function: function.clone(),
                            allowed: idx,
                        });
                    }

                    (self)($($arg),*).into_data(return_type.as_ref())
                })
            }
        }
    };
}

impl_mapped!();
impl_mapped!(A => a);
impl_mapped!(A => a, B => b);
impl_mapped!(A => a, B => b, C => c);
impl_mapped!(A => a, B => b, C => c, D => d);
impl_mapped!(A => a, B => b, C => c, D => d, E => e);
impl_mapped!(A => a, B => b, C => c, D => d, E => e, F => f);

// =============================================================================
// Binding
// =============================================================================

fn check_parameter(
    function: &str,
    index: usize,
    declared: &Parameter,
    native: &NativeParam,
) -> Result<(), BindError> {
    if declared.is_repeating() {
        if declared.is_reference() && !declared.is_constant() {
            return Err(BindError::RepeatingByReference {
                function: function.to_owned(),
            });
        }
        let element = native.element_id.ok_or_else(|| BindError::RepeatingNotVector {
            function: function.to_owned(),
        })?;
        if !declared.ty().rtth().is_same_type(element) {
            return Err(BindError::TypeMismatch {
                function: function.to_owned(),
                index,
            });
        }
        return Ok(());
    }

    match (declared.is_reference(), declared.is_constant(), native.mode) {
        (true, false, ParamMode::Reference | ParamMode::Pointer) => {}
        (true, false, _) => {
            return Err(BindError::ReferenceMismatch {
                function: function.to_owned(),
                index,
            });
        }
        (true, true, ParamMode::Reference | ParamMode::Pointer) => {
            return Err(BindError::ConstMismatch {
                function: function.to_owned(),
                index,
            });
        }
        (true, true, _) => {}
        (false, _, ParamMode::Reference | ParamMode::Pointer) => {
            // a value argument taken mutably would lose its writes
            return Err(BindError::ConstMismatch {
                function: function.to_owned(),
                index,
            });
        }
        (false, _, _) => {}
    }

    if !declared.ty().rtth().is_same_type(native.id) {
        return Err(BindError::TypeMismatch {
            function: function.to_owned(),
            index,
        });
    }

    Ok(())
}

fn check_return(
    function: &str,
    declared: Option<&Rc<Type>>,
    returns_reference: bool,
    signature: &NativeSignature,
) -> Result<(), BindError> {
    match (declared, signature.return_kind) {
        (None, ReturnKind::Void) => Ok(()),
        (Some(ty), kind) => {
            if signature.return_id != Some(ty.rtth().id()) {
                return Err(BindError::ReturnMismatch {
                    function: function.to_owned(),
                });
            }
            match (returns_reference, kind) {
                (true, ReturnKind::Reference | ReturnKind::Pointer) => Ok(()),
                (false, ReturnKind::Value) => Ok(()),
                _ => Err(BindError::ReturnMismatch {
                    function: function.to_owned(),
                }),
            }
        }
        (None, _) => Err(BindError::ReturnMismatch {
            function: function.to_owned(),
        }),
    }
}

struct Receiver<'a> {
    owner: &'a Rc<Type>,
    constant: bool,
}

fn bind_overload<Args, F>(
    function: &str,
    receiver: Option<Receiver<'_>>,
    return_type: Option<&Rc<Type>>,
    returns_reference: bool,
    implicit: bool,
    parameters: Vec<Parameter>,
    f: F,
) -> Result<Overload, BindError>
where
    F: MappedFn<Args>,
{
    let signature = F::signature();

    let expected = parameters.len() + receiver.is_some() as usize;
    if signature.params.len() != expected {
        return Err(BindError::ParameterCountMismatch {
            function: function.to_owned(),
            declared: expected,
            native: signature.params.len(),
        });
    }

    let mut parameters = parameters;
    let mut constant_overload = false;

    if let Some(Receiver { owner, constant }) = receiver {
        let first = &signature.params[0];

        if !owner.rtth().is_same_type(first.id) {
            return Err(BindError::TypeMismatch {
                function: function.to_owned(),
                index: 0,
            });
        }

        let mutable = matches!(first.mode, ParamMode::Reference | ParamMode::Pointer);
        if constant && mutable {
            return Err(BindError::ConstReceiver {
                function: function.to_owned(),
            });
        }

        let mut this = Parameter::new("this", "the object acted on", owner);
        if mutable {
            this = this.reference();
        } else if constant {
            this = this.constant();
        }
        parameters.insert(0, this);
        constant_overload = constant;
    }

    for (index, (declared, native)) in
        parameters.iter().zip(signature.params.iter()).enumerate()
    {
        check_parameter(function, index, declared, native)?;
    }

    check_return(function, return_type, returns_reference, &signature)?;

    let names = parameters.iter().map(|p| p.name().to_owned()).collect();
    let defaults = parameters
        .iter()
        .map(|p| p.default_value().cloned())
        .collect();
    let collect_last = parameters.last().map(|p| p.is_repeating()).unwrap_or(false);

    let callable = f.into_callable(
        function.to_owned(),
        names,
        return_type.cloned(),
        defaults,
        collect_last,
    );

    let mut overload = Overload::new(return_type.cloned(), parameters, callable);
    if returns_reference {
        overload = overload.returning_reference();
    }
    if constant_overload {
        overload = overload.constant();
    }
    if implicit {
        overload = overload.implicit();
    }

    Ok(overload)
}

/// Bind a free function.
pub fn map_function<Args, F>(
    name: &str,
    help: &str,
    return_type: Option<&Rc<Type>>,
    parameters: Vec<Parameter>,
    f: F,
) -> Result<Function, BindError>
where
    F: MappedFn<Args>,
{
    let overload = bind_overload(name, None, return_type, false, false, parameters, f)?;
    let mut function = Function::new(name, help);
    function.add_overload(overload);
    Ok(function)
}

/// Bind a member function. The object arrives as the first argument; a
/// constant overload promises not to modify it, so its native receiver must
/// not be a mutable reference.
pub fn map_member_function<Args, F>(
    owner: &Rc<Type>,
    name: &str,
    help: &str,
    return_type: Option<&Rc<Type>>,
    constant: bool,
    parameters: Vec<Parameter>,
    f: F,
) -> Result<Function, BindError>
where
    F: MappedFn<Args>,
{
    let overload = bind_overload(
        name,
        Some(Receiver { owner, constant }),
        return_type,
        false,
        false,
        parameters,
        f,
    )?;

    let mut function = Function::member(name, help, owner);
    function.add_overload(overload);
    Ok(function)
}

/// Bind a binary operator on a type. Operators never modify their operands.
pub fn map_operator<Args, F>(
    owner: &Rc<Type>,
    symbol: &str,
    return_type: &Rc<Type>,
    rhs: Parameter,
    f: F,
) -> Result<Function, BindError>
where
    F: MappedFn<Args>,
{
    let overload = bind_overload(
        symbol,
        Some(Receiver {
            owner,
            constant: true,
        }),
        Some(return_type),
        false,
        false,
        vec![rhs],
        f,
    )?;

    let mut function = Function::member(symbol, "", owner);
    function.add_overload(overload);
    Ok(function)
}

/// Bind a value conversion usable implicitly during overload resolution.
pub fn map_typecast<Args, F>(
    from: &Rc<Type>,
    to: &Rc<Type>,
    f: F,
) -> Result<Overload, BindError>
where
    F: MappedFn<Args>,
{
    let name = format!("{}->{}", from.name(), to.name());
    bind_overload(
        &name,
        None,
        Some(to),
        false,
        true,
        vec![Parameter::new("value", "", from)],
        f,
    )
}

/// Like [`map_typecast`] but for conversions between related object types;
/// always succeeds at runtime.
pub fn map_staticcast<Args, F>(
    from: &Rc<Type>,
    to: &Rc<Type>,
    f: F,
) -> Result<Overload, BindError>
where
    F: MappedFn<Args>,
{
    let name = format!("{}=>{}", from.name(), to.name());
    bind_overload(
        &name,
        None,
        Some(to),
        false,
        true,
        vec![Parameter::new("value", "", from)],
        f,
    )
}

/// Bind a checked downcast. The conversion is explicit and may produce the
/// null object, so the native function returns a nullable reference.
pub fn map_dynamiccast<Args, F>(
    from: &Rc<Type>,
    to: &Rc<Type>,
    f: F,
) -> Result<Overload, BindError>
where
    F: MappedFn<Args>,
{
    let name = format!("{}?>{}", from.name(), to.name());
    bind_overload(
        &name,
        None,
        Some(to),
        true,
        false,
        vec![Parameter::new("value", "", from)],
        f,
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::runtime::context::BasicContext;

    fn int_type() -> Rc<Type> {
        Type::new::<i32>("Int", "")
    }

    fn float_type() -> Rc<Type> {
        Type::new::<f32>("Float", "")
    }

    #[test]
    fn value_functions_bind_and_run() {
        let int = int_type();

        let add = map_function(
            "add",
            "",
            Some(&int),
            vec![
                Parameter::new("left", "", &int),
                Parameter::new("right", "", &int),
            ],
            |a: i32, b: i32| a + b,
        )
        .unwrap();

        let mut ctx = BasicContext::new();
        let args = [Data::new(&int, 2).unwrap(), Data::new(&int, 3).unwrap()];
        let result = add.call(&mut ctx, &args, false).unwrap().unwrap();
        assert_eq!(result.get::<i32>().unwrap(), 5);
    }

    #[test]
    fn reference_parameters_write_through() {
        let int = int_type();

        let bump = map_function(
            "bump",
            "",
            None,
            vec![Parameter::new("value", "", &int).reference()],
            |value: Ref<i32>| value.set(value.get() + 1),
        )
        .unwrap();

        let mut ctx = BasicContext::new();
        let arg = Data::new(&int, 6).unwrap();
        bump.call(&mut ctx, std::slice::from_ref(&arg), false)
            .unwrap();
        assert_eq!(arg.get::<i32>().unwrap(), 7);
    }

    #[test]
    fn reference_declaration_needs_a_reference_native() {
        let int = int_type();

        let result = map_function(
            "bump",
            "",
            None,
            vec![Parameter::new("value", "", &int).reference()],
            |_value: i32| {},
        );

        assert_eq!(
            result.err(),
            Some(BindError::ReferenceMismatch {
                function: "bump".into(),
                index: 0,
            })
        );
    }

    #[test]
    fn value_declaration_rejects_a_mutable_native() {
        let int = int_type();

        let result = map_function(
            "show",
            "",
            None,
            vec![Parameter::new("value", "", &int)],
            |_value: Ref<i32>| {},
        );

        assert_eq!(
            result.err(),
            Some(BindError::ConstMismatch {
                function: "show".into(),
                index: 0,
            })
        );
    }

    #[test]
    fn parameter_counts_must_agree() {
        let int = int_type();

        let result = map_function(
            "add",
            "",
            Some(&int),
            vec![Parameter::new("left", "", &int)],
            |a: i32, b: i32| a + b,
        );

        assert_eq!(
            result.err(),
            Some(BindError::ParameterCountMismatch {
                function: "add".into(),
                declared: 1,
                native: 2,
            })
        );
    }

    #[test]
    fn declared_and_native_types_must_agree() {
        let int = int_type();
        let float = float_type();

        let result = map_function(
            "half",
            "",
            Some(&float),
            vec![Parameter::new("value", "", &int)],
            |value: f32| value / 2.0,
        );

        assert_eq!(
            result.err(),
            Some(BindError::TypeMismatch {
                function: "half".into(),
                index: 0,
            })
        );
    }

    #[test]
    fn return_shape_must_agree() {
        let int = int_type();

        let void_declared = map_function(
            "make",
            "",
            None,
            Vec::new(),
            || 5i32,
        );
        assert_eq!(
            void_declared.err(),
            Some(BindError::ReturnMismatch {
                function: "make".into()
            })
        );

        let value_declared = map_function("noop", "", Some(&int), Vec::new(), || {});
        assert_eq!(
            value_declared.err(),
            Some(BindError::ReturnMismatch {
                function: "noop".into()
            })
        );
    }

    #[test]
    fn constant_overloads_reject_mutable_receivers() {
        let int = int_type();

        let result = map_member_function(
            &int,
            "Negate",
            "",
            Some(&int),
            true,
            Vec::new(),
            |this: Ref<i32>| -this.get(),
        );

        assert_eq!(
            result.err(),
            Some(BindError::ConstReceiver {
                function: "Negate".into()
            })
        );

        // the same native binds fine without the constant promise
        let ok = map_member_function(
            &int,
            "Negate",
            "",
            Some(&int),
            false,
            Vec::new(),
            |this: Ref<i32>| -this.get(),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn repeating_parameters_collect_into_a_vector() {
        let int = int_type();

        let sum = map_function(
            "sum",
            "",
            Some(&int),
            vec![Parameter::new("values", "", &int).repeating()],
            |values: Vec<i32>| values.iter().sum::<i32>(),
        )
        .unwrap();

        let mut ctx = BasicContext::new();
        let args = [
            Data::new(&int, 1).unwrap(),
            Data::new(&int, 2).unwrap(),
            Data::new(&int, 3).unwrap(),
        ];
        let result = sum.call(&mut ctx, &args, false).unwrap().unwrap();
        assert_eq!(result.get::<i32>().unwrap(), 6);
    }

    #[test]
    fn repeating_must_collect_and_stay_readonly() {
        let int = int_type();

        let scalar = map_function(
            "sum",
            "",
            Some(&int),
            vec![Parameter::new("values", "", &int).repeating()],
            |value: i32| value,
        );
        assert_eq!(
            scalar.err(),
            Some(BindError::RepeatingNotVector {
                function: "sum".into()
            })
        );

        let by_ref = map_function(
            "sum",
            "",
            Some(&int),
            vec![Parameter::new("values", "", &int).repeating().reference()],
            |values: Vec<i32>| values.iter().sum::<i32>(),
        );
        assert_eq!(
            by_ref.err(),
            Some(BindError::RepeatingByReference {
                function: "sum".into()
            })
        );
    }

    #[test]
    fn vector_typed_parameter_can_be_non_repeating() {
        let int = int_type();
        let array = Type::opaque::<Vec<i32>>("IntArray", "");

        let total = map_function(
            "total",
            "",
            Some(&int),
            vec![Parameter::new("values", "", &array)],
            |values: Vec<i32>| values.iter().sum::<i32>(),
        )
        .unwrap();

        let mut ctx = BasicContext::new();
        let arg = Data::new(&array, vec![4, 5]).unwrap();
        let result = total
            .call(&mut ctx, std::slice::from_ref(&arg), false)
            .unwrap()
            .unwrap();
        assert_eq!(result.get::<i32>().unwrap(), 9);
    }

    #[test]
    fn defaults_fill_omitted_arguments() {
        let int = int_type();

        let step = map_function(
            "step",
            "",
            Some(&int),
            vec![
                Parameter::new("value", "", &int),
                Parameter::new("by", "", &int).with_default(Data::new(&int, 1).unwrap()),
            ],
            |value: i32, by: i32| value + by,
        )
        .unwrap();

        let mut ctx = BasicContext::new();
        let args = [Data::new(&int, 9).unwrap()];
        let result = step.call(&mut ctx, &args, false).unwrap().unwrap();
        assert_eq!(result.get::<i32>().unwrap(), 10);
    }

    #[test]
    fn operators_bind_as_constant_members() {
        let int = int_type();

        let plus = map_operator(
            &int,
            "+",
            &int,
            Parameter::new("right", "", &int),
            |left: i32, right: i32| left + right,
        )
        .unwrap();

        assert!(plus.overloads()[0].is_constant());
        assert_eq!(plus.overloads()[0].parameters().len(), 2);

        let mut ctx = BasicContext::new();
        let args = [Data::new(&int, 3).unwrap(), Data::new(&int, 4).unwrap()];
        let result = plus.call(&mut ctx, &args, false).unwrap().unwrap();
        assert_eq!(result.get::<i32>().unwrap(), 7);
    }

    #[test]
    fn typecasts_are_implicit_and_dynamiccasts_can_fail() {
        let int = int_type();
        let float = float_type();

        let widen = map_typecast(&int, &float, |value: i32| value as f32).unwrap();
        assert!(widen.is_implicit());

        let mut ctx = BasicContext::new();
        let arg = [Data::new(&int, 3).unwrap()];
        let result = widen.call(&mut ctx, &arg).unwrap().unwrap();
        assert_eq!(result.get::<f32>().unwrap(), 3.0);

        let narrow = map_dynamiccast(&float, &int, |value: f32| {
            if value.fract() == 0.0 {
                Ptr::from(Rc::new(RefCell::new(value as i32)))
            } else {
                Ptr::null()
            }
        })
        .unwrap();
        assert!(!narrow.is_implicit());

        let whole = [Data::new(&float, 4.0f32).unwrap()];
        let result = narrow.call(&mut ctx, &whole).unwrap().unwrap();
        assert_eq!(result.get::<i32>().unwrap(), 4);

        let fractional = [Data::new(&float, 4.5f32).unwrap()];
        let result = narrow.call(&mut ctx, &fractional).unwrap().unwrap();
        assert!(result.is_null());
    }

    #[test]
    fn surplus_arguments_are_reported() {
        let int = int_type();

        let identity = map_function(
            "identity",
            "",
            Some(&int),
            vec![Parameter::new("value", "", &int)],
            |value: i32| value,
        )
        .unwrap();

        let overload = &identity.overloads()[0];
        let mut ctx = BasicContext::new();
        let args = [
            Data::new(&int, 1).unwrap(),
            Data::new(&int, 2).unwrap(),
        ];

        // bypass resolution, which would already reject the count
        assert!(matches!(
            overload.call(&mut ctx, &args),
            Err(RuntimeError::TooManyParameters { allowed: 1, .. })
        ));
    }

    #[test]
    fn method_echo_goes_through_the_context() {
        let int = int_type();

        let double = map_function(
            "double",
            "",
            Some(&int),
            vec![Parameter::new("value", "", &int)],
            |value: i32| value * 2,
        )
        .unwrap();

        let mut ctx = BasicContext::new();
        let args = [Data::new(&int, 21).unwrap()];
        assert!(double.call(&mut ctx, &args, true).unwrap().is_none());
        assert_eq!(ctx.output(), ["42"]);
    }
}

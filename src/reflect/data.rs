use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::reflect::rtth::Rtth;
use crate::runtime::runtime_error::RuntimeError;

// =============================================================================
// Types and boxed values
// =============================================================================

/// A scripting type: a name, a default value, and the runtime handle of the
/// native type backing it.
pub struct Type {
    name: String,
    help: String,
    rtth: Rtth,
    make_default: Box<dyn Fn() -> Rc<dyn Any>>,
    format: Option<Box<dyn Fn(&dyn Any) -> Option<String>>>,
}

impl Type {
    /// Register a displayable native type.
    pub fn new<T>(name: impl Into<String>, help: impl Into<String>) -> Rc<Type>
    where
        T: Any + Clone + Default + fmt::Display,
    {
        Rc::new(Type {
            name: name.into(),
            help: help.into(),
            rtth: Rtth::of::<T>(),
            make_default: Box::new(|| Rc::new(RefCell::new(T::default()))),
            format: Some(Box::new(|value| {
                value
                    .downcast_ref::<RefCell<T>>()
                    .map(|cell| cell.borrow().to_string())
            })),
        })
    }

    /// Register a native type that has no text form.
    pub fn opaque<T>(name: impl Into<String>, help: impl Into<String>) -> Rc<Type>
    where
        T: Any + Clone + Default,
    {
        Rc::new(Type {
            name: name.into(),
            help: help.into(),
            rtth: Rtth::of::<T>(),
            make_default: Box::new(|| Rc::new(RefCell::new(T::default()))),
            format: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn rtth(&self) -> &Rtth {
        &self.rtth
    }

    /// A fresh boxed default value of this type.
    pub fn default_data(self: &Rc<Self>) -> Data {
        Data {
            ty: self.clone(),
            value: Some((self.make_default)()),
            reference: false,
            constant: false,
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Type")
            .field("name", &self.name)
            .field("rtth", &self.rtth)
            .finish()
    }
}

/// A typed value as it moves through the runtime. Storage is shared; `get`
/// copies the value out, `set` writes through to everything holding the same
/// storage.
#[derive(Clone)]
pub struct Data {
    ty: Rc<Type>,
    // None is the null object; Some holds an Rc<RefCell<T>>
    value: Option<Rc<dyn Any>>,
    reference: bool,
    constant: bool,
}

impl Data {
    pub fn new<T: Any>(ty: &Rc<Type>, value: T) -> Result<Data, RuntimeError> {
        if !ty.rtth.is_same_type(TypeId::of::<T>()) {
            return Err(RuntimeError::bad_cast(type_name::<T>(), ty.name()));
        }

        Ok(Data {
            ty: ty.clone(),
            value: Some(Rc::new(RefCell::new(value))),
            reference: false,
            constant: false,
        })
    }

    /// The null object of the given type.
    pub fn null(ty: &Rc<Type>) -> Data {
        Data {
            ty: ty.clone(),
            value: None,
            reference: false,
            constant: false,
        }
    }

    /// Wrap existing shared storage as a reference value.
    pub fn from_cell<T: Any>(
        ty: &Rc<Type>,
        cell: Rc<RefCell<T>>,
        constant: bool,
    ) -> Result<Data, RuntimeError> {
        if !ty.rtth.is_same_type(TypeId::of::<T>()) {
            return Err(RuntimeError::bad_cast(type_name::<T>(), ty.name()));
        }

        Ok(Data {
            ty: ty.clone(),
            value: Some(cell),
            reference: true,
            constant,
        })
    }

    pub fn ty(&self) -> &Rc<Type> {
        &self.ty
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    pub fn is_reference(&self) -> bool {
        self.reference
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }

    /// The same value with mutation disallowed.
    pub fn into_constant(mut self) -> Data {
        self.constant = true;
        self
    }

    /// Copy the value out.
    pub fn get<T: Any + Clone>(&self) -> Result<T, RuntimeError> {
        let cell = self.cell::<T>()?;
        let value = cell.borrow().clone();
        Ok(value)
    }

    /// The underlying shared storage.
    pub fn cell<T: Any>(&self) -> Result<Rc<RefCell<T>>, RuntimeError> {
        let value = self.value.as_ref().ok_or(RuntimeError::NullDereference)?;

        Rc::clone(value)
            .downcast::<RefCell<T>>()
            .map_err(|_| RuntimeError::bad_cast(self.ty.name(), type_name::<T>()))
    }

    /// Write through the shared storage.
    pub fn set<T: Any>(&self, value: T) -> Result<(), RuntimeError> {
        if self.constant {
            return Err(RuntimeError::ConstantViolation {
                name: self.ty.name().to_owned(),
            });
        }

        *self.cell::<T>()?.borrow_mut() = value;
        Ok(())
    }

    /// Text form of the value, if the type has one. Null renders as `null`.
    pub fn to_text(&self) -> Option<String> {
        match &self.value {
            None => Some("null".to_owned()),
            Some(value) => {
                let format = self.ty.format.as_ref()?;
                format(value.as_ref())
            }
        }
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => write!(f, "{}({})", self.ty.name(), text),
            None => write!(f, "{}(..)", self.ty.name()),
        }
    }
}

/// A named slot holding a value.
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    data: Data,
}

impl Variable {
    pub fn new(name: impl Into<String>, data: Data) -> Variable {
        Variable {
            name: name.into(),
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub fn assign(&mut self, data: Data) {
        self.data = data;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn int_type() -> Rc<Type> {
        Type::new::<i32>("Int", "Signed integer")
    }

    #[test]
    fn values_copy_out_and_write_through() {
        let ty = int_type();
        let data = Data::new(&ty, 42).unwrap();

        assert_eq!(data.get::<i32>().unwrap(), 42);

        let alias = data.clone();
        data.set(7).unwrap();
        assert_eq!(alias.get::<i32>().unwrap(), 7);
    }

    #[test]
    fn type_mismatch_is_rejected_at_construction() {
        let ty = int_type();
        assert!(matches!(
            Data::new(&ty, 1.5f32),
            Err(RuntimeError::BadCast { .. })
        ));
    }

    #[test]
    fn wrong_downcast_is_a_bad_cast() {
        let ty = int_type();
        let data = Data::new(&ty, 1).unwrap();
        assert!(matches!(
            data.get::<String>(),
            Err(RuntimeError::BadCast { .. })
        ));
    }

    #[test]
    fn null_values_cannot_be_read() {
        let ty = int_type();
        let data = Data::null(&ty);

        assert!(data.is_null());
        assert!(matches!(
            data.get::<i32>(),
            Err(RuntimeError::NullDereference)
        ));
        assert_eq!(data.to_text().as_deref(), Some("null"));
    }

    #[test]
    fn constants_refuse_writes() {
        let ty = int_type();
        let data = Data::new(&ty, 3).unwrap().into_constant();

        assert!(matches!(
            data.set(4),
            Err(RuntimeError::ConstantViolation { .. })
        ));
        assert_eq!(data.get::<i32>().unwrap(), 3);
    }

    #[test]
    fn defaults_come_out_fresh() {
        let ty = int_type();
        let first = ty.default_data();
        let second = ty.default_data();

        first.set(9).unwrap();
        assert_eq!(second.get::<i32>().unwrap(), 0);
    }

    #[test]
    fn opaque_types_have_no_text_form() {
        #[derive(Clone, Default)]
        struct Blob;

        let ty = Type::opaque::<Blob>("Blob", "");
        let data = Data::new(&ty, Blob).unwrap();
        assert_eq!(data.to_text(), None);
    }
}

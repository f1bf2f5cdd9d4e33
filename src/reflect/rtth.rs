use std::any::{type_name, TypeId};
use std::fmt;

// =============================================================================
// Runtime type handles
// =============================================================================

/// The six native shapes a scripting type can take when crossing into native
/// code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    Normal,
    Const,
    Reference,
    ConstReference,
    Pointer,
    ConstPointer,
}

/// Identity of one facet of a native type. Two handles with the same
/// underlying [`TypeId`] describe the same type even when their facets
/// differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeHandle {
    id: TypeId,
    facet: Facet,
}

impl TypeHandle {
    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn facet(&self) -> Facet {
        self.facet
    }

    /// Whether this handle points at the given native type, ignoring the
    /// facet.
    pub fn is_same_type(&self, id: TypeId) -> bool {
        self.id == id
    }
}

/// Runtime type handle bundle: all six facets of one native type, sharing a
/// single [`TypeId`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Rtth {
    id: TypeId,
    native_name: &'static str,
}

impl Rtth {
    pub fn of<T: 'static>() -> Rtth {
        Rtth {
            id: TypeId::of::<T>(),
            native_name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Native type name, for diagnostics only.
    pub fn native_name(&self) -> &'static str {
        self.native_name
    }

    pub fn facet(&self, facet: Facet) -> TypeHandle {
        TypeHandle { id: self.id, facet }
    }

    pub fn normal(&self) -> TypeHandle {
        self.facet(Facet::Normal)
    }

    pub fn constant(&self) -> TypeHandle {
        self.facet(Facet::Const)
    }

    pub fn reference(&self) -> TypeHandle {
        self.facet(Facet::Reference)
    }

    pub fn const_reference(&self) -> TypeHandle {
        self.facet(Facet::ConstReference)
    }

    pub fn pointer(&self) -> TypeHandle {
        self.facet(Facet::Pointer)
    }

    pub fn const_pointer(&self) -> TypeHandle {
        self.facet(Facet::ConstPointer)
    }

    pub fn is_same_type(&self, id: TypeId) -> bool {
        self.id == id
    }
}

impl fmt::Debug for Rtth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rtth")
            .field("native_name", &self.native_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facets_share_one_identity() {
        let rtth = Rtth::of::<i32>();

        assert!(rtth.normal().is_same_type(TypeId::of::<i32>()));
        assert!(rtth.const_reference().is_same_type(TypeId::of::<i32>()));
        assert!(rtth.pointer().is_same_type(TypeId::of::<i32>()));
        assert!(!rtth.normal().is_same_type(TypeId::of::<f32>()));
    }

    #[test]
    fn handles_compare_by_id_and_facet() {
        let a = Rtth::of::<String>();
        let b = Rtth::of::<String>();

        assert_eq!(a.reference(), b.reference());
        assert_ne!(a.reference(), b.const_reference());
    }
}

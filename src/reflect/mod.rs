pub mod bind_error;
pub mod data;
pub mod function;
pub mod mapped;
pub mod rtth;

pub use bind_error::BindError;
pub use data::{Data, Type, Variable};
pub use function::{Function, Overload, Parameter};
pub use mapped::{
    map_dynamiccast, map_function, map_member_function, map_operator, map_staticcast,
    map_typecast, ConstPtr, ConstRef, FromData, IntoReturn, MappedFn, NativeValue, Ptr, Ref,
};
pub use rtth::{Facet, Rtth, TypeHandle};

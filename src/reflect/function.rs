//! Reflected callables: parameter descriptions, overloads and overload
//! resolution.

use std::rc::Rc;

use tracing::trace;

use crate::reflect::data::{Data, Type};
use crate::runtime::context::ExecutionContext;
use crate::runtime::runtime_error::RuntimeError;

/// Native entry point of an overload.
pub type Callable =
    Box<dyn Fn(&mut dyn ExecutionContext, &[Data]) -> Result<Option<Data>, RuntimeError>>;

// =============================================================================
// Parameters
// =============================================================================

/// Declared parameter of an overload. For a repeating parameter the type is
/// the element type; arguments from its position onward collect into one
/// vector.
pub struct Parameter {
    name: String,
    help: String,
    ty: Rc<Type>,
    optional: bool,
    reference: bool,
    constant: bool,
    output: bool,
    repeating: bool,
    default: Option<Data>,
    options: Vec<Data>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, help: impl Into<String>, ty: &Rc<Type>) -> Parameter {
        Parameter {
            name: name.into(),
            help: help.into(),
            ty: ty.clone(),
            optional: false,
            reference: false,
            constant: false,
            output: false,
            repeating: false,
            default: None,
            options: Vec::new(),
        }
    }

    pub fn optional(mut self) -> Parameter {
        self.optional = true;
        self
    }

    /// Pass by reference; writes become visible to the caller.
    pub fn reference(mut self) -> Parameter {
        self.reference = true;
        self
    }

    pub fn constant(mut self) -> Parameter {
        self.constant = true;
        self
    }

    /// Output parameter; the callee only writes it.
    pub fn output(mut self) -> Parameter {
        self.output = true;
        self.reference = true;
        self
    }

    /// Collects this and all following arguments.
    pub fn repeating(mut self) -> Parameter {
        self.repeating = true;
        self
    }

    pub fn with_default(mut self, default: Data) -> Parameter {
        self.optional = true;
        self.default = Some(default);
        self
    }

    /// Restrict accepted values to a fixed set.
    pub fn with_options(mut self, options: Vec<Data>) -> Parameter {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn ty(&self) -> &Rc<Type> {
        &self.ty
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_reference(&self) -> bool {
        self.reference
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }

    pub fn is_output(&self) -> bool {
        self.output
    }

    pub fn is_repeating(&self) -> bool {
        self.repeating
    }

    pub fn default_value(&self) -> Option<&Data> {
        self.default.as_ref()
    }

    pub fn options(&self) -> &[Data] {
        &self.options
    }

    fn accepts(&self, arg: &Data) -> bool {
        if !self.ty.rtth().is_same_type(arg.ty().rtth().id()) {
            return false;
        }
        if self.reference && !self.constant && arg.is_constant() {
            return false;
        }
        true
    }
}

// =============================================================================
// Overloads
// =============================================================================

/// One callable variant of a function.
pub struct Overload {
    return_type: Option<Rc<Type>>,
    returns_reference: bool,
    constant: bool,
    implicit: bool,
    parameters: Vec<Parameter>,
    callable: Callable,
}

impl Overload {
    pub fn new(
        return_type: Option<Rc<Type>>,
        parameters: Vec<Parameter>,
        callable: Callable,
    ) -> Overload {
        Overload {
            return_type,
            returns_reference: false,
            constant: false,
            implicit: false,
            parameters,
            callable,
        }
    }

    /// Mark the return value as a reference into existing storage.
    pub fn returning_reference(mut self) -> Overload {
        self.returns_reference = true;
        self
    }

    /// Constant member overload: does not modify its object.
    pub fn constant(mut self) -> Overload {
        self.constant = true;
        self
    }

    /// Usable for implicit conversions.
    pub fn implicit(mut self) -> Overload {
        self.implicit = true;
        self
    }

    pub fn return_type(&self) -> Option<&Rc<Type>> {
        self.return_type.as_ref()
    }

    pub fn returns_reference(&self) -> bool {
        self.returns_reference
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }

    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn required(&self) -> usize {
        self.parameters
            .iter()
            .filter(|p| !p.optional && !p.repeating)
            .count()
    }

    /// Whether the argument list satisfies this overload's declaration.
    pub fn matches(&self, args: &[Data]) -> bool {
        let repeating = self.parameters.last().map(|p| p.repeating).unwrap_or(false);

        if args.len() < self.required() {
            return false;
        }
        if !repeating && args.len() > self.parameters.len() {
            return false;
        }

        let mut arg = 0;
        for param in &self.parameters {
            if param.repeating {
                // all remaining arguments collect here
                return args[arg..].iter().all(|a| param.accepts(a));
            }

            match args.get(arg) {
                Some(value) if param.accepts(value) => arg += 1,
                Some(_) if param.optional => {} // falls through to a later parameter
                Some(_) => return false,
                None if param.optional => {}
                None => return false,
            }
        }

        arg == args.len()
    }

    /// Invoke the native entry point. Count and type checks have already
    /// happened during resolution.
    pub fn call(
        &self,
        ctx: &mut dyn ExecutionContext,
        args: &[Data],
    ) -> Result<Option<Data>, RuntimeError> {
        (self.callable)(ctx, args)
    }
}

// =============================================================================
// Functions
// =============================================================================

/// A named callable with one or more overloads. Member functions carry their
/// owning type; the object travels as the first argument.
pub struct Function {
    name: String,
    help: String,
    owner: Option<Rc<Type>>,
    keyword: bool,
    overloads: Vec<Overload>,
}

impl Function {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Function {
        Function {
            name: name.into(),
            help: help.into(),
            owner: None,
            keyword: false,
            overloads: Vec::new(),
        }
    }

    pub fn member(name: impl Into<String>, help: impl Into<String>, owner: &Rc<Type>) -> Function {
        Function {
            name: name.into(),
            help: help.into(),
            owner: Some(owner.clone()),
            keyword: false,
            overloads: Vec::new(),
        }
    }

    /// A function implementing a language keyword. Keywords resolve like any
    /// other function but the compiler may treat them specially.
    pub fn keyword(name: impl Into<String>, help: impl Into<String>) -> Function {
        Function {
            name: name.into(),
            help: help.into(),
            owner: None,
            keyword: true,
            overloads: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn owner(&self) -> Option<&Rc<Type>> {
        self.owner.as_ref()
    }

    pub fn is_keyword(&self) -> bool {
        self.keyword
    }

    pub fn overloads(&self) -> &[Overload] {
        &self.overloads
    }

    pub fn add_overload(&mut self, overload: Overload) {
        self.overloads.push(overload);
    }

    /// Pick the overload matching the arguments. Exactly one must match.
    pub fn resolve(&self, args: &[Data]) -> Result<&Overload, RuntimeError> {
        let mut matching = self.overloads.iter().filter(|o| o.matches(args));

        let first = matching
            .next()
            .ok_or_else(|| RuntimeError::symbol_not_found(&self.name))?;

        let rest = matching.count();
        if rest > 0 {
            return Err(RuntimeError::AmbiguousSymbol {
                name: self.name.clone(),
                count: rest + 1,
            });
        }

        Ok(first)
    }

    /// Resolve and invoke. When called as a method, a returned value is
    /// echoed to the context instead of being handed back.
    pub fn call(
        &self,
        ctx: &mut dyn ExecutionContext,
        args: &[Data],
        as_method: bool,
    ) -> Result<Option<Data>, RuntimeError> {
        trace!(function = %self.name, args = args.len(), as_method, "call");
        let overload = self.resolve(args)?;
        let result = overload.call(ctx, args)?;

        match result {
            Some(value) if as_method => {
                ctx.echo(&value);
                Ok(None)
            }
            other => Ok(other),
        }
    }
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

    fn add_ints(ty: &Rc<Type>) -> Overload {
        let ret = ty.clone();
        Overload::new(
            Some(ty.clone()),
            vec![
                Parameter::new("left", "", ty),
                Parameter::new("right", "", ty),
            ],
            Box::new(move |_, args| {
                let sum = args[0].get::<i32>()? + args[1].get::<i32>()?;
                Ok(Some(Data::new(&ret, sum)?))
            }),
        )
    }

    #[test]
    fn resolution_picks_the_matching_overload() {
        let int = int_type();
        let float = float_type();

        let mut add = Function::new("add", "");
        add.add_overload(add_ints(&int));

        let fret = float.clone();
        add.add_overload(Overload::new(
            Some(float.clone()),
            vec![
                Parameter::new("left", "", &float),
                Parameter::new("right", "", &float),
            ],
            Box::new(move |_, args| {
                let sum = args[0].get::<f32>()? + args[1].get::<f32>()?;
                Ok(Some(Data::new(&fret, sum)?))
            }),
        ));

        let mut ctx = BasicContext::new();
        let args = [Data::new(&int, 2).unwrap(), Data::new(&int, 3).unwrap()];
        let result = add.call(&mut ctx, &args, false).unwrap().unwrap();
        assert_eq!(result.get::<i32>().unwrap(), 5);

        let args = [
            Data::new(&float, 0.5f32).unwrap(),
            Data::new(&float, 0.25f32).unwrap(),
        ];
        let result = add.call(&mut ctx, &args, false).unwrap().unwrap();
        assert_eq!(result.get::<f32>().unwrap(), 0.75);
    }

    #[test]
    fn unmatched_arguments_are_symbol_not_found() {
        let int = int_type();
        let float = float_type();

        let mut add = Function::new("add", "");
        add.add_overload(add_ints(&int));

        let args = [
            Data::new(&float, 1.0f32).unwrap(),
            Data::new(&int, 1).unwrap(),
        ];
        assert!(matches!(
            add.resolve(&args),
            Err(RuntimeError::SymbolNotFound { .. })
        ));

        let args = [Data::new(&int, 1).unwrap()];
        assert!(matches!(
            add.resolve(&args),
            Err(RuntimeError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn duplicate_matches_are_ambiguous() {
        let int = int_type();

        let mut add = Function::new("add", "");
        add.add_overload(add_ints(&int));
        add.add_overload(add_ints(&int));

        let args = [Data::new(&int, 1).unwrap(), Data::new(&int, 2).unwrap()];
        assert!(matches!(
            add.resolve(&args),
            Err(RuntimeError::AmbiguousSymbol { count: 2, .. })
        ));
    }

    #[test]
    fn optional_parameters_can_be_left_out() {
        let int = int_type();
        let ret = int.clone();

        let mut step = Function::new("step", "");
        step.add_overload(Overload::new(
            Some(int.clone()),
            vec![
                Parameter::new("value", "", &int),
                Parameter::new("by", "", &int).with_default(Data::new(&int, 1).unwrap()),
            ],
            Box::new(move |_, args| {
                let by = match args.get(1) {
                    Some(data) => data.get::<i32>()?,
                    None => 1,
                };
                Ok(Some(Data::new(&ret, args[0].get::<i32>()? + by)?))
            }),
        ));

        let mut ctx = BasicContext::new();

        let short = [Data::new(&int, 4).unwrap()];
        let result = step.call(&mut ctx, &short, false).unwrap().unwrap();
        assert_eq!(result.get::<i32>().unwrap(), 5);

        let full = [Data::new(&int, 4).unwrap(), Data::new(&int, 10).unwrap()];
        let result = step.call(&mut ctx, &full, false).unwrap().unwrap();
        assert_eq!(result.get::<i32>().unwrap(), 14);
    }

    #[test]
    fn repeating_tail_takes_any_count() {
        let int = int_type();
        let ret = int.clone();

        let mut sum = Function::new("sum", "");
        sum.add_overload(Overload::new(
            Some(int.clone()),
            vec![Parameter::new("values", "", &int).repeating()],
            Box::new(move |_, args| {
                let mut total = 0;
                for arg in args {
                    total += arg.get::<i32>()?;
                }
                Ok(Some(Data::new(&ret, total)?))
            }),
        ));

        let mut ctx = BasicContext::new();

        let none: [Data; 0] = [];
        let result = sum.call(&mut ctx, &none, false).unwrap().unwrap();
        assert_eq!(result.get::<i32>().unwrap(), 0);

        let three = [
            Data::new(&int, 1).unwrap(),
            Data::new(&int, 2).unwrap(),
            Data::new(&int, 3).unwrap(),
        ];
        let result = sum.call(&mut ctx, &three, false).unwrap().unwrap();
        assert_eq!(result.get::<i32>().unwrap(), 6);
    }

    #[test]
    fn non_const_reference_parameters_reject_constants() {
        let int = int_type();

        let mut bump = Function::new("bump", "");
        bump.add_overload(Overload::new(
            None,
            vec![Parameter::new("value", "", &int).reference()],
            Box::new(|_, args| {
                let cell = args[0].cell::<i32>()?;
                *cell.borrow_mut() += 1;
                Ok(None)
            }),
        ));

        let constant = [Data::new(&int, 3).unwrap().into_constant()];
        assert!(matches!(
            bump.resolve(&constant),
            Err(RuntimeError::SymbolNotFound { .. })
        ));

        let mut ctx = BasicContext::new();
        let arg = Data::new(&int, 3).unwrap();
        bump.call(&mut ctx, std::slice::from_ref(&arg), false).unwrap();
        assert_eq!(arg.get::<i32>().unwrap(), 4);
    }

    #[test]
    fn method_calls_echo_the_result() {
        let int = int_type();

        let mut add = Function::new("add", "");
        add.add_overload(add_ints(&int));

        let mut ctx = BasicContext::new();
        let args = [Data::new(&int, 2).unwrap(), Data::new(&int, 3).unwrap()];

        let result = add.call(&mut ctx, &args, true).unwrap();
        assert!(result.is_none());
        assert_eq!(ctx.output(), ["5"]);
    }
}

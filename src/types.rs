use std::fmt;

use inkwell::{
    context::Context,
    types::{BasicType, BasicTypeEnum},
    AddressSpace,
};

/// A resolved source-level type.
///
/// Arrays carry their element type statically; their length travels with the
/// value at runtime (see [`Ty::llvm_type`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ty {
    Str,
    I32,
    F64,
    Bool,
    Void,
    Array(Box<Ty>),
}

impl Ty {
    /// Resolves a declared type name, such as `i32` or `string[]`.
    ///
    /// Returns `None` for unknown names. `auto` is not a type name; it is
    /// resolved from the initializer by the code generator.
    pub fn resolve(name: &str) -> Option<Ty> {
        if let Some(elem) = name.strip_suffix("[]") {
            let elem = Ty::resolve(elem)?;
            return match elem {
                Ty::Array(_) | Ty::Void => None,
                elem => Some(Ty::Array(Box::new(elem))),
            };
        }
        let ty = match name {
            "string" => Ty::Str,
            "i32" => Ty::I32,
            "f64" | "number" => Ty::F64,
            "boolean" => Ty::Bool,
            _ => return None,
        };
        Some(ty)
    }

    pub fn array_of(elem: Ty) -> Ty {
        Ty::Array(Box::new(elem))
    }

    pub fn element(&self) -> Option<&Ty> {
        match self {
            Ty::Array(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Ty::Array(_))
    }

    /// The LLVM type used to hold a value of this type, or `None` for
    /// `void`.
    ///
    /// Arrays lower to `{ T*, i32 }`: the address of the first element and
    /// the element count.
    pub fn llvm_type<'ctx>(&self, context: &'ctx Context) -> Option<BasicTypeEnum<'ctx>> {
        let ty = match self {
            Ty::Str => context.i8_type().ptr_type(AddressSpace::default()).into(),
            Ty::I32 => context.i32_type().into(),
            Ty::F64 => context.f64_type().into(),
            Ty::Bool => context.bool_type().into(),
            Ty::Void => return None,
            Ty::Array(elem) => {
                let data = elem.llvm_type(context)?.ptr_type(AddressSpace::default());
                context
                    .struct_type(&[data.into(), context.i32_type().into()], false)
                    .into()
            }
        };
        Some(ty)
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Str => f.write_str("string"),
            Ty::I32 => f.write_str("i32"),
            Ty::F64 => f.write_str("f64"),
            Ty::Bool => f.write_str("boolean"),
            Ty::Void => f.write_str("void"),
            Ty::Array(elem) => write!(f, "{elem}[]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        assert_eq!(Ty::resolve("string"), Some(Ty::Str));
        assert_eq!(Ty::resolve("i32"), Some(Ty::I32));
        assert_eq!(Ty::resolve("f64"), Some(Ty::F64));
        assert_eq!(Ty::resolve("number"), Some(Ty::F64));
        assert_eq!(Ty::resolve("boolean"), Some(Ty::Bool));
        assert_eq!(Ty::resolve("i32[]"), Some(Ty::array_of(Ty::I32)));
        assert_eq!(Ty::resolve("string[]"), Some(Ty::array_of(Ty::Str)));
        assert_eq!(Ty::resolve("i32[][]"), None);
        assert_eq!(Ty::resolve("Point"), None);
        assert_eq!(Ty::resolve("auto"), None);
    }

    #[test]
    fn test_display_round_trips_names() {
        for name in ["string", "i32", "f64", "boolean", "i32[]", "boolean[]"] {
            assert_eq!(Ty::resolve(name).unwrap().to_string(), name);
        }
    }

    #[test]
    fn test_llvm_types() {
        use inkwell::types::AnyType;

        let context = Context::create();
        let printed = |ty: Ty| {
            ty.llvm_type(&context)
                .map(|ty| ty.print_to_string().to_string())
        };
        assert_eq!(printed(Ty::Str).as_deref(), Some("i8*"));
        assert_eq!(printed(Ty::Bool).as_deref(), Some("i1"));
        assert_eq!(printed(Ty::F64).as_deref(), Some("double"));
        assert_eq!(printed(Ty::array_of(Ty::I32)).as_deref(), Some("{ i32*, i32 }"));
        assert_eq!(printed(Ty::array_of(Ty::Str)).as_deref(), Some("{ i8**, i32 }"));
        assert_eq!(printed(Ty::Void), None);
    }
}

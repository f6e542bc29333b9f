use inkwell::{
    context::Context,
    module::{Linkage, Module},
    types::FunctionType,
    values::FunctionValue,
    AddressSpace,
};

/// Called with the offending index and the array length when an element
/// access is out of range. Never returns.
pub const BOUNDS_FAIL: &str = "__cype_bounds_fail";

/// Returns the function `name`, adding an external declaration on first use.
pub fn get_or_declare<'ctx>(
    module: &Module<'ctx>,
    name: &str,
    ty: FunctionType<'ctx>,
) -> FunctionValue<'ctx> {
    module
        .get_function(name)
        .unwrap_or_else(|| module.add_function(name, ty, Some(Linkage::External)))
}

pub fn puts<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    let string = context.i8_type().ptr_type(AddressSpace::default());
    get_or_declare(module, "puts", context.i32_type().fn_type(&[string.into()], false))
}

pub fn printf<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    let string = context.i8_type().ptr_type(AddressSpace::default());
    get_or_declare(module, "printf", context.i32_type().fn_type(&[string.into()], true))
}

pub fn strcmp<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    let string = context.i8_type().ptr_type(AddressSpace::default());
    let ty = context
        .i32_type()
        .fn_type(&[string.into(), string.into()], false);
    get_or_declare(module, "strcmp", ty)
}

pub fn bounds_fail<'ctx>(context: &'ctx Context, module: &Module<'ctx>) -> FunctionValue<'ctx> {
    let i32_type = context.i32_type();
    let ty = context
        .void_type()
        .fn_type(&[i32_type.into(), i32_type.into()], false);
    get_or_declare(module, BOUNDS_FAIL, ty)
}

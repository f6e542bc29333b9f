//! The fixed table of functions a program may call by name.
//!
//! The table holds the `print`/`println` built-ins and the signatures of the
//! external runtime library. The parser only accepts calls to names found
//! here; the code generator lowers them by signature.

use inkwell::{
    context::Context,
    types::{BasicMetadataTypeEnum, BasicType, FunctionType},
    AddressSpace,
};

use crate::types::Ty;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Function {
    /// `print` / `println`, lowered onto the C library's output routines.
    Print { newline: bool },
    External(Signature),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: &'static [Param],
    pub ret: Param,
}

/// A parameter or return type in a runtime signature.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Param {
    I32,
    F64,
    Str,
    /// Passed as two arguments: a pointer to the first element and the
    /// element count.
    I32Array,
    Void,
}

impl Param {
    pub fn ty(self) -> Ty {
        match self {
            Param::I32 => Ty::I32,
            Param::F64 => Ty::F64,
            Param::Str => Ty::Str,
            Param::I32Array => Ty::array_of(Ty::I32),
            Param::Void => Ty::Void,
        }
    }

    /// Appends the LLVM parameter types this parameter lowers to.
    fn lower_into<'ctx>(self, context: &'ctx Context, params: &mut Vec<BasicMetadataTypeEnum<'ctx>>) {
        match self {
            Param::I32Array => {
                params.push(context.i32_type().ptr_type(AddressSpace::default()).into());
                params.push(context.i32_type().into());
            }
            other => {
                if let Some(ty) = other.ty().llvm_type(context) {
                    params.push(ty.into());
                }
            }
        }
    }
}

impl Signature {
    /// The LLVM signature of the runtime symbol.
    pub fn fn_type<'ctx>(&self, context: &'ctx Context) -> FunctionType<'ctx> {
        let mut params = Vec::with_capacity(self.params.len() + 1);
        for param in self.params {
            param.lower_into(context, &mut params);
        }
        match self.ret.ty().llvm_type(context) {
            Some(ret) => ret.fn_type(&params, false),
            None => context.void_type().fn_type(&params, false),
        }
    }
}

const fn ext(params: &'static [Param], ret: Param) -> Function {
    Function::External(Signature { params, ret })
}

use Param::{F64, I32Array as Arr, Str, Void, I32};

pub static FUNCTIONS: phf::Map<&'static str, Function> = phf::phf_map! {
    "print" => Function::Print { newline: false },
    "println" => Function::Print { newline: true },

    "math_sqrt" => ext(&[F64], F64),
    "math_pow" => ext(&[F64, F64], F64),
    "math_abs_f64" => ext(&[F64], F64),
    "math_abs_i32" => ext(&[I32], I32),
    "math_sin" => ext(&[F64], F64),
    "math_cos" => ext(&[F64], F64),
    "math_tan" => ext(&[F64], F64),
    "math_log" => ext(&[F64], F64),
    "math_exp" => ext(&[F64], F64),
    "math_gcd" => ext(&[I32, I32], I32),
    "math_lcm" => ext(&[I32, I32], I32),
    "math_is_prime" => ext(&[I32], I32),
    "math_fibonacci" => ext(&[I32], I32),
    "math_factorial" => ext(&[I32], I32),

    "string_reverse" => ext(&[Str], Str),
    "string_upper" => ext(&[Str], Str),
    "string_lower" => ext(&[Str], Str),
    "string_length" => ext(&[Str], I32),
    "string_substring" => ext(&[Str, I32, I32], Str),
    "string_find" => ext(&[Str, Str], I32),
    "string_concat" => ext(&[Str, Str], Str),
    "free_string" => ext(&[Str], Void),

    "array_sum_i32" => ext(&[Arr], I32),
    "array_max_i32" => ext(&[Arr], I32),
    "array_min_i32" => ext(&[Arr], I32),
    "array_sort_i32" => ext(&[Arr], Void),
    "array_reverse_i32" => ext(&[Arr], Void),
    "simd_array_sum_i32" => ext(&[Arr], I32),
    "simd_array_max_i32" => ext(&[Arr], I32),
    "simd_array_min_i32" => ext(&[Arr], I32),
    "simd_array_multiply_i32" => ext(&[Arr, I32], Void),
    "simd_array_add_i32" => ext(&[Arr, I32], Void),
    "simd_array_count_equal_i32" => ext(&[Arr, I32], I32),

    "stats_mean" => ext(&[Arr], F64),
    "stats_median" => ext(&[Arr], F64),
    "stats_stddev" => ext(&[Arr], F64),
    "geom_distance" => ext(&[F64, F64, F64, F64], F64),
    "geom_circle_area" => ext(&[F64], F64),
    "geom_rectangle_area" => ext(&[F64, F64], F64),
    "geom_triangle_area" => ext(&[F64, F64], F64),

    "file_read" => ext(&[Str], Str),
    "file_write" => ext(&[Str, Str], I32),
    "file_exists" => ext(&[Str], I32),

    "random_int" => ext(&[I32, I32], I32),
    "random_double" => ext(&[], F64),
    "random_seed" => ext(&[I32], Void),
    "sleep_ms" => ext(&[I32], Void),
};

pub fn lookup(name: &str) -> Option<&'static Function> {
    FUNCTIONS.get(name)
}

pub fn is_known(name: &str) -> bool {
    FUNCTIONS.contains_key(name)
}

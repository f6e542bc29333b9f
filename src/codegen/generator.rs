use std::collections::HashMap;

use inkwell::{
    basic_block::BasicBlock,
    builder::Builder,
    context::Context,
    module::Module,
    types::{BasicType, BasicTypeEnum},
    values::{
        BasicMetadataValueEnum, BasicValue, BasicValueEnum, FunctionValue, InstructionValue,
        IntValue, PointerValue,
    },
    FloatPredicate, IntPredicate,
};
use tracing::{debug, warn};

use crate::{
    ast::{BinaryOperator, Expr, Program, Stmt, VarDecl},
    codegen::{runtime, Error, Options, Output, Warning},
    registry::{self, Function, Param, Signature},
    types::Ty,
};

type Result<T, E = Error> = std::result::Result<T, E>;

pub struct Generator {
    options: Options,
}

impl Generator {
    pub fn with_options(options: Options) -> Generator {
        Generator { options }
    }

    /// Lowers `program` into a fresh, verified module owned by `context`.
    pub fn generate<'ctx>(&self, context: &'ctx Context, program: &Program) -> Result<Output<'ctx>> {
        debug!(
            module = %self.options.module_name,
            statements = program.statements.len(),
            "generating module"
        );
        let mut lowering = Lowering::new(context, &self.options);
        for stmt in &program.statements {
            lowering.stmt(stmt)?;
        }
        lowering.finish()
    }
}

#[derive(Clone)]
struct Symbol<'ctx> {
    /// Stack slot holding the variable.
    slot: PointerValue<'ctx>,
    ty: Ty,
}

/// An LLVM value together with its source-level type.
struct Typed<'ctx> {
    value: BasicValueEnum<'ctx>,
    ty: Ty,
}

impl<'ctx> Typed<'ctx> {
    fn new(value: impl Into<BasicValueEnum<'ctx>>, ty: Ty) -> Typed<'ctx> {
        Typed {
            value: value.into(),
            ty,
        }
    }
}

struct Lowering<'ctx, 'o> {
    context: &'ctx Context,
    options: &'o Options,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
    main: FunctionValue<'ctx>,
    entry: BasicBlock<'ctx>,
    /// The most recent slot hoisted into the entry block.
    last_slot: Option<InstructionValue<'ctx>>,
    strings: HashMap<String, PointerValue<'ctx>>,
    symbols: HashMap<String, Symbol<'ctx>>,
    warnings: Vec<Warning>,
}

impl<'ctx, 'o> Lowering<'ctx, 'o> {
    fn new(context: &'ctx Context, options: &'o Options) -> Lowering<'ctx, 'o> {
        let module = context.create_module(&options.module_name);
        let builder = context.create_builder();
        let main = module.add_function("main", context.i32_type().fn_type(&[], false), None);
        let entry = context.append_basic_block(main, "entry");
        builder.position_at_end(entry);
        Lowering {
            context,
            options,
            module,
            builder,
            main,
            entry,
            last_slot: None,
            strings: HashMap::new(),
            symbols: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    fn finish(self) -> Result<Output<'ctx>> {
        if !self.is_terminated() {
            let zero = self.context.i32_type().const_zero();
            self.builder.build_return(Some(&zero))?;
        }
        self.module
            .verify()
            .map_err(|message| Error::Verification(message.to_string()))?;
        Ok(Output {
            module: self.module,
            warnings: self.warnings,
        })
    }

    fn warn(&mut self, warning: Warning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    fn block(&self, label: &str) -> BasicBlock<'ctx> {
        self.context.append_basic_block(self.main, label)
    }

    fn switch_to(&self, block: BasicBlock<'ctx>) {
        self.builder.position_at_end(block);
    }

    fn is_terminated(&self) -> bool {
        self.builder
            .get_insert_block()
            .and_then(|block| block.get_terminator())
            .is_some()
    }

    /// Branches to `dest` unless the current block is already terminated.
    fn br(&self, dest: BasicBlock<'ctx>) -> Result<()> {
        if !self.is_terminated() {
            self.builder.build_unconditional_branch(dest)?;
        }
        Ok(())
    }

    /// Allocates a stack slot in the entry block, after the slots hoisted so
    /// far.
    fn entry_slot<T: BasicType<'ctx>>(&mut self, ty: T, name: &str) -> Result<PointerValue<'ctx>> {
        let prologue = self.context.create_builder();
        let next = match self.last_slot {
            Some(slot) => slot.get_next_instruction(),
            None => self.entry.get_first_instruction(),
        };
        match next {
            Some(next) => prologue.position_before(&next),
            None => prologue.position_at_end(self.entry),
        }
        let slot = prologue.build_alloca(ty, name)?;
        self.last_slot = slot.as_instruction_value();
        Ok(slot)
    }

    fn basic_type(&self, ty: &Ty) -> Result<BasicTypeEnum<'ctx>> {
        ty.llvm_type(self.context)
            .ok_or(Error::Unsupported("a void value"))
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> Result<()> {
        stmts.iter().try_for_each(|stmt| self.stmt(stmt))
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::VarDecl(decl) => self.var_decl(decl),
            Stmt::Assign(assign) => {
                let symbol = self.symbol(&assign.name)?;
                let value = self.expr(&assign.value)?;
                self.store(&assign.name, &symbol, value)
            }
            Stmt::IndexAssign {
                array,
                index,
                value,
            } => {
                let array = self.expr(array)?;
                let (ptr, elem) = self.element_ptr(&array, index)?;
                let value = self.expr(value)?;
                if value.ty != elem {
                    return Err(Error::ArrayElementType {
                        expected: elem,
                        actual: value.ty,
                    });
                }
                self.builder.build_store(ptr, value.value)?;
                Ok(())
            }
            Stmt::Expr(Expr::Call { name, args }) => self.call(name, args).map(drop),
            Stmt::Expr(expr) => self.expr(expr).map(drop),
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                let cond = self.condition(cond)?;
                let then_bb = self.block("then");
                let else_bb = (!else_block.is_empty()).then(|| self.block("else"));
                let merge_bb = self.block("merge");
                self.builder
                    .build_conditional_branch(cond, then_bb, else_bb.unwrap_or(merge_bb))?;

                self.switch_to(then_bb);
                self.stmts(then_block)?;
                self.br(merge_bb)?;

                if let Some(else_bb) = else_bb {
                    self.switch_to(else_bb);
                    self.stmts(else_block)?;
                    self.br(merge_bb)?;
                }
                self.switch_to(merge_bb);
                Ok(())
            }
            Stmt::While { cond, body } => {
                let cond_bb = self.block("while.cond");
                let body_bb = self.block("while.body");
                let exit_bb = self.block("while.exit");
                self.br(cond_bb)?;

                self.switch_to(cond_bb);
                let cond = self.condition(cond)?;
                self.builder
                    .build_conditional_branch(cond, body_bb, exit_bb)?;

                self.switch_to(body_bb);
                self.stmts(body)?;
                self.br(cond_bb)?;

                self.switch_to(exit_bb);
                Ok(())
            }
            Stmt::DoWhile { body, cond } => {
                let body_bb = self.block("do.body");
                let cond_bb = self.block("do.cond");
                let exit_bb = self.block("do.exit");
                self.br(body_bb)?;

                self.switch_to(body_bb);
                self.stmts(body)?;
                self.br(cond_bb)?;

                self.switch_to(cond_bb);
                let cond = self.condition(cond)?;
                self.builder
                    .build_conditional_branch(cond, body_bb, exit_bb)?;

                self.switch_to(exit_bb);
                Ok(())
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.stmt(init)?;
                }
                let cond_bb = self.block("for.cond");
                let body_bb = self.block("for.body");
                let step_bb = self.block("for.step");
                let exit_bb = self.block("for.exit");
                self.br(cond_bb)?;

                self.switch_to(cond_bb);
                match cond {
                    Some(cond) => {
                        let cond = self.condition(cond)?;
                        self.builder
                            .build_conditional_branch(cond, body_bb, exit_bb)?;
                    }
                    None => {
                        self.builder.build_unconditional_branch(body_bb)?;
                    }
                }

                self.switch_to(body_bb);
                self.stmts(body)?;
                self.br(step_bb)?;

                self.switch_to(step_bb);
                if let Some(step) = step {
                    self.stmt(step)?;
                }
                self.br(cond_bb)?;

                self.switch_to(exit_bb);
                Ok(())
            }
        }
    }

    fn var_decl(&mut self, decl: &VarDecl) -> Result<()> {
        let ty = if decl.is_auto() {
            self.infer(decl)
        } else {
            Ty::resolve(&decl.ty).ok_or_else(|| Error::UnknownType(decl.ty.clone()))?
        };
        let init = decl.init.as_ref().map(|init| self.expr(init)).transpose()?;
        let slot = self.entry_slot(self.basic_type(&ty)?, &decl.name)?;
        let symbol = Symbol { slot, ty };
        if let Some(init) = init {
            self.store(&decl.name, &symbol, init)?;
        }
        debug!(name = %decl.name, ty = %symbol.ty, "declared variable");
        self.symbols.insert(decl.name.clone(), symbol);
        Ok(())
    }

    /// Picks the type of an unannotated declaration from the syntactic form
    /// of its initializer.
    fn infer(&mut self, decl: &VarDecl) -> Ty {
        match &decl.init {
            Some(Expr::String(_)) => Ty::Str,
            Some(Expr::Int(_)) => Ty::I32,
            Some(Expr::Float(_)) => Ty::F64,
            Some(Expr::Bool(_)) => Ty::Bool,
            Some(Expr::Array { elem_hint, .. }) => {
                Ty::array_of(Ty::resolve(elem_hint).unwrap_or(Ty::I32))
            }
            _ => {
                self.warn(Warning::InferredDefault {
                    name: decl.name.clone(),
                });
                Ty::I32
            }
        }
    }

    /// Stores `value` into the slot of `symbol`. A value of another scalar
    /// type is reported and converted; other mismatches cannot be stored.
    fn store(&mut self, name: &str, symbol: &Symbol<'ctx>, value: Typed<'ctx>) -> Result<()> {
        let stored = if value.ty == symbol.ty {
            value.value
        } else {
            self.warn(Warning::TypeMismatch {
                name: name.to_owned(),
                declared: symbol.ty.clone(),
                actual: value.ty.clone(),
            });
            self.convert(&value, &symbol.ty)?
                .ok_or_else(|| Error::IncompatibleValue {
                    name: name.to_owned(),
                    expected: symbol.ty.clone(),
                    actual: value.ty,
                })?
        };
        self.builder.build_store(symbol.slot, stored)?;
        Ok(())
    }

    /// Converts between `i32`, `f64` and `boolean`. Returns `None` for any
    /// other pair of types.
    fn convert(&self, value: &Typed<'ctx>, to: &Ty) -> Result<Option<BasicValueEnum<'ctx>>> {
        let i32_type = self.context.i32_type();
        let f64_type = self.context.f64_type();
        let converted: BasicValueEnum<'ctx> = match (&value.ty, to) {
            (Ty::I32, Ty::F64) => self
                .builder
                .build_signed_int_to_float(value.value.into_int_value(), f64_type, "conv")?
                .into(),
            (Ty::Bool, Ty::F64) => self
                .builder
                .build_unsigned_int_to_float(value.value.into_int_value(), f64_type, "conv")?
                .into(),
            (Ty::F64, Ty::I32) => self
                .builder
                .build_float_to_signed_int(value.value.into_float_value(), i32_type, "conv")?
                .into(),
            (Ty::Bool, Ty::I32) => self
                .builder
                .build_int_z_extend(value.value.into_int_value(), i32_type, "conv")?
                .into(),
            (Ty::I32, Ty::Bool) => self
                .builder
                .build_int_compare(
                    IntPredicate::NE,
                    value.value.into_int_value(),
                    i32_type.const_zero(),
                    "conv",
                )?
                .into(),
            (Ty::F64, Ty::Bool) => self
                .builder
                .build_float_compare(
                    FloatPredicate::ONE,
                    value.value.into_float_value(),
                    f64_type.const_zero(),
                    "conv",
                )?
                .into(),
            _ => return Ok(None),
        };
        Ok(Some(converted))
    }

    fn symbol(&self, name: &str) -> Result<Symbol<'ctx>> {
        self.symbols
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownVariable(name.to_owned()))
    }

    /// Returns a pointer to a private global holding `value`, reusing the
    /// global for repeated literals.
    fn string(&mut self, value: &str) -> Result<PointerValue<'ctx>> {
        if let Some(ptr) = self.strings.get(value) {
            return Ok(*ptr);
        }
        let ptr = self
            .builder
            .build_global_string_ptr(value, ".str")?
            .as_pointer_value();
        self.strings.insert(value.to_owned(), ptr);
        Ok(ptr)
    }

    fn expr(&mut self, expr: &Expr) -> Result<Typed<'ctx>> {
        match expr {
            Expr::String(s) => Ok(Typed::new(self.string(s)?, Ty::Str)),
            Expr::Int(value) => {
                let value = i32::try_from(*value)
                    .map_err(|_| Error::Unsupported("an integer literal outside the i32 range"))?;
                let value = self.context.i32_type().const_int(value as u64, true);
                Ok(Typed::new(value, Ty::I32))
            }
            Expr::Float(value) => Ok(Typed::new(
                self.context.f64_type().const_float(*value),
                Ty::F64,
            )),
            Expr::Bool(value) => Ok(Typed::new(
                self.context.bool_type().const_int(u64::from(*value), false),
                Ty::Bool,
            )),
            Expr::Var(name) => {
                let symbol = self.symbol(name)?;
                self.basic_type(&symbol.ty)?;
                let value = self.builder.build_load(symbol.slot, name)?;
                Ok(Typed::new(value, symbol.ty))
            }
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
            Expr::Array {
                elem_hint,
                elements,
            } => self.array_literal(elem_hint, elements),
            Expr::Index { array, index } => {
                let array = self.expr(array)?;
                let (ptr, elem) = self.element_ptr(&array, index)?;
                self.basic_type(&elem)?;
                let value = self.builder.build_load(ptr, "elem")?;
                Ok(Typed::new(value, elem))
            }
            Expr::Object { .. } => Err(Error::Unsupported("object literal")),
            Expr::Member { base, name } => {
                if name != "length" {
                    return Err(Error::Unsupported("object property access"));
                }
                let base = self.expr(base)?;
                if !base.ty.is_array() {
                    return Err(Error::LengthOfNonArray(base.ty));
                }
                let len = self
                    .builder
                    .build_extract_value(base.value.into_struct_value(), 1, "len")?;
                Ok(Typed::new(len, Ty::I32))
            }
            Expr::Call { name, args } => self
                .call(name, args)?
                .ok_or_else(|| Error::VoidValue(name.clone())),
        }
    }

    fn binary(&mut self, op: BinaryOperator, lhs: &Expr, rhs: &Expr) -> Result<Typed<'ctx>> {
        let lhs = self.expr(lhs)?;
        let rhs = self.expr(rhs)?;

        match (&lhs.ty, &rhs.ty) {
            (Ty::I32, Ty::I32) => {
                let (l, r) = (lhs.value.into_int_value(), rhs.value.into_int_value());
                let value = match op {
                    BinaryOperator::Add => self.builder.build_int_add(l, r, "add")?,
                    BinaryOperator::Sub => self.builder.build_int_sub(l, r, "sub")?,
                    BinaryOperator::Mul => self.builder.build_int_mul(l, r, "mul")?,
                    BinaryOperator::Div => self.builder.build_int_signed_div(l, r, "div")?,
                    BinaryOperator::Rem => self.builder.build_int_signed_rem(l, r, "rem")?,
                    _ => return self.compare(op, l, r),
                };
                Ok(Typed::new(value, Ty::I32))
            }
            (Ty::Bool, Ty::Bool) if op.is_comparison() => self.compare(
                op,
                lhs.value.into_int_value(),
                rhs.value.into_int_value(),
            ),
            (Ty::Str, Ty::Str) if matches!(op, BinaryOperator::Eq | BinaryOperator::Ne) => {
                let strcmp = runtime::strcmp(self.context, &self.module);
                let order = self
                    .builder
                    .build_call(strcmp, &[lhs.value.into(), rhs.value.into()], "strcmp")?
                    .try_as_basic_value()
                    .left()
                    .ok_or_else(|| Error::VoidValue("strcmp".to_owned()))?;
                let zero = self.context.i32_type().const_zero();
                self.compare(op, order.into_int_value(), zero)
            }
            _ => Err(Error::InvalidOperands {
                op: op.symbol(),
                lhs: lhs.ty,
                rhs: rhs.ty,
            }),
        }
    }

    fn compare(
        &self,
        op: BinaryOperator,
        lhs: IntValue<'ctx>,
        rhs: IntValue<'ctx>,
    ) -> Result<Typed<'ctx>> {
        let predicate = match op {
            BinaryOperator::Eq => IntPredicate::EQ,
            BinaryOperator::Ne => IntPredicate::NE,
            BinaryOperator::Lt => IntPredicate::SLT,
            BinaryOperator::Le => IntPredicate::SLE,
            BinaryOperator::Gt => IntPredicate::SGT,
            BinaryOperator::Ge => IntPredicate::SGE,
            BinaryOperator::Add
            | BinaryOperator::Sub
            | BinaryOperator::Mul
            | BinaryOperator::Div
            | BinaryOperator::Rem => return Err(Error::Unsupported("arithmetic as a comparison")),
        };
        let value = self.builder.build_int_compare(predicate, lhs, rhs, "cmp")?;
        Ok(Typed::new(value, Ty::Bool))
    }

    fn array_literal(&mut self, elem_hint: &str, elements: &[Expr]) -> Result<Typed<'ctx>> {
        let elem = Ty::resolve(elem_hint).ok_or_else(|| Error::UnknownType(elem_hint.to_owned()))?;
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            let element = self.expr(element)?;
            if element.ty != elem {
                return Err(Error::ArrayElementType {
                    expected: elem,
                    actual: element.ty,
                });
            }
            values.push(element.value);
        }

        let i32_type = self.context.i32_type();
        let len = values.len() as u32;
        let elem_type = self.basic_type(&elem)?;
        let storage_type = elem_type.array_type(len);
        let storage = self.entry_slot(storage_type, "arr")?;
        let zero = i32_type.const_zero();
        // SAFETY: `[0, 0]` addresses the first element of `storage`.
        let data = unsafe {
            self.builder
                .build_in_bounds_gep(storage, &[zero, zero], "arr.data")
        }?;
        for (i, value) in values.into_iter().enumerate() {
            let index = i32_type.const_int(i as u64, false);
            // SAFETY: `i` is below the length of `storage`.
            let ptr = unsafe {
                self.builder
                    .build_in_bounds_gep(data, &[index], "arr.elem")
            }?;
            self.builder.build_store(ptr, value)?;
        }

        let ty = Ty::array_of(elem);
        let slice = self.basic_type(&ty)?.into_struct_type().get_undef();
        let slice = self
            .builder
            .build_insert_value(slice, data, 0, "arr.slice")?
            .into_struct_value();
        let slice = self
            .builder
            .build_insert_value(slice, i32_type.const_int(u64::from(len), false), 1, "arr.slice")?
            .into_struct_value();
        Ok(Typed::new(slice, ty))
    }

    /// Computes the address of `array[index]`, checking the index against the
    /// carried length first when bounds checks are enabled. Returns the
    /// address with the element type.
    fn element_ptr(&mut self, array: &Typed<'ctx>, index: &Expr) -> Result<(PointerValue<'ctx>, Ty)> {
        let elem = array
            .ty
            .element()
            .ok_or_else(|| Error::NotAnArray(array.ty.clone()))?
            .clone();
        let index = self.expr(index)?;
        if index.ty != Ty::I32 {
            return Err(Error::IndexType(index.ty));
        }
        let index = index.value.into_int_value();
        let slice = array.value.into_struct_value();

        if self.options.bounds_checks {
            let len = self
                .builder
                .build_extract_value(slice, 1, "arr.len")?
                .into_int_value();
            // Unsigned comparison also rejects negative indices.
            let in_bounds =
                self.builder
                    .build_int_compare(IntPredicate::ULT, index, len, "in.bounds")?;
            let ok_bb = self.block("bounds.ok");
            let fail_bb = self.block("bounds.fail");
            self.builder
                .build_conditional_branch(in_bounds, ok_bb, fail_bb)?;

            self.switch_to(fail_bb);
            let bounds_fail = runtime::bounds_fail(self.context, &self.module);
            self.builder
                .build_call(bounds_fail, &[index.into(), len.into()], "")?;
            self.builder.build_unreachable()?;

            self.switch_to(ok_bb);
        }

        let data = self
            .builder
            .build_extract_value(slice, 0, "arr.ptr")?
            .into_pointer_value();
        self.basic_type(&elem)?;
        // SAFETY: the index was range checked above unless checks are off.
        let ptr = unsafe {
            self.builder
                .build_in_bounds_gep(data, &[index], "elem.ptr")
        }?;
        Ok((ptr, elem))
    }

    /// Conditions accept booleans and i32 (non-zero is true).
    fn condition(&mut self, cond: &Expr) -> Result<IntValue<'ctx>> {
        let cond = self.expr(cond)?;
        match cond.ty {
            Ty::Bool => Ok(cond.value.into_int_value()),
            Ty::I32 => Ok(self.builder.build_int_compare(
                IntPredicate::NE,
                cond.value.into_int_value(),
                self.context.i32_type().const_zero(),
                "tobool",
            )?),
            other => Err(Error::ConditionType(other)),
        }
    }

    /// Lowers a call. Returns `None` for functions that return nothing.
    fn call(&mut self, name: &str, args: &[Expr]) -> Result<Option<Typed<'ctx>>> {
        match registry::lookup(name) {
            Some(Function::Print { newline }) => self.print(name, *newline, args).map(|()| None),
            Some(Function::External(signature)) => self.external(name, signature, args),
            None => Err(Error::UnknownFunction(name.to_owned())),
        }
    }

    fn print(&mut self, name: &str, newline: bool, args: &[Expr]) -> Result<()> {
        let [arg] = args else {
            return Err(Error::ArgumentCount {
                name: name.to_owned(),
                expected: 1,
                actual: args.len(),
            });
        };
        let arg = self.expr(arg)?;
        match (arg.ty, newline) {
            (Ty::Str, true) => {
                let puts = runtime::puts(self.context, &self.module);
                self.builder.build_call(puts, &[arg.value.into()], "puts")?;
            }
            (Ty::Str, false) => {
                let printf = runtime::printf(self.context, &self.module);
                let format = self.string("%s")?;
                self.builder
                    .build_call(printf, &[format.into(), arg.value.into()], "printf")?;
            }
            (Ty::I32, newline) => {
                let printf = runtime::printf(self.context, &self.module);
                let format = self.string(if newline { "%d\n" } else { "%d" })?;
                self.builder
                    .build_call(printf, &[format.into(), arg.value.into()], "printf")?;
            }
            (other, _) => return Err(Error::PrintArgument(other)),
        }
        Ok(())
    }

    fn external(
        &mut self,
        name: &str,
        signature: &Signature,
        args: &[Expr],
    ) -> Result<Option<Typed<'ctx>>> {
        if args.len() != signature.params.len() {
            return Err(Error::ArgumentCount {
                name: name.to_owned(),
                expected: signature.params.len(),
                actual: args.len(),
            });
        }

        let mut lowered: Vec<BasicMetadataValueEnum<'ctx>> = Vec::with_capacity(args.len() + 1);
        for (position, (arg, param)) in args.iter().zip(signature.params).enumerate() {
            let arg = self.expr(arg)?;
            let expected = param.ty();
            if arg.ty != expected {
                return Err(Error::ArgumentType {
                    name: name.to_owned(),
                    position: position + 1,
                    expected,
                    actual: arg.ty,
                });
            }
            if *param == Param::I32Array {
                let slice = arg.value.into_struct_value();
                let ptr = self.builder.build_extract_value(slice, 0, "arr.ptr")?;
                let len = self.builder.build_extract_value(slice, 1, "arr.len")?;
                lowered.push(ptr.into());
                lowered.push(len.into());
            } else {
                lowered.push(arg.value.into());
            }
        }

        let callee = runtime::get_or_declare(&self.module, name, signature.fn_type(self.context));
        // Void results cannot carry a name.
        let label = if signature.ret == Param::Void { "" } else { name };
        let call = self.builder.build_call(callee, &lowered, label)?;
        Ok(call
            .try_as_basic_value()
            .left()
            .map(|value| Typed::new(value, signature.ret.ty())))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::parse_program;

    fn generate_src<'ctx>(context: &'ctx Context, src: &str) -> Result<Output<'ctx>> {
        let program = parse_program(src).expect("program should parse");
        Generator::with_options(Options::default()).generate(context, &program)
    }

    fn ir(output: &Output) -> String {
        output.module.print_to_string().to_string()
    }

    /// The stack slots of `main`, as `%name = alloca type`.
    fn slots(output: &Output) -> Vec<String> {
        ir(output)
            .lines()
            .filter(|line| line.contains(" = alloca "))
            .map(|line| line.split(", align").next().unwrap_or(line).trim().to_owned())
            .collect()
    }

    #[test]
    fn test_declared_and_inferred_slots() {
        let context = Context::create();
        let output = generate_src(
            &context,
            r#"let x = "hi"; let y: i32 = 5; let z = 1.5; let b = true;"#,
        )
        .unwrap();
        assert_eq!(
            slots(&output),
            vec![
                "%x = alloca i8*",
                "%y = alloca i32",
                "%z = alloca double",
                "%b = alloca i1",
            ]
        );
        assert_eq!(output.warnings, vec![]);
    }

    #[test]
    fn test_slots_are_hoisted_into_entry() {
        let context = Context::create();
        let output = generate_src(
            &context,
            "let n: i32 = 2; while (n) { let a = [n, n]; n--; } let last: i32 = n;",
        )
        .unwrap();
        assert_eq!(
            slots(&output),
            vec![
                "%n = alloca i32",
                "%arr = alloca [2 x i32]",
                "%a = alloca { i32*, i32 }",
                "%last = alloca i32",
            ]
        );
        let text = ir(&output);
        let entry = text.find("entry:").unwrap();
        let cond = text.find("while.cond:").unwrap();
        assert!(text[entry..cond].contains("%last = alloca i32"), "{text}");
    }

    #[test]
    fn test_inference_defaults_to_i32() {
        let context = Context::create();
        let output = generate_src(&context, "let a: i32 = 1; let b = a + 1; let c;").unwrap();
        assert_eq!(
            output.warnings,
            vec![
                Warning::InferredDefault { name: "b".into() },
                Warning::InferredDefault { name: "c".into() },
            ]
        );
    }

    #[test]
    fn test_scalar_mismatches_warn_and_convert() {
        let context = Context::create();
        let output = generate_src(
            &context,
            "let n: i32 = 1; let f = math_sqrt(16.0); let b = n < 2; let r: f64 = n; n = 2.5;",
        )
        .unwrap();
        assert_eq!(
            output.warnings,
            vec![
                Warning::InferredDefault { name: "f".into() },
                Warning::TypeMismatch {
                    name: "f".into(),
                    declared: Ty::I32,
                    actual: Ty::F64,
                },
                Warning::InferredDefault { name: "b".into() },
                Warning::TypeMismatch {
                    name: "b".into(),
                    declared: Ty::I32,
                    actual: Ty::Bool,
                },
                Warning::TypeMismatch {
                    name: "r".into(),
                    declared: Ty::F64,
                    actual: Ty::I32,
                },
                Warning::TypeMismatch {
                    name: "n".into(),
                    declared: Ty::I32,
                    actual: Ty::F64,
                },
            ]
        );
        let text = ir(&output);
        for instruction in ["fptosi", "zext", "sitofp"] {
            assert!(text.contains(instruction), "missing {instruction} in {text}");
        }
    }

    #[test]
    fn test_incompatible_values_are_rejected() {
        let context = Context::create();
        let cases: &[(&str, Error)] = &[
            (
                r#"let x: i32 = "hi";"#,
                Error::IncompatibleValue {
                    name: "x".into(),
                    expected: Ty::I32,
                    actual: Ty::Str,
                },
            ),
            (
                "let a: string[] = [1, 2];",
                Error::IncompatibleValue {
                    name: "a".into(),
                    expected: Ty::array_of(Ty::Str),
                    actual: Ty::array_of(Ty::I32),
                },
            ),
            (
                r#"let a: i32[] = [1]; a = ["x"];"#,
                Error::IncompatibleValue {
                    name: "a".into(),
                    expected: Ty::array_of(Ty::I32),
                    actual: Ty::array_of(Ty::Str),
                },
            ),
        ];
        for (src, expected) in cases {
            assert_eq!(&generate_src(&context, src).unwrap_err(), expected, "source: {src}");
        }
    }

    #[test]
    fn test_fatal_errors() {
        let context = Context::create();
        let cases: &[(&str, Error)] = &[
            ("let p: Point;", Error::UnknownType("Point".into())),
            ("x = 1;", Error::UnknownVariable("x".into())),
            (
                "let o = {a: 1};",
                Error::Unsupported("object literal"),
            ),
            (
                "let a = [1]; let n = a.size;",
                Error::Unsupported("object property access"),
            ),
            (
                "let s = \"x\"; let n = s.length;",
                Error::LengthOfNonArray(Ty::Str),
            ),
            (
                "let n: i32 = 1; n[0] = 1;",
                Error::NotAnArray(Ty::I32),
            ),
            (
                "let a = [1, \"x\"];",
                Error::ArrayElementType {
                    expected: Ty::I32,
                    actual: Ty::Str,
                },
            ),
            (
                "let a = [1]; a[0] = \"x\";",
                Error::ArrayElementType {
                    expected: Ty::I32,
                    actual: Ty::Str,
                },
            ),
            (
                "let a = [1]; a[\"0\"] = 1;",
                Error::IndexType(Ty::Str),
            ),
            (
                "let s = \"a\" + \"b\";",
                Error::InvalidOperands {
                    op: "+",
                    lhs: Ty::Str,
                    rhs: Ty::Str,
                },
            ),
            (
                "let s = \"a\" < \"b\";",
                Error::InvalidOperands {
                    op: "<",
                    lhs: Ty::Str,
                    rhs: Ty::Str,
                },
            ),
            (
                "let b = true + false;",
                Error::InvalidOperands {
                    op: "+",
                    lhs: Ty::Bool,
                    rhs: Ty::Bool,
                },
            ),
            ("println(1.5);", Error::PrintArgument(Ty::F64)),
            (
                "println(1, 2);",
                Error::ArgumentCount {
                    name: "println".into(),
                    expected: 1,
                    actual: 2,
                },
            ),
            (
                "let r = math_sqrt(4);",
                Error::ArgumentType {
                    name: "math_sqrt".into(),
                    position: 1,
                    expected: Ty::F64,
                    actual: Ty::I32,
                },
            ),
            ("let v = println(1);", Error::VoidValue("println".into())),
            ("if (\"s\") { }", Error::ConditionType(Ty::Str)),
            (
                "let big: i32 = 3000000000;",
                Error::Unsupported("an integer literal outside the i32 range"),
            ),
        ];
        for (src, expected) in cases {
            assert_eq!(&generate_src(&context, src).unwrap_err(), expected, "source: {src}");
        }
    }

    #[test]
    fn test_unknown_function_in_ast() {
        let context = Context::create();
        let program = Program {
            statements: vec![Stmt::Expr(Expr::Call {
                name: "nope".into(),
                args: vec![],
            })],
        };
        assert_eq!(
            super::super::generate(&context, &program).unwrap_err(),
            Error::UnknownFunction("nope".into())
        );
    }

    #[test]
    fn test_array_arguments_are_split() {
        let context = Context::create();
        let output =
            generate_src(&context, "let a = [3, 1, 2]; let s: i32 = array_sum_i32(a);").unwrap();
        let sum = output.module.get_function("array_sum_i32").unwrap();
        assert_eq!(sum.count_params(), 2);
        assert!(
            ir(&output).contains("declare i32 @array_sum_i32(i32*, i32)"),
            "{}",
            ir(&output)
        );
    }

    #[test]
    fn test_string_literals_are_shared() {
        let context = Context::create();
        let output = generate_src(&context, r#"println("a"); println("a"); println("b");"#).unwrap();
        let globals = ir(&output)
            .lines()
            .filter(|line| line.starts_with("@.str"))
            .count();
        assert_eq!(globals, 2);
    }

    #[test]
    fn test_bounds_checks_can_be_disabled() {
        let context = Context::create();
        let program = parse_program("let a = [1, 2]; println(a[1]);").unwrap();
        let checked = Generator::with_options(Options::default())
            .generate(&context, &program)
            .unwrap();
        let unchecked = Generator::with_options(Options {
            bounds_checks: false,
            ..Options::default()
        })
        .generate(&context, &program)
        .unwrap();
        assert!(checked.module.get_function(runtime::BOUNDS_FAIL).is_some());
        assert!(unchecked.module.get_function(runtime::BOUNDS_FAIL).is_none());
        let main = unchecked.module.get_function("main").unwrap();
        assert_eq!(main.count_basic_blocks(), 1);
    }

    #[test]
    fn test_each_generate_starts_fresh() {
        let context = Context::create();
        let generator = Generator::with_options(Options::default());
        let first = parse_program("let x: i32 = 1;").unwrap();
        let second = parse_program("x = 2;").unwrap();
        generator.generate(&context, &first).unwrap();
        assert_eq!(
            generator.generate(&context, &second).unwrap_err(),
            Error::UnknownVariable("x".into())
        );
    }
}

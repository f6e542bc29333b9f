use std::io::Write;

use crate::ast::{Expr, Program, Stmt};

const INDENT_WIDTH: usize = 2;

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}

pub fn print_program_string(program: &Program) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_program(&mut buf, program).expect("writing to a Vec cannot fail");
    String::from_utf8_lossy(&buf).into_owned()
}

pub fn print_expr_string(expr: &Expr) -> String {
    let mut buf = Vec::with_capacity(512);
    print_expr(&mut buf, 0, expr).expect("writing to a Vec cannot fail");
    String::from_utf8_lossy(&buf).into_owned()
}

pub fn print_program(w: &mut impl Write, program: &Program) -> std::io::Result<()> {
    print_stmts(w, 0, &program.statements)
}

fn print_stmts(w: &mut impl Write, i: usize, stmts: &[Stmt]) -> std::io::Result<()> {
    for stmt in stmts {
        print_stmt(w, i, stmt)?;
    }
    Ok(())
}

/// Prints a labeled child section, e.g. `cond` or `body`.
fn section(w: &mut impl Write, i: usize, label: &str) -> std::io::Result<()> {
    sp(w, i)?;
    writeln!(w, "{label}")
}

fn print_stmt(w: &mut impl Write, i: usize, stmt: &Stmt) -> std::io::Result<()> {
    match stmt {
        Stmt::VarDecl(decl) => {
            sp(w, i)?;
            writeln!(w, "let {}: {}", decl.name, decl.ty)?;
            if let Some(init) = &decl.init {
                print_expr(w, i + 1, init)?;
            }
        }
        Stmt::Assign(assign) => {
            sp(w, i)?;
            writeln!(w, "assign {}", assign.name)?;
            print_expr(w, i + 1, &assign.value)?;
        }
        Stmt::IndexAssign {
            array,
            index,
            value,
        } => {
            section(w, i, "index-assign")?;
            print_expr(w, i + 1, array)?;
            print_expr(w, i + 1, index)?;
            print_expr(w, i + 1, value)?;
        }
        Stmt::Expr(expr) => {
            section(w, i, "expr")?;
            print_expr(w, i + 1, expr)?;
        }
        Stmt::If {
            cond,
            then_block,
            else_block,
        } => {
            section(w, i, "if")?;
            section(w, i + 1, "cond")?;
            print_expr(w, i + 2, cond)?;
            section(w, i + 1, "then")?;
            print_stmts(w, i + 2, then_block)?;
            if !else_block.is_empty() {
                section(w, i + 1, "else")?;
                print_stmts(w, i + 2, else_block)?;
            }
        }
        Stmt::While { cond, body } => {
            section(w, i, "while")?;
            section(w, i + 1, "cond")?;
            print_expr(w, i + 2, cond)?;
            section(w, i + 1, "body")?;
            print_stmts(w, i + 2, body)?;
        }
        Stmt::DoWhile { body, cond } => {
            section(w, i, "do-while")?;
            section(w, i + 1, "body")?;
            print_stmts(w, i + 2, body)?;
            section(w, i + 1, "cond")?;
            print_expr(w, i + 2, cond)?;
        }
        Stmt::For {
            init,
            cond,
            step,
            body,
        } => {
            section(w, i, "for")?;
            if let Some(init) = init {
                section(w, i + 1, "init")?;
                print_stmt(w, i + 2, init)?;
            }
            if let Some(cond) = cond {
                section(w, i + 1, "cond")?;
                print_expr(w, i + 2, cond)?;
            }
            if let Some(step) = step {
                section(w, i + 1, "step")?;
                print_stmt(w, i + 2, step)?;
            }
            section(w, i + 1, "body")?;
            print_stmts(w, i + 2, body)?;
        }
    }
    Ok(())
}

fn print_expr(w: &mut impl Write, i: usize, expr: &Expr) -> std::io::Result<()> {
    sp(w, i)?;
    match expr {
        Expr::String(s) => writeln!(w, "string {s:?}")?,
        Expr::Int(int) => writeln!(w, "int {int}")?,
        Expr::Float(float) => writeln!(w, "float {float}")?,
        Expr::Bool(bool) => writeln!(w, "bool {bool}")?,
        Expr::Var(name) => writeln!(w, "var {name}")?,
        Expr::Binary { op, lhs, rhs } => {
            writeln!(w, "binary {op:?}")?;
            print_expr(w, i + 1, lhs)?;
            print_expr(w, i + 1, rhs)?;
        }
        Expr::Array {
            elem_hint,
            elements,
        } => {
            writeln!(w, "array {elem_hint}")?;
            for element in elements {
                print_expr(w, i + 1, element)?;
            }
        }
        Expr::Index { array, index } => {
            writeln!(w, "index")?;
            print_expr(w, i + 1, array)?;
            print_expr(w, i + 1, index)?;
        }
        Expr::Object { properties } => {
            writeln!(w, "object")?;
            for (key, value) in properties {
                sp(w, i + 1)?;
                writeln!(w, "property {key}")?;
                print_expr(w, i + 2, value)?;
            }
        }
        Expr::Member { base, name } => {
            writeln!(w, "member {name}")?;
            print_expr(w, i + 1, base)?;
        }
        Expr::Call { name, args } => {
            writeln!(w, "call {name}")?;
            for arg in args {
                print_expr(w, i + 1, arg)?;
            }
        }
    }
    Ok(())
}

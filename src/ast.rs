//! Abstract syntax tree nodes for minic.

use std::fmt;

/// Binary operators, ordered by how the parser groups them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Gt,
}

impl BinaryOp {
    /// Source spelling of the operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    BinOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    // integer literals are always 32-bit
    Num {
        value: i32,
    },
    VarRef {
        name: String,
    },
}

impl Expr {
    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::BinOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn num(value: i32) -> Self {
        Expr::Num { value }
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::VarRef { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `int name;`
    VarDeclare { name: String },
    VarAssign { name: String, expr: Expr },
    Return { expr: Expr },
    If {
        condition: Expr,
        then_body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
    },
    /// Call in statement position; calls never appear inside expressions.
    Call { name: String, args: Vec<Expr> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub body: Vec<Stmt>,
}

/// Top-level container for a parsed program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub functions: Vec<Function>,
}

// ================= printable rendering ==================

const INDENT: &str = "  ";

fn write_expr(f: &mut fmt::Formatter<'_>, expr: &Expr, depth: usize) -> fmt::Result {
    let pad = INDENT.repeat(depth);
    match expr {
        Expr::BinOp { left, op, right } => {
            writeln!(f, "{pad}BinOp {}", op.symbol())?;
            write_expr(f, left, depth + 1)?;
            write_expr(f, right, depth + 1)
        }
        Expr::Num { value } => writeln!(f, "{pad}Num {value}"),
        Expr::VarRef { name } => writeln!(f, "{pad}VarRef {name}"),
    }
}

fn write_body(f: &mut fmt::Formatter<'_>, body: &[Stmt], depth: usize) -> fmt::Result {
    body.iter().try_for_each(|stmt| write_stmt(f, stmt, depth))
}

fn write_stmt(f: &mut fmt::Formatter<'_>, stmt: &Stmt, depth: usize) -> fmt::Result {
    let pad = INDENT.repeat(depth);
    match stmt {
        Stmt::VarDeclare { name } => writeln!(f, "{pad}VarDeclare int {name}"),
        Stmt::VarAssign { name, expr } => {
            writeln!(f, "{pad}VarAssign {name}")?;
            write_expr(f, expr, depth + 1)
        }
        Stmt::Return { expr } => {
            writeln!(f, "{pad}Return")?;
            write_expr(f, expr, depth + 1)
        }
        Stmt::If {
            condition,
            then_body,
            else_body,
        } => {
            writeln!(f, "{pad}If")?;
            write_expr(f, condition, depth + 1)?;
            writeln!(f, "{pad}{INDENT}Then")?;
            write_body(f, then_body, depth + 2)?;
            if let Some(else_body) = else_body {
                writeln!(f, "{pad}{INDENT}Else")?;
                write_body(f, else_body, depth + 2)?;
            }
            Ok(())
        }
        Stmt::Call { name, args } => {
            writeln!(f, "{pad}Call {name}")?;
            args.iter().try_for_each(|arg| write_expr(f, arg, depth + 1))
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Program")?;
        for func in &self.functions {
            writeln!(f, "{INDENT}Function {}", func.name)?;
            write_body(f, &func.body, 2)?;
        }
        Ok(())
    }
}

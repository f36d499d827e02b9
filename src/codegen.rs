//! Lowers a minic AST into LLVM IR using Inkwell.

use std::collections::HashMap;

use inkwell::{
    basic_block::BasicBlock,
    builder::Builder,
    context::Context as LlvmContext,
    module::{Linkage, Module},
    targets::TargetTriple,
    values::{FunctionValue, InstructionOpcode, IntValue, PointerValue},
    IntPredicate,
};
use tracing::debug;

use crate::ast::{BinaryOp, Expr, Function, Program, Stmt};
use crate::error::CodegenError;

type Result<T> = std::result::Result<T, CodegenError>;

/// The one runtime primitive the language can call: `void print_int(i32)`.
pub const PRINT_INT: &str = "print_int";

/// Knobs for the emitted module header.
#[derive(Debug, Clone)]
pub struct CodegenOptions {
    pub module_name: String,
    /// Left unset, downstream tools pick the host triple.
    pub target_triple: Option<String>,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            module_name: "minic".to_string(),
            target_triple: None,
        }
    }
}

/// Generates IR for one compilation: owns the module, the builder cursor, and
/// the symbol table of the function being lowered. Construct a fresh one per
/// compilation.
pub struct CodeGen<'ctx> {
    ctx: &'ctx LlvmContext,
    builder: Builder<'ctx>,
    module: Module<'ctx>,
    print_int: FunctionValue<'ctx>,
    symbols: HashMap<String, PointerValue<'ctx>>,
}

impl<'ctx> CodeGen<'ctx> {
    pub fn new(ctx: &'ctx LlvmContext, options: &CodegenOptions) -> Self {
        let module = ctx.create_module(&options.module_name);
        if let Some(triple) = &options.target_triple {
            module.set_triple(&TargetTriple::create(triple));
        }
        let builder = ctx.create_builder();

        // declare void @print_int(i32)
        let print_int_ty = ctx.void_type().fn_type(&[ctx.i32_type().into()], false);
        let print_int = module.add_function(PRINT_INT, print_int_ty, Some(Linkage::External));

        Self {
            ctx,
            builder,
            module,
            print_int,
            symbols: HashMap::new(),
        }
    }

    /// Walk the program, verify the module, and render it as text.
    pub fn generate(mut self, program: &Program) -> Result<String> {
        for func in &program.functions {
            self.emit_function(func)?;
        }
        self.module
            .verify()
            .map_err(|e| CodegenError::Verify(e.to_string()))?;
        Ok(self.module.print_to_string().to_string())
    }

    fn emit_function(&mut self, func: &Function) -> Result<()> {
        if self.module.get_function(&func.name).is_some() {
            return Err(CodegenError::Redefinition(func.name.clone()));
        }
        debug!(function = %func.name, "generating function");
        let fn_ty = self.ctx.i32_type().fn_type(&[], false);
        let function = self.module.add_function(&func.name, fn_ty, None);
        let entry = self.ctx.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);
        // slots never outlive the function that allocated them
        self.symbols = HashMap::new();

        self.emit_body(&func.body)?;

        if let Some(open) = self.open_block() {
            if open != entry && open.get_first_use().is_none() {
                self.builder.build_unreachable()?;
            } else {
                // falling off the end of the body returns 0
                self.builder.build_return(Some(&self.ctx.i32_type().const_zero()))?;
            }
        }
        Ok(())
    }

    fn emit_body(&mut self, body: &[Stmt]) -> Result<()> {
        for stmt in body {
            if self.open_block().is_none() {
                // code after a return lands in a fresh block nothing branches to
                debug!("lowering statement after terminator into unreachable block");
                let dead = self.ctx.append_basic_block(self.current_function()?, "dead");
                self.builder.position_at_end(dead);
            }
            self.emit_stmt(stmt)?;
        }
        Ok(())
    }

    fn emit_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::VarDeclare { name } => {
                let slot = self.entry_alloca(name)?;
                if self.symbols.insert(name.clone(), slot).is_some() {
                    debug!(variable = %name, "redeclaration rebinds to a fresh slot");
                }
            }
            Stmt::VarAssign { name, expr } => {
                let value = self.gen_expr_int(expr)?;
                let slot = self.lookup(name)?;
                self.builder.build_store(slot, value)?;
            }
            Stmt::Return { expr } => {
                let value = self.gen_expr_int(expr)?;
                self.builder.build_return(Some(&value))?;
            }
            Stmt::If {
                condition,
                then_body,
                else_body,
            } => self.emit_if(condition, then_body, else_body.as_deref())?,
            Stmt::Call { name, args } => {
                if name != PRINT_INT {
                    return Err(CodegenError::UndefinedFunction(name.clone()));
                }
                let [arg] = args.as_slice() else {
                    return Err(CodegenError::Arity {
                        name: name.clone(),
                        expected: 1,
                        found: args.len(),
                    });
                };
                let value = self.gen_expr_int(arg)?;
                self.builder.build_call(self.print_int, &[value.into()], "")?;
            }
        }
        Ok(())
    }

    fn emit_if(&mut self, condition: &Expr, then_body: &[Stmt], else_body: Option<&[Stmt]>) -> Result<()> {
        let cond = self.gen_expr(condition)?;
        let cond = self.to_bool(cond)?;

        let function = self.current_function()?;
        let then_bb = self.ctx.append_basic_block(function, "then");
        let else_bb = else_body.map(|_| self.ctx.append_basic_block(function, "else"));
        let merge_bb = self.ctx.append_basic_block(function, "merge");
        self.builder
            .build_conditional_branch(cond, then_bb, else_bb.unwrap_or(merge_bb))?;

        self.builder.position_at_end(then_bb);
        self.emit_body(then_body)?;
        if self.open_block().is_some() {
            self.builder.build_unconditional_branch(merge_bb)?;
        }

        if let (Some(else_bb), Some(else_body)) = (else_bb, else_body) {
            self.builder.position_at_end(else_bb);
            self.emit_body(else_body)?;
            if self.open_block().is_some() {
                self.builder.build_unconditional_branch(merge_bb)?;
            }
        }

        self.builder.position_at_end(merge_bb);
        Ok(())
    }

    /// Evaluate an expression to either an `i32` or, for comparisons, an `i1`.
    fn gen_expr(&mut self, expr: &Expr) -> Result<IntValue<'ctx>> {
        let i32_t = self.ctx.i32_type();

        Ok(match expr {
            // literal integers map directly to LLVM constants
            Expr::Num { value } => i32_t.const_int(*value as i64 as u64, true),
            Expr::VarRef { name } => {
                let slot = self.lookup(name)?;
                self.builder.build_load(slot, name)?.into_int_value()
            }
            Expr::BinOp { left, op, right } => {
                // evaluate operands left-to-right
                let l = self.gen_expr_int(left)?;
                let r = self.gen_expr_int(right)?;
                match op {
                    BinaryOp::Add => self.builder.build_int_add(l, r, "addtmp")?,
                    BinaryOp::Sub => self.builder.build_int_sub(l, r, "subtmp")?,
                    BinaryOp::Mul => self.builder.build_int_mul(l, r, "multmp")?,
                    BinaryOp::Div => self.builder.build_int_signed_div(l, r, "divtmp")?,
                    BinaryOp::Eq => self.builder.build_int_compare(IntPredicate::EQ, l, r, "cmptmp")?,
                    BinaryOp::Ne => self.builder.build_int_compare(IntPredicate::NE, l, r, "cmptmp")?,
                    BinaryOp::Lt => self.builder.build_int_compare(IntPredicate::SLT, l, r, "cmptmp")?,
                    BinaryOp::Gt => self.builder.build_int_compare(IntPredicate::SGT, l, r, "cmptmp")?,
                }
            }
        })
    }

    /// Evaluate an expression where an `i32` is required, widening booleans.
    fn gen_expr_int(&mut self, expr: &Expr) -> Result<IntValue<'ctx>> {
        let value = self.gen_expr(expr)?;
        if is_bool(value) {
            return Ok(self
                .builder
                .build_int_z_extend(value, self.ctx.i32_type(), "booltmp")?);
        }
        Ok(value)
    }

    /// Branch conditions must be `i1`; any other integer tests non-zero.
    fn to_bool(&mut self, value: IntValue<'ctx>) -> Result<IntValue<'ctx>> {
        if is_bool(value) {
            return Ok(value);
        }
        let zero = value.get_type().const_zero();
        Ok(self
            .builder
            .build_int_compare(IntPredicate::NE, value, zero, "ifcond")?)
    }

    /// Allocate an `i32` slot at the top of the entry block, after any earlier
    /// slots, so it dominates every use wherever the declaration appears.
    fn entry_alloca(&self, name: &str) -> Result<PointerValue<'ctx>> {
        let entry = self
            .current_function()?
            .get_first_basic_block()
            .ok_or_else(|| CodegenError::Builder("function has no entry block".into()))?;
        let mut insert_before = entry.get_first_instruction();
        while let Some(inst) = insert_before.filter(|i| i.get_opcode() == InstructionOpcode::Alloca) {
            insert_before = inst.get_next_instruction();
        }

        let builder = self.ctx.create_builder();
        match insert_before {
            Some(inst) => builder.position_before(&inst),
            None => builder.position_at_end(entry),
        }
        Ok(builder.build_alloca(self.ctx.i32_type(), name)?)
    }

    /// Block under the cursor, unless it already ends in a terminator.
    fn open_block(&self) -> Option<BasicBlock<'ctx>> {
        self.builder
            .get_insert_block()
            .filter(|block| block.get_terminator().is_none())
    }

    fn current_function(&self) -> Result<FunctionValue<'ctx>> {
        self.builder
            .get_insert_block()
            .and_then(|block| block.get_parent())
            .ok_or_else(|| CodegenError::Builder("builder is not positioned in a function".into()))
    }

    fn lookup(&self, name: &str) -> Result<PointerValue<'ctx>> {
        self.symbols
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::UndefinedSymbol(name.to_string()))
    }
}

fn is_bool(value: IntValue<'_>) -> bool {
    value.get_type().get_bit_width() == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::parse;

    fn gen(src: &str) -> Result<String> {
        let program = parse(Lexer::new(src)).expect("test source parses");
        let ctx = LlvmContext::create();
        CodeGen::new(&ctx, &CodegenOptions::default()).generate(&program)
    }

    fn terminator_count(block: &str) -> usize {
        block
            .lines()
            .filter(|l| {
                let l = l.trim_start();
                l.starts_with("ret ") || l.starts_with("br ") || l == "unreachable"
            })
            .count()
    }

    /// Split the `main` definition into `(label, body)` pairs. Labels drop
    /// the `; preds = ...` annotation.
    fn blocks(ir: &str) -> Vec<(String, String)> {
        let body = ir
            .split_once("define i32 @main() {\n")
            .map(|(_, rest)| rest)
            .unwrap_or_default();
        let body = body.split_once("\n}").map(|(b, _)| b).unwrap_or(body);
        body.split("\n\n")
            .map(|chunk| {
                let (label, rest) = chunk.split_once('\n').unwrap_or((chunk, ""));
                let label = label.split(':').next().unwrap_or_default();
                (label.trim().to_string(), rest.to_string())
            })
            .collect()
    }

    fn block<'a>(blocks: &'a [(String, String)], label: &str) -> &'a str {
        blocks
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, body)| body.as_str())
            .unwrap_or_else(|| panic!("no block `{label}` in {blocks:?}"))
    }

    #[test]
    fn if_else_with_returns_in_both_branches() {
        let ir = gen("int main() { int x; x = 5; if (x > 3) { return 1; } else { return 0; } }").unwrap();
        assert!(ir.starts_with("; ModuleID = 'minic'\nsource_filename = \"minic\"\n"));
        assert_eq!(ir.matches("declare void @print_int(i32)").count(), 1);

        let blocks = blocks(&ir);
        let labels: Vec<_> = blocks.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, ["entry", "then", "else", "merge"]);

        let entry = block(&blocks, "entry");
        assert!(entry.starts_with("  %x = alloca i32, align 4\n  store i32 5, i32* %x, align 4\n"));
        assert!(entry.contains("icmp sgt i32"));
        assert!(entry.trim_end().ends_with("label %then, label %else"));
        assert_eq!(block(&blocks, "then").trim(), "ret i32 1");
        assert_eq!(block(&blocks, "else").trim(), "ret i32 0");
        assert_eq!(block(&blocks, "merge").trim(), "unreachable");
        assert!(!ir.contains("br label %merge"));
    }

    #[test]
    fn every_block_has_exactly_one_terminator() {
        let ir = gen(
            "int main() {
                int a; a = 2;
                if (a == 2) { if (a) { return 5; } a = a + 1; } else { print_int(a); }
                if (a < 0) { return 1; }
                print_int(a);
            }",
        )
        .unwrap();
        let blocks = blocks(&ir);
        assert!(blocks.len() > 5);
        for (label, body) in blocks {
            assert_eq!(terminator_count(&body), 1, "block {label}:\n{body}");
        }
    }

    #[test]
    fn then_without_else_falls_through_to_merge() {
        let ir = gen("int main() { int x; x = 1; if (x < 2) { x = 3; } return x; }").unwrap();
        let blocks = blocks(&ir);
        assert!(block(&blocks, "entry").contains("label %then, label %merge"));
        assert_eq!(
            block(&blocks, "then"),
            "  store i32 3, i32* %x, align 4\n  br label %merge"
        );
        let merge = block(&blocks, "merge");
        assert!(merge.contains("load i32, i32* %x, align 4"));
        assert!(merge.contains("ret i32 %x"));
    }

    #[test]
    fn print_int_is_declared_once() {
        let ir = gen("int main() { print_int(1); print_int(2); print_int(3); return 0; }").unwrap();
        assert_eq!(ir.matches("declare void @print_int(i32)").count(), 1);
        assert_eq!(ir.matches("call void @print_int(i32").count(), 3);
        assert!(ir.contains("call void @print_int(i32 1)"));
    }

    #[test]
    fn arithmetic_maps_to_signed_ops() {
        let ir = gen("int main() { int n; n = 8; return (n - 2) * n / 2 + n; }").unwrap();
        assert!(ir.contains("%subtmp = sub i32 %n"));
        assert!(ir.contains("%multmp = mul i32 %subtmp, %n"));
        assert!(ir.contains("%divtmp = sdiv i32 %multmp, 2"));
        assert!(ir.contains("%addtmp = add i32 %divtmp, %n"));
        assert!(ir.contains("ret i32 %addtmp"));
    }

    #[test]
    fn constant_operands_fold() {
        let ir = gen("int main() { return 1 + 2 * 3; }").unwrap();
        assert!(ir.contains("ret i32 7"));
    }

    #[test]
    fn comparisons_are_widened_when_used_as_integers() {
        let ir = gen("int main() { int a; int b; a = 1; b = a != 2; return (b == 1) + 1; }").unwrap();
        assert!(ir.contains("%cmptmp = icmp ne i32 %a"));
        assert!(ir.contains("%booltmp = zext i1 %cmptmp to i32"));
        assert!(ir.contains("store i32 %booltmp, i32* %b, align 4"));
        assert_eq!(ir.matches("zext i1").count(), 2);
    }

    #[test]
    fn integer_conditions_test_non_zero() {
        let ir = gen("int main() { int x; x = 4; if (x) { return 1; } return 0; }").unwrap();
        assert!(ir.contains("%ifcond = icmp ne i32 %x"));
        assert!(ir.contains("br i1 %ifcond, label %then, label %merge"));
    }

    #[test]
    fn undefined_symbol_is_fatal() {
        assert_eq!(
            gen("int main() { x = 1; return x; }"),
            Err(CodegenError::UndefinedSymbol("x".into()))
        );
        assert_eq!(gen("int main() { return y + 1; }"), Err(CodegenError::UndefinedSymbol("y".into())));
    }

    #[test]
    fn unknown_callee_is_fatal() {
        assert_eq!(
            gen("int main() { printf(1); return 0; }"),
            Err(CodegenError::UndefinedFunction("printf".into()))
        );
    }

    #[test]
    fn call_arity_is_checked() {
        let program = Program {
            functions: vec![Function {
                name: "main".into(),
                body: vec![Stmt::Call { name: PRINT_INT.into(), args: vec![] }],
            }],
        };
        let ctx = LlvmContext::create();
        let err = CodeGen::new(&ctx, &CodegenOptions::default()).generate(&program).unwrap_err();
        assert_eq!(err, CodegenError::Arity { name: PRINT_INT.into(), expected: 1, found: 0 });
    }

    #[test]
    fn function_cannot_shadow_the_runtime() {
        assert_eq!(
            gen("int print_int() { return 0; }"),
            Err(CodegenError::Redefinition("print_int".into()))
        );
    }

    #[test]
    fn redeclaration_silently_rebinds() {
        // known looseness: a second `int x;` is accepted and gets a new slot
        let ir = gen("int main() { int x; x = 1; int x; return x; }").unwrap();
        let entry = block(&blocks(&ir), "entry").to_string();
        assert_eq!(entry.matches("alloca i32").count(), 2);
        assert!(entry.starts_with("  %x = alloca i32, align 4\n"));
        assert!(entry.contains("store i32 1, i32* %x, align 4"));
        // the load reads the second slot, not the one that was stored to
        assert!(!entry.contains("load i32, i32* %x, align 4"));
    }

    #[test]
    fn declarations_in_branches_are_hoisted_to_entry() {
        let ir = gen("int main() { int a; a = 1; if (a < 2) { int y; y = 7; } y = 8; return y; }").unwrap();
        let blocks = blocks(&ir);
        let entry = block(&blocks, "entry");
        assert!(entry.starts_with("  %a = alloca i32, align 4\n  %y = alloca i32, align 4\n"));
        assert!(!block(&blocks, "then").contains("alloca"));
    }

    #[test]
    fn statements_after_return_never_follow_a_terminator() {
        let ir = gen("int main() { return 1; print_int(2); }").unwrap();
        let blocks = blocks(&ir);
        assert_eq!(block(&blocks, "entry").trim(), "ret i32 1");
        assert_eq!(
            block(&blocks, "dead"),
            "  call void @print_int(i32 2)\n  unreachable"
        );
    }

    #[test]
    fn falling_off_the_end_returns_zero() {
        let ir = gen("int main() { print_int(9); }").unwrap();
        assert!(ir.contains("call void @print_int(i32 9)\n  ret i32 0\n}"));
        let ir = gen("int main() { int c; c = 1; if (c > 0) { print_int(c); } }").unwrap();
        assert_eq!(block(&blocks(&ir), "merge").trim(), "ret i32 0");
    }

    #[test]
    fn symbol_table_is_fresh_for_each_generator() {
        let program = parse(Lexer::new("int main() { int x; x = 1; return x; }")).unwrap();
        let first_ctx = LlvmContext::create();
        let first = CodeGen::new(&first_ctx, &CodegenOptions::default()).generate(&program).unwrap();
        let second_ctx = LlvmContext::create();
        let second = CodeGen::new(&second_ctx, &CodegenOptions::default()).generate(&program).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn target_triple_is_emitted_when_configured() {
        let program = parse(Lexer::new("int main() { return 0; }")).unwrap();
        let options = CodegenOptions {
            module_name: "demo".into(),
            target_triple: Some("x86_64-pc-linux-gnu".into()),
        };
        let ctx = LlvmContext::create();
        let ir = CodeGen::new(&ctx, &options).generate(&program).unwrap();
        assert!(ir.starts_with("; ModuleID = 'demo'\nsource_filename = \"demo\"\n"));
        assert!(ir.contains("target triple = \"x86_64-pc-linux-gnu\"\n"));
    }
}

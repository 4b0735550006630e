// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Statement lowering.

use opflow_bound::{
    BoundCatch, BoundExpr, BoundExprKind, BoundStmt, BoundStmtKind, BoundUsingResource, ForEachEnumerator,
    LocalSymbol, MethodSymbol, Syntax, Type, WellKnownMethod, WellKnownType,
};
use opflow_ops::{Operation, OperationKind};
use tracing::warn;

use super::{ControlFlowGraphBuilder, LoopTargets};
use crate::builder::BlockIx;
use crate::graph::{BranchSemantics, RegionKind};

impl<'a> ControlFlowGraphBuilder<'a> {
    pub(super) fn visit_stmt(&mut self, stmt: &BoundStmt) {
        let pattern_locals = self.statement_pattern_locals(stmt);
        if pattern_locals.is_empty() {
            self.visit_stmt_kind(stmt);
        } else {
            let region = self.blocks.enter_region(RegionKind::Locals, pattern_locals, None);
            self.visit_stmt_kind(stmt);
            self.blocks.leave_region(region);
        }
    }

    fn visit_stmt_kind(&mut self, stmt: &BoundStmt) {
        match &stmt.kind {
            BoundStmtKind::Block { locals, statements } => {
                let region = (!locals.is_empty())
                    .then(|| self.blocks.enter_region(RegionKind::Locals, locals.clone(), None));
                for s in statements {
                    self.visit_stmt(s);
                }
                if let Some(region) = region {
                    self.blocks.leave_region(region);
                }
            }
            BoundStmtKind::LocalDeclaration { local, initializer: Some(value) } => {
                if local.is_static {
                    self.visit_static_local(stmt, local, value);
                } else {
                    self.assign_declared_local(&stmt.syntax, local, value);
                }
            }
            BoundStmtKind::LocalDeclaration { initializer: None, .. } | BoundStmtKind::Empty => {}
            BoundStmtKind::Expression(expr) => match &expr.kind {
                BoundExprKind::ConditionalAccess { receiver, access } => {
                    self.visit_conditional_access_statement(receiver, access, &stmt.syntax)
                }
                _ => self.in_frame(|this| {
                    let value = this.visit_expr(expr);
                    this.blocks.add_statement(Operation::expression_statement(value, stmt.syntax.clone()));
                }),
            },
            BoundStmtKind::If { condition, then_branch, else_branch } => {
                self.visit_if(condition, then_branch, else_branch.as_deref())
            }
            BoundStmtKind::While { condition, body } => self.visit_while(condition, body),
            BoundStmtKind::DoWhile { body, condition } => self.visit_do_while(body, condition),
            BoundStmtKind::For { locals, initializers, condition, increments, body } => {
                self.visit_for(locals, initializers, condition.as_ref(), increments, body)
            }
            BoundStmtKind::Labeled { label, body } => {
                let block = match self.labels.get(&label.id).copied() {
                    Some(block) => block,
                    None => {
                        let block = self.blocks.create_block();
                        self.labels.insert(label.id, block);
                        block
                    }
                };
                if !self.blocks.is_appended(block) {
                    self.blocks.append_block(block);
                }
                self.visit_stmt(body);
            }
            BoundStmtKind::Goto(label) => match self.labels.get(&label.id).copied() {
                Some(target) => self.blocks.unconditional_branch(target),
                None => {
                    warn!(label = %label, "goto to an undeclared label");
                    self.add_invalid_statement(stmt, Vec::new());
                }
            },
            BoundStmtKind::GotoCase(value) => self.visit_goto_case(stmt, value),
            BoundStmtKind::GotoDefault => self.visit_goto_default(stmt),
            BoundStmtKind::Break => match self.loops.last().copied() {
                Some(targets) => self.blocks.unconditional_branch(targets.break_block),
                None => self.add_invalid_statement(stmt, Vec::new()),
            },
            BoundStmtKind::Continue => match self.loops.iter().rev().find_map(|t| t.continue_block) {
                Some(target) => self.blocks.unconditional_branch(target),
                None => self.add_invalid_statement(stmt, Vec::new()),
            },
            BoundStmtKind::Return(None) => {
                let exit = self.blocks.exit;
                self.blocks.unconditional_branch(exit);
            }
            BoundStmtKind::Return(Some(value)) => self.in_frame(|this| {
                let value = this.visit_expr(value);
                let exit = this.blocks.exit;
                this.blocks.terminate(BranchSemantics::Return, Some(exit), Some(value));
            }),
            BoundStmtKind::Throw(Some(exception)) => self.in_frame(|this| {
                let value = this.visit_expr(exception);
                this.blocks.terminate(BranchSemantics::Throw, None, Some(value));
            }),
            BoundStmtKind::Throw(None) => self.blocks.terminate(BranchSemantics::Rethrow, None, None),
            BoundStmtKind::Try { body, catches, finally } => self.visit_try(body, catches, finally.as_deref()),
            BoundStmtKind::Switch { governing, locals, sections } => {
                self.visit_switch_statement(governing, locals, sections)
            }
            BoundStmtKind::Using { resource, body } => self.visit_using(resource, body),
            BoundStmtKind::ForEach { local, collection, enumerator, body } => {
                self.visit_for_each(local, collection, enumerator, body)
            }
            BoundStmtKind::Lock { value, lock_taken, body } => self.visit_lock(value, lock_taken, body),
            BoundStmtKind::Invalid(children) => self.in_frame(|this| {
                for child in children {
                    let value = this.visit_expr(child);
                    this.push_operand(value);
                }
                let mut values: Vec<Operation> = children.iter().map(|_| this.pop_operand()).collect();
                values.reverse();
                this.add_invalid_statement(stmt, values);
            }),
        }
    }

    pub(super) fn add_invalid_statement(&mut self, stmt: &BoundStmt, children: Vec<Operation>) {
        let invalid = Operation::new(OperationKind::Invalid, None, stmt.syntax.clone()).with_children(children);
        self.blocks.add_statement(invalid);
    }

    // ── Locals ──────────────────────────────────────────────────────

    /// `T x = value;` as an implicit assignment to the declared local.
    fn assign_declared_local(&mut self, syntax: &Syntax, local: &LocalSymbol, value: &BoundExpr) {
        self.in_frame(|this| {
            this.push_operand(local_reference(local, true, syntax));
            let value = this.visit_expr(value);
            let target = this.pop_operand();
            let assignment = Operation::new(OperationKind::SimpleAssignment, Some(local.ty.clone()), syntax.clone())
                .implicit()
                .with_children(vec![target, value]);
            this.blocks.add_statement(assignment);
        });
    }

    /// The initializer of a `static` local runs once, guarded by a
    /// semaphore test.
    fn visit_static_local(&mut self, stmt: &BoundStmt, local: &LocalSymbol, value: &BoundExpr) {
        let after = self.blocks.create_block();
        let region = self.blocks.enter_region(RegionKind::StaticLocalInitializer, Vec::new(), None);
        let semaphore = Operation::new(
            OperationKind::StaticLocalInitializationSemaphore { local: local.clone() },
            Some(Type::Bool),
            stmt.syntax.clone(),
        )
        .implicit();
        self.blocks.conditional_branch(semaphore, false, after);
        self.assign_declared_local(&stmt.syntax, local, value);
        self.blocks.leave_region(region);
        self.blocks.append_block(after);
    }

    // ── Branching statements ────────────────────────────────────────

    fn visit_if(&mut self, condition: &BoundExpr, then_branch: &BoundStmt, else_branch: Option<&BoundStmt>) {
        let after = self.blocks.create_block();
        match else_branch {
            None => {
                self.visit_conditional_branch(condition, after, false);
                self.visit_stmt(then_branch);
            }
            Some(else_branch) => {
                let when_false = self.blocks.create_block();
                self.visit_conditional_branch(condition, when_false, false);
                self.visit_stmt(then_branch);
                self.blocks.unconditional_branch(after);
                self.blocks.append_block(when_false);
                self.visit_stmt(else_branch);
            }
        }
        self.blocks.append_block(after);
    }

    fn visit_loop_body(&mut self, body: &BoundStmt, break_block: BlockIx, continue_block: BlockIx) {
        self.loops.push(LoopTargets { break_block, continue_block: Some(continue_block) });
        self.visit_stmt(body);
        self.loops.pop();
    }

    fn visit_while(&mut self, condition: &BoundExpr, body: &BoundStmt) {
        let continue_block = self.blocks.create_block();
        let break_block = self.blocks.create_block();
        self.blocks.append_block(continue_block);
        self.visit_conditional_branch(condition, break_block, false);
        self.visit_loop_body(body, break_block, continue_block);
        self.blocks.unconditional_branch(continue_block);
        self.blocks.append_block(break_block);
    }

    fn visit_do_while(&mut self, body: &BoundStmt, condition: &BoundExpr) {
        let start = self.blocks.create_block();
        let continue_block = self.blocks.create_block();
        let break_block = self.blocks.create_block();
        self.blocks.append_block(start);
        self.visit_loop_body(body, break_block, continue_block);
        self.blocks.append_block(continue_block);
        self.visit_conditional_branch(condition, start, true);
        self.blocks.append_block(break_block);
    }

    fn visit_for(
        &mut self,
        locals: &[LocalSymbol],
        initializers: &[BoundStmt],
        condition: Option<&BoundExpr>,
        increments: &[BoundExpr],
        body: &BoundStmt,
    ) {
        let region = (!locals.is_empty())
            .then(|| self.blocks.enter_region(RegionKind::Locals, locals.to_vec(), None));
        for initializer in initializers {
            self.visit_stmt(initializer);
        }

        let start = self.blocks.create_block();
        let continue_block = self.blocks.create_block();
        let break_block = self.blocks.create_block();
        self.blocks.append_block(start);
        if let Some(condition) = condition {
            self.visit_conditional_branch(condition, break_block, false);
        }
        self.visit_loop_body(body, break_block, continue_block);

        self.blocks.append_block(continue_block);
        for increment in increments {
            self.in_frame(|this| {
                let value = this.visit_expr(increment);
                let statement = Operation::expression_statement(value, increment.syntax.clone()).implicit();
                this.blocks.add_statement(statement);
            });
        }
        self.blocks.unconditional_branch(start);

        if let Some(region) = region {
            self.blocks.leave_region(region);
        }
        self.blocks.append_block(break_block);
    }

    // ── Exception handling ──────────────────────────────────────────

    /// `try { } catch { } finally { }` nests as
    /// `TryAndFinally { Try { TryAndCatch { Try, Catch... } }, Finally }`.
    fn visit_try(&mut self, body: &BoundStmt, catches: &[BoundCatch], finally: Option<&BoundStmt>) {
        let after = self.blocks.create_block();
        match finally {
            Some(finally) => self.with_finally(
                |this| this.visit_try_catch(body, catches, after),
                |this| this.visit_stmt(finally),
            ),
            None => self.visit_try_catch(body, catches, after),
        }
        self.blocks.append_block(after);
    }

    /// Lowers `protected` in a try region whose finally runs `finally`.
    /// `protected` ends by branching out; the finally ends in a
    /// structured-exception-handling exit.
    fn with_finally(&mut self, protected: impl FnOnce(&mut Self), finally: impl FnOnce(&mut Self)) {
        let wrapper = self.blocks.enter_region(RegionKind::TryAndFinally, Vec::new(), None);
        let try_region = self.blocks.enter_region(RegionKind::Try, Vec::new(), None);
        protected(self);
        self.blocks.leave_region(try_region);
        let region = self.blocks.enter_region(RegionKind::Finally, Vec::new(), None);
        finally(self);
        self.blocks.seal(BranchSemantics::StructuredExceptionHandling);
        self.blocks.leave_region(region);
        self.blocks.leave_region(wrapper);
    }

    fn visit_try_catch(&mut self, body: &BoundStmt, catches: &[BoundCatch], after: BlockIx) {
        if catches.is_empty() {
            self.visit_stmt(body);
            self.blocks.unconditional_branch(after);
            return;
        }
        let wrapper = self.blocks.enter_region(RegionKind::TryAndCatch, Vec::new(), None);
        let protected = self.blocks.enter_region(RegionKind::Try, Vec::new(), None);
        self.visit_stmt(body);
        self.blocks.unconditional_branch(after);
        self.blocks.leave_region(protected);
        for catch in catches {
            self.visit_catch(catch, after);
        }
        self.blocks.leave_region(wrapper);
    }

    fn visit_catch(&mut self, catch: &BoundCatch, after: BlockIx) {
        let locals: Vec<LocalSymbol> = catch.local.iter().cloned().collect();
        let exception_type = catch.exception_type.clone();
        match &catch.filter {
            Some(filter) => {
                let outer = self.blocks.enter_region(RegionKind::FilterAndHandler, locals, Some(exception_type.clone()));
                let filter_region = self.blocks.enter_region(RegionKind::Filter, Vec::new(), Some(exception_type.clone()));
                self.store_caught_exception(catch);
                let handler_start = self.blocks.create_block();
                self.visit_conditional_branch(filter, handler_start, true);
                self.blocks.seal(BranchSemantics::StructuredExceptionHandling);
                self.blocks.leave_region(filter_region);

                let handler = self.blocks.enter_region(RegionKind::Catch, Vec::new(), Some(exception_type));
                self.blocks.append_block(handler_start);
                self.visit_stmt(&catch.body);
                self.blocks.unconditional_branch(after);
                self.blocks.leave_region(handler);
                self.blocks.leave_region(outer);
            }
            None => {
                let region = self.blocks.enter_region(RegionKind::Catch, locals, Some(exception_type));
                self.store_caught_exception(catch);
                self.visit_stmt(&catch.body);
                self.blocks.unconditional_branch(after);
                self.blocks.leave_region(region);
            }
        }
    }

    /// `catch (E e)` starts by assigning the in-flight exception to `e`.
    fn store_caught_exception(&mut self, catch: &BoundCatch) {
        let Some(local) = &catch.local else { return };
        let target = Operation::new(
            OperationKind::LocalReference { local: local.clone(), is_declaration: true },
            Some(local.ty.clone()),
            catch.syntax.clone(),
        )
        .implicit();
        let caught = Operation::new(OperationKind::CaughtException, Some(catch.exception_type.clone()), catch.syntax.clone())
            .implicit();
        let store = Operation::new(OperationKind::SimpleAssignment, Some(local.ty.clone()), catch.syntax.clone())
            .implicit()
            .with_children(vec![target, caught]);
        self.blocks.add_statement(store);
    }

    // ── Resource statements ─────────────────────────────────────────

    /// `using (r) body` keeps the resource in a region around
    /// `try { body } finally { if (r != null) ((IDisposable)r).Dispose(); }`.
    fn visit_using(&mut self, resource: &BoundUsingResource, body: &BoundStmt) {
        let after = self.blocks.create_block();
        let (region, value) = match resource {
            BoundUsingResource::Declaration { local, initializer } => {
                let region = self.blocks.enter_region(RegionKind::Locals, vec![local.clone()], None);
                let syntax = Syntax::new(initializer.syntax.span, resource.text());
                self.assign_declared_local(&syntax, local, initializer);
                (region, local_reference(local, false, &syntax))
            }
            BoundUsingResource::Expression(expr) => {
                let region = self.blocks.enter_region(RegionKind::Locals, Vec::new(), None);
                let value = self.in_frame(|this| {
                    let value = this.visit_expr(expr);
                    this.capture(region, value)
                });
                (region, value)
            }
        };
        self.with_finally(
            |this| {
                this.visit_stmt(body);
                this.blocks.unconditional_branch(after);
            },
            |this| this.dispose(value),
        );
        self.blocks.leave_region(region);
        self.blocks.append_block(after);
    }

    /// Calls `Dispose` on `resource`, skipping the call when it is null.
    fn dispose(&mut self, resource: Operation) {
        let done = self.blocks.create_block();
        let ty = resource.ty.clone().unwrap_or(Type::Error);
        if self.types.can_be_null(&ty) {
            self.blocks.conditional_branch(Operation::is_null(resource.clone()), true, done);
        }
        let disposable = self.types.well_known(WellKnownType::IDisposable);
        let instance = convert_to(resource, &disposable);
        let dispose = self.types.well_known_method(WellKnownMethod::Dispose);
        let call = invocation(dispose, Some(instance), Vec::new());
        let syntax = call.syntax.clone();
        self.blocks.add_statement(Operation::expression_statement(call, syntax).implicit());
        self.blocks.append_block(done);
    }

    /// `lock (o) body` becomes
    /// `try { Monitor.Enter(o, ref taken); body } finally { if (taken) Monitor.Exit(o); }`
    /// with `o` captured once and `taken` declared around both.
    fn visit_lock(&mut self, value: &BoundExpr, lock_taken: &LocalSymbol, body: &BoundStmt) {
        let after = self.blocks.create_block();
        let region = self.blocks.enter_region(RegionKind::Locals, vec![lock_taken.clone()], None);
        let locked = self.in_frame(|this| {
            let value = this.visit_expr(value);
            this.capture(region, value)
        });
        let enter = self.types.well_known_method(WellKnownMethod::MonitorEnter);
        let exit = self.types.well_known_method(WellKnownMethod::MonitorExit);
        let exit_locked = locked.clone();

        self.with_finally(
            |this| {
                let taken = local_reference(lock_taken, true, &value.syntax);
                let call = invocation(enter, None, vec![convert_to(locked, &Type::Object), taken]);
                this.blocks.add_statement(Operation::expression_statement(call, value.syntax.clone()).implicit());
                this.visit_stmt(body);
                this.blocks.unconditional_branch(after);
            },
            |this| {
                let done = this.blocks.create_block();
                this.blocks.conditional_branch(local_reference(lock_taken, false, &value.syntax), false, done);
                let call = invocation(exit, None, vec![convert_to(exit_locked, &Type::Object)]);
                this.blocks.add_statement(Operation::expression_statement(call, value.syntax.clone()).implicit());
                this.blocks.append_block(done);
            },
        );
        self.blocks.leave_region(region);
        self.blocks.append_block(after);
    }

    /// `foreach (T x in c) body` captures `c.GetEnumerator()` and loops on
    /// `MoveNext()`, assigning `Current` to `x` in a region of its own. A
    /// disposable enumerator is disposed in a finally around the loop.
    fn visit_for_each(&mut self, local: &LocalSymbol, collection: &BoundExpr, enumerator: &ForEachEnumerator, body: &BoundStmt) {
        let after = self.blocks.create_block();
        let region = self.blocks.enter_region(RegionKind::Locals, Vec::new(), None);
        let get_enumerator = enumerator.get_enumerator.clone();
        let captured = self.in_frame(|this| {
            let value = this.visit_expr(collection);
            let receiver = convert_to(value, &get_enumerator.containing);
            let call = invocation(get_enumerator, Some(receiver), Vec::new());
            this.capture(region, call)
        });

        let declaration = Syntax::new(collection.syntax.span, format!("{} {}", local.ty, local.name));
        let lower_loop = |this: &mut Self| {
            let start = this.blocks.create_block();
            this.blocks.append_block(start);
            let move_next = invocation(enumerator.move_next.clone(), Some(captured.clone()), Vec::new());
            this.blocks.conditional_branch(move_next, false, after);

            let iteration = this.blocks.enter_region(RegionKind::Locals, vec![local.clone()], None);
            let current = Operation::new(
                OperationKind::PropertyReference { property: enumerator.current.clone(), has_instance: true },
                Some(enumerator.current.ty.clone()),
                captured.syntax.clone(),
            )
            .implicit()
            .with_child(captured.clone());
            let assignment = Operation::new(OperationKind::SimpleAssignment, Some(local.ty.clone()), declaration.clone())
                .implicit()
                .with_children(vec![local_reference(local, true, &declaration), convert_to(current, &local.ty)]);
            this.blocks.add_statement(assignment);
            this.visit_loop_body(body, after, start);
            this.blocks.unconditional_branch(start);
            this.blocks.leave_region(iteration);
        };

        if self.types.is_disposable(enumerator.enumerator_type()) {
            let enumerator_value = captured.clone();
            self.with_finally(lower_loop, |this| this.dispose(enumerator_value));
        } else {
            lower_loop(self);
        }
        self.blocks.leave_region(region);
        self.blocks.append_block(after);
    }
}

fn local_reference(local: &LocalSymbol, is_declaration: bool, syntax: &Syntax) -> Operation {
    Operation::new(
        OperationKind::LocalReference { local: local.clone(), is_declaration },
        Some(local.ty.clone()),
        syntax.clone(),
    )
    .implicit()
}

/// `value` as a `ty`, through an implicit conversion when the types differ.
fn convert_to(value: Operation, ty: &Type) -> Operation {
    if value.ty.as_ref() == Some(ty) {
        value
    } else {
        Operation::implicit_conversion(value, ty.clone())
    }
}

/// An implicit call of `method`, each argument bound to its parameter in
/// order.
fn invocation(method: MethodSymbol, instance: Option<Operation>, arguments: Vec<Operation>) -> Operation {
    let syntax = instance
        .as_ref()
        .or(arguments.first())
        .map(|op| op.syntax.clone())
        .unwrap_or_else(|| Syntax::text(""));
    let has_instance = instance.is_some();
    let mut children: Vec<Operation> = instance.into_iter().collect();
    for (value, parameter) in arguments.into_iter().zip(method.parameters.iter()) {
        let arg_syntax = value.syntax.clone();
        children.push(
            Operation::new(OperationKind::Argument { parameter: Some(parameter.clone()) }, None, arg_syntax)
                .implicit()
                .with_child(value),
        );
    }
    let ty = Some(method.return_type.clone());
    Operation::new(OperationKind::Invocation { method, has_instance }, ty, syntax)
        .implicit()
        .with_children(children)
}

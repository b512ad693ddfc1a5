pub mod builtins;

use std::rc::Rc;

use crate::ast::{Expr, Stmt};
use crate::environment::Environment;
use crate::error;
use crate::lexer::{Token, TokenKind};
use crate::value::{Arity, CallableHandle, CallableKind, EntityHandle, Key, Number, Value};

/// The `return` unwinding signal, distinct from an ordinary error: it
/// propagates through `?` up to the call site that owns the enclosing user
/// function, per §9's "distinguished unwinding signal".
enum Flow {
    Return(Value, usize),
}

type ExecResult = Result<(), Flow>;

/// Depth-first tree-walking evaluator over a parsed program (§4.F).
pub struct Interpreter {
    globals: Environment,
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = Environment::global();
        builtins::install(&globals);
        log::debug!("interpreter initialized with built-in bindings");
        Self { globals }
    }

    /// Execute a full program. A `return` that escapes every enclosing
    /// function is reported (§7's "top-level return") and otherwise ignored.
    pub fn run(&self, program: &[Stmt]) {
        for stmt in program {
            if let Err(Flow::Return(_, line)) = self.execute(stmt, &self.globals) {
                error::runtime_error(line, "'return' outside of a function.");
            }
        }
    }

    fn execute(&self, stmt: &Stmt, env: &Environment) -> ExecResult {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr, env);
                Ok(())
            }
            Stmt::Block(stmts) => {
                let inner = Environment::nested(env.clone());
                self.execute_block(stmts, &inner)
            }
            Stmt::If { condition, then_branch, else_branch } => {
                if self.evaluate(condition, env).is_truthy() {
                    self.execute(then_branch, env)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch, env)
                } else {
                    Ok(())
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition, env).is_truthy() {
                    self.execute(body, env)?;
                }
                Ok(())
            }
            Stmt::For { variable, iterable, body } => self.execute_for(variable, iterable, body, env),
            Stmt::Function { name, params, body } => {
                let callable = self.make_user_function(Some(name.lexeme.clone()), params, body, env.clone());
                env.define(&name.lexeme, Value::Callable(callable));
                Ok(())
            }
            Stmt::Return { keyword, value } => {
                let result = value.as_ref().map(|e| self.evaluate(e, env)).unwrap_or(Value::None);
                Err(Flow::Return(result, keyword.line))
            }
            Stmt::Class { name, parent, body } => {
                self.execute_class(name, parent.as_ref(), body, env);
                Ok(())
            }
        }
    }

    fn execute_block(&self, stmts: &[Stmt], env: &Environment) -> ExecResult {
        for stmt in stmts {
            self.execute(stmt, env)?;
        }
        Ok(())
    }

    fn execute_for(&self, variable: &Token, iterable: &Expr, body: &Stmt, env: &Environment) -> ExecResult {
        let value = self.evaluate(iterable, env);
        let Value::Entity(entity) = value else {
            error::runtime_error(
                variable.line,
                &format!("for-loop iterable must be an entity, got {}.", value.type_name()),
            );
            return Ok(());
        };
        for item in entity.indexed_values() {
            let inner = Environment::nested(env.clone());
            inner.define(&variable.lexeme, item);
            self.execute(body, &inner)?;
        }
        Ok(())
    }

    fn execute_class(&self, name: &Token, parent: Option<&Token>, body: &[Stmt], env: &Environment) {
        let entity = match parent {
            Some(parent_token) => match env.get(&parent_token.lexeme, parent_token.line) {
                Value::Entity(parent_entity) => EntityHandle::with_metaentity(parent_entity),
                other => {
                    error::runtime_error(
                        parent_token.line,
                        &format!("'{}' is not a class (got {}).", parent_token.lexeme, other.type_name()),
                    );
                    EntityHandle::new()
                }
            },
            None => EntityHandle::new(),
        };

        let class_env = Environment::class_body(entity.clone(), env.clone());
        for stmt in body {
            if let Err(Flow::Return(_, line)) = self.execute(stmt, &class_env) {
                error::runtime_error(line, "'return' outside of a function.");
            }
        }

        env.define(&name.lexeme, Value::Entity(entity));
    }

    fn make_user_function(&self, name: Option<String>, params: &[Token], body: &[Stmt], closure: Environment) -> CallableHandle {
        let param_names = params.iter().map(|t| t.lexeme.clone()).collect();
        CallableHandle::user(name, param_names, Rc::new(body.to_vec()), closure)
    }

    fn evaluate(&self, expr: &Expr, env: &Environment) -> Value {
        match expr {
            Expr::Literal(value) => value.clone(),
            Expr::Grouping(inner) => self.evaluate(inner, env),
            Expr::Unary { op, right } => self.evaluate_unary(op, right, env),
            Expr::Binary { left, op, right } => self.evaluate_binary(left, op, right, env),
            Expr::Variable(name) => env.get(&name.lexeme, name.line),
            Expr::Assign { name, value } => {
                let result = self.evaluate(value, env);
                env.assign(&name.lexeme, result.clone());
                result
            }
            Expr::Call { callee, paren, args } => {
                let callee_value = self.evaluate(callee, env);
                let arg_values: Vec<Value> = args.iter().map(|a| self.evaluate(a, env)).collect();
                self.call_value(callee_value, &arg_values, paren.line)
            }
            Expr::FunctionExpr { name, params, body, .. } => {
                let callable = self.make_user_function(name.as_ref().map(|t| t.lexeme.clone()), params, body, env.clone());
                if let Some(name_token) = name {
                    env.define(&name_token.lexeme, Value::Callable(callable.clone()));
                }
                Value::Callable(callable)
            }
            Expr::Array { elements, .. } => {
                let values = elements.iter().map(|e| self.evaluate(e, env)).collect();
                Value::Entity(EntityHandle::from_array(values))
            }
            Expr::Dict { entries, .. } => self.evaluate_dict(entries, env),
            Expr::Get { object, index, bracket } => self.evaluate_get(object, index, bracket, env),
            Expr::Set { object, index, value, bracket } => self.evaluate_set(object, index, value, bracket, env),
            Expr::Ternary { condition, then_branch, else_branch, .. } => {
                if self.evaluate(condition, env).is_truthy() {
                    self.evaluate(then_branch, env)
                } else {
                    self.evaluate(else_branch, env)
                }
            }
            Expr::Range { start, end, step, token } => self.evaluate_range(start, end, step.as_deref(), token, env),
            Expr::Dot { object, name } => self.evaluate_dot(object, name, env),
        }
    }

    fn evaluate_unary(&self, op: &Token, right: &Expr, env: &Environment) -> Value {
        let value = self.evaluate(right, env);
        match op.kind {
            TokenKind::Minus => match value {
                Value::Number(n) => Value::Number(-&n),
                other => {
                    error::runtime_error(op.line, &format!("Unary '-' requires a number, got {}.", other.type_name()));
                    Value::Number(Number::zero())
                }
            },
            TokenKind::Bang => Value::Bool(!value.is_truthy()),
            _ => unreachable!("not a unary operator token"),
        }
    }

    fn evaluate_binary(&self, left: &Expr, op: &Token, right: &Expr, env: &Environment) -> Value {
        match op.kind {
            TokenKind::AmpAmp => {
                let left_value = self.evaluate(left, env);
                if !left_value.is_truthy() {
                    return left_value;
                }
                self.evaluate(right, env)
            }
            TokenKind::PipePipe => {
                let left_value = self.evaluate(left, env);
                if left_value.is_truthy() {
                    return left_value;
                }
                self.evaluate(right, env)
            }
            TokenKind::EqualEqual => {
                let (l, r) = (self.evaluate(left, env), self.evaluate(right, env));
                Value::Bool(l.value_eq(&r))
            }
            TokenKind::BangEqual => {
                let (l, r) = (self.evaluate(left, env), self.evaluate(right, env));
                Value::Bool(!l.value_eq(&r))
            }
            TokenKind::Plus => {
                let (l, r) = (self.evaluate(left, env), self.evaluate(right, env));
                self.add_values(l, r, op.line)
            }
            TokenKind::Minus | TokenKind::Star | TokenKind::Slash => {
                let (l, r) = (self.evaluate(left, env), self.evaluate(right, env));
                self.arithmetic(op.kind, l, r, op.line)
            }
            TokenKind::Less | TokenKind::LessEqual | TokenKind::Greater | TokenKind::GreaterEqual => {
                let (l, r) = (self.evaluate(left, env), self.evaluate(right, env));
                self.compare(op.kind, l, r, op.line)
            }
            _ => unreachable!("not a binary operator token"),
        }
    }

    fn add_values(&self, left: Value, right: Value, line: usize) -> Value {
        match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (Value::String(_), _) | (_, Value::String(_)) => {
                Value::String(format!("{}{}", left.to_display_string(), right.to_display_string()))
            }
            (Value::Entity(a), _) => {
                let mut elements = a.indexed_values();
                match &right {
                    Value::Entity(b) => elements.extend(b.indexed_values()),
                    other => elements.push(other.clone()),
                }
                Value::Entity(EntityHandle::from_array(elements))
            }
            _ => {
                error::runtime_error(line, &format!("Cannot add {} and {}.", left.type_name(), right.type_name()));
                Value::None
            }
        }
    }

    fn arithmetic(&self, kind: TokenKind, left: Value, right: Value, line: usize) -> Value {
        let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
            error::runtime_error(
                line,
                &format!("Arithmetic requires numbers, got {} and {}.", left.type_name(), right.type_name()),
            );
            return Value::Number(Number::zero());
        };
        match kind {
            TokenKind::Minus => Value::Number(a - b),
            TokenKind::Star => Value::Number(a * b),
            TokenKind::Slash => match a.checked_div(b) {
                Some(result) => Value::Number(result),
                None => {
                    error::runtime_error(line, "Division by zero.");
                    Value::Number(Number::zero())
                }
            },
            _ => unreachable!("not an arithmetic operator token"),
        }
    }

    fn compare(&self, kind: TokenKind, left: Value, right: Value, line: usize) -> Value {
        let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
            error::runtime_error(
                line,
                &format!("Comparison requires numbers, got {} and {}.", left.type_name(), right.type_name()),
            );
            return Value::Bool(false);
        };
        let result = match kind {
            TokenKind::Less => a < b,
            TokenKind::LessEqual => a <= b,
            TokenKind::Greater => a > b,
            TokenKind::GreaterEqual => a >= b,
            _ => unreachable!("not a comparison operator token"),
        };
        Value::Bool(result)
    }

    fn evaluate_dict(&self, entries: &[crate::ast::DictEntry], env: &Environment) -> Value {
        let entity = EntityHandle::new();
        for entry in entries {
            let key = self.evaluate(&entry.key, env);
            let value = self.evaluate(&entry.value, env);
            entity.set(Key(key), value);
        }
        Value::Entity(entity)
    }

    fn evaluate_get(&self, object: &Expr, index: &Expr, bracket: &Token, env: &Environment) -> Value {
        let obj = self.evaluate(object, env);
        let idx = self.evaluate(index, env);
        match obj {
            Value::Entity(entity) => entity.get(&Key(idx)).unwrap_or(Value::None),
            other => {
                error::runtime_error(bracket.line, &format!("Cannot index into {}.", other.type_name()));
                Value::None
            }
        }
    }

    fn evaluate_set(&self, object: &Expr, index: &Expr, value: &Expr, bracket: &Token, env: &Environment) -> Value {
        let obj = self.evaluate(object, env);
        let idx = self.evaluate(index, env);
        let val = self.evaluate(value, env);
        match obj {
            Value::Entity(entity) => {
                entity.set(Key(idx), val.clone());
                val
            }
            other => {
                error::runtime_error(bracket.line, &format!("Cannot index into {}.", other.type_name()));
                val
            }
        }
    }

    fn evaluate_range(&self, start: &Expr, end: &Expr, step: Option<&Expr>, token: &Token, env: &Environment) -> Value {
        let start_value = self.expect_number(self.evaluate(start, env), token.line);
        let end_value = self.expect_number(self.evaluate(end, env), token.line);

        let step_value = match step {
            Some(step_expr) => match self.evaluate(step_expr, env) {
                Value::Number(n) if n.is_zero() => {
                    error::runtime_error(token.line, "Range step cannot be zero.");
                    return Value::Entity(EntityHandle::new());
                }
                Value::Number(n) => n,
                other => {
                    error::runtime_error(token.line, &format!("Range step must be a number, got {}.", other.type_name()));
                    default_step(&start_value, &end_value)
                }
            },
            None => default_step(&start_value, &end_value),
        };

        Value::Entity(build_range(&start_value, &end_value, &step_value))
    }

    fn expect_number(&self, value: Value, line: usize) -> Number {
        match value {
            Value::Number(n) => n,
            other => {
                error::runtime_error(line, &format!("Range bound must be a number, got {}.", other.type_name()));
                Number::zero()
            }
        }
    }

    fn evaluate_dot(&self, object: &Expr, name: &Token, env: &Environment) -> Value {
        let obj = self.evaluate(object, env);
        let key = Key::string(name.lexeme.clone());
        match obj {
            Value::Entity(entity) => entity.get(&key).unwrap_or(Value::None),
            Value::Callable(callable) => callable.entity().get(&key).unwrap_or(Value::None),
            other => {
                error::runtime_error(name.line, &format!("Cannot access a property on {}.", other.type_name()));
                Value::None
            }
        }
    }

    fn call_value(&self, callee: Value, args: &[Value], line: usize) -> Value {
        let Value::Callable(callable) = callee else {
            error::runtime_error(line, &format!("'{}' is not callable.", callee.type_name()));
            return Value::None;
        };

        let data = callable.data();
        if !data.arity.accepts(args.len()) {
            error::runtime_error(
                line,
                &format!("Expected {} argument(s) but got {}.", arity_text(&data.arity), args.len()),
            );
            return Value::None;
        }

        match &data.kind {
            CallableKind::Native(func) => func(args, line),
            CallableKind::User { params, body, closure } => {
                let call_env = Environment::nested(closure.clone());
                for (param, arg) in params.iter().zip(args.iter()) {
                    call_env.define(param, arg.clone());
                }
                match self.execute_block(body, &call_env) {
                    Ok(()) => Value::None,
                    Err(Flow::Return(value, _)) => value,
                }
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn arity_text(arity: &Arity) -> String {
    match arity {
        Arity::Fixed(n) => n.to_string(),
        Arity::Variadic => "any number of".to_string(),
    }
}

fn default_step(start: &Number, end: &Number) -> Number {
    if start <= end {
        Number::one()
    } else {
        -&Number::one()
    }
}

fn build_range(start: &Number, end: &Number, step: &Number) -> EntityHandle {
    let ascending = step > &Number::zero();
    let mut values = Vec::new();
    let mut current = start.clone();
    loop {
        let within_bounds = if ascending { &current <= end } else { &current >= end };
        if !within_bounds {
            break;
        }
        values.push(Value::Number(current.clone()));
        current = &current + step;
    }
    EntityHandle::from_array(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn run_program(source: &str) -> Interpreter {
        let tokens = Lexer::new(source).scan_tokens();
        let program = Parser::new(tokens).parse();
        let interpreter = Interpreter::new();
        interpreter.run(&program);
        interpreter
    }

    #[test]
    fn addition_of_literals() {
        let interpreter = run_program("x = 4; y = 2;");
        let Value::Number(x) = interpreter.globals.get("x", 1) else { panic!() };
        let Value::Number(y) = interpreter.globals.get("y", 1) else { panic!() };
        assert_eq!((&x + &y).to_display_string(), "6");
    }

    #[test]
    fn array_concatenation_does_not_mutate_operands() {
        let interpreter = run_program("nums = [10,20,30]; nums[2] = 99; combined = nums + [40];");
        let Value::Entity(nums) = interpreter.globals.get("nums", 1) else { panic!() };
        assert_eq!(nums.size(), 3);
        let Value::Entity(combined) = interpreter.globals.get("combined", 1) else { panic!() };
        assert_eq!(combined.size(), 4);
    }

    #[test]
    fn range_inclusive_of_start_and_end() {
        let interpreter = run_program("asc = [1::4];");
        let Value::Entity(asc) = interpreter.globals.get("asc", 1) else { panic!() };
        assert_eq!(asc.size(), 4);
    }

    #[test]
    fn dict_last_write_wins() {
        let interpreter = run_program(r#"person = {name:"Alice", age:30}; person["age"] = person["age"] + 1;"#);
        let Value::Entity(person) = interpreter.globals.get("person", 1) else { panic!() };
        let Value::Number(age) = person.get(&Key::string("age")).unwrap() else { panic!() };
        assert_eq!(age.to_display_string(), "31");
    }

    #[test]
    fn recursive_factorial() {
        let interpreter = run_program("def fact(n){ if (n <= 1) { return 1 } return n * fact(n-1) } result = fact(5);");
        let Value::Number(result) = interpreter.globals.get("result", 1) else { panic!() };
        assert_eq!(result.to_display_string(), "120");
    }

    #[test]
    fn prototype_chain_reads_parent_fields_without_copying_them_locally() {
        let interpreter = run_program("classP: = { v = 100 } classC:classP = { w = 200 }");
        let Value::Entity(class_c) = interpreter.globals.get("classC", 1) else { panic!() };
        let Value::Number(v) = class_c.get(&Key::string("v")).unwrap() else { panic!() };
        assert_eq!(v.to_display_string(), "100");
        assert!(!class_c.contains_local(&Key::string("v")));
    }

    #[test]
    fn short_circuit_or_does_not_evaluate_right_side() {
        let interpreter = run_program(
            "count = 0; def bump(){ count = count + 1; return true } result = true || bump();",
        );
        let Value::Number(count) = interpreter.globals.get("count", 1) else { panic!() };
        assert_eq!(count.to_display_string(), "0");
    }

    #[test]
    fn closure_mutates_shared_local_across_calls() {
        let interpreter = run_program(
            "def make(){ total = 0; def inc(){ total = total + 1; return total } return inc } counter = make(); a = counter(); b = counter();",
        );
        let Value::Number(a) = interpreter.globals.get("a", 1) else { panic!() };
        let Value::Number(b) = interpreter.globals.get("b", 1) else { panic!() };
        assert_eq!(a.to_display_string(), "1");
        assert_eq!(b.to_display_string(), "2");
    }
}

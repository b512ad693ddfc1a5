use crate::environment::Environment;
use crate::error;
use crate::value::{Arity, CallableHandle, CallableKind, Number, Value};

/// Pre-populates the global scope with the bindings §6 mandates.
pub fn install(env: &Environment) {
    env.define("true", Value::Bool(true));
    env.define("false", Value::Bool(false));
    env.define("print", Value::Callable(CallableHandle::native("print", Arity::Variadic, print)));
    env.define("inspect", Value::Callable(CallableHandle::native("inspect", Arity::Fixed(1), inspect)));
    env.define("len", Value::Callable(CallableHandle::native("len", Arity::Fixed(1), len)));
}

fn print(args: &[Value], _line: usize) -> Value {
    let joined = args.iter().map(Value::to_display_string).collect::<Vec<_>>().join(" ");
    println!("{joined}");
    Value::None
}

fn len(args: &[Value], line: usize) -> Value {
    match &args[0] {
        Value::Entity(entity) => Value::Number(Number::from_i64(entity.size() as i64)),
        Value::Callable(callable) => Value::Number(Number::from_i64(callable.entity().size() as i64)),
        other => {
            error::runtime_error(line, &format!("len() requires an entity, got {}.", other.type_name()));
            Value::Number(Number::zero())
        }
    }
}

fn inspect(args: &[Value], _line: usize) -> Value {
    let text = inspect_value(&args[0], 0);
    print!("{text}");
    Value::String(text)
}

fn inspect_value(value: &Value, indent: usize) -> String {
    match value {
        Value::Entity(entity) => inspect_entity(entity, indent, None),
        Value::Callable(callable) => inspect_entity(callable.entity(), indent, Some(callable)),
        other => format!("{}{}: {}\n", "  ".repeat(indent), other.type_name(), other.to_display_string()),
    }
}

fn inspect_entity(
    entity: &crate::value::EntityHandle,
    indent: usize,
    callable: Option<&CallableHandle>,
) -> String {
    let pad = "  ".repeat(indent);
    let mut out = String::new();

    match callable {
        Some(callable) => {
            out += &format!("{pad}<FunctionValue>\n");
            let data = callable.data();
            out += &format!("{pad}  name: {}\n", data.name.as_deref().unwrap_or("<anonymous>"));
            if let CallableKind::User { params, .. } = &data.kind {
                out += &format!("{pad}  params: {}\n", params.join(", "));
            }
        }
        None => out += &format!("{pad}<Entity>\n"),
    }

    for (key, value) in entity.borrow().local_entries() {
        out += &format!("{pad}  {} : {}\n", key.0.to_display_string(), value.to_display_string());
    }

    let parent = entity.borrow().metaentity.clone();
    if let Some(parent) = parent {
        out += &inspect_entity(&parent, indent + 1, None);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_is_variadic_and_yields_none() {
        assert!(matches!(print(&[], 1), Value::None));
        assert!(matches!(print(&[Value::Number(Number::zero())], 1), Value::None));
    }

    #[test]
    fn len_reports_non_entity_as_zero() {
        let result = len(&[Value::String("hi".into())], 1);
        let Value::Number(n) = result else { panic!("expected number") };
        assert_eq!(n.to_display_string(), "0");
    }

    #[test]
    fn len_counts_local_entries() {
        let entity = crate::value::EntityHandle::from_array(vec![Value::Number(Number::zero()); 3]);
        let result = len(&[Value::Entity(entity)], 1);
        let Value::Number(n) = result else { panic!("expected number") };
        assert_eq!(n.to_display_string(), "3");
    }
}

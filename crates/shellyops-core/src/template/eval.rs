// ── Template evaluation ──
//
// Walks the parsed nodes against a JSON context. Every lookup of an absent
// key is a hard error; nothing ever renders as an empty string by accident.

use std::borrow::Cow;

use serde_json::Value;

use super::parse::{Command, Node, Operand, Pipeline, Term};
use super::{ErrorKind, Fault};

fn eval_fault(message: impl Into<String>) -> Fault {
    Fault::new(ErrorKind::Evaluation, message)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render a value the way it appears in output: strings verbatim,
/// scalars as JSON text, containers as compact JSON. `null` is an error.
pub(crate) fn format_value(value: &Value) -> Result<String, Fault> {
    match value {
        Value::Null => Err(eval_fault("value is null")),
        Value::String(s) => Ok(s.clone()),
        other => Ok(other.to_string()),
    }
}

pub(crate) fn execute(nodes: &[Node], root: &Value) -> Result<String, Fault> {
    let eval = Evaluator { root };
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Action(pipeline) => {
                let value = eval.pipeline(pipeline, root)?;
                out.push_str(&format_value(&value)?);
            }
        }
    }
    Ok(out)
}

struct Evaluator<'a> {
    root: &'a Value,
}

impl<'a> Evaluator<'a> {
    fn pipeline(&self, pipeline: &Pipeline, dot: &'a Value) -> Result<Value, Fault> {
        let mut piped: Option<Value> = None;
        for command in &pipeline.commands {
            piped = Some(self.command(command, dot, piped.take())?);
        }
        piped.ok_or_else(|| eval_fault("empty pipeline"))
    }

    fn command(
        &self,
        command: &Command,
        dot: &'a Value,
        piped: Option<Value>,
    ) -> Result<Value, Fault> {
        let Some((first, rest)) = command.args.split_first() else {
            return Err(eval_fault("missing value for command"));
        };

        if let Term::Func(name) = &first.term {
            let mut args = rest
                .iter()
                .map(|arg| self.operand(arg, dot).map(Cow::into_owned))
                .collect::<Result<Vec<_>, _>>()?;
            args.extend(piped);
            return call(name, args);
        }

        if !rest.is_empty() || piped.is_some() {
            return Err(eval_fault("can't give argument to non-function"));
        }
        self.operand(first, dot).map(Cow::into_owned)
    }

    fn operand(&self, operand: &Operand, dot: &'a Value) -> Result<Cow<'a, Value>, Fault> {
        let base: Cow<'a, Value> = match &operand.term {
            Term::Dot => Cow::Borrowed(dot),
            Term::Root => Cow::Borrowed(self.root),
            Term::Str(s) => Cow::Owned(Value::String(s.clone())),
            Term::Number(n) => Cow::Owned(Value::Number(n.clone())),
            Term::Bool(b) => Cow::Owned(Value::Bool(*b)),
            Term::Func(name) => Cow::Owned(call(name, Vec::new())?),
            Term::Sub(pipeline) => Cow::Owned(self.pipeline(pipeline, dot)?),
        };

        operand
            .fields
            .iter()
            .try_fold(base, |value, field| match value {
                Cow::Borrowed(v) => field_of(v, field).map(Cow::Borrowed),
                Cow::Owned(v) => field_of(&v, field).map(|f| Cow::Owned(f.clone())),
            })
    }
}

fn field_of<'v>(value: &'v Value, field: &str) -> Result<&'v Value, Fault> {
    match value {
        Value::Object(map) => map.get(field).ok_or_else(|| {
            Fault::new(
                ErrorKind::MissingKey,
                format!("map has no entry for key \"{field}\""),
            )
        }),
        Value::Null => Err(eval_fault(format!("nil pointer evaluating .{field}"))),
        other => Err(eval_fault(format!(
            "can't evaluate field {field} in type {}",
            type_name(other)
        ))),
    }
}

// ── Builtins ────────────────────────────────────────────────────────

fn call(name: &str, args: Vec<Value>) -> Result<Value, Fault> {
    match name {
        "index" => index(args),
        "len" => len(&args),
        "print" => print(&args),
        other => Err(Fault::new(
            ErrorKind::Syntax,
            format!("function \"{other}\" not defined"),
        )),
    }
}

/// `index collection key...` — nested lookup by map key or array position.
fn index(args: Vec<Value>) -> Result<Value, Fault> {
    let mut args = args.into_iter();
    let Some(mut current) = args.next() else {
        return Err(eval_fault("wrong number of args for index: want at least 1 got 0"));
    };

    for key in args {
        current = match (current, &key) {
            (Value::Object(mut map), Value::String(k)) => map.remove(k).ok_or_else(|| {
                Fault::new(
                    ErrorKind::MissingKey,
                    format!("index: map has no entry for key \"{k}\""),
                )
            })?,
            (Value::Array(mut items), Value::Number(n)) => {
                let len = items.len();
                let position = n
                    .as_u64()
                    .and_then(|i| usize::try_from(i).ok())
                    .filter(|i| *i < len)
                    .ok_or_else(|| eval_fault(format!("index: index out of range: {n}")))?;
                items.swap_remove(position)
            }
            (Value::Null, _) => return Err(eval_fault("index of untyped nil")),
            (collection, key) => {
                return Err(eval_fault(format!(
                    "index: cannot index {} with {}",
                    type_name(&collection),
                    type_name(key)
                )));
            }
        };
    }
    Ok(current)
}

fn len(args: &[Value]) -> Result<Value, Fault> {
    let [item] = args else {
        return Err(eval_fault(format!(
            "wrong number of args for len: want 1 got {}",
            args.len()
        )));
    };
    let n = match item {
        Value::String(s) => s.len(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => {
            return Err(eval_fault(format!(
                "len of type {}",
                type_name(other)
            )));
        }
    };
    Ok(Value::from(n))
}

/// Concatenate operands, adding a space between two operands when neither
/// is a string.
fn print(args: &[Value]) -> Result<Value, Fault> {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 && !arg.is_string() && !args[i - 1].is_string() {
            out.push(' ');
        }
        out.push_str(&format_value(arg)?);
    }
    Ok(Value::String(out))
}

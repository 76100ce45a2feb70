//! Evaluator
//!
//! Runs lowered programs directly. Every body is a flat statement list executed with an
//! instruction pointer; labels are resolved to statement indices before a body runs.
//!
//! Globals live in one map for the whole run, locals in one map per call frame. Both map a
//! variable to a shared cell so that `&x` can hand out a pointer to it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::rc::Rc;

use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, info};

use crate::ast::BinaryOperator;
use crate::binding::{BoundExpression, BoundExpressionKind, BoundStatement, Callee};
use crate::builtin::BuiltinFunction;
use crate::folding;
use crate::symbols::{Constant, FunctionId, Label, PrimitiveKind, TypeId, VariableId, VariableKind};
use crate::Program;

#[derive(Debug, Error, Diagnostic)]
pub enum EvalError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Null pointer dereference")]
    NullPointer,

    #[error("Pointer access at offset {offset} is out of bounds for {len} element(s)")]
    OutOfBounds { offset: i64, len: usize },

    #[error("Extern function `{0}` has no builtin implementation")]
    #[diagnostic(help("Only the functions of the `std` namespace can be evaluated"))]
    UnknownExtern(String),

    #[error("The program has no entry point")]
    #[diagnostic(help("Mark a function as entry point with `entry fn main() {{ ... }}`"))]
    MissingEntry,

    #[error("Call depth exceeded the limit of {0}")]
    CallDepthExceeded(usize),

    #[error("Variable `{0}` is used before it is initialized")]
    Uninitialized(String),

    #[error("Failed to write program output")]
    Output(#[from] io::Error),
}

type Result<T> = std::result::Result<T, EvalError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatorOptions {
    /// Deepest nesting of calls before evaluation stops
    pub max_call_depth: usize,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            max_call_depth: 512,
        }
    }
}

/// Storage a pointer points into
#[derive(Debug, Clone)]
pub enum Memory {
    /// An array, string or zeroed buffer
    Buffer(Rc<RefCell<Vec<Value>>>),
    /// A variable whose address was taken
    Cell(Rc<RefCell<Value>>),
}

#[derive(Debug, Clone)]
pub enum Value {
    Void,
    /// Integers of every width, wrapped to their type
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Pointer { memory: Memory, offset: i64 },
    /// Structs are shared, assigning one copies the reference
    Struct(Rc<RefCell<Vec<Value>>>),
    Function(FunctionId),
}

impl Value {
    fn from_constant(constant: &Constant) -> Self {
        match constant {
            Constant::Int(x) => Value::Int(*x),
            Constant::Float(x) => Value::Float(*x),
            Constant::Bool(x) => Value::Bool(*x),
            Constant::Null => Value::Null,
            Constant::Str(text) => {
                let bytes = text
                    .bytes()
                    .chain([0])
                    .map(|byte| Value::Int(byte.into()))
                    .collect();
                Value::Pointer {
                    memory: Memory::Buffer(Rc::new(RefCell::new(bytes))),
                    offset: 0,
                }
            }
        }
    }

    fn to_constant(&self) -> Option<Constant> {
        match self {
            Value::Int(x) => Some(Constant::Int(*x)),
            Value::Float(x) => Some(Constant::Float(*x)),
            Value::Bool(x) => Some(Constant::Bool(*x)),
            Value::Null => Some(Constant::Null),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(x) => Some(*x),
            _ => None,
        }
    }

    fn is_true(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    /// Identity comparison of pointers and structs
    fn same_address(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (
                Value::Pointer {
                    memory: a,
                    offset: x,
                },
                Value::Pointer {
                    memory: b,
                    offset: y,
                },
            ) => {
                let same = match (a, b) {
                    (Memory::Buffer(a), Memory::Buffer(b)) => Rc::ptr_eq(a, b),
                    (Memory::Cell(a), Memory::Cell(b)) => Rc::ptr_eq(a, b),
                    _ => false,
                };
                same && x == y
            }
            (Value::Struct(a), Value::Struct(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Int(x) => write!(f, "{x}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(x) => write!(f, "{x}"),
            Value::Null => write!(f, "null"),
            Value::Pointer { offset, .. } => write!(f, "<pointer+{offset}>"),
            Value::Struct(_) => write!(f, "<struct>"),
            Value::Function(function) => write!(f, "<fn {function:?}>"),
        }
    }
}

type Frame = HashMap<VariableId, Rc<RefCell<Value>>>;

pub struct Evaluator<'p, W> {
    program: &'p Program,
    options: EvaluatorOptions,
    output: W,
    globals: Frame,
    frames: Vec<Frame>,
}

impl<'p, W: io::Write> Evaluator<'p, W> {
    pub fn new(program: &'p Program, options: EvaluatorOptions, output: W) -> Self {
        Self {
            program,
            options,
            output,
            globals: Frame::new(),
            frames: Vec::new(),
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Initialize the globals and call the entry point. Returns the exit code of the program:
    /// the value the entry point returned, or 0 if it returns nothing.
    pub fn run(&mut self) -> Result<i64> {
        let program = self.program;
        let entry = program.entry.ok_or(EvalError::MissingEntry)?;

        self.execute(&program.globals)?;
        debug!(globals = self.globals.len(), "initialized globals");

        let value = self.call(entry, Vec::new())?;
        self.output.flush()?;

        let code = value.as_int().unwrap_or(0);
        info!(code, "program finished");
        Ok(code)
    }

    /// Call a function with already evaluated arguments
    pub fn call(&mut self, function: FunctionId, args: Vec<Value>) -> Result<Value> {
        let program = self.program;
        let symbol = &program.context.functions[function];

        if symbol.is_extern {
            let cname = program.context.mangled_name(function);
            let builtin =
                BuiltinFunction::from_cname(&cname).ok_or(EvalError::UnknownExtern(cname))?;
            return self.call_builtin(builtin, args);
        }

        if self.frames.len() >= self.options.max_call_depth {
            return Err(EvalError::CallDepthExceeded(self.options.max_call_depth));
        }

        let frame = symbol
            .params
            .iter()
            .zip(args)
            .map(|(&param, value)| (param, Rc::new(RefCell::new(value))))
            .collect();
        let body = program
            .functions
            .get(&function)
            .map(Vec::as_slice)
            .unwrap_or_default();

        self.frames.push(frame);
        let result = self.execute(body);
        self.frames.pop();
        result
    }

    fn call_builtin(&mut self, builtin: BuiltinFunction, args: Vec<Value>) -> Result<Value> {
        let arg = args.into_iter().next().unwrap_or(Value::Void);
        match builtin {
            BuiltinFunction::Trace(PrimitiveKind::U64) => {
                // stored as the bit pattern
                writeln!(self.output, "{}", arg.as_int().unwrap_or(0) as u64)?;
            }
            BuiltinFunction::Trace(_) => writeln!(self.output, "{arg}")?,
            BuiltinFunction::Print => {
                let mut offset = 0;
                loop {
                    let byte = self.load(&arg, offset)?.as_int().unwrap_or(0);
                    if byte == 0 {
                        break;
                    }
                    self.output.write_all(&[byte as u8])?;
                    offset += 1;
                }
                return Ok(Value::Void);
            }
            BuiltinFunction::Putchar => {
                self.output.write_all(&[arg.as_int().unwrap_or(0) as u8])?;
            }
        }
        Ok(arg)
    }

    fn execute(&mut self, body: &[BoundStatement]) -> Result<Value> {
        let labels: HashMap<&Label, usize> = body
            .iter()
            .enumerate()
            .filter_map(|(index, statement)| match statement {
                BoundStatement::Label(label) => Some((label, index)),
                _ => None,
            })
            .collect();
        let jump = |label: &Label| match labels.get(label) {
            Some(&index) => index,
            None => panic!("jump to undefined label `{label}`"),
        };

        let mut ip = 0;
        while let Some(statement) = body.get(ip) {
            match statement {
                BoundStatement::Expression(expression) => {
                    self.evaluate(expression)?;
                }
                BoundStatement::Variable {
                    variable,
                    initializer,
                } => {
                    let value = self.evaluate(initializer)?;
                    self.declare(*variable, value);
                }
                BoundStatement::Goto(label) => {
                    ip = jump(label);
                    continue;
                }
                BoundStatement::ConditionalGoto {
                    label,
                    condition,
                    jump_if_true,
                } => {
                    if self.evaluate(condition)?.is_true() == *jump_if_true {
                        ip = jump(label);
                        continue;
                    }
                }
                BoundStatement::Return(value) => {
                    return match value {
                        Some(value) => self.evaluate(value),
                        None => Ok(Value::Void),
                    };
                }
                BoundStatement::Assignment { target, value } => {
                    let value = self.evaluate(value)?;
                    self.assign(target, value)?;
                }
                BoundStatement::PointerAssignment {
                    pointer,
                    index,
                    value,
                } => {
                    let pointer = self.evaluate(pointer)?;
                    let offset = match index {
                        Some(index) => self.evaluate(index)?.as_int().unwrap_or(0),
                        None => 0,
                    };
                    let value = self.evaluate(value)?;
                    self.store(&pointer, offset, value)?;
                }
                BoundStatement::Label(_) | BoundStatement::NoOp => {}
                BoundStatement::Loop { .. } | BoundStatement::For { .. } => {
                    panic!("structured loop in lowered code")
                }
            }
            ip += 1;
        }
        Ok(Value::Void)
    }

    fn is_global(&self, variable: VariableId) -> bool {
        self.program.context.variables[variable].kind == VariableKind::Global
    }

    fn declare(&mut self, variable: VariableId, value: Value) {
        let cell = Rc::new(RefCell::new(value));
        let is_global = self.is_global(variable);
        match self.frames.last_mut() {
            Some(frame) if !is_global => {
                frame.insert(variable, cell);
            }
            _ => {
                self.globals.insert(variable, cell);
            }
        }
    }

    fn cell(&self, variable: VariableId) -> Result<Rc<RefCell<Value>>> {
        let frame = if self.is_global(variable) {
            Some(&self.globals)
        } else {
            self.frames.last().or(Some(&self.globals))
        };
        frame
            .and_then(|frame| frame.get(&variable))
            .cloned()
            .ok_or_else(|| {
                EvalError::Uninitialized(self.program.context.variables[variable].name.clone())
            })
    }

    fn assign(&mut self, target: &BoundExpression, value: Value) -> Result<()> {
        match &target.kind {
            BoundExpressionKind::Variable(variable)
            | BoundExpressionKind::NamespaceVariable { variable, .. } => {
                *self.cell(*variable)?.borrow_mut() = value;
                Ok(())
            }
            BoundExpressionKind::Field { target, index } => match self.evaluate(target)? {
                Value::Struct(fields) => {
                    fields.borrow_mut()[*index] = value;
                    Ok(())
                }
                _ => Err(EvalError::NullPointer),
            },
            other => panic!("cannot assign to {other:?}"),
        }
    }

    fn load(&self, pointer: &Value, offset: i64) -> Result<Value> {
        match pointer {
            Value::Pointer { memory, offset: base } => {
                let offset = base + offset;
                match memory {
                    Memory::Buffer(buffer) => {
                        let buffer = buffer.borrow();
                        usize::try_from(offset)
                            .ok()
                            .and_then(|i| buffer.get(i))
                            .cloned()
                            .ok_or(EvalError::OutOfBounds {
                                offset,
                                len: buffer.len(),
                            })
                    }
                    Memory::Cell(cell) if offset == 0 => Ok(cell.borrow().clone()),
                    Memory::Cell(_) => Err(EvalError::OutOfBounds { offset, len: 1 }),
                }
            }
            _ => Err(EvalError::NullPointer),
        }
    }

    fn store(&self, pointer: &Value, offset: i64, value: Value) -> Result<()> {
        match pointer {
            Value::Pointer { memory, offset: base } => {
                let offset = base + offset;
                match memory {
                    Memory::Buffer(buffer) => {
                        let mut buffer = buffer.borrow_mut();
                        let len = buffer.len();
                        let slot = usize::try_from(offset)
                            .ok()
                            .and_then(|i| buffer.get_mut(i))
                            .ok_or(EvalError::OutOfBounds { offset, len })?;
                        *slot = value;
                        Ok(())
                    }
                    Memory::Cell(cell) if offset == 0 => {
                        *cell.borrow_mut() = value;
                        Ok(())
                    }
                    Memory::Cell(_) => Err(EvalError::OutOfBounds { offset, len: 1 }),
                }
            }
            _ => Err(EvalError::NullPointer),
        }
    }

    fn primitive(&self, ty: TypeId) -> Option<PrimitiveKind> {
        self.program.context.types.as_primitive(ty)
    }

    /// The value of a fresh element of a zeroed array
    fn zero(&self, ty: TypeId) -> Value {
        match self.primitive(ty) {
            Some(kind) if kind.is_integer() => Value::Int(0),
            Some(kind) if kind.is_float() => Value::Float(0.0),
            Some(PrimitiveKind::Bool) => Value::Bool(false),
            _ => Value::Null,
        }
    }

    fn evaluate(&mut self, expression: &BoundExpression) -> Result<Value> {
        let value = match &expression.kind {
            BoundExpressionKind::Literal(constant) => Value::from_constant(constant),
            BoundExpressionKind::Variable(variable)
            | BoundExpressionKind::NamespaceVariable { variable, .. } => {
                self.cell(*variable)?.borrow().clone()
            }
            BoundExpressionKind::Function(function) | BoundExpressionKind::Lambda(function) => {
                Value::Function(*function)
            }
            BoundExpressionKind::Unary { operator, operand } => {
                let kind = self.primitive(operand.ty);
                let operand = self.evaluate(operand)?;
                let result = kind.zip(operand.to_constant()).and_then(|(kind, constant)| {
                    folding::evaluate_unary(kind, *operator, &constant)
                });
                result.as_ref().map_or(Value::Void, Value::from_constant)
            }
            BoundExpressionKind::Binary { operator, lhs, rhs } => {
                let lhs = self.evaluate(lhs)?;
                match operator.kind {
                    BinaryOperator::And if !lhs.is_true() => return Ok(lhs),
                    BinaryOperator::Or if lhs.is_true() => return Ok(lhs),
                    _ => {}
                }
                let rhs = self.evaluate(rhs)?;

                match self.primitive(operator.operand_type) {
                    Some(kind) if kind != PrimitiveKind::Ptr => {
                        let (Some(a), Some(b)) = (lhs.to_constant(), rhs.to_constant()) else {
                            return Ok(Value::Void);
                        };
                        match folding::evaluate_binary(kind, operator.kind, &a, &b) {
                            Some(result) => Value::from_constant(&result),
                            None => return Err(EvalError::DivisionByZero),
                        }
                    }
                    // pointers compare by address
                    _ => {
                        let same = lhs.same_address(&rhs);
                        Value::Bool(if operator.kind == BinaryOperator::NotEquals {
                            !same
                        } else {
                            same
                        })
                    }
                }
            }
            BoundExpressionKind::Call { callee, args } => {
                let function = match callee {
                    Callee::Function(function) => *function,
                    Callee::Value(callee) => match self.evaluate(callee)? {
                        Value::Function(function) => function,
                        _ => return Err(EvalError::NullPointer),
                    },
                };
                let args = args
                    .iter()
                    .map(|arg| self.evaluate(arg))
                    .collect::<Result<Vec<_>>>()?;
                self.call(function, args)?
            }
            BoundExpressionKind::Cast(operand) => {
                let from = self.primitive(operand.ty);
                let to = self.primitive(expression.ty);
                let value = self.evaluate(operand)?;
                match (from, to, value.to_constant()) {
                    (Some(from), Some(to), Some(constant)) => folding::convert(from, to, &constant)
                        .as_ref()
                        .map_or(value, Value::from_constant),
                    _ => value,
                }
            }
            BoundExpressionKind::Field { target, index } => match self.evaluate(target)? {
                Value::Struct(fields) => {
                    let field = fields.borrow()[*index].clone();
                    field
                }
                _ => return Err(EvalError::NullPointer),
            },
            BoundExpressionKind::StructInit(values) => {
                let values = values
                    .iter()
                    .map(|value| self.evaluate(value))
                    .collect::<Result<Vec<_>>>()?;
                Value::Struct(Rc::new(RefCell::new(values)))
            }
            BoundExpressionKind::ArrayInit(values) => {
                let values = values
                    .iter()
                    .map(|value| self.evaluate(value))
                    .collect::<Result<Vec<_>>>()?;
                Value::Pointer {
                    memory: Memory::Buffer(Rc::new(RefCell::new(values))),
                    offset: 0,
                }
            }
            BoundExpressionKind::ZeroedArray(length) => {
                let length = self.evaluate(length)?.as_int().unwrap_or(0);
                let element = self
                    .program
                    .context
                    .types
                    .pointee(expression.ty)
                    .map_or(Value::Null, |element| self.zero(element));
                let length = usize::try_from(length).map_err(|_| EvalError::OutOfBounds {
                    offset: length,
                    len: 0,
                })?;
                Value::Pointer {
                    memory: Memory::Buffer(Rc::new(RefCell::new(vec![element; length]))),
                    offset: 0,
                }
            }
            BoundExpressionKind::Deref { pointer, index } => {
                let pointer = self.evaluate(pointer)?;
                let offset = match index {
                    Some(index) => self.evaluate(index)?.as_int().unwrap_or(0),
                    None => 0,
                };
                self.load(&pointer, offset)?
            }
            BoundExpressionKind::Reference(variable) => Value::Pointer {
                memory: Memory::Cell(self.cell(*variable)?),
                offset: 0,
            },
            BoundExpressionKind::Block { statements, value } => {
                self.execute(statements)?;
                match value {
                    Some(value) => self.evaluate(value)?,
                    None => Value::Void,
                }
            }
            BoundExpressionKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_true() {
                    self.evaluate(then_branch)?
                } else if let Some(else_branch) = else_branch {
                    self.evaluate(else_branch)?
                } else {
                    Value::Void
                }
            }
            BoundExpressionKind::Error => Value::Void,
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_nul_terminated_buffers() {
        let value = Value::from_constant(&Constant::Str(String::from("hi")));
        let Value::Pointer {
            memory: Memory::Buffer(buffer),
            offset: 0,
        } = &value
        else {
            panic!("expected a buffer pointer, got {value:?}");
        };
        let bytes: Vec<_> = buffer.borrow().iter().filter_map(Value::as_int).collect();
        assert_eq!(bytes, [104, 105, 0]);
    }

    #[test]
    fn pointers_compare_by_address() {
        let buffer = Rc::new(RefCell::new(vec![Value::Int(0); 4]));
        let at = |offset| Value::Pointer {
            memory: Memory::Buffer(buffer.clone()),
            offset,
        };
        let other = Value::Pointer {
            memory: Memory::Buffer(Rc::new(RefCell::new(vec![Value::Int(0); 4]))),
            offset: 1,
        };

        assert!(at(1).same_address(&at(1)));
        assert!(!at(1).same_address(&at(2)));
        assert!(!at(1).same_address(&other));
        assert!(Value::Null.same_address(&Value::Null));
        assert!(!at(0).same_address(&Value::Null));
    }

    #[test]
    fn structs_share_their_fields() {
        let fields = Rc::new(RefCell::new(vec![Value::Int(1)]));
        let a = Value::Struct(fields.clone());
        let b = a.clone();
        fields.borrow_mut()[0] = Value::Int(2);

        let Value::Struct(shared) = b else {
            unreachable!()
        };
        assert_eq!(shared.borrow()[0].as_int(), Some(2));
        assert!(a.same_address(&Value::Struct(shared.clone())));
    }
}

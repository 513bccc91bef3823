//! Built-in expression functions

pub mod logical;
pub mod math;

use crate::error::{ExprError, ExprResult};
use std::collections::HashMap;
use std::sync::OnceLock;
use tally_core::Value;

/// Function implementation signature
pub type FunctionImpl = fn(&[Value]) -> ExprResult<Value>;

/// Function definition
pub struct FunctionDef {
    /// Function name (lowercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    /// Check an argument count against this function's arity
    pub fn check_arity(&self, actual: usize) -> ExprResult<()> {
        let too_few = actual < self.min_args;
        let too_many = self.max_args.map_or(false, |max| actual > max);
        if too_few || too_many {
            return Err(ExprError::ArgumentCount {
                function: self.name.to_string(),
                expected: self.arity(),
                actual,
            });
        }
        Ok(())
    }

    fn arity(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{}..{}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }
}

static REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

/// The shared registry of built-in functions
pub fn registry() -> &'static FunctionRegistry {
    REGISTRY.get_or_init(FunctionRegistry::new)
}

/// Function registry
pub struct FunctionRegistry {
    functions: HashMap<&'static str, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        registry.register_math_functions();
        registry.register_logical_functions();

        registry
    }

    /// Look up a function by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name.to_lowercase().as_str())
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }

    /// Names of all registered functions, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    fn unary(&mut self, name: &'static str, implementation: FunctionImpl) {
        self.register(FunctionDef {
            name,
            min_args: 1,
            max_args: Some(1),
            implementation,
        });
    }

    fn register_math_functions(&mut self) {
        self.unary("abs", math::fn_abs);
        self.unary("sqrt", math::fn_sqrt);
        self.unary("exp", math::fn_exp);
        self.unary("expm1", math::fn_expm1);
        self.unary("log", math::fn_log);
        self.unary("log10", math::fn_log10);
        self.unary("log1p", math::fn_log1p);
        self.unary("floor", math::fn_floor);
        self.unary("ceil", math::fn_ceil);

        // Trigonometric
        self.unary("sin", math::fn_sin);
        self.unary("cos", math::fn_cos);
        self.unary("tan", math::fn_tan);
        self.unary("arcsin", math::fn_arcsin);
        self.unary("arccos", math::fn_arccos);
        self.unary("arctan", math::fn_arctan);
        self.unary("sinh", math::fn_sinh);
        self.unary("cosh", math::fn_cosh);
        self.unary("tanh", math::fn_tanh);

        // ARCTAN2
        self.register(FunctionDef {
            name: "arctan2",
            min_args: 2,
            max_args: Some(2),
            implementation: math::fn_arctan2,
        });

        // ROUND
        self.register(FunctionDef {
            name: "round",
            min_args: 1,
            max_args: Some(2),
            implementation: math::fn_round,
        });

        // MIN
        self.register(FunctionDef {
            name: "min",
            min_args: 1,
            max_args: None,
            implementation: math::fn_min,
        });

        // MAX
        self.register(FunctionDef {
            name: "max",
            min_args: 1,
            max_args: None,
            implementation: math::fn_max,
        });
    }

    fn register_logical_functions(&mut self) {
        // WHERE
        self.register(FunctionDef {
            name: "where",
            min_args: 3,
            max_args: Some(3),
            implementation: logical::fn_where,
        });
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Coerce an argument to a number, treating booleans as 1/0
pub(crate) fn number_arg(function: &str, value: &Value) -> ExprResult<f64> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(ExprError::Evaluation(format!(
            "{}() expects a number, got {}",
            function,
            other.type_name()
        ))),
    }
}
